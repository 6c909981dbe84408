// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered parameter collections owned by directable nodes.

use crate::binding::{EntityId, ParameterBinding, SceneBinder};
use crate::parameter::AnimatedParameter;
use crate::space::Transform;
use crate::value::ParamValue;
use serde::{Deserialize, Serialize};

/// Ordered collection of animated parameters owned by one node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: Vec<AnimatedParameter>,
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, returning its index.
    ///
    /// A parameter with an identical binding is not added twice; the
    /// existing index is returned instead.
    pub fn add(&mut self, parameter: AnimatedParameter) -> usize {
        if let Some(idx) = self.index_of(&parameter.binding) {
            return idx;
        }
        self.parameters.push(parameter);
        self.parameters.len() - 1
    }

    /// Remove a parameter by index
    pub fn remove(&mut self, index: usize) -> Option<AnimatedParameter> {
        (index < self.parameters.len()).then(|| self.parameters.remove(index))
    }

    /// Index of the parameter with this binding
    pub fn index_of(&self, binding: &ParameterBinding) -> Option<usize> {
        self.parameters.iter().position(|p| {
            p.binding.path == binding.path && p.binding.child_path == binding.child_path
        })
    }

    /// Get a parameter
    pub fn get(&self, index: usize) -> Option<&AnimatedParameter> {
        self.parameters.get(index)
    }

    /// Get a mutable parameter
    pub fn get_mut(&mut self, index: usize) -> Option<&mut AnimatedParameter> {
        self.parameters.get_mut(index)
    }

    /// Iterate over parameters
    pub fn iter(&self) -> impl Iterator<Item = &AnimatedParameter> {
        self.parameters.iter()
    }

    /// Iterate mutably over parameters
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnimatedParameter> {
        self.parameters.iter_mut()
    }

    /// Get parameter count
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Resize every parameter's curves to its value kind
    pub fn normalize(&mut self) {
        for p in &mut self.parameters {
            p.normalize();
        }
    }

    /// Set the virtual parent for spatial parameters
    pub fn set_transform_context(&mut self, context: Option<Transform>) {
        for p in &mut self.parameters {
            p.set_transform_context(context);
        }
    }

    /// Snapshot every parameter
    pub fn set_snapshot(&mut self, scene: &dyn SceneBinder, target: EntityId) {
        for p in &mut self.parameters {
            p.set_snapshot(scene, target);
        }
    }

    /// Restore every snapshot, last parameter first
    pub fn restore_snapshot(&mut self, scene: &mut dyn SceneBinder, target: EntityId) {
        for p in self.parameters.iter_mut().rev() {
            p.restore_snapshot(scene, target);
        }
    }

    /// Evaluate and write every parameter, blended over snapshots by `weight`
    pub fn set_evaluated_values(
        &mut self,
        scene: &mut dyn SceneBinder,
        target: EntityId,
        time: f32,
        weight: f32,
    ) {
        for p in &mut self.parameters {
            p.set_evaluated_values_weighted(scene, target, time, weight);
        }
    }

    /// Key every parameter whose live value changed.
    ///
    /// With `paired` set, a key on any parameter also keys every other
    /// enabled parameter at the same time. Returns the number of keyed
    /// parameters.
    pub fn try_key_changed_values(
        &mut self,
        scene: &dyn SceneBinder,
        target: EntityId,
        time: f32,
        paired: bool,
    ) -> usize {
        let mut keyed = 0;
        for p in &mut self.parameters {
            if p.try_key_changed_values(scene, target, time) {
                keyed += 1;
            }
        }
        if keyed > 0 && paired {
            keyed += self.key_others_at(scene, target, time);
        }
        keyed
    }

    /// Set a key on one parameter and pair the rest at the same time
    pub fn set_key_paired(
        &mut self,
        scene: &dyn SceneBinder,
        target: EntityId,
        index: usize,
        time: f32,
        value: ParamValue,
    ) -> bool {
        let Some(p) = self.parameters.get_mut(index) else {
            return false;
        };
        if !p.set_key(time, value) {
            return false;
        }
        self.key_others_at(scene, target, time);
        true
    }

    /// Key enabled parameters without a key at `time`, keeping their
    /// curve shape where they already have keys
    fn key_others_at(&mut self, scene: &dyn SceneBinder, target: EntityId, time: f32) -> usize {
        let mut keyed = 0;
        for p in self.parameters.iter_mut().filter(|p| p.enabled && !p.has_key(time)) {
            let value = p.evaluate(time).or_else(|| p.live_value(scene, target));
            if let Some(value) = value {
                if p.set_key(time, value) {
                    keyed += 1;
                }
            }
        }
        keyed
    }

    /// Remove keys at `time` from every parameter
    pub fn remove_key(&mut self, time: f32) -> bool {
        let mut removed = false;
        for p in &mut self.parameters {
            removed |= p.remove_key(time);
        }
        removed
    }

    /// Whether any parameter has a key near `time`
    pub fn has_key(&self, time: f32) -> bool {
        self.parameters.iter().any(|p| p.has_key(time))
    }

    /// Whether any parameter has keys
    pub fn has_any_key(&self) -> bool {
        self.parameters.iter().any(AnimatedParameter::has_any_key)
    }

    /// Earliest key after `time` across parameters
    pub fn key_next(&self, time: f32) -> Option<f32> {
        self.parameters
            .iter()
            .filter_map(|p| p.key_next(time))
            .min_by(f32::total_cmp)
    }

    /// Latest key before `time` across parameters
    pub fn key_previous(&self, time: f32) -> Option<f32> {
        self.parameters
            .iter()
            .filter_map(|p| p.key_previous(time))
            .max_by(f32::total_cmp)
    }

    /// Drop transient session state
    pub fn reset_session(&mut self) {
        for p in &mut self.parameters {
            p.reset_session();
        }
    }
}
