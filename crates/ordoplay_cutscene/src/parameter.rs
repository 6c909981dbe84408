// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animated parameters.
//!
//! An [`AnimatedParameter`] binds one member on one target entity to
//! 1-4 scalar curves, sized by the member's [`ValueKind`]. It owns the
//! transient pre-animation snapshot used to undo its effect when the
//! owning node is reversed.

use crate::binding::{euler_to_quat, quat_to_euler, EntityId, ParameterBinding, SceneBinder, SpatialRole};
use crate::curve::{Curve, InterpolationMode, WrapMode};
use crate::space::Transform;
use crate::value::{ParamValue, ValueKind};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A member of a target entity driven by keyframe curves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimatedParameter {
    /// What this parameter drives
    pub binding: ParameterBinding,
    /// One curve per value component
    curves: Vec<Curve>,
    /// Disabled parameters neither write nor snapshot
    pub enabled: bool,
    /// Bound to a member outside the owner's usual parameter list;
    /// changes are keyed even before the first key exists
    #[serde(default)]
    pub external: bool,
    /// Wrap mode before the first key
    #[serde(default)]
    pub pre_wrap: WrapMode,
    /// Wrap mode after the last key
    #[serde(default)]
    pub post_wrap: WrapMode,
    #[serde(skip)]
    snapshot: Option<ParamValue>,
    #[serde(skip)]
    last_evaluated: Option<ParamValue>,
    #[serde(skip)]
    transform_context: Option<Transform>,
    #[serde(skip)]
    invalid_reported: bool,
}

impl AnimatedParameter {
    /// Create a parameter with empty curves
    pub fn new(binding: ParameterBinding) -> Self {
        let curves = vec![Curve::new(); binding.value_kind.curve_count()];
        Self {
            binding,
            curves,
            enabled: true,
            external: false,
            pre_wrap: WrapMode::Once,
            post_wrap: WrapMode::Once,
            snapshot: None,
            last_evaluated: None,
            transform_context: None,
            invalid_reported: false,
        }
    }

    /// Create an external parameter
    pub fn external(binding: ParameterBinding) -> Self {
        Self {
            external: true,
            ..Self::new(binding)
        }
    }

    /// Kind of value driven
    pub fn kind(&self) -> ValueKind {
        self.binding.value_kind
    }

    /// The component curves
    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    /// Mutable access to one component curve
    pub fn curve_mut(&mut self, index: usize) -> Option<&mut Curve> {
        self.curves.get_mut(index)
    }

    /// Resize curves to match the value kind (after loading old data)
    pub fn normalize(&mut self) {
        self.curves
            .resize(self.binding.value_kind.curve_count(), Curve::new());
    }

    /// Captured pre-animation value
    pub fn snapshot(&self) -> Option<ParamValue> {
        self.snapshot
    }

    /// Value recorded by the last evaluation, in parameter space
    pub fn last_evaluated(&self) -> Option<ParamValue> {
        self.last_evaluated
    }

    /// Whether the bound member resolves on `target`
    pub fn is_valid(&self, scene: &dyn SceneBinder, target: EntityId) -> bool {
        self.binding.is_valid(scene, target)
    }

    /// Re-base spatial values onto a virtual parent.
    ///
    /// Only position and rotation bindings keep the context; other
    /// parameters ignore it.
    pub fn set_transform_context(&mut self, context: Option<Transform>) {
        self.transform_context = if self.binding.spatial_role().is_some() {
            context
        } else {
            None
        };
    }

    fn to_world(&self, value: ParamValue) -> ParamValue {
        let (Some(context), Some(role), ParamValue::Vec3(v)) =
            (self.transform_context, self.binding.spatial_role(), value)
        else {
            return value;
        };
        match role {
            SpatialRole::Position => ParamValue::Vec3(context.transform_point(Vec3::from(v)).into()),
            SpatialRole::Rotation => {
                ParamValue::Vec3(quat_to_euler(context.transform_rotation(euler_to_quat(v))))
            }
        }
    }

    fn to_local(&self, value: ParamValue) -> ParamValue {
        let (Some(context), Some(role), ParamValue::Vec3(v)) =
            (self.transform_context, self.binding.spatial_role(), value)
        else {
            return value;
        };
        match role {
            SpatialRole::Position => {
                ParamValue::Vec3(context.inverse_transform_point(Vec3::from(v)).into())
            }
            SpatialRole::Rotation => {
                ParamValue::Vec3(quat_to_euler(context.inverse_transform_rotation(euler_to_quat(v))))
            }
        }
    }

    fn check_valid(&mut self, scene: &dyn SceneBinder, target: EntityId) -> Option<EntityId> {
        let entity = self
            .binding
            .resolve(scene, target)
            .filter(|_| self.binding.is_valid(scene, target));
        if entity.is_none() && !self.invalid_reported {
            self.invalid_reported = true;
            tracing::warn!(
                binding = %self.binding.label(),
                "Animated parameter binding is invalid; skipping"
            );
        }
        entity
    }

    /// Current member value in parameter space
    pub fn live_value(&self, scene: &dyn SceneBinder, target: EntityId) -> Option<ParamValue> {
        let entity = self.binding.resolve(scene, target)?;
        let value = scene.get(entity, &self.binding.path)?;
        (value.kind() == self.kind()).then(|| self.to_local(value))
    }

    /// Evaluate the curves at `time` without writing anything
    pub fn evaluate(&self, time: f32) -> Option<ParamValue> {
        if !self.has_any_key() {
            return None;
        }
        let mut components = [0.0f32; 4];
        for (slot, curve) in components.iter_mut().zip(self.curves.iter()) {
            *slot = curve
                .evaluate(time, self.pre_wrap, self.post_wrap)
                .unwrap_or(0.0);
        }
        Some(ParamValue::from_components(
            self.kind(),
            &components[..self.kind().curve_count()],
        ))
    }

    /// Capture the current member value; called when the owner enters
    pub fn set_snapshot(&mut self, scene: &dyn SceneBinder, target: EntityId) {
        if !self.enabled {
            return;
        }
        let Some(entity) = self.check_valid(scene, target) else {
            return;
        };
        self.snapshot = scene.get(entity, &self.binding.path);
    }

    /// Write back and clear the snapshot; called when the owner reverses
    pub fn restore_snapshot(&mut self, scene: &mut dyn SceneBinder, target: EntityId) {
        if !self.enabled {
            return;
        }
        let Some(value) = self.snapshot.take() else {
            return;
        };
        if let Some(entity) = self.binding.resolve(scene, target) {
            scene.set(entity, &self.binding.path, value);
        }
    }

    /// Evaluate at `time` and write the result to the target
    pub fn set_evaluated_values(&mut self, scene: &mut dyn SceneBinder, target: EntityId, time: f32) {
        self.set_evaluated_values_weighted(scene, target, time, 1.0);
    }

    /// Evaluate at `time` and write the result blended over the snapshot.
    ///
    /// With no keys the live value is recorded for change detection and
    /// nothing is written.
    pub fn set_evaluated_values_weighted(
        &mut self,
        scene: &mut dyn SceneBinder,
        target: EntityId,
        time: f32,
        weight: f32,
    ) {
        if !self.enabled {
            return;
        }
        let Some(entity) = self.check_valid(scene, target) else {
            return;
        };

        let Some(evaluated) = self.evaluate(time) else {
            self.last_evaluated = self.live_value(scene, target);
            return;
        };

        let mut value = self.to_world(evaluated);
        if weight < 1.0 {
            if let Some(snapshot) = self.snapshot {
                value = snapshot.blend(&value, weight);
            }
        }
        if scene.set(entity, &self.binding.path, value) {
            self.last_evaluated = Some(self.to_local(value));
        }
    }

    /// Key the live value at `time` if it changed since the last evaluation.
    ///
    /// Only parameters that already have keys, or external ones, are keyed.
    pub fn try_key_changed_values(&mut self, scene: &dyn SceneBinder, target: EntityId, time: f32) -> bool {
        if !self.enabled || !self.is_valid(scene, target) {
            return false;
        }
        let (Some(live), Some(last)) = (self.live_value(scene, target), self.last_evaluated) else {
            return false;
        };
        if !live.changed_from(&last) {
            return false;
        }
        if !(self.has_any_key() || self.external) {
            return false;
        }
        self.set_key(time, live);
        self.last_evaluated = Some(live);
        true
    }

    fn default_interpolation(&self) -> InterpolationMode {
        match self.kind() {
            ValueKind::Bool => InterpolationMode::Constant,
            _ => InterpolationMode::Linear,
        }
    }

    /// Add or move a key at `time`; returns `false` on a kind mismatch
    pub fn set_key(&mut self, time: f32, value: ParamValue) -> bool {
        if value.kind() != self.kind() {
            return false;
        }
        let mode = self.default_interpolation();
        for (i, curve) in self.curves.iter_mut().enumerate() {
            curve.set_key(time, value.component(i), mode);
        }
        true
    }

    /// Key the member's live value at `time`
    pub fn set_key_current(&mut self, scene: &dyn SceneBinder, target: EntityId, time: f32) -> bool {
        match self.live_value(scene, target) {
            Some(value) => self.set_key(time, value),
            None => false,
        }
    }

    /// Remove the key at `time` from every curve
    pub fn remove_key(&mut self, time: f32) -> bool {
        let mut removed = false;
        for curve in &mut self.curves {
            removed |= curve.remove_key(time);
        }
        removed
    }

    /// Whether any curve has a key near `time`
    pub fn has_key(&self, time: f32) -> bool {
        self.curves.iter().any(|c| c.has_key(time))
    }

    /// Whether any curve has a key at all
    pub fn has_any_key(&self) -> bool {
        self.curves.iter().any(|c| !c.is_empty())
    }

    /// Earliest key after `time` across curves
    pub fn key_next(&self, time: f32) -> Option<f32> {
        self.curves
            .iter()
            .filter_map(|c| c.key_next(time))
            .min_by(f32::total_cmp)
    }

    /// Latest key before `time` across curves
    pub fn key_previous(&self, time: f32) -> Option<f32> {
        self.curves
            .iter()
            .filter_map(|c| c.key_previous(time))
            .max_by(f32::total_cmp)
    }

    /// Enable the parameter, seeding keys at 0 and `time` if it has none
    pub fn enable(&mut self, scene: &dyn SceneBinder, target: EntityId, time: f32) {
        self.enabled = true;
        if !self.has_any_key() && self.set_key_current(scene, target, 0.0) {
            self.set_key_current(scene, target, time);
        }
    }

    /// Disable the parameter, restoring its snapshot immediately.
    ///
    /// Authored keys are kept.
    pub fn disable(&mut self, scene: &mut dyn SceneBinder, target: EntityId) {
        self.restore_snapshot(scene, target);
        self.enabled = false;
    }

    /// Drop transient session state
    pub fn reset_session(&mut self) {
        self.snapshot = None;
        self.last_evaluated = None;
        self.invalid_reported = false;
    }
}
