// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node behaviour contract.
//!
//! A [`Directable`] is the runtime behaviour attached to one node for one
//! session. The scheduler drives it through [`lifecycle`], which wraps the
//! behaviour callbacks with the generic parameter work (snapshot on enter,
//! weighted evaluation on update, restore on reverse).

use crate::binding::{EntityId, SceneBinder};
use crate::node::{DirectableNode, NodeData};
use crate::playback::{PlaybackRequest, StopMode};
use crate::space::{Transform, TransformSpace};
use crate::Result;
use glam::Vec3;

/// Everything a behaviour callback may touch
pub struct NodeContext<'a> {
    /// The node being driven
    pub node: &'a mut DirectableNode,
    /// Host scene
    pub scene: &'a mut dyn SceneBinder,
    /// Timeline root entity
    pub root: Option<EntityId>,
    requests: &'a mut Vec<PlaybackRequest>,
}

impl<'a> NodeContext<'a> {
    /// Create a context
    pub fn new(
        node: &'a mut DirectableNode,
        scene: &'a mut dyn SceneBinder,
        root: Option<EntityId>,
        requests: &'a mut Vec<PlaybackRequest>,
    ) -> Self {
        Self {
            node,
            scene,
            root,
            requests,
        }
    }

    /// Resolved target of the node
    pub fn target(&self) -> Option<EntityId> {
        self.node.resolved_target
    }

    /// Ask the timeline to stop once the current sample completes
    pub fn request_stop(&mut self, mode: StopMode) {
        self.requests.push(PlaybackRequest::Stop(mode));
    }

    /// Ask the timeline to pause once the current sample completes
    pub fn request_pause(&mut self) {
        self.requests.push(PlaybackRequest::Pause);
    }

    /// Current world transform of a space
    pub fn space_transform(&self, space: TransformSpace) -> Transform {
        let entity = match space {
            TransformSpace::World => None,
            TransformSpace::TimelineSpace => self.root,
            TransformSpace::EntitySpace => self.node.resolved_target,
        };
        entity
            .and_then(|e| self.scene.world_transform(e))
            .unwrap_or(Transform::IDENTITY)
    }

    /// Transform a point from `space` into world space
    pub fn transform_point(&self, space: TransformSpace, point: Vec3) -> Vec3 {
        self.space_transform(space).transform_point(point)
    }

    /// Transform a world point into `space`
    pub fn inverse_transform_point(&self, space: TransformSpace, point: Vec3) -> Vec3 {
        self.space_transform(space).inverse_transform_point(point)
    }

    /// Read a kind-specific setting
    pub fn setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        read_setting(self.node, key)
    }
}

/// Deserialize one entry of a node's settings map
pub fn read_setting<T: serde::de::DeserializeOwned>(node: &DirectableNode, key: &str) -> Result<Option<T>> {
    match node.settings.get(key) {
        Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        None => Ok(None),
    }
}

/// Runtime behaviour of a node.
///
/// Every method has a no-op default. Callbacks return `Err` to report a
/// failure; the scheduler logs it and carries on with the other nodes.
pub trait Directable {
    /// Prepare for a session. Returning `false` leaves the node out.
    fn initialize(&mut self, _cx: &mut NodeContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Whether the node is meaningless without a resolved target
    fn requires_target(&self) -> bool {
        true
    }

    /// Forward crossing of the start time
    fn on_enter(&mut self, _cx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Sample at `time` (local), coming from `previous_time`
    fn on_update(&mut self, _cx: &mut NodeContext<'_>, _time: f32, _previous_time: f32) -> Result<()> {
        Ok(())
    }

    /// Forward crossing of the end time
    fn on_exit(&mut self, _cx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Backward crossing of the end time
    fn on_reverse_enter(&mut self, _cx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Backward crossing of the start time; undo what enter/update did
    fn on_reverse(&mut self, _cx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Length implied by the node's settings, if any
    fn computed_length(&self, _node: &DirectableNode) -> Option<f32> {
        None
    }

    /// Whether the node's settings are usable
    fn is_valid(&self, _node: &DirectableNode) -> bool {
        true
    }
}

/// One scheduler-driven callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Callback {
    /// Enter
    Enter,
    /// Update at local `time` from local `previous`
    Update {
        /// Local time
        time: f32,
        /// Local previous time
        previous: f32,
    },
    /// Exit
    Exit,
    /// Reverse enter
    ReverseEnter,
    /// Reverse
    Reverse,
}

impl Callback {
    /// Phase name used in logs
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Update { .. } => "update",
            Self::Exit => "exit",
            Self::ReverseEnter => "reverse_enter",
            Self::Reverse => "reverse",
        }
    }
}

/// Generic node lifecycle around behaviour callbacks
pub mod lifecycle {
    use super::*;
    use crate::node::NodeState;

    /// Run one callback with its parameter bookkeeping
    pub fn run(behaviour: &mut dyn Directable, cx: &mut NodeContext<'_>, callback: Callback) -> Result<()> {
        match callback {
            Callback::Enter => enter(behaviour, cx),
            Callback::Update { time, previous } => update(behaviour, cx, time, previous),
            Callback::Exit => {
                cx.node.state = NodeState::Exited;
                behaviour.on_exit(cx)
            }
            Callback::ReverseEnter => {
                cx.node.state = NodeState::Active;
                behaviour.on_reverse_enter(cx)
            }
            Callback::Reverse => reverse(behaviour, cx),
        }
    }

    fn enter(behaviour: &mut dyn Directable, cx: &mut NodeContext<'_>) -> Result<()> {
        cx.node.state = NodeState::Active;
        if let Some(target) = cx.target() {
            let space = match &cx.node.data {
                NodeData::Clip(clip) => clip.space,
                _ => TransformSpace::World,
            };
            let context = (space != TransformSpace::World).then(|| cx.space_transform(space));
            cx.node.parameters.set_transform_context(context);
            cx.node.parameters.set_snapshot(&*cx.scene, target);
        }
        behaviour.on_enter(cx)
    }

    fn update(behaviour: &mut dyn Directable, cx: &mut NodeContext<'_>, time: f32, previous: f32) -> Result<()> {
        if let Some(target) = cx.target() {
            let weight = cx.node.weight(time);
            cx.node
                .parameters
                .set_evaluated_values(&mut *cx.scene, target, time, weight);
        }
        behaviour.on_update(cx, time, previous)
    }

    fn reverse(behaviour: &mut dyn Directable, cx: &mut NodeContext<'_>) -> Result<()> {
        cx.node.state = NodeState::Idle;
        let result = behaviour.on_reverse(cx);
        if let Some(target) = cx.target() {
            cx.node.parameters.restore_snapshot(&mut *cx.scene, target);
        }
        result
    }
}
