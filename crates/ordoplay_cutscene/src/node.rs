// SPDX-License-Identifier: MIT OR Apache-2.0
//! Directable node definitions.
//!
//! Every element of a cutscene (group, track or clip) is a
//! [`DirectableNode`] stored in the timeline's arena and addressed by a
//! stable [`NodeId`]. Parent and child links are ids, never references.

use crate::binding::EntityId;
use crate::parameter_set::ParameterSet;
use crate::section::Section;
use crate::space::TransformSpace;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a directable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level of a node in the group → track → clip hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Top-level container of tracks
    Group,
    /// Container of clips
    Track,
    /// Leaf time range doing the actual work
    Clip,
}

/// Per-session lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Not started (or reversed past its start)
    #[default]
    Idle,
    /// Between its enter and exit crossings
    Active,
    /// Past its end
    Exited,
}

/// How an actor group binds its actor for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActorReferenceMode {
    /// Animate the scene entity itself
    #[default]
    UseOriginal,
    /// Animate a copy created for the session, hiding the original
    InstantiateCopy,
}

/// Group-specific data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupData {
    /// Actor entity; `None` binds the timeline root
    #[serde(default)]
    pub actor: Option<EntityId>,
    /// Actor reference mode
    #[serde(default)]
    pub reference_mode: ActorReferenceMode,
    /// Named time markers
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Session copy of the actor
    #[serde(skip)]
    pub(crate) instance: Option<EntityId>,
}

/// Track-specific data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackData {
    /// Rank among sibling tracks of the same type, assigned at initialize
    #[serde(skip)]
    pub layer_order: usize,
}

/// Clip-specific data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipData {
    /// Child path from the track's target to the clip's target
    #[serde(default)]
    pub child_path: Option<String>,
    /// Space in which spatial parameters are authored
    #[serde(default)]
    pub space: TransformSpace,
}

/// Kind-specific node data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeData {
    /// Group data
    Group(GroupData),
    /// Track data
    Track(TrackData),
    /// Clip data
    Clip(ClipData),
}

/// A time-ranged element of the cutscene tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectableNode {
    /// Unique node ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Registered directable kind
    pub type_tag: String,
    /// Start time in timeline seconds
    pub start_time: f32,
    /// Duration in seconds
    pub length: f32,
    /// Blend-in duration
    #[serde(default)]
    pub blend_in: f32,
    /// Blend-out duration
    #[serde(default)]
    pub blend_out: f32,
    /// Inactive nodes are left out of sessions
    pub active: bool,
    /// Ordered child nodes
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Animated parameters
    #[serde(default)]
    pub parameters: ParameterSet,
    /// Kind-specific settings
    #[serde(default)]
    pub settings: IndexMap<String, serde_json::Value>,
    /// Group / track / clip data
    pub data: NodeData,
    #[serde(skip)]
    pub(crate) parent: Option<NodeId>,
    #[serde(skip)]
    pub(crate) resolved_target: Option<EntityId>,
    #[serde(skip)]
    pub(crate) state: NodeState,
}

impl DirectableNode {
    fn with_data(name: impl Into<String>, type_tag: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            type_tag: type_tag.into(),
            start_time: 0.0,
            length: 0.0,
            blend_in: 0.0,
            blend_out: 0.0,
            active: true,
            children: Vec::new(),
            parameters: ParameterSet::new(),
            settings: IndexMap::new(),
            data,
            parent: None,
            resolved_target: None,
            state: NodeState::Idle,
        }
    }

    /// Create a group node
    pub fn group(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::with_data(name, type_tag, NodeData::Group(GroupData::default()))
    }

    /// Create a track node
    pub fn track(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::with_data(name, type_tag, NodeData::Track(TrackData::default()))
    }

    /// Create a clip node
    pub fn clip(name: impl Into<String>, type_tag: impl Into<String>, start_time: f32, length: f32) -> Self {
        let mut node = Self::with_data(name, type_tag, NodeData::Clip(ClipData::default()));
        node.start_time = start_time;
        node.length = length.max(0.0);
        node
    }

    /// Add a kind-specific setting
    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Hierarchy level
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Group(_) => NodeKind::Group,
            NodeData::Track(_) => NodeKind::Track,
            NodeData::Clip(_) => NodeKind::Clip,
        }
    }

    /// End time in timeline seconds
    pub fn end_time(&self) -> f32 {
        self.start_time + self.length
    }

    /// Whether timeline `time` lies in `[start, end)`
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Target entity resolved for the current session
    pub fn resolved_target(&self) -> Option<EntityId> {
        self.resolved_target
    }

    /// Lifecycle state in the current session
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Group data, if this is a group
    pub fn as_group(&self) -> Option<&GroupData> {
        match &self.data {
            NodeData::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Mutable group data, if this is a group
    pub fn as_group_mut(&mut self) -> Option<&mut GroupData> {
        match &mut self.data {
            NodeData::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Track data, if this is a track
    pub fn as_track(&self) -> Option<&TrackData> {
        match &self.data {
            NodeData::Track(t) => Some(t),
            _ => None,
        }
    }

    /// Clip data, if this is a clip
    pub fn as_clip(&self) -> Option<&ClipData> {
        match &self.data {
            NodeData::Clip(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable clip data, if this is a clip
    pub fn as_clip_mut(&mut self) -> Option<&mut ClipData> {
        match &mut self.data {
            NodeData::Clip(c) => Some(c),
            _ => None,
        }
    }

    /// Set the blend-in, clamped so blends never exceed the length
    pub fn set_blend_in(&mut self, value: f32) {
        self.blend_in = value.clamp(0.0, (self.length - self.blend_out).max(0.0));
    }

    /// Set the blend-out, clamped so blends never exceed the length
    pub fn set_blend_out(&mut self, value: f32) {
        self.blend_out = value.clamp(0.0, (self.length - self.blend_in).max(0.0));
    }

    /// Clamp blends after a length change
    pub fn clamp_blends(&mut self) {
        self.blend_in = self.blend_in.clamp(0.0, self.length.max(0.0));
        self.blend_out = self.blend_out.clamp(0.0, (self.length - self.blend_in).max(0.0));
    }

    /// Blend weight at `local_time`.
    ///
    /// Ramps 0→1 over the blend-in, holds 1, and ramps 1→0 over the
    /// blend-out. A zero blend is a hard step.
    pub fn weight(&self, local_time: f32) -> f32 {
        if local_time < 0.0 || local_time > self.length {
            return 0.0;
        }
        let fade_in = if self.blend_in > 0.0 {
            local_time / self.blend_in
        } else {
            1.0
        };
        let fade_out = if self.blend_out > 0.0 {
            (self.length - local_time) / self.blend_out
        } else {
            1.0
        };
        fade_in.min(fade_out).clamp(0.0, 1.0)
    }

    /// Next key time across this node's parameters, in local time
    pub fn key_next(&self, local_time: f32) -> Option<f32> {
        self.parameters.key_next(local_time)
    }

    /// Previous key time across this node's parameters, in local time
    pub fn key_previous(&self, local_time: f32) -> Option<f32> {
        self.parameters.key_previous(local_time)
    }

    pub(crate) fn reset_session(&mut self) {
        self.state = NodeState::Idle;
        self.resolved_target = None;
        self.parameters.reset_session();
    }
}
