// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time-pointer scheduler.
//!
//! Each participating node contributes an enter pointer at its start
//! time, an exit pointer at its end time, and an update pointer. Sampling
//! a new time walks the crossing pointers in time order (forward) or
//! reverse time order (backward) and then updates every node whose range
//! contains the new time.
//!
//! Enter pointers of a parent precede its children's; a parent's exit
//! pointer follows its children's, so crossings stay properly nested.

use crate::binding::{EntityId, MemberPath, SceneBinder};
use crate::directable::{lifecycle, Callback, Directable, NodeContext};
use crate::node::{ActorReferenceMode, DirectableNode, NodeData, NodeId};
use crate::playback::PlaybackRequest;
use crate::registry::DirectableRegistry;
use crate::value::ParamValue;
use indexmap::IndexMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Node arena keyed by id
pub type NodeArena = IndexMap<NodeId, DirectableNode>;

/// Borrowed timeline state needed by one sample
pub struct SampleContext<'a> {
    /// Node arena
    pub nodes: &'a mut NodeArena,
    /// Top-level groups in order
    pub groups: &'a [NodeId],
    /// Directable kinds
    pub registry: &'a DirectableRegistry,
    /// Host scene
    pub scene: &'a mut dyn SceneBinder,
    /// Timeline root entity
    pub root: Option<EntityId>,
    /// Timeline length
    pub length: f32,
    /// Requests raised by callbacks
    pub requests: &'a mut Vec<PlaybackRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Enter,
    Exit,
}

#[derive(Debug, Clone)]
struct TimePointer {
    node: NodeId,
    edge: Edge,
    armed: bool,
    last_start: f32,
}

/// Drives node callbacks from sampled times
#[derive(Default)]
pub struct TimelineScheduler {
    pointers: Vec<TimePointer>,
    /// Indices of enter pointers in update order (clip, track, group)
    updates: Vec<usize>,
    behaviours: IndexMap<NodeId, Box<dyn Directable>>,
    previous_time: f32,
    built: bool,
    session_enabled: bool,
}

impl std::fmt::Debug for TimelineScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineScheduler")
            .field("pointers", &self.pointers.len())
            .field("behaviours", &self.behaviours.len())
            .field("previous_time", &self.previous_time)
            .field("built", &self.built)
            .field("session_enabled", &self.session_enabled)
            .finish()
    }
}

impl TimelineScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last sample
    pub fn previous_time(&self) -> f32 {
        self.previous_time
    }

    /// Whether the timeline is inside its open interval
    pub fn is_session_enabled(&self) -> bool {
        self.session_enabled
    }

    /// Whether pointer lists are built
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of nodes participating in the session
    pub fn participant_count(&self) -> usize {
        self.behaviours.len()
    }

    /// Whether a node participates in the session
    pub fn participates(&self, node: NodeId) -> bool {
        self.behaviours.contains_key(&node)
    }

    /// Sample the timeline at `time`
    pub fn sample(&mut self, cx: &mut SampleContext<'_>, time: f32) {
        let length = cx.length;
        let previous = self.previous_time;
        let at_boundary = |t: f32| t <= 0.0 || t >= length;

        if at_boundary(time) && time == previous {
            return;
        }

        if !self.built {
            self.build(cx);
        }

        let interior = !at_boundary(time);
        let was_interior = !at_boundary(previous);
        if interior && !was_interior {
            self.session_enabled = true;
            tracing::info!(time, "Cutscene session enabled");
        }

        if time > previous {
            for i in 0..self.pointers.len() {
                self.trigger_forward(cx, i, time, previous);
            }
        } else if time < previous {
            for i in (0..self.pointers.len()).rev() {
                self.trigger_backward(cx, i, time, previous);
            }
        }

        for u in 0..self.updates.len() {
            self.update(cx, self.updates[u], time, previous);
        }

        self.previous_time = time;

        if !interior && was_interior {
            self.session_enabled = false;
            tracing::info!(time, "Cutscene session disabled");
        }
        // Landing on 0 from anywhere later ends the session, including a
        // direct jump from the end.
        if time <= 0.0 && previous > 0.0 {
            self.teardown(cx.nodes, cx.scene);
        }
    }

    /// Build the pointer lists from the current tree
    pub fn build(&mut self, cx: &mut SampleContext<'_>) {
        self.pointers.clear();
        self.updates.clear();
        self.behaviours.clear();

        let mut update_nodes = Vec::new();
        let groups = cx.groups;
        for &group_id in groups {
            if !self.initialize_node(cx, group_id, None) {
                continue;
            }
            self.push_enter(cx.nodes, group_id);
            let group_target = target_of(cx.nodes, group_id);

            let tracks = children_of(cx.nodes, group_id);
            let mut layers: IndexMap<String, usize> = IndexMap::new();
            for track_id in tracks {
                if !self.initialize_node(cx, track_id, group_target) {
                    continue;
                }
                if let Some(track) = cx.nodes.get_mut(&track_id) {
                    let layer = layers.entry(track.type_tag.clone()).or_insert(0);
                    if let NodeData::Track(data) = &mut track.data {
                        data.layer_order = *layer;
                    }
                    *layer += 1;
                }
                self.push_enter(cx.nodes, track_id);
                let track_target = target_of(cx.nodes, track_id);

                for clip_id in children_of(cx.nodes, track_id) {
                    if !self.initialize_node(cx, clip_id, track_target) {
                        continue;
                    }
                    self.push_enter(cx.nodes, clip_id);
                    self.push_exit(clip_id);
                    update_nodes.push(clip_id);
                }
                self.push_exit(track_id);
                update_nodes.push(track_id);
            }
            self.push_exit(group_id);
            update_nodes.push(group_id);
        }

        let nodes = &*cx.nodes;
        let time_of = |p: &TimePointer| {
            nodes.get(&p.node).map_or(0.0, |n| match p.edge {
                Edge::Enter => n.start_time,
                Edge::Exit => n.end_time(),
            })
        };
        self.pointers.sort_by(|a, b| time_of(a).total_cmp(&time_of(b)));

        self.updates = update_nodes
            .iter()
            .filter_map(|id| {
                self.pointers
                    .iter()
                    .position(|p| p.node == *id && p.edge == Edge::Enter)
            })
            .collect();
        self.built = true;

        tracing::debug!(
            pointers = self.pointers.len(),
            nodes = self.behaviours.len(),
            "Built time pointers"
        );
    }

    /// Drop the session: pointers, behaviours and actor copies
    pub fn teardown(&mut self, nodes: &mut NodeArena, scene: &mut dyn SceneBinder) {
        for node in nodes.values_mut() {
            if let NodeData::Group(group) = &mut node.data {
                if let Some(instance) = group.instance.take() {
                    scene.destroy(instance);
                    if let Some(actor) = group.actor {
                        scene.set(actor, &MemberPath::active(), ParamValue::Bool(true));
                    }
                    tracing::debug!(group = %node.id, "Released actor copy");
                }
            }
            node.reset_session();
        }
        self.pointers.clear();
        self.updates.clear();
        self.behaviours.clear();
        self.built = false;
        self.session_enabled = false;
        self.previous_time = 0.0;
    }

    fn push_enter(&mut self, nodes: &NodeArena, node: NodeId) {
        let last_start = nodes.get(&node).map_or(0.0, |n| n.start_time);
        self.pointers.push(TimePointer {
            node,
            edge: Edge::Enter,
            armed: false,
            last_start,
        });
    }

    fn push_exit(&mut self, node: NodeId) {
        self.pointers.push(TimePointer {
            node,
            edge: Edge::Exit,
            armed: false,
            last_start: 0.0,
        });
    }

    /// Resolve the node's target and run its initialize callback.
    ///
    /// Returns `false` when the node is left out of the session.
    fn initialize_node(&mut self, cx: &mut SampleContext<'_>, id: NodeId, parent_target: Option<EntityId>) -> bool {
        let Some(node) = cx.nodes.get_mut(&id) else {
            return false;
        };
        if !node.active {
            return false;
        }
        node.reset_session();

        let mut behaviour = match cx.registry.create(node) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(node = %id, name = %node.name, "Node excluded: {e}");
                return false;
            }
        };
        if !behaviour.is_valid(node) {
            tracing::warn!(node = %id, name = %node.name, "Node excluded: invalid settings");
            return false;
        }

        let target = resolve_target(node, &mut *cx.scene, cx.root, parent_target);
        node.resolved_target = target;
        if target.is_none() && behaviour.requires_target() {
            tracing::warn!(node = %id, name = %node.name, "Node excluded: unresolved target");
            return false;
        }

        let mut ncx = NodeContext::new(node, &mut *cx.scene, cx.root, &mut *cx.requests);
        let result = catch_unwind(AssertUnwindSafe(|| behaviour.initialize(&mut ncx)));
        let included = match result {
            Ok(Ok(included)) => included,
            Ok(Err(e)) => {
                tracing::error!(node = %id, phase = "initialize", "Callback failed: {e}");
                false
            }
            Err(panic) => {
                tracing::error!(
                    node = %id,
                    phase = "initialize",
                    "Callback panicked: {}",
                    panic_message(panic.as_ref())
                );
                false
            }
        };
        if included {
            self.behaviours.insert(id, behaviour);
        }
        included
    }

    fn trigger_forward(&mut self, cx: &mut SampleContext<'_>, index: usize, time: f32, previous: f32) {
        let Some((start, end, length)) = self.range_of(cx.nodes, index) else {
            return;
        };
        let pointer = &mut self.pointers[index];
        let id = pointer.node;
        let edge = pointer.edge;
        match edge {
            Edge::Enter => {
                if time >= start && !pointer.armed {
                    pointer.armed = true;
                    pointer.last_start = start;
                    self.dispatch(cx, id, Callback::Enter);
                    self.dispatch(cx, id, Callback::Update { time: 0.0, previous: 0.0 });
                }
            }
            Edge::Exit => {
                if time >= end && !pointer.armed {
                    pointer.armed = true;
                    let previous = (previous - start).max(0.0);
                    self.dispatch(cx, id, Callback::Update { time: length, previous });
                    self.dispatch(cx, id, Callback::Exit);
                }
            }
        }
    }

    fn trigger_backward(&mut self, cx: &mut SampleContext<'_>, index: usize, time: f32, previous: f32) {
        let Some((start, end, length)) = self.range_of(cx.nodes, index) else {
            return;
        };
        let pointer = &mut self.pointers[index];
        let id = pointer.node;
        let edge = pointer.edge;
        match edge {
            Edge::Enter => {
                if (time < start || time <= 0.0) && pointer.armed {
                    pointer.armed = false;
                    let previous = (previous - start).min(length);
                    self.dispatch(cx, id, Callback::Update { time: 0.0, previous });
                    self.dispatch(cx, id, Callback::Reverse);
                }
            }
            Edge::Exit => {
                if (time < end || time <= 0.0) && pointer.armed {
                    pointer.armed = false;
                    self.dispatch(cx, id, Callback::ReverseEnter);
                    self.dispatch(cx, id, Callback::Update { time: length, previous: length });
                }
            }
        }
    }

    fn update(&mut self, cx: &mut SampleContext<'_>, index: usize, time: f32, previous: f32) {
        let Some((start, end, _)) = self.range_of(cx.nodes, index) else {
            return;
        };
        if !(time >= start && time < end && time > 0.0) {
            return;
        }
        let pointer = &mut self.pointers[index];
        let id = pointer.node;
        let moved = start - pointer.last_start;
        pointer.last_start = start;
        self.dispatch(
            cx,
            id,
            Callback::Update {
                time: time - start,
                previous: previous - start + moved,
            },
        );
    }

    fn range_of(&self, nodes: &NodeArena, index: usize) -> Option<(f32, f32, f32)> {
        let pointer = self.pointers.get(index)?;
        let node = nodes.get(&pointer.node)?;
        Some((node.start_time, node.end_time(), node.length))
    }

    /// Run one callback with failure isolation
    fn dispatch(&mut self, cx: &mut SampleContext<'_>, id: NodeId, callback: Callback) {
        let (Some(behaviour), Some(node)) = (self.behaviours.get_mut(&id), cx.nodes.get_mut(&id)) else {
            return;
        };
        let name = node.name.clone();
        let mut ncx = NodeContext::new(node, &mut *cx.scene, cx.root, &mut *cx.requests);
        let result = catch_unwind(AssertUnwindSafe(|| lifecycle::run(behaviour.as_mut(), &mut ncx, callback)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(node = %id, name = %name, phase = callback.phase(), "Callback failed: {e}");
            }
            Err(panic) => {
                tracing::error!(
                    node = %id,
                    name = %name,
                    phase = callback.phase(),
                    "Callback panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

fn children_of(nodes: &NodeArena, id: NodeId) -> Vec<NodeId> {
    nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default()
}

fn target_of(nodes: &NodeArena, id: NodeId) -> Option<EntityId> {
    nodes.get(&id).and_then(|n| n.resolved_target)
}

/// Resolve a node's target for a session.
///
/// Groups bind their actor (or a session copy of it) and fall back to the
/// root; tracks inherit; clips follow their child path.
fn resolve_target(
    node: &mut DirectableNode,
    scene: &mut dyn SceneBinder,
    root: Option<EntityId>,
    parent_target: Option<EntityId>,
) -> Option<EntityId> {
    let id = node.id;
    match &mut node.data {
        NodeData::Group(group) => {
            let Some(actor) = group.actor else {
                return root;
            };
            if !scene.contains(actor) {
                return None;
            }
            match group.reference_mode {
                ActorReferenceMode::UseOriginal => Some(actor),
                ActorReferenceMode::InstantiateCopy => {
                    if let Some(instance) = group.instance.filter(|i| scene.contains(*i)) {
                        return Some(instance);
                    }
                    let instance = scene.instantiate(actor);
                    match instance {
                        Some(_) => {
                            scene.set(actor, &MemberPath::active(), ParamValue::Bool(false));
                            tracing::debug!(group = %id, "Instantiated actor copy");
                        }
                        None => {
                            tracing::warn!(group = %id, "Scene cannot copy actor; using original");
                        }
                    }
                    group.instance = instance;
                    Some(instance.unwrap_or(actor))
                }
            }
        }
        NodeData::Track(_) => parent_target,
        NodeData::Clip(clip) => {
            let parent = parent_target?;
            scene.resolve(parent, clip.child_path.as_deref())
        }
    }
}

/// Resolve the target a node would bind to, outside of a session
pub(crate) fn preview_target(
    nodes: &NodeArena,
    scene: &dyn SceneBinder,
    root: Option<EntityId>,
    id: NodeId,
) -> Option<EntityId> {
    let node = nodes.get(&id)?;
    if let Some(target) = node.resolved_target {
        return Some(target);
    }
    match &node.data {
        NodeData::Group(group) => match group.actor {
            Some(actor) => scene.contains(actor).then_some(actor),
            None => root,
        },
        NodeData::Track(_) => preview_target(nodes, scene, root, node.parent?),
        NodeData::Clip(clip) => {
            let parent = preview_target(nodes, scene, root, node.parent?)?;
            scene.resolve(parent, clip.child_path.as_deref())
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

