// SPDX-License-Identifier: MIT OR Apache-2.0
//! The cutscene timeline: node arena, authoring operations and sampling.
//!
//! Playback control lives in [`crate::playback`]; this module owns the
//! tree and the entry point that turns a time into node callbacks.

use crate::binding::{EntityId, SceneBinder};
use crate::directables::{ACTOR_GROUP, DIRECTOR_GROUP};
use crate::error::CutsceneError;
use crate::node::{ActorReferenceMode, DirectableNode, NodeData, NodeId, NodeKind, NodeState};
use crate::playback::{PlaybackEvent, PlaybackRequest, PlaybackState};
use crate::registry::DirectableRegistry;
use crate::scheduler::{preview_target, NodeArena, SampleContext, TimelineScheduler};
use crate::section::{Section, SectionId};
use crate::settings::DirectorContext;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Current timeline format version
pub const TIMELINE_FORMAT_VERSION: u32 = 1;

/// Unique identifier for a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

/// A cutscene: groups of tracks of clips over a fixed length
#[derive(Debug, Serialize, Deserialize)]
pub struct Timeline {
    /// Format version
    pub version: u32,
    /// Unique timeline ID
    pub id: TimelineId,
    /// Timeline name
    pub name: String,
    length: f32,
    /// Root entity; director groups target it and timeline space is relative to it
    #[serde(default)]
    pub root: Option<EntityId>,
    groups: Vec<NodeId>,
    nodes: NodeArena,
    #[serde(skip)]
    pub(crate) playback: PlaybackState,
    #[serde(skip)]
    pub(crate) scheduler: TimelineScheduler,
    #[serde(skip)]
    pub(crate) requests: Vec<PlaybackRequest>,
    #[serde(skip)]
    pub(crate) events: Vec<PlaybackEvent>,
    #[serde(skip)]
    resizing: Option<NodeId>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            version: TIMELINE_FORMAT_VERSION,
            id: TimelineId::new(),
            name: name.into(),
            length: length.max(0.0),
            root: None,
            groups: Vec::new(),
            nodes: NodeArena::new(),
            playback: PlaybackState::default(),
            scheduler: TimelineScheduler::new(),
            requests: Vec::new(),
            events: Vec::new(),
            resizing: None,
        }
    }

    /// Set the root entity
    pub fn with_root(mut self, root: EntityId) -> Self {
        self.root = Some(root);
        self
    }

    /// Timeline length in seconds
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Change the length; groups follow and tracks are trimmed to fit
    pub fn set_length(&mut self, length: f32) {
        self.length = length.max(0.0);
        for node in self.nodes.values_mut() {
            match node.kind() {
                NodeKind::Group => {
                    node.start_time = 0.0;
                    node.length = self.length;
                }
                NodeKind::Track if node.end_time() > self.length => {
                    node.start_time = node.start_time.min(self.length);
                    node.length = self.length - node.start_time;
                    node.clamp_blends();
                }
                _ => {}
            }
        }
    }

    /// Top-level groups in order
    pub fn groups(&self) -> &[NodeId] {
        &self.groups
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> Option<&DirectableNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DirectableNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &DirectableNode> {
        self.nodes.values()
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find the first node with a name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    /// Lifecycle state of a node in the current session
    pub fn node_state(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(&id).map(|n| n.state)
    }

    /// Whether the node takes part in the current session
    pub fn participates(&self, id: NodeId) -> bool {
        self.scheduler.participates(id)
    }

    /// Whether the timeline is inside its open interval
    pub fn is_session_enabled(&self) -> bool {
        self.scheduler.is_session_enabled()
    }

    fn expect_kind(&self, id: NodeId, expected: NodeKind) -> Result<&DirectableNode> {
        let node = self.nodes.get(&id).ok_or(CutsceneError::NodeNotFound(id))?;
        if node.kind() != expected {
            return Err(CutsceneError::WrongNodeKind {
                node: id,
                expected,
                actual: node.kind(),
            });
        }
        Ok(node)
    }

    /// Add a group spanning the whole timeline
    pub fn add_group(&mut self, name: impl Into<String>, type_tag: impl Into<String>) -> NodeId {
        let mut group = DirectableNode::group(name, type_tag);
        group.length = self.length;
        let id = group.id;
        self.groups.push(id);
        self.nodes.insert(id, group);
        id
    }

    /// Add a director group bound to the root
    pub fn add_director_group(&mut self, name: impl Into<String>) -> NodeId {
        self.add_group(name, DIRECTOR_GROUP)
    }

    /// Add an actor group bound to a scene entity
    pub fn add_actor_group(
        &mut self,
        name: impl Into<String>,
        actor: EntityId,
        reference_mode: ActorReferenceMode,
    ) -> NodeId {
        let id = self.add_group(name, ACTOR_GROUP);
        if let Some(group) = self.nodes.get_mut(&id).and_then(|n| n.as_group_mut()) {
            group.actor = Some(actor);
            group.reference_mode = reference_mode;
        }
        id
    }

    /// Add a track spanning the whole timeline to a group
    pub fn add_track(&mut self, group: NodeId, name: impl Into<String>, type_tag: impl Into<String>) -> Result<NodeId> {
        let mut track = DirectableNode::track(name, type_tag);
        track.length = self.length;
        self.add_child(group, track)
    }

    /// Add a clip to a track
    pub fn add_clip(
        &mut self,
        track: NodeId,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        start_time: f32,
        length: f32,
    ) -> Result<NodeId> {
        self.add_child(track, DirectableNode::clip(name, type_tag, start_time, length))
    }

    /// Insert a prepared track under a group, or clip under a track.
    ///
    /// Clips are kept ordered by start time.
    pub fn add_child(&mut self, parent: NodeId, mut node: DirectableNode) -> Result<NodeId> {
        let expected = match node.kind() {
            NodeKind::Group => {
                return Err(CutsceneError::WrongNodeKind {
                    node: node.id,
                    expected: NodeKind::Track,
                    actual: NodeKind::Group,
                })
            }
            NodeKind::Track => NodeKind::Group,
            NodeKind::Clip => NodeKind::Track,
        };
        self.expect_kind(parent, expected)?;

        node.parent = Some(parent);
        node.start_time = node.start_time.max(0.0);
        node.clamp_blends();
        let id = node.id;
        self.nodes.insert(id, node);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        if expected == NodeKind::Track {
            self.sort_clips(parent);
        }
        Ok(id)
    }

    /// Remove a node and its descendants
    pub fn remove_node(&mut self, id: NodeId) -> Result<DirectableNode> {
        let node = self.nodes.shift_remove(&id).ok_or(CutsceneError::NodeNotFound(id))?;
        for child in &node.children {
            if let Err(e) = self.remove_node(*child) {
                tracing::warn!(node = %id, child = %child, "Skipped child while removing node: {e}");
            }
        }
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.groups.retain(|g| *g != id),
        }
        if self.resizing == Some(id) {
            self.resizing = None;
        }
        Ok(node)
    }

    /// Move a clip to a new start time
    pub fn move_clip(&mut self, clip: NodeId, start_time: f32) -> Result<()> {
        self.expect_kind(clip, NodeKind::Clip)?;
        let parent = match self.nodes.get_mut(&clip) {
            Some(node) => {
                node.start_time = start_time.max(0.0);
                node.parent
            }
            None => None,
        };
        if let Some(track) = parent {
            self.sort_clips(track);
        }
        Ok(())
    }

    /// Change a clip's length, keeping blends within it
    pub fn set_clip_length(&mut self, clip: NodeId, length: f32) -> Result<()> {
        self.expect_kind(clip, NodeKind::Clip)?;
        if let Some(node) = self.nodes.get_mut(&clip) {
            node.length = length.max(0.0);
            node.clamp_blends();
        }
        Ok(())
    }

    /// Set a clip's blend-in and blend-out
    pub fn set_clip_blends(&mut self, clip: NodeId, blend_in: f32, blend_out: f32) -> Result<()> {
        self.expect_kind(clip, NodeKind::Clip)?;
        if let Some(node) = self.nodes.get_mut(&clip) {
            node.blend_in = 0.0;
            node.blend_out = 0.0;
            node.set_blend_in(blend_in);
            node.set_blend_out(blend_out);
        }
        Ok(())
    }

    fn sort_clips(&mut self, track: NodeId) {
        let Some(children) = self.nodes.get(&track).map(|t| t.children.clone()) else {
            return;
        };
        let mut sorted: Vec<(NodeId, f32)> = children
            .into_iter()
            .map(|c| (c, self.nodes.get(&c).map_or(0.0, |n| n.start_time)))
            .collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        if let Some(t) = self.nodes.get_mut(&track) {
            t.children = sorted.into_iter().map(|(c, _)| c).collect();
        }
    }

    /// Add a section marker to a group
    pub fn add_section(&mut self, group: NodeId, name: impl Into<String>, time: f32) -> Result<SectionId> {
        self.expect_kind(group, NodeKind::Group)?;
        let section = Section::new(name, time.clamp(0.0, self.length));
        let id = section.id;
        if let Some(g) = self.nodes.get_mut(&group).and_then(|n| n.as_group_mut()) {
            g.sections.push(section);
            g.sections.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        Ok(id)
    }

    /// Remove a section marker
    pub fn remove_section(&mut self, id: SectionId) -> Option<Section> {
        self.nodes
            .values_mut()
            .filter_map(|n| n.as_group_mut())
            .find_map(|g| {
                let idx = g.sections.iter().position(|s| s.id == id)?;
                Some(g.sections.remove(idx))
            })
    }

    /// All sections of all groups, ordered by time
    pub fn sections(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self
            .groups
            .iter()
            .filter_map(|g| self.nodes.get(g).and_then(|n| n.as_group()))
            .flat_map(|g| g.sections.iter())
            .collect();
        sections.sort_by(|a, b| a.time.total_cmp(&b.time));
        sections
    }

    /// Find a section by name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections().into_iter().find(|s| s.name == name)
    }

    /// Suspend cross-blend adjustment of a clip while it is being resized
    pub fn begin_resize(&mut self, clip: NodeId) -> Result<()> {
        self.expect_kind(clip, NodeKind::Clip)?;
        self.resizing = Some(clip);
        Ok(())
    }

    /// Finish a resize and apply cross-blends on the clip's track
    pub fn end_resize(&mut self, registry: &DirectableRegistry) -> Result<()> {
        let Some(clip) = self.resizing.take() else {
            return Ok(());
        };
        match self.nodes.get(&clip).and_then(|n| n.parent) {
            Some(track) => self.apply_cross_blends(registry, track),
            None => Ok(()),
        }
    }

    /// Resolve overlaps between neighbouring clips of a track.
    ///
    /// Two overlapping cross-blendable clips get the overlap as the
    /// earlier clip's blend-out and the later clip's blend-in. Any other
    /// overlap pushes the later clip to the earlier clip's end. A clip
    /// being resized is left alone.
    pub fn apply_cross_blends(&mut self, registry: &DirectableRegistry, track: NodeId) -> Result<()> {
        self.expect_kind(track, NodeKind::Track)?;
        self.sort_clips(track);
        let clips = self.nodes.get(&track).map(|t| t.children.clone()).unwrap_or_default();

        for pair in clips.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if self.resizing == Some(a) || self.resizing == Some(b) {
                continue;
            }
            let (Some(first), Some(second)) = (self.nodes.get(&a), self.nodes.get(&b)) else {
                continue;
            };
            let overlap = first.end_time() - second.start_time;
            if overlap <= 0.0 {
                continue;
            }
            let blendable = registry.is_cross_blendable(&first.type_tag)
                && registry.is_cross_blendable(&second.type_tag);

            if blendable {
                if let Some(first) = self.nodes.get_mut(&a) {
                    first.set_blend_out(overlap);
                }
                if let Some(second) = self.nodes.get_mut(&b) {
                    second.set_blend_in(overlap);
                }
            } else {
                let end = first.end_time();
                if let Some(second) = self.nodes.get_mut(&b) {
                    second.start_time = end;
                }
                tracing::debug!(clip = %b, start = end, "Pushed overlapping clip");
            }
        }
        Ok(())
    }

    /// Restore parent links and drop dangling child ids
    fn relink(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for node in self.nodes.values_mut() {
            node.parent = None;
        }
        for id in ids {
            let children = match self.nodes.get_mut(&id) {
                Some(node) => {
                    let before = node.children.len();
                    node.children.retain(|c| *c != id);
                    if node.children.len() != before {
                        tracing::warn!(node = %id, "Dropped self-referencing child");
                    }
                    node.children.clone()
                }
                None => continue,
            };
            let mut kept = Vec::with_capacity(children.len());
            for child in children {
                match self.nodes.get_mut(&child) {
                    Some(c) => {
                        c.parent = Some(id);
                        kept.push(child);
                    }
                    None => tracing::warn!(node = %id, child = %child, "Dropped dangling child"),
                }
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = kept;
            }
        }
        let nodes = &self.nodes;
        self.groups
            .retain(|g| nodes.get(g).is_some_and(|n| n.kind() == NodeKind::Group));
    }

    /// Rebuild derived structure after edits or loading.
    ///
    /// Rewinds any live session, restores parent links, recomputes
    /// setting-driven clip lengths, keeps groups and tracks inside the
    /// timeline, and applies cross-blends when enabled in settings.
    pub fn revalidate(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder) {
        self.reset(ctx, scene);
        self.relink();

        for node in self.nodes.values_mut() {
            node.parameters.normalize();
            match node.kind() {
                NodeKind::Group => {
                    node.start_time = 0.0;
                    node.length = self.length;
                }
                NodeKind::Track => {
                    node.start_time = node.start_time.clamp(0.0, self.length);
                    node.length = node.length.min(self.length - node.start_time).max(0.0);
                }
                NodeKind::Clip => {
                    let computed = ctx
                        .registry
                        .create(node)
                        .ok()
                        .and_then(|b| b.computed_length(node));
                    if let Some(length) = computed {
                        node.length = length;
                    }
                }
            }
            node.clamp_blends();
        }

        let tracks: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.kind() == NodeKind::Track)
            .map(|n| n.id)
            .collect();
        for track in tracks {
            self.sort_clips(track);
            if ctx.settings.auto_cross_blend {
                if let Err(e) = self.apply_cross_blends(&ctx.registry, track) {
                    tracing::warn!(track = %track, "Cross-blend skipped: {e}");
                }
            }
        }

        tracing::info!(timeline = %self.name, nodes = self.nodes.len(), "Timeline revalidated");
    }

    /// Rewind to time zero and end the session
    pub fn reset(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder) {
        if self.scheduler.is_built() {
            self.sample_inner(ctx, scene, 0.0);
            self.scheduler.teardown(&mut self.nodes, scene);
        }
        let speed = self.playback.speed;
        self.playback = PlaybackState {
            speed,
            ..PlaybackState::default()
        };
        self.requests.clear();
    }

    /// Key every changed parameter value of a node at timeline `time`.
    ///
    /// Returns the number of keyed parameters.
    pub fn key_changed_values(
        &mut self,
        ctx: &DirectorContext,
        scene: &dyn SceneBinder,
        node: NodeId,
        time: f32,
    ) -> Result<usize> {
        let target = preview_target(&self.nodes, scene, self.root, node)
            .ok_or(CutsceneError::UnresolvedTarget(node))?;
        let n = self.nodes.get_mut(&node).ok_or(CutsceneError::NodeNotFound(node))?;
        let local = time - n.start_time;
        let keyed = n
            .parameters
            .try_key_changed_values(scene, target, local, ctx.settings.paired_keying);
        if keyed > 0 {
            tracing::debug!(node = %node, keyed, time = local, "Keyed changed values");
        }
        Ok(keyed)
    }

    /// Target a node binds to, in or outside a session
    pub fn target_of(&self, scene: &dyn SceneBinder, node: NodeId) -> Option<EntityId> {
        preview_target(&self.nodes, scene, self.root, node)
    }

    /// Current time
    pub fn current_time(&self) -> f32 {
        self.playback.current_time
    }

    /// Time of the previous sample
    pub fn previous_time(&self) -> f32 {
        self.scheduler.previous_time()
    }

    /// Sample the timeline at `time`, then apply requests raised by callbacks
    pub fn sample(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, time: f32) {
        self.sample_inner(ctx, scene, time);
        self.apply_requests(ctx, scene);
    }

    pub(crate) fn sample_inner(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, time: f32) {
        let time = time.clamp(0.0, self.length);
        let from = self.playback.current_time;
        self.playback.current_time = time;

        let mut cx = SampleContext {
            nodes: &mut self.nodes,
            groups: &self.groups,
            registry: &ctx.registry,
            scene,
            root: self.root,
            length: self.length,
            requests: &mut self.requests,
        };
        self.scheduler.sample(&mut cx, time);

        if self.playback.is_active && from != time {
            self.record_sections(from, time);
        }
    }

    fn record_sections(&mut self, from: f32, to: f32) {
        let crossed: Vec<String> = self
            .sections()
            .into_iter()
            .filter(|s| {
                if to > from {
                    s.time > from && s.time <= to
                } else {
                    s.time >= to && s.time < from
                }
            })
            .map(|s| s.name.clone())
            .collect();
        self.events
            .extend(crossed.into_iter().map(PlaybackEvent::SectionReached));
    }

    pub(crate) fn apply_requests(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder) {
        for request in std::mem::take(&mut self.requests) {
            match request {
                PlaybackRequest::Stop(mode) => self.stop(ctx, scene, mode),
                PlaybackRequest::Pause => self.pause(),
            }
        }
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self> {
        let mut timeline: Self = ron::from_str(s)?;
        if timeline.version > TIMELINE_FORMAT_VERSION {
            return Err(CutsceneError::UnsupportedVersion {
                found: timeline.version,
                supported: TIMELINE_FORMAT_VERSION,
            });
        }
        timeline.relink();
        for node in timeline.nodes.values_mut() {
            node.parameters.normalize();
        }
        Ok(timeline)
    }

    /// Load a timeline file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let timeline = Self::from_ron(&content)?;
        tracing::info!(path = %path.display(), name = %timeline.name, "Loaded timeline");
        Ok(timeline)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!(path = %path.display(), "Saved timeline");
        Ok(())
    }

    /// Kind-specific data of a node
    pub fn node_data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id).map(|n| &n.data)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Untitled Cutscene", 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{MemberPath, ParameterBinding};
    use crate::directables::{ANIMATE_PROPERTIES, FOLLOW_PATH, PROPERTIES_TRACK, SET_ACTIVE};
    use crate::parameter::AnimatedParameter;
    use crate::testing::{Fixture, PROBE_CLIP};
    use crate::value::{ParamValue, ValueKind};

    fn intensity() -> MemberPath {
        MemberPath::new("Light", "intensity")
    }

    #[test]
    fn test_crossing_order_and_update_args() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 4.0);
        fx.sample(3.0);
        assert_eq!(fx.log_for(clip), vec!["enter", "update 0 0", "update 1 -2"]);

        fx.clear_log();
        fx.sample(7.0);
        assert_eq!(fx.log_for(clip), vec!["update 4 1", "exit"]);

        fx.clear_log();
        fx.sample(5.0);
        assert_eq!(fx.log_for(clip), vec!["reverse_enter", "update 4 4", "update 3 5"]);

        fx.clear_log();
        fx.sample(1.0);
        assert_eq!(fx.log_for(clip), vec!["update 0 3", "reverse"]);
    }

    #[test]
    fn test_parents_enter_before_children() {
        let mut fx = Fixture::new();
        fx.add_probe_hierarchy();
        fx.sample(1.0);
        let log = fx.log();
        let pos = |entry: &str| log.iter().position(|l| l == entry);
        assert!(pos("G enter") < pos("T enter"));
        assert!(pos("T enter") < pos("C enter"));

        fx.clear_log();
        fx.sample(0.0);
        let log = fx.log();
        let pos = |entry: &str| log.iter().position(|l| l == entry);
        assert!(pos("C reverse").is_some());
        assert!(pos("C reverse") < pos("T reverse"));
        assert!(pos("T reverse") < pos("G reverse"));
    }

    #[test]
    fn test_children_exit_before_parents() {
        let mut fx = Fixture::new();
        fx.add_probe_hierarchy();
        fx.sample(10.0);
        let log = fx.log();
        let pos = |entry: &str| log.iter().position(|l| l == entry);
        assert!(pos("C exit").is_some());
        assert!(pos("C exit") < pos("T exit"));
        assert!(pos("T exit") < pos("G exit"));
    }

    #[test]
    fn test_resample_adds_no_crossings() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 4.0);
        fx.sample(3.0);
        fx.clear_log();
        fx.sample(3.0);
        assert!(fx.log_for(clip).iter().all(|l| l.starts_with("update")));

        fx.sample(10.0);
        fx.clear_log();
        fx.sample(10.0);
        assert!(fx.log().is_empty());
    }

    #[test]
    fn test_jump_past_clip_runs_enter_and_exit() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 4.0);
        fx.sample(8.0);
        assert_eq!(
            fx.log_for(clip),
            vec!["enter", "update 0 0", "update 4 0", "exit"]
        );
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Exited));
    }

    #[test]
    fn test_failing_node_does_not_block_others() {
        let mut fx = Fixture::new();
        let bad = fx.add_probe("Fails", 1.0, 2.0);
        let good = fx.add_probe("B", 1.0, 2.0);
        fx.set_failing(bad, "enter");
        fx.sample(2.0);
        assert!(fx.log_for(good).contains(&"enter".to_string()));
        assert!(fx.log_for(bad).contains(&"update 1 -1".to_string()));
    }

    #[test]
    fn test_panicking_node_is_isolated() {
        let mut fx = Fixture::new();
        let bad = fx.add_probe("Panics", 1.0, 2.0);
        let good = fx.add_probe("B", 1.0, 2.0);
        fx.set_panicking(bad, "enter");
        fx.sample(2.0);
        assert!(fx.log_for(good).contains(&"enter".to_string()));
    }

    #[test]
    fn test_scenario_blend_overlap() {
        let mut fx = Fixture::new();
        let a = fx.add_clip(ANIMATE_PROPERTIES, 0.0, 5.0);
        let b = fx.add_clip(ANIMATE_PROPERTIES, 4.0, 4.0);
        fx.timeline.apply_cross_blends(&fx.ctx.registry, fx.track).unwrap();

        let first = fx.timeline.node(a).unwrap();
        let second = fx.timeline.node(b).unwrap();
        assert!((first.blend_out - 1.0).abs() < 1e-5);
        assert!((second.blend_in - 1.0).abs() < 1e-5);
        assert!((first.weight(4.5) - 0.5).abs() < 1e-5);
        assert!((second.weight(0.5) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_non_blendable_overlap_is_pushed_apart() {
        let mut fx = Fixture::new();
        let a = fx.add_clip(SET_ACTIVE, 0.0, 5.0);
        let b = fx.add_clip(ANIMATE_PROPERTIES, 4.0, 4.0);
        fx.timeline.apply_cross_blends(&fx.ctx.registry, fx.track).unwrap();
        assert_eq!(fx.timeline.node(b).unwrap().start_time, 5.0);
        assert_eq!(fx.timeline.node(a).unwrap().blend_out, 0.0);
    }

    #[test]
    fn test_resizing_clip_is_left_alone() {
        let mut fx = Fixture::new();
        let a = fx.add_clip(ANIMATE_PROPERTIES, 0.0, 5.0);
        let b = fx.add_clip(ANIMATE_PROPERTIES, 4.0, 4.0);
        fx.timeline.begin_resize(b).unwrap();
        fx.timeline.apply_cross_blends(&fx.ctx.registry, fx.track).unwrap();
        assert_eq!(fx.timeline.node(a).unwrap().blend_out, 0.0);

        fx.timeline.end_resize(&fx.ctx.registry).unwrap();
        assert!((fx.timeline.node(a).unwrap().blend_out - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_enter_exit_symmetry_restores_scene() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 2.0, 4.0);
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (4.0, 9.0)]);
        let before = fx.scene.get(fx.actor, &intensity());

        for t in [1.0, 3.0, 8.0, 3.0, 1.0] {
            fx.sample(t);
        }
        assert_eq!(fx.scene.get(fx.actor, &intensity()), before);
    }

    #[test]
    fn test_parameters_follow_curves_and_exit_holds_end_value() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 2.0, 4.0);
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (4.0, 9.0)]);

        fx.sample(4.0);
        assert_eq!(fx.scene.get(fx.actor, &intensity()), Some(ParamValue::Float(7.0)));
        fx.sample(9.0);
        assert_eq!(fx.scene.get(fx.actor, &intensity()), Some(ParamValue::Float(9.0)));
    }

    #[test]
    fn test_unresolved_target_excludes_subtree() {
        let mut fx = Fixture::new();
        let ghost = EntityId::new();
        let group = fx.timeline.add_actor_group("Ghost", ghost, ActorReferenceMode::UseOriginal);
        let track = fx.timeline.add_track(group, "Props", PROPERTIES_TRACK).unwrap();
        let clip = fx.timeline.add_clip(track, "Clip", PROBE_CLIP, 0.0, 5.0).unwrap();
        fx.sample(1.0);
        assert!(!fx.timeline.participates(group));
        assert!(!fx.timeline.participates(clip));
        assert!(fx.timeline.participates(fx.group));
    }

    #[test]
    fn test_clip_child_path_resolves_target() {
        let mut fx = Fixture::new();
        let hand = fx.scene.spawn_child(fx.actor, "Hand");
        fx.scene.insert_member(hand, &MemberPath::active(), ParamValue::Bool(true));
        let clip = fx.add_clip(SET_ACTIVE, 1.0, 2.0);
        if let Some(c) = fx.timeline.node_mut(clip) {
            c.settings.insert("active".into(), serde_json::json!(false));
            if let Some(data) = c.as_clip_mut() {
                data.child_path = Some("Hand".into());
            }
        }

        fx.sample(2.0);
        assert_eq!(fx.scene.get(hand, &MemberPath::active()), Some(ParamValue::Bool(false)));
        assert_eq!(fx.scene.get(fx.actor, &MemberPath::active()), Some(ParamValue::Bool(true)));
        fx.sample(0.5);
        assert_eq!(fx.scene.get(hand, &MemberPath::active()), Some(ParamValue::Bool(true)));
    }

    #[test]
    fn test_instantiate_copy_hides_original_for_session() {
        let mut fx = Fixture::new();
        let group = fx
            .timeline
            .add_actor_group("Double", fx.actor, ActorReferenceMode::InstantiateCopy);
        let track = fx.timeline.add_track(group, "Props", PROPERTIES_TRACK).unwrap();
        fx.timeline.add_clip(track, "Clip", ANIMATE_PROPERTIES, 0.0, 5.0).unwrap();
        let entities = fx.scene.entity_count();

        fx.sample(1.0);
        assert_eq!(fx.scene.entity_count(), entities + 1);
        assert_eq!(fx.scene.get(fx.actor, &MemberPath::active()), Some(ParamValue::Bool(false)));
        assert_ne!(fx.timeline.node(group).and_then(|g| g.resolved_target()), Some(fx.actor));

        fx.sample(0.0);
        assert_eq!(fx.scene.entity_count(), entities);
        assert_eq!(fx.scene.get(fx.actor, &MemberPath::active()), Some(ParamValue::Bool(true)));
        assert!(!fx.timeline.is_session_enabled());
    }

    #[test]
    fn test_jump_from_end_to_start_releases_actor_copy() {
        let mut fx = Fixture::new();
        let group = fx
            .timeline
            .add_actor_group("Double", fx.actor, ActorReferenceMode::InstantiateCopy);
        let track = fx.timeline.add_track(group, "Props", PROPERTIES_TRACK).unwrap();
        let clip = fx.timeline.add_clip(track, "Clip", ANIMATE_PROPERTIES, 2.0, 4.0).unwrap();
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (4.0, 9.0)]);
        let entities = fx.scene.entity_count();

        fx.sample(10.0);
        assert_eq!(fx.scene.entity_count(), entities + 1);
        assert_eq!(fx.scene.get(fx.actor, &MemberPath::active()), Some(ParamValue::Bool(false)));

        fx.sample(0.0);
        assert_eq!(fx.scene.entity_count(), entities);
        assert_eq!(fx.scene.get(fx.actor, &MemberPath::active()), Some(ParamValue::Bool(true)));
        assert!(!fx.timeline.scheduler.is_built());
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Idle));

        fx.sample(3.0);
        assert_eq!(fx.scene.entity_count(), entities + 1);
        fx.sample(0.0);
        assert_eq!(fx.scene.entity_count(), entities);
    }

    #[test]
    fn test_session_enable_and_disable() {
        let mut fx = Fixture::new();
        fx.add_probe("A", 2.0, 4.0);
        assert!(!fx.timeline.is_session_enabled());
        fx.sample(1.0);
        assert!(fx.timeline.is_session_enabled());
        fx.sample(10.0);
        assert!(!fx.timeline.is_session_enabled());
    }

    #[test]
    fn test_moved_clip_update_delta() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 6.0);
        fx.sample(3.0);
        fx.timeline.move_clip(clip, 1.0).unwrap();
        fx.clear_log();
        fx.sample(4.0);
        assert_eq!(fx.log_for(clip), vec!["update 3 1"]);
    }

    #[test]
    fn test_key_changed_values_on_external_parameter() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 0.0, 5.0);
        if let Some(c) = fx.timeline.node_mut(clip) {
            c.parameters.add(AnimatedParameter::external(ParameterBinding::property(
                intensity(),
                ValueKind::Float,
            )));
        }
        fx.sample(2.0);
        fx.scene.set(fx.actor, &intensity(), ParamValue::Float(3.0));
        let keyed = fx
            .timeline
            .key_changed_values(&fx.ctx, &fx.scene, clip, 2.0)
            .unwrap();
        assert_eq!(keyed, 1);
        let param = fx.timeline.node(clip).and_then(|c| c.parameters.get(0)).unwrap();
        assert_eq!(param.evaluate(2.0), Some(ParamValue::Float(3.0)));
    }

    #[test]
    fn test_structure_edits() {
        let mut fx = Fixture::new();
        let a = fx.add_clip(ANIMATE_PROPERTIES, 4.0, 1.0);
        let b = fx.add_clip(ANIMATE_PROPERTIES, 1.0, 1.0);
        assert_eq!(fx.timeline.node(fx.track).unwrap().children, vec![b, a]);

        assert!(matches!(
            fx.timeline.add_clip(fx.group, "Bad", ANIMATE_PROPERTIES, 0.0, 1.0),
            Err(CutsceneError::WrongNodeKind { .. })
        ));

        fx.timeline.remove_node(fx.track).unwrap();
        assert!(fx.timeline.node(a).is_none());
        assert!(fx.timeline.node(fx.group).unwrap().children.is_empty());
    }

    #[test]
    fn test_remove_node_with_dangling_child() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 1.0, 1.0);
        if let Some(track) = fx.timeline.node_mut(fx.track) {
            track.children.push(NodeId::new());
        }

        let removed = fx.timeline.remove_node(fx.track).unwrap();
        assert_eq!(removed.children.len(), 2);
        assert!(fx.timeline.node(clip).is_none());
        assert!(fx.timeline.node(fx.group).unwrap().children.is_empty());
    }

    #[test]
    fn test_sections_are_ordered() {
        let mut fx = Fixture::new();
        fx.timeline.add_section(fx.group, "Outro", 8.0).unwrap();
        fx.timeline.add_section(fx.group, "Intro", 1.0).unwrap();
        let names: Vec<&str> = fx.timeline.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Intro", "Outro"]);
        assert!(fx.timeline.section("Outro").is_some());
    }

    #[test]
    fn test_revalidate_uses_computed_length() {
        let mut fx = Fixture::new();
        let node = DirectableNode::clip("Walk", FOLLOW_PATH, 0.0, 1.0)
            .with_setting("path", serde_json::json!([[0.0, 0.0, 0.0], [6.0, 0.0, 0.0]]))
            .with_setting("speed", serde_json::json!(2.0));
        let clip = fx.timeline.add_child(fx.track, node).unwrap();
        fx.timeline.revalidate(&fx.ctx, &mut fx.scene);
        assert_eq!(fx.timeline.node(clip).unwrap().length, 3.0);
    }

    #[test]
    fn test_ron_round_trip_keeps_structure() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 2.0, 4.0);
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (4.0, 9.0)]);
        fx.timeline.add_section(fx.group, "Intro", 1.0).unwrap();

        let ron = fx.timeline.to_ron().unwrap();
        let loaded = Timeline::from_ron(&ron).unwrap();
        assert_eq!(loaded.node_count(), fx.timeline.node_count());
        assert_eq!(loaded.node(clip).and_then(|c| c.parent()), Some(fx.track));
        assert_eq!(loaded.sections().len(), 1);
        let param = loaded.node(clip).and_then(|c| c.parameters.get(0)).unwrap();
        assert_eq!(param.evaluate(2.0), Some(ParamValue::Float(7.0)));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut timeline = Timeline::new("Future", 5.0);
        timeline.version = TIMELINE_FORMAT_VERSION + 1;
        let ron = timeline.to_ron().unwrap();
        assert!(matches!(
            Timeline::from_ron(&ron),
            Err(CutsceneError::UnsupportedVersion { .. })
        ));
    }
}
