// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for unit tests.

use crate::binding::{EntityId, MemberPath, ParameterBinding, SceneBinder};
use crate::directable::{Directable, NodeContext};
use crate::directables::PROPERTIES_TRACK;
use crate::error::CutsceneError;
use crate::node::{ActorReferenceMode, NodeId, NodeKind};
use crate::parameter::AnimatedParameter;
use crate::playback::StopMode;
use crate::registry::DirectableKind;
use crate::scene::MemoryScene;
use crate::settings::{DirectorContext, SequencerSettings};
use crate::timeline::Timeline;
use crate::value::{ParamValue, ValueKind};
use crate::Result;
use std::cell::RefCell;
use std::rc::Rc;

pub const PROBE_GROUP: &str = "probe_group";
pub const PROBE_TRACK: &str = "probe_track";
pub const PROBE_CLIP: &str = "probe_clip";

#[derive(Clone, Copy, PartialEq)]
enum Fault {
    Error,
    Panic,
    Stop(StopMode),
}

type Log = Rc<RefCell<Vec<String>>>;
type Faults = Rc<RefCell<Vec<(String, &'static str, Fault)>>>;

/// Records every callback as `"<name> <event>"`
struct Probe {
    name: String,
    log: Log,
    faults: Faults,
}

impl Probe {
    fn record(&self, cx: &mut NodeContext<'_>, phase: &'static str, entry: String) -> Result<()> {
        self.log.borrow_mut().push(format!("{} {entry}", self.name));
        let fault = self
            .faults
            .borrow()
            .iter()
            .find(|(name, p, _)| *name == self.name && *p == phase)
            .map(|(_, _, f)| *f);
        match fault {
            Some(Fault::Error) => Err(CutsceneError::callback(cx.node.id, phase, "probe failure")),
            Some(Fault::Panic) => panic!("probe panic"),
            Some(Fault::Stop(mode)) => {
                cx.request_stop(mode);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Directable for Probe {
    fn requires_target(&self) -> bool {
        false
    }

    fn on_enter(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.record(cx, "enter", "enter".into())
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>, time: f32, previous_time: f32) -> Result<()> {
        self.record(cx, "update", format!("update {time} {previous_time}"))
    }

    fn on_exit(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.record(cx, "exit", "exit".into())
    }

    fn on_reverse_enter(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.record(cx, "reverse_enter", "reverse_enter".into())
    }

    fn on_reverse(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.record(cx, "reverse", "reverse".into())
    }
}

/// A scene with one actor and a timeline with an actor group and
/// properties track bound to it
pub struct Fixture {
    pub ctx: DirectorContext,
    pub scene: MemoryScene,
    pub timeline: Timeline,
    pub actor: EntityId,
    pub group: NodeId,
    pub track: NodeId,
    log: Log,
    faults: Faults,
    clips: usize,
}

impl Fixture {
    pub fn new() -> Self {
        let log: Log = Rc::default();
        let faults: Faults = Rc::default();
        let mut ctx = DirectorContext::new(SequencerSettings::default());
        for (tag, kind) in [
            (PROBE_GROUP, NodeKind::Group),
            (PROBE_TRACK, NodeKind::Track),
            (PROBE_CLIP, NodeKind::Clip),
        ] {
            let (log, faults) = (log.clone(), faults.clone());
            ctx.registry.register(DirectableKind::new(tag, tag, kind, move |node| {
                Ok(Box::new(Probe {
                    name: node.name.clone(),
                    log: log.clone(),
                    faults: faults.clone(),
                }))
            }));
        }

        let mut scene = MemoryScene::new();
        let actor = scene.spawn("Hero");
        scene.insert_member(actor, &MemberPath::new("Light", "intensity"), ParamValue::Float(1.0));
        scene.insert_member(actor, &MemberPath::position(), ParamValue::Vec3([0.0; 3]));

        let mut timeline = Timeline::new("Test", 10.0);
        let group = timeline.add_actor_group("Hero", actor, ActorReferenceMode::UseOriginal);
        let track = timeline
            .add_track(group, "Props", PROPERTIES_TRACK)
            .unwrap_or(group);

        Self {
            ctx,
            scene,
            timeline,
            actor,
            group,
            track,
            log,
            faults,
            clips: 0,
        }
    }

    /// Add a probe clip to the fixture track
    pub fn add_probe(&mut self, name: &str, start: f32, length: f32) -> NodeId {
        self.timeline
            .add_clip(self.track, name, PROBE_CLIP, start, length)
            .unwrap()
    }

    /// Add a clip of any kind to the fixture track
    pub fn add_clip(&mut self, tag: &str, start: f32, length: f32) -> NodeId {
        self.clips += 1;
        let name = format!("Clip{}", self.clips);
        self.timeline.add_clip(self.track, name, tag, start, length).unwrap()
    }

    /// Add a probe group `G` holding probe track `T` holding probe clip `C`,
    /// all spanning the whole timeline
    pub fn add_probe_hierarchy(&mut self) -> (NodeId, NodeId, NodeId) {
        let g = self.timeline.add_group("G", PROBE_GROUP);
        let t = self.timeline.add_track(g, "T", PROBE_TRACK).unwrap();
        let c = self.timeline.add_clip(t, "C", PROBE_CLIP, 0.0, 10.0).unwrap();
        (g, t, c)
    }

    /// Animate `Light.intensity` on a clip through `(time, value)` keys
    pub fn add_intensity_keys(&mut self, clip: NodeId, keys: &[(f32, f32)]) {
        let mut param = AnimatedParameter::new(ParameterBinding::property(
            MemberPath::new("Light", "intensity"),
            ValueKind::Float,
        ));
        for (time, value) in keys {
            param.set_key(*time, ParamValue::Float(*value));
        }
        if let Some(node) = self.timeline.node_mut(clip) {
            node.parameters.add(param);
        }
    }

    pub fn intensity(&self) -> Option<ParamValue> {
        self.scene.get(self.actor, &MemberPath::new("Light", "intensity"))
    }

    pub fn sample(&mut self, time: f32) {
        self.timeline.sample(&self.ctx, &mut self.scene, time);
    }

    pub fn tick(&mut self, dt: f32) {
        self.timeline.tick(&self.ctx, &mut self.scene, dt);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Events recorded for one node, without the name prefix
    pub fn log_for(&self, node: NodeId) -> Vec<String> {
        let Some(name) = self.timeline.node(node).map(|n| format!("{} ", n.name)) else {
            return Vec::new();
        };
        self.log
            .borrow()
            .iter()
            .filter_map(|l| l.strip_prefix(&name).map(str::to_string))
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    fn add_fault(&self, node: NodeId, phase: &'static str, fault: Fault) {
        if let Some(n) = self.timeline.node(node) {
            self.faults.borrow_mut().push((n.name.clone(), phase, fault));
        }
    }

    pub fn set_failing(&self, node: NodeId, phase: &'static str) {
        self.add_fault(node, phase, Fault::Error);
    }

    pub fn set_panicking(&self, node: NodeId, phase: &'static str) {
        self.add_fault(node, phase, Fault::Panic);
    }

    pub fn set_stopping(&self, node: NodeId, phase: &'static str, mode: StopMode) {
        self.add_fault(node, phase, Fault::Stop(mode));
    }
}
