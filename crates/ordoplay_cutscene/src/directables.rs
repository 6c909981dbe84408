// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in directable kinds.

use crate::binding::MemberPath;
use crate::directable::{read_setting, Directable, NodeContext};
use crate::error::CutsceneError;
use crate::node::{DirectableNode, NodeKind};
use crate::registry::{DirectableKind, DirectableRegistry};
use crate::space::{Transform, TransformSpace};
use crate::value::ParamValue;
use crate::Result;
use glam::Vec3;

/// Group bound to the timeline root
pub const DIRECTOR_GROUP: &str = "director";
/// Group bound to an actor entity
pub const ACTOR_GROUP: &str = "actor";
/// Track holding action clips
pub const ACTION_TRACK: &str = "action";
/// Track animating its target's members
pub const PROPERTIES_TRACK: &str = "properties";
/// Clip animating its target's members
pub const ANIMATE_PROPERTIES: &str = "animate_properties";
/// Clip toggling its target's active flag
pub const SET_ACTIVE: &str = "set_active";
/// Clip moving its target along a polyline
pub const FOLLOW_PATH: &str = "follow_path";

/// Register every built-in kind
pub fn register_builtins(registry: &mut DirectableRegistry) {
    registry.register(DirectableKind::new(DIRECTOR_GROUP, "Director", NodeKind::Group, |_| {
        Ok(Box::new(Passive { requires_target: false }))
    }));
    registry.register(DirectableKind::new(ACTOR_GROUP, "Actor", NodeKind::Group, |_| {
        Ok(Box::new(Passive { requires_target: true }))
    }));
    registry.register(DirectableKind::new(ACTION_TRACK, "Action Track", NodeKind::Track, |_| {
        Ok(Box::new(Passive { requires_target: false }))
    }));
    registry.register(DirectableKind::new(PROPERTIES_TRACK, "Properties Track", NodeKind::Track, |_| {
        Ok(Box::new(Passive { requires_target: true }))
    }));
    registry.register(
        DirectableKind::new(ANIMATE_PROPERTIES, "Animate Properties", NodeKind::Clip, |_| {
            Ok(Box::new(Passive { requires_target: true }))
        })
        .cross_blendable(),
    );
    registry.register(DirectableKind::new(SET_ACTIVE, "Set Active", NodeKind::Clip, |node| {
        Ok(Box::new(SetActive::from_node(node)?))
    }));
    registry.register(DirectableKind::new(FOLLOW_PATH, "Follow Path", NodeKind::Clip, |node| {
        Ok(Box::new(FollowPath::from_node(node)?))
    }));
}

/// Behaviour with no work of its own; parameters still animate
struct Passive {
    requires_target: bool,
}

impl Directable for Passive {
    fn requires_target(&self) -> bool {
        self.requires_target
    }
}

/// Sets `Entity.active` on enter, restores it on reverse
struct SetActive {
    active: bool,
    revert_on_exit: bool,
    previous: Option<bool>,
}

impl SetActive {
    fn from_node(node: &DirectableNode) -> Result<Self> {
        Ok(Self {
            active: read_setting(node, "active")?.unwrap_or(true),
            revert_on_exit: read_setting(node, "revert_on_exit")?.unwrap_or(false),
            previous: None,
        })
    }

    fn write(cx: &mut NodeContext<'_>, active: bool) -> Result<()> {
        let target = cx
            .target()
            .ok_or(CutsceneError::UnresolvedTarget(cx.node.id))?;
        if cx.scene.set(target, &MemberPath::active(), ParamValue::Bool(active)) {
            Ok(())
        } else {
            Err(CutsceneError::BindingInvalid(MemberPath::active().to_string()))
        }
    }

    fn restore(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        match self.previous {
            Some(previous) => Self::write(cx, previous),
            None => Ok(()),
        }
    }
}

impl Directable for SetActive {
    fn on_enter(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.previous = cx
            .target()
            .and_then(|t| cx.scene.get(t, &MemberPath::active()))
            .and_then(|v| v.as_bool());
        Self::write(cx, self.active)
    }

    fn on_exit(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        if self.revert_on_exit {
            self.restore(cx)?;
        }
        Ok(())
    }

    fn on_reverse_enter(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        if self.revert_on_exit {
            Self::write(cx, self.active)?;
        }
        Ok(())
    }

    fn on_reverse(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        self.restore(cx)
    }
}

/// Moves the target's position along a polyline at constant speed
struct FollowPath {
    points: Vec<Vec3>,
    speed: f32,
    origin: Transform,
    snapshot: Option<ParamValue>,
}

impl FollowPath {
    fn from_node(node: &DirectableNode) -> Result<Self> {
        let points: Vec<[f32; 3]> = read_setting(node, "path")?.unwrap_or_default();
        Ok(Self {
            points: points.into_iter().map(Vec3::from).collect(),
            speed: read_setting(node, "speed")?.unwrap_or(1.0),
            origin: Transform::IDENTITY,
            snapshot: None,
        })
    }

    fn path_length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point at `distance` along the path, clamped to its ends
    fn point_at(&self, distance: f32) -> Vec3 {
        let mut remaining = distance.max(0.0);
        for w in self.points.windows(2) {
            let segment = w[0].distance(w[1]);
            if remaining <= segment {
                let t = if segment > 0.0 { remaining / segment } else { 0.0 };
                return w[0].lerp(w[1], t);
            }
            remaining -= segment;
        }
        self.points.last().copied().unwrap_or(Vec3::ZERO)
    }
}

impl Directable for FollowPath {
    fn is_valid(&self, _node: &DirectableNode) -> bool {
        self.points.len() >= 2 && self.speed > 0.0
    }

    fn computed_length(&self, _node: &DirectableNode) -> Option<f32> {
        (self.points.len() >= 2 && self.speed > 0.0).then(|| self.path_length() / self.speed)
    }

    fn on_enter(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        let space = cx.node.as_clip().map_or(TransformSpace::World, |c| c.space);
        self.origin = cx.space_transform(space);
        self.snapshot = cx.target().and_then(|t| cx.scene.get(t, &MemberPath::position()));
        Ok(())
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>, time: f32, _previous_time: f32) -> Result<()> {
        let target = cx
            .target()
            .ok_or(CutsceneError::UnresolvedTarget(cx.node.id))?;
        let position = self.origin.transform_point(self.point_at(time * self.speed));
        if !cx.scene.set(target, &MemberPath::position(), ParamValue::Vec3(position.to_array())) {
            return Err(CutsceneError::BindingInvalid(MemberPath::position().to_string()));
        }
        Ok(())
    }

    fn on_reverse(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        if let (Some(target), Some(snapshot)) = (cx.target(), self.snapshot) {
            cx.scene.set(target, &MemberPath::position(), snapshot);
        }
        Ok(())
    }
}
