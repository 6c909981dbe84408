// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity binding for animated parameters.
//!
//! The cutscene core never touches scene types directly. Targets are
//! addressed by [`EntityId`] and members by [`MemberPath`], and all reads
//! and writes go through a host-provided [`SceneBinder`].

use crate::space::Transform;
use crate::value::{ParamValue, ValueKind};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Entity ID for binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a member on an entity: declaring component plus member name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberPath {
    /// Declaring component type name
    pub component: String,
    /// Member name within the component
    pub member: String,
}

impl MemberPath {
    /// Create a member path
    pub fn new(component: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            member: member.into(),
        }
    }

    /// `Transform.position`
    pub fn position() -> Self {
        Self::new(TRANSFORM_COMPONENT, "position")
    }

    /// `Transform.rotation` (euler degrees)
    pub fn rotation() -> Self {
        Self::new(TRANSFORM_COMPONENT, "rotation")
    }

    /// `Transform.scale`
    pub fn scale() -> Self {
        Self::new(TRANSFORM_COMPONENT, "scale")
    }

    /// `Entity.active`
    pub fn active() -> Self {
        Self::new(ENTITY_COMPONENT, "active")
    }

    /// Key used by flat member stores (`Component.member`)
    pub fn key(&self) -> String {
        format!("{}.{}", self.component, self.member)
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.member)
    }
}

/// Component name for transform members
pub const TRANSFORM_COMPONENT: &str = "Transform";

/// Component name for entity-level members
pub const ENTITY_COMPONENT: &str = "Entity";

/// Whether a bound member is a property (accessor) or a plain field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MemberKind {
    /// Accessor-backed property
    #[default]
    Property,
    /// Plain field
    Field,
}

/// Spatial meaning of a bound member, for transform re-basing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRole {
    /// Position vector
    Position,
    /// Euler rotation in degrees
    Rotation,
}

/// Binding descriptor of one animated parameter.
///
/// The descriptor serializes on its own and stays loadable after the
/// bound member disappears; validity is checked against the binder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    /// Bound member
    pub path: MemberPath,
    /// Child path from the owning node's target, `/` separated
    #[serde(default)]
    pub child_path: Option<String>,
    /// Property or field
    #[serde(default)]
    pub member_kind: MemberKind,
    /// Kind of value driven
    pub value_kind: ValueKind,
}

impl ParameterBinding {
    /// Create a binding to a property on the node's own target
    pub fn property(path: MemberPath, value_kind: ValueKind) -> Self {
        Self {
            path,
            child_path: None,
            member_kind: MemberKind::Property,
            value_kind,
        }
    }

    /// Create a binding to a field on the node's own target
    pub fn field(path: MemberPath, value_kind: ValueKind) -> Self {
        Self {
            member_kind: MemberKind::Field,
            ..Self::property(path, value_kind)
        }
    }

    /// Bind through a child path
    pub fn with_child_path(mut self, child_path: impl Into<String>) -> Self {
        self.child_path = Some(child_path.into());
        self
    }

    /// Spatial role, if this is a transform position or rotation
    pub fn spatial_role(&self) -> Option<SpatialRole> {
        if self.path.component != TRANSFORM_COMPONENT || self.value_kind != ValueKind::Vec3 {
            return None;
        }
        match self.path.member.as_str() {
            "position" | "localPosition" => Some(SpatialRole::Position),
            "rotation" | "localRotation" | "eulerAngles" => Some(SpatialRole::Rotation),
            _ => None,
        }
    }

    /// Resolve the entity this binding writes to
    pub fn resolve(&self, scene: &dyn SceneBinder, target: EntityId) -> Option<EntityId> {
        match self.child_path.as_deref() {
            None | Some("") => Some(target),
            Some(path) => scene.resolve(target, Some(path)),
        }
    }

    /// Whether the bound member still exists with the expected kind.
    ///
    /// Stale bindings (renamed members, missing children) report `false`.
    pub fn is_valid(&self, scene: &dyn SceneBinder, target: EntityId) -> bool {
        self.resolve(scene, target)
            .and_then(|entity| scene.member_kind(entity, &self.path))
            .is_some_and(|kind| kind == self.value_kind)
    }

    /// Display label (`Child/Path.Component.member`)
    pub fn label(&self) -> String {
        match self.child_path.as_deref() {
            Some(path) if !path.is_empty() => format!("{path}.{}", self.path),
            _ => self.path.to_string(),
        }
    }
}

/// Host scene access consumed by the cutscene core.
///
/// All calls happen synchronously inside the host's frame tick.
pub trait SceneBinder {
    /// Resolve an entity relative to `entity` by a `/` separated child path
    fn resolve(&self, entity: EntityId, child_path: Option<&str>) -> Option<EntityId>;

    /// Read a member value
    fn get(&self, entity: EntityId, member: &MemberPath) -> Option<ParamValue>;

    /// Write a member value; returns `false` if the member cannot be written
    fn set(&mut self, entity: EntityId, member: &MemberPath, value: ParamValue) -> bool;

    /// Kind of a member, or `None` if it does not exist
    fn member_kind(&self, entity: EntityId, member: &MemberPath) -> Option<ValueKind> {
        self.get(entity, member).map(|v| v.kind())
    }

    /// Whether the entity exists
    fn contains(&self, entity: EntityId) -> bool;

    /// Create a copy of an entity for `InstantiateCopy` actor groups
    fn instantiate(&mut self, _entity: EntityId) -> Option<EntityId> {
        None
    }

    /// Destroy an entity created by [`SceneBinder::instantiate`]
    fn destroy(&mut self, _entity: EntityId) {}

    /// World transform of an entity, read from its transform members
    fn world_transform(&self, entity: EntityId) -> Option<Transform> {
        let position = self.get(entity, &MemberPath::position())?.as_vec3()?;
        let rotation = self
            .get(entity, &MemberPath::rotation())
            .and_then(|v| v.as_vec3())
            .map_or(Quat::IDENTITY, euler_to_quat);
        let scale = self
            .get(entity, &MemberPath::scale())
            .and_then(|v| v.as_vec3())
            .map_or(Vec3::ONE, Vec3::from);
        Some(Transform {
            position: Vec3::from(position),
            rotation,
            scale,
        })
    }
}

/// Convert euler degrees to a rotation
pub fn euler_to_quat(degrees: [f32; 3]) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        degrees[1].to_radians(),
        degrees[0].to_radians(),
        degrees[2].to_radians(),
    )
}

/// Convert a rotation to euler degrees
pub fn quat_to_euler(rotation: Quat) -> [f32; 3] {
    let (y, x, z) = rotation.to_euler(EulerRot::YXZ);
    [x.to_degrees(), y.to_degrees(), z.to_degrees()]
}
