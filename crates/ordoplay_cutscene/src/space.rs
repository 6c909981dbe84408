// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform spaces for directable nodes.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Space in which a node's spatial values are authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransformSpace {
    /// Scene world space
    #[default]
    World,
    /// Relative to the timeline's root entity
    TimelineSpace,
    /// Relative to the node's resolved target entity
    EntitySpace,
}

/// Position, rotation and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
    /// Non-uniform scale
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Transform a point from this space into its parent space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    /// Transform a point from the parent space into this space
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let scale = Vec3::new(
            non_zero(self.scale.x),
            non_zero(self.scale.y),
            non_zero(self.scale.z),
        );
        (self.rotation.inverse() * (point - self.position)) / scale
    }

    /// Compose a local rotation with this space's rotation
    pub fn transform_rotation(&self, rotation: Quat) -> Quat {
        self.rotation * rotation
    }

    /// Express a parent-space rotation in this space
    pub fn inverse_transform_rotation(&self, rotation: Quat) -> Quat {
        self.rotation.inverse() * rotation
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn non_zero(v: f32) -> f32 {
    if v.abs() < f32::EPSILON {
        1.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_round_trip() {
        let t = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let local = Vec3::new(1.0, 0.0, 0.0);
        let world = t.transform_point(local);
        assert!((world - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-4);
        assert!((t.inverse_transform_point(world) - local).length() < 1e-4);
    }
}
