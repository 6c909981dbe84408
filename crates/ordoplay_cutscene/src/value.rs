// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animatable value kinds.
//!
//! Every animated parameter drives one of a closed set of value kinds.
//! A value is decomposed into 1-4 scalar components, one per curve, and
//! recomposed after evaluation.

use serde::{Deserialize, Serialize};

/// Magnitude below which two values count as unchanged
pub const CHANGE_THRESHOLD: f32 = 0.01;

/// Kind of value an animated parameter drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// Color (RGBA)
    Color,
}

impl ValueKind {
    /// Number of scalar curves needed to animate this kind
    pub fn curve_count(&self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::Float => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Color => 4,
        }
    }

    /// Neutral value for this kind
    pub fn default_value(&self) -> ParamValue {
        match self {
            Self::Bool => ParamValue::Bool(false),
            Self::Int => ParamValue::Int(0),
            Self::Float => ParamValue::Float(0.0),
            Self::Vec2 => ParamValue::Vec2([0.0; 2]),
            Self::Vec3 => ParamValue::Vec3([0.0; 3]),
            Self::Color => ParamValue::Color([1.0; 4]),
        }
    }
}

/// A value of one of the animatable kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float value
    Float(f32),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// Color (RGBA)
    Color([f32; 4]),
}

impl ParamValue {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Color(_) => ValueKind::Color,
        }
    }

    /// Scalar component `index`, as stored on curve `index`
    pub fn component(&self, index: usize) -> f32 {
        match self {
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int(i) => *i as f32,
            Self::Float(v) => *v,
            Self::Vec2(v) => v.get(index).copied().unwrap_or(0.0),
            Self::Vec3(v) => v.get(index).copied().unwrap_or(0.0),
            Self::Color(v) => v.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Compose a value of `kind` from evaluated curve components.
    ///
    /// Bools switch on at 1.0 and ints truncate toward zero.
    pub fn from_components(kind: ValueKind, components: &[f32]) -> Self {
        let c = |i: usize| components.get(i).copied().unwrap_or(0.0);
        match kind {
            ValueKind::Bool => Self::Bool(c(0) >= 1.0),
            ValueKind::Int => Self::Int(c(0).trunc() as i32),
            ValueKind::Float => Self::Float(c(0)),
            ValueKind::Vec2 => Self::Vec2([c(0), c(1)]),
            ValueKind::Vec3 => Self::Vec3([c(0), c(1), c(2)]),
            ValueKind::Color => Self::Color([c(0), c(1), c(2), c(3)]),
        }
    }

    /// Magnitude of the difference between two values of the same kind.
    ///
    /// Returns `None` on mismatched kinds.
    pub fn difference(&self, other: &ParamValue) -> Option<f32> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(if a == b { 0.0 } else { 1.0 }),
            (Self::Int(a), Self::Int(b)) => Some(a.abs_diff(*b) as f32),
            (Self::Float(a), Self::Float(b)) => Some((a - b).abs()),
            (Self::Vec2(a), Self::Vec2(b)) => Some(distance(a, b)),
            (Self::Vec3(a), Self::Vec3(b)) => Some(distance(a, b)),
            (Self::Color(a), Self::Color(b)) => Some(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y).abs())
                    .fold(0.0, f32::max),
            ),
            _ => None,
        }
    }

    /// Whether `other` differs from this value beyond [`CHANGE_THRESHOLD`]
    pub fn changed_from(&self, other: &ParamValue) -> bool {
        self.difference(other)
            .map_or(true, |d| d > CHANGE_THRESHOLD)
    }

    /// Blend from `self` toward `other` by `t`.
    ///
    /// Bools and ints snap at the halfway point.
    pub fn blend(&self, other: &ParamValue, t: f32) -> ParamValue {
        let t = t.clamp(0.0, 1.0);
        match (self, other) {
            (Self::Bool(_), Self::Bool(_)) | (Self::Int(_), Self::Int(_)) => {
                if t >= 0.5 {
                    *other
                } else {
                    *self
                }
            }
            (Self::Float(a), Self::Float(b)) => Self::Float(lerp(*a, *b, t)),
            (Self::Vec2(a), Self::Vec2(b)) => Self::Vec2([lerp(a[0], b[0], t), lerp(a[1], b[1], t)]),
            (Self::Vec3(a), Self::Vec3(b)) => Self::Vec3([
                lerp(a[0], b[0], t),
                lerp(a[1], b[1], t),
                lerp(a[2], b[2], t),
            ]),
            (Self::Color(a), Self::Color(b)) => Self::Color([
                lerp(a[0], b[0], t),
                lerp(a[1], b[1], t),
                lerp(a[2], b[2], t),
                lerp(a[3], b[3], t),
            ]),
            _ => *other,
        }
    }

    /// Get as float if possible
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as Vec3 if possible
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn distance<const N: usize>(a: &[f32; N], b: &[f32; N]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
