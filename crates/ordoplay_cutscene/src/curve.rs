// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar keyframe curves.
//!
//! Animated parameters drive one curve per value component. Keys are
//! kept sorted by time, and setting a key close to an existing one moves
//! that key instead of adding a duplicate.

use serde::{Deserialize, Serialize};

/// Keys closer than this (seconds) are treated as the same key
pub const KEY_PROXIMITY: f32 = 0.05;

/// Policy applied when time runs past a range boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WrapMode {
    /// Clamp to the boundary
    #[default]
    Once,
    /// Restart from the opposite boundary
    Loop,
    /// Bounce back and forth
    PingPong,
}

/// Interpolation mode between keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Constant (step)
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Hermite interpolation with authored tangents
    Bezier,
    /// Auto-smooth tangents from neighbouring keys
    Auto,
}

/// A key on a scalar curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Time in seconds, local to the owning node
    pub time: f32,
    /// Value at this key
    pub value: f32,
    /// Interpolation mode to the next key
    #[serde(default)]
    pub interpolation: InterpolationMode,
    /// Incoming slope for bezier interpolation
    #[serde(default)]
    pub in_tangent: f32,
    /// Outgoing slope for bezier interpolation
    #[serde(default)]
    pub out_tangent: f32,
}

impl CurveKey {
    /// Create a new key
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            interpolation: InterpolationMode::Linear,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }

    /// Set tangents for bezier interpolation
    pub fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Hermite spline interpolation
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }

    /// Map `time` into `[start, end]` according to a wrap mode
    pub fn wrap_time(time: f32, start: f32, end: f32, mode: WrapMode) -> f32 {
        let span = end - start;
        if span <= f32::EPSILON {
            return start;
        }
        match mode {
            WrapMode::Once => time.clamp(start, end),
            WrapMode::Loop => start + (time - start).rem_euclid(span),
            WrapMode::PingPong => {
                let t = (time - start).rem_euclid(span * 2.0);
                if t > span {
                    start + span * 2.0 - t
                } else {
                    start + t
                }
            }
        }
    }
}

/// A scalar curve made of sorted keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    /// Create an empty curve
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys, sorted by time
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Get key count
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    fn index_near(&self, time: f32) -> Option<usize> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| (k.time - time).abs() < KEY_PROXIMITY)
            .min_by(|(_, a), (_, b)| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
            .map(|(i, _)| i)
    }

    /// Insert or update the key at `time`.
    ///
    /// A key within [`KEY_PROXIMITY`] is moved to `time` and takes the new
    /// value; its interpolation and tangents are kept.
    pub fn set_key(&mut self, time: f32, value: f32, mode: InterpolationMode) {
        if let Some(idx) = self.index_near(time) {
            let key = &mut self.keys[idx];
            key.time = time;
            key.value = value;
        } else {
            self.keys.push(CurveKey::new(time, value).with_interpolation(mode));
        }
        self.sort_keys();
    }

    /// Remove the key nearest `time`, if one lies within proximity
    pub fn remove_key(&mut self, time: f32) -> bool {
        match self.index_near(time) {
            Some(idx) => {
                self.keys.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether a key exists near `time`
    pub fn has_key(&self, time: f32) -> bool {
        self.index_near(time).is_some()
    }

    /// Time of the first key after `time`
    pub fn key_next(&self, time: f32) -> Option<f32> {
        self.keys
            .iter()
            .map(|k| k.time)
            .find(|t| *t > time + f32::EPSILON)
    }

    /// Time of the last key before `time`
    pub fn key_previous(&self, time: f32) -> Option<f32> {
        self.keys
            .iter()
            .rev()
            .map(|k| k.time)
            .find(|t| *t < time - f32::EPSILON)
    }

    /// Evaluate the curve at `time`.
    ///
    /// `pre` applies before the first key and `post` after the last one.
    /// Returns `None` when the curve has no keys.
    pub fn evaluate(&self, time: f32, pre: WrapMode, post: WrapMode) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if self.keys.len() == 1 {
            return Some(first.value);
        }

        let time = if time < first.time {
            Interpolation::wrap_time(time, first.time, last.time, pre)
        } else if time > last.time {
            Interpolation::wrap_time(time, first.time, last.time, post)
        } else {
            time
        };

        // First key strictly after `time`
        let next_idx = self.keys.partition_point(|k| k.time <= time);
        match next_idx {
            0 => Some(first.value),
            idx if idx >= self.keys.len() => Some(last.value),
            idx => Some(self.interpolate_segment(idx - 1, time)),
        }
    }

    fn interpolate_segment(&self, idx: usize, time: f32) -> f32 {
        let a = &self.keys[idx];
        let b = &self.keys[idx + 1];
        let dt = b.time - a.time;
        if dt.abs() < 0.0001 {
            return b.value;
        }
        let t = (time - a.time) / dt;

        match a.interpolation {
            InterpolationMode::Constant => a.value,
            InterpolationMode::Linear => Interpolation::lerp(a.value, b.value, t),
            InterpolationMode::Bezier => {
                Interpolation::hermite(a.value, a.out_tangent * dt, b.value, b.in_tangent * dt, t)
            }
            InterpolationMode::Auto => {
                let m0 = self.auto_tangent(idx);
                let m1 = self.auto_tangent(idx + 1);
                Interpolation::hermite(a.value, m0 * dt, b.value, m1 * dt, t)
            }
        }
    }

    fn auto_tangent(&self, idx: usize) -> f32 {
        let prev = if idx > 0 { &self.keys[idx - 1] } else { &self.keys[idx] };
        let next = self.keys.get(idx + 1).unwrap_or(&self.keys[idx]);
        let dt = next.time - prev.time;
        if dt.abs() < 0.0001 {
            0.0
        } else {
            (next.value - prev.value) / dt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_empty_curve_has_no_value() {
        let curve = Curve::new();
        assert!(curve.evaluate(1.0, WrapMode::Once, WrapMode::Once).is_none());
    }

    #[test]
    fn test_set_key_then_evaluate() {
        for mode in [
            InterpolationMode::Constant,
            InterpolationMode::Linear,
            InterpolationMode::Bezier,
            InterpolationMode::Auto,
        ] {
            let mut curve = Curve::new();
            curve.set_key(0.0, 1.0, mode);
            curve.set_key(1.5, -3.0, mode);
            curve.set_key(4.0, 7.25, mode);
            let value = curve.evaluate(1.5, WrapMode::Once, WrapMode::Once);
            assert!(approx(value.unwrap_or(f32::NAN), -3.0), "{mode:?}");
        }
    }

    #[test]
    fn test_key_proximity_merge() {
        let mut curve = Curve::new();
        curve.set_key(1.0, 2.0, InterpolationMode::Linear);
        curve.set_key(1.03, 5.0, InterpolationMode::Linear);
        assert_eq!(curve.len(), 1);
        assert!(approx(curve.keys()[0].time, 1.03));
        assert!(approx(curve.keys()[0].value, 5.0));

        curve.set_key(1.2, 1.0, InterpolationMode::Linear);
        assert_eq!(curve.len(), 2);
    }

    #[test]
    fn test_linear_and_constant() {
        let mut curve = Curve::new();
        curve.set_key(0.0, 0.0, InterpolationMode::Linear);
        curve.set_key(2.0, 10.0, InterpolationMode::Linear);
        assert!(approx(curve.evaluate(1.0, WrapMode::Once, WrapMode::Once).unwrap_or(0.0), 5.0));

        let mut step = Curve::new();
        step.set_key(0.0, 0.0, InterpolationMode::Constant);
        step.set_key(2.0, 10.0, InterpolationMode::Constant);
        assert!(approx(step.evaluate(1.9, WrapMode::Once, WrapMode::Once).unwrap_or(-1.0), 0.0));
    }

    #[test]
    fn test_wrap_modes() {
        let mut curve = Curve::new();
        curve.set_key(0.0, 0.0, InterpolationMode::Linear);
        curve.set_key(1.0, 1.0, InterpolationMode::Linear);

        let once = curve.evaluate(1.25, WrapMode::Once, WrapMode::Once).unwrap_or(0.0);
        let looped = curve.evaluate(1.25, WrapMode::Once, WrapMode::Loop).unwrap_or(0.0);
        let pingpong = curve.evaluate(1.25, WrapMode::Once, WrapMode::PingPong).unwrap_or(0.0);
        assert!(approx(once, 1.0));
        assert!(approx(looped, 0.25));
        assert!(approx(pingpong, 0.75));

        let pre = curve.evaluate(-0.25, WrapMode::Loop, WrapMode::Once).unwrap_or(0.0);
        assert!(approx(pre, 0.75));
    }

    #[test]
    fn test_next_previous() {
        let mut curve = Curve::new();
        curve.set_key(1.0, 0.0, InterpolationMode::Linear);
        curve.set_key(2.0, 0.0, InterpolationMode::Linear);
        curve.set_key(3.0, 0.0, InterpolationMode::Linear);

        assert_eq!(curve.key_next(2.0), Some(3.0));
        assert_eq!(curve.key_previous(2.0), Some(1.0));
        assert_eq!(curve.key_next(3.0), None);
        assert_eq!(curve.key_previous(0.5), None);

        assert!(curve.remove_key(2.02));
        assert!(!curve.has_key(2.0));
    }
}
