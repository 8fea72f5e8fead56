// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions and the interpolation engine.
//!
//! Everything in this module is pure: the same keyframes, time and easing
//! always produce bit-identical output. Export relies on that to reproduce
//! exactly what was previewed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Smallest scale a keyframe may carry
pub const MIN_SCALE: f32 = 0.01;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Easing applied to the phase between two keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// No reshaping
    #[default]
    Linear,
    /// Quadratic acceleration
    EaseIn,
    /// Quadratic deceleration
    EaseOut,
    /// Accelerate then decelerate
    EaseInOut,
    /// Damped overshoot that settles on the target
    Spring,
}

impl Easing {
    /// Reshape a phase in `[0, 1]`
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::Spring => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                let period = (2.0 * std::f32::consts::PI) / 3.0;
                2f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * period).sin() + 1.0
            }
        }
    }

    /// Kebab-case name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseIn => "ease-in",
            Self::EaseOut => "ease-out",
            Self::EaseInOut => "ease-in-out",
            Self::Spring => "spring",
        }
    }

    /// All supported easings
    pub fn all() -> &'static [Easing] {
        &[
            Self::Linear,
            Self::EaseIn,
            Self::EaseOut,
            Self::EaseInOut,
            Self::Spring,
        ]
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown easing name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown easing: {0}")]
pub struct UnknownEasing(pub String);

impl FromStr for Easing {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|e| e.name() == s)
            .ok_or_else(|| UnknownEasing(s.to_string()))
    }
}

/// Animatable channels of a layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Uniform scale factor, always positive
    pub scale: f32,
    /// Horizontal offset, percent of bounds
    pub offset_x: f32,
    /// Vertical offset, percent of bounds
    pub offset_y: f32,
    /// Rotation in degrees
    pub rotation: f32,
    /// Opacity in percent, `[0, 100]`
    pub opacity: f32,
}

impl Transform {
    /// The transform that leaves a layer untouched
    pub const IDENTITY: Transform = Transform {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        rotation: 0.0,
        opacity: 100.0,
    };

    /// Clamp channels into their valid ranges
    pub fn sanitized(mut self) -> Self {
        if self.scale.is_nan() || self.scale < MIN_SCALE {
            self.scale = MIN_SCALE;
        }
        self.opacity = if self.opacity.is_nan() {
            100.0
        } else {
            self.opacity.clamp(0.0, 100.0)
        };
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A keyframe in a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Unique keyframe ID
    #[serde(default)]
    pub id: KeyframeId,
    /// Time in seconds
    pub time: f32,
    /// Transform at this keyframe
    #[serde(default)]
    pub transform: Transform,
    /// Easing used when arriving at this keyframe
    #[serde(default)]
    pub easing: Option<Easing>,
}

impl Keyframe {
    /// Create a new keyframe, clamping time and channels
    pub fn new(time: f32, transform: Transform) -> Self {
        Self {
            id: KeyframeId::new(),
            time: clamp_time(time),
            transform: transform.sanitized(),
            easing: None,
        }
    }

    /// Set the arriving easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }
}

/// Clamp a keyframe time to be finite and non-negative
pub(crate) fn clamp_time(time: f32) -> f32 {
    if time.is_finite() {
        time.max(0.0)
    } else {
        0.0
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Normalize an angle in degrees into `[0, 360)`
    pub fn normalize_degrees(angle: f32) -> f32 {
        let wrapped = angle.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if wrapped >= 360.0 {
            0.0
        } else {
            wrapped
        }
    }

    /// Interpolate two angles along the shorter arc
    pub fn lerp_degrees(a: f32, b: f32, t: f32) -> f32 {
        let from = Self::normalize_degrees(a);
        let to = Self::normalize_degrees(b);
        let mut delta = to - from;
        if delta > 180.0 {
            delta -= 360.0;
        } else if delta < -180.0 {
            delta += 360.0;
        }
        Self::normalize_degrees(from + delta * t)
    }

    /// Interpolate every channel of two transforms at an eased phase
    pub fn lerp_transform(a: &Transform, b: &Transform, t: f32) -> Transform {
        Transform {
            scale: Self::lerp(a.scale, b.scale, t),
            offset_x: Self::lerp(a.offset_x, b.offset_x, t),
            offset_y: Self::lerp(a.offset_y, b.offset_y, t),
            rotation: Self::lerp_degrees(a.rotation, b.rotation, t),
            opacity: Self::lerp(a.opacity, b.opacity, t),
        }
    }
}

/// Evaluate sorted keyframes at `time`.
///
/// Outside the keyed range the first or last keyframe is held, and a NaN
/// time holds the first keyframe. Between two
/// keyframes the arriving keyframe's easing (or `default_easing`) shapes the
/// phase.
pub fn interpolate(keyframes: &[Keyframe], time: f32, default_easing: Easing) -> Transform {
    let (first, last) = match (keyframes.first(), keyframes.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Transform::IDENTITY,
    };

    if keyframes.len() == 1 || time.is_nan() || time <= first.time {
        return first.transform;
    }
    if time >= last.time {
        return last.transform;
    }

    // First keyframe strictly after `time`; guaranteed in 1..len by the checks above
    let next_idx = keyframes.partition_point(|k| k.time <= time);
    let before = &keyframes[next_idx - 1];
    let after = &keyframes[next_idx];

    let span = after.time - before.time;
    let phase = if span > 0.0 {
        (time - before.time) / span
    } else {
        0.0
    };
    let eased = after.easing.unwrap_or(default_easing).apply(phase);

    Interpolation::lerp_transform(&before.transform, &after.transform, eased)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(time: f32, scale: f32, rotation: f32) -> Keyframe {
        Keyframe::new(
            time,
            Transform {
                scale,
                rotation,
                ..Transform::IDENTITY
            },
        )
    }

    #[test]
    fn test_empty_is_identity() {
        assert_eq!(interpolate(&[], 3.0, Easing::Linear), Transform::IDENTITY);
    }

    #[test]
    fn test_single_keyframe_holds() {
        let keys = vec![key(1.0, 1.7, 370.0)];
        for time in [-1.0, 0.0, 1.0, 5.0] {
            assert_eq!(interpolate(&keys, time, Easing::Spring), keys[0].transform);
        }
    }

    #[test]
    fn test_endpoint_clamping() {
        let keys = vec![key(1.0, 1.0, 10.0), key(2.0, 3.0, 50.0)];
        assert_eq!(interpolate(&keys, 0.0, Easing::Linear), keys[0].transform);
        assert_eq!(interpolate(&keys, 1.0, Easing::Linear), keys[0].transform);
        assert_eq!(interpolate(&keys, 2.0, Easing::Linear), keys[1].transform);
        assert_eq!(interpolate(&keys, 9.0, Easing::Linear), keys[1].transform);
    }

    #[test]
    fn test_rotation_shortest_path() {
        let keys = vec![key(0.0, 1.0, 350.0), key(1.0, 1.0, 10.0)];
        let mid = interpolate(&keys, 0.5, Easing::Linear);
        assert!(mid.rotation.abs() < 1e-4 || (mid.rotation - 360.0).abs() < 1e-4);

        let quarter = interpolate(&keys, 0.25, Easing::Linear);
        assert!((quarter.rotation - 355.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_and_rotation_midpoint() {
        let keys = vec![
            key(0.0, 1.0, 0.0),
            key(1.0, 2.0, 90.0).with_easing(Easing::Linear),
        ];
        let mid = interpolate(&keys, 0.5, Easing::EaseIn);
        assert_eq!(mid.scale, 1.5);
        assert_eq!(mid.rotation, 45.0);
    }

    #[test]
    fn test_arriving_easing_wins() {
        let keys = vec![
            key(0.0, 0.0, 0.0),
            key(1.0, 1.0, 0.0).with_easing(Easing::EaseIn),
        ];
        let mid = interpolate(&keys, 0.5, Easing::Linear);
        // Keyframe::new clamps scale, so the start is MIN_SCALE
        let expected = Interpolation::lerp(MIN_SCALE, 1.0, 0.25);
        assert_eq!(mid.scale, expected);

        let keys = vec![key(0.0, 1.0, 0.0), key(1.0, 2.0, 0.0)];
        let mid = interpolate(&keys, 0.5, Easing::EaseOut);
        assert_eq!(mid.scale, 1.75);
    }

    #[test]
    fn test_deterministic() {
        let keys = vec![
            key(0.0, 1.0, 300.0),
            key(0.7, 2.5, 20.0).with_easing(Easing::Spring),
            key(1.9, 0.5, 190.0).with_easing(Easing::EaseInOut),
        ];
        for i in 0..200 {
            let time = i as f32 * 0.013;
            let a = interpolate(&keys, time, Easing::Linear);
            let b = interpolate(&keys, time, Easing::Linear);
            assert_eq!(a.scale.to_bits(), b.scale.to_bits());
            assert_eq!(a.rotation.to_bits(), b.rotation.to_bits());
            assert_eq!(a.opacity.to_bits(), b.opacity.to_bits());
        }
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in Easing::all() {
            assert_eq!(easing.apply(0.0), 0.0, "{easing}");
            assert_eq!(easing.apply(1.0), 1.0, "{easing}");
        }
        assert_eq!(Easing::EaseInOut.apply(0.25), 0.125);
        assert_eq!(Easing::EaseInOut.apply(0.75), 0.875);
    }

    #[test]
    fn test_spring_overshoots() {
        let peak = (1..100)
            .map(|i| Easing::Spring.apply(i as f32 / 100.0))
            .fold(0.0, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_easing_names_round_trip() {
        for easing in Easing::all() {
            assert_eq!(easing.name().parse::<Easing>(), Ok(*easing));
        }
        assert!("bounce".parse::<Easing>().is_err());
    }

    #[test]
    fn test_unknown_easing_message() {
        let err = "bogus".parse::<Easing>().unwrap_err();
        assert_eq!(err, UnknownEasing("bogus".to_string()));
        assert_eq!(err.to_string(), "unknown easing: bogus");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_nan_time_holds_first() {
        let keys = vec![key(0.0, 1.0, 0.0), key(1.0, 2.0, 90.0), key(2.0, 3.0, 0.0)];
        let value = interpolate(&keys, f32::NAN, Easing::Linear);
        assert_eq!(value, keys[0].transform);
    }

    #[test]
    fn test_keyframe_sanitizes_input() {
        let kf = Keyframe::new(
            -2.0,
            Transform {
                scale: -1.0,
                opacity: 140.0,
                ..Transform::IDENTITY
            },
        );
        assert_eq!(kf.time, 0.0);
        assert_eq!(kf.transform.scale, MIN_SCALE);
        assert_eq!(kf.transform.opacity, 100.0);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(Interpolation::normalize_degrees(-90.0), 270.0);
        assert_eq!(Interpolation::normalize_degrees(720.0), 0.0);
        assert_eq!(Interpolation::normalize_degrees(45.0), 45.0);
    }
}
