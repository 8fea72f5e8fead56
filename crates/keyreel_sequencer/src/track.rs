// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe tracks bound to transform targets.

use crate::binding::TargetId;
use crate::keyframe::{self, clamp_time, Easing, Keyframe, KeyframeId, Transform};
use serde::{Deserialize, Serialize};

/// Two keyframes closer than this (in seconds) are the same keyframe
pub const KEYFRAME_TOLERANCE: f32 = 0.05;

/// A time-sorted keyframe sequence driving one target.
///
/// Keyframes are always sorted ascending and no two of them lie within
/// [`KEYFRAME_TOLERANCE`] of each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrackData")]
pub struct Track {
    /// Target driven by this track
    pub target: TargetId,
    /// Whether the track is muted
    pub muted: bool,
    keyframes: Vec<Keyframe>,
}

/// Unvalidated serialized form of a track
#[derive(Deserialize)]
struct TrackData {
    target: TargetId,
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    keyframes: Vec<Keyframe>,
}

impl From<TrackData> for Track {
    fn from(data: TrackData) -> Self {
        let mut track = Track::new(data.target);
        track.muted = data.muted;
        for keyframe in data.keyframes {
            track.insert(keyframe);
        }
        track
    }
}

impl Track {
    /// Create an empty track for a target
    pub fn new(target: impl Into<TargetId>) -> Self {
        Self {
            target: target.into(),
            muted: false,
            keyframes: Vec::new(),
        }
    }

    /// Insert or update the keyframe at `time`.
    ///
    /// A keyframe already within tolerance of `time` keeps its id and time and
    /// takes the new transform and easing. Returns the id of the keyframe that
    /// now holds the values.
    pub fn set_keyframe_at(
        &mut self,
        time: f32,
        transform: Transform,
        easing: Option<Easing>,
    ) -> KeyframeId {
        let mut keyframe = Keyframe::new(time, transform);
        keyframe.easing = easing;
        self.insert(keyframe)
    }

    /// Insert a keyframe, merging it into any keyframe within tolerance
    pub fn insert(&mut self, mut keyframe: Keyframe) -> KeyframeId {
        keyframe.time = clamp_time(keyframe.time);
        keyframe.transform = keyframe.transform.sanitized();

        if let Some(idx) = self.index_near(keyframe.time) {
            let existing = &mut self.keyframes[idx];
            existing.transform = keyframe.transform;
            existing.easing = keyframe.easing;
            return existing.id;
        }

        let id = keyframe.id;
        let idx = self.keyframes.partition_point(|k| k.time < keyframe.time);
        self.keyframes.insert(idx, keyframe);
        id
    }

    /// Remove a keyframe
    pub fn remove_keyframe(&mut self, keyframe_id: KeyframeId) -> Option<Keyframe> {
        let idx = self.keyframes.iter().position(|k| k.id == keyframe_id)?;
        Some(self.keyframes.remove(idx))
    }

    /// Move a keyframe to a new time.
    ///
    /// Any other keyframe within tolerance of the destination is replaced by
    /// the moved one. Returns false when the keyframe does not exist.
    pub fn move_keyframe(&mut self, keyframe_id: KeyframeId, new_time: f32) -> bool {
        let Some(mut moved) = self.remove_keyframe(keyframe_id) else {
            return false;
        };
        moved.time = clamp_time(new_time);
        self.keyframes
            .retain(|k| (k.time - moved.time).abs() > KEYFRAME_TOLERANCE);
        let idx = self.keyframes.partition_point(|k| k.time < moved.time);
        self.keyframes.insert(idx, moved);
        true
    }

    /// Replace the transform stored in a keyframe
    pub fn update_transform(&mut self, keyframe_id: KeyframeId, transform: Transform) -> bool {
        match self.keyframes.iter_mut().find(|k| k.id == keyframe_id) {
            Some(keyframe) => {
                keyframe.transform = transform.sanitized();
                true
            }
            None => false,
        }
    }

    /// Change the arriving easing of a keyframe
    pub fn set_easing(&mut self, keyframe_id: KeyframeId, easing: Option<Easing>) -> bool {
        match self.keyframes.iter_mut().find(|k| k.id == keyframe_id) {
            Some(keyframe) => {
                keyframe.easing = easing;
                true
            }
            None => false,
        }
    }

    fn index_near(&self, time: f32) -> Option<usize> {
        self.keyframes
            .iter()
            .enumerate()
            .filter(|(_, k)| (k.time - time).abs() <= KEYFRAME_TOLERANCE)
            .min_by(|(_, a), (_, b)| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
            .map(|(idx, _)| idx)
    }

    /// Keyframe within tolerance of `time`, if any
    pub fn keyframe_near(&self, time: f32) -> Option<&Keyframe> {
        self.index_near(time).map(|idx| &self.keyframes[idx])
    }

    /// Get keyframe by ID
    pub fn keyframe(&self, keyframe_id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.id == keyframe_id)
    }

    /// Time of the closest keyframe strictly before `time`
    pub fn previous_keyframe_time(&self, time: f32) -> Option<f32> {
        self.keyframes
            .iter()
            .rev()
            .map(|k| k.time)
            .find(|t| *t < time - f32::EPSILON)
    }

    /// Time of the closest keyframe strictly after `time`
    pub fn next_keyframe_time(&self, time: f32) -> Option<f32> {
        self.keyframes
            .iter()
            .map(|k| k.time)
            .find(|t| *t > time + f32::EPSILON)
    }

    /// Get keyframes in a time range
    pub fn keyframes_in_range(&self, start: f32, end: f32) -> impl Iterator<Item = &Keyframe> {
        self.keyframes
            .iter()
            .filter(move |k| k.time >= start && k.time <= end)
    }

    /// Evaluate the track at a given time
    pub fn evaluate(&self, time: f32, default_easing: Easing) -> Transform {
        keyframe::interpolate(&self.keyframes, time, default_easing)
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |k| k.time)
    }

    /// Get all keyframes
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Get keyframe count
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether the track has no keyframes
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Remove every keyframe
    pub fn clear(&mut self) {
        self.keyframes.clear();
    }
}
