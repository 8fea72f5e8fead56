// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline owning the tracks of one animation.

use crate::binding::{TargetId, TransformTargets};
use crate::keyframe::{Easing, KeyframeId};
use crate::track::Track;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest duration a timeline may have, in seconds
pub const MIN_DURATION: f32 = 0.1;

/// Supported output frame rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    /// 12 frames per second
    Fps12,
    /// 15 frames per second
    Fps15,
    /// 24 frames per second
    #[default]
    Fps24,
    /// 30 frames per second
    Fps30,
    /// 60 frames per second
    Fps60,
}

impl FrameRate {
    /// Frames per second
    pub fn per_second(&self) -> u32 {
        match self {
            Self::Fps12 => 12,
            Self::Fps15 => 15,
            Self::Fps24 => 24,
            Self::Fps30 => 30,
            Self::Fps60 => 60,
        }
    }

    /// All supported rates
    pub fn all() -> &'static [FrameRate] {
        &[
            Self::Fps12,
            Self::Fps15,
            Self::Fps24,
            Self::Fps30,
            Self::Fps60,
        ]
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.per_second())
    }
}

/// Error for a frame rate outside the supported set
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported frame rate: {0}")]
pub struct UnsupportedFrameRate(pub u32);

impl TryFrom<u32> for FrameRate {
    type Error = UnsupportedFrameRate;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::all()
            .iter()
            .copied()
            .find(|rate| rate.per_second() == value)
            .ok_or(UnsupportedFrameRate(value))
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        rate.per_second()
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not advancing
    #[default]
    Stopped,
    /// Playing forward
    Forward,
    /// Playing in reverse
    Reverse,
}

impl PlaybackState {
    /// Signed time direction, zero when stopped
    pub fn direction(&self) -> f32 {
        match self {
            Self::Stopped => 0.0,
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }

    /// Is currently playing (forward or reverse)
    pub fn is_playing(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Direction requested by a play command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayDirection {
    /// Toward the end of the timeline
    Forward,
    /// Toward the start of the timeline
    Reverse,
}

impl PlayDirection {
    /// Playback state entered when playing in this direction
    pub fn state(&self) -> PlaybackState {
        match self {
            Self::Forward => PlaybackState::Forward,
            Self::Reverse => PlaybackState::Reverse,
        }
    }
}

/// An animation timeline: playback settings, playhead and tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TimelineData")]
pub struct Timeline {
    /// Timeline name
    #[serde(default)]
    pub name: String,
    /// Output frame rate
    #[serde(default)]
    pub fps: FrameRate,
    duration: f32,
    /// Whether playback wraps around
    #[serde(default, rename = "loop")]
    pub looping: bool,
    /// Easing used by keyframes that don't set their own
    #[serde(default)]
    pub default_easing: Easing,
    #[serde(skip)]
    current_time: f32,
    #[serde(skip)]
    state: PlaybackState,
    #[serde(default)]
    tracks: IndexMap<TargetId, Track>,
    #[serde(default)]
    selected: Vec<TargetId>,
}

/// Unvalidated serialized form of a timeline
#[derive(Deserialize)]
struct TimelineData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fps: FrameRate,
    duration: f32,
    #[serde(default, rename = "loop")]
    looping: bool,
    #[serde(default)]
    default_easing: Easing,
    #[serde(default)]
    tracks: IndexMap<TargetId, Track>,
    #[serde(default)]
    selected: Vec<TargetId>,
}

impl From<TimelineData> for Timeline {
    fn from(data: TimelineData) -> Self {
        let mut timeline = Timeline::new(data.name, data.duration)
            .with_fps(data.fps)
            .with_looping(data.looping)
            .with_default_easing(data.default_easing);

        // Tracks are keyed by the target they drive, whatever the map key says
        for (key, track) in data.tracks {
            if key != track.target {
                tracing::debug!(key = %key, layer = %track.target, "Re-keying track by its target");
            }
            if timeline.tracks.contains_key(&track.target) {
                tracing::warn!(layer = %track.target, "Dropping duplicate track");
                continue;
            }
            timeline.tracks.insert(track.target.clone(), track);
        }
        for id in data.selected {
            timeline.select(id);
        }
        timeline
    }
}

impl Timeline {
    /// Create a new timeline
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            fps: FrameRate::default(),
            duration: sanitize_duration(duration),
            looping: false,
            default_easing: Easing::default(),
            current_time: 0.0,
            state: PlaybackState::Stopped,
            tracks: IndexMap::new(),
            selected: Vec::new(),
        }
    }

    /// Set the frame rate
    pub fn with_fps(mut self, fps: FrameRate) -> Self {
        self.fps = fps;
        self
    }

    /// Set looping
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the default easing
    pub fn with_default_easing(mut self, easing: Easing) -> Self {
        self.default_easing = easing;
        self
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        sanitize_duration(self.duration)
    }

    /// Change the duration, re-clamping the playhead
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = sanitize_duration(duration);
        self.current_time = self.current_time.min(self.duration);
    }

    /// Playhead position in seconds
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Is currently playing (forward or reverse)
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub(crate) fn set_current_time(&mut self, time: f32) {
        self.current_time = if time.is_nan() {
            0.0
        } else {
            time.clamp(0.0, self.duration())
        };
    }

    pub(crate) fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    /// Stop advancing without moving the playhead
    pub fn halt(&mut self) {
        if self.state.is_playing() {
            tracing::debug!(timeline = %self.name, time = self.current_time, "playback halted");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Get or create the track driving a target
    pub fn track_for(&mut self, target: impl Into<TargetId>) -> &mut Track {
        let target = target.into();
        self.tracks
            .entry(target.clone())
            .or_insert_with(|| Track::new(target))
    }

    /// Add a track, replacing any track for the same target
    pub fn add_track(&mut self, track: Track) -> Option<Track> {
        self.tracks.insert(track.target.clone(), track)
    }

    /// Remove a track
    pub fn remove_track(&mut self, target: &TargetId) -> Option<Track> {
        self.selected.retain(|t| t != target);
        self.tracks.shift_remove(target)
    }

    /// Get a track
    pub fn track(&self, target: &TargetId) -> Option<&Track> {
        self.tracks.get(target)
    }

    /// Get a mutable track
    pub fn track_mut(&mut self, target: &TargetId) -> Option<&mut Track> {
        self.tracks.get_mut(target)
    }

    /// Get all tracks
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Get track count
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Targets currently selected for keying
    pub fn selected(&self) -> &[TargetId] {
        &self.selected
    }

    /// Add a target to the selection
    pub fn select(&mut self, target: impl Into<TargetId>) {
        let target = target.into();
        if !self.selected.contains(&target) {
            self.selected.push(target);
        }
    }

    /// Remove a target from the selection
    pub fn deselect(&mut self, target: &TargetId) {
        self.selected.retain(|t| t != target);
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Record the live state of every selected target as a keyframe at the playhead.
    ///
    /// Targets missing from `targets` are skipped. Returns the ids of the
    /// keyframes written.
    pub fn key_selected(&mut self, targets: &impl TransformTargets) -> Vec<KeyframeId> {
        let time = self.current_time;
        let selected = self.selected.clone();
        selected
            .into_iter()
            .filter_map(|target| {
                let state = targets.get_state(&target)?;
                Some(self.track_for(target).set_keyframe_at(time, state.animated(), None))
            })
            .collect()
    }

    /// Number of frames an export produces, both ends included
    pub fn frame_count(&self) -> u32 {
        frame_count(self.fps.per_second(), self.duration())
    }

    /// Convert time to the frame it falls in
    pub fn time_to_frame(&self, time: f32) -> u32 {
        (time.max(0.0) * self.fps.per_second() as f32).floor() as u32
    }

    /// Convert frame number to time
    pub fn frame_to_time(&self, frame: u32) -> f32 {
        frame as f32 / self.fps.per_second() as f32
    }

    /// Latest keyframe time across all tracks
    pub fn content_duration(&self) -> f32 {
        self.tracks
            .values()
            .map(Track::duration)
            .fold(0.0, f32::max)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Untitled Timeline", 2.0)
    }
}

/// Frames covering `0..=duration` at `fps`, i.e. `ceil(fps × duration) + 1`
pub fn frame_count(fps: u32, duration: f32) -> u32 {
    let frames = (f64::from(fps) * f64::from(duration) - 1e-6).ceil().max(0.0);
    frames as u32 + 1
}

fn sanitize_duration(duration: f32) -> f32 {
    if duration.is_finite() {
        duration.max(MIN_DURATION)
    } else {
        MIN_DURATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{LayerTransform, TargetStore};

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(24, 2.0), 49);
        assert_eq!(frame_count(30, 0.1), 4);
        assert_eq!(frame_count(12, 1.05), 14);

        let timeline = Timeline::new("t", 2.0).with_fps(FrameRate::Fps24);
        assert_eq!(timeline.frame_count(), 49);
        assert_eq!(timeline.frame_to_time(48), 2.0);
        assert_eq!(timeline.time_to_frame(1.0), 24);
    }

    #[test]
    fn test_duration_clamps_playhead() {
        let mut timeline = Timeline::new("t", 4.0);
        timeline.set_current_time(3.5);
        timeline.set_duration(2.0);
        assert_eq!(timeline.current_time(), 2.0);

        timeline.set_duration(-1.0);
        assert_eq!(timeline.duration(), MIN_DURATION);
    }

    #[test]
    fn test_frame_rate_serde() {
        let rate: FrameRate = ron::from_str("30").unwrap();
        assert_eq!(rate, FrameRate::Fps30);
        assert!(ron::from_str::<FrameRate>("25").is_err());
        assert_eq!(ron::to_string(&FrameRate::Fps12).unwrap(), "12");
    }

    #[test]
    fn test_unsupported_frame_rate_message() {
        let err = FrameRate::try_from(25).unwrap_err();
        assert_eq!(err, UnsupportedFrameRate(25));
        assert_eq!(err.to_string(), "unsupported frame rate: 25");
    }

    #[test]
    fn test_key_selected() {
        let mut store = TargetStore::new();
        store.insert(
            "a",
            LayerTransform {
                scale: 1.5,
                ..LayerTransform::default()
            },
        );

        let mut timeline = Timeline::new("t", 2.0);
        timeline.select("a");
        timeline.select("missing");
        timeline.select("a");
        timeline.set_current_time(0.5);

        let written = timeline.key_selected(&store);
        assert_eq!(written.len(), 1);
        assert_eq!(timeline.selected().len(), 2);

        let track = timeline.track(&TargetId::from("a")).unwrap();
        assert_eq!(track.keyframes()[0].time, 0.5);
        assert_eq!(track.keyframes()[0].transform.scale, 1.5);
        assert!(timeline.track(&TargetId::from("missing")).is_none());
    }

    #[test]
    fn test_timeline_from_ron() {
        let source = r#"(
            name: "intro",
            fps: 30,
            duration: 3.0,
            loop: true,
            default_easing: ease_in_out,
            tracks: {
                "logo": (
                    target: "logo",
                    keyframes: [(time: 0.0, transform: (scale: 1.0)), (time: 3.0, transform: (rotation: 90.0))],
                ),
            },
        )"#;
        let timeline: Timeline = ron::from_str(source).unwrap();
        assert_eq!(timeline.fps, FrameRate::Fps30);
        assert!(timeline.looping);
        assert_eq!(timeline.default_easing, Easing::EaseInOut);
        assert_eq!(timeline.track_count(), 1);
        assert_eq!(timeline.frame_count(), 91);
        assert_eq!(timeline.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_tracks_rekeyed_by_target() {
        let source = r#"(
            duration: 2.0,
            tracks: {
                "a": (target: "b", keyframes: [(time: 0.0)]),
                "c": (target: "b", keyframes: [(time: 1.0)]),
                "d": (target: "d"),
            },
        )"#;
        let timeline: Timeline = ron::from_str(source).unwrap();
        assert_eq!(timeline.track_count(), 2);
        assert!(timeline.track(&TargetId::from("a")).is_none());
        let track = timeline.track(&TargetId::from("b")).unwrap();
        assert_eq!(track.target, TargetId::from("b"));
        assert_eq!(track.keyframes()[0].time, 0.0);
        assert!(timeline.track(&TargetId::from("d")).is_some());
    }
}
