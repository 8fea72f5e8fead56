// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wall-clock playback of a timeline.
//!
//! The scheduler is a small state machine (`Stopped`, `Forward`, `Reverse`)
//! driven by the host's per-refresh callback through [`Scheduler::tick`].
//! Time advances at full refresh granularity, but interpolated values are
//! written to live targets at most once per throttle window so that many
//! animated tracks don't flood downstream consumers.
//!
//! Every operation is total: inputs are clamped, nothing returns an error.

use crate::binding::TransformTargets;
use crate::keyframe::KeyframeId;
use crate::timeline::{PlayDirection, PlaybackState, Timeline};
use std::time::Duration;

/// Default minimum wall-clock interval between live target writes
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// Live targets were written this tick
    pub wrote: bool,
    /// Playback ended this tick
    pub stopped: bool,
}

/// Drives a timeline from host refresh callbacks
#[derive(Debug, Clone)]
pub struct Scheduler {
    throttle: Duration,
    /// Wall-clock time since the last write; `None` forces a write on the next tick
    since_write: Option<Duration>,
}

impl Scheduler {
    /// Create a scheduler with the given write throttle
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            since_write: None,
        }
    }

    /// Write throttle window
    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Start, reverse or pause playback.
    ///
    /// Requesting the direction that is already playing pauses in place.
    /// Starting from the extreme of the requested direction rewinds to the
    /// opposite extreme first.
    pub fn play(&mut self, timeline: &mut Timeline, direction: PlayDirection) {
        let requested = direction.state();
        if timeline.state() == requested {
            timeline.set_state(PlaybackState::Stopped);
            tracing::debug!(timeline = %timeline.name, time = timeline.current_time(), "paused");
            return;
        }

        let duration = timeline.duration();
        match direction {
            PlayDirection::Forward if timeline.current_time() >= duration => {
                timeline.set_current_time(0.0);
            }
            PlayDirection::Reverse if timeline.current_time() <= 0.0 => {
                timeline.set_current_time(duration);
            }
            _ => {}
        }

        timeline.set_state(requested);
        self.since_write = None;
        tracing::debug!(
            timeline = %timeline.name,
            time = timeline.current_time(),
            ?direction,
            "playing"
        );
    }

    /// Stop playback and rewind to zero, writing the time-zero pose
    pub fn stop(&mut self, timeline: &mut Timeline, targets: &mut impl TransformTargets) {
        timeline.set_state(PlaybackState::Stopped);
        timeline.set_current_time(0.0);
        self.write(timeline, targets);
        tracing::debug!(timeline = %timeline.name, "stopped");
    }

    /// Move the playhead while stopped. Ignored during playback.
    ///
    /// Returns whether the seek was honored. Scrub writes are immediate.
    pub fn seek(
        &mut self,
        timeline: &mut Timeline,
        time: f32,
        targets: &mut impl TransformTargets,
    ) -> bool {
        if timeline.is_playing() {
            return false;
        }
        timeline.set_current_time(time);
        self.write(timeline, targets);
        true
    }

    /// Seek to the nearest keyframe after the playhead on any track
    pub fn step_forward(
        &mut self,
        timeline: &mut Timeline,
        targets: &mut impl TransformTargets,
    ) -> bool {
        let now = timeline.current_time();
        let next = timeline
            .tracks()
            .filter_map(|track| track.next_keyframe_time(now))
            .reduce(f32::min);
        match next {
            Some(time) => self.seek(timeline, time, targets),
            None => false,
        }
    }

    /// Seek to the nearest keyframe before the playhead on any track
    pub fn step_backward(
        &mut self,
        timeline: &mut Timeline,
        targets: &mut impl TransformTargets,
    ) -> bool {
        let now = timeline.current_time();
        let previous = timeline
            .tracks()
            .filter_map(|track| track.previous_keyframe_time(now))
            .reduce(f32::max);
        match previous {
            Some(time) => self.seek(timeline, time, targets),
            None => false,
        }
    }

    /// Advance playback by one host refresh
    pub fn tick(
        &mut self,
        timeline: &mut Timeline,
        delta: Duration,
        targets: &mut impl TransformTargets,
    ) -> TickOutcome {
        let state = timeline.state();
        if !state.is_playing() {
            return TickOutcome::default();
        }

        let duration = timeline.duration();
        let mut time = timeline.current_time() + delta.as_secs_f32() * state.direction();
        let mut stopped = false;

        if time >= duration && state == PlaybackState::Forward {
            if timeline.looping {
                time %= duration;
            } else {
                time = duration;
                stopped = true;
            }
        } else if time <= 0.0 && state == PlaybackState::Reverse {
            if timeline.looping {
                // Landing exactly on zero plays on; only overrun wraps
                if time < 0.0 {
                    time = duration;
                }
            } else {
                time = 0.0;
                stopped = true;
            }
        }

        timeline.set_current_time(time);
        if stopped {
            timeline.set_state(PlaybackState::Stopped);
            tracing::debug!(timeline = %timeline.name, time, "reached end of timeline");
        }

        let elapsed = self.since_write.map(|since| since + delta);
        let due = elapsed.map_or(true, |since| since >= self.throttle);
        let wrote = due || stopped;
        if wrote {
            self.write(timeline, targets);
        } else {
            self.since_write = elapsed;
        }

        TickOutcome { wrote, stopped }
    }

    /// Write the current pose of every track, ignoring the throttle
    pub fn flush(&mut self, timeline: &Timeline, targets: &mut impl TransformTargets) {
        self.write(timeline, targets);
    }

    /// Key every selected target at the playhead.
    ///
    /// Live targets are flushed first so the captured values belong to the
    /// exact playhead time even when the last throttled write is stale.
    pub fn key_selected<T: TransformTargets>(
        &mut self,
        timeline: &mut Timeline,
        targets: &mut T,
    ) -> Vec<KeyframeId> {
        self.write(timeline, targets);
        timeline.key_selected(&*targets)
    }

    fn write(&mut self, timeline: &Timeline, targets: &mut impl TransformTargets) {
        let time = timeline.current_time();
        for track in timeline.tracks().filter(|track| !track.muted) {
            let transform = track.evaluate(time, timeline.default_easing);
            targets.set_state(&track.target, &transform);
        }
        self.since_write = Some(Duration::ZERO);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE)
    }
}
