// SPDX-License-Identifier: MIT OR Apache-2.0
//! Real-time preview driver.
//!
//! Stands in for the host's per-refresh callback: a tokio interval fires at
//! the refresh rate and each firing advances the scheduler by the measured
//! wall-clock delta since the previous one.

use crate::config::PlaybackSettings;
use keyreel_sequencer::{Scheduler, Timeline, TransformTargets};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Counters from one preview run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    /// Refreshes processed
    pub ticks: u32,
    /// Refreshes that wrote live targets
    pub writes: u32,
    /// Whether playback reached an end and stopped
    pub stopped: bool,
}

/// Drives a [`Scheduler`] from a periodic timer
#[derive(Debug)]
pub struct PreviewDriver {
    scheduler: Scheduler,
    refresh: Duration,
}

impl PreviewDriver {
    /// Create a driver from playback settings
    pub fn new(settings: &PlaybackSettings) -> Self {
        Self {
            scheduler: Scheduler::new(settings.throttle()),
            refresh: settings.refresh_interval(),
        }
    }

    /// Refresh interval
    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    /// The driven scheduler, for play, seek and stop requests
    pub fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Run refreshes until playback stops or `limit` of wall time has passed.
    ///
    /// `on_write` sees the timeline and targets after every tick that wrote
    /// live values.
    pub async fn run<T: TransformTargets>(
        &mut self,
        timeline: &mut Timeline,
        targets: &mut T,
        limit: Duration,
        mut on_write: impl FnMut(&Timeline, &T),
    ) -> PreviewStats {
        let mut stats = PreviewStats::default();
        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        interval.tick().await;
        let started = Instant::now();
        let mut last = started;

        while timeline.is_playing() && last.duration_since(started) < limit {
            interval.tick().await;
            let now = Instant::now();
            let outcome = self.scheduler.tick(timeline, now.duration_since(last), targets);
            last = now;

            stats.ticks += 1;
            if outcome.wrote {
                stats.writes += 1;
                on_write(timeline, targets);
            }
            stats.stopped |= outcome.stopped;
        }

        tracing::debug!(
            ticks = stats.ticks,
            writes = stats.writes,
            time = timeline.current_time(),
            "Preview run ended"
        );
        stats
    }
}
