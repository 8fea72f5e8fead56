// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe animation core for Keyreel.
//!
//! This crate provides layer motion authoring and playback:
//! - Keyframes carrying scale, offset, rotation and opacity
//! - Tracks bound to live transform targets
//! - A pure interpolation engine with easing and shortest-arc rotation
//! - A wall-clock playback scheduler with throttled target writes
//!
//! ## Architecture
//!
//! The interpolation engine is stateless, so export can call it directly at
//! exact frame times while interactive preview goes through the
//! [`Scheduler`], which owns play/pause/seek semantics.

pub mod binding;
pub mod keyframe;
pub mod scheduler;
pub mod timeline;
pub mod track;

pub use binding::{Alignment, LayerTransform, TargetId, TargetStore, TransformTargets};
pub use keyframe::{interpolate, Easing, Interpolation, Keyframe, KeyframeId, Transform};
pub use scheduler::{Scheduler, TickOutcome, DEFAULT_THROTTLE};
pub use timeline::{frame_count, FrameRate, PlayDirection, PlaybackState, Timeline};
pub use track::{Track, KEYFRAME_TOLERANCE};
