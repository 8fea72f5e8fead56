// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame and artifact encoders.
//!
//! PNG frames for sequences, a stored ZIP archive around them, and animated
//! GIF encoding on a blocking worker under a wall-clock limit.

use crate::export::ExportError;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, ImageResult, RgbaImage};
use std::io::{Cursor, Write};
use std::time::Duration;
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Encode one frame as PNG bytes
pub fn encode_png(image: &RgbaImage) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Archive entry name of frame `index`
pub fn frame_entry_name(index: usize) -> String {
    format!("frame_{index:05}.png")
}

/// Package PNG frames into a ZIP archive, in frame order
pub fn write_sequence_zip(frames: &[Vec<u8>]) -> ZipResult<Vec<u8>> {
    // PNG data is already compressed; a fixed timestamp keeps archives reproducible
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, frame) in frames.iter().enumerate() {
        writer.start_file(frame_entry_name(index), options)?;
        writer.write_all(frame)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// GIF encoding parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GifSettings {
    /// Frames per second of the timeline
    pub fps: u32,
    /// Repeat forever when set, play once otherwise
    pub looping: bool,
    /// Quantizer speed (1 = best quality, 30 = fastest)
    pub speed: i32,
}

/// Per-frame delay in milliseconds, `round(1000 / fps)`
pub fn gif_delay_ms(fps: u32) -> u32 {
    (1000.0 / f64::from(fps.max(1))).round() as u32
}

/// Encode frames into an animated GIF on the current thread.
///
/// `on_frame` is called with `(encoded, total)` after each frame is written.
pub fn encode_gif_blocking(
    frames: Vec<RgbaImage>,
    settings: GifSettings,
    mut on_frame: impl FnMut(usize, usize),
) -> ImageResult<Vec<u8>> {
    let total = frames.len();
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, settings.speed.clamp(1, 30));
        // Without a loop extension the animation plays once
        if settings.looping {
            encoder.set_repeat(Repeat::Infinite)?;
        }
        let delay = Delay::from_numer_denom_ms(gif_delay_ms(settings.fps), 1);
        for (index, frame) in frames.into_iter().enumerate() {
            encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
            on_frame(index + 1, total);
        }
    }
    Ok(bytes)
}

/// Encode frames into an animated GIF on a blocking worker.
///
/// Fails with [`ExportError::EncodeTimeout`] once `limit` elapses. The worker
/// itself cannot be interrupted and finishes in the background. `on_frame`
/// runs on the worker, see [`encode_gif_blocking`].
pub async fn encode_gif(
    frames: Vec<RgbaImage>,
    settings: GifSettings,
    limit: Duration,
    on_frame: impl FnMut(usize, usize) + Send + 'static,
) -> Result<Vec<u8>, ExportError> {
    let count = frames.len();
    let worker =
        tokio::task::spawn_blocking(move || encode_gif_blocking(frames, settings, on_frame));
    let bytes = tokio::time::timeout(limit, worker)
        .await
        .map_err(|_| ExportError::EncodeTimeout(limit))?
        .map_err(|e| ExportError::Worker(e.to_string()))??;
    tracing::debug!(frames = count, bytes = bytes.len(), "GIF encoded");
    Ok(bytes)
}
