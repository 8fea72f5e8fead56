// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot rectangles, fitting and anchor placement.

use crate::scene::{PageGrid, RenderTarget, TargetKind};
use keyreel_sequencer::LayerTransform;

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl SlotRect {
    /// Create a rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle multiplied by a supersampling factor
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Whether the rectangle has a drawable area
    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Rectangle of slot `index` in output pixels.
///
/// Composite slots all cover the full canvas. Page slots occupy grid cells in
/// reading order; slots past the last cell have no rectangle.
pub fn slot_rect(target: &RenderTarget, index: usize) -> Option<SlotRect> {
    let width = target.width as f32;
    let height = target.height as f32;
    match &target.kind {
        TargetKind::Composite => Some(SlotRect::new(0.0, 0.0, width, height)),
        TargetKind::Page(grid) => grid_cell(grid, width, height, index),
    }
}

fn grid_cell(grid: &PageGrid, width: f32, height: f32, index: usize) -> Option<SlotRect> {
    let columns = grid.columns.max(1) as usize;
    let rows = grid.rows.max(1) as usize;
    if index >= columns * rows {
        return None;
    }

    let gap = grid.gap.max(0.0);
    let margin = grid.margin.max(0.0);
    let cell_w = (width - 2.0 * margin - gap * (columns - 1) as f32) / columns as f32;
    let cell_h = (height - 2.0 * margin - gap * (rows - 1) as f32) / rows as f32;
    if cell_w <= 0.0 || cell_h <= 0.0 {
        return None;
    }

    let col = (index % columns) as f32;
    let row = (index / columns) as f32;
    Some(SlotRect::new(
        margin + col * (cell_w + gap),
        margin + row * (cell_h + gap),
        cell_w,
        cell_h,
    ))
}

/// Largest size with the source aspect ratio that fits inside `bounds`
pub fn fit_contain(source: (u32, u32), bounds: (f32, f32)) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f32, source.1.max(1) as f32);
    let ratio = (bounds.0 / sw).min(bounds.1 / sh);
    (
        (sw * ratio).round().max(1.0) as u32,
        (sh * ratio).round().max(1.0) as u32,
    )
}

/// Size of a slot filled edge to edge
pub fn fit_cover(bounds: (f32, f32)) -> (u32, u32) {
    (
        bounds.0.round().max(1.0) as u32,
        bounds.1.round().max(1.0) as u32,
    )
}

/// Center of a transformed layer of `base` size inside `rect`.
///
/// The layer edge matching the alignment touches the anchor, then the layer
/// is pulled back by its percentage offsets of the slot size.
pub fn layer_center(rect: &SlotRect, base: (f32, f32), transform: &LayerTransform) -> (f32, f32) {
    let (ax, ay) = transform.alignment.factors();
    let anchor_x = rect.x + rect.width * ax;
    let anchor_y = rect.y + rect.height * ay;
    (
        anchor_x + base.0 * (0.5 - ax) - rect.width * transform.offset_x / 100.0,
        anchor_y + base.1 * (0.5 - ay) - rect.height * transform.offset_y / 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyreel_sequencer::Alignment;

    #[test]
    fn test_composite_slots_cover_canvas() {
        let target = RenderTarget::composite("c", 320, 240);
        assert_eq!(slot_rect(&target, 5), Some(SlotRect::new(0.0, 0.0, 320.0, 240.0)));
    }

    #[test]
    fn test_page_reading_order() {
        let grid = PageGrid {
            columns: 2,
            rows: 2,
            gap: 10.0,
            margin: 5.0,
        };
        let target = RenderTarget::page("p", 220, 220, grid);

        assert_eq!(slot_rect(&target, 0), Some(SlotRect::new(5.0, 5.0, 100.0, 100.0)));
        assert_eq!(slot_rect(&target, 1), Some(SlotRect::new(115.0, 5.0, 100.0, 100.0)));
        assert_eq!(slot_rect(&target, 2), Some(SlotRect::new(5.0, 115.0, 100.0, 100.0)));
        assert_eq!(slot_rect(&target, 4), None);
    }

    #[test]
    fn test_fit_contain() {
        assert_eq!(fit_contain((200, 100), (100.0, 100.0)), (100, 50));
        assert_eq!(fit_contain((100, 400), (100.0, 100.0)), (25, 100));
        assert_eq!(fit_contain((10, 10), (64.0, 32.0)), (32, 32));
    }

    #[test]
    fn test_layer_center_alignment() {
        let rect = SlotRect::new(0.0, 0.0, 100.0, 100.0);
        let base = (40.0, 20.0);

        let centered = LayerTransform::default();
        assert_eq!(layer_center(&rect, base, &centered), (50.0, 50.0));

        let top_left = LayerTransform {
            alignment: Alignment::TopLeft,
            ..LayerTransform::default()
        };
        assert_eq!(layer_center(&rect, base, &top_left), (20.0, 10.0));

        let bottom_right = LayerTransform {
            alignment: Alignment::BottomRight,
            offset_x: 10.0,
            ..LayerTransform::default()
        };
        assert_eq!(layer_center(&rect, base, &bottom_right), (70.0, 90.0));
    }

    #[test]
    fn test_offset_subtracts_from_anchor() {
        let rect = SlotRect::new(0.0, 0.0, 100.0, 100.0);
        let base = (40.0, 40.0);

        let right = LayerTransform {
            offset_x: 10.0,
            ..LayerTransform::default()
        };
        assert_eq!(layer_center(&rect, base, &right), (40.0, 50.0));

        let down = LayerTransform {
            offset_y: -25.0,
            ..LayerTransform::default()
        };
        assert_eq!(layer_center(&rect, base, &down), (50.0, 75.0));
    }
}
