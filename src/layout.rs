//! Plot geometry: marker placement, axis bounds, ticks and the pan/zoom view
//!
//! This module contains pure coordinate logic that can be unit tested without
//! a running egui context. Matrix positions are expressed in "cell space",
//! where the cell of entry (row, col) spans `[col, col + 1) x [row, row + 1)`.

use egui::{Pos2, Rect, Vec2};

use crate::spy::{NonzeroEntry, SparseMatrixDescriptor};

/// Default marker side as a fraction of a grid cell
pub const DEFAULT_MARKER_SIZE: f64 = 0.8;

/// Zoom step multiplier for zoom in/out operations (buttons/keyboard)
pub const ZOOM_STEP: f32 = 1.25;

/// Zoom step multiplier for scroll wheel (smaller for finer control)
pub const SCROLL_ZOOM_STEP: f32 = 1.08;

/// Minimum zoom level (10% of fit-to-view)
pub const MIN_ZOOM: f32 = 0.1;

/// Maximum zoom level; large matrices need deep zoom to see single cells
pub const MAX_ZOOM: f32 = 500.0;

/// Offset that centers a marker of `marker_size` inside its cell
pub fn marker_offset(marker_size: f64) -> f64 {
    (1.0 - marker_size) / 2.0
}

/// Axis-aligned rectangle in cell space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellRect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Square drawn for `entry`: side `marker_size`, centered in the unit cell
/// whose corner is `(col, row)`
pub fn marker_rect(entry: &NonzeroEntry, marker_size: f64) -> CellRect {
    let offset = marker_offset(marker_size);
    let x = f64::from(entry.col) + offset;
    let y = f64::from(entry.row) + offset;
    CellRect {
        x_min: x,
        y_min: y,
        x_max: x + marker_size,
        y_max: y + marker_size,
    }
}

/// Visible extent of the matrix in cell space.
///
/// Columns run left to right from `x_min`; rows run top to bottom from
/// `y_top` (row 1 at the top, matrix convention).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_top: f64,
    pub y_bottom: f64,
}

impl AxisBounds {
    /// Matrix-convention bounds: x over `[1, cols]`, rows over `[1, rows]`
    /// with row 1 on top. The cells of the last row and column start on the
    /// bound, so their markers fall outside. A dimension of one cell or
    /// less spans a single cell so the axes never collapse.
    pub fn for_descriptor(descriptor: &SparseMatrixDescriptor) -> Self {
        let span = |n: u32| f64::from(n.max(2));
        Self {
            x_min: 1.0,
            x_max: span(descriptor.cols),
            y_top: 1.0,
            y_bottom: span(descriptor.rows),
        }
    }

    /// Bounds extended by one cell on the far side, so the markers of the
    /// last row and column are drawn in full
    pub fn including_last_cell(descriptor: &SparseMatrixDescriptor) -> Self {
        Self {
            x_min: 1.0,
            x_max: f64::from(descriptor.cols.max(1)) + 1.0,
            y_top: 1.0,
            y_bottom: f64::from(descriptor.rows.max(1)) + 1.0,
        }
    }

    /// [`Self::including_last_cell`] when `include_last_cell` is set,
    /// [`Self::for_descriptor`] otherwise
    pub fn new(descriptor: &SparseMatrixDescriptor, include_last_cell: bool) -> Self {
        if include_last_cell {
            Self::including_last_cell(descriptor)
        } else {
            Self::for_descriptor(descriptor)
        }
    }

    /// Part of `r` inside the bounds, or None if nothing of it shows
    pub fn clip(&self, r: CellRect) -> Option<CellRect> {
        let clipped = CellRect {
            x_min: r.x_min.max(self.x_min),
            y_min: r.y_min.max(self.y_top),
            x_max: r.x_max.min(self.x_max),
            y_max: r.y_max.min(self.y_bottom),
        };
        (clipped.x_min < clipped.x_max && clipped.y_min < clipped.y_max).then_some(clipped)
    }

    /// Integer column ticks inside the bounds, never past the last column
    pub fn column_ticks(&self, descriptor: &SparseMatrixDescriptor, max_bins: usize) -> Vec<i64> {
        let last = f64::from(descriptor.cols.max(1));
        integer_ticks(self.x_min, self.x_max.min(last), max_bins)
    }

    /// Integer row ticks inside the bounds, never past the last row
    pub fn row_ticks(&self, descriptor: &SparseMatrixDescriptor, max_bins: usize) -> Vec<i64> {
        let last = f64::from(descriptor.rows.max(1));
        integer_ticks(self.y_top, self.y_bottom.min(last), max_bins)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_bottom - self.y_top
    }

    /// Width over height, for equal-aspect display
    pub fn aspect(&self) -> f32 {
        (self.width() / self.height()) as f32
    }
}

/// Largest size with the given aspect ratio that fits inside `available`
pub fn fit_size(available: Vec2, aspect: f32) -> Vec2 {
    let available_aspect = available.x / available.y;
    if aspect > available_aspect {
        // Plot is wider than available space
        Vec2::new(available.x, available.x / aspect)
    } else {
        Vec2::new(available.y * aspect, available.y)
    }
}

/// Integer tick positions in `[lo, hi]` with a 1-2-5 step, at most
/// `max_bins` intervals apart
pub fn integer_ticks(lo: f64, hi: f64, max_bins: usize) -> Vec<i64> {
    if max_bins == 0 || !(hi >= lo) {
        return Vec::new();
    }

    let raw_step = ((hi - lo) / max_bins as f64).max(1.0);
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw_step - 1e-9)
        .unwrap_or(10.0 * magnitude);

    let step = step.round() as i64;
    let first = (lo / step as f64).ceil() as i64 * step;
    let last = hi.floor() as i64;
    (0..)
        .map(|i| first + i * step)
        .take_while(|&t| t <= last)
        .collect()
}

/// Maps cell space onto a screen rectangle
#[derive(Clone, Copy, Debug)]
pub struct PlotMapping {
    pub rect: Rect,
    pub bounds: AxisBounds,
}

impl PlotMapping {
    pub fn new(rect: Rect, bounds: AxisBounds) -> Self {
        Self { rect, bounds }
    }

    /// Screen position of cell-space point (x = column axis, y = row axis)
    pub fn to_screen(&self, x: f64, y: f64) -> Pos2 {
        let rel_x = (x - self.bounds.x_min) / self.bounds.width();
        // rows grow downwards, like screen y
        let rel_y = (y - self.bounds.y_top) / self.bounds.height();
        Pos2::new(
            self.rect.min.x + rel_x as f32 * self.rect.width(),
            self.rect.min.y + rel_y as f32 * self.rect.height(),
        )
    }

    pub fn cell_rect_to_screen(&self, r: CellRect) -> Rect {
        Rect::from_two_pos(self.to_screen(r.x_min, r.y_min), self.to_screen(r.x_max, r.y_max))
    }

    /// Cell-space point (x, y) at a screen position; not clamped to the bounds
    pub fn to_cell(&self, pos: Pos2) -> (f64, f64) {
        let rel_x = f64::from((pos.x - self.rect.min.x) / self.rect.width());
        let rel_y = f64::from((pos.y - self.rect.min.y) / self.rect.height());
        (
            self.bounds.x_min + rel_x * self.bounds.width(),
            self.bounds.y_top + rel_y * self.bounds.height(),
        )
    }

    /// Matrix (row, col) of the cell under a screen position
    pub fn screen_to_cell(&self, pos: Pos2) -> Option<(u32, u32)> {
        if !self.rect.contains(pos) {
            return None;
        }
        let rel_x = f64::from((pos.x - self.rect.min.x) / self.rect.width());
        let rel_y = f64::from((pos.y - self.rect.min.y) / self.rect.height());

        // Clamp to [0, 1) to handle boundary conditions
        let rel_x = rel_x.clamp(0.0, 0.9999999);
        let rel_y = rel_y.clamp(0.0, 0.9999999);

        let col = (self.bounds.x_min + rel_x * self.bounds.width()).floor();
        let row = (self.bounds.y_top + rel_y * self.bounds.height()).floor();
        Some((row as u32, col as u32))
    }
}

/// Pan and zoom of the plot inside its viewport.
///
/// The fitted plot (see [`fit_size`]) is scaled by `zoom` and its center sits
/// `pan` pixels away from the viewport center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotView {
    /// 1.0 shows the whole matrix
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for PlotView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl PlotView {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the whole matrix is shown, unpanned
    pub fn is_fit(&self) -> bool {
        (self.zoom - 1.0).abs() < 0.001 && self.pan.length() < 0.5
    }

    /// Scale by `factor` so that the point `anchor` (relative to the viewport
    /// center) stays over the same cell. Returns false if the zoom limits
    /// leave nothing to change.
    pub fn zoom_about(&mut self, factor: f32, anchor: Vec2) -> bool {
        let zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (zoom - self.zoom).abs() < 0.0001 {
            return false;
        }
        let ratio = zoom / self.zoom;
        self.pan = anchor + (self.pan - anchor) * ratio;
        self.zoom = zoom;
        true
    }

    /// One button/key step about the viewport center
    pub fn step(&mut self, zoom_in: bool) {
        let factor = if zoom_in { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
        self.zoom_about(factor, Vec2::ZERO);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Screen rectangle of the plot for a viewport and the fitted plot size
    pub fn plot_rect(&self, viewport: Rect, fitted: Vec2) -> Rect {
        Rect::from_center_size(viewport.center() + self.pan, fitted * self.zoom)
    }

    /// Limit panning so a tenth of the plot stays inside the viewport
    pub fn clamp_pan(&mut self, viewport_size: Vec2, plot_size: Vec2) {
        let limit = (viewport_size + plot_size) / 2.0 - plot_size * 0.1;
        self.pan = self.pan.clamp(-limit, limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(rows: u32, cols: u32) -> SparseMatrixDescriptor {
        SparseMatrixDescriptor::new("t", rows, cols, 0)
    }

    #[test]
    fn test_marker_rect_centered_in_cell() {
        let r = marker_rect(&NonzeroEntry::new(2, 3, 0), 0.8);
        assert!((r.x_min - 3.1).abs() < 1e-12);
        assert!((r.y_min - 2.1).abs() < 1e-12);
        assert!((r.x_max - 3.9).abs() < 1e-12);
        assert!((r.y_max - 2.9).abs() < 1e-12);

        let full = marker_rect(&NonzeroEntry::new(1, 1, 0), 1.0);
        assert_eq!(full, CellRect { x_min: 1.0, y_min: 1.0, x_max: 2.0, y_max: 2.0 });
    }

    #[test]
    fn test_axis_bounds() {
        let b = AxisBounds::for_descriptor(&descriptor(3, 5));
        assert_eq!((b.x_min, b.x_max), (1.0, 5.0));
        assert_eq!((b.y_top, b.y_bottom), (1.0, 3.0));
        assert!((b.aspect() - 2.0).abs() < 1e-6);
        assert_eq!(AxisBounds::new(&descriptor(3, 5), false), b);

        for d in [descriptor(0, 0), descriptor(1, 1)] {
            let single = AxisBounds::for_descriptor(&d);
            assert_eq!(single.width(), 1.0);
            assert_eq!(single.height(), 1.0);
        }
    }

    #[test]
    fn test_axis_bounds_including_last_cell() {
        let b = AxisBounds::including_last_cell(&descriptor(3, 5));
        assert_eq!((b.x_min, b.x_max), (1.0, 6.0));
        assert_eq!((b.y_top, b.y_bottom), (1.0, 4.0));
        assert_eq!(AxisBounds::new(&descriptor(3, 5), true), b);

        let empty = AxisBounds::including_last_cell(&descriptor(0, 0));
        assert_eq!(empty.width(), 1.0);
    }

    #[test]
    fn test_clip_to_bounds() {
        let d = descriptor(3, 5);
        let b = AxisBounds::for_descriptor(&d);

        let inner = marker_rect(&NonzeroEntry::new(2, 2, 0), 0.8);
        assert_eq!(b.clip(inner), Some(inner));

        // the last column starts on the bound
        assert_eq!(b.clip(marker_rect(&NonzeroEntry::new(1, 5, 0), 0.8)), None);
        let edge = b.clip(marker_rect(&NonzeroEntry::new(3, 4, 0), 1.0)).unwrap();
        assert_eq!(edge.y_max, 3.0);
        assert_eq!(edge.x_max, 5.0);

        let full = AxisBounds::including_last_cell(&d);
        let last = marker_rect(&NonzeroEntry::new(3, 5, 0), 0.8);
        assert_eq!(full.clip(last), Some(last));
    }

    #[test]
    fn test_axis_ticks_stop_at_last_cell() {
        let d = descriptor(3, 5);
        for include_last_cell in [false, true] {
            let b = AxisBounds::new(&d, include_last_cell);
            assert_eq!(b.column_ticks(&d, 10), vec![1, 2, 3, 4, 5]);
            assert_eq!(b.row_ticks(&d, 10), vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_fit_size() {
        let wide = fit_size(Vec2::new(800.0, 600.0), 2.0);
        assert!((wide.x - 800.0).abs() < 0.01);
        assert!((wide.y - 400.0).abs() < 0.01);

        let tall = fit_size(Vec2::new(800.0, 600.0), 0.5);
        assert!((tall.x - 300.0).abs() < 0.01);
        assert!((tall.y - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_integer_ticks_small_range() {
        assert_eq!(integer_ticks(1.0, 4.0, 10), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_integer_ticks_large_range() {
        assert_eq!(integer_ticks(1.0, 101.0, 10), vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(integer_ticks(1.0, 31.0, 10), vec![5, 10, 15, 20, 25, 30]);
    }

    #[test]
    fn test_integer_ticks_degenerate() {
        assert!(integer_ticks(5.0, 1.0, 10).is_empty());
        assert!(integer_ticks(1.0, 5.0, 0).is_empty());
        assert_eq!(integer_ticks(2.0, 2.0, 10), vec![2]);
    }

    #[test]
    fn test_row_one_is_at_top() {
        let bounds = AxisBounds::including_last_cell(&descriptor(4, 4));
        let rect = Rect::from_min_size(Pos2::new(100.0, 100.0), Vec2::new(400.0, 400.0));
        let mapping = PlotMapping::new(rect, bounds);

        let top_left = mapping.to_screen(1.0, 1.0);
        assert!((top_left.x - 100.0).abs() < 0.01);
        assert!((top_left.y - 100.0).abs() < 0.01);

        let bottom_right = mapping.to_screen(5.0, 5.0);
        assert!((bottom_right.x - 500.0).abs() < 0.01);
        assert!((bottom_right.y - 500.0).abs() < 0.01);

        // entry in the last row is drawn below entry in the first
        let first = mapping.cell_rect_to_screen(marker_rect(&NonzeroEntry::new(1, 1, 0), 0.8));
        let last = mapping.cell_rect_to_screen(marker_rect(&NonzeroEntry::new(4, 1, 0), 0.8));
        assert!(first.center().y < last.center().y);
        assert!((first.width() - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_screen_to_cell() {
        let rect = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(400.0, 400.0));
        let full = PlotMapping::new(rect, AxisBounds::including_last_cell(&descriptor(4, 4)));

        assert_eq!(full.screen_to_cell(Pos2::new(0.0, 0.0)), Some((1, 1)));
        assert_eq!(full.screen_to_cell(Pos2::new(150.0, 350.0)), Some((4, 2)));
        assert_eq!(full.screen_to_cell(Pos2::new(-1.0, 10.0)), None);

        // [1, 4] spans three cells, so the far edge lands in cell 3
        let clipped = PlotMapping::new(rect, AxisBounds::for_descriptor(&descriptor(4, 4)));
        assert_eq!(clipped.screen_to_cell(Pos2::new(150.0, 350.0)), Some((3, 2)));
        assert_eq!(clipped.screen_to_cell(Pos2::new(400.0, 400.0)), Some((3, 3)));
    }

    #[test]
    fn test_to_cell_inverts_to_screen() {
        let bounds = AxisBounds::for_descriptor(&descriptor(10, 20));
        let rect = Rect::from_min_size(Pos2::new(30.0, 40.0), Vec2::new(600.0, 300.0));
        let mapping = PlotMapping::new(rect, bounds);

        let (x, y) = mapping.to_cell(mapping.to_screen(7.5, 3.25));
        assert!((x - 7.5).abs() < 1e-3);
        assert!((y - 3.25).abs() < 1e-3);

        // outside the plot still maps, beyond the bounds
        let (x, _) = mapping.to_cell(Pos2::new(0.0, 40.0));
        assert!(x < bounds.x_min);
    }

    #[test]
    fn test_view_starts_fit() {
        let mut view = PlotView::default();
        assert!(view.is_fit());

        view.zoom = 2.5;
        view.pan = Vec2::new(100.0, 50.0);
        assert!(!view.is_fit());
        view.reset();
        assert!(view.is_fit());
    }

    #[test]
    fn test_step_in_and_out() {
        let mut view = PlotView::default();
        view.step(true);
        assert!((view.zoom - ZOOM_STEP).abs() < 0.001);
        view.step(false);
        assert!((view.zoom - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_zoom_limits() {
        let mut view = PlotView::default();
        for _ in 0..100 {
            view.step(true);
        }
        assert_eq!(view.zoom, MAX_ZOOM);
        assert!(!view.zoom_about(2.0, Vec2::ZERO));

        view.reset();
        for _ in 0..100 {
            view.step(false);
        }
        assert_eq!(view.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_zoom_about_keeps_anchor_cell() {
        let mut view = PlotView {
            zoom: 1.0,
            pan: Vec2::new(50.0, 30.0),
        };
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let fitted = Vec2::new(400.0, 400.0);
        let cursor = Pos2::new(300.0, 250.0);
        let bounds = AxisBounds::for_descriptor(&descriptor(40, 40));

        let before = PlotMapping::new(view.plot_rect(viewport, fitted), bounds).to_cell(cursor);
        assert!(view.zoom_about(2.0, cursor - viewport.center()));
        let after = PlotMapping::new(view.plot_rect(viewport, fitted), bounds).to_cell(cursor);

        assert!((before.0 - after.0).abs() < 1e-3);
        assert!((before.1 - after.1).abs() < 1e-3);
    }

    #[test]
    fn test_pan_by() {
        let mut view = PlotView::default();
        view.pan_by(Vec2::new(10.0, 20.0));
        view.pan_by(Vec2::new(-5.0, -10.0));
        assert!((view.pan - Vec2::new(5.0, 10.0)).length() < 0.001);
    }

    #[test]
    fn test_zoomed_plot_stays_centered() {
        let view = PlotView {
            zoom: 2.0,
            pan: Vec2::ZERO,
        };
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let plot = view.plot_rect(viewport, Vec2::new(400.0, 300.0));

        assert!((plot.size() - Vec2::new(800.0, 600.0)).length() < 0.01);
        assert!((plot.center() - viewport.center()).length() < 0.01);
    }

    #[test]
    fn test_clamp_pan() {
        let mut view = PlotView {
            zoom: 1.0,
            pan: Vec2::new(10_000.0, -10_000.0),
        };
        view.clamp_pan(Vec2::new(800.0, 600.0), Vec2::new(400.0, 400.0));
        // half viewport + half plot - 10% of plot
        assert!((view.pan.x - 560.0).abs() < 0.01);
        assert!((view.pan.y + 460.0).abs() < 0.01);
    }
}
