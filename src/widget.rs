//! SpyPlotWidget - A self-contained egui widget for viewing spy plots
//!
//! This widget encapsulates all state and rendering logic for displaying a
//! distributed sparse matrix: markers colored by owning processor, integer
//! axes, pan/zoom, a processor legend and partition statistics. Multiple
//! instances can be used side-by-side without sharing state.

use std::collections::HashMap;

use egui::{
    Align2, Color32, FontId, Key, PointerButton, Pos2, Rect, Response, Sense, Stroke, StrokeKind,
    Ui, Vec2,
};

use crate::color::ProcessorPalette;
use crate::config::validate_marker_size;
use crate::error::Result;
use crate::layout::{self, fit_size, marker_rect, AxisBounds, PlotMapping, PlotView};
use crate::render::{colored_entries, SpyRenderer, SpyScene};
use crate::spy::{SparseMatrixDescriptor, SpyMatrix};
use crate::stats::PartitionStats;

/// Space reserved around the plot for the title and tick labels
const TITLE_HEIGHT: f32 = 32.0;
const Y_LABEL_WIDTH: f32 = 52.0;
const X_LABEL_HEIGHT: f32 = 24.0;
const RIGHT_MARGIN: f32 = 16.0;
/// At most this many intervals between tick labels
const TICK_BINS: usize = 10;
const TICK_LENGTH: f32 = 4.0;
/// Legend rows shown before collapsing into "+N more"
const LEGEND_MAX_ENTRIES: usize = 16;
/// Duration to show zoom level overlay after zooming
const ZOOM_OVERLAY_DURATION: f64 = 0.5;

/// Actions returned from zoom controls overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZoomAction {
    None,
    ZoomIn,
    ZoomOut,
    Reset,
}

/// Matrix position under the pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoverInfo {
    pub row: u32,
    pub col: u32,
    /// Owning processor, or None for a structural zero
    pub proc: Option<u32>,
}

impl HoverInfo {
    fn label(&self) -> String {
        match self.proc {
            Some(proc) => format!("Row {}, Col {}: proc {}", self.row, self.col, proc),
            None => format!("Row {}, Col {}: zero", self.row, self.col),
        }
    }
}

/// A self-contained widget for viewing spy plots.
///
/// This widget owns all its state and can be embedded in any egui application.
pub struct SpyPlotWidget {
    // === Plot data ===
    scene: Option<SpyScene>,
    /// Owning processor of every nonzero cell, for hover lookup
    owners: HashMap<(u32, u32), u32>,
    stats: Option<PartitionStats>,
    /// Marker side as a fraction of a cell
    marker_size: f64,
    /// Extend the axes past the last row and column
    include_last_cell: bool,

    // === View ===
    view: PlotView,

    // === Rendering state ===
    hover_info: Option<HoverInfo>,
    show_legend: bool,
    /// Track when zoom was last changed (for overlay display)
    zoom_changed_time: Option<f64>,
    /// Previous zoom level to detect changes
    prev_zoom_level: f32,
}

impl Default for SpyPlotWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl SpyPlotWidget {
    /// Create a new empty widget
    pub fn new() -> Self {
        Self {
            scene: None,
            owners: HashMap::new(),
            stats: None,
            marker_size: layout::DEFAULT_MARKER_SIZE,
            include_last_cell: false,
            view: PlotView::default(),
            hover_info: None,
            show_legend: true,
            zoom_changed_time: None,
            prev_zoom_level: 1.0,
        }
    }

    // =========================================================================
    // Public API (called from outside, e.g., from JS via SpyViewerHandle)
    // =========================================================================

    /// Replace the displayed matrix. The view is reset when the dimensions change.
    pub fn set_matrix(&mut self, matrix: &SpyMatrix) -> Result<()> {
        let dimensions_changed = self
            .descriptor()
            .map_or(true, |d| d.rows != matrix.descriptor.rows || d.cols != matrix.descriptor.cols);

        let mut palette = ProcessorPalette::new();
        let mut scene = SpyScene::new();
        scene.render(&matrix.descriptor, colored_entries(&matrix.entries, &mut palette))?;

        // later entries win, as they are painted on top
        self.owners = matrix
            .entries
            .iter()
            .map(|e| ((e.row, e.col), e.proc))
            .collect();
        self.stats = Some(PartitionStats::from_matrix(matrix));
        self.scene = Some(scene);
        self.hover_info = None;

        if dimensions_changed {
            self.view.reset();
        }
        log::info!(
            "Showing '{}' ({}x{}, {} nonzeros, {} processors)",
            matrix.descriptor.title,
            matrix.descriptor.rows,
            matrix.descriptor.cols,
            matrix.entries.len(),
            palette.len()
        );
        Ok(())
    }

    /// Check if a matrix is loaded
    pub fn has_matrix(&self) -> bool {
        self.scene.is_some()
    }

    pub fn descriptor(&self) -> Option<&SparseMatrixDescriptor> {
        self.scene.as_ref().map(|s| &s.descriptor)
    }

    pub fn stats(&self) -> Option<&PartitionStats> {
        self.stats.as_ref()
    }

    pub fn marker_size(&self) -> f64 {
        self.marker_size
    }

    /// Set marker side as a fraction of a cell, in (0, 1]
    pub fn set_marker_size(&mut self, size: f64) -> Result<()> {
        validate_marker_size(size)?;
        self.marker_size = size;
        Ok(())
    }

    pub fn include_last_cell(&self) -> bool {
        self.include_last_cell
    }

    /// Extend the axes one cell past the last row and column
    pub fn set_include_last_cell(&mut self, include: bool) {
        self.include_last_cell = include;
    }

    /// Axis bounds of the loaded matrix
    pub fn bounds(&self) -> Option<AxisBounds> {
        self.descriptor()
            .map(|d| AxisBounds::new(d, self.include_last_cell))
    }

    /// Zoom in by one step about the plot center
    pub fn zoom_in(&mut self) {
        self.view.step(true);
    }

    /// Zoom out by one step about the plot center
    pub fn zoom_out(&mut self) {
        self.view.step(false);
    }

    /// Reset to fit-to-view
    pub fn zoom_to_fit(&mut self) {
        self.view.reset();
    }

    /// Get current zoom level (1.0 = fit to view)
    pub fn zoom_level(&self) -> f32 {
        self.view.zoom
    }

    /// Check if view is at default state
    pub fn is_default_view(&self) -> bool {
        self.view.is_fit()
    }

    pub fn hover_info(&self) -> Option<HoverInfo> {
        self.hover_info
    }

    /// Look up what lies at matrix position (row, col)
    fn hover_at(&self, row: u32, col: u32) -> Option<HoverInfo> {
        let descriptor = self.descriptor()?;
        if row == 0 || col == 0 || row > descriptor.rows || col > descriptor.cols {
            return None;
        }
        Some(HoverInfo {
            row,
            col,
            proc: self.owners.get(&(row, col)).copied(),
        })
    }

    // =========================================================================
    // Main rendering
    // =========================================================================

    /// Show the widget, rendering into the given UI with a specified container size.
    pub fn show(&mut self, ui: &mut Ui, container_size: Vec2) -> Response {
        let ctx = ui.ctx().clone();
        let (rect, response) = ui.allocate_exact_size(container_size, Sense::click_and_drag());

        let Some(descriptor) = self.descriptor().cloned() else {
            ui.painter_at(rect).text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No spy file loaded",
                FontId::default(),
                ui.style().visuals.text_color(),
            );
            return response;
        };

        // Plot area inside the title and tick label margins
        let viewport = Rect::from_min_max(
            rect.min + Vec2::new(Y_LABEL_WIDTH, TITLE_HEIGHT),
            rect.max - Vec2::new(RIGHT_MARGIN, X_LABEL_HEIGHT),
        );
        if viewport.width() <= 1.0 || viewport.height() <= 1.0 {
            return response;
        }
        let bounds = AxisBounds::new(&descriptor, self.include_last_cell);
        let fitted = fit_size(viewport.size(), bounds.aspect());

        self.handle_keyboard_input(&ctx);
        self.handle_pointer_input(ui, &response, viewport.center());
        self.view.clamp_pan(viewport.size(), fitted * self.view.zoom);

        let mapping = PlotMapping::new(self.view.plot_rect(viewport, fitted), bounds);

        self.paint_plot(ui, rect, viewport, &mapping, &descriptor);

        self.hover_info = response
            .hover_pos()
            .filter(|pos| viewport.contains(*pos))
            .and_then(|pos| mapping.screen_to_cell(pos))
            .and_then(|(row, col)| self.hover_at(row, col));

        // Track zoom changes for overlay display
        let current_zoom = self.zoom_level();
        let current_time = ctx.input(|i| i.time);
        if (current_zoom - self.prev_zoom_level).abs() > 0.001 {
            self.zoom_changed_time = Some(current_time);
            self.prev_zoom_level = current_zoom;
            ctx.request_repaint_after(std::time::Duration::from_secs_f64(ZOOM_OVERLAY_DURATION));
        }

        // Overlays render at screen coordinates; actions are applied afterwards
        let zoom_action = self.render_zoom_controls(&ctx, rect);
        self.render_legend(&ctx, rect);
        self.render_zoom_info_overlay(&ctx, rect, current_time);
        self.render_hover_overlay(&ctx, rect);

        match zoom_action {
            ZoomAction::None => {}
            ZoomAction::ZoomIn => self.zoom_in(),
            ZoomAction::ZoomOut => self.zoom_out(),
            ZoomAction::Reset => self.zoom_to_fit(),
        }

        response
    }

    fn handle_pointer_input(&mut self, ui: &Ui, response: &Response, viewport_center: Pos2) {
        // Pinch / ctrl+wheel zoom
        let zoom_delta = ui.input(|i| i.zoom_delta());
        let pointer_pos = ui
            .input(|i| i.pointer.latest_pos())
            .filter(|pos| response.rect.contains(*pos));

        if let Some(pointer_pos) = pointer_pos {
            let anchor = pointer_pos - viewport_center;
            if zoom_delta != 1.0 {
                self.view.zoom_about(zoom_delta, anchor);
            } else {
                let scroll_delta = ui.input(|i| i.raw_scroll_delta);
                if scroll_delta.y != 0.0 {
                    let zoom_factor = if scroll_delta.y > 0.0 {
                        layout::SCROLL_ZOOM_STEP
                    } else {
                        1.0 / layout::SCROLL_ZOOM_STEP
                    };
                    self.view.zoom_about(zoom_factor, anchor);
                }
            }
        }

        if response.dragged_by(PointerButton::Primary) || response.dragged_by(PointerButton::Middle)
        {
            let drag_delta = response.drag_delta();
            if drag_delta != Vec2::ZERO {
                self.view.pan_by(drag_delta);
            }
        }

        if response.double_clicked() {
            self.zoom_to_fit();
        }
    }

    /// Handle keyboard shortcuts for zoom and the legend
    fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        ctx.input(|i| {
            // Zoom in: = or + (numpad)
            if i.key_pressed(Key::Equals) || i.key_pressed(Key::Plus) {
                self.zoom_in();
            }
            if i.key_pressed(Key::Minus) {
                self.zoom_out();
            }
            if i.key_pressed(Key::Num0) {
                self.zoom_to_fit();
            }
            if i.key_pressed(Key::L) {
                self.show_legend = !self.show_legend;
            }
        });
    }

    /// Paint background, markers, axes and title
    fn paint_plot(
        &self,
        ui: &Ui,
        widget_rect: Rect,
        viewport: Rect,
        mapping: &PlotMapping,
        descriptor: &SparseMatrixDescriptor,
    ) {
        let visuals = ui.visuals();
        let text_color = visuals.text_color();
        let axis_color = visuals.weak_text_color();
        let font = FontId::proportional(12.0);

        let painter = ui.painter_at(widget_rect);
        let plot_painter = ui.painter_at(viewport);
        let axis_rect = mapping.rect.intersect(viewport);

        plot_painter.rect_filled(mapping.rect, 0.0, Color32::WHITE);

        if let Some(scene) = &self.scene {
            for marker in &scene.markers {
                let Some(cell) = mapping.bounds.clip(marker_rect(&marker.entry, self.marker_size))
                else {
                    continue;
                };
                let r = mapping.cell_rect_to_screen(cell);
                if r.intersects(viewport) {
                    plot_painter.rect_filled(r, 0.0, marker.color);
                }
            }
        }

        if axis_rect.is_positive() {
            painter.rect_stroke(
                axis_rect,
                0.0,
                Stroke::new(1.0, axis_color),
                StrokeKind::Outside,
            );

            // Integer ticks over the visible part of the axes
            let (x_lo, y_lo) = mapping.to_cell(axis_rect.min);
            let (x_hi, y_hi) = mapping.to_cell(axis_rect.max);
            let visible = AxisBounds {
                x_min: x_lo.max(mapping.bounds.x_min),
                x_max: x_hi.min(mapping.bounds.x_max),
                y_top: y_lo.max(mapping.bounds.y_top),
                y_bottom: y_hi.min(mapping.bounds.y_bottom),
            };

            for col in visible.column_ticks(descriptor, TICK_BINS) {
                let x = mapping.to_screen(col as f64, 1.0).x;
                let base = Pos2::new(x, axis_rect.bottom());
                painter.line_segment(
                    [base, base + Vec2::new(0.0, TICK_LENGTH)],
                    Stroke::new(1.0, axis_color),
                );
                painter.text(
                    base + Vec2::new(0.0, TICK_LENGTH + 1.0),
                    Align2::CENTER_TOP,
                    col,
                    font.clone(),
                    text_color,
                );
            }

            for row in visible.row_ticks(descriptor, TICK_BINS) {
                let y = mapping.to_screen(1.0, row as f64).y;
                let base = Pos2::new(axis_rect.left(), y);
                painter.line_segment(
                    [base, base - Vec2::new(TICK_LENGTH, 0.0)],
                    Stroke::new(1.0, axis_color),
                );
                painter.text(
                    base - Vec2::new(TICK_LENGTH + 2.0, 0.0),
                    Align2::RIGHT_CENTER,
                    row,
                    font.clone(),
                    text_color,
                );
            }
        }

        painter.text(
            Pos2::new(viewport.center().x, widget_rect.top() + TITLE_HEIGHT / 2.0),
            Align2::CENTER_CENTER,
            &descriptor.title,
            FontId::proportional(16.0),
            text_color,
        );
    }

    /// Render zoom control buttons at bottom-right of widget.
    /// Returns an action to be applied after rendering.
    fn render_zoom_controls(&self, ctx: &egui::Context, widget_rect: Rect) -> ZoomAction {
        let button_size = egui::vec2(28.0, 28.0);
        let margin = 10.0;
        let spacing = 4.0;

        let num_buttons = 3.0;
        let base_x = widget_rect.max.x
            - margin
            - button_size.x * num_buttons
            - spacing * (num_buttons - 1.0);
        let base_y = widget_rect.max.y - margin - button_size.y - X_LABEL_HEIGHT;

        let mut action = ZoomAction::None;

        egui::Area::new(egui::Id::new("spy_zoom_controls"))
            .fixed_pos(egui::pos2(base_x, base_y))
            .show(ctx, |ui| {
                let frame_style = overlay_frame(ui);
                let text_color = get_overlay_text_color(ui);

                frame_style.show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.spacing_mut().item_spacing.x = spacing;

                        // Always show reset button, but disable when at default view
                        let can_reset = !self.is_default_view();
                        let reset_color = if can_reset {
                            text_color
                        } else {
                            text_color.gamma_multiply(0.3)
                        };
                        let reset_btn =
                            egui::Button::new(egui::RichText::new("⟲").color(reset_color))
                                .fill(Color32::TRANSPARENT);
                        if ui.add_sized(button_size, reset_btn).clicked() && can_reset {
                            action = ZoomAction::Reset;
                        }

                        let minus_btn =
                            egui::Button::new(egui::RichText::new("−").color(text_color))
                                .fill(Color32::TRANSPARENT);
                        if ui.add_sized(button_size, minus_btn).clicked() {
                            action = ZoomAction::ZoomOut;
                        }

                        let plus_btn =
                            egui::Button::new(egui::RichText::new("+").color(text_color))
                                .fill(Color32::TRANSPARENT);
                        if ui.add_sized(button_size, plus_btn).clicked() {
                            action = ZoomAction::ZoomIn;
                        }
                    });
                });
            });

        action
    }

    /// Render processor legend and partition statistics at top-right of widget
    fn render_legend(&self, ctx: &egui::Context, widget_rect: Rect) {
        if !self.show_legend {
            return;
        }
        let (Some(scene), Some(stats)) = (&self.scene, &self.stats) else {
            return;
        };
        let legend = scene.legend();
        let margin = 10.0;

        egui::Area::new(egui::Id::new("spy_legend"))
            .pivot(Align2::RIGHT_TOP)
            .fixed_pos(egui::pos2(
                widget_rect.max.x - margin,
                widget_rect.min.y + TITLE_HEIGHT + margin,
            ))
            .show(ctx, |ui| {
                let text_color = get_overlay_text_color(ui);
                overlay_frame(ui).show(ui, |ui| {
                    ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);
                    ui.label(
                        egui::RichText::new(format!(
                            "{} nonzeros, {} procs",
                            stats.nonzeros, stats.procs
                        ))
                        .color(text_color)
                        .small(),
                    );
                    ui.label(
                        egui::RichText::new(format!(
                            "imbalance {:.3}, volume {}",
                            stats.load_imbalance, stats.communication_volume
                        ))
                        .color(text_color)
                        .small(),
                    );
                    ui.separator();

                    for &(proc, color) in legend.iter().take(LEGEND_MAX_ENTRIES) {
                        ui.horizontal(|ui| {
                            let (swatch, _) =
                                ui.allocate_exact_size(egui::vec2(10.0, 10.0), Sense::hover());
                            ui.painter().rect_filled(swatch, 2.0, color);
                            ui.label(
                                egui::RichText::new(format!("proc {}", proc))
                                    .color(text_color)
                                    .small(),
                            );
                        });
                    }
                    if legend.len() > LEGEND_MAX_ENTRIES {
                        ui.label(
                            egui::RichText::new(format!(
                                "+{} more",
                                legend.len() - LEGEND_MAX_ENTRIES
                            ))
                            .color(text_color)
                            .small(),
                        );
                    }
                });
            });
    }

    /// Render zoom level overlay while zooming
    fn render_zoom_info_overlay(&self, ctx: &egui::Context, widget_rect: Rect, current_time: f64) {
        let should_show = self
            .zoom_changed_time
            .is_some_and(|changed_time| (current_time - changed_time) < ZOOM_OVERLAY_DURATION);
        if !should_show {
            return;
        }

        let zoom_text = format_zoom_multiple(self.zoom_level());

        egui::Area::new(egui::Id::new("spy_zoom_info_overlay"))
            .fixed_pos(egui::pos2(
                widget_rect.center().x - 50.0,
                widget_rect.center().y - 20.0,
            ))
            .show(ctx, |ui| {
                let text_color = get_overlay_text_color(ui);
                let bg = get_overlay_bg(ui);
                egui::Frame::popup(ui.style())
                    .fill(bg)
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::symmetric(16, 8))
                    .show(ui, |ui| {
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);
                        ui.label(egui::RichText::new(zoom_text).color(text_color).size(24.0));
                    });
            });
    }

    /// Render hover info overlay at bottom-left of widget
    fn render_hover_overlay(&self, ctx: &egui::Context, widget_rect: Rect) {
        if let Some(info) = self.hover_info() {
            egui::Area::new(egui::Id::new("spy_hover_overlay"))
                .fixed_pos(egui::pos2(
                    widget_rect.min.x + 10.0,
                    widget_rect.max.y - 30.0 - X_LABEL_HEIGHT,
                ))
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);
                        ui.label(info.label());
                    });
                });
        }
    }
}

/// Get a translucent background color appropriate for light/dark mode
fn get_overlay_bg(ui: &Ui) -> Color32 {
    if ui.visuals().dark_mode {
        Color32::from_black_alpha(180)
    } else {
        Color32::from_white_alpha(220)
    }
}

/// Get text color appropriate for light/dark mode overlays
fn get_overlay_text_color(ui: &Ui) -> Color32 {
    if ui.visuals().dark_mode {
        Color32::WHITE
    } else {
        Color32::from_gray(30)
    }
}

/// Create a frame style for overlay controls that adapts to light/dark mode
fn overlay_frame(ui: &Ui) -> egui::Frame {
    egui::Frame::NONE
        .fill(get_overlay_bg(ui))
        .corner_radius(egui::CornerRadius::same(4))
        .inner_margin(egui::Margin::symmetric(6, 4))
}

/// Format zoom level as a multiple with consistent decimal places
fn format_zoom_multiple(zoom: f32) -> String {
    format!("{:.3}x", zoom)
}
