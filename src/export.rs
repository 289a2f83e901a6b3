//! PNG and SVG export through plotters

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;

use crate::color::Rgb;
use crate::config::{OutputBackend, RenderConfig};
use crate::error::{Result, SpyError};
use crate::layout::{marker_rect, AxisBounds};
use crate::render::SpyRenderer;
use crate::spy::{NonzeroEntry, SparseMatrixDescriptor};

const FONT_FAMILY: &str = "sans-serif";
const TITLE_FONT_SIZE: i32 = 24;
const CHART_MARGIN: u32 = 20;
const X_LABEL_AREA: u32 = 40;
const Y_LABEL_AREA: u32 = 50;
/// At most this many intervals between tick labels
const TICK_BINS: usize = 10;

fn render_error(e: impl std::fmt::Display) -> SpyError {
    SpyError::Render(e.to_string())
}

/// Register egui's bundled font with plotters, once per process
fn ensure_fonts() -> Result<()> {
    static FONTS: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            plotters::style::register_font(
                FONT_FAMILY,
                FontStyle::Normal,
                epaint_default_fonts::UBUNTU_LIGHT,
            )
            .map_err(|_| "cannot load plot font".to_string())
        })
        .clone()
        .map_err(SpyError::Render)
}

/// Tick label for an axis value, blank unless it is an integer
fn integer_label(v: f64) -> String {
    if (v - v.round()).abs() < 1e-6 {
        format!("{}", v.round() as i64)
    } else {
        String::new()
    }
}

/// Tick positions in chart coordinates: integer columns, and integer rows
/// negated to match the flipped y axis
fn tick_key_points(descriptor: &SparseMatrixDescriptor, bounds: &AxisBounds) -> (Vec<f64>, Vec<f64>) {
    let columns = bounds
        .column_ticks(descriptor, TICK_BINS)
        .into_iter()
        .map(|c| c as f64)
        .collect();
    let rows = bounds
        .row_ticks(descriptor, TICK_BINS)
        .into_iter()
        .map(|r| -(r as f64))
        .collect();
    (columns, rows)
}

fn draw_spy<DB, I>(
    root: DrawingArea<DB, Shift>,
    descriptor: &SparseMatrixDescriptor,
    markers: I,
    options: &DrawOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    I: IntoIterator<Item = (NonzeroEntry, Rgb)>,
{
    root.fill(&WHITE).map_err(render_error)?;
    let bounds = AxisBounds::new(descriptor, options.include_last_cell);
    let (x_ticks, y_ticks) = tick_key_points(descriptor, &bounds);

    let mut builder = ChartBuilder::on(&root);
    builder.margin(CHART_MARGIN);
    if options.annotate {
        builder
            .caption(descriptor.title.as_str(), (FONT_FAMILY, TITLE_FONT_SIZE).into_font())
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA);
    }

    // plotters' y axis points up, so rows are plotted negated to put row 1 on top
    let mut chart = builder
        .build_cartesian_2d(
            (bounds.x_min..bounds.x_max).with_key_points(x_ticks),
            (-bounds.y_bottom..-bounds.y_top).with_key_points(y_ticks),
        )
        .map_err(render_error)?;

    if options.annotate {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_label_formatter(&|x: &f64| integer_label(*x))
            .y_label_formatter(&|y: &f64| integer_label(-*y))
            .draw()
            .map_err(render_error)?;
    }

    chart
        .draw_series(markers.into_iter().filter_map(|(entry, color)| {
            // plotters draws past the axes, so markers are cut to the bounds here
            let r = bounds.clip(marker_rect(&entry, options.marker_size))?;
            let [red, green, blue] = color.to_u8();
            Some(Rectangle::new(
                [(r.x_min, -r.y_min), (r.x_max, -r.y_max)],
                RGBColor(red, green, blue).filled(),
            ))
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    Ok(())
}

/// Settings shared by every export backend
#[derive(Clone, Copy, Debug)]
struct DrawOptions {
    marker_size: f64,
    annotate: bool,
    include_last_cell: bool,
}

impl From<&RenderConfig> for DrawOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            marker_size: config.marker_size,
            annotate: config.annotate,
            include_last_cell: config.include_last_cell,
        }
    }
}

/// Writes spy plots to PNG or SVG files
#[derive(Clone, Debug)]
pub struct FileExporter {
    path: PathBuf,
    backend: OutputBackend,
    image_size: (u32, u32),
    options: DrawOptions,
}

impl FileExporter {
    /// Exporter for `config`; the backend must be a file backend
    pub fn new(path: PathBuf, config: &RenderConfig) -> Result<Self> {
        if config.backend == OutputBackend::Window {
            return Err(SpyError::Config(
                "the window backend does not write files".to_string(),
            ));
        }
        config.validate()?;
        Ok(Self {
            path,
            backend: config.backend,
            image_size: config.image_size,
            options: DrawOptions::from(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpyRenderer for FileExporter {
    fn render<I>(&mut self, descriptor: &SparseMatrixDescriptor, markers: I) -> Result<()>
    where
        I: IntoIterator<Item = (NonzeroEntry, Rgb)>,
    {
        if self.options.annotate {
            ensure_fonts()?;
        }
        match self.backend {
            OutputBackend::Png => draw_spy(
                BitMapBackend::new(&self.path, self.image_size).into_drawing_area(),
                descriptor,
                markers,
                &self.options,
            )?,
            OutputBackend::Svg => draw_spy(
                SVGBackend::new(&self.path, self.image_size).into_drawing_area(),
                descriptor,
                markers,
                &self.options,
            )?,
            OutputBackend::Window => {
                return Err(SpyError::Config(
                    "the window backend does not write files".to_string(),
                ))
            }
        }
        log::info!("Spy plot written to {}", self.path.display());
        Ok(())
    }
}

/// Render a spy plot to an SVG document in memory
pub fn render_svg_string<I>(
    descriptor: &SparseMatrixDescriptor,
    markers: I,
    config: &RenderConfig,
) -> Result<String>
where
    I: IntoIterator<Item = (NonzeroEntry, Rgb)>,
{
    config.validate()?;
    if config.annotate {
        ensure_fonts()?;
    }
    let mut svg = String::new();
    draw_spy(
        SVGBackend::with_string(&mut svg, config.image_size).into_drawing_area(),
        descriptor,
        markers,
        &DrawOptions::from(config),
    )?;
    Ok(svg)
}
