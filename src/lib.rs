//! spyplot - Spy plots of distributed sparse matrices
//!
//! Reads spy files (a title, a `rows cols nonzeros` header and one
//! `row col proc` line per nonzero) and draws every nonzero as a square
//! colored by the processor that owns it. Plots are shown in a native window,
//! in a browser canvas through WebAssembly, or exported to PNG/SVG.
//!
//! ## Architecture
//!
//! - `spy`: spy file reader and writer
//! - `color`: processor id to color mapping
//! - `SpyRenderer`: drawing seam implemented by `SpyScene` (egui) and
//!   `FileExporter` (plotters)
//! - `SpyPlotWidget`: self-contained egui widget with all viewing state
//! - `SpyViewerApp`: thin eframe App shell that hosts the widget
//! - `SpyViewerHandle`: WASM interface for JavaScript to control the viewer

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use web_sys::HtmlCanvasElement;

pub mod app;
pub mod color;
pub mod config;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod export;
pub mod layout;
pub mod render;
pub mod spy;
pub mod stats;
pub mod widget;

pub use app::SpyViewerApp;
pub use color::{processor_color, processor_hue, ProcessorPalette, Rgb};
pub use config::{OutputBackend, RenderConfig};
pub use error::{ParseError, ParseErrorKind, Result, SpyError};
#[cfg(not(target_arch = "wasm32"))]
pub use export::FileExporter;
pub use render::{colored_entries, SpyRenderer, SpyScene};
pub use spy::{
    parse_spy, parse_spy_str, read_spy_file, save_spy, write_spy, NonzeroEntry,
    SparseMatrixDescriptor, SpyMatrix, SpyReader,
};
pub use stats::PartitionStats;
pub use widget::SpyPlotWidget;

/// Read a spy file and render it as configured
#[cfg(not(target_arch = "wasm32"))]
pub fn run(input: &std::path::Path, config: &RenderConfig) -> Result<()> {
    let matrix = read_spy_file(input)?;
    render_matrix(&matrix, input, config)?;
    Ok(())
}

/// Render a parsed matrix with the configured backend.
///
/// Returns the written file for the file backends; the window backend
/// returns once the window is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn render_matrix(
    matrix: &SpyMatrix,
    input: &std::path::Path,
    config: &RenderConfig,
) -> Result<Option<std::path::PathBuf>> {
    config.validate()?;
    let Some(path) = config.output_path(input) else {
        show_window(matrix, config)?;
        return Ok(None);
    };

    let mut exporter = FileExporter::new(path, config)?;
    let mut palette = ProcessorPalette::new();
    exporter.render(&matrix.descriptor, colored_entries(&matrix.entries, &mut palette))?;
    Ok(Some(exporter.path().to_path_buf()))
}

/// Open a native window showing the matrix; blocks until it is closed
#[cfg(not(target_arch = "wasm32"))]
fn show_window(matrix: &SpyMatrix, config: &RenderConfig) -> Result<()> {
    let mut widget = SpyPlotWidget::new();
    widget.set_marker_size(config.marker_size)?;
    widget.set_include_last_cell(config.include_last_cell);
    widget.set_matrix(matrix)?;
    let widget = std::rc::Rc::new(std::cell::RefCell::new(widget));

    let (width, height) = config.image_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("spyplot - {}", matrix.descriptor.title))
            .with_inner_size([width as f32, height as f32]),
        ..Default::default()
    };

    log::debug!("Opening {}x{} window", width, height);
    eframe::run_native(
        "spyplot",
        options,
        Box::new(move |cc| Ok(Box::new(SpyViewerApp::new(cc, widget)))),
    )
    .map_err(|e| SpyError::Render(e.to_string()))
}

#[cfg(target_arch = "wasm32")]
fn to_js_error(e: SpyError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A handle to a viewer instance. Each handle manages its own canvas and state.
///
/// This struct is exposed to JavaScript and provides methods to control the viewer.
/// It holds an Rc to the widget so it can call methods on it, and also stores
/// the eframe runner for the application lifecycle.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct SpyViewerHandle {
    /// The widget instance (shared with SpyViewerApp)
    widget: Rc<RefCell<SpyPlotWidget>>,
    /// The eframe runner (kept alive to maintain the render loop)
    runner: eframe::WebRunner,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl SpyViewerHandle {
    /// Create a new viewer instance attached to the given canvas element.
    /// Returns a promise that resolves to a SpyViewerHandle when initialization completes.
    #[wasm_bindgen]
    pub async fn create(canvas: HtmlCanvasElement) -> std::result::Result<SpyViewerHandle, JsValue> {
        #[cfg(debug_assertions)]
        {
            eframe::WebLogger::init(log::LevelFilter::Debug).ok();
        }
        #[cfg(not(debug_assertions))]
        {
            eframe::WebLogger::init(log::LevelFilter::Warn).ok();
        }

        let widget = Rc::new(RefCell::new(SpyPlotWidget::new()));
        let widget_for_app = widget.clone();

        let web_options = eframe::WebOptions::default();
        let runner = eframe::WebRunner::new();

        runner
            .start(
                canvas,
                web_options,
                Box::new(move |cc| Ok(Box::new(SpyViewerApp::new(cc, widget_for_app)))),
            )
            .await?;

        Ok(SpyViewerHandle { widget, runner })
    }

    /// Parse spy file text and display it
    #[wasm_bindgen(js_name = loadSpy)]
    pub fn load_spy(&self, text: &str) -> std::result::Result<(), JsValue> {
        let matrix = parse_spy_str(text).map_err(to_js_error)?;
        self.widget
            .borrow_mut()
            .set_matrix(&matrix)
            .map_err(to_js_error)
    }

    /// Set marker side as a fraction of a cell, in (0, 1]
    #[wasm_bindgen(js_name = setMarkerSize)]
    pub fn set_marker_size(&self, size: f64) -> std::result::Result<(), JsValue> {
        self.widget
            .borrow_mut()
            .set_marker_size(size)
            .map_err(to_js_error)
    }

    /// Extend the axes one cell past the last row and column
    #[wasm_bindgen(js_name = setIncludeLastCell)]
    pub fn set_include_last_cell(&self, include: bool) {
        self.widget.borrow_mut().set_include_last_cell(include);
    }

    /// End event loop and release resources
    #[wasm_bindgen(js_name = destroy)]
    pub fn destroy(&self) {
        self.runner.destroy();
    }

    /// Zoom in by one step (1.25x)
    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) {
        self.widget.borrow_mut().zoom_in();
    }

    /// Zoom out by one step (1/1.25x)
    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) {
        self.widget.borrow_mut().zoom_out();
    }

    /// Reset zoom and pan to fit-to-view
    #[wasm_bindgen(js_name = zoomToFit)]
    pub fn zoom_to_fit(&self) {
        self.widget.borrow_mut().zoom_to_fit();
    }

    /// Get current zoom level (1.0 = fit to view)
    #[wasm_bindgen(js_name = getZoom)]
    pub fn get_zoom(&self) -> f32 {
        self.widget.borrow().zoom_level()
    }

    /// Partition statistics of the loaded matrix as pretty-printed JSON
    #[wasm_bindgen(js_name = getStatsJson)]
    pub fn get_stats_json(&self) -> std::result::Result<String, JsValue> {
        let widget = self.widget.borrow();
        let stats = widget
            .stats()
            .ok_or_else(|| JsValue::from_str("no spy file loaded"))?;
        stats
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Color of a processor id as [r, g, b] bytes
    #[wasm_bindgen(js_name = getProcessorColor)]
    pub fn get_processor_color(&self, proc: u32) -> js_sys::Uint8Array {
        let rgb = processor_color(proc).to_u8();
        let result = js_sys::Uint8Array::new_with_length(3);
        result.copy_from(&rgb);
        result
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_run_missing_file() {
        let err = run(Path::new("no/such/file.spy"), &RenderConfig::default()).unwrap_err();
        assert!(matches!(err, SpyError::FileNotFound { .. }));
    }

    #[test]
    fn test_run_exports_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("matrix.spy");
        std::fs::write(&input, "# test\nTitle\n3 3 2\n1 1 0\n2 2 1\n").unwrap();

        let config = RenderConfig {
            backend: OutputBackend::Svg,
            image_size: (300, 300),
            ..Default::default()
        };
        run(&input, &config).unwrap();

        let svg = std::fs::read_to_string(dir.path().join("matrix.svg")).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_render_matrix_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plot.png");
        let matrix = parse_spy_str("T\n2 2 1\n2 1 3\n").unwrap();
        let config = RenderConfig {
            backend: OutputBackend::Png,
            output: Some(out.clone()),
            image_size: (200, 200),
            annotate: false,
            ..Default::default()
        };

        let written = render_matrix(&matrix, Path::new("ignored.spy"), &config).unwrap();
        assert_eq!(written.as_deref(), Some(out.as_path()));
        assert!(out.exists());
    }

    #[test]
    fn test_render_matrix_rejects_bad_marker_size() {
        let matrix = parse_spy_str("T\n1 1 0\n").unwrap();
        let config = RenderConfig {
            backend: OutputBackend::Svg,
            marker_size: 2.0,
            ..Default::default()
        };
        let err = render_matrix(&matrix, Path::new("m.spy"), &config).unwrap_err();
        assert!(matches!(err, SpyError::Config(_)));
    }
}
