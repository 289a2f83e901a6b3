//! Render configuration

use std::path::{Path, PathBuf};

use crate::error::{Result, SpyError};
use crate::layout::DEFAULT_MARKER_SIZE;

/// Default export size in pixels
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (1024, 1024);

/// Where the composed figure goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "wasm32"), derive(clap::ValueEnum))]
pub enum OutputBackend {
    /// Interactive window (native) or canvas (browser)
    Window,
    /// Raster image file
    Png,
    /// Vector image file
    Svg,
}

impl OutputBackend {
    /// Backend used when none is configured. Both native and browser builds
    /// have an interactive surface available.
    pub fn platform_default() -> Self {
        OutputBackend::Window
    }

    /// File extension written by this backend, if it writes files
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputBackend::Window => None,
            OutputBackend::Png => Some("png"),
            OutputBackend::Svg => Some("svg"),
        }
    }

    /// Infer a file backend from an output path's extension
    pub fn from_extension(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => Ok(OutputBackend::Png),
            Some("svg") => Ok(OutputBackend::Svg),
            _ => Err(SpyError::Config(format!(
                "cannot infer image format of {} (use .png or .svg)",
                path.display()
            ))),
        }
    }

    /// Pick the backend from an explicit choice and/or an output path
    pub fn resolve(explicit: Option<OutputBackend>, output: Option<&Path>) -> Result<Self> {
        match (explicit, output) {
            (Some(OutputBackend::Window), Some(path)) => Err(SpyError::Config(format!(
                "output file {} needs the png or svg backend",
                path.display()
            ))),
            (Some(backend), _) => Ok(backend),
            (None, Some(path)) => Self::from_extension(path),
            (None, None) => Ok(Self::platform_default()),
        }
    }
}

impl Default for OutputBackend {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Settings for one rendering pass
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Marker side as a fraction of a grid cell
    pub marker_size: f64,
    pub backend: OutputBackend,
    /// Explicit export path; derived from the input name when unset
    pub output: Option<PathBuf>,
    /// Export size in pixels, also the initial window size
    pub image_size: (u32, u32),
    /// Draw title, axes and tick labels
    pub annotate: bool,
    /// Extend the axes one cell past the last row and column
    pub include_last_cell: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            marker_size: DEFAULT_MARKER_SIZE,
            backend: OutputBackend::default(),
            output: None,
            image_size: DEFAULT_IMAGE_SIZE,
            annotate: true,
            include_last_cell: false,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        validate_marker_size(self.marker_size)?;
        if self.image_size.0 == 0 || self.image_size.1 == 0 {
            return Err(SpyError::Config(format!(
                "image size {}x{} has no area",
                self.image_size.0, self.image_size.1
            )));
        }
        Ok(())
    }

    /// Export path: the explicit output, or `input` with the backend's
    /// extension. `None` for the window backend.
    pub fn output_path(&self, input: &Path) -> Option<PathBuf> {
        let ext = self.backend.extension()?;
        Some(
            self.output
                .clone()
                .unwrap_or_else(|| input.with_extension(ext)),
        )
    }
}

/// Marker sizes must leave a nonempty square inside the unit cell
pub fn validate_marker_size(marker_size: f64) -> Result<()> {
    if marker_size > 0.0 && marker_size <= 1.0 {
        Ok(())
    } else {
        Err(SpyError::Config(format!(
            "marker size {} is outside (0, 1]",
            marker_size
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert!((config.marker_size - 0.8).abs() < 1e-12);
        assert_eq!(config.backend, OutputBackend::Window);
        assert!(config.annotate);
        assert!(!config.include_last_cell);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_marker_size() {
        for size in [0.0, -0.5, 1.5, f64::NAN] {
            let config = RenderConfig {
                marker_size: size,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "marker size {} accepted", size);
        }
        assert!(validate_marker_size(1.0).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let config = RenderConfig {
            image_size: (0, 100),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SpyError::Config(_))));
    }

    #[test]
    fn test_backend_from_extension() {
        assert_eq!(
            OutputBackend::from_extension(Path::new("a/b.PNG")).unwrap(),
            OutputBackend::Png
        );
        assert_eq!(
            OutputBackend::from_extension(Path::new("plot.svg")).unwrap(),
            OutputBackend::Svg
        );
        assert!(OutputBackend::from_extension(Path::new("plot.pdf")).is_err());
        assert!(OutputBackend::from_extension(Path::new("plot")).is_err());
    }

    #[test]
    fn test_backend_resolution() {
        let out = Path::new("x.svg");
        assert_eq!(OutputBackend::resolve(None, None).unwrap(), OutputBackend::Window);
        assert_eq!(OutputBackend::resolve(None, Some(out)).unwrap(), OutputBackend::Svg);
        assert_eq!(
            OutputBackend::resolve(Some(OutputBackend::Png), None).unwrap(),
            OutputBackend::Png
        );
        assert!(OutputBackend::resolve(Some(OutputBackend::Window), Some(out)).is_err());
    }

    #[test]
    fn test_output_path_derivation() {
        let input = Path::new("data/spies/A.spy");

        let window = RenderConfig::default();
        assert_eq!(window.output_path(input), None);

        let png = RenderConfig {
            backend: OutputBackend::Png,
            ..Default::default()
        };
        assert_eq!(png.output_path(input), Some(PathBuf::from("data/spies/A.png")));

        let explicit = RenderConfig {
            backend: OutputBackend::Svg,
            output: Some(PathBuf::from("out.svg")),
            ..Default::default()
        };
        assert_eq!(explicit.output_path(input), Some(PathBuf::from("out.svg")));
    }
}
