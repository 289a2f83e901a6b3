//! Rendering seam between parsed matrices and drawing surfaces

use egui::Color32;

use crate::color::{ProcessorPalette, Rgb};
use crate::error::Result;
use crate::spy::{NonzeroEntry, SparseMatrixDescriptor};

/// A drawing surface for spy plots.
///
/// Receives the matrix header once and then every nonzero with its color.
pub trait SpyRenderer {
    fn render<I>(&mut self, descriptor: &SparseMatrixDescriptor, markers: I) -> Result<()>
    where
        I: IntoIterator<Item = (NonzeroEntry, Rgb)>;
}

/// Pair each entry with its processor color, lazily
pub fn colored_entries<'a>(
    entries: &'a [NonzeroEntry],
    palette: &'a mut ProcessorPalette,
) -> impl Iterator<Item = (NonzeroEntry, Rgb)> + 'a {
    entries.iter().map(move |&e| (e, palette.color(e.proc)))
}

/// A nonzero ready for painting
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub entry: NonzeroEntry,
    pub color: Color32,
}

/// In-memory spy plot, painted every frame by the interactive widget
#[derive(Clone, Debug, Default)]
pub struct SpyScene {
    pub descriptor: SparseMatrixDescriptor,
    pub markers: Vec<Marker>,
}

impl SpyScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processors present in the scene with their colors, ascending by id
    pub fn legend(&self) -> Vec<(u32, Color32)> {
        let mut procs: Vec<(u32, Color32)> = self
            .markers
            .iter()
            .map(|m| (m.entry.proc, m.color))
            .collect();
        procs.sort_by_key(|&(proc, _)| proc);
        procs.dedup_by_key(|&mut (proc, _)| proc);
        procs
    }
}

impl SpyRenderer for SpyScene {
    fn render<I>(&mut self, descriptor: &SparseMatrixDescriptor, markers: I) -> Result<()>
    where
        I: IntoIterator<Item = (NonzeroEntry, Rgb)>,
    {
        self.descriptor = descriptor.clone();
        self.markers = markers
            .into_iter()
            .map(|(entry, color)| Marker {
                entry,
                color: color.to_color32(),
            })
            .collect();
        log::debug!(
            "Scene '{}' holds {} markers",
            self.descriptor.title,
            self.markers.len()
        );
        Ok(())
    }
}
