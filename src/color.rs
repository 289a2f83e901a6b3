//! Processor color assignment
//!
//! Processor ids are spread over the hue circle by walking a binary interval
//! tree breadth first:
//!
//! ```text
//!          1/2
//!        /     \
//!      1/4     3/4
//!     /   \   /   \
//!   1/8 3/8 5/8   7/8
//! ```
//!
//! Ids on the same tree level land maximally far apart, and every new level
//! fills the gaps left by the previous one. The whole circle is shifted by a
//! half turn so id 0 is cyan and id 1 is red.

use std::collections::HashMap;

use egui::Color32;

/// An RGB color with channels in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Convert to 8-bit channels (rounded)
    pub fn to_u8(self) -> [u8; 3] {
        [channel_to_u8(self.r), channel_to_u8(self.g), channel_to_u8(self.b)]
    }

    /// Convert to an egui color
    pub fn to_color32(self) -> Color32 {
        let [r, g, b] = self.to_u8();
        Color32::from_rgb(r, g, b)
    }
}

fn channel_to_u8(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Depth of the tree node holding `proc`: 0 for id 0, otherwise the number of
/// bits in the id. Equal to `ceil(log2(proc + 1))`, computed without floats.
pub fn tree_level(proc: u32) -> u32 {
    u32::BITS - proc.leading_zeros()
}

/// Hue in [0, 1) assigned to a processor id
pub fn processor_hue(proc: u32) -> f64 {
    let level = tree_level(proc);
    let denominator = 2f64.powi(level as i32);
    let numerator = 1.0 + (f64::from(proc) - denominator / 2.0) * 2.0;

    let mut hue = numerator / denominator - 0.5;
    if hue < 0.0 {
        hue += 1.0;
    }
    hue
}

/// HSV to RGB conversion, all components in [0, 1].
///
/// Uses the six-sector formula with `h = 1.0` wrapping back onto red.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u8 % 6 {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

/// Fully saturated, full value color for a processor id
pub fn processor_color(proc: u32) -> Rgb {
    hsv_to_rgb(processor_hue(proc), 1.0, 1.0)
}

/// Memoizing lookup of processor colors.
///
/// A matrix has many nonzeros per processor, so each id is converted once.
#[derive(Clone, Debug, Default)]
pub struct ProcessorPalette {
    cache: HashMap<u32, Rgb>,
}

impl ProcessorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for `proc`, computed on first use
    pub fn color(&mut self, proc: u32) -> Rgb {
        *self.cache.entry(proc).or_insert_with(|| processor_color(proc))
    }

    /// Number of distinct processor ids looked up so far
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
