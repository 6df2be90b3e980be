//! Window/level mapping of rescaled intensities to 8-bit grayscale.

use image::{GrayImage, ImageBuffer};
use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Smallest accepted window width.
pub const MIN_WINDOW_WIDTH: f32 = 1.0;

/// Common CT display windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPreset {
    SoftTissue,
    Lung,
    Bone,
    Brain,
}

/// Linear contrast window over Hounsfield-like units.
///
/// The width is clamped to [`MIN_WINDOW_WIDTH`] on every construction path,
/// deserialization included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWindow")]
pub struct WindowLevel {
    width: f32,
    center: f32,
}

#[derive(Deserialize)]
struct RawWindow {
    width: f32,
    center: f32,
}

impl From<RawWindow> for WindowLevel {
    fn from(raw: RawWindow) -> Self {
        WindowLevel::new(raw.width, raw.center)
    }
}

impl Default for WindowLevel {
    fn default() -> Self {
        Self::preset(WindowPreset::SoftTissue)
    }
}

impl WindowLevel {
    pub fn new(width: f32, center: f32) -> Self {
        let width = if width.is_finite() {
            width.max(MIN_WINDOW_WIDTH)
        } else {
            MIN_WINDOW_WIDTH
        };
        let center = if center.is_finite() { center } else { 0.0 };
        Self { width, center }
    }

    pub fn preset(preset: WindowPreset) -> Self {
        match preset {
            WindowPreset::SoftTissue => Self::new(400.0, 40.0),
            WindowPreset::Lung => Self::new(1500.0, -600.0),
            WindowPreset::Bone => Self::new(1800.0, 400.0),
            WindowPreset::Brain => Self::new(80.0, 40.0),
        }
    }

    /// Window spanning `[min, max]`.
    pub fn from_range(min: f32, max: f32) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self::new(hi - lo, lo + (hi - lo) / 2.0)
    }

    /// Window spanning the finite rescaled values of `samples`, `None` if
    /// there are none.
    pub fn auto(samples: &[f32], slope: f32, intercept: f32) -> Option<Self> {
        let (min, max) = samples
            .par_iter()
            .map(|&raw| raw.mul_add(slope, intercept))
            .filter(|hu| hu.is_finite())
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), hu| (lo.min(hu), hi.max(hu)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(a, b), (c, d)| (a.min(c), b.max(d)),
            );
        (min <= max).then(|| Self::from_range(min, max))
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn center(&self) -> f32 {
        self.center
    }

    pub fn lower_bound(&self) -> f32 {
        self.center - self.width / 2.0
    }

    pub fn upper_bound(&self) -> f32 {
        self.center + self.width / 2.0
    }

    /// Window shifted by a drag gesture. The width stays clamped.
    pub fn adjust(&self, d_width: f32, d_center: f32) -> Self {
        Self::new(self.width + d_width, self.center + d_center)
    }

    /// Gray value of one Hounsfield sample. NaN maps to 0.
    #[inline]
    pub fn map(&self, hu: f32) -> u8 {
        let lower = self.lower_bound();
        if hu.is_nan() || hu <= lower {
            0
        } else if hu >= self.upper_bound() {
            u8::MAX
        } else {
            let t = ((hu - lower) / self.width).clamp(0.0, 1.0);
            (t * 255.0).round() as u8
        }
    }

    /// Gray value of one stored sample after applying the modality rescale.
    #[inline]
    pub fn map_raw(&self, raw: f32, slope: f32, intercept: f32) -> u8 {
        self.map(raw.mul_add(slope, intercept))
    }
}

/// Rescales and windows `samples` into gray bytes, in the same order.
pub fn apply(samples: &[f32], slope: f32, intercept: f32, window: WindowLevel) -> Vec<u8> {
    samples
        .par_iter()
        .map(|&raw| window.map_raw(raw, slope, intercept))
        .collect()
}

/// Windows a `(rows, columns)` raster into an image of the same size.
pub fn apply_to_image(
    samples: &ArrayView2<'_, f32>,
    slope: f32,
    intercept: f32,
    window: WindowLevel,
) -> Option<GrayImage> {
    let (height, width) = samples.dim();
    let pixel_data: Vec<u8> = match samples.as_slice() {
        Some(contiguous) => apply(contiguous, slope, intercept, window),
        None => samples
            .iter()
            .map(|&raw| window.map_raw(raw, slope, intercept))
            .collect(),
    };
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
}
