use serde::{Deserialize, Serialize};

/// Anatomical plane of a raster taken from a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Resampling applied to reconstructed planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Slice axis resampled to the in-plane spacing so the raster keeps its
    /// physical aspect ratio.
    Bilinear,
    /// One raster column per acquired slice.
    #[default]
    None,
}

/// Spatial key used to order the slices of a stack.
///
/// `Auto` picks the first source every slice provides, in the order
/// slice location, projected image position, instance number, input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Auto,
    SliceLocation,
    ImagePositionPatient,
    InstanceNumber,
    None,
}

/// How the image is scaled onto the canvas before zoom is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalePolicy {
    /// The whole image is visible at zoom 1.
    #[default]
    Fit,
    /// The canvas is fully covered at zoom 1, cropping the longer image axis.
    Fill,
}

/// Effect of a brush stroke on the contour it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Additive,
    Subtractive,
}

impl Operation {
    /// Operation chosen at drag start: strokes starting inside the contour
    /// erase, strokes starting outside paint. `invert` swaps the two.
    pub fn detect(starts_inside: bool, invert: bool) -> Self {
        if starts_inside != invert {
            Operation::Subtractive
        } else {
            Operation::Additive
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Additive => "add",
            Operation::Subtractive => "erase",
        }
    }
}
