use std::sync::Arc;

use image::GrayImage;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, s};
use rayon::prelude::*;
use thiserror::Error;

use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::slice::Slice;
use crate::slice_stack::SliceStack;
use crate::transform::{CoordinateError, Extent, PixelPoint};
use crate::windowing::{self, WindowLevel};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolumeError {
    #[error("Cannot build a volume from an empty slice stack")]
    Empty,

    #[error("Slice {index} is {found:?} (width, height), expected {expected:?}")]
    InconsistentVolume {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("{orientation:?} index {index} out of range (0..{len})")]
    IndexOutOfRange {
        orientation: Orientation,
        index: usize,
        len: usize,
    },
}

/// Fractional voxel coordinate, `z` being the slice index in stack order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Voxel {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl Voxel {
    pub const fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }
}

/// A 2-D plane cut from a [`Volume`], indexed `[row, column]`.
///
/// Axial rasters are `[y][x]`. Sagittal rasters are `[y][z]` and coronal
/// rasters `[x][z]`, so the slice axis always runs left to right and a
/// crosshair position found in one plane maps onto the others through
/// [`Raster::to_voxel`] and [`Volume::project`] without flips.
#[derive(Debug, Clone)]
pub struct Raster {
    orientation: Orientation,
    index: usize,
    data: Array2<f32>,
    rescale_slope: f32,
    rescale_intercept: f32,
    column_scale: f64,
    pixel_spacing: (f64, f64),
}

impl Raster {
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Index of the plane along its normal axis.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn extent(&self) -> Result<Extent, CoordinateError> {
        Extent::from_dim(self.width(), self.height())
    }

    pub fn rescale_slope(&self) -> f32 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f32 {
        self.rescale_intercept
    }

    /// Raster columns per voxel along the horizontal axis.
    pub fn column_scale(&self) -> f64 {
        self.column_scale
    }

    /// `(between rows, between columns)` in mm.
    pub fn pixel_spacing(&self) -> (f64, f64) {
        self.pixel_spacing
    }

    pub fn render(&self, window: WindowLevel) -> Option<GrayImage> {
        windowing::apply_to_image(
            &self.data.view(),
            self.rescale_slope,
            self.rescale_intercept,
            window,
        )
    }

    /// Voxel under raster pixel `pixel`.
    pub fn to_voxel(&self, pixel: PixelPoint) -> Voxel {
        let plane = self.index as f64;
        match self.orientation {
            Orientation::Axial => Voxel::new(plane, pixel.y, pixel.x),
            Orientation::Sagittal => Voxel::new(pixel.x / self.column_scale, pixel.y, plane),
            Orientation::Coronal => Voxel::new(pixel.x / self.column_scale, plane, pixel.y),
        }
    }
}

/// Intensity volume built from a [`SliceStack`], indexed `[z, y, x]`.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    /// `(z, y, x)` voxel size in mm.
    spacing: (f64, f64, f64),
    rescale_slope: f32,
    rescale_intercept: f32,
}

impl Volume {
    pub fn from_stack(stack: &SliceStack) -> Result<Self, VolumeError> {
        let slices: Vec<&Arc<Slice>> = stack.ordered_slices().collect();
        let first = slices.first().ok_or(VolumeError::Empty)?;
        let expected = (first.width(), first.height());
        for (index, slice) in slices.iter().enumerate() {
            let found = (slice.width(), slice.height());
            if found != expected {
                return Err(VolumeError::InconsistentVolume {
                    index,
                    expected,
                    found,
                });
            }
        }

        let uniform_rescale = slices.iter().all(|slice| {
            slice.rescale_slope() == first.rescale_slope()
                && slice.rescale_intercept() == first.rescale_intercept()
        });
        let (rescale_slope, rescale_intercept) = if uniform_rescale {
            (first.rescale_slope(), first.rescale_intercept())
        } else {
            log::debug!("Slices disagree on rescale, storing Hounsfield units");
            (1.0, 0.0)
        };

        let (width, height) = expected;
        let mut data = Array3::<f32>::zeros((slices.len(), height, width));
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(slices.par_iter())
            .for_each(|(mut plane, slice)| {
                if uniform_rescale {
                    plane.assign(&slice.samples());
                } else {
                    let (slope, intercept) = (slice.rescale_slope(), slice.rescale_intercept());
                    plane.assign(&slice.samples().mapv(|raw| raw.mul_add(slope, intercept)));
                }
            });

        let geometry = first.geometry();
        let z_spacing = stack
            .mean_spacing()
            .or_else(|| Self::position_spacing(&slices))
            .unwrap_or(1.0);
        let spacing = (z_spacing, geometry.row_spacing, geometry.column_spacing);
        log::debug!(
            "Built volume {:?} with spacing {:?} from {:?} ordering",
            data.dim(),
            spacing,
            stack.source()
        );

        Ok(Self {
            data,
            spacing,
            rescale_slope,
            rescale_intercept,
        })
    }

    fn position_spacing(slices: &[&Arc<Slice>]) -> Option<f64> {
        let first = slices.first()?.geometry().projected_position();
        let last = slices.last()?.geometry().projected_position();
        let spacing = (last - first).abs() / (slices.len().checked_sub(1)?) as f64;
        (spacing.is_finite() && spacing > 0.0).then_some(spacing)
    }

    /// `(depth, height, width)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// `(z, y, x)` voxel size in mm.
    pub fn spacing(&self) -> (f64, f64, f64) {
        self.spacing
    }

    pub fn rescale_slope(&self) -> f32 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f32 {
        self.rescale_intercept
    }

    fn check_index(&self, orientation: Orientation, index: usize) -> Result<(), VolumeError> {
        let (depth, height, width) = self.dim();
        let len = match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        };
        if index < len {
            Ok(())
        } else {
            Err(VolumeError::IndexOutOfRange {
                orientation,
                index,
                len,
            })
        }
    }

    /// Horizontal raster columns per voxel for a plane.
    pub fn column_scale(&self, orientation: Orientation, interpolation: Interpolation) -> f64 {
        let (depth, _, _) = self.dim();
        let (z_spacing, y_spacing, x_spacing) = self.spacing;
        match (orientation, interpolation) {
            (Orientation::Axial, _) | (_, Interpolation::None) => 1.0,
            (Orientation::Sagittal, Interpolation::Bilinear) => {
                Interpolator::isotropic_len(depth, z_spacing, y_spacing) as f64 / depth as f64
            }
            (Orientation::Coronal, Interpolation::Bilinear) => {
                Interpolator::isotropic_len(depth, z_spacing, x_spacing) as f64 / depth as f64
            }
        }
    }

    pub fn plane(
        &self,
        orientation: Orientation,
        index: usize,
        interpolation: Interpolation,
    ) -> Result<Raster, VolumeError> {
        match orientation {
            Orientation::Axial => self.axial_plane(index),
            Orientation::Coronal => self.coronal_plane(index, interpolation),
            Orientation::Sagittal => self.sagittal_plane(index, interpolation),
        }
    }

    pub fn axial_plane(&self, z: usize) -> Result<Raster, VolumeError> {
        self.check_index(Orientation::Axial, z)?;
        let (_, y_spacing, x_spacing) = self.spacing;
        Ok(self.raster(
            Orientation::Axial,
            z,
            self.data.slice(s![z, .., ..]).to_owned(),
            1.0,
            (y_spacing, x_spacing),
        ))
    }

    /// Plane at column `x`: `raster[r][z] = slice(z)[r][x]`.
    pub fn sagittal_plane(
        &self,
        x: usize,
        interpolation: Interpolation,
    ) -> Result<Raster, VolumeError> {
        self.check_index(Orientation::Sagittal, x)?;
        let (z_spacing, y_spacing, _) = self.spacing;
        let plane = self.data.slice(s![.., .., x]);
        Ok(self.reconstructed(
            Orientation::Sagittal,
            x,
            plane.reversed_axes(),
            interpolation,
            y_spacing,
            z_spacing,
        ))
    }

    /// Plane at row `y`: `raster[c][z] = slice(z)[y][c]`.
    pub fn coronal_plane(
        &self,
        y: usize,
        interpolation: Interpolation,
    ) -> Result<Raster, VolumeError> {
        self.check_index(Orientation::Coronal, y)?;
        let (z_spacing, _, x_spacing) = self.spacing;
        let plane = self.data.slice(s![.., y, ..]);
        Ok(self.reconstructed(
            Orientation::Coronal,
            y,
            plane.reversed_axes(),
            interpolation,
            x_spacing,
            z_spacing,
        ))
    }

    fn reconstructed(
        &self,
        orientation: Orientation,
        index: usize,
        plane: ArrayView2<'_, f32>,
        interpolation: Interpolation,
        row_spacing: f64,
        z_spacing: f64,
    ) -> Raster {
        let column_scale = self.column_scale(orientation, interpolation);
        let (rows, columns) = plane.dim();
        let data = match interpolation {
            Interpolation::Bilinear if column_scale != 1.0 => {
                let target = ((columns as f64) * column_scale).round() as usize;
                Interpolator::resize(&plane, rows, target)
            }
            _ => plane.as_standard_layout().into_owned(),
        };
        Raster {
            orientation,
            index,
            data,
            rescale_slope: self.rescale_slope,
            rescale_intercept: self.rescale_intercept,
            column_scale,
            pixel_spacing: (row_spacing, z_spacing / column_scale),
        }
    }

    fn raster(
        &self,
        orientation: Orientation,
        index: usize,
        data: Array2<f32>,
        column_scale: f64,
        pixel_spacing: (f64, f64),
    ) -> Raster {
        Raster {
            orientation,
            index,
            data,
            rescale_slope: self.rescale_slope,
            rescale_intercept: self.rescale_intercept,
            column_scale,
            pixel_spacing,
        }
    }

    /// Plane index and raster pixel of `voxel` in an `orientation` plane.
    pub fn project(
        &self,
        voxel: Voxel,
        orientation: Orientation,
        interpolation: Interpolation,
    ) -> (usize, PixelPoint) {
        let scale = self.column_scale(orientation, interpolation);
        let plane = |v: f64| v.max(0.0).floor() as usize;
        match orientation {
            Orientation::Axial => (plane(voxel.z), PixelPoint::new(voxel.x, voxel.y)),
            Orientation::Sagittal => (plane(voxel.x), PixelPoint::new(voxel.z * scale, voxel.y)),
            Orientation::Coronal => (plane(voxel.y), PixelPoint::new(voxel.z * scale, voxel.x)),
        }
    }
}
