//! Conversions between patient space (mm), image pixel indices and screen
//! pixels.
//!
//! Pixel coordinates are continuous: `x` runs along a row (column index),
//! `y` down a column (row index), and pixel `(i, j)` covers
//! `[i, i + 1) x [j, j + 1)`. Screen coordinates are canvas pixels with the
//! origin in the top-left corner.

use std::ops::{Add, Mul, Sub};

use thiserror::Error;

use crate::enums::ScalePolicy;
use crate::geometry::Point2;
use crate::view::ViewState;

/// Allowed deviation of a direction cosine from unit length, and of the
/// row/column dot product from zero.
pub const ORIENTATION_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Degenerate image orientation: {0}")]
    DegenerateOrientation(&'static str),

    #[error("Invalid pixel spacing ({row}, {column})")]
    InvalidSpacing { row: f64, column: f64 },

    #[error("Non-finite coordinate")]
    NonFinite,

    #[error("Empty extent {width}x{height}")]
    EmptyExtent { width: f64, height: f64 },
}

/// A point or direction in patient space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Continuous image coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height of an image or a canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Result<Self, CoordinateError> {
        if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
            Ok(Self { width, height })
        } else {
            Err(CoordinateError::EmptyExtent { width, height })
        }
    }

    pub fn from_dim(width: usize, height: usize) -> Result<Self, CoordinateError> {
        Self::new(width as f64, height as f64)
    }

    pub fn contains(&self, point: PixelPoint) -> bool {
        (0.0..self.width).contains(&point.x) && (0.0..self.height).contains(&point.y)
    }
}

/// Affine placement of an image plane in patient space.
///
/// `row_cosine` points along a row (increasing column index) and
/// `column_cosine` down a column (increasing row index). `row_spacing` is the
/// distance between rows, `column_spacing` the distance between columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGeometry {
    pub position: Vec3,
    pub row_cosine: Vec3,
    pub column_cosine: Vec3,
    pub row_spacing: f64,
    pub column_spacing: f64,
}

impl SliceGeometry {
    /// Axial plane at `position` with the standard patient orientation.
    pub fn axial(position: Vec3, row_spacing: f64, column_spacing: f64) -> Self {
        Self {
            position,
            row_cosine: Vec3::new(1.0, 0.0, 0.0),
            column_cosine: Vec3::new(0.0, 1.0, 0.0),
            row_spacing,
            column_spacing,
        }
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.position.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(self.row_spacing > 0.0 && self.column_spacing > 0.0)
            || !self.row_spacing.is_finite()
            || !self.column_spacing.is_finite()
        {
            return Err(CoordinateError::InvalidSpacing {
                row: self.row_spacing,
                column: self.column_spacing,
            });
        }
        let unit = |v: Vec3| (v.length() - 1.0).abs() <= ORIENTATION_TOLERANCE;
        if !unit(self.row_cosine) {
            return Err(CoordinateError::DegenerateOrientation(
                "row cosine is not unit length",
            ));
        }
        if !unit(self.column_cosine) {
            return Err(CoordinateError::DegenerateOrientation(
                "column cosine is not unit length",
            ));
        }
        if self.row_cosine.dot(self.column_cosine).abs() > ORIENTATION_TOLERANCE {
            return Err(CoordinateError::DegenerateOrientation(
                "row and column cosines are not orthogonal",
            ));
        }
        Ok(())
    }

    /// Unit normal of the image plane.
    pub fn normal(&self) -> Vec3 {
        self.row_cosine.cross(self.column_cosine)
    }

    /// Position projected on the plane normal, the through-plane coordinate
    /// used to order slices. Falls back to the raw z component when the
    /// orientation is degenerate.
    pub fn projected_position(&self) -> f64 {
        self.through_plane(self.position)
    }

    /// Coordinate of `world` along the plane normal, on the same axis as
    /// [`projected_position`](Self::projected_position).
    pub fn through_plane(&self, world: Vec3) -> f64 {
        let normal = self.normal();
        if (normal.length() - 1.0).abs() <= ORIENTATION_TOLERANCE {
            world.dot(normal)
        } else {
            world.z
        }
    }

    /// In-plane coordinates of `world`: its projections on the row and
    /// column cosines. Together with [`projected_position`] they locate the
    /// point in the slice's own frame, whatever the plane's orientation.
    ///
    /// [`projected_position`]: Self::projected_position
    pub fn world_to_plane(&self, world: Vec3) -> Result<Point2, CoordinateError> {
        if !world.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        Ok(Point2::new(
            world.dot(self.row_cosine),
            world.dot(self.column_cosine),
        ))
    }

    /// Point on this slice's plane with in-plane coordinates `point`.
    pub fn plane_to_world(&self, point: Point2) -> Result<Vec3, CoordinateError> {
        self.validate()?;
        if !(point.x.is_finite() && point.y.is_finite()) {
            return Err(CoordinateError::NonFinite);
        }
        let in_plane = self.row_cosine * point.x + self.column_cosine * point.y;
        let offset = self.projected_position() - in_plane.dot(self.normal());
        Ok(in_plane + self.normal() * offset)
    }

    pub fn world_to_pixel(&self, world: Vec3) -> Result<PixelPoint, CoordinateError> {
        self.validate()?;
        if !world.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        let delta = world - self.position;
        Ok(PixelPoint {
            x: delta.dot(self.row_cosine) / self.column_spacing,
            y: delta.dot(self.column_cosine) / self.row_spacing,
        })
    }

    pub fn pixel_to_world(&self, pixel: PixelPoint) -> Result<Vec3, CoordinateError> {
        self.validate()?;
        if !(pixel.x.is_finite() && pixel.y.is_finite()) {
            return Err(CoordinateError::NonFinite);
        }
        Ok(self.position
            + self.row_cosine * (pixel.x * self.column_spacing)
            + self.column_cosine * (pixel.y * self.row_spacing))
    }
}

/// Placement of an image on a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    pub image: Extent,
    pub canvas: Extent,
    pub policy: ScalePolicy,
}

impl ScreenMapping {
    pub fn new(image: Extent, canvas: Extent, policy: ScalePolicy) -> Self {
        Self {
            image,
            canvas,
            policy,
        }
    }

    /// Canvas pixels per image pixel at zoom 1.
    pub fn base_scale(&self) -> f64 {
        let sx = self.canvas.width / self.image.width;
        let sy = self.canvas.height / self.image.height;
        match self.policy {
            ScalePolicy::Fit => sx.min(sy),
            ScalePolicy::Fill => sx.max(sy),
        }
    }

    pub fn scale(&self, view: &ViewState) -> f64 {
        self.base_scale() * view.zoom()
    }

    pub fn pixel_to_screen(&self, pixel: PixelPoint, view: &ViewState) -> ScreenPoint {
        let scale = self.scale(view);
        ScreenPoint {
            x: self.canvas.width / 2.0 + (pixel.x - self.image.width / 2.0) * scale + view.pan_x(),
            y: self.canvas.height / 2.0 + (pixel.y - self.image.height / 2.0) * scale
                + view.pan_y(),
        }
    }

    /// Inverse of [`pixel_to_screen`](Self::pixel_to_screen) without the
    /// bounds check.
    pub fn screen_to_pixel_unbounded(&self, screen: ScreenPoint, view: &ViewState) -> PixelPoint {
        let scale = self.scale(view);
        PixelPoint {
            x: (screen.x - self.canvas.width / 2.0 - view.pan_x()) / scale + self.image.width / 2.0,
            y: (screen.y - self.canvas.height / 2.0 - view.pan_y()) / scale
                + self.image.height / 2.0,
        }
    }

    /// Image pixel under a screen point, `None` when it falls outside the image.
    pub fn screen_to_pixel(&self, screen: ScreenPoint, view: &ViewState) -> Option<PixelPoint> {
        let pixel = self.screen_to_pixel_unbounded(screen, view);
        self.image.contains(pixel).then_some(pixel)
    }
}

/// Full world <-> screen chain for one slice under one view.
///
/// The view is borrowed for the duration of a call sequence rather than
/// looked up from shared state.
#[derive(Debug, Clone, Copy)]
pub struct SpatialTransform<'a> {
    geometry: &'a SliceGeometry,
    mapping: ScreenMapping,
    view: &'a ViewState,
}

impl<'a> SpatialTransform<'a> {
    pub fn new(
        geometry: &'a SliceGeometry,
        mapping: ScreenMapping,
        view: &'a ViewState,
    ) -> Result<Self, CoordinateError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            mapping,
            view,
        })
    }

    pub fn geometry(&self) -> &SliceGeometry {
        self.geometry
    }

    pub fn mapping(&self) -> &ScreenMapping {
        &self.mapping
    }

    pub fn world_to_screen(&self, world: Vec3) -> Result<ScreenPoint, CoordinateError> {
        let pixel = self.geometry.world_to_pixel(world)?;
        Ok(self.mapping.pixel_to_screen(pixel, self.view))
    }

    /// Patient-space point under the pointer, `None` when the pointer is off
    /// the image.
    pub fn screen_to_world(&self, screen: ScreenPoint) -> Result<Option<Vec3>, CoordinateError> {
        match self.mapping.screen_to_pixel(screen, self.view) {
            Some(pixel) => self.geometry.pixel_to_world(pixel).map(Some),
            None => Ok(None),
        }
    }

    /// In-plane point under the pointer, `None` off the image.
    pub fn screen_to_plane(&self, screen: ScreenPoint) -> Result<Option<Point2>, CoordinateError> {
        match self.screen_to_world(screen)? {
            Some(world) => self.geometry.world_to_plane(world).map(Some),
            None => Ok(None),
        }
    }

    pub fn plane_to_screen(&self, point: Point2) -> Result<ScreenPoint, CoordinateError> {
        self.world_to_screen(self.geometry.plane_to_world(point)?)
    }

    /// Millimetres covered by a horizontal run of `screen_length` canvas
    /// pixels, i.e. along a row.
    pub fn screen_to_world_length(&self, screen_length: f64) -> f64 {
        screen_length / self.mapping.scale(self.view) * self.geometry.column_spacing
    }

    /// Horizontal and vertical canvas extent of `world_length` mm. They differ
    /// when the pixels are not square.
    pub fn world_to_screen_radii(&self, world_length: f64) -> (f64, f64) {
        let scale = self.mapping.scale(self.view);
        (
            world_length / self.geometry.column_spacing * scale,
            world_length / self.geometry.row_spacing * scale,
        )
    }
}
