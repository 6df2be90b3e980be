use std::fmt;

use image::GrayImage;
use ndarray::{Array2, ArrayView2};

use crate::transform::{CoordinateError, Extent, PixelPoint, SliceGeometry, Vec3};
use crate::windowing::{self, WindowLevel};

/// Unique identity of a decoded slice, e.g. its SOP Instance UID or file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceKey(pub String);

impl From<&str> for SliceKey {
    fn from(value: &str) -> Self {
        SliceKey(value.to_string())
    }
}

impl From<String> for SliceKey {
    fn from(value: String) -> Self {
        SliceKey(value)
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded image plane with its spatial metadata. Immutable once built.
#[derive(Debug, Clone)]
pub struct Slice {
    key: SliceKey,
    samples: Array2<f32>,
    geometry: SliceGeometry,
    rescale_slope: f32,
    rescale_intercept: f32,
    slice_location: Option<f64>,
    instance_number: Option<i32>,
}

impl Slice {
    /// `samples` is indexed `[row, column]`.
    pub fn new(key: impl Into<SliceKey>, samples: Array2<f32>, geometry: SliceGeometry) -> Self {
        Self {
            key: key.into(),
            samples,
            geometry,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            slice_location: None,
            instance_number: None,
        }
    }

    pub fn with_rescale(mut self, slope: f32, intercept: f32) -> Self {
        self.rescale_slope = if slope.is_finite() && slope != 0.0 { slope } else { 1.0 };
        self.rescale_intercept = if intercept.is_finite() { intercept } else { 0.0 };
        self
    }

    pub fn with_slice_location(mut self, location: Option<f64>) -> Self {
        self.slice_location = location.filter(|l| l.is_finite());
        self
    }

    pub fn with_instance_number(mut self, number: Option<i32>) -> Self {
        self.instance_number = number;
        self
    }

    pub fn key(&self) -> &SliceKey {
        &self.key
    }

    pub fn samples(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    pub fn geometry(&self) -> &SliceGeometry {
        &self.geometry
    }

    pub fn width(&self) -> usize {
        self.samples.dim().1
    }

    pub fn height(&self) -> usize {
        self.samples.dim().0
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

    pub fn slice_location(&self) -> Option<f64> {
        self.slice_location
    }

    pub fn instance_number(&self) -> Option<i32> {
        self.instance_number
    }

    /// Through-plane world coordinate of this slice.
    pub fn position_z(&self) -> f64 {
        self.geometry.projected_position()
    }

    /// Stored value at a continuous pixel position (nearest neighbour),
    /// `None` outside the image.
    pub fn sample_at(&self, pixel: PixelPoint) -> Option<f32> {
        if pixel.x < 0.0 || pixel.y < 0.0 {
            return None;
        }
        self.samples
            .get([pixel.y.floor() as usize, pixel.x.floor() as usize])
            .copied()
    }

    pub fn hu_at(&self, pixel: PixelPoint) -> Option<f32> {
        self.sample_at(pixel)
            .map(|raw| raw.mul_add(self.rescale_slope, self.rescale_intercept))
    }

    pub fn world_to_pixel(&self, world: Vec3) -> Result<PixelPoint, CoordinateError> {
        self.geometry.world_to_pixel(world)
    }

    pub fn pixel_to_world(&self, pixel: PixelPoint) -> Result<Vec3, CoordinateError> {
        self.geometry.pixel_to_world(pixel)
    }

    /// Full-resolution windowed rendering of this slice.
    pub fn render(&self, window: WindowLevel) -> Option<GrayImage> {
        windowing::apply_to_image(
            &self.samples.view(),
            self.rescale_slope,
            self.rescale_intercept,
            window,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Slice {
        let samples = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32);
        Slice::new(
            "ramp",
            samples,
            SliceGeometry::axial(Vec3::new(0.0, 0.0, 5.0), 1.0, 1.0),
        )
        .with_rescale(2.0, -1.0)
    }

    #[test]
    fn test_dimensions_and_sampling() {
        let slice = ramp();
        assert_eq!((slice.width(), slice.height()), (4, 3));
        assert_eq!(slice.sample_at(PixelPoint::new(3.9, 2.1)), Some(11.0));
        assert_eq!(slice.hu_at(PixelPoint::new(1.0, 0.0)), Some(1.0));
        assert_eq!(slice.sample_at(PixelPoint::new(4.0, 0.0)), None);
        assert_eq!(slice.sample_at(PixelPoint::new(-0.5, 0.0)), None);
        assert_eq!(slice.position_z(), 5.0);
    }

    #[test]
    fn test_invalid_rescale_falls_back() {
        let slice = ramp().with_rescale(0.0, f32::NAN);
        assert_eq!(slice.rescale_slope(), 1.0);
        assert_eq!(slice.rescale_intercept(), 0.0);
    }

    #[test]
    fn test_render() {
        let image = ramp().render(WindowLevel::new(22.0, 10.0)).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        assert_eq!(image.get_pixel(3, 2).0[0], 255);
    }
}
