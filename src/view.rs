use serde::{Deserialize, Serialize};

use crate::transform::{Extent, ScreenPoint};

/// Bounds for [`ViewState::zoom`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: 0.1, max: 5.0 }
    }
}

impl ZoomLimits {
    pub fn clamp(&self, zoom: f64) -> f64 {
        let zoom = if zoom.is_nan() { 1.0 } else { zoom };
        zoom.max(self.min).min(self.max)
    }
}

/// Zoom and pan of one rendering session.
///
/// Only changed through the methods below, so zoom always stays within the
/// configured limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
    limits: ZoomLimits,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl ViewState {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            zoom: limits.clamp(1.0),
            pan_x: 0.0,
            pan_y: 0.0,
            limits,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan_x(&self) -> f64 {
        self.pan_x
    }

    pub fn pan_y(&self) -> f64 {
        self.pan_y
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.limits.clamp(zoom);
    }

    pub fn zoom_in(&mut self, step: f64) {
        self.set_zoom(self.zoom * step);
    }

    pub fn zoom_out(&mut self, step: f64) {
        if step > 0.0 {
            self.set_zoom(self.zoom / step);
        }
    }

    /// Zooms by `factor` keeping the image point under `anchor` fixed on the
    /// canvas.
    pub fn zoom_at(&mut self, factor: f64, anchor: ScreenPoint, canvas: Extent) {
        let old = self.zoom;
        self.set_zoom(old * factor);
        let ratio = self.zoom / old;
        let cx = canvas.width / 2.0;
        let cy = canvas.height / 2.0;
        // Offset of the anchored image point from the canvas center, before pan.
        let dx = anchor.x - cx - self.pan_x;
        let dy = anchor.y - cy - self.pan_y;
        self.pan_x = anchor.x - cx - dx * ratio;
        self.pan_y = anchor.y - cy - dy * ratio;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan_x += dx;
            self.pan_y += dy;
        }
    }

    pub fn reset(&mut self) {
        self.zoom = self.limits.clamp(1.0);
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ScalePolicy;
    use crate::transform::ScreenMapping;

    #[test]
    fn test_zoom_is_clamped() {
        let mut view = ViewState::default();
        view.set_zoom(50.0);
        assert_eq!(view.zoom(), 5.0);
        view.set_zoom(0.0);
        assert_eq!(view.zoom(), 0.1);
        view.set_zoom(f64::NAN);
        assert_eq!(view.zoom(), 1.0);
        for _ in 0..100 {
            view.zoom_in(1.2);
        }
        assert_eq!(view.zoom(), 5.0);
    }

    #[test]
    fn test_reset() {
        let mut view = ViewState::default();
        view.zoom_in(2.0);
        view.pan_by(10.0, -4.0);
        view.reset();
        assert_eq!(view, ViewState::default());
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let canvas = Extent::new(640.0, 480.0).unwrap();
        let mapping = ScreenMapping::new(
            Extent::new(256.0, 256.0).unwrap(),
            canvas,
            ScalePolicy::Fit,
        );
        let mut view = ViewState::default();
        view.pan_by(15.0, -20.0);
        let anchor = ScreenPoint::new(420.0, 100.0);
        let before = mapping.screen_to_pixel_unbounded(anchor, &view);
        view.zoom_at(1.7, anchor, canvas);
        let after = mapping.pixel_to_screen(before, &view);
        assert!((after.x - anchor.x).abs() < 1e-6);
        assert!((after.y - anchor.y).abs() < 1e-6);
        assert!((view.zoom() - 1.7).abs() < 1e-12);
    }
}
