//! One interactive editing session over a slice stack.
//!
//! The session owns the view state, the contour store and the brush, and
//! hands each of them to the others explicitly on every event. Pointer
//! events are processed one at a time; brush commits finish before the
//! next event is handled.

use std::sync::Arc;

use image::{GrayImage, ImageBuffer};
use rayon::prelude::*;

use crate::brush::{BrushEngine, BrushError, CommitOutcome, CursorFeedback, Modifiers};
use crate::config::ViewerConfig;
use crate::contour::{ContourError, ContourStore, StructureId, StructureImport};
use crate::prefetch::prefetch_window;
use crate::slice::{Slice, SliceKey};
use crate::slice_stack::SliceStack;
use crate::transform::{CoordinateError, Extent, ScreenMapping, ScreenPoint, SpatialTransform};
use crate::view::ViewState;
use crate::volume::{Volume, VolumeError};
use crate::windowing::{WindowLevel, WindowPreset};

/// Screen-space outline of one contour polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPath {
    pub structure_id: StructureId,
    pub color: [u8; 3],
    /// Closed: the last point connects back to the first.
    pub points: Vec<ScreenPoint>,
}

pub struct EditingSession {
    config: ViewerConfig,
    stack: SliceStack,
    store: ContourStore,
    view: ViewState,
    brush: BrushEngine,
    window: WindowLevel,
    current: usize,
    warnings: Vec<BrushError>,
}

impl EditingSession {
    pub fn new(stack: SliceStack, config: ViewerConfig) -> Self {
        Self {
            store: ContourStore::new(stack.position_tolerance()),
            view: ViewState::new(config.view.limits()),
            brush: BrushEngine::new(config.brush.clone()),
            window: config.window,
            current: stack.len().saturating_sub(1) / 2,
            stack,
            config,
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn stack(&self) -> &SliceStack {
        &self.stack
    }

    pub fn store(&self) -> &ContourStore {
        &self.store
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn brush(&self) -> &BrushEngine {
        &self.brush
    }

    pub fn window(&self) -> WindowLevel {
        self.window
    }

    /// Imports RT-STRUCT structures; rejected contours are returned.
    pub fn import_structures(&mut self, imports: Vec<StructureImport>) -> Vec<ContourError> {
        self.store.import(imports)
    }

    pub fn active_structure(&self) -> Option<StructureId> {
        self.brush.active_structure()
    }

    pub fn set_active_structure(&mut self, structure: Option<StructureId>) {
        self.brush.set_active_structure(structure);
    }

    pub fn set_brush_radius(&mut self, radius: f64) {
        self.brush.set_radius(radius);
    }

    // Slice navigation

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_slice(&self) -> Option<&Arc<Slice>> {
        self.stack.slice_at(self.current)
    }

    /// Through-plane position of the current slice, used to key contours.
    pub fn slice_position(&self) -> Option<f64> {
        self.current_slice().map(|slice| slice.position_z())
    }

    /// Moves to `index`. A stroke in progress is abandoned.
    pub fn set_slice(&mut self, index: usize) -> bool {
        if index >= self.stack.len() {
            return false;
        }
        if index != self.current {
            self.brush.cancel();
            self.current = index;
        }
        true
    }

    pub fn next_slice(&mut self) -> bool {
        self.set_slice(self.current + 1)
    }

    pub fn previous_slice(&mut self) -> bool {
        self.current
            .checked_sub(1)
            .is_some_and(|index| self.set_slice(index))
    }

    /// Keys of the slices within the configured prefetch radius of the
    /// current one, nearest first.
    pub fn prefetch_keys(&self) -> Vec<SliceKey> {
        let keys: Vec<SliceKey> = self
            .stack
            .ordered_slices()
            .map(|slice| slice.key().clone())
            .collect();
        prefetch_window(&keys, self.current, self.config.prefetch.radius)
    }

    /// Moves to the slice whose spatial key is within tolerance of `z`.
    pub fn slice_near(&mut self, z: f64) -> Option<usize> {
        let index = self.stack.index_near(z, self.stack.position_tolerance())?;
        self.set_slice(index);
        Some(index)
    }

    // View

    pub fn zoom_in(&mut self) {
        self.view.zoom_in(self.config.view.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out(self.config.view.zoom_step);
    }

    pub fn zoom_at(&mut self, factor: f64, anchor: ScreenPoint, canvas: Extent) {
        self.view.zoom_at(factor, anchor, canvas);
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.view.pan_by(dx, dy);
    }

    pub fn set_window(&mut self, window: WindowLevel) {
        self.window = window;
    }

    pub fn apply_preset(&mut self, preset: WindowPreset) {
        self.window = WindowLevel::preset(preset);
    }

    pub fn adjust_window(&mut self, d_width: f32, d_center: f32) {
        self.window = self.window.adjust(d_width, d_center);
    }

    fn mapping(&self, slice: &Slice, canvas: Extent) -> Result<ScreenMapping, CoordinateError> {
        Ok(ScreenMapping::new(
            slice.extent()?,
            canvas,
            self.config.view.scale_policy,
        ))
    }

    // Pointer events

    pub fn pointer_down(
        &mut self,
        screen: ScreenPoint,
        modifiers: Modifiers,
        canvas: Extent,
    ) -> Result<(), BrushError> {
        let Some(slice) = self.stack.slice_at(self.current) else {
            return Ok(());
        };
        let mapping = self.mapping(slice, canvas)?;
        let transform = SpatialTransform::new(slice.geometry(), mapping, &self.view)?;
        self.brush.pointer_down(
            screen,
            modifiers,
            &transform,
            slice.position_z(),
            &self.store,
        )
    }

    pub fn pointer_move(
        &mut self,
        screen: ScreenPoint,
        modifiers: Modifiers,
        canvas: Extent,
    ) -> Result<(), BrushError> {
        let Some(slice) = self.stack.slice_at(self.current) else {
            return Ok(());
        };
        let mapping = self.mapping(slice, canvas)?;
        let transform = SpatialTransform::new(slice.geometry(), mapping, &self.view)?;
        self.brush.pointer_move(
            screen,
            modifiers,
            &transform,
            slice.position_z(),
            &self.store,
        )
    }

    /// Ends the gesture. A failed boolean merge leaves the contour as it was
    /// and is queued for [`EditingSession::take_warnings`].
    pub fn pointer_up(&mut self) -> Result<Option<CommitOutcome>, BrushError> {
        match self.brush.pointer_up(&mut self.store) {
            Err(warning @ BrushError::GeometryWarning { .. }) => {
                log::warn!("{warning}");
                self.warnings.push(warning);
                Ok(None)
            }
            other => other,
        }
    }

    pub fn pointer_leave(&mut self) {
        self.brush.pointer_leave();
    }

    pub fn cursor(&self) -> Option<CursorFeedback> {
        self.brush.cursor()
    }

    /// Drains warnings surfaced since the last call.
    pub fn take_warnings(&mut self) -> Vec<BrushError> {
        std::mem::take(&mut self.warnings)
    }

    // Rendering

    /// Full-resolution windowed image of the current slice.
    pub fn render_slice(&self) -> Option<GrayImage> {
        self.current_slice()?.render(self.window)
    }

    /// Canvas-sized image with zoom and pan applied. Canvas pixels off the
    /// image are black.
    pub fn render_viewport(&self, canvas: Extent) -> Result<Option<GrayImage>, CoordinateError> {
        let Some(slice) = self.current_slice() else {
            return Ok(None);
        };
        let mapping = self.mapping(slice, canvas)?;
        let (width, height) = (canvas.width.round() as usize, canvas.height.round() as usize);
        let (slope, intercept) = (slice.rescale_slope(), slice.rescale_intercept());
        let window = self.window;
        let view = &self.view;

        let mut pixel_data = vec![0u8; width * height];
        pixel_data
            .par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for (x, gray) in row.iter_mut().enumerate() {
                    let screen = ScreenPoint::new(x as f64 + 0.5, y as f64 + 0.5);
                    if let Some(raw) = mapping
                        .screen_to_pixel(screen, view)
                        .and_then(|pixel| slice.sample_at(pixel))
                    {
                        *gray = window.map_raw(raw, slope, intercept);
                    }
                }
            });
        Ok(ImageBuffer::from_raw(width as u32, height as u32, pixel_data))
    }

    /// Contours of every structure on the current slice, in canvas
    /// coordinates.
    pub fn overlay_paths(&self, canvas: Extent) -> Result<Vec<OverlayPath>, CoordinateError> {
        let Some(slice) = self.current_slice() else {
            return Ok(Vec::new());
        };
        let transform =
            SpatialTransform::new(slice.geometry(), self.mapping(slice, canvas)?, &self.view)?;
        let z = slice.position_z();

        let mut paths = Vec::new();
        for structure in self.store.structures() {
            let Some(contour) = self.store.get_contour(structure.id, z) else {
                continue;
            };
            for polygon in &contour.polygons {
                let points = polygon
                    .points()
                    .iter()
                    .map(|&p| transform.plane_to_screen(p))
                    .collect::<Result<Vec<_>, _>>()?;
                paths.push(OverlayPath {
                    structure_id: structure.id,
                    color: structure.color,
                    points,
                });
            }
        }
        Ok(paths)
    }

    /// Volume for multi-planar views of the whole stack.
    pub fn volume(&self) -> Result<Volume, VolumeError> {
        Volume::from_stack(&self.stack)
    }
}
