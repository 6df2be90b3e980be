//! Freehand brush editing of contours.
//!
//! A stroke is `Idle -> Dragging -> Idle`. The operation (paint or erase) is
//! decided once at drag start from whether the pointer starts inside the
//! active contour, and stays fixed until the stroke is committed on release.
//! On commit the swept area of the brush disk is merged into, or cut out of,
//! the slice's contour with a polygon boolean operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Instant;

use crate::clip::{self, BooleanOp};
use crate::contour::{ContourError, ContourStore, StructureId};
use crate::enums::Operation;
use crate::geometry::{Point2, Polygon, disk_segments, regular_polygon};
use crate::transform::{CoordinateError, ScreenPoint, SpatialTransform};

/// Sweeps with less area than this (mm²) are not committed.
pub const MIN_SWEEP_AREA: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrushError {
    /// The boolean merge failed; the contour was left as it was.
    #[error("Stroke on structure {structure} at {slice_position} not applied: {reason}")]
    GeometryWarning {
        structure: StructureId,
        slice_position: f64,
        reason: String,
    },

    #[error(transparent)]
    Contour(#[from] ContourError),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

/// Brush parameters, in patient millimetres unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    pub radius: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    /// Distance between interpolated stroke samples, as a fraction of the
    /// radius.
    pub step_factor: f64,
    /// Lower bound on the vertex count of a brush disk.
    pub min_segments: usize,
    /// Longest allowed edge of a brush disk.
    pub max_chord: f64,
    /// Radius change per millimetre of horizontal resize drag.
    pub resize_sensitivity: f64,
    /// Swap paint and erase detection without holding the modifier.
    pub invert_default: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 5.0,
            min_radius: 1.0,
            max_radius: 100.0,
            step_factor: 0.3,
            min_segments: 12,
            max_chord: 1.0,
            resize_sensitivity: 1.0,
            invert_default: false,
        }
    }
}

impl BrushSettings {
    pub fn clamp_radius(&self, radius: f64) -> f64 {
        let radius = if radius.is_nan() { self.radius } else { radius };
        radius.max(self.min_radius).min(self.max_radius)
    }
}

/// Modifier keys and buttons held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Flip paint/erase detection for this stroke.
    pub invert: bool,
    /// Drag adjusts the brush radius instead of painting.
    pub resize: bool,
}

/// In-plane samples of an active drag.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushStroke {
    pub structure_id: StructureId,
    pub slice_position: f64,
    pub operation: Operation,
    pub radius: f64,
    points: Vec<Point2>,
}

impl BrushStroke {
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Appends `point`, filling the gap from the previous sample with
    /// samples no further than `step` apart.
    fn extend_to(&mut self, point: Point2, step: f64) {
        let Some(&last) = self.points.last() else {
            self.points.push(point);
            return;
        };
        let distance = last.distance(point);
        if distance <= f64::EPSILON || !distance.is_finite() {
            return;
        }
        let count = (distance / step).ceil().max(1.0) as usize;
        self.points
            .extend((1..=count).map(|i| last.lerp(point, i as f64 / count as f64)));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrushState {
    Idle,
    Dragging(BrushStroke),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ResizeDrag {
    origin: ScreenPoint,
    start_radius: f64,
}

/// Brush outline to draw at the pointer: an ellipse, since the disk is round
/// in millimetres and pixels need not be square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorFeedback {
    pub center: ScreenPoint,
    /// Horizontal semi-axis in canvas pixels.
    pub radius_x: f64,
    /// Vertical semi-axis in canvas pixels.
    pub radius_y: f64,
    pub operation: Operation,
    pub dragging: bool,
}

/// Result of a committed stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitOutcome {
    pub structure_id: StructureId,
    pub slice_position: f64,
    pub operation: Operation,
    pub polygons: usize,
    pub area_before: f64,
    pub area_after: f64,
}

/// Swept area of a disk moving along `points`: one disk per sample plus, for
/// every segment, the quad joining the disks' tangent points.
pub fn sweep_pieces(points: &[Point2], radius: f64, segments: usize) -> Vec<Polygon> {
    let mut pieces: Vec<Polygon> = points
        .iter()
        .map(|&center| regular_polygon(center, radius, segments))
        .collect();
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let length = a.distance(b);
        if length <= f64::EPSILON {
            continue;
        }
        let nx = -(b.y - a.y) / length * radius;
        let ny = (b.x - a.x) / length * radius;
        pieces.push(Polygon::new(vec![
            Point2::new(a.x + nx, a.y + ny),
            Point2::new(a.x - nx, a.y - ny),
            Point2::new(b.x - nx, b.y - ny),
            Point2::new(b.x + nx, b.y + ny),
        ]));
    }
    pieces
}

#[derive(Debug, Clone)]
pub struct BrushEngine {
    settings: BrushSettings,
    radius: f64,
    active_structure: Option<StructureId>,
    state: BrushState,
    resize: Option<ResizeDrag>,
    cursor: Option<CursorFeedback>,
}

impl Default for BrushEngine {
    fn default() -> Self {
        Self::new(BrushSettings::default())
    }
}

impl BrushEngine {
    pub fn new(settings: BrushSettings) -> Self {
        Self {
            radius: settings.clamp_radius(settings.radius),
            settings,
            active_structure: None,
            state: BrushState::Idle,
            resize: None,
            cursor: None,
        }
    }

    pub fn settings(&self) -> &BrushSettings {
        &self.settings
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = self.settings.clamp_radius(radius);
    }

    pub fn active_structure(&self) -> Option<StructureId> {
        self.active_structure
    }

    /// Selecting another structure abandons a stroke in progress.
    pub fn set_active_structure(&mut self, structure: Option<StructureId>) {
        if structure != self.active_structure {
            self.cancel();
        }
        self.active_structure = structure;
    }

    pub fn state(&self) -> &BrushState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, BrushState::Dragging(_))
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    pub fn stroke(&self) -> Option<&BrushStroke> {
        match &self.state {
            BrushState::Dragging(stroke) => Some(stroke),
            BrushState::Idle => None,
        }
    }

    pub fn cursor(&self) -> Option<CursorFeedback> {
        self.cursor
    }

    fn step(&self) -> f64 {
        (self.radius * self.settings.step_factor).max(f64::EPSILON)
    }

    fn preview_operation(
        &self,
        point: Option<Point2>,
        modifiers: Modifiers,
        slice_position: f64,
        store: &ContourStore,
    ) -> Operation {
        if let Some(stroke) = self.stroke() {
            return stroke.operation;
        }
        let inside = match (self.active_structure, point) {
            (Some(id), Some(point)) => store.is_point_inside(id, slice_position, point),
            _ => false,
        };
        Operation::detect(inside, modifiers.invert != self.settings.invert_default)
    }

    fn update_cursor(
        &mut self,
        screen: ScreenPoint,
        point: Option<Point2>,
        modifiers: Modifiers,
        transform: &SpatialTransform<'_>,
        slice_position: f64,
        store: &ContourStore,
    ) {
        let (radius_x, radius_y) = transform.world_to_screen_radii(self.radius);
        self.cursor = Some(CursorFeedback {
            center: screen,
            radius_x,
            radius_y,
            operation: self.preview_operation(point, modifiers, slice_position, store),
            dragging: self.is_dragging(),
        });
    }

    /// Starts a stroke, or a resize drag when `modifiers.resize` is held.
    ///
    /// Without an active structure, or with the pointer off the image, this
    /// does nothing.
    pub fn pointer_down(
        &mut self,
        screen: ScreenPoint,
        modifiers: Modifiers,
        transform: &SpatialTransform<'_>,
        slice_position: f64,
        store: &ContourStore,
    ) -> Result<(), BrushError> {
        let point = transform.screen_to_plane(screen)?;

        if modifiers.resize {
            self.resize = Some(ResizeDrag {
                origin: screen,
                start_radius: self.radius,
            });
        } else if let (Some(structure_id), Some(point), BrushState::Idle) =
            (self.active_structure, point, &self.state)
        {
            let inside = store.is_point_inside(structure_id, slice_position, point);
            let operation =
                Operation::detect(inside, modifiers.invert != self.settings.invert_default);
            log::trace!("Stroke start at ({:.2}, {:.2}): {}", point.x, point.y, operation.name());
            self.state = BrushState::Dragging(BrushStroke {
                structure_id,
                slice_position,
                operation,
                radius: self.radius,
                points: vec![point],
            });
        }

        self.update_cursor(screen, point, modifiers, transform, slice_position, store);
        Ok(())
    }

    /// Extends the stroke or the resize drag, and always refreshes the cursor.
    ///
    /// A resize drag only follows horizontal movement: right grows the brush,
    /// left shrinks it, by the distance in millimetres along a row times
    /// `resize_sensitivity`.
    pub fn pointer_move(
        &mut self,
        screen: ScreenPoint,
        modifiers: Modifiers,
        transform: &SpatialTransform<'_>,
        slice_position: f64,
        store: &ContourStore,
    ) -> Result<(), BrushError> {
        let point = transform.screen_to_plane(screen)?;

        if let Some(resize) = self.resize {
            let dx = transform.screen_to_world_length(screen.x - resize.origin.x);
            self.set_radius(resize.start_radius + dx * self.settings.resize_sensitivity);
        } else if let Some(point) = point {
            let step = self.step();
            if let BrushState::Dragging(stroke) = &mut self.state {
                stroke.extend_to(point, step);
            }
        }

        self.update_cursor(screen, point, modifiers, transform, slice_position, store);
        Ok(())
    }

    /// Ends the gesture. A paint or erase stroke is committed to `store`.
    ///
    /// Returns `Ok(None)` when there was nothing to commit. On a
    /// [`BrushError::GeometryWarning`] the contour is unchanged.
    pub fn pointer_up(
        &mut self,
        store: &mut ContourStore,
    ) -> Result<Option<CommitOutcome>, BrushError> {
        if self.resize.take().is_some() {
            log::debug!("Brush radius set to {:.2}", self.radius);
            return Ok(None);
        }
        let stroke = match std::mem::replace(&mut self.state, BrushState::Idle) {
            BrushState::Dragging(stroke) => stroke,
            BrushState::Idle => return Ok(None),
        };
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.dragging = false;
        }
        self.commit(stroke, store)
    }

    /// Clears the cursor when the pointer leaves the canvas.
    pub fn pointer_leave(&mut self) {
        self.cursor = None;
    }

    /// Drops the current gesture without touching any contour.
    pub fn cancel(&mut self) {
        self.state = BrushState::Idle;
        self.resize = None;
    }

    fn commit(
        &self,
        stroke: BrushStroke,
        store: &mut ContourStore,
    ) -> Result<Option<CommitOutcome>, BrushError> {
        let started = Instant::now();
        let warning = |reason: String| BrushError::GeometryWarning {
            structure: stroke.structure_id,
            slice_position: stroke.slice_position,
            reason,
        };

        let segments = disk_segments(
            stroke.radius,
            self.settings.min_segments,
            self.settings.max_chord,
        );
        let pieces = sweep_pieces(&stroke.points, stroke.radius, segments);
        let sweep = clip::union_all(&pieces).map_err(|err| warning(err.to_string()))?;
        if clip::region_area(&sweep) < MIN_SWEEP_AREA {
            log::debug!("Skipping zero-area stroke on structure {}", stroke.structure_id);
            return Ok(None);
        }

        let existing = store
            .get_contour(stroke.structure_id, stroke.slice_position)
            .map(|contour| contour.polygons.clone())
            .unwrap_or_default();
        let op = match stroke.operation {
            Operation::Additive => BooleanOp::Union,
            Operation::Subtractive => BooleanOp::Difference,
        };
        let area_before = clip::to_region(&existing)
            .map(|region| clip::region_area(&region))
            .map_err(|err| warning(err.to_string()))?;
        let merged = clip::apply(&existing, &sweep, op).map_err(|err| warning(err.to_string()))?;
        let area_after = clip::to_region(&merged)
            .map(|region| clip::region_area(&region))
            .map_err(|err| warning(err.to_string()))?;

        let outcome = CommitOutcome {
            structure_id: stroke.structure_id,
            slice_position: stroke.slice_position,
            operation: stroke.operation,
            polygons: merged.len(),
            area_before,
            area_after,
        };
        store.upsert_contour(stroke.structure_id, stroke.slice_position, merged)?;

        log::debug!(
            "Committed {} stroke ({} samples) on structure {} at {}: {} polygons, area {:.1} -> {:.1} in {:?}",
            stroke.operation.name(),
            stroke.points.len(),
            stroke.structure_id,
            stroke.slice_position,
            outcome.polygons,
            area_before,
            area_after,
            started.elapsed()
        );
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ScalePolicy;
    use crate::transform::{Extent, ScreenMapping, SliceGeometry, Vec3};
    use crate::view::ViewState;

    // 64x64 image on a 64x64 canvas with 1 mm pixels at the origin, so screen,
    // pixel and world x/y coincide.
    fn fixture() -> (SliceGeometry, ScreenMapping, ViewState) {
        let geometry = SliceGeometry::axial(Vec3::new(0.0, 0.0, 0.0), 1.0, 1.0);
        let extent = Extent::new(64.0, 64.0).unwrap();
        let mapping = ScreenMapping::new(extent, extent, ScalePolicy::Fit);
        (geometry, mapping, ViewState::default())
    }

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new(vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ])
    }

    fn engine(radius: f64) -> BrushEngine {
        let mut engine = BrushEngine::new(BrushSettings {
            radius,
            ..BrushSettings::default()
        });
        engine.set_active_structure(Some(1));
        engine
    }

    fn click(
        engine: &mut BrushEngine,
        store: &mut ContourStore,
        at: ScreenPoint,
        modifiers: Modifiers,
    ) -> Option<CommitOutcome> {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        engine
            .pointer_down(at, modifiers, &transform, 0.0, store)
            .unwrap();
        engine.pointer_up(store).unwrap()
    }

    #[test]
    fn test_single_click_on_empty_slice() {
        let mut store = ContourStore::default();
        let mut engine = engine(2.0);
        let outcome = click(
            &mut engine,
            &mut store,
            ScreenPoint::new(10.0, 10.0),
            Modifiers::default(),
        )
        .unwrap();
        assert_eq!(outcome.operation, Operation::Additive);

        let contour = store.get_contour(1, 0.0).unwrap();
        assert_eq!(contour.polygons.len(), 1);
        let polygon = &contour.polygons[0];
        assert!(polygon.len() >= 12);
        for p in polygon.points() {
            assert!((p.distance(Point2::new(10.0, 10.0)) - 2.0).abs() <= 0.1);
        }
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_click_inside_erases_and_outside_paints() {
        let mut store = ContourStore::default();
        store.upsert_contour(1, 0.0, vec![square(0.0, 0.0, 20.0)]).unwrap();
        let mut engine = engine(2.0);

        let erase = click(
            &mut engine,
            &mut store,
            ScreenPoint::new(10.0, 10.0),
            Modifiers::default(),
        )
        .unwrap();
        assert_eq!(erase.operation, Operation::Subtractive);
        assert!(erase.area_after < erase.area_before);
        assert!(store.get_contour(1, 0.0).unwrap().area() < 400.0);
        assert!(!store.is_point_inside(1, 0.0, Point2::new(10.0, 10.0)));

        let paint = click(
            &mut engine,
            &mut store,
            ScreenPoint::new(40.0, 40.0),
            Modifiers::default(),
        )
        .unwrap();
        assert_eq!(paint.operation, Operation::Additive);
        assert!(paint.area_after > paint.area_before);
        assert!(store.is_point_inside(1, 0.0, Point2::new(40.0, 40.0)));
    }

    #[test]
    fn test_invert_modifier() {
        let mut store = ContourStore::default();
        store.upsert_contour(1, 0.0, vec![square(0.0, 0.0, 20.0)]).unwrap();
        let mut engine = engine(2.0);
        let outcome = click(
            &mut engine,
            &mut store,
            ScreenPoint::new(10.0, 10.0),
            Modifiers {
                invert: true,
                resize: false,
            },
        )
        .unwrap();
        assert_eq!(outcome.operation, Operation::Additive);
        assert!((outcome.area_after - outcome.area_before).abs() < 1e-6);
    }

    #[test]
    fn test_operation_is_locked_for_drag() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        store.upsert_contour(1, 0.0, vec![square(0.0, 0.0, 20.0)]).unwrap();
        let mut engine = engine(2.0);

        engine
            .pointer_down(ScreenPoint::new(30.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        for x in [25.0, 18.0, 10.0, 5.0] {
            engine
                .pointer_move(ScreenPoint::new(x, 10.0), Modifiers::default(), &transform, 0.0, &store)
                .unwrap();
            assert_eq!(engine.stroke().unwrap().operation, Operation::Additive);
            assert_eq!(engine.cursor().unwrap().operation, Operation::Additive);
        }
        let outcome = engine.pointer_up(&mut store).unwrap().unwrap();
        assert_eq!(outcome.operation, Operation::Additive);
        assert!(outcome.area_after > outcome.area_before);
        assert_eq!(store.get_contour(1, 0.0).unwrap().polygons.len(), 1);
    }

    #[test]
    fn test_fast_moves_are_interpolated() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let mut engine = engine(2.0);

        engine
            .pointer_down(ScreenPoint::new(10.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        engine
            .pointer_move(ScreenPoint::new(30.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        let points = engine.stroke().unwrap().points().to_vec();
        assert_eq!(points.len(), 1 + 34);
        for pair in points.windows(2) {
            assert!(pair[0].distance(pair[1]) <= 0.6 + 1e-9);
        }

        let outcome = engine.pointer_up(&mut store).unwrap().unwrap();
        assert_eq!(outcome.polygons, 1);
        // Capsule of length 20 and radius 2, slightly less for the polygonal caps.
        let expected = 20.0 * 4.0 + std::f64::consts::PI * 4.0;
        assert!(outcome.area_after < expected && outcome.area_after > expected * 0.95);
        assert!(store.is_point_inside(1, 0.0, Point2::new(20.0, 11.5)));
    }

    #[test]
    fn test_no_active_structure_is_noop() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let mut engine = BrushEngine::default();
        engine
            .pointer_down(ScreenPoint::new(10.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        assert!(!engine.is_dragging());
        assert!(engine.cursor().is_some());
        assert_eq!(engine.pointer_up(&mut store).unwrap(), None);
        assert_eq!(store.structures().count(), 0);
    }

    #[test]
    fn test_pointer_off_image_is_noop() {
        let geometry = SliceGeometry::axial(Vec3::default(), 1.0, 1.0);
        let mapping = ScreenMapping::new(
            Extent::new(64.0, 64.0).unwrap(),
            Extent::new(128.0, 64.0).unwrap(),
            ScalePolicy::Fit,
        );
        let view = ViewState::default();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let store = ContourStore::default();
        let mut engine = engine(2.0);
        engine
            .pointer_down(ScreenPoint::new(5.0, 30.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_resize_drag() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let mut engine = engine(2.0);
        let resize = Modifiers {
            invert: false,
            resize: true,
        };

        engine
            .pointer_down(ScreenPoint::new(10.0, 10.0), resize, &transform, 0.0, &store)
            .unwrap();
        assert!(engine.is_resizing());
        assert!(!engine.is_dragging());
        engine
            .pointer_move(ScreenPoint::new(20.0, 30.0), resize, &transform, 0.0, &store)
            .unwrap();
        assert!((engine.radius() - 12.0).abs() < 1e-9);
        let cursor = engine.cursor().unwrap();
        assert!((cursor.radius_x - 12.0).abs() < 1e-9);
        assert!((cursor.radius_y - 12.0).abs() < 1e-9);

        // Vertical movement leaves the radius alone.
        engine
            .pointer_move(ScreenPoint::new(20.0, -40.0), resize, &transform, 0.0, &store)
            .unwrap();
        assert!((engine.radius() - 12.0).abs() < 1e-9);
        engine
            .pointer_move(ScreenPoint::new(-500.0, 10.0), resize, &transform, 0.0, &store)
            .unwrap();
        assert_eq!(engine.radius(), 1.0);
        assert_eq!(engine.pointer_up(&mut store).unwrap(), None);
        assert!(!engine.is_resizing());
        assert_eq!(store.structures().count(), 0);

        engine.set_radius(1000.0);
        assert_eq!(engine.radius(), 100.0);
    }

    #[test]
    fn test_cursor_on_anisotropic_pixels() {
        // 0.5 mm between rows, 2 mm between columns.
        let geometry = SliceGeometry::axial(Vec3::default(), 0.5, 2.0);
        let extent = Extent::new(64.0, 64.0).unwrap();
        let mapping = ScreenMapping::new(extent, extent, ScalePolicy::Fit);
        let view = ViewState::default();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let mut engine = engine(4.0);

        engine
            .pointer_down(ScreenPoint::new(16.0, 32.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        let cursor = engine.cursor().unwrap();
        assert!((cursor.radius_x - 2.0).abs() < 1e-9);
        assert!((cursor.radius_y - 8.0).abs() < 1e-9);

        // The committed disk reaches exactly the cursor outline.
        let center = transform.screen_to_plane(cursor.center).unwrap().unwrap();
        engine.pointer_up(&mut store).unwrap().unwrap();
        let right = ScreenPoint::new(cursor.center.x + cursor.radius_x * 0.95, cursor.center.y);
        let below = ScreenPoint::new(cursor.center.x, cursor.center.y + cursor.radius_y * 0.95);
        let beyond = ScreenPoint::new(cursor.center.x + cursor.radius_x * 1.1, cursor.center.y);
        for (screen, inside) in [(right, true), (below, true), (beyond, false)] {
            let point = transform.screen_to_plane(screen).unwrap().unwrap();
            assert_eq!(store.is_point_inside(1, 0.0, point), inside, "{screen:?}");
        }
        assert!(store.is_point_inside(1, 0.0, center));

        // Resizing converts horizontal pixels with the column spacing.
        let resize = Modifiers {
            invert: false,
            resize: true,
        };
        engine
            .pointer_down(ScreenPoint::new(16.0, 32.0), resize, &transform, 0.0, &store)
            .unwrap();
        engine
            .pointer_move(ScreenPoint::new(19.0, 32.0), resize, &transform, 0.0, &store)
            .unwrap();
        assert!((engine.radius() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_merge_leaves_contour_unchanged() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let runaway = vec![square(-1e12, -1e12, 2e12)];
        store.upsert_contour(1, 0.0, runaway.clone()).unwrap();
        let mut engine = engine(2.0);

        engine
            .pointer_down(ScreenPoint::new(10.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        assert_eq!(engine.stroke().unwrap().operation, Operation::Subtractive);
        let result = engine.pointer_up(&mut store);
        assert!(matches!(
            result,
            Err(BrushError::GeometryWarning { structure: 1, slice_position, .. }) if slice_position == 0.0
        ));
        assert_eq!(store.get_contour(1, 0.0).unwrap().polygons, runaway);
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_switching_structure_cancels_stroke() {
        let (geometry, mapping, view) = fixture();
        let transform = SpatialTransform::new(&geometry, mapping, &view).unwrap();
        let mut store = ContourStore::default();
        let mut engine = engine(2.0);
        engine
            .pointer_down(ScreenPoint::new(10.0, 10.0), Modifiers::default(), &transform, 0.0, &store)
            .unwrap();
        engine.set_active_structure(Some(2));
        assert!(!engine.is_dragging());
        assert_eq!(engine.pointer_up(&mut store).unwrap(), None);
    }

    #[test]
    fn test_sweep_pieces() {
        let points = [Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), Point2::new(3.0, 0.0)];
        let pieces = sweep_pieces(&points, 1.0, 12);
        // Three disks, one quad; the zero-length segment is skipped.
        assert_eq!(pieces.len(), 4);
        let quad = &pieces[3];
        assert!((quad.area() - 6.0).abs() < 1e-9);
    }
}
