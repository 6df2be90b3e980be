//! Per-structure, per-slice polygon storage.

use std::collections::BTreeMap;
use std::ops::Bound;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clip;
use crate::geometry::{Point2, Polygon, point_in_polygons};
use crate::slice_stack::DEFAULT_SLICE_TOLERANCE;

/// Identifier of a structure, e.g. an RT-STRUCT ROI number.
pub type StructureId = i32;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContourError {
    #[error("Polygon {polygon} has {points} distinct vertices, at least 3 required")]
    InvalidGeometry { polygon: usize, points: usize },

    #[error("Unknown structure {0}")]
    UnknownStructure(StructureId),
}

/// All polygons of one structure on one slice, combined with the even-odd
/// rule. `slice_position` is the through-plane coordinate along the slice
/// normal and the polygons are in-plane points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub slice_position: f64,
    pub polygons: Vec<Polygon>,
}

impl Contour {
    pub fn contains(&self, point: Point2) -> bool {
        point_in_polygons(&self.polygons, point)
    }

    /// Area of the even-odd region. Falls back to the sum of ring areas if
    /// the polygons cannot be normalised.
    pub fn area(&self) -> f64 {
        match clip::to_region(&self.polygons) {
            Ok(region) => clip::region_area(&region),
            Err(err) => {
                log::warn!("Contour area fallback at {}: {err}", self.slice_position);
                self.polygons.iter().map(Polygon::area).sum()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub color: [u8; 3],
    contours: BTreeMap<OrderedFloat<f64>, Contour>,
}

impl Structure {
    pub fn new(id: StructureId, name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            contours: BTreeMap::new(),
        }
    }

    pub fn contours(&self) -> impl Iterator<Item = &Contour> + '_ {
        self.contours.values()
    }

    pub fn contour_count(&self) -> usize {
        self.contours.len()
    }

    /// Stored key closest to `slice_position` within `tolerance`.
    fn matching_key(&self, slice_position: f64, tolerance: f64) -> Option<OrderedFloat<f64>> {
        let lo = OrderedFloat(slice_position - tolerance);
        let hi = OrderedFloat(slice_position + tolerance);
        self.contours
            .range((Bound::Included(lo), Bound::Included(hi)))
            .map(|(key, _)| *key)
            .min_by(|a, b| {
                (a.0 - slice_position)
                    .abs()
                    .total_cmp(&(b.0 - slice_position).abs())
            })
    }

    fn contour_near(&self, slice_position: f64, tolerance: f64) -> Option<&Contour> {
        self.matching_key(slice_position, tolerance)
            .and_then(|key| self.contours.get(&key))
    }
}

/// Structure as delivered by an RT-STRUCT reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureImport {
    pub id: StructureId,
    pub name: String,
    pub color: [u8; 3],
    pub contours: Vec<Contour>,
}

/// Owns every structure of an editing session.
#[derive(Debug, Clone)]
pub struct ContourStore {
    structures: BTreeMap<StructureId, Structure>,
    tolerance: f64,
}

impl Default for ContourStore {
    fn default() -> Self {
        Self::new(DEFAULT_SLICE_TOLERANCE)
    }
}

impl ContourStore {
    pub fn new(tolerance: f64) -> Self {
        Self {
            structures: BTreeMap::new(),
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn structures(&self) -> impl Iterator<Item = &Structure> + '_ {
        self.structures.values()
    }

    /// Adds an empty structure, keeping an existing one with the same id.
    pub fn add_structure(&mut self, id: StructureId, name: impl Into<String>, color: [u8; 3]) {
        self.structures
            .entry(id)
            .or_insert_with(|| Structure::new(id, name, color));
    }

    /// Imports structures. Slices holding degenerate polygons are skipped and
    /// reported; the rest of the structure is kept. Contours on the same
    /// slice are combined.
    pub fn import(&mut self, imports: Vec<StructureImport>) -> Vec<ContourError> {
        let mut rejected = Vec::new();
        for import in imports {
            self.structures.insert(
                import.id,
                Structure::new(import.id, import.name.clone(), import.color),
            );
            for contour in import.contours {
                let mut polygons = self
                    .get_contour(import.id, contour.slice_position)
                    .map(|existing| existing.polygons.clone())
                    .unwrap_or_default();
                polygons.extend(contour.polygons);
                if let Err(err) = self.upsert_contour(import.id, contour.slice_position, polygons) {
                    log::warn!(
                        "Skipping contour of {} at {}: {err}",
                        import.name,
                        contour.slice_position
                    );
                    rejected.push(err);
                }
            }
            log::debug!(
                "Imported structure {} ({}) with {} contours",
                import.id,
                import.name,
                self.structures.get(&import.id).map_or(0, Structure::contour_count)
            );
        }
        rejected
    }

    pub fn get_contour(&self, structure_id: StructureId, slice_position: f64) -> Option<&Contour> {
        self.structures
            .get(&structure_id)?
            .contour_near(slice_position, self.tolerance)
    }

    /// Replaces the whole polygon set of a slice, creating the structure if it
    /// does not exist yet. An empty set removes the slice's contour.
    ///
    /// Nothing changes if any polygon has fewer than three distinct vertices.
    pub fn upsert_contour(
        &mut self,
        structure_id: StructureId,
        slice_position: f64,
        polygons: Vec<Polygon>,
    ) -> Result<(), ContourError> {
        if let Some((index, polygon)) = polygons
            .iter()
            .enumerate()
            .find(|(_, polygon)| !polygon.is_valid())
        {
            return Err(ContourError::InvalidGeometry {
                polygon: index,
                points: polygon.len(),
            });
        }

        let tolerance = self.tolerance;
        let structure = self.structures.entry(structure_id).or_insert_with(|| {
            Structure::new(structure_id, format!("Structure {structure_id}"), [255, 0, 0])
        });
        let key = structure
            .matching_key(slice_position, tolerance)
            .unwrap_or(OrderedFloat(slice_position));

        if polygons.is_empty() {
            structure.contours.remove(&key);
        } else {
            structure.contours.insert(
                key,
                Contour {
                    slice_position: key.0,
                    polygons,
                },
            );
        }
        Ok(())
    }

    pub fn is_point_inside(
        &self,
        structure_id: StructureId,
        slice_position: f64,
        point: Point2,
    ) -> bool {
        self.get_contour(structure_id, slice_position)
            .is_some_and(|contour| contour.contains(point))
    }

    pub fn remove_contour(
        &mut self,
        structure_id: StructureId,
        slice_position: f64,
    ) -> Result<Option<Contour>, ContourError> {
        let tolerance = self.tolerance;
        let structure = self
            .structures
            .get_mut(&structure_id)
            .ok_or(ContourError::UnknownStructure(structure_id))?;
        Ok(structure
            .matching_key(slice_position, tolerance)
            .and_then(|key| structure.contours.remove(&key)))
    }
}
