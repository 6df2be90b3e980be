//! Spatially ordered collection of slices.

use std::sync::Arc;

use crate::enums::SortBy;
use crate::slice::{Slice, SliceKey};

/// Default spatial-key tolerance shared with contour slice matching.
pub const DEFAULT_SLICE_TOLERANCE: f64 = 2.0;

/// Source the stack's spatial keys were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    SliceLocation,
    ImagePositionPatient,
    InstanceNumber,
    InputOrder,
}

#[derive(Debug, Clone)]
struct Entry {
    slice: Arc<Slice>,
    spatial_key: f64,
}

/// Slices sorted ascending by spatial key.
///
/// Slices claiming the same position keep their input order, so sorting an
/// already sorted stack is a no-op.
#[derive(Debug, Clone)]
pub struct SliceStack {
    entries: Vec<Entry>,
    source: KeySource,
    tolerance: f64,
    position_tolerance: f64,
}

impl SliceStack {
    pub fn new(slices: Vec<Arc<Slice>>, sort_by: SortBy, tolerance: f64) -> Self {
        let source = Self::resolve_source(&slices, sort_by);
        let mut entries: Vec<Entry> = slices
            .into_iter()
            .enumerate()
            .map(|(index, slice)| Entry {
                spatial_key: Self::spatial_key(&slice, source, index),
                slice,
            })
            .collect();

        let position_tolerance = Self::sort_entries(&mut entries, tolerance);
        log::debug!(
            "Ordered {} slices by {:?} (tolerance {}, effective {:.3})",
            entries.len(),
            source,
            tolerance,
            position_tolerance
        );

        Self {
            entries,
            source,
            tolerance,
            position_tolerance,
        }
    }

    pub fn from_slices(slices: Vec<Slice>) -> Self {
        Self::new(
            slices.into_iter().map(Arc::new).collect(),
            SortBy::Auto,
            DEFAULT_SLICE_TOLERANCE,
        )
    }

    fn resolve_source(slices: &[Arc<Slice>], sort_by: SortBy) -> KeySource {
        let all_locations = slices.iter().all(|s| s.slice_location().is_some());
        let all_positions = slices
            .iter()
            .all(|s| s.geometry().projected_position().is_finite());
        let all_numbers = slices.iter().all(|s| s.instance_number().is_some());

        let requested = match sort_by {
            SortBy::SliceLocation if all_locations => Some(KeySource::SliceLocation),
            SortBy::ImagePositionPatient if all_positions => {
                Some(KeySource::ImagePositionPatient)
            }
            SortBy::InstanceNumber if all_numbers => Some(KeySource::InstanceNumber),
            SortBy::None => Some(KeySource::InputOrder),
            SortBy::Auto => None,
            other => {
                log::warn!("Not every slice provides {other:?}, falling back to automatic ordering");
                None
            }
        };

        requested.unwrap_or(if all_locations {
            KeySource::SliceLocation
        } else if all_positions {
            KeySource::ImagePositionPatient
        } else if all_numbers {
            KeySource::InstanceNumber
        } else {
            KeySource::InputOrder
        })
    }

    fn spatial_key(slice: &Slice, source: KeySource, index: usize) -> f64 {
        match source {
            KeySource::SliceLocation => slice.slice_location().unwrap_or(index as f64),
            KeySource::ImagePositionPatient => slice.geometry().projected_position(),
            KeySource::InstanceNumber => slice
                .instance_number()
                .map_or(index as f64, |n| n as f64),
            KeySource::InputOrder => index as f64,
        }
    }

    /// Sorts ascending by key and returns the distance under which two keys
    /// count as the same position.
    ///
    /// That distance is `tolerance` capped at half the median gap between
    /// distinct keys, so a series spaced more finely than `tolerance` still
    /// sorts strictly. Slices in one such group keep their input order.
    fn sort_entries(entries: &mut [Entry], tolerance: f64) -> f64 {
        let mut indexed: Vec<(usize, Entry)> = entries.iter().cloned().enumerate().collect();
        indexed.sort_by(|a, b| a.1.spatial_key.total_cmp(&b.1.spatial_key).then(a.0.cmp(&b.0)));

        let same_position = Self::same_position_tolerance(
            indexed.iter().map(|(_, entry)| entry.spatial_key),
            tolerance,
        );

        let mut start = 0;
        while start < indexed.len() {
            let anchor = indexed[start].1.spatial_key;
            let end = indexed[start..]
                .iter()
                .position(|(_, entry)| entry.spatial_key - anchor > same_position)
                .map_or(indexed.len(), |offset| start + offset);
            if end - start > 1 {
                log::warn!(
                    "{} slices share spatial key {:.3} within tolerance {:.3}",
                    end - start,
                    anchor,
                    same_position
                );
                indexed[start..end].sort_by_key(|(input, _)| *input);
            }
            start = end;
        }

        for (slot, (_, entry)) in entries.iter_mut().zip(indexed) {
            *slot = entry;
        }
        same_position
    }

    /// `tolerance` capped at half the median gap between distinct sorted keys.
    fn same_position_tolerance(sorted_keys: impl Iterator<Item = f64>, tolerance: f64) -> f64 {
        let keys: Vec<f64> = sorted_keys.collect();
        let mut gaps: Vec<f64> = keys
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|gap| *gap > 0.0)
            .collect();
        if gaps.is_empty() {
            return tolerance;
        }
        gaps.sort_by(f64::total_cmp);
        let median = gaps[gaps.len() / 2];
        tolerance.min(median / 2.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Distance under which two keys of this stack name the same slice.
    /// Never larger than [`tolerance`](Self::tolerance).
    pub fn position_tolerance(&self) -> f64 {
        self.position_tolerance
    }

    pub fn ordered_slices(&self) -> impl Iterator<Item = &Arc<Slice>> + '_ {
        self.entries.iter().map(|entry| &entry.slice)
    }

    pub fn slice_at(&self, index: usize) -> Option<&Arc<Slice>> {
        self.entries.get(index).map(|entry| &entry.slice)
    }

    pub fn spatial_key_at(&self, index: usize) -> Option<f64> {
        self.entries.get(index).map(|entry| entry.spatial_key)
    }

    pub fn index_of(&self, key: &SliceKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.slice.key() == key)
    }

    /// Index of the first slice whose spatial key is within `tolerance` of
    /// `world_z`.
    pub fn index_near(&self, world_z: f64, tolerance: f64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| (entry.spatial_key - world_z).abs() <= tolerance)
    }

    pub fn slice_near(&self, world_z: f64, tolerance: f64) -> Option<&Arc<Slice>> {
        self.index_near(world_z, tolerance)
            .and_then(|index| self.slice_at(index))
    }

    /// Mean distance between consecutive spatial keys, `None` for fewer than
    /// two slices or a non-spatial key source.
    pub fn mean_spacing(&self) -> Option<f64> {
        if self.entries.len() < 2
            || matches!(self.source, KeySource::InputOrder | KeySource::InstanceNumber)
        {
            return None;
        }
        let first = self.entries.first()?.spatial_key;
        let last = self.entries.last()?.spatial_key;
        let spacing = (last - first).abs() / (self.entries.len() - 1) as f64;
        (spacing > 0.0).then_some(spacing)
    }

    /// Same slices reordered from the current order.
    pub fn resorted(&self, sort_by: SortBy) -> Self {
        Self::new(
            self.entries.iter().map(|entry| entry.slice.clone()).collect(),
            sort_by,
            self.tolerance,
        )
    }
}
