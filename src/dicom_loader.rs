//! Adapters from dicom-rs objects to slices and structure imports.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption};
use dicom_dictionary_std::tags;
use futures::future::BoxFuture;
use ndarray::s;

use crate::contour::{Contour, StructureImport};
use crate::geometry::{Point2, Polygon};
use crate::prefetch::{DecodeError, SliceDecoder};
use crate::slice::{Slice, SliceKey};
use crate::transform::{SliceGeometry, Vec3};

const DEFAULT_STRUCTURE_COLOR: [u8; 3] = [255, 0, 0];

fn multi_f64(object: &InMemDicomObject, tag: dicom::core::Tag) -> Option<Vec<f64>> {
    object.element(tag).ok()?.to_multi_float64().ok()
}

fn single_f64(object: &InMemDicomObject, tag: dicom::core::Tag) -> Option<f64> {
    object.element(tag).ok()?.to_float64().ok()
}

fn single_i32(object: &InMemDicomObject, tag: dicom::core::Tag) -> Option<i32> {
    object.element(tag).ok()?.to_int::<i32>().ok()
}

fn vec3(values: &[f64]) -> Vec3 {
    Vec3::new(values[0], values[1], values[2])
}

/// Plane geometry from Image Position/Orientation (Patient) and Pixel
/// Spacing. Missing attributes fall back to an axial plane at the origin
/// with 1 mm pixels.
pub fn slice_geometry(object: &InMemDicomObject) -> SliceGeometry {
    let position = multi_f64(object, tags::IMAGE_POSITION_PATIENT)
        .filter(|values| values.len() >= 3)
        .map(|values| vec3(&values));
    let orientation = multi_f64(object, tags::IMAGE_ORIENTATION_PATIENT)
        .filter(|values| values.len() >= 6);
    let spacing = multi_f64(object, tags::PIXEL_SPACING).filter(|values| values.len() >= 2);

    if position.is_none() {
        log::warn!("Missing Image Position (Patient), placing slice at the origin");
    }
    let (row_spacing, column_spacing) = spacing.map_or((1.0, 1.0), |values| (values[0], values[1]));
    let mut geometry = SliceGeometry::axial(position.unwrap_or_default(), row_spacing, column_spacing);
    if let Some(values) = orientation {
        geometry.row_cosine = vec3(&values[0..3]);
        geometry.column_cosine = vec3(&values[3..6]);
    }
    geometry
}

/// Builds a slice from a decoded image object. Stored values are kept
/// as-is; the modality rescale travels with the slice.
pub fn slice_from_object(
    key: SliceKey,
    object: &FileDicomObject<InMemDicomObject>,
) -> Result<Slice, DecodeError> {
    let malformed = |reason: String| DecodeError::Malformed {
        key: key.clone(),
        reason,
    };
    let pixel_data = object
        .decode_pixel_data()
        .map_err(|err| malformed(err.to_string()))?;
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let samples = pixel_data
        .to_ndarray_with_options::<f32>(&options)
        .map_err(|err| malformed(err.to_string()))?
        .slice_move(s![0, .., .., 0]);

    let slope = single_f64(object, tags::RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = single_f64(object, tags::RESCALE_INTERCEPT).unwrap_or(0.0);

    Ok(Slice::new(key.clone(), samples, slice_geometry(object))
        .with_rescale(slope as f32, intercept as f32)
        .with_slice_location(single_f64(object, tags::SLICE_LOCATION))
        .with_instance_number(single_i32(object, tags::INSTANCE_NUMBER)))
}

pub fn read_slice(key: SliceKey, path: &Path) -> Result<Slice, DecodeError> {
    let object = open_file(path)?;
    slice_from_object(key, &object)
}

/// Decodes `.dcm` files, keyed by path, on tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct DicomSliceDecoder {
    paths: BTreeMap<SliceKey, PathBuf>,
}

impl DicomSliceDecoder {
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths
                .into_iter()
                .map(|path| (SliceKey(path.display().to_string()), path))
                .collect(),
        }
    }

    /// Every `.dcm` file directly inside `path`.
    pub fn scan_directory(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let paths: Vec<PathBuf> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        log::info!("Found {} DICOM files in {}", paths.len(), path.as_ref().display());
        Ok(Self::from_paths(paths))
    }

    pub fn keys(&self) -> Vec<SliceKey> {
        self.paths.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl SliceDecoder for DicomSliceDecoder {
    fn decode(&self, key: &SliceKey) -> BoxFuture<'_, Result<Slice, DecodeError>> {
        let key = key.clone();
        let path = self.paths.get(&key).cloned();
        Box::pin(async move {
            let path = path.ok_or_else(|| DecodeError::UnknownKey(key.clone()))?;
            tokio::task::spawn_blocking(move || read_slice(key, &path))
                .await
                .map_err(|err| DecodeError::Task(err.to_string()))?
        })
    }
}

fn display_color(item: &InMemDicomObject) -> [u8; 3] {
    item.element(tags::ROI_DISPLAY_COLOR)
        .ok()
        .and_then(|element| element.to_multi_int::<i32>().ok())
        .filter(|values| values.len() >= 3)
        .map_or(DEFAULT_STRUCTURE_COLOR, |values| {
            [0, 1, 2].map(|i| values[i].clamp(0, 255) as u8)
        })
}

/// One Contour Data entry mapped into the in-plane frame of `frame`.
fn contour_from_item(item: &InMemDicomObject, frame: &SliceGeometry) -> Option<Contour> {
    let data = multi_f64(item, tags::CONTOUR_DATA)?;
    let points: Vec<Vec3> = data.chunks_exact(3).map(vec3).collect();
    let slice_position = frame.through_plane(*points.first()?);
    let polygon = match points
        .iter()
        .map(|&point| frame.world_to_plane(point))
        .collect::<Result<Vec<Point2>, _>>()
    {
        Ok(polygon) => polygon,
        Err(err) => {
            log::warn!("Skipping contour at {slice_position}: {err}");
            return None;
        }
    };
    Some(Contour {
        slice_position,
        polygons: vec![Polygon::new(polygon)],
    })
}

/// Structures of an RT-STRUCT object, one per ROI contour entry. Contours
/// on the same slice are kept separate; the store merges them on import.
///
/// Contour points are patient coordinates; they are expressed in the
/// in-plane frame of `frame`, any slice of the image series they outline.
pub fn structures_from_object(
    object: &InMemDicomObject,
    frame: &SliceGeometry,
) -> Vec<StructureImport> {
    let names: BTreeMap<i32, String> = object
        .element(tags::STRUCTURE_SET_ROI_SEQUENCE)
        .ok()
        .and_then(|element| element.items())
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            let number = single_i32(item, tags::ROI_NUMBER)?;
            let name = item.element(tags::ROI_NAME).ok()?.to_str().ok()?;
            Some((number, name.trim().to_string()))
        })
        .collect();

    let roi_contours = object
        .element(tags::ROI_CONTOUR_SEQUENCE)
        .ok()
        .and_then(|element| element.items())
        .unwrap_or_default();

    roi_contours
        .iter()
        .filter_map(|item| {
            let id = single_i32(item, tags::REFERENCED_ROI_NUMBER)?;
            let contours: Vec<Contour> = item
                .element(tags::CONTOUR_SEQUENCE)
                .ok()
                .and_then(|element| element.items())
                .unwrap_or_default()
                .iter()
                .filter_map(|item| contour_from_item(item, frame))
                .collect();
            Some(StructureImport {
                id,
                name: names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("ROI {id}")),
                color: display_color(item),
                contours,
            })
        })
        .collect()
}

pub fn load_structure_set(
    path: impl AsRef<Path>,
    frame: &SliceGeometry,
) -> Result<Vec<StructureImport>, DecodeError> {
    let object = open_file(path.as_ref())?;
    let structures = structures_from_object(&object, frame);
    log::info!(
        "Read {} structures from {}",
        structures.len(),
        path.as_ref().display()
    );
    Ok(structures)
}
