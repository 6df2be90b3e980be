//! # DICOM-contour library
//!
//! This crate serves the geometric core of a DICOM viewer with contour
//! editing: it maps between patient, pixel and screen coordinates, windows
//! scanner intensities into grayscale, orders slices into a stack,
//! reconstructs sagittal and coronal planes, and edits RT-STRUCT style
//! contours with a freehand brush.
//!
//! This library is part of the dicom-rs ecosystem. DICOM files are decoded
//! by dicom-rs; the core itself works on decoded [`Slice`]s and
//! [`StructureImport`]s, so it can also be fed by any other parser. Decoding
//! runs concurrently in the background and feeds a shared cache, while all
//! editing happens synchronously, one pointer event at a time.
//!
//! The main pieces are:
//!  - [`SpatialTransform`]: world <-> pixel <-> screen, with zoom and pan
//!  - [`windowing`]: window/level mapping to 8-bit grayscale
//!  - [`SliceStack`]: slices ordered by slice location, image position or
//!    instance number
//!  - [`ContourStore`]: per-structure, per-slice polygon sets
//!  - [`BrushEngine`]: paint/erase strokes merged with polygon booleans
//!  - [`Volume`]: multi-planar reconstruction, optionally aspect-corrected
//!
//! Library consumers drive an [`EditingSession`], which wires these together
//! and renders the current slice and its contour overlay.
//!
//! # Examples
//!
//! ## Painting a contour on the middle slice of a series
//!
//! Decode every `.dcm` file of the dicom/ directory, order the slices, paint
//! with the brush and reconstruct the sagittal plane through the center of
//! the volume.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use dicom_contour::{
//! #     DicomSliceDecoder, EditingSession, Extent, Interpolation, Modifiers, Prefetcher,
//! #     ScreenPoint, SliceCache, SliceStack, ViewerConfig,
//! # };
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ViewerConfig::default();
//! let decoder = Arc::new(DicomSliceDecoder::scan_directory("dicom")?);
//! let prefetcher = Prefetcher::new(decoder.clone(), Arc::new(SliceCache::new()), 6);
//! prefetcher.prefetch(decoder.keys()).await;
//!
//! let slices = decoder
//!     .keys()
//!     .iter()
//!     .filter_map(|key| prefetcher.cache().get(key))
//!     .collect();
//! let stack = SliceStack::new(slices, config.sort_by, config.slice_tolerance);
//! let mut session = EditingSession::new(stack, config);
//!
//! let canvas = Extent::new(512.0, 512.0)?;
//! session.set_active_structure(Some(1));
//! session.pointer_down(ScreenPoint::new(256.0, 256.0), Modifiers::default(), canvas)?;
//! session.pointer_move(ScreenPoint::new(300.0, 256.0), Modifiers::default(), canvas)?;
//! session.pointer_up()?;
//!
//! let volume = session.volume()?;
//! let sagittal = volume.sagittal_plane(volume.dim().2 / 2, Interpolation::Bilinear)?;
//! if let Some(image) = sagittal.render(session.window()) {
//!     image.save("sagittal.png")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod brush;
pub mod cache;
pub mod clip;
pub mod config;
pub mod contour;
pub mod dicom_loader;
pub mod enums;
pub mod geometry;
mod interpolator;
pub mod prefetch;
pub mod session;
pub mod slice;
pub mod slice_stack;
pub mod transform;
pub mod view;
pub mod volume;
pub mod windowing;

pub use brush::{BrushEngine, BrushError, BrushSettings, CommitOutcome, CursorFeedback, Modifiers};
pub use cache::SliceCache;
pub use config::{ConfigError, LogLevel, ViewerConfig};
pub use contour::{Contour, ContourError, ContourStore, Structure, StructureId, StructureImport};
pub use dicom_loader::{DicomSliceDecoder, load_structure_set};
pub use enums::{Interpolation, Operation, Orientation, ScalePolicy, SortBy};
pub use geometry::{Point2, Polygon};
pub use prefetch::{DecodeError, FetchOutcome, Prefetcher, SliceDecoder, prefetch_window};
pub use session::{EditingSession, OverlayPath};
pub use slice::{Slice, SliceKey};
pub use slice_stack::SliceStack;
pub use transform::{
    CoordinateError, Extent, PixelPoint, ScreenMapping, ScreenPoint, SliceGeometry,
    SpatialTransform, Vec3,
};
pub use view::{ViewState, ZoomLimits};
pub use volume::{Raster, Volume, VolumeError, Voxel};
pub use windowing::{WindowLevel, WindowPreset};
