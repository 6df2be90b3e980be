use std::sync::Arc;

use dicom_contour::{
    Contour, EditingSession, Extent, Interpolation, Modifiers, Operation, Orientation,
    PixelPoint, Point2, Polygon, ScreenPoint, Slice, SliceGeometry, SliceStack, SortBy,
    StructureImport, Vec3, ViewerConfig, Voxel,
};
use ndarray::Array2;

const SIZE: usize = 32;

fn canvas() -> Extent {
    Extent::new(SIZE as f64, SIZE as f64).unwrap()
}

/// Five 32x32 slices, 1 mm pixels, 2 mm apart, delivered out of order.
fn session() -> EditingSession {
    let slices: Vec<Arc<Slice>> = [4.0, 0.0, 8.0, 2.0, 6.0]
        .into_iter()
        .map(|z: f64| {
            Slice::new(
                format!("z{z}"),
                Array2::from_shape_fn((SIZE, SIZE), |(r, c)| (r * SIZE + c) as f32 + z as f32),
                SliceGeometry::axial(Vec3::new(0.0, 0.0, z), 1.0, 1.0),
            )
            .with_rescale(1.0, -1024.0)
        })
        .map(Arc::new)
        .collect();
    let mut config = ViewerConfig::default();
    config.brush.radius = 3.0;
    let stack = SliceStack::new(slices, SortBy::Auto, config.slice_tolerance);
    EditingSession::new(stack, config)
}

fn square(x0: f64, y0: f64, size: f64) -> Polygon {
    Polygon::new(vec![
        Point2::new(x0, y0),
        Point2::new(x0 + size, y0),
        Point2::new(x0 + size, y0 + size),
        Point2::new(x0, y0 + size),
    ])
}

#[test]
fn test_edit_session() {
    let mut session = session();
    assert_eq!(session.stack().len(), 5);
    assert_eq!(session.slice_position(), Some(4.0));
    // 2 mm spacing caps the default tolerance at half a slice.
    assert_eq!(session.stack().position_tolerance(), 1.0);
    assert_eq!(session.store().tolerance(), 1.0);

    let rejected = session.import_structures(vec![StructureImport {
        id: 3,
        name: "Liver".to_string(),
        color: [0, 200, 0],
        contours: vec![
            Contour {
                slice_position: 4.0,
                polygons: vec![square(4.0, 4.0, 12.0)],
            },
            Contour {
                slice_position: 6.0,
                polygons: vec![Polygon::new(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)])],
            },
        ],
    }]);
    assert_eq!(rejected.len(), 1);
    session.set_active_structure(Some(3));

    // Click inside the imported square erases a hole.
    let area = session.store().get_contour(3, 4.0).unwrap().area();
    session
        .pointer_down(ScreenPoint::new(10.0, 10.0), Modifiers::default(), canvas())
        .unwrap();
    let erase = session.pointer_up().unwrap().unwrap();
    assert_eq!(erase.operation, Operation::Subtractive);
    assert!(session.store().get_contour(3, 4.0).unwrap().area() < area);
    assert!(!session.store().is_point_inside(3, 4.0, Point2::new(10.0, 10.0)));
    assert!(session.store().is_point_inside(3, 4.0, Point2::new(5.0, 5.0)));

    // A drag starting outside paints, even across the contour.
    let modifiers = Modifiers::default();
    session
        .pointer_down(ScreenPoint::new(24.0, 14.0), modifiers, canvas())
        .unwrap();
    for x in [20.0, 14.0, 8.0] {
        session
            .pointer_move(ScreenPoint::new(x, 14.0), modifiers, canvas())
            .unwrap();
    }
    let paint = session.pointer_up().unwrap().unwrap();
    assert_eq!(paint.operation, Operation::Additive);
    assert!(paint.area_after > paint.area_before);
    assert!(session.store().is_point_inside(3, 4.0, Point2::new(20.0, 14.0)));

    // The other slices are untouched.
    assert!(session.store().get_contour(3, 2.0).is_none());
    assert!(session.take_warnings().is_empty());

    let overlay = session.overlay_paths(canvas()).unwrap();
    assert!(overlay.iter().all(|path| path.structure_id == 3 && path.color == [0, 200, 0]));
    assert!(!overlay.is_empty());
}

#[test]
fn test_zoom_keeps_anchor_under_pointer() {
    let mut session = session();
    session.set_active_structure(Some(1));
    let anchor = ScreenPoint::new(8.0, 12.0);
    session.zoom_at(2.0, anchor, canvas());
    assert_eq!(session.view().zoom(), 2.0);

    // The pixel under the anchor is still (8, 12), so a click there paints
    // around world (8, 12).
    session.pointer_down(anchor, Modifiers::default(), canvas()).unwrap();
    session.pointer_up().unwrap().unwrap();
    assert!(session.store().is_point_inside(1, 4.0, Point2::new(8.0, 12.0)));
    assert!(!session.store().is_point_inside(1, 4.0, Point2::new(16.0, 16.0)));

    session.zoom_at(100.0, anchor, canvas());
    assert_eq!(session.view().zoom(), 5.0);
}

#[test]
fn test_mpr_crosshair_matches_axial_slice() {
    let session = session();
    let volume = session.volume().unwrap();
    assert_eq!(volume.dim(), (5, SIZE, SIZE));

    let slice = session.current_slice().unwrap();
    let z = session.current_index();
    let pixel = PixelPoint::new(7.0, 11.0);
    let expected = slice.sample_at(pixel).unwrap();

    for orientation in [Orientation::Sagittal, Orientation::Coronal, Orientation::Axial] {
        let voxel = Voxel::new(z as f64, pixel.y, pixel.x);
        let (index, at) = volume.project(voxel, orientation, Interpolation::None);
        let raster = volume.plane(orientation, index, Interpolation::None).unwrap();
        let value = raster.data()[[at.y as usize, at.x as usize]];
        assert_eq!(value, expected, "{orientation:?}");
        assert_eq!(raster.to_voxel(at), voxel);
    }

    // Slices are stored in ascending position order.
    let sagittal = volume.sagittal_plane(0, Interpolation::None).unwrap();
    let row: Vec<f32> = sagittal.data().row(0).to_vec();
    assert_eq!(row, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    assert_eq!(sagittal.rescale_intercept(), -1024.0);
}
