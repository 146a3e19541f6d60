//! Configuration and mesh files, capability fallbacks, user edited
//! support points, cancellation and rasterization.

use sla_slicer::config::PrintConfig;
use sla_slicer::geometry::{expolygons_area, Point, Point3F, Transform3D};
use sla_slicer::mesh::{load_stl, save_stl, save_stl_ascii, TriangleMesh};
use sla_slicer::print::{
    Instance, ModelObject, ModelVolume, ObjectStatus, ObjectStep, PointsStatus, Print,
    VolumeKind, APPROXIMATED_PREVIEW_WARNING,
};
use sla_slicer::raster::{MonochromeArchive, RasterParams};
use sla_slicer::support::SupportPoint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn cube_on_ground(size: f64) -> ModelObject {
    let mut object = ModelObject::from_mesh("cube", TriangleMesh::cube(size));
    object.transform = Transform3D::translation(0.0, 0.0, size / 2.0);
    object
}

fn bare_config() -> PrintConfig {
    let mut config = PrintConfig::default();
    config.printer = config.printer.elefant_foot(0.0, 0.2);
    config.object = config.object.supports(false).pad(false);
    config
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("print.json");

    let mut config = PrintConfig::default();
    config.material = config.material.exposure(20.0, 8.0).area_fill(35.0);
    config.object = config.object.layer_height(0.025).faded_layers(6).hollowing(true);
    std::fs::write(&path, config.to_json_string().unwrap()).unwrap();

    let loaded = PrintConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = PrintConfig::from_json_str(r#"{ "object": { "layer_height": 0.1 } }"#).unwrap();
    assert_eq!(config.object.layer_height, 0.1);
    assert_eq!(config.material, PrintConfig::default().material);
    assert_eq!(config.printer, PrintConfig::default().printer);
}

#[test]
fn test_invalid_config_rejected() {
    let err = PrintConfig::from_json_str(r#"{ "object": { "layer_height": 0.0 } }"#).unwrap_err();
    assert!(err.to_string().contains("layer_height"));

    let mut print = Print::new(PrintConfig::default());
    let mut bad = PrintConfig::default();
    bad.material.area_fill = 150.0;
    assert!(print.apply_config(bad).is_err());
    assert_eq!(*print.config(), PrintConfig::default());
}

#[test]
fn test_stl_round_trip() {
    let dir = TempDir::new().unwrap();
    let cube = TriangleMesh::cube(10.0);

    let binary = dir.path().join("cube.stl");
    save_stl(&binary, &cube).unwrap();
    let loaded = load_stl(&binary).unwrap();
    assert_eq!(loaded.triangle_count(), 12);
    assert!((loaded.volume() - 1000.0).abs() < 1e-3);

    let ascii = dir.path().join("cube_ascii.stl");
    save_stl_ascii(&ascii, &cube).unwrap();
    let loaded = load_stl(&ascii).unwrap();
    assert_eq!(loaded.triangle_count(), 12);
    assert!((loaded.volume() - 1000.0).abs() < 1e-3);
}

#[test]
fn test_negative_volume_without_boolean_kernel() {
    let mut object = cube_on_ground(10.0);
    object.add_volume(ModelVolume::new(
        "cut",
        TriangleMesh::cube(4.0),
        VolumeKind::NegativeVolume,
    ));

    let mut print = Print::new(bare_config());
    print.add_object(object);
    print.process().unwrap();

    let po = &print.objects()[0];
    assert_eq!(*po.status(), ObjectStatus::Ok);
    assert!(po
        .warnings()
        .iter()
        .any(|w| w.step == ObjectStep::Assembly && w.message == APPROXIMATED_PREVIEW_WARNING));
    // Without a voxelizer the preview stays empty.
    assert!(po
        .preview_mesh(ObjectStep::Assembly)
        .map_or(false, |m| m.is_empty()));

    // The slices are exact regardless of the preview.
    let mid = po
        .slice_index()
        .iter()
        .position(|r| (r.slice_level() - 5.0).abs() < 0.05)
        .unwrap();
    let area = expolygons_area(&po.model_slices()[mid]) / 1e12;
    assert!((area - 84.0).abs() < 1e-3);
}

fn mid_area_with_cut(negative_first: bool) -> f64 {
    let body = ModelVolume::new("body", TriangleMesh::cube(10.0), VolumeKind::ModelPart);
    let cut = ModelVolume::new("cut", TriangleMesh::cube(4.0), VolumeKind::NegativeVolume);

    let mut object = ModelObject::new("cut cube");
    if negative_first {
        object.add_volume(cut).add_volume(body);
    } else {
        object.add_volume(body).add_volume(cut);
    }
    object.add_instance(Instance::default());
    object.transform = Transform3D::translation(0.0, 0.0, 5.0);

    let mut print = Print::new(bare_config());
    print.add_object(object);
    print.process().unwrap();

    let po = &print.objects()[0];
    assert_eq!(*po.status(), ObjectStatus::Ok);
    let mid = po
        .slice_index()
        .iter()
        .position(|r| (r.slice_level() - 5.0).abs() < 0.05)
        .unwrap();
    expolygons_area(&po.model_slices()[mid]) / 1e12
}

#[test]
fn test_negative_volume_order_does_not_matter() {
    let cut_last = mid_area_with_cut(false);
    let cut_first = mid_area_with_cut(true);
    assert!((cut_last - 84.0).abs() < 1e-3);
    assert!((cut_first - cut_last).abs() < 1e-9);
}

#[test]
fn test_user_support_points_are_kept() {
    let mut config = bare_config();
    config.object = config.object.supports(true);

    let mut object = cube_on_ground(10.0);
    object.set_support_points(
        vec![
            SupportPoint::new(Point3F::new(0.0, 0.0, -5.0), 0.2, true),
            SupportPoint::new(Point3F::new(2.0, 2.0, -5.0), 0.2, false),
        ],
        PointsStatus::UserModified,
    );

    let mut print = Print::new(config);
    print.add_object(object);
    print.process().unwrap();

    let points = print.objects()[0].support_points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].pos, Point3F::new(0.0, 0.0, 0.0));
    assert_eq!(points[1].pos, Point3F::new(2.0, 2.0, 0.0));
    assert!(points[0].is_new_island);
}

#[test]
fn test_cancel_from_status_callback() {
    let mut print = Print::new(PrintConfig::default());
    print.add_object(cube_on_ground(10.0));

    let token = print.cancel_token();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    print.set_status_callback(move |status| {
        if status.message == "Slicing model" && !flag.swap(true, Ordering::SeqCst) {
            token.cancel();
        }
    });

    let err = print.process().unwrap_err();
    assert!(err.is_cancelled());
    assert!(fired.load(Ordering::SeqCst));
    assert!(!print.objects()[0].is_complete());
    assert!(print.print_layers().is_empty());

    print.cancel_token().reset();
    print.process().unwrap();
    assert!(print.objects()[0].is_complete());
    assert_eq!(print.progress(), 100.0);
}

#[test]
fn test_rasterize_into_archive() {
    let config = bare_config();
    let archive = Arc::new(MonochromeArchive::new(RasterParams::from_printer_config(
        &config.printer,
    )));

    let mut object = cube_on_ground(10.0);
    object.instances = vec![Instance::new(
        Point::new_scale(
            config.printer.display_width / 2.0,
            config.printer.display_height / 2.0,
        ),
        0.0,
    )];

    let mut print = Print::new(config);
    print.set_raster_archive(archive.clone());
    print.add_object(object);
    print.process().unwrap();

    let layer_count = print.print_layers().len();
    assert!(layer_count > 0);
    assert_eq!(archive.layer_count(), layer_count);

    let middle = archive.layer(layer_count / 2).unwrap();
    assert!((middle.filled_area() - 100.0).abs() < 3.0);
}
