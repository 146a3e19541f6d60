//! Slicing benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sla_slicer::config::PrintConfig;
use sla_slicer::geometry::Transform3D;
use sla_slicer::mesh::TriangleMesh;
use sla_slicer::print::{ModelObject, Print};
use sla_slicer::slice::{slice_mesh, MeshSlicingParams, SlicingMode};

fn levels(height: f64, layer_height: f64) -> Vec<f64> {
    let count = (height / layer_height) as usize;
    (0..count).map(|i| (i as f64 + 0.5) * layer_height).collect()
}

fn bench_slice_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_mesh");
    let params = MeshSlicingParams::new(SlicingMode::Regular, 0.001);

    for steps in [32usize, 128, 512] {
        let cylinder = TriangleMesh::cylinder(20.0, 30.0, steps);
        let zs = levels(30.0, 0.05);
        group.bench_with_input(BenchmarkId::new("cylinder", steps), &cylinder, |b, mesh| {
            b.iter(|| slice_mesh(black_box(mesh), black_box(&zs), &params, &|| false))
        });
    }
    group.finish();
}

fn cube_object(size: f64) -> ModelObject {
    let mut object = ModelObject::from_mesh("cube", TriangleMesh::cube(size));
    object.transform = Transform3D::translation(0.0, 0.0, size / 2.0);
    object
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    let mut bare = PrintConfig::default();
    bare.object = bare.object.supports(false).pad(false);
    group.bench_function("cube_no_supports", |b| {
        b.iter(|| {
            let mut print = Print::new(bare.clone());
            print.add_object(cube_object(20.0));
            print.process().map(|_| print.statistics().layer_count())
        })
    });

    group.bench_function("cube_supports_and_pad", |b| {
        b.iter(|| {
            let mut print = Print::new(PrintConfig::default());
            print.add_object(cube_object(20.0));
            print.process().map(|_| print.statistics().layer_count())
        })
    });

    // Only the aggregation reruns after an exposure change.
    let mut print = Print::new(bare.clone());
    for _ in 0..4 {
        print.add_object(cube_object(10.0));
    }
    let _ = print.process();
    let mut toggle = false;
    group.bench_function("merge_and_eval_four_objects", |b| {
        b.iter(|| {
            toggle = !toggle;
            let mut config = bare.clone();
            config.material.exposure_time = if toggle { 8.0 } else { 9.0 };
            let _ = print.apply_config(config);
            print.process().map(|_| print.statistics().estimated_print_time)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_slice_mesh, bench_pipeline);
criterion_main!(benches);
