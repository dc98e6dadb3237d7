//! Benchmarks for meshing operations.

use criterion::{criterion_group, criterion_main, Criterion};
use brepmesh::algo::recombine::{match_triangles, recombine, DualGraph};
use brepmesh::prelude::*;
use nalgebra::Point3;

/// Perturbed `n x n` grid split into right triangles.
fn create_grid_triangles(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    let mut tris = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            let interior = i > 0 && j > 0 && i < n && j < n;
            let shift = if interior { 0.1 * ((i * 7 + j * 3) % 5) as f64 / 5.0 } else { 0.0 };
            points.push(Point3::new(i as f64 + shift, j as f64 - shift, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            tris.push([v00, v10, v11]);
            tris.push([v00, v11, v01]);
        }
    }

    (points, tris)
}

fn bench_recombination(c: &mut Criterion) {
    let (points, tris) = create_grid_triangles(30);

    c.bench_function("dual_graph_30x30", |b| {
        b.iter(|| DualGraph::build(&tris, &points).unwrap());
    });

    let dual = DualGraph::build(&tris, &points).unwrap();
    c.bench_function("blossom_matching_30x30", |b| {
        b.iter(|| match_triangles(&dual));
    });

    c.bench_function("recombine_30x30", |b| {
        b.iter(|| recombine(&tris, &points).unwrap());
    });
}

fn bench_face_meshing(c: &mut Criterion) {
    let model = shapes::plate_with_hole(2.0, 1.0, 0.25).unwrap();
    let options = MeshOptions::default().sequential();

    c.bench_function("plate_with_hole_h0.05", |b| {
        b.iter(|| {
            let mut mesh = Mesh::new(&model);
            mesh.mesh(&options, 0.05).unwrap();
            mesh.global().unwrap().num_quads()
        });
    });
}

fn bench_sweep(c: &mut Criterion) {
    let model = shapes::holed_block(2.0, 1.0, 0.25, 1.0).unwrap();
    let options = MeshOptions::default();

    c.bench_function("holed_block_sweep_h0.1", |b| {
        b.iter(|| {
            let mut mesh = Mesh::new(&model);
            mesh.mesh(&options, 0.1).unwrap();
            mesh.global().unwrap().num_hexes()
        });
    });
}

criterion_group!(benches, bench_recombination, bench_face_meshing, bench_sweep);
criterion_main!(benches);
