use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use mesh_worklet::prelude::*;

/// Cells whose centroid lies below a plane emit two triangles.
struct BelowPlane {
    z: f32,
}

impl Worklet for BelowPlane {
    fn signature(&self) -> Signature {
        Signature::new().topology().field_out::<Id>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        let points = inv.cell_points();
        let z: f32 = points.iter().map(|&p| inv.point_coordinates(p)[2]).sum::<f32>() / points.len() as f32;
        inv.set(1, if z < self.z { 2 } else { 0 });
    }
}

/// Splits the bottom face of a voxel into two triangles.
struct BottomFace;

impl Worklet for BottomFace {
    fn signature(&self) -> Signature {
        Signature::new().topology()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        let p = inv.cell_points();
        if inv.visit_index() == 0 {
            inv.set_cell_points(&[p[0], p[1], p[3]]);
        } else {
            inv.set_cell_points(&[p[0], p[3], p[2]]);
        }
    }
}

fn run<B: Backend>(backend: B, grid: &mut UniformGrid, remove_duplicates: bool) -> GenerateSummary {
    let mut output = UnstructuredGrid::new(CellShape::Triangle, backend.clone());
    DispatcherGenerateTopology::new(BelowPlane { z: 10.0 }, BottomFace, backend)
        .with_config(GenerateConfig {
            remove_duplicate_points: remove_duplicates,
        })
        .invoke(grid, &mut [], &mut [], &mut output)
        .expect("generate-topology failed")
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_topology");
    for &n in &[16usize, 32, 64] {
        let mut grid = UniformGrid::new([n, n, n], [0.0; 3], [1.0; 3]).expect("grid");
        for remove in [true, false] {
            let label = if remove { "dedup" } else { "no_dedup" };
            group.bench_with_input(BenchmarkId::new(format!("serial_{label}"), n), &n, |b, _| {
                b.iter(|| run(SerialBackend, &mut grid, remove))
            });
            #[cfg(feature = "rayon")]
            group.bench_with_input(BenchmarkId::new(format!("rayon_{label}"), n), &n, |b, _| {
                b.iter(|| run(RayonBackend::new(), &mut grid, remove))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
