//! Benchmarks one frame pass on the software backend.
//!
//! Measures traversal and batching alone, then a full tick that also
//! rasterizes and composites.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata::{
    BucketAllocator, Canvas, Color, Geometry, ItemDesc, Material, MaterialId, MaterialParams,
    MaterialRegistry, RenderContext, RendererConfig, SceneGraph, SceneKey, SoftwareBackend,
    Transform, WindowId,
};

const MATERIALS: u64 = 8;

fn populate(graph: &mut SceneGraph, item_count: usize) -> SceneKey {
    let scene = graph.create_scene("bench", 0);
    let layer = graph.create_layer(scene, 0).unwrap();
    let group = graph.create_group(layer, Transform::identity()).unwrap();
    let rect = Geometry::rect((0.0, 0.0), (4.0, 4.0), Color::rgba(40, 80, 160, 200)).into_shared();
    for i in 0..item_count {
        let x = (i % 32) as f32 * 4.0;
        let y = (i / 32 % 32) as f32 * 4.0;
        graph
            .create_item(
                group,
                ItemDesc::new(MaterialId(i as u64 % MATERIALS), rect.clone())
                    .with_transform(Transform::from_translation(x, y)),
            )
            .unwrap();
    }
    scene
}

fn bench_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("batching");

    for item_count in [100, 1_000, 10_000].iter() {
        let mut graph = SceneGraph::new();
        let scene = populate(&mut graph, *item_count);
        let mut allocator = BucketAllocator::new(16, 1, 256);

        group.bench_with_input(
            BenchmarkId::from_parameter(item_count),
            item_count,
            |b, _| {
                b.iter(|| {
                    for drawable in graph.traverse_scene(scene) {
                        allocator.batch(&drawable);
                    }
                    let handles = allocator.finish_pass();
                    black_box(handles.len());
                    for handle in handles {
                        allocator.release(handle);
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    let window = WindowId(1);

    for item_count in [100, 1_000].iter() {
        let mut materials = MaterialRegistry::new();
        for uid in 0..MATERIALS {
            materials.insert(Material::standard(MaterialId(uid), MaterialParams::default()));
        }
        let mut context =
            RenderContext::new(SoftwareBackend::new(), materials, RendererConfig::default());
        context.attach_window(window, Canvas::new(128, 128), (128, 128));
        let scene = populate(context.graph_mut(), *item_count);
        context.attach_scene(window, scene).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(item_count),
            item_count,
            |b, _| {
                b.iter(|| black_box(context.tick(16_000).draw_submissions));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_batching, bench_tick);
criterion_main!(benches);
