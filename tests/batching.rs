//! Batching, bucket pool and pipeline cache behavior through the public API.
use strata::{
    BucketAllocator, Color, Geometry, ItemDesc, Material, MaterialId, MaterialParams,
    MaterialRegistry, RendererConfig, RendererState, SceneGraph, SoftwareBackend,
    Transform,
};

fn registry(materials: impl IntoIterator<Item = u64>) -> MaterialRegistry {
    let mut registry = MaterialRegistry::new();
    for uid in materials {
        registry.insert(Material::standard(MaterialId(uid), MaterialParams::default()));
    }
    registry
}

#[test]
fn drawables_sharing_a_material_share_a_bucket() {
    let mut graph = SceneGraph::new();
    let scene = graph.create_scene("main", 0);
    let layer = graph.create_layer(scene, 0).unwrap();
    let group = graph.create_group(layer, Transform::identity()).unwrap();
    let rect = Geometry::rect((0.0, 0.0), (2.0, 2.0), Color::WHITE).into_shared();

    let d1 = graph
        .create_item(group, ItemDesc::new(MaterialId(1), rect.clone()))
        .unwrap();
    let d3 = graph
        .create_item(group, ItemDesc::new(MaterialId(2), rect.clone()))
        .unwrap();
    let d2 = graph
        .create_item(
            group,
            ItemDesc::new(MaterialId(1), rect.clone())
                .with_transform(Transform::from_translation(4.0, 0.0)),
        )
        .unwrap();

    let mut allocator = BucketAllocator::new(4, 1, 16);
    for drawable in graph.traverse_scene(scene) {
        allocator.batch(&drawable);
    }
    let handles = allocator.finish_pass();
    assert_eq!(handles.len(), 2);

    let first = allocator.bucket(handles[0]);
    assert_eq!(first.material(), MaterialId(1));
    assert_eq!(first.items, vec![d1, d2]);
    assert_eq!(first.triangle_count(), 4);
    assert_eq!(first.vertices[4].position, [4.0, 0.0]);

    let second = allocator.bucket(handles[1]);
    assert_eq!(second.material(), MaterialId(2));
    assert_eq!(second.items, vec![d3]);

    for handle in handles {
        allocator.release(handle);
    }
    assert_eq!(allocator.live(), 0);
}

#[test]
fn pool_grows_by_chunks_and_keeps_capacity_across_frames() {
    let mut graph = SceneGraph::new();
    let scene = graph.create_scene("many", 0);
    let layer = graph.create_layer(scene, 0).unwrap();
    let group = graph.create_group(layer, Transform::identity()).unwrap();
    for uid in 0..10 {
        graph
            .create_item(
                group,
                ItemDesc::new(
                    MaterialId(uid),
                    Geometry::rect((0.0, 0.0), (1.0, 1.0), Color::WHITE),
                ),
            )
            .unwrap();
    }

    let config = RendererConfig::default().with_bucket_chunk_size(4);
    let mut state = RendererState::new(&config, (4, 4));
    let mut backend = SoftwareBackend::new();
    let materials = registry(0..10);
    let mut screen = strata::Canvas::new(4, 4);

    let mut capacities = Vec::new();
    for _ in 0..3 {
        state.setup_framebuffer(&mut backend, &graph, scene).unwrap();
        state
            .draw_scene_to_framebuffer(&mut backend, &graph, &materials, scene)
            .unwrap();
        state.draw_framebuffer_to_screen(&graph, scene).unwrap();
        state.present(&mut backend, &mut screen).unwrap();
        capacities.push(state.buckets().capacity());
        assert_eq!(state.buckets().live(), 0);
    }
    assert_eq!(capacities, vec![12, 12, 12]);
    assert_eq!(backend.submissions(), 30);
}

#[test]
fn pipeline_lookup_is_idempotent() {
    let mut backend = SoftwareBackend::new();
    let materials = registry([5]);
    let mut state = RendererState::new(&RendererConfig::default(), (1, 1));

    let first = state
        .get_or_create_pipeline(&mut backend, &materials, MaterialId(5))
        .unwrap()
        .id();
    for _ in 0..20 {
        let again = state
            .get_or_create_pipeline(&mut backend, &materials, MaterialId(5))
            .unwrap();
        assert_eq!(again.id(), first);
    }
    assert_eq!(backend.pipelines_created(), 1);
    assert_eq!(state.pipelines().stats().hits, 20);

    assert!(state.destroy_pipeline(&mut backend, MaterialId(5)));
    assert!(!state.destroy_pipeline(&mut backend, MaterialId(5)));
    assert_eq!(backend.pipelines_destroyed(), 1);
}

#[test]
fn explicit_lookup_clears_a_failure_mark() {
    let mut backend = SoftwareBackend::new();
    let mut materials = MaterialRegistry::new();
    let mut state = RendererState::new(&RendererConfig::default(), (1, 1));

    assert!(state
        .get_or_create_pipeline(&mut backend, &materials, MaterialId(9))
        .is_err());
    assert!(state.is_material_failed(MaterialId(9)));

    materials.insert(Material::standard(MaterialId(9), MaterialParams::default()));
    assert!(state
        .get_or_create_pipeline(&mut backend, &materials, MaterialId(9))
        .is_ok());
    assert!(!state.is_material_failed(MaterialId(9)));
    assert_eq!(state.pipelines().len(), 1);
}
