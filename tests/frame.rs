//! Whole-frame tests on the software backend.
//!
//! Run with:   cargo test --test frame
use strata::{
    Canvas, Color, Geometry, ItemDesc, MaterialId, MaterialRegistry, RenderContext, RenderError,
    RendererConfig, SceneGraph, SceneKey, ScenePhase, SoftwareBackend, Transform, WindowId,
};
use strata_test_scenes::{
    build_failure_scene, build_main_scene, check_pixels, register_materials, PixelExpectation,
    BROKEN_MATERIAL, CANVAS_HEIGHT, CANVAS_WIDTH, SOLID_MATERIAL,
};

const WINDOW: WindowId = WindowId(1);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn context() -> RenderContext<SoftwareBackend> {
    init_logging();
    let mut materials = MaterialRegistry::new();
    register_materials(&mut materials);
    let mut context = RenderContext::new(SoftwareBackend::new(), materials, RendererConfig::default());
    context.attach_window(
        WINDOW,
        Canvas::new(CANVAS_WIDTH, CANVAS_HEIGHT),
        (CANVAS_WIDTH, CANVAS_HEIGHT),
    );
    context
}

fn screen(context: &RenderContext<SoftwareBackend>) -> &Canvas {
    context.window(WINDOW).expect("window attached").screen()
}

fn assert_expectations(canvas: &Canvas, expectations: &[PixelExpectation]) {
    let failures = check_pixels(canvas, expectations);
    if !failures.is_empty() {
        panic!(
            "{} pixel expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
    }
}

fn full_canvas_scene(graph: &mut SceneGraph, name: &str, z_index: i32, color: Color) -> SceneKey {
    let scene = graph.create_scene(name, z_index);
    let layer = graph.create_layer(scene, 0).unwrap();
    let group = graph.create_group(layer, Transform::identity()).unwrap();
    graph
        .create_item(
            group,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect(
                    (0.0, 0.0),
                    (CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32),
                    color,
                ),
            ),
        )
        .unwrap();
    scene
}

/// Main regression test: renders every tile and validates pixel expectations.
#[test]
fn main_scene_pixel_expectations() {
    let mut context = context();
    let (scene, expectations) = build_main_scene(context.graph_mut());
    context.attach_scene(WINDOW, scene).unwrap();

    let report = context.tick(16_000);
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.composited_scenes, 1);
    assert_expectations(screen(&context), &expectations);
}

#[test]
fn frame_report_counts_batches() {
    let mut context = context();
    let (scene, _) = build_main_scene(context.graph_mut());
    context.attach_scene(WINDOW, scene).unwrap();

    let first = context.tick(16_000);
    // background + 9 tile items + 1 child
    assert_eq!(first.traversed_items, 11);
    // background: solid; main: solid, tinted, opaque; overlay: solid
    assert_eq!(first.buckets, 5);
    assert_eq!(first.draw_submissions, 5);
    assert_eq!(first.pipeline_misses, 3);
    assert_eq!(first.pipeline_hits, 2);
    assert_eq!(context.backend().pipelines_created(), 3);

    let second = context.tick(16_000);
    assert_eq!(second.pipeline_misses, 0);
    assert_eq!(second.pipeline_hits, 5);
    assert_eq!(second.pool_capacity, first.pool_capacity);
    assert_eq!(context.backend().pipelines_created(), 3);
}

#[test]
fn unchanged_items_are_not_reprocessed() {
    let mut context = context();
    let (scene, expectations) = build_main_scene(context.graph_mut());
    context.attach_scene(WINDOW, scene).unwrap();

    let first = context.tick(16_000);
    assert_eq!((first.processed_items, first.reused_items), (11, 0));
    let second = context.tick(16_000);
    assert_eq!((second.processed_items, second.reused_items), (0, 11));
    assert_expectations(screen(&context), &expectations);
}

#[test]
fn moved_item_is_reprocessed_and_redrawn() {
    let red = Color::rgb(255, 0, 0);
    let mut context = context();
    let graph = context.graph_mut();
    let scene = graph.create_scene("moving", 0);
    let layer = graph.create_layer(scene, 0).unwrap();
    let group = graph.create_group(layer, Transform::identity()).unwrap();
    let square = Geometry::rect((0.0, 0.0), (4.0, 4.0), red).into_shared();
    graph
        .create_item(group, ItemDesc::new(SOLID_MATERIAL, square.clone()))
        .unwrap();
    let mover = graph
        .create_item(
            group,
            ItemDesc::new(SOLID_MATERIAL, square).with_transform(Transform::from_translation(8.0, 0.0)),
        )
        .unwrap();
    context.attach_scene(WINDOW, scene).unwrap();

    context.tick(0);
    assert_eq!(screen(&context).pixel(10, 2), Some(red));

    context
        .graph_mut()
        .set_item_transform(mover, Transform::from_translation(20.0, 0.0))
        .unwrap();
    let report = context.tick(0);
    assert_eq!((report.processed_items, report.reused_items), (1, 1));
    assert_eq!(screen(&context).pixel(2, 2), Some(red));
    assert_eq!(screen(&context).pixel(10, 2), Some(Color::TRANSPARENT));
    assert_eq!(screen(&context).pixel(22, 2), Some(red));
}

/// Empty window: nothing attached, the screen is just cleared.
#[test]
fn empty_window_is_cleared() {
    let mut context = context();
    let report = context.tick(0);
    assert_eq!(report.windows, 1);
    assert_eq!(report.composited_scenes, 0);
    assert!(screen(&context).pixels().iter().all(|pixel| *pixel == Color::TRANSPARENT));
}

#[test]
fn higher_scene_z_composites_on_top() {
    let red = Color::rgb(255, 0, 0);
    let blue = Color::rgb(0, 0, 255);

    // Attach order and creation order both disagree with z order.
    let mut context = context();
    let upper = full_canvas_scene(context.graph_mut(), "upper", 1, blue);
    let lower = full_canvas_scene(context.graph_mut(), "lower", 0, red);
    context.attach_scene(WINDOW, upper).unwrap();
    context.attach_scene(WINDOW, lower).unwrap();
    context.tick(0);
    assert_eq!(screen(&context).pixel(5, 5), Some(blue));

    context.graph_mut().set_scene_z_index(lower, 2).unwrap();
    context.tick(0);
    assert_eq!(screen(&context).pixel(5, 5), Some(red));
}

#[test]
fn equal_scene_z_composites_in_registration_order() {
    let mut context = context();
    let first = full_canvas_scene(context.graph_mut(), "first", 0, Color::rgb(255, 0, 0));
    let second = full_canvas_scene(context.graph_mut(), "second", 0, Color::rgb(0, 255, 0));
    context.attach_scene(WINDOW, second).unwrap();
    context.attach_scene(WINDOW, first).unwrap();
    context.tick(0);
    assert_eq!(screen(&context).pixel(0, 0), Some(Color::rgb(0, 255, 0)));
}

#[test]
fn composite_order_ignores_queue_order() {
    let red = Color::rgb(255, 0, 0);
    let blue = Color::rgb(0, 0, 255);
    let mut backend = SoftwareBackend::new();
    let mut materials = MaterialRegistry::new();
    register_materials(&mut materials);
    let mut graph = SceneGraph::new();
    let s1 = full_canvas_scene(&mut graph, "s1", 0, red);
    let s2 = full_canvas_scene(&mut graph, "s2", 1, blue);

    for order in [[s1, s2], [s2, s1]] {
        let mut state =
            strata::RendererState::new(&RendererConfig::default(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        let mut screen = Canvas::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        for scene in order {
            state.setup_framebuffer(&mut backend, &graph, scene).unwrap();
            state
                .draw_scene_to_framebuffer(&mut backend, &graph, &materials, scene)
                .unwrap();
        }
        for scene in order {
            state.draw_framebuffer_to_screen(&graph, scene).unwrap();
        }
        assert_eq!(state.present(&mut backend, &mut screen).unwrap(), 2);
        assert_eq!(screen.pixel(10, 10), Some(blue));
        assert_eq!(state.scene_state(s1).unwrap().phase(), ScenePhase::Idle);
        state.teardown(&mut backend);
    }
    assert_eq!(backend.live_targets(), 0);
}

#[test]
fn failed_material_is_skipped_and_others_draw() {
    let mut context = context();
    let (scene, expectations) = build_failure_scene(context.graph_mut());
    context.attach_scene(WINDOW, scene).unwrap();

    let report = context.tick(0);
    assert_eq!(report.buckets, 2);
    assert_eq!(report.draw_submissions, 1);
    assert_eq!(report.skipped_buckets, 1);
    assert_eq!(report.pipeline_failures, 1);
    assert!(matches!(
        report.errors.as_slice(),
        [RenderError::PipelineCreation { material, .. }] if *material == BROKEN_MATERIAL
    ));
    assert_expectations(screen(&context), &expectations);

    // Not retried automatically.
    let report = context.tick(0);
    assert_eq!(report.skipped_buckets, 1);
    assert_eq!(report.pipeline_failures, 0);
    assert!(report.errors.is_empty());
    let state = context.window(WINDOW).unwrap().state();
    assert!(state.is_material_failed(BROKEN_MATERIAL));

    // Explicit retry attempts the build again.
    assert!(context
        .window_mut(WINDOW)
        .unwrap()
        .retry_material(BROKEN_MATERIAL));
    let report = context.tick(0);
    assert_eq!(report.pipeline_failures, 1);
}

#[test]
fn missing_material_is_reported_per_frame_once() {
    let mut context = context();
    let scene = context.graph_mut().create_scene("orphan", 0);
    let layer = context.graph_mut().create_layer(scene, 0).unwrap();
    let group = context
        .graph_mut()
        .create_group(layer, Transform::identity())
        .unwrap();
    context
        .graph_mut()
        .create_item(
            group,
            ItemDesc::new(MaterialId(99), Geometry::rect((0.0, 0.0), (4.0, 4.0), Color::WHITE)),
        )
        .unwrap();
    context.attach_scene(WINDOW, scene).unwrap();

    let report = context.tick(0);
    assert!(matches!(
        report.errors.as_slice(),
        [RenderError::MaterialNotFound(MaterialId(99))]
    ));
    assert_eq!(screen(&context).pixel(1, 1), Some(Color::TRANSPARENT));
}

#[test]
fn oversized_target_skips_scene_only() {
    init_logging();
    let mut materials = MaterialRegistry::new();
    register_materials(&mut materials);
    let backend = SoftwareBackend::new().with_max_target_dimension(CANVAS_WIDTH);
    let mut context = RenderContext::new(backend, materials, RendererConfig::default());
    context.attach_window(WINDOW, Canvas::new(CANVAS_WIDTH, CANVAS_HEIGHT), (CANVAS_WIDTH, CANVAS_HEIGHT));
    let scene = full_canvas_scene(context.graph_mut(), "fits", 0, Color::WHITE);
    context.attach_scene(WINDOW, scene).unwrap();
    assert_eq!(context.tick(0).composited_scenes, 1);

    context
        .resize_window(WINDOW, (CANVAS_WIDTH * 2, CANVAS_HEIGHT))
        .unwrap();
    let report = context.tick(0);
    assert_eq!(report.skipped_scenes, 1);
    assert_eq!(report.composited_scenes, 0);
    assert!(matches!(
        report.errors.as_slice(),
        [RenderError::TargetAllocation { scene, .. }] if scene == "fits"
    ));
    assert_eq!(screen(&context).size(), (CANVAS_WIDTH * 2, CANVAS_HEIGHT));

    context.resize_window(WINDOW, (CANVAS_WIDTH, CANVAS_HEIGHT)).unwrap();
    assert_eq!(context.tick(0).composited_scenes, 1);
}

#[test]
fn resize_reallocates_scene_targets() {
    let mut context = context();
    let scene = full_canvas_scene(context.graph_mut(), "main", 0, Color::WHITE);
    context.attach_scene(WINDOW, scene).unwrap();
    context.tick(0);

    context.resize_window(WINDOW, (8, 4)).unwrap();
    context.tick(0);
    let state = context.window(WINDOW).unwrap().state();
    assert_eq!(state.scene_state(scene).unwrap().target_size(), (8, 4));
    assert_eq!(context.backend().live_targets(), 1);
    assert_eq!(screen(&context).pixel(7, 3), Some(Color::WHITE));
}

#[test]
fn destroyed_scene_releases_its_target() {
    let mut context = context();
    let scene = full_canvas_scene(context.graph_mut(), "doomed", 0, Color::WHITE);
    context.attach_scene(WINDOW, scene).unwrap();
    context.tick(0);
    assert_eq!(context.backend().live_targets(), 1);

    context.commands().push(strata::SceneCommand::DestroyScene(scene.into()));
    let report = context.tick(0);
    assert_eq!(report.commands_applied, 1);
    assert_eq!(report.composited_scenes, 0);
    assert_eq!(context.backend().live_targets(), 0);
    assert!(!context.window(WINDOW).unwrap().state().is_attached(scene));
    assert!(matches!(
        context.attach_scene(WINDOW, scene),
        Err(RenderError::UnknownScene(_))
    ));
}

#[test]
fn windows_render_independently() {
    let mut context = context();
    let other = WindowId(2);
    context.attach_window(other, Canvas::new(4, 4), (4, 4));
    let scene = full_canvas_scene(context.graph_mut(), "shared", 0, Color::WHITE);
    context.attach_scene(WINDOW, scene).unwrap();
    context.attach_scene(other, scene).unwrap();

    let report = context.tick(0);
    assert_eq!(report.windows, 2);
    assert_eq!(report.composited_scenes, 2);
    assert_eq!(context.backend().live_targets(), 2);
    assert_eq!(context.backend().pipelines_created(), 2);

    let screen = context.detach_window(other).unwrap();
    assert_eq!(screen.pixel(3, 3), Some(Color::WHITE));
    assert_eq!(context.backend().live_targets(), 1);
    assert_eq!(context.backend().pipelines_destroyed(), 1);
}
