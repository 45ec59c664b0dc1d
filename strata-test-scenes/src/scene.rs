use strata::lyon::math::point;
use strata::lyon::path::Path;
use strata::{
    BlendMode, Color, Geometry, GroupKey, ItemDesc, LayerKey, Material, MaterialId,
    MaterialParams, MaterialRegistry, SceneGraph, SceneKey, ShaderSource, Transform,
};

use crate::expectations::PixelExpectation;

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 16;
const COLUMNS: u32 = 4;
const ROWS: u32 = 2;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

/// Built-in shader, alpha blending, white tint.
pub const SOLID_MATERIAL: MaterialId = MaterialId(1);
/// Built-in shader with a magenta tint.
pub const TINTED_MATERIAL: MaterialId = MaterialId(2);
/// Built-in shader, source replaces destination.
pub const OPAQUE_MATERIAL: MaterialId = MaterialId(3);
/// Shader without a fragment entry point; its pipeline never builds.
pub const BROKEN_MATERIAL: MaterialId = MaterialId(4);

const BROKEN_SHADER_WGSL: &str = r#"
@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}
"#;

/// Registers every material the scenes below reference.
pub fn register_materials(registry: &mut MaterialRegistry) {
    registry.insert(Material::standard(SOLID_MATERIAL, MaterialParams::default()));
    registry.insert(Material::standard(
        TINTED_MATERIAL,
        MaterialParams {
            tint: Color::rgb(255, 0, 255),
            ..MaterialParams::default()
        },
    ));
    registry.insert(Material::standard(
        OPAQUE_MATERIAL,
        MaterialParams {
            blend: BlendMode::Opaque,
            ..MaterialParams::default()
        },
    ));
    registry.insert(Material::new(
        BROKEN_MATERIAL,
        ShaderSource::new("broken", BROKEN_SHADER_WGSL),
        MaterialParams::default(),
    ));
}

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (f32, f32) {
    let index = tile_number - 1;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

/// Rectangle inset by `inset` pixels inside tile `n`.
fn tile_rect(tile_number: u32, inset: f32, color: Color) -> Geometry {
    let (x, y) = tile_origin(tile_number);
    let size = TILE_SIZE as f32;
    Geometry::rect((x + inset, y + inset), (x + size - inset, y + size - inset), color)
}

/// Pixel `(dx, dy)` inside tile `n`.
fn tile_pixel(tile_number: u32, dx: u32, dy: u32) -> (u32, u32) {
    let (x, y) = tile_origin(tile_number);
    (x as u32 + dx, y as u32 + dy)
}

struct MainScene {
    background: GroupKey,
    main: GroupKey,
    main_layer: LayerKey,
    overlay: GroupKey,
}

/// Builds the main test scene into `graph` and returns the scene together
/// with the pixel expectations of the composited output.
///
/// The scene has three layers: a white background (z = -1), the tile content
/// (z = 0) and an overlay (z = 1) that is created first so that only its z
/// index puts it on top.
pub fn build_main_scene(graph: &mut SceneGraph) -> (SceneKey, Vec<PixelExpectation>) {
    let scene = graph.create_scene("main", 0);
    let overlay_layer = graph.create_layer(scene, 1).expect("scene exists");
    let main_layer = graph.create_layer(scene, 0).expect("scene exists");
    let background_layer = graph.create_layer(scene, -1).expect("scene exists");

    let layout = MainScene {
        background: graph
            .create_group(background_layer, Transform::identity())
            .expect("layer exists"),
        main: graph
            .create_group(main_layer, Transform::identity())
            .expect("layer exists"),
        main_layer,
        overlay: graph
            .create_group(overlay_layer, Transform::identity())
            .expect("layer exists"),
    };

    graph
        .create_item(
            layout.background,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect(
                    (0.0, 0.0),
                    (CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32),
                    Color::WHITE,
                ),
            ),
        )
        .expect("group exists");

    let mut expectations: Vec<PixelExpectation> = Vec::new();
    expectations.extend(tile_01_path_triangle(graph, &layout));
    expectations.extend(tile_02_group_translation(graph, &layout));
    expectations.extend(tile_03_parent_child(graph, &layout));
    expectations.extend(tile_04_layer_order(graph, &layout));
    expectations.extend(tile_05_material_tint(graph, &layout));
    expectations.extend(tile_06_half_alpha(graph, &layout));
    expectations.extend(tile_07_opaque_blend(graph, &layout));
    expectations.extend(tile_08_item_scale(graph, &layout));
    (scene, expectations)
}

// ── Tile 1: fill-tessellated triangle ────────────────────────────────────────

fn tile_01_path_triangle(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    let (x, y) = tile_origin(1);
    let mut builder = Path::builder();
    builder.begin(point(x + 2.0, y + 2.0));
    builder.line_to(point(x + 14.0, y + 2.0));
    builder.line_to(point(x + 2.0, y + 14.0));
    builder.close();
    let geometry = Geometry::from_path(&builder.build(), Color::rgb(0, 0, 255))
        .expect("triangle tessellates");
    graph
        .create_item(layout.main, ItemDesc::new(SOLID_MATERIAL, geometry))
        .expect("group exists");

    let (inside_x, inside_y) = tile_pixel(1, 4, 4);
    let (outside_x, outside_y) = tile_pixel(1, 12, 12);
    vec![
        PixelExpectation::opaque(inside_x, inside_y, 0, 0, 255, "t01_triangle_inside"),
        PixelExpectation::opaque(outside_x, outside_y, 255, 255, 255, "t01_triangle_outside"),
    ]
}

// ── Tile 2: group transform moves its items ──────────────────────────────────

fn tile_02_group_translation(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    let (x, y) = tile_origin(2);
    let group = graph
        .create_group(layout.main_layer, Transform::from_translation(x, y))
        .expect("layer exists");
    graph
        .create_item(
            group,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect((2.0, 2.0), (14.0, 14.0), Color::rgb(0, 160, 0)),
            ),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(2, 8, 8);
    let (edge_x, edge_y) = tile_pixel(2, 1, 1);
    vec![
        PixelExpectation::opaque(center_x, center_y, 0, 160, 0, "t02_translated_center"),
        PixelExpectation::opaque(edge_x, edge_y, 255, 255, 255, "t02_translated_margin"),
    ]
}

// ── Tile 3: child drawn after its parent, in the parent's space ─────────────

fn tile_03_parent_child(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    let (x, y) = tile_origin(3);
    let parent = graph
        .create_item(
            layout.main,
            ItemDesc::new(SOLID_MATERIAL, tile_rect(3, 0.0, Color::rgb(90, 90, 90))),
        )
        .expect("group exists");
    graph
        .create_child_item(
            parent,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect((x, y), (x + 8.0, y + 8.0), Color::rgb(255, 128, 0)),
            )
            .with_transform(Transform::from_translation(4.0, 4.0)),
        )
        .expect("parent exists");

    let (child_x, child_y) = tile_pixel(3, 8, 8);
    let (parent_x, parent_y) = tile_pixel(3, 2, 2);
    vec![
        PixelExpectation::opaque(child_x, child_y, 255, 128, 0, "t03_child_over_parent"),
        PixelExpectation::opaque(parent_x, parent_y, 90, 90, 90, "t03_parent_visible"),
    ]
}

// ── Tile 4: higher layer wins regardless of creation order ───────────────────

fn tile_04_layer_order(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    graph
        .create_item(
            layout.overlay,
            ItemDesc::new(SOLID_MATERIAL, tile_rect(4, 2.0, Color::rgb(255, 0, 0))),
        )
        .expect("group exists");
    graph
        .create_item(
            layout.main,
            ItemDesc::new(SOLID_MATERIAL, tile_rect(4, 0.0, Color::rgb(255, 255, 0))),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(4, 8, 8);
    let (edge_x, edge_y) = tile_pixel(4, 1, 1);
    vec![
        PixelExpectation::opaque(center_x, center_y, 255, 0, 0, "t04_overlay_on_top"),
        PixelExpectation::opaque(edge_x, edge_y, 255, 255, 0, "t04_main_layer_below"),
    ]
}

// ── Tile 5: material tint multiplies vertex colors ───────────────────────────

fn tile_05_material_tint(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    graph
        .create_item(
            layout.main,
            ItemDesc::new(TINTED_MATERIAL, tile_rect(5, 2.0, Color::WHITE)),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(5, 8, 8);
    vec![PixelExpectation::opaque(
        center_x, center_y, 255, 0, 255, "t05_tinted_white",
    )]
}

// ── Tile 6: straight alpha over the background ───────────────────────────────

fn tile_06_half_alpha(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    graph
        .create_item(
            layout.main,
            ItemDesc::new(SOLID_MATERIAL, tile_rect(6, 2.0, Color::rgba(0, 0, 0, 128))),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(6, 8, 8);
    vec![PixelExpectation::opaque(
        center_x, center_y, 127, 127, 127, "t06_half_black_over_white",
    )]
}

// ── Tile 7: opaque blend replaces the background, alpha included ─────────────

fn tile_07_opaque_blend(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    graph
        .create_item(
            layout.main,
            ItemDesc::new(OPAQUE_MATERIAL, tile_rect(7, 2.0, Color::rgba(0, 0, 255, 128))),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(7, 8, 8);
    vec![PixelExpectation::new(
        center_x,
        center_y,
        Color::rgba(0, 0, 255, 128),
        "t07_replaced_with_translucent_blue",
    )]
}

// ── Tile 8: item scale about its anchor ──────────────────────────────────────

fn tile_08_item_scale(graph: &mut SceneGraph, layout: &MainScene) -> Vec<PixelExpectation> {
    let (x, y) = tile_origin(8);
    graph
        .create_item(
            layout.main,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect((0.0, 0.0), (4.0, 4.0), Color::rgb(0, 255, 255)),
            )
            .with_transform(Transform::from_translation(x + 2.0, y + 2.0).with_scale(3.0, 3.0)),
        )
        .expect("group exists");

    let (center_x, center_y) = tile_pixel(8, 8, 8);
    let (far_x, far_y) = tile_pixel(8, 13, 13);
    let (edge_x, edge_y) = tile_pixel(8, 1, 1);
    vec![
        PixelExpectation::opaque(center_x, center_y, 0, 255, 255, "t08_scaled_center"),
        PixelExpectation::opaque(far_x, far_y, 0, 255, 255, "t08_scaled_far_corner"),
        PixelExpectation::opaque(edge_x, edge_y, 255, 255, 255, "t08_scaled_margin"),
    ]
}

/// Builds a scene whose left half uses [`BROKEN_MATERIAL`] and whose right half
/// uses [`SOLID_MATERIAL`]. Only the right half can ever be drawn.
pub fn build_failure_scene(graph: &mut SceneGraph) -> (SceneKey, Vec<PixelExpectation>) {
    let half = (CANVAS_WIDTH / 2) as f32;
    let height = CANVAS_HEIGHT as f32;

    let scene = graph.create_scene("failure", 0);
    let layer = graph.create_layer(scene, 0).expect("scene exists");
    let group = graph
        .create_group(layer, Transform::identity())
        .expect("layer exists");
    graph
        .create_item(
            group,
            ItemDesc::new(
                BROKEN_MATERIAL,
                Geometry::rect((0.0, 0.0), (half, height), Color::rgb(255, 0, 0)),
            ),
        )
        .expect("group exists");
    graph
        .create_item(
            group,
            ItemDesc::new(
                SOLID_MATERIAL,
                Geometry::rect((half, 0.0), (2.0 * half, height), Color::rgb(0, 200, 0)),
            ),
        )
        .expect("group exists");

    let expectations = vec![
        PixelExpectation::transparent(CANVAS_WIDTH / 4, CANVAS_HEIGHT / 2, "broken_half_empty"),
        PixelExpectation::opaque(
            3 * CANVAS_WIDTH / 4,
            CANVAS_HEIGHT / 2,
            0,
            200,
            0,
            "solid_half_drawn",
        ),
    ];
    (scene, expectations)
}
