pub mod expectations;
pub mod scene;

pub use expectations::{check_pixels, PixelExpectation, PixelSource, RgbaPixels};
pub use scene::{
    build_failure_scene, build_main_scene, register_materials, BROKEN_MATERIAL, CANVAS_HEIGHT,
    CANVAS_WIDTH, OPAQUE_MATERIAL, SOLID_MATERIAL, TINTED_MATERIAL,
};
