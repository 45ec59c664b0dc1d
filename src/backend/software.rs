use tracing::trace;

use super::Backend;
use crate::bucket::RenderBucket;
use crate::color::{blend_over, modulate};
use crate::geometry::Vertex;
use crate::material::{BlendMode, Material};
use crate::Color;

/// Largest target edge the software backend accepts.
pub const DEFAULT_MAX_TARGET_DIMENSION: u32 = 8192;

/// RGBA8 pixel grid, row-major from the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Resizes in place, discarding the contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize, Color::TRANSPARENT);
    }

    /// Tightly packed RGBA bytes.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|pixel| pixel.to_array()).collect()
    }

    fn write(&mut self, x: u32, y: u32, src: [f32; 4], blend: BlendMode) {
        let index = y as usize * self.width as usize + x as usize;
        let Some(dst) = self.pixels.get_mut(index) else {
            return;
        };
        *dst = match blend {
            BlendMode::Opaque => Color::from_normalized(src),
            BlendMode::Alpha => Color::from_normalized(blend_over(src, dst.normalize())),
        };
    }
}

/// Rasterization state built from a material.
#[derive(Debug, Clone)]
pub struct SoftwarePipeline {
    label: String,
    tint: Option<[f32; 4]>,
    blend: BlendMode,
}

impl SoftwarePipeline {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }
}

/// The software backend has no binding model; the layout only records which
/// uniforms the shader declared.
#[derive(Debug, Clone)]
pub struct SoftwarePipelineLayout {
    pub binds_material_params: bool,
}

/// CPU rasterizer emulating the built-in material shader.
///
/// Vertex colors are interpolated across each triangle and, when the shader
/// binds material params, multiplied by the material tint.
#[derive(Debug)]
pub struct SoftwareBackend {
    max_target_dimension: u32,
    pipelines_created: usize,
    pipelines_destroyed: usize,
    live_targets: usize,
    submissions: usize,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            max_target_dimension: DEFAULT_MAX_TARGET_DIMENSION,
            pipelines_created: 0,
            pipelines_destroyed: 0,
            live_targets: 0,
            submissions: 0,
        }
    }

    pub fn with_max_target_dimension(mut self, dimension: u32) -> Self {
        self.max_target_dimension = dimension;
        self
    }

    pub fn pipelines_created(&self) -> usize {
        self.pipelines_created
    }

    pub fn pipelines_destroyed(&self) -> usize {
        self.pipelines_destroyed
    }

    pub fn live_targets(&self) -> usize {
        self.live_targets
    }

    /// Bucket submissions since construction.
    pub fn submissions(&self) -> usize {
        self.submissions
    }
}

impl Backend for SoftwareBackend {
    type Pipeline = SoftwarePipeline;
    type PipelineLayout = SoftwarePipelineLayout;
    type Target = Canvas;
    type Screen = Canvas;

    fn create_pipeline(
        &mut self,
        material: &Material,
    ) -> Result<(SoftwarePipeline, SoftwarePipelineLayout), String> {
        let shader = material.shader();
        shader.validate()?;

        let binds_material_params = shader.binds_material_params();
        let params = material.params();
        self.pipelines_created += 1;
        trace!("software pipeline for {} built", material.uid());
        Ok((
            SoftwarePipeline {
                label: shader.label.clone(),
                tint: binds_material_params.then(|| params.tint.normalize()),
                blend: params.blend,
            },
            SoftwarePipelineLayout {
                binds_material_params,
            },
        ))
    }

    fn destroy_pipeline(&mut self, _pipeline: SoftwarePipeline, _layout: SoftwarePipelineLayout) {
        self.pipelines_destroyed += 1;
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<Canvas, String> {
        if width == 0 || height == 0 {
            return Err("target has a zero dimension".to_string());
        }
        if width > self.max_target_dimension || height > self.max_target_dimension {
            return Err(format!(
                "target exceeds the maximum dimension of {}",
                self.max_target_dimension
            ));
        }
        self.live_targets += 1;
        Ok(Canvas::new(width, height))
    }

    fn destroy_target(&mut self, _target: Canvas) {
        self.live_targets = self.live_targets.saturating_sub(1);
    }

    fn clear_target(&mut self, target: &mut Canvas, color: Color) {
        target.fill(color);
    }

    fn submit_bucket(
        &mut self,
        target: &mut Canvas,
        pipeline: &SoftwarePipeline,
        bucket: &RenderBucket,
    ) {
        self.submissions += 1;
        for triangle in bucket.indices.chunks_exact(3) {
            let corners = (
                bucket.vertices.get(triangle[0] as usize),
                bucket.vertices.get(triangle[1] as usize),
                bucket.vertices.get(triangle[2] as usize),
            );
            if let (Some(a), Some(b), Some(c)) = corners {
                rasterize_triangle(target, pipeline, [a, b, c]);
            }
        }
    }

    fn present(
        &mut self,
        screen: &mut Canvas,
        clear: Color,
        targets: &[&Canvas],
    ) -> Result<(), String> {
        screen.fill(clear);
        for target in targets {
            let width = target.width.min(screen.width);
            let height = target.height.min(screen.height);
            for y in 0..height {
                for x in 0..width {
                    if let Some(src) = target.pixel(x, y) {
                        if src.alpha() > 0 {
                            screen.write(x, y, src.normalize(), BlendMode::Alpha);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn resize_screen(&mut self, screen: &mut Canvas, width: u32, height: u32) {
        screen.resize(width, height);
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Tie-break for pixel centers exactly on an edge. For any edge shared by two
/// triangles of the same orientation exactly one of them owns it.
fn owns_edge(a: [f32; 2], b: [f32; 2]) -> bool {
    let dy = b[1] - a[1];
    dy < 0.0 || (dy == 0.0 && b[0] - a[0] > 0.0)
}

fn covers(weight: f32, a: [f32; 2], b: [f32; 2]) -> bool {
    weight > 0.0 || (weight == 0.0 && owns_edge(a, b))
}

fn rasterize_triangle(target: &mut Canvas, pipeline: &SoftwarePipeline, corners: [&Vertex; 3]) {
    let [v0, mut v1, mut v2] = corners;
    let mut area = edge(v0.position, v1.position, v2.position);
    if area == 0.0 {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut v1, &mut v2);
        area = -area;
    }
    let (p0, p1, p2) = (v0.position, v1.position, v2.position);

    let min_x = p0[0].min(p1[0]).min(p2[0]).floor().max(0.0) as u32;
    let min_y = p0[1].min(p1[1]).min(p2[1]).floor().max(0.0) as u32;
    let max_x = (p0[0].max(p1[0]).max(p2[0]).ceil().max(0.0) as u32).min(target.width);
    let max_y = (p0[1].max(p1[1]).max(p2[1]).ceil().max(0.0) as u32).min(target.height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let center = [x as f32 + 0.5, y as f32 + 0.5];
            let w0 = edge(p1, p2, center);
            let w1 = edge(p2, p0, center);
            let w2 = edge(p0, p1, center);
            if !(covers(w0, p1, p2) && covers(w1, p2, p0) && covers(w2, p0, p1)) {
                continue;
            }

            let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
            let mut color = [0.0; 4];
            for (channel, value) in color.iter_mut().enumerate() {
                *value = v0.color[channel] * l0 + v1.color[channel] * l1 + v2.color[channel] * l2;
            }
            if let Some(tint) = pipeline.tint {
                color = modulate(color, tint);
            }
            target.write(x, y, color, pipeline.blend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketAllocator;
    use crate::id::MaterialId;
    use crate::material::{MaterialParams, ShaderSource};
    use crate::geometry::Geometry;
    use crate::scene::{ItemDesc, SceneGraph};
    use crate::transform::Transform;

    fn bucket_with(geometry: Geometry) -> (BucketAllocator, crate::bucket::BucketHandle) {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("test", 0);
        let layer = graph.create_layer(scene, 0).unwrap();
        let group = graph.create_group(layer, Transform::identity()).unwrap();
        graph
            .create_item(group, ItemDesc::new(MaterialId(1), geometry))
            .unwrap();

        let mut allocator = BucketAllocator::new(1, 1, 0);
        for drawable in graph.traverse_scene(scene) {
            allocator.batch(&drawable);
        }
        let handle = allocator.finish_pass()[0];
        (allocator, handle)
    }

    #[test]
    fn rect_covers_exactly_its_pixels() {
        let mut backend = SoftwareBackend::new();
        let material = Material::standard(MaterialId(1), MaterialParams::default());
        let (pipeline, _layout) = backend.create_pipeline(&material).unwrap();
        let mut target = backend.create_target(8, 8).unwrap();

        let (allocator, handle) =
            bucket_with(Geometry::rect((2.0, 2.0), (6.0, 6.0), Color::rgb(255, 0, 0)));
        backend.submit_bucket(&mut target, &pipeline, allocator.bucket(handle));

        let covered = target
            .pixels()
            .iter()
            .filter(|pixel| **pixel == Color::rgb(255, 0, 0))
            .count();
        assert_eq!(covered, 16);
        assert_eq!(target.pixel(1, 1), Some(Color::TRANSPARENT));
        assert_eq!(target.pixel(2, 2), Some(Color::rgb(255, 0, 0)));
        assert_eq!(target.pixel(6, 6), Some(Color::TRANSPARENT));
    }

    #[test]
    fn shared_diagonal_is_blended_once() {
        let mut backend = SoftwareBackend::new();
        let material = Material::standard(MaterialId(1), MaterialParams::default());
        let (pipeline, _layout) = backend.create_pipeline(&material).unwrap();
        let mut target = backend.create_target(4, 4).unwrap();
        target.fill(Color::BLACK);

        let (allocator, handle) = bucket_with(Geometry::rect(
            (0.0, 0.0),
            (4.0, 4.0),
            Color::rgba(255, 255, 255, 128),
        ));
        backend.submit_bucket(&mut target, &pipeline, allocator.bucket(handle));

        let first = target.pixel(0, 0).unwrap();
        assert!(target.pixels().iter().all(|pixel| *pixel == first));
    }

    #[test]
    fn tint_applies_only_when_params_are_bound() {
        let mut backend = SoftwareBackend::new();
        let tinted = Material::standard(
            MaterialId(1),
            MaterialParams {
                tint: Color::rgb(0, 255, 0),
                ..Default::default()
            },
        );
        let (pipeline, layout) = backend.create_pipeline(&tinted).unwrap();
        assert!(layout.binds_material_params);
        assert_eq!(pipeline.tint, Some([0.0, 1.0, 0.0, 1.0]));

        let plain = Material::new(
            MaterialId(2),
            ShaderSource::new(
                "plain",
                "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(); }\n\
                 @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
            ),
            MaterialParams {
                tint: Color::rgb(0, 255, 0),
                ..Default::default()
            },
        );
        let (pipeline, _) = backend.create_pipeline(&plain).unwrap();
        assert_eq!(pipeline.tint, None);
        assert_eq!(backend.pipelines_created(), 2);
    }

    #[test]
    fn invalid_shader_fails_pipeline_creation() {
        let mut backend = SoftwareBackend::new();
        let broken = Material::new(
            MaterialId(3),
            ShaderSource::new("broken", "@vertex fn vs_main() {}"),
            MaterialParams::default(),
        );
        let error = backend.create_pipeline(&broken).unwrap_err();
        assert!(error.contains("fs_main"));
        assert_eq!(backend.pipelines_created(), 0);
    }

    #[test]
    fn oversized_target_is_rejected() {
        let mut backend = SoftwareBackend::new().with_max_target_dimension(64);
        assert!(backend.create_target(65, 10).is_err());
        assert!(backend.create_target(0, 10).is_err());
        assert!(backend.create_target(64, 64).is_ok());
        assert_eq!(backend.live_targets(), 1);
    }

    #[test]
    fn present_composites_in_given_order() {
        let mut backend = SoftwareBackend::new();
        let mut below = backend.create_target(2, 1).unwrap();
        let mut above = backend.create_target(2, 1).unwrap();
        below.fill(Color::rgb(255, 0, 0));
        above.write(1, 0, [0.0, 0.0, 1.0, 1.0], BlendMode::Opaque);

        let mut screen = Canvas::new(2, 1);
        backend
            .present(&mut screen, Color::BLACK, &[&below, &above])
            .unwrap();

        assert_eq!(screen.pixel(0, 0), Some(Color::rgb(255, 0, 0)));
        assert_eq!(screen.pixel(1, 0), Some(Color::rgb(0, 0, 255)));
    }
}
