//! Seam between the frame pass and a concrete graphics API.
//!
//! The frame pass only ever sees the associated handle types; it never
//! inspects them. Two implementations ship with the crate: [`GpuBackend`]
//! on wgpu and [`SoftwareBackend`], a CPU rasterizer for headless use.

use crate::bucket::RenderBucket;
use crate::material::Material;
use crate::Color;

mod gpu;
mod software;

pub use gpu::{GpuBackend, GpuBackendOptions, GpuPipeline, GpuPipelineLayout, GpuTarget, WgpuScreen};
pub use software::{Canvas, SoftwareBackend, SoftwarePipeline, SoftwarePipelineLayout};

/// Graphics API used by a [`Renderer`](crate::Renderer).
///
/// Construction failures are reported as a plain reason string; callers wrap
/// them into [`RenderError`](crate::RenderError) with the material or scene
/// they concern.
pub trait Backend {
    type Pipeline;
    type PipelineLayout;
    /// Offscreen color target a scene is drawn into.
    type Target;
    /// Window-facing target that scene targets are composited onto.
    type Screen;

    /// Builds the pipeline and its layout for `material`.
    fn create_pipeline(
        &mut self,
        material: &Material,
    ) -> Result<(Self::Pipeline, Self::PipelineLayout), String>;

    fn destroy_pipeline(&mut self, pipeline: Self::Pipeline, layout: Self::PipelineLayout);

    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target, String>;

    fn destroy_target(&mut self, target: Self::Target);

    fn clear_target(&mut self, target: &mut Self::Target, color: Color);

    /// Draws every triangle of `bucket` into `target` with `pipeline`.
    fn submit_bucket(
        &mut self,
        target: &mut Self::Target,
        pipeline: &Self::Pipeline,
        bucket: &RenderBucket,
    );

    /// Clears `screen` to `clear` and composites `targets` over it, first to
    /// last.
    fn present(
        &mut self,
        screen: &mut Self::Screen,
        clear: Color,
        targets: &[&Self::Target],
    ) -> Result<(), String>;

    /// Follows a window resize. Screen contents are undefined afterwards.
    fn resize_screen(&mut self, screen: &mut Self::Screen, width: u32, height: u32);
}
