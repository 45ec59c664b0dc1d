//! Render batching and pipeline lifecycle for layered 2D scenes.
//!
//! A [`SceneGraph`] describes scenes as layers of groups of drawable items.
//! Every frame, each window's [`Renderer`] walks its attached scenes, batches
//! the items into one [`RenderBucket`] per material, draws the buckets with
//! cached pipelines into a per-scene target and composites the targets onto
//! the window in z-order. [`RenderContext`] ties the pieces together and
//! drives one frame per [`tick`](RenderContext::tick).

pub use lyon;
pub use wgpu;

mod backend;
mod bucket;
mod color;
mod compositor;
mod config;
mod error;
mod geometry;
mod id;
mod material;
mod pipeline_cache;
mod renderer;
mod scene;
mod transform;

pub use backend::{
    Backend, Canvas, GpuBackend, GpuBackendOptions, GpuPipeline, GpuPipelineLayout, GpuTarget,
    SoftwareBackend, SoftwarePipeline, SoftwarePipelineLayout, WgpuScreen,
};
pub use bucket::{
    BucketAllocator, BucketHandle, ProcessedItems, Recycle, RenderBucket, SlabHandle, SlabPool,
};
pub use color::Color;
pub use compositor::{ScenePhase, SceneState};
pub use config::RendererConfig;
pub use error::{RenderError, SceneError};
pub use geometry::{Geometry, GeometryCache, Vertex};
pub use id::{MaterialId, PipelineId, WindowId};
pub use material::{
    BlendMode, Material, MaterialParams, MaterialRegistry, MaterialSource, ShaderSource,
    FRAGMENT_ENTRY_POINT, STANDARD_SHADER_WGSL, VERTEX_ENTRY_POINT,
};
pub use pipeline_cache::{PipelineCache, PipelineCacheStats, PipelineRecord};
#[cfg(feature = "render_metrics")]
pub use renderer::FrameTimeTracker;
pub use renderer::{FrameReport, RenderContext, Renderer, RendererState};
pub use scene::{
    Drawable, DrawableItem, FlushReport, Group, GroupKey, ItemDesc, ItemKey, Layer, LayerKey,
    NodeRef, ResolvedKey, Scene, SceneCommand, SceneCommandQueue, SceneGraph, SceneKey, Ticket,
    Traversal,
};
pub use transform::{Matrix, Transform};
