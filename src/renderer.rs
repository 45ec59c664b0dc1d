//! Per-window renderers and the context that drives them.

use std::collections::hash_map::Entry;

use ahash::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::backend::Backend;
use crate::bucket::{BucketAllocator, ProcessedItems};
use crate::compositor::SceneState;
use crate::config::RendererConfig;
use crate::id::{MaterialId, WindowId};
use crate::material::MaterialSource;
use crate::pipeline_cache::{PipelineCache, PipelineRecord};
use crate::scene::{SceneGraph, SceneKey};
use crate::Color;
use crate::RenderError;

mod frame;
mod metrics;
mod state;

pub use frame::RenderContext;
#[cfg(feature = "render_metrics")]
pub use metrics::FrameTimeTracker;
pub use metrics::FrameReport;
pub use state::RendererState;

/// Renders the attached scenes of one window onto its screen.
pub struct Renderer<B: Backend> {
    window: WindowId,
    state: RendererState<B>,
    screen: B::Screen,
}

impl<B: Backend> Renderer<B> {
    pub fn new(window: WindowId, screen: B::Screen, size: (u32, u32), config: &RendererConfig) -> Self {
        Self {
            window,
            state: RendererState::new(config, size),
            screen,
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn state(&self) -> &RendererState<B> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RendererState<B> {
        &mut self.state
    }

    pub fn screen(&self) -> &B::Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut B::Screen {
        &mut self.screen
    }

    pub fn attach_scene(&mut self, scene: SceneKey) -> bool {
        self.state.attach_scene(scene)
    }

    pub fn detach_scene(&mut self, backend: &mut B, scene: SceneKey) -> bool {
        self.state.detach_scene(backend, scene)
    }

    /// Clears the failure mark of `uid` so the next frame tries to build its
    /// pipeline again.
    pub fn retry_material(&mut self, uid: MaterialId) -> bool {
        self.state.retry_material(uid)
    }

    /// Draws every attached scene into its target and composites the targets
    /// onto the screen in `(z_index, registration)` order.
    ///
    /// A scene whose target cannot be set up is skipped; the error is reported
    /// in the returned [`FrameReport`] and the other scenes still render.
    pub fn render_frame(
        &mut self,
        backend: &mut B,
        graph: &SceneGraph,
        materials: &dyn MaterialSource,
    ) -> FrameReport {
        let stats_before = self.state.pipelines.stats();
        let pruned = self.state.prune_stale_scenes(backend, graph);
        if pruned > 0 {
            debug!("{} dropped {pruned} destroyed scenes", self.window);
        }

        for scene in self.state.attached_scenes(graph) {
            let drawn = self
                .state
                .setup_framebuffer(backend, graph, scene)
                .and_then(|()| {
                    self.state
                        .draw_scene_to_framebuffer(backend, graph, materials, scene)
                })
                .and_then(|()| self.state.draw_framebuffer_to_screen(graph, scene));
            if let Err(error) = drawn {
                warn!("{} skipped a scene: {error}", self.window);
                self.state.frame.skipped_scenes += 1;
                self.state.frame.errors.push(error);
            }
        }

        if let Err(error) = self.state.present(backend, &mut self.screen) {
            warn!("{} failed to present: {error}", self.window);
            self.state.frame.errors.push(error);
        }

        let (processed, reused) = self.state.processed.finish_frame();
        let stats = self.state.pipelines.stats();
        let mut report = self.state.take_frame_report();
        report.processed_items = processed;
        report.reused_items = reused;
        report.windows = 1;
        report.pipeline_hits = stats.hits - stats_before.hits;
        report.pipeline_misses = stats.misses - stats_before.misses;
        report.pipeline_failures = stats.failures - stats_before.failures;
        report.pool_capacity = self.state.buckets.capacity();
        trace!("{} frame: {report:?}", self.window);
        report
    }

    /// Releases every target and pipeline and hands back the screen.
    pub fn teardown(mut self, backend: &mut B) -> B::Screen {
        self.state.teardown(backend);
        self.screen
    }
}
