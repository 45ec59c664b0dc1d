//! Per-scene offscreen rendering and ordered compositing.
//!
//! Every attached scene owns a target in its window's [`RendererState`]. A
//! frame walks each scene through a fixed cycle of [`ScenePhase`]s; the
//! transitions are checked and an out-of-order call panics.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::backend::Backend;
use crate::bucket::BucketHandle;
use crate::error::RenderError;
use crate::material::MaterialSource;
use crate::renderer::RendererState;
use crate::scene::{Drawable, SceneGraph, SceneKey};

/// Where a scene is in the per-frame cycle
/// `Idle → Traversing → Batching → Drawing → Composited → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePhase {
    Idle,
    Traversing,
    Batching,
    Drawing,
    Composited,
}

impl ScenePhase {
    pub fn next(self) -> ScenePhase {
        match self {
            ScenePhase::Idle => ScenePhase::Traversing,
            ScenePhase::Traversing => ScenePhase::Batching,
            ScenePhase::Batching => ScenePhase::Drawing,
            ScenePhase::Drawing => ScenePhase::Composited,
            ScenePhase::Composited => ScenePhase::Idle,
        }
    }
}

/// Window-side state of one attached scene.
pub struct SceneState<B: Backend> {
    target: Option<B::Target>,
    target_size: (u32, u32),
    phase: ScenePhase,
    /// `(z_index, registration)` captured when the target was queued.
    composite_order: (i32, u64),
}

impl<B: Backend> Default for SceneState<B> {
    fn default() -> Self {
        Self {
            target: None,
            target_size: (0, 0),
            phase: ScenePhase::Idle,
            composite_order: (0, 0),
        }
    }
}

impl<B: Backend> SceneState<B> {
    pub fn phase(&self) -> ScenePhase {
        self.phase
    }

    pub fn target(&self) -> Option<&B::Target> {
        self.target.as_ref()
    }

    /// Size of the allocated target, `(0, 0)` when none is allocated.
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    fn transition(&mut self, to: ScenePhase) {
        advance(&mut self.phase, to);
    }

    pub(crate) fn release_target(&mut self, backend: &mut B) {
        if let Some(target) = self.target.take() {
            backend.destroy_target(target);
        }
        self.target_size = (0, 0);
    }
}

fn advance(phase: &mut ScenePhase, to: ScenePhase) {
    assert!(
        phase.next() == to,
        "illegal scene phase transition from {:?} to {:?}",
        phase,
        to
    );
    *phase = to;
}

impl<B: Backend> RendererState<B> {
    /// Makes sure `scene` has a target at the current viewport size.
    ///
    /// The scene is attached on first use. A viewport change drops the old
    /// target and allocates a new one; on failure the scene is left without a
    /// target and is skipped for the frame.
    pub fn setup_framebuffer(
        &mut self,
        backend: &mut B,
        graph: &SceneGraph,
        scene: SceneKey,
    ) -> Result<(), RenderError> {
        let node = graph.scene(scene).ok_or(RenderError::UnknownScene(scene))?;
        let (width, height) = self.viewport;
        let state = self.scenes.entry(scene).or_default();
        assert!(
            state.phase == ScenePhase::Idle,
            "framebuffer of scene '{}' set up while {:?}",
            node.name(),
            state.phase
        );

        if state.target.is_some() && state.target_size == (width, height) {
            return Ok(());
        }

        state.release_target(backend);
        match backend.create_target(width, height) {
            Ok(target) => {
                debug!("allocated {width}x{height} target for scene '{}'", node.name());
                state.target = Some(target);
                state.target_size = (width, height);
                Ok(())
            }
            Err(reason) => Err(RenderError::TargetAllocation {
                scene: node.name().to_string(),
                width,
                height,
                reason,
            }),
        }
    }

    /// Clears the scene target, then traverses, batches and draws the scene
    /// layer by layer.
    ///
    /// A bucket whose pipeline cannot be built is skipped and its material is
    /// remembered as failed; other buckets still draw.
    pub fn draw_scene_to_framebuffer(
        &mut self,
        backend: &mut B,
        graph: &SceneGraph,
        materials: &dyn MaterialSource,
        scene: SceneKey,
    ) -> Result<(), RenderError> {
        let node = graph.scene(scene).ok_or(RenderError::UnknownScene(scene))?;
        let clear_color = self.clear_color;
        let Self {
            pipelines,
            buckets,
            processed,
            scenes,
            failed_materials,
            frame,
            ..
        } = self;
        let state = scenes
            .get_mut(&scene)
            .ok_or(RenderError::UnknownScene(scene))?;
        let SceneState {
            target,
            target_size,
            phase,
            ..
        } = state;
        let Some(target) = target.as_mut() else {
            return Err(RenderError::TargetAllocation {
                scene: node.name().to_string(),
                width: target_size.0,
                height: target_size.1,
                reason: "framebuffer was not set up".to_string(),
            });
        };
        backend.clear_target(target, clear_color);

        advance(phase, ScenePhase::Traversing);
        let drawables: Vec<Drawable<'_>> = graph.traverse_scene(scene).collect();
        frame.traversed_items += drawables.len();

        advance(phase, ScenePhase::Batching);
        let mut passes: SmallVec<[Vec<BucketHandle>; 4]> = SmallVec::new();
        let mut current_layer = None;
        for drawable in &drawables {
            if current_layer.is_some() && current_layer != Some(drawable.layer) {
                passes.push(buckets.finish_pass());
            }
            current_layer = Some(drawable.layer);
            buckets.batch_processed(drawable, processed);
        }
        if current_layer.is_some() {
            passes.push(buckets.finish_pass());
        }

        advance(phase, ScenePhase::Drawing);
        for pass in passes {
            for handle in pass {
                frame.buckets += 1;
                let material = buckets.bucket(handle).material();
                if failed_materials.contains(&material) {
                    frame.skipped_buckets += 1;
                } else {
                    match pipelines.get_or_create_pipeline(backend, materials, material) {
                        Ok(record) => {
                            backend.submit_bucket(target, record.pipeline(), buckets.bucket(handle));
                            frame.draw_submissions += 1;
                        }
                        Err(error) => {
                            warn!("skipping {material} in scene '{}': {error}", node.name());
                            failed_materials.insert(material);
                            frame.skipped_buckets += 1;
                            frame.errors.push(error);
                        }
                    }
                }
                buckets.release(handle);
            }
        }
        trace!(
            "scene '{}' drew {} items",
            node.name(),
            drawables.len()
        );
        Ok(())
    }

    /// Queues the finished scene target for [`RendererState::present`].
    pub fn draw_framebuffer_to_screen(
        &mut self,
        graph: &SceneGraph,
        scene: SceneKey,
    ) -> Result<(), RenderError> {
        let node = graph.scene(scene).ok_or(RenderError::UnknownScene(scene))?;
        let state = self
            .scenes
            .get_mut(&scene)
            .ok_or(RenderError::UnknownScene(scene))?;
        state.transition(ScenePhase::Composited);
        state.composite_order = (node.z_index(), node.registration());
        self.composite_queue.push(scene);
        Ok(())
    }

    /// Composites every queued target onto `screen` in ascending
    /// `(z_index, registration)` order and returns the scenes to `Idle`.
    /// The result does not depend on the order the targets were queued in.
    pub fn present(&mut self, backend: &mut B, screen: &mut B::Screen) -> Result<usize, RenderError> {
        let scenes = &mut self.scenes;
        self.composite_queue
            .sort_by_key(|key| scenes.get(key).map(|state| state.composite_order));

        let (composited, result) = {
            let targets: SmallVec<[&B::Target; 8]> = self
                .composite_queue
                .iter()
                .filter_map(|key| scenes.get(key)?.target.as_ref())
                .collect();
            (targets.len(), backend.present(screen, self.clear_color, &targets))
        };

        for key in self.composite_queue.drain(..) {
            if let Some(state) = scenes.get_mut(&key) {
                state.transition(ScenePhase::Idle);
            }
        }
        result.map_err(RenderError::Surface)?;
        self.frame.composited_scenes += composited;
        Ok(composited)
    }
}
