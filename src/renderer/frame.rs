use super::*;

#[cfg(feature = "render_metrics")]
use std::time::{Duration, Instant};

use crate::material::MaterialRegistry;
use crate::scene::SceneCommandQueue;

/// Owns the scene graph, the material source and one [`Renderer`] per window,
/// and renders every window once per [`tick`](RenderContext::tick).
pub struct RenderContext<B: Backend, M: MaterialSource = MaterialRegistry> {
    backend: B,
    graph: SceneGraph,
    commands: SceneCommandQueue,
    materials: M,
    config: RendererConfig,
    windows: HashMap<WindowId, Renderer<B>>,
    #[cfg(feature = "render_metrics")]
    frame_times: FrameTimeTracker,
}

impl<B: Backend, M: MaterialSource> RenderContext<B, M> {
    pub fn new(backend: B, materials: M, config: RendererConfig) -> Self {
        Self {
            backend,
            graph: SceneGraph::new(),
            commands: SceneCommandQueue::new(),
            materials,
            config,
            windows: HashMap::default(),
            #[cfg(feature = "render_metrics")]
            frame_times: FrameTimeTracker::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Direct access for mutations made between frames on the render thread.
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// A handle to the command queue that can be sent to other threads.
    pub fn commands(&self) -> SceneCommandQueue {
        self.commands.clone()
    }

    pub fn materials(&self) -> &M {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut M {
        &mut self.materials
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Creates the renderer of `window`. An existing renderer for the same
    /// window is torn down first and its screen is returned.
    pub fn attach_window(
        &mut self,
        window: WindowId,
        screen: B::Screen,
        size: (u32, u32),
    ) -> Option<B::Screen> {
        let replaced = self.detach_window(window);
        debug!("attaching {window} at {}x{}", size.0, size.1);
        self.windows
            .insert(window, Renderer::new(window, screen, size, &self.config));
        replaced
    }

    /// Resizes the window's screen. Scene targets follow on the next frame.
    pub fn resize_window(&mut self, window: WindowId, size: (u32, u32)) -> Result<(), RenderError> {
        let renderer = self
            .windows
            .get_mut(&window)
            .ok_or(RenderError::UnknownWindow(window))?;
        self.backend
            .resize_screen(renderer.screen_mut(), size.0, size.1);
        renderer.state_mut().set_viewport(size);
        debug!("resized {window} to {}x{}", size.0, size.1);
        Ok(())
    }

    /// Tears down the renderer of `window` and returns its screen.
    pub fn detach_window(&mut self, window: WindowId) -> Option<B::Screen> {
        let renderer = self.windows.remove(&window)?;
        debug!("detaching {window}");
        Some(renderer.teardown(&mut self.backend))
    }

    pub fn window(&self, window: WindowId) -> Option<&Renderer<B>> {
        self.windows.get(&window)
    }

    pub fn window_mut(&mut self, window: WindowId) -> Option<&mut Renderer<B>> {
        self.windows.get_mut(&window)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn attach_scene(&mut self, window: WindowId, scene: SceneKey) -> Result<bool, RenderError> {
        self.graph
            .scene(scene)
            .ok_or(RenderError::UnknownScene(scene))?;
        let renderer = self
            .windows
            .get_mut(&window)
            .ok_or(RenderError::UnknownWindow(window))?;
        Ok(renderer.attach_scene(scene))
    }

    pub fn detach_scene(&mut self, window: WindowId, scene: SceneKey) -> Result<bool, RenderError> {
        let renderer = self
            .windows
            .get_mut(&window)
            .ok_or(RenderError::UnknownWindow(window))?;
        Ok(renderer.detach_scene(&mut self.backend, scene))
    }

    /// Evicts and destroys the pipeline of `uid` in every window. Returns the
    /// number of pipelines destroyed.
    pub fn retire_material(&mut self, uid: MaterialId) -> usize {
        let mut destroyed = 0;
        for renderer in self.windows.values_mut() {
            if renderer.state_mut().destroy_pipeline(&mut self.backend, uid) {
                destroyed += 1;
            }
        }
        debug!("retired {uid} from {destroyed} windows");
        destroyed
    }

    /// Runs one frame: applies every queued scene command, then renders each
    /// window in ascending window id order.
    ///
    /// `elapsed_us` is the time since the previous tick.
    pub fn tick(&mut self, elapsed_us: u64) -> FrameReport {
        let flushed = self.commands.flush_into(&mut self.graph);
        let mut report = FrameReport {
            commands_applied: flushed.applied,
            command_errors: flushed.errors,
            ..FrameReport::default()
        };

        let mut windows: Vec<WindowId> = self.windows.keys().copied().collect();
        windows.sort();
        for window in windows {
            if let Some(renderer) = self.windows.get_mut(&window) {
                report.merge(renderer.render_frame(&mut self.backend, &self.graph, &self.materials));
            }
        }

        #[cfg(feature = "render_metrics")]
        self.frame_times
            .record_frame(Instant::now(), Duration::from_micros(elapsed_us));

        trace!(
            "tick after {elapsed_us}us: {} windows, {} submissions",
            report.windows,
            report.draw_submissions
        );
        report
    }

    #[cfg(feature = "render_metrics")]
    pub fn frame_times(&self) -> &FrameTimeTracker {
        &self.frame_times
    }

    #[cfg(feature = "render_metrics")]
    pub fn reset_frame_times(&mut self) {
        self.frame_times.reset();
    }

    /// Detaches every window, releasing all backend resources.
    pub fn shutdown(&mut self) -> Vec<(WindowId, B::Screen)> {
        let mut windows: Vec<WindowId> = self.windows.keys().copied().collect();
        windows.sort();
        windows
            .into_iter()
            .filter_map(|window| Some((window, self.detach_window(window)?)))
            .collect()
    }
}
