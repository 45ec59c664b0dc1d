use super::*;

/// Everything one window needs to render: a pipeline cache, a bucket pool and
/// one [`SceneState`] per attached scene.
pub struct RendererState<B: Backend> {
    pub(crate) pipelines: PipelineCache<B>,
    pub(crate) buckets: BucketAllocator,
    /// World-space vertices of the items drawn last frame.
    pub(crate) processed: ProcessedItems,
    pub(crate) scenes: HashMap<SceneKey, SceneState<B>>,
    pub(crate) viewport: (u32, u32),
    pub(crate) clear_color: Color,
    /// Materials whose pipeline failed to build. They are not retried by the
    /// frame pass until cleared.
    pub(crate) failed_materials: HashSet<MaterialId>,
    pub(crate) composite_queue: Vec<SceneKey>,
    /// Counters of the frame in progress.
    pub(crate) frame: FrameReport,
}

impl<B: Backend> RendererState<B> {
    pub fn new(config: &RendererConfig, viewport: (u32, u32)) -> Self {
        Self {
            pipelines: PipelineCache::new(),
            buckets: BucketAllocator::new(
                config.bucket_chunk_size,
                config.initial_bucket_chunks,
                config.bucket_vertex_capacity,
            ),
            processed: ProcessedItems::new(),
            scenes: HashMap::default(),
            viewport,
            clear_color: config.clear_color,
            failed_materials: HashSet::default(),
            composite_queue: Vec::new(),
            frame: FrameReport::default(),
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Targets are reallocated lazily by the next `setup_framebuffer`.
    pub fn set_viewport(&mut self, viewport: (u32, u32)) {
        self.viewport = viewport;
    }

    /// Registers `scene` for drawing. Returns false if it was already attached.
    pub fn attach_scene(&mut self, scene: SceneKey) -> bool {
        match self.scenes.entry(scene) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(SceneState::default());
                true
            }
        }
    }

    /// Drops the scene and its target. Returns false if it was not attached.
    pub fn detach_scene(&mut self, backend: &mut B, scene: SceneKey) -> bool {
        let Some(mut state) = self.scenes.remove(&scene) else {
            return false;
        };
        state.release_target(backend);
        self.composite_queue.retain(|queued| *queued != scene);
        true
    }

    pub fn is_attached(&self, scene: SceneKey) -> bool {
        self.scenes.contains_key(&scene)
    }

    pub fn scene_state(&self, scene: SceneKey) -> Option<&SceneState<B>> {
        self.scenes.get(&scene)
    }

    /// Attached scenes in composite order.
    pub fn attached_scenes(&self, graph: &SceneGraph) -> Vec<SceneKey> {
        let mut scenes: Vec<(i32, u64, SceneKey)> = self
            .scenes
            .keys()
            .filter_map(|key| {
                graph
                    .scene(*key)
                    .map(|scene| (scene.z_index(), scene.registration(), *key))
            })
            .collect();
        scenes.sort_by_key(|(z_index, registration, _)| (*z_index, *registration));
        scenes.into_iter().map(|(_, _, key)| key).collect()
    }

    /// Detaches scenes destroyed in the graph, releasing their targets.
    pub(crate) fn prune_stale_scenes(&mut self, backend: &mut B, graph: &SceneGraph) -> usize {
        let stale: Vec<SceneKey> = self
            .scenes
            .keys()
            .filter(|key| graph.scene(**key).is_none())
            .copied()
            .collect();
        for key in &stale {
            debug!("detaching destroyed scene {key:?}");
            self.detach_scene(backend, *key);
        }
        stale.len()
    }

    /// Explicit pipeline lookup. Unlike the frame pass this always attempts a
    /// build on a miss, and clears or records the failure mark accordingly.
    pub fn get_or_create_pipeline(
        &mut self,
        backend: &mut B,
        materials: &dyn MaterialSource,
        uid: MaterialId,
    ) -> Result<&PipelineRecord<B>, RenderError> {
        match self.pipelines.get_or_create_pipeline(backend, materials, uid) {
            Ok(record) => {
                self.failed_materials.remove(&uid);
                Ok(record)
            }
            Err(error) => {
                self.failed_materials.insert(uid);
                Err(error)
            }
        }
    }

    /// Evicts and destroys the pipeline of `uid`, forgetting any failure
    /// mark. Returns whether a pipeline existed.
    pub fn destroy_pipeline(&mut self, backend: &mut B, uid: MaterialId) -> bool {
        self.failed_materials.remove(&uid);
        match self.pipelines.evict(uid) {
            Some(record) => {
                PipelineCache::destroy_pipeline(backend, record);
                true
            }
            None => false,
        }
    }

    /// Lets the frame pass try building `uid` again.
    pub fn retry_material(&mut self, uid: MaterialId) -> bool {
        self.failed_materials.remove(&uid)
    }

    pub fn is_material_failed(&self, uid: MaterialId) -> bool {
        self.failed_materials.contains(&uid)
    }

    pub fn pipelines(&self) -> &PipelineCache<B> {
        &self.pipelines
    }

    pub fn buckets(&self) -> &BucketAllocator {
        &self.buckets
    }

    pub fn processed_items(&self) -> &ProcessedItems {
        &self.processed
    }

    /// Releases every target and pipeline owned by this state.
    pub fn teardown(&mut self, backend: &mut B) {
        for (_, mut state) in self.scenes.drain() {
            state.release_target(backend);
        }
        self.composite_queue.clear();
        self.pipelines.clear(backend);
        self.processed.clear();
        self.failed_materials.clear();
    }

    pub(crate) fn take_frame_report(&mut self) -> FrameReport {
        std::mem::take(&mut self.frame)
    }
}
