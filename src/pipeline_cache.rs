//! Material → pipeline cache with create-on-miss semantics.

use std::collections::hash_map::Entry;

use ahash::HashMap;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::RenderError;
use crate::id::{MaterialId, PipelineId};
use crate::material::MaterialSource;

/// Backend pipeline built for one material.
pub struct PipelineRecord<B: Backend> {
    pipeline: B::Pipeline,
    layout: B::PipelineLayout,
    material: MaterialId,
    id: PipelineId,
}

impl<B: Backend> PipelineRecord<B> {
    pub fn pipeline(&self) -> &B::Pipeline {
        &self.pipeline
    }

    pub fn layout(&self) -> &B::PipelineLayout {
        &self.layout
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Identity of the record within its cache; stable across cache hits.
    pub fn id(&self) -> PipelineId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Successful pipeline builds.
    pub constructions: u64,
    pub failures: u64,
    pub evictions: u64,
}

/// At most one live record per material.
pub struct PipelineCache<B: Backend> {
    records: HashMap<MaterialId, PipelineRecord<B>>,
    next_id: u64,
    stats: PipelineCacheStats,
}

impl<B: Backend> Default for PipelineCache<B> {
    fn default() -> Self {
        Self {
            records: HashMap::default(),
            next_id: 0,
            stats: PipelineCacheStats::default(),
        }
    }
}

impl<B: Backend> PipelineCache<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached record for `uid`, building it on a miss.
    ///
    /// On failure nothing is cached, so the next call retries the build.
    pub fn get_or_create_pipeline(
        &mut self,
        backend: &mut B,
        materials: &dyn MaterialSource,
        uid: MaterialId,
    ) -> Result<&PipelineRecord<B>, RenderError> {
        match self.records.entry(uid) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                let Some(material) = materials.material(uid) else {
                    self.stats.failures += 1;
                    warn!("{uid} requested for drawing but is not registered");
                    return Err(RenderError::MaterialNotFound(uid));
                };

                match backend.create_pipeline(&material) {
                    Ok((pipeline, layout)) => {
                        let id = PipelineId(self.next_id);
                        self.next_id += 1;
                        self.stats.constructions += 1;
                        debug!("created pipeline {id} for {uid}");
                        Ok(entry.insert(PipelineRecord {
                            pipeline,
                            layout,
                            material: uid,
                            id,
                        }))
                    }
                    Err(reason) => {
                        self.stats.failures += 1;
                        warn!("pipeline creation for {uid} failed: {reason}");
                        Err(RenderError::PipelineCreation {
                            material: uid,
                            reason,
                        })
                    }
                }
            }
        }
    }

    pub fn get(&self, uid: MaterialId) -> Option<&PipelineRecord<B>> {
        self.records.get(&uid)
    }

    pub fn contains(&self, uid: MaterialId) -> bool {
        self.records.contains_key(&uid)
    }

    /// Removes the entry for `uid` without releasing backend objects. Pass the
    /// record to [`PipelineCache::destroy_pipeline`] to release them.
    pub fn evict(&mut self, uid: MaterialId) -> Option<PipelineRecord<B>> {
        let record = self.records.remove(&uid)?;
        self.stats.evictions += 1;
        Some(record)
    }

    /// Releases the pipeline and layout of an evicted record.
    pub fn destroy_pipeline(backend: &mut B, record: PipelineRecord<B>) {
        debug!("destroying pipeline {} of {}", record.id, record.material);
        backend.destroy_pipeline(record.pipeline, record.layout);
    }

    /// Evicts and destroys every record.
    pub fn clear(&mut self, backend: &mut B) {
        for (_, record) in self.records.drain() {
            Self::destroy_pipeline(backend, record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> PipelineCacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareBackend;
    use crate::material::{Material, MaterialParams, MaterialRegistry, ShaderSource};

    fn registry() -> MaterialRegistry {
        let mut registry = MaterialRegistry::new();
        registry.insert(Material::standard(MaterialId(1), MaterialParams::default()));
        registry.insert(Material::new(
            MaterialId(2),
            ShaderSource::new("vertex_only", "@vertex fn vs_main() {}"),
            MaterialParams::default(),
        ));
        registry
    }

    #[test]
    fn repeated_lookups_build_once() {
        let mut backend = SoftwareBackend::new();
        let materials = registry();
        let mut cache = PipelineCache::new();

        let first = cache
            .get_or_create_pipeline(&mut backend, &materials, MaterialId(1))
            .unwrap()
            .id();
        for _ in 0..9 {
            let again = cache
                .get_or_create_pipeline(&mut backend, &materials, MaterialId(1))
                .unwrap();
            assert_eq!(again.id(), first);
            assert_eq!(again.material(), MaterialId(1));
        }

        assert_eq!(backend.pipelines_created(), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.constructions), (9, 1, 1));
    }

    #[test]
    fn failed_build_caches_nothing_and_retries() {
        let mut backend = SoftwareBackend::new();
        let materials = registry();
        let mut cache = PipelineCache::new();

        for _ in 0..2 {
            let error = cache
                .get_or_create_pipeline(&mut backend, &materials, MaterialId(2))
                .err()
                .unwrap();
            assert!(matches!(
                error,
                RenderError::PipelineCreation { material: MaterialId(2), .. }
            ));
        }

        assert!(!cache.contains(MaterialId(2)));
        assert_eq!(cache.stats().failures, 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn unknown_material_is_reported() {
        let mut backend = SoftwareBackend::new();
        let mut cache = PipelineCache::new();
        let result = cache.get_or_create_pipeline(&mut backend, &registry(), MaterialId(42));
        assert!(matches!(result, Err(RenderError::MaterialNotFound(MaterialId(42)))));
    }

    #[test]
    fn evict_then_destroy_releases_once() {
        let mut backend = SoftwareBackend::new();
        let materials = registry();
        let mut cache = PipelineCache::new();
        cache
            .get_or_create_pipeline(&mut backend, &materials, MaterialId(1))
            .unwrap();

        let record = cache.evict(MaterialId(1)).unwrap();
        assert!(cache.evict(MaterialId(1)).is_none());
        PipelineCache::destroy_pipeline(&mut backend, record);
        assert_eq!(backend.pipelines_destroyed(), 1);

        let rebuilt = cache
            .get_or_create_pipeline(&mut backend, &materials, MaterialId(1))
            .unwrap();
        assert_eq!(rebuilt.id(), PipelineId(1));
        assert_eq!(backend.pipelines_created(), 2);

        cache.clear(&mut backend);
        assert!(cache.is_empty());
        assert_eq!(backend.pipelines_destroyed(), 2);
    }
}
