//! Vertex data carried by drawable items.
//!
//! Items reference their geometry through an `Arc`, so many items can share
//! one tessellation. [`GeometryCache`] keeps recently built tessellations
//! around by a caller-chosen key.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, FillVertexConstructor,
    TessellationError, VertexBuffers,
};

use crate::Color;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: [f32; 2], color: Color) -> Self {
        Self {
            position,
            color: color.normalize(),
        }
    }

    pub(crate) fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Indexed triangle list in the item's local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Axis-aligned rectangle from `min` to `max`, two triangles.
    pub fn rect(min: (f32, f32), max: (f32, f32), color: Color) -> Self {
        let vertices = vec![
            Vertex::new([min.0, min.1], color),
            Vertex::new([max.0, min.1], color),
            Vertex::new([max.0, max.1], color),
            Vertex::new([min.0, max.1], color),
        ];
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Fill-tessellates an arbitrary path with a flat color.
    pub fn from_path(path: &Path, color: Color) -> Result<Self, TessellationError> {
        let mut buffers: VertexBuffers<Vertex, u32> = VertexBuffers::new();
        let mut tessellator = FillTessellator::new();
        tessellator.tessellate_path(
            path,
            &FillOptions::default(),
            &mut BuffersBuilder::new(&mut buffers, VertexConverter::new(color)),
        )?;

        Ok(Self {
            vertices: buffers.vertices,
            indices: buffers.indices,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

struct VertexConverter {
    color: [f32; 4],
}

impl VertexConverter {
    fn new(color: Color) -> Self {
        Self {
            color: color.normalize(),
        }
    }
}

impl FillVertexConstructor<Vertex> for VertexConverter {
    fn new_vertex(&mut self, vertex: FillVertex) -> Vertex {
        let position = vertex.position();
        Vertex {
            position: [position.x, position.y],
            color: self.color,
        }
    }
}

/// LRU cache of shared tessellations.
pub struct GeometryCache {
    tessellations: LruCache<u64, Arc<Geometry>>,
}

impl GeometryCache {
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            tessellations: LruCache::new(size),
        }
    }

    pub fn len(&self) -> usize {
        self.tessellations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tessellations.is_empty()
    }

    pub fn get(&mut self, cache_key: u64) -> Option<Arc<Geometry>> {
        self.tessellations.get(&cache_key).cloned()
    }

    /// Returns the cached geometry for `cache_key`, building it on a miss.
    pub fn get_or_insert_with(
        &mut self,
        cache_key: u64,
        build: impl FnOnce() -> Geometry,
    ) -> Arc<Geometry> {
        self.tessellations
            .get_or_insert(cache_key, || Arc::new(build()))
            .clone()
    }
}
