//! Pooled per-material draw batches.
//!
//! [`SlabPool`] hands out fixed blocks addressed by generational handles and
//! grows by whole chunks when it runs dry. [`BucketAllocator`] layers the
//! batching rule on top: within one pass every drawable with the same
//! material lands in the same [`RenderBucket`]. [`ProcessedItems`] keeps each
//! item's world-space vertices between frames so buckets are rebuilt by
//! copying, and only changed items are transformed again.

use ahash::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::geometry::{Geometry, Vertex};
use crate::id::MaterialId;
use crate::scene::{Drawable, ItemKey};
use crate::transform::{apply, Matrix};

/// Block contents that can be reset for reuse without giving up their
/// allocations.
pub trait Recycle {
    fn recycle(&mut self);
}

/// Generational handle into a [`SlabPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlabHandle {
    index: u32,
    generation: u32,
}

impl SlabHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

struct Slot<T> {
    value: T,
    generation: u32,
    occupied: bool,
}

/// Fixed-block slab allocator.
///
/// Releasing a handle twice, or touching a released handle, is a contract
/// violation and panics.
pub struct SlabPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    chunk_size: usize,
    live: usize,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Recycle> SlabPool<T> {
    pub fn new(
        chunk_size: usize,
        initial_chunks: usize,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        let mut pool = Self {
            slots: Vec::new(),
            free: Vec::new(),
            chunk_size: chunk_size.max(1),
            live: 0,
            factory: Box::new(factory),
        };
        for _ in 0..initial_chunks {
            pool.grow();
        }
        pool
    }

    fn grow(&mut self) {
        let start = self.slots.len();
        let end = start + self.chunk_size;
        self.slots.reserve(self.chunk_size);
        for _ in start..end {
            self.slots.push(Slot {
                value: (self.factory)(),
                generation: 0,
                occupied: false,
            });
        }
        // Lowest index is handed out first.
        self.free.extend((start as u32..end as u32).rev());
        debug!("slab pool grew to {} blocks", self.slots.len());
    }

    pub fn acquire(&mut self) -> SlabHandle {
        if self.free.is_empty() {
            self.grow();
        }
        let Some(index) = self.free.pop() else {
            unreachable!("slab pool grew without adding free blocks");
        };
        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        self.live += 1;
        SlabHandle {
            index,
            generation: slot.generation,
        }
    }

    pub fn release(&mut self, handle: SlabHandle) {
        let slot = self.live_slot_mut(handle);
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.value.recycle();
        self.free.push(handle.index);
        self.live -= 1;
    }

    pub fn get(&self, handle: SlabHandle) -> &T {
        match self.slots.get(handle.index as usize) {
            Some(slot) if slot.occupied && slot.generation == handle.generation => &slot.value,
            _ => panic!("slab handle {handle:?} is stale or was released"),
        }
    }

    pub fn get_mut(&mut self, handle: SlabHandle) -> &mut T {
        &mut self.live_slot_mut(handle).value
    }

    fn live_slot_mut(&mut self, handle: SlabHandle) -> &mut Slot<T> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.occupied && slot.generation == handle.generation => slot,
            _ => panic!("slab handle {handle:?} is stale or was released"),
        }
    }

    /// Total number of blocks, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Material-homogeneous batch of world-space geometry.
#[derive(Debug)]
pub struct RenderBucket {
    material: MaterialId,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub items: Vec<ItemKey>,
}

impl RenderBucket {
    fn with_capacity(vertex_capacity: usize) -> Self {
        Self {
            material: MaterialId(0),
            vertices: Vec::with_capacity(vertex_capacity),
            // Quads dominate: six indices per four vertices.
            indices: Vec::with_capacity(vertex_capacity + vertex_capacity / 2),
            items: Vec::new(),
        }
    }

    /// Material of the pass that acquired this bucket.
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Appends `geometry` transformed by `world`, rebasing its indices.
    pub fn append(&mut self, item: ItemKey, geometry: &Geometry, world: &Matrix) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(world_vertices(geometry, world));
        self.push_indices(base, &geometry.indices);
        self.items.push(item);
    }

    /// Appends vertices that are already in world space.
    pub fn append_world(&mut self, item: ItemKey, vertices: &[Vertex], indices: &[u32]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.push_indices(base, indices);
        self.items.push(item);
    }

    fn push_indices(&mut self, base: u32, indices: &[u32]) {
        self.indices.extend(indices.iter().map(|index| index + base));
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl Recycle for RenderBucket {
    fn recycle(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.items.clear();
    }
}

fn world_vertices<'a>(
    geometry: &'a Geometry,
    world: &'a Matrix,
) -> impl Iterator<Item = Vertex> + 'a {
    geometry.vertices.iter().map(move |vertex| Vertex {
        position: apply(world, vertex.position),
        color: vertex.color,
    })
}

#[derive(Default)]
struct ProcessedItem {
    revision: Option<u64>,
    last_frame: u64,
    vertices: Vec<Vertex>,
}

/// World-space vertices of every item drawn recently, keyed by item.
///
/// An entry is reused while the drawable's revision is unchanged. Entries of
/// items not drawn during a frame are dropped by [`ProcessedItems::finish_frame`].
#[derive(Default)]
pub struct ProcessedItems {
    items: HashMap<ItemKey, ProcessedItem>,
    frame: u64,
    processed: usize,
    reused: usize,
}

impl ProcessedItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// World-space vertices of `drawable`, transformed again only when its
    /// revision moved since the cached copy.
    pub fn vertices(&mut self, drawable: &Drawable<'_>) -> &[Vertex] {
        let frame = self.frame;
        let entry = self.items.entry(drawable.key).or_default();
        entry.last_frame = frame;
        if entry.revision == Some(drawable.revision) {
            self.reused += 1;
        } else {
            entry.vertices.clear();
            entry
                .vertices
                .extend(world_vertices(drawable.item.geometry(), &drawable.world));
            entry.revision = Some(drawable.revision);
            self.processed += 1;
        }
        &entry.vertices
    }

    /// Drops entries of items not drawn since the previous call and returns
    /// the `(processed, reused)` counts of the frame.
    pub fn finish_frame(&mut self) -> (usize, usize) {
        let frame = self.frame;
        self.items.retain(|_, entry| entry.last_frame == frame);
        self.frame += 1;
        (
            std::mem::take(&mut self.processed),
            std::mem::take(&mut self.reused),
        )
    }

    pub fn contains(&self, item: ItemKey) -> bool {
        self.items.contains_key(&item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.processed = 0;
        self.reused = 0;
    }
}

pub type BucketHandle = SlabHandle;

/// Hands out one bucket per material per pass.
pub struct BucketAllocator {
    pool: SlabPool<RenderBucket>,
    by_material: HashMap<MaterialId, BucketHandle>,
    /// Buckets of the open pass in the order their material first appeared.
    pass_order: SmallVec<[BucketHandle; 8]>,
}

impl BucketAllocator {
    pub fn new(chunk_size: usize, initial_chunks: usize, vertex_capacity: usize) -> Self {
        Self {
            pool: SlabPool::new(chunk_size, initial_chunks, move || {
                RenderBucket::with_capacity(vertex_capacity)
            }),
            by_material: HashMap::default(),
            pass_order: SmallVec::new(),
        }
    }

    /// Bucket accumulating `material` in the open pass, acquired on first use.
    pub fn acquire(&mut self, material: MaterialId) -> BucketHandle {
        if let Some(handle) = self.by_material.get(&material) {
            return *handle;
        }
        let handle = self.pool.acquire();
        self.pool.get_mut(handle).material = material;
        self.by_material.insert(material, handle);
        self.pass_order.push(handle);
        handle
    }

    /// Adds a traversed drawable to its material's bucket.
    pub fn batch(&mut self, drawable: &Drawable<'_>) -> BucketHandle {
        let handle = self.acquire(drawable.item.material());
        self.pool
            .get_mut(handle)
            .append(drawable.key, drawable.item.geometry(), &drawable.world);
        handle
    }

    /// Adds a traversed drawable to its material's bucket, taking its
    /// world-space vertices from `processed`.
    pub fn batch_processed(
        &mut self,
        drawable: &Drawable<'_>,
        processed: &mut ProcessedItems,
    ) -> BucketHandle {
        let handle = self.acquire(drawable.item.material());
        let vertices = processed.vertices(drawable);
        self.pool.get_mut(handle).append_world(
            drawable.key,
            vertices,
            &drawable.item.geometry().indices,
        );
        handle
    }

    /// Closes the pass. The returned handles stay live until released.
    pub fn finish_pass(&mut self) -> Vec<BucketHandle> {
        self.by_material.clear();
        self.pass_order.drain(..).collect()
    }

    pub fn bucket(&self, handle: BucketHandle) -> &RenderBucket {
        self.pool.get(handle)
    }

    pub fn bucket_mut(&mut self, handle: BucketHandle) -> &mut RenderBucket {
        self.pool.get_mut(handle)
    }

    pub fn release(&mut self, handle: BucketHandle) {
        if self.by_material.values().any(|open| *open == handle) {
            self.by_material.retain(|_, open| *open != handle);
            self.pass_order.retain(|open| *open != handle);
        }
        self.pool.release(handle);
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn live(&self) -> usize {
        self.pool.live()
    }
}
