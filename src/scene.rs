//! Arena-backed scene graph: Scene → Layer → Group → DrawableItem.
//!
//! Every node lives in a generational slot map and is addressed by a typed
//! key. Ownership is explicit: a scene owns its layers, a layer its groups, a
//! group its root items and an item its children. Destroying a node frees the
//! slots of everything it owns, and stale keys never alias reused slots.
//!
//! Groups and items carry a revision stamp from a graph-wide counter. Any
//! change that moves an item's world-space vertices restamps the node, which
//! lets renderers keep processed vertices until the stamp moves.

use std::sync::Arc;

use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::SceneError;
use crate::geometry::Geometry;
use crate::id::MaterialId;
use crate::transform::Transform;

mod commands;
mod traversal;

pub use commands::{
    FlushReport, NodeRef, ResolvedKey, SceneCommand, SceneCommandQueue, Ticket,
};
pub use traversal::{Drawable, Traversal};

slotmap::new_key_type! {
    pub struct SceneKey;
    pub struct LayerKey;
    pub struct GroupKey;
    pub struct ItemKey;
}

#[derive(Debug)]
pub struct Scene {
    name: String,
    z_index: i32,
    registration: u64,
    /// Sorted by `(z_index, registration)`.
    layers: SmallVec<[LayerKey; 4]>,
}

impl Scene {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    /// Creation sequence number, used to order scenes with equal z.
    pub fn registration(&self) -> u64 {
        self.registration
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[LayerKey] {
        &self.layers
    }
}

#[derive(Debug)]
pub struct Layer {
    scene: SceneKey,
    z_index: i32,
    registration: u64,
    groups: SmallVec<[GroupKey; 8]>,
}

impl Layer {
    pub fn scene(&self) -> SceneKey {
        self.scene
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    /// Groups in registration order.
    pub fn groups(&self) -> &[GroupKey] {
        &self.groups
    }
}

#[derive(Debug)]
pub struct Group {
    layer: LayerKey,
    transform: Transform,
    revision: u64,
    items: Vec<ItemKey>,
}

impl Group {
    pub fn layer(&self) -> LayerKey {
        self.layer
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Stamp of the last transform change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Root items in insertion order.
    pub fn items(&self) -> &[ItemKey] {
        &self.items
    }
}

/// Description of a drawable item to create.
#[derive(Debug, Clone)]
pub struct ItemDesc {
    pub transform: Transform,
    pub material: MaterialId,
    pub geometry: Arc<Geometry>,
}

impl ItemDesc {
    pub fn new(material: MaterialId, geometry: impl Into<Arc<Geometry>>) -> Self {
        Self {
            transform: Transform::identity(),
            material,
            geometry: geometry.into(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

#[derive(Debug)]
pub struct DrawableItem {
    group: GroupKey,
    parent: Option<ItemKey>,
    children: Vec<ItemKey>,
    transform: Transform,
    material: MaterialId,
    geometry: Arc<Geometry>,
    revision: u64,
}

impl DrawableItem {
    pub fn group(&self) -> GroupKey {
        self.group
    }

    pub fn parent(&self) -> Option<ItemKey> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[ItemKey] {
        &self.children
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Stamp of the last change to this item's transform, material, geometry
    /// or group. Changes to ancestors are not included.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Default)]
pub struct SceneGraph {
    scenes: SlotMap<SceneKey, Scene>,
    layers: SlotMap<LayerKey, Layer>,
    groups: SlotMap<GroupKey, Group>,
    items: SlotMap<ItemKey, DrawableItem>,
    next_registration: u64,
    revision: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_registration(&mut self) -> u64 {
        let registration = self.next_registration;
        self.next_registration += 1;
        registration
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Latest revision stamp handed out.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Scenes ──────────────────────────────────────────────────────────────

    pub fn create_scene(&mut self, name: impl Into<String>, z_index: i32) -> SceneKey {
        let registration = self.next_registration();
        self.scenes.insert(Scene {
            name: name.into(),
            z_index,
            registration,
            layers: SmallVec::new(),
        })
    }

    pub fn scene(&self, key: SceneKey) -> Option<&Scene> {
        self.scenes.get(key)
    }

    pub fn scene_by_name(&self, name: &str) -> Option<SceneKey> {
        self.scenes
            .iter()
            .find(|(_, scene)| scene.name == name)
            .map(|(key, _)| key)
    }

    pub fn scenes(&self) -> impl Iterator<Item = (SceneKey, &Scene)> {
        self.scenes.iter()
    }

    pub fn set_scene_z_index(&mut self, key: SceneKey, z_index: i32) -> Result<(), SceneError> {
        let scene = self.scenes.get_mut(key).ok_or(SceneError::SceneNotFound)?;
        scene.z_index = z_index;
        Ok(())
    }

    /// Destroys the scene and everything it owns.
    pub fn destroy_scene(&mut self, key: SceneKey) -> Result<(), SceneError> {
        let scene = self.scenes.remove(key).ok_or(SceneError::SceneNotFound)?;
        for layer in scene.layers {
            self.free_layer(layer);
        }
        trace!("destroyed scene '{}'", scene.name);
        Ok(())
    }

    // ── Layers ──────────────────────────────────────────────────────────────

    pub fn create_layer(&mut self, scene: SceneKey, z_index: i32) -> Result<LayerKey, SceneError> {
        if !self.scenes.contains_key(scene) {
            return Err(SceneError::SceneNotFound);
        }
        let registration = self.next_registration();
        let key = self.layers.insert(Layer {
            scene,
            z_index,
            registration,
            groups: SmallVec::new(),
        });
        self.insert_layer_sorted(scene, key);
        Ok(key)
    }

    pub fn layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn set_layer_z_index(&mut self, key: LayerKey, z_index: i32) -> Result<(), SceneError> {
        let layer = self.layers.get_mut(key).ok_or(SceneError::LayerNotFound)?;
        layer.z_index = z_index;
        let scene = layer.scene;
        if let Some(scene) = self.scenes.get_mut(scene) {
            scene.layers.retain(|existing| *existing != key);
        }
        self.insert_layer_sorted(scene, key);
        Ok(())
    }

    pub fn destroy_layer(&mut self, key: LayerKey) -> Result<(), SceneError> {
        let scene = self
            .layers
            .get(key)
            .map(|layer| layer.scene)
            .ok_or(SceneError::LayerNotFound)?;
        if let Some(scene) = self.scenes.get_mut(scene) {
            scene.layers.retain(|existing| *existing != key);
        }
        self.free_layer(key);
        Ok(())
    }

    fn insert_layer_sorted(&mut self, scene: SceneKey, key: LayerKey) {
        let Some(layer) = self.layers.get(key) else {
            return;
        };
        let sort_key = (layer.z_index, layer.registration);
        let layers = &self.layers;
        if let Some(scene) = self.scenes.get_mut(scene) {
            let position = scene.layers.partition_point(|existing| {
                layers
                    .get(*existing)
                    .map(|other| (other.z_index, other.registration) < sort_key)
                    .unwrap_or(true)
            });
            scene.layers.insert(position, key);
        }
    }

    fn free_layer(&mut self, key: LayerKey) {
        if let Some(layer) = self.layers.remove(key) {
            for group in layer.groups {
                self.free_group(group);
            }
        }
    }

    // ── Groups ──────────────────────────────────────────────────────────────

    pub fn create_group(
        &mut self,
        layer: LayerKey,
        transform: Transform,
    ) -> Result<GroupKey, SceneError> {
        if !self.layers.contains_key(layer) {
            return Err(SceneError::LayerNotFound);
        }
        let revision = self.next_revision();
        let key = self.groups.insert(Group {
            layer,
            transform,
            revision,
            items: Vec::new(),
        });
        if let Some(layer) = self.layers.get_mut(layer) {
            layer.groups.push(key);
        }
        Ok(key)
    }

    pub fn group(&self, key: GroupKey) -> Option<&Group> {
        self.groups.get(key)
    }

    pub fn set_group_transform(
        &mut self,
        key: GroupKey,
        transform: Transform,
    ) -> Result<(), SceneError> {
        if !self.groups.contains_key(key) {
            return Err(SceneError::GroupNotFound);
        }
        let revision = self.next_revision();
        if let Some(group) = self.groups.get_mut(key) {
            group.transform = transform;
            group.revision = revision;
        }
        Ok(())
    }

    pub fn destroy_group(&mut self, key: GroupKey) -> Result<(), SceneError> {
        let layer = self
            .groups
            .get(key)
            .map(|group| group.layer)
            .ok_or(SceneError::GroupNotFound)?;
        if let Some(layer) = self.layers.get_mut(layer) {
            layer.groups.retain(|existing| *existing != key);
        }
        self.free_group(key);
        Ok(())
    }

    fn free_group(&mut self, key: GroupKey) {
        if let Some(group) = self.groups.remove(key) {
            for item in group.items {
                self.free_item_subtree(item);
            }
        }
    }

    // ── Items ───────────────────────────────────────────────────────────────

    /// Creates a root item registered in `group`.
    pub fn create_item(&mut self, group: GroupKey, desc: ItemDesc) -> Result<ItemKey, SceneError> {
        if !self.groups.contains_key(group) {
            return Err(SceneError::GroupNotFound);
        }
        let revision = self.next_revision();
        let key = self.items.insert(DrawableItem {
            group,
            parent: None,
            children: Vec::new(),
            transform: desc.transform,
            material: desc.material,
            geometry: desc.geometry,
            revision,
        });
        if let Some(group) = self.groups.get_mut(group) {
            group.items.push(key);
        }
        Ok(key)
    }

    /// Creates an item as the last child of `parent`, in the parent's group.
    pub fn create_child_item(
        &mut self,
        parent: ItemKey,
        desc: ItemDesc,
    ) -> Result<ItemKey, SceneError> {
        let group = self
            .items
            .get(parent)
            .map(|item| item.group)
            .ok_or(SceneError::ItemNotFound)?;
        let revision = self.next_revision();
        let key = self.items.insert(DrawableItem {
            group,
            parent: Some(parent),
            children: Vec::new(),
            transform: desc.transform,
            material: desc.material,
            geometry: desc.geometry,
            revision,
        });
        if let Some(parent) = self.items.get_mut(parent) {
            parent.children.push(key);
        }
        Ok(key)
    }

    pub fn item(&self, key: ItemKey) -> Option<&DrawableItem> {
        self.items.get(key)
    }

    /// Runs `update` on the item and restamps it.
    fn touch_item(
        &mut self,
        key: ItemKey,
        update: impl FnOnce(&mut DrawableItem),
    ) -> Result<(), SceneError> {
        if !self.items.contains_key(key) {
            return Err(SceneError::ItemNotFound);
        }
        let revision = self.next_revision();
        if let Some(item) = self.items.get_mut(key) {
            update(item);
            item.revision = revision;
        }
        Ok(())
    }

    pub fn set_item_transform(
        &mut self,
        key: ItemKey,
        transform: Transform,
    ) -> Result<(), SceneError> {
        self.touch_item(key, |item| item.transform = transform)
    }

    pub fn set_item_material(
        &mut self,
        key: ItemKey,
        material: MaterialId,
    ) -> Result<(), SceneError> {
        self.touch_item(key, |item| item.material = material)
    }

    pub fn set_item_geometry(
        &mut self,
        key: ItemKey,
        geometry: Arc<Geometry>,
    ) -> Result<(), SceneError> {
        self.touch_item(key, |item| item.geometry = geometry)
    }

    /// Registers `key` (with its subtree) as the last root item of `group`.
    ///
    /// A child item is detached from its parent first. An item is a member of
    /// exactly one group before and after the move.
    pub fn move_item(&mut self, key: ItemKey, group: GroupKey) -> Result<(), SceneError> {
        if !self.items.contains_key(key) {
            return Err(SceneError::ItemNotFound);
        }
        if !self.groups.contains_key(group) {
            return Err(SceneError::GroupNotFound);
        }

        self.detach_item(key);
        let revision = self.next_revision();
        if let Some(item) = self.items.get_mut(key) {
            item.parent = None;
            item.revision = revision;
        }
        if let Some(target) = self.groups.get_mut(group) {
            target.items.push(key);
        }

        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(item) = self.items.get_mut(current) {
                item.group = group;
                stack.extend(item.children.iter().copied());
            }
        }
        Ok(())
    }

    /// Destroys an item and its whole subtree, returning the number of freed
    /// nodes. The item is removed from its parent's (or group's) sequence
    /// exactly once; the remaining siblings keep their order.
    pub fn destroy_item(&mut self, key: ItemKey) -> Result<usize, SceneError> {
        if !self.items.contains_key(key) {
            return Err(SceneError::ItemNotFound);
        }
        self.detach_item(key);
        Ok(self.free_item_subtree(key))
    }

    fn detach_item(&mut self, key: ItemKey) {
        let Some(item) = self.items.get(key) else {
            return;
        };
        let siblings = match item.parent {
            Some(parent) => self.items.get_mut(parent).map(|parent| &mut parent.children),
            None => self.groups.get_mut(item.group).map(|group| &mut group.items),
        };
        if let Some(siblings) = siblings {
            if let Some(position) = siblings.iter().position(|sibling| *sibling == key) {
                siblings.remove(position);
            }
        }
    }

    fn free_item_subtree(&mut self, root: ItemKey) -> usize {
        let mut freed = 0;
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if let Some(item) = self.items.remove(current) {
                freed += 1;
                stack.extend(item.children);
            }
        }
        freed
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
