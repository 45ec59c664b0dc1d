use super::*;
use crate::transform::Matrix;

/// One visited item with its accumulated world matrix.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    pub key: ItemKey,
    pub layer: LayerKey,
    pub item: &'a DrawableItem,
    pub world: Matrix,
    /// Newest revision among the item, its ancestors and its group. Equal
    /// values across frames mean `world` and the geometry are unchanged.
    pub revision: u64,
}

/// Lazy depth-first walk over a slice of layers.
///
/// Layers are visited in the order given (scene traversal passes them in
/// z-order), groups in registration order, and items pre-order with siblings
/// in insertion order. The graph is borrowed for the lifetime of the walk.
pub struct Traversal<'a> {
    graph: &'a SceneGraph,
    layers: &'a [LayerKey],
    layer_cursor: usize,
    groups: &'a [GroupKey],
    group_cursor: usize,
    current_layer: Option<LayerKey>,
    /// Pending items with their parent's world matrix and revision, top is
    /// next.
    stack: Vec<(ItemKey, Matrix, u64)>,
}

impl<'a> Traversal<'a> {
    fn new(graph: &'a SceneGraph, layers: &'a [LayerKey]) -> Self {
        Self {
            graph,
            layers,
            layer_cursor: 0,
            groups: &[],
            group_cursor: 0,
            current_layer: None,
            stack: Vec::new(),
        }
    }

    fn empty(graph: &'a SceneGraph) -> Self {
        Self::new(graph, &[])
    }

    /// Queues the next non-empty group. Returns false once every layer is done.
    fn advance_group(&mut self) -> bool {
        loop {
            if let Some(group_key) = self.groups.get(self.group_cursor) {
                self.group_cursor += 1;
                let Some(group) = self.graph.groups.get(*group_key) else {
                    continue;
                };
                let group_world = *group.transform.matrix();
                let group_revision = group.revision;
                self.stack.extend(
                    group
                        .items
                        .iter()
                        .rev()
                        .map(|item| (*item, group_world, group_revision)),
                );
                if !self.stack.is_empty() {
                    return true;
                }
                continue;
            }

            let Some(layer_key) = self.layers.get(self.layer_cursor) else {
                return false;
            };
            self.layer_cursor += 1;
            match self.graph.layers.get(*layer_key) {
                Some(layer) => {
                    self.current_layer = Some(*layer_key);
                    self.groups = layer.groups.as_slice();
                }
                None => self.groups = &[],
            }
            self.group_cursor = 0;
        }
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Drawable<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, parent_world, parent_revision)) = self.stack.pop() {
                let Some(item) = self.graph.items.get(key) else {
                    continue;
                };
                let world = item.transform.compose(&parent_world);
                let revision = item.revision.max(parent_revision);
                self.stack.extend(
                    item.children
                        .iter()
                        .rev()
                        .map(|child| (*child, world, revision)),
                );
                let layer = self.current_layer?;
                return Some(Drawable {
                    key,
                    layer,
                    item,
                    world,
                    revision,
                });
            }

            if !self.advance_group() {
                return None;
            }
        }
    }
}

impl SceneGraph {
    /// Walks every layer of `scene` in z-order. A stale key yields nothing.
    pub fn traverse_scene(&self, scene: SceneKey) -> Traversal<'_> {
        match self.scenes.get(scene) {
            Some(scene) => Traversal::new(self, &scene.layers),
            None => Traversal::empty(self),
        }
    }

    /// Walks a single layer. A stale key yields nothing.
    pub fn traverse_layer(&self, layer: LayerKey) -> Traversal<'_> {
        let Some(scene) = self
            .layers
            .get(layer)
            .and_then(|node| self.scenes.get(node.scene))
        else {
            return Traversal::empty(self);
        };
        match scene.layers.iter().position(|existing| *existing == layer) {
            Some(position) => Traversal::new(self, &scene.layers[position..=position]),
            None => Traversal::empty(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{apply, Transform};
    use crate::Color;

    fn desc(material: u64) -> ItemDesc {
        ItemDesc::new(
            MaterialId(material),
            Geometry::rect((0.0, 0.0), (1.0, 1.0), Color::WHITE),
        )
    }

    #[test]
    fn visits_layers_by_z_then_groups_then_items_preorder() {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("main", 0);
        let upper = graph.create_layer(scene, 1).unwrap();
        let lower = graph.create_layer(scene, 0).unwrap();

        let upper_group = graph.create_group(upper, Transform::identity()).unwrap();
        let upper_item = graph.create_item(upper_group, desc(1)).unwrap();

        let first_group = graph.create_group(lower, Transform::identity()).unwrap();
        let _empty_group = graph.create_group(lower, Transform::identity()).unwrap();
        let second_group = graph.create_group(lower, Transform::identity()).unwrap();
        let root = graph.create_item(first_group, desc(1)).unwrap();
        let child_a = graph.create_child_item(root, desc(1)).unwrap();
        let grandchild = graph.create_child_item(child_a, desc(1)).unwrap();
        let child_b = graph.create_child_item(root, desc(1)).unwrap();
        let sibling = graph.create_item(first_group, desc(1)).unwrap();
        let other = graph.create_item(second_group, desc(1)).unwrap();

        let order: Vec<ItemKey> = graph.traverse_scene(scene).map(|d| d.key).collect();
        assert_eq!(
            order,
            vec![root, child_a, grandchild, child_b, sibling, other, upper_item]
        );

        let layers: Vec<LayerKey> = graph.traverse_scene(scene).map(|d| d.layer).collect();
        assert_eq!(layers.last(), Some(&upper));
        assert!(layers[..6].iter().all(|layer| *layer == lower));
    }

    #[test]
    fn traversal_is_restartable() {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("main", 0);
        let layer = graph.create_layer(scene, 0).unwrap();
        let group = graph.create_group(layer, Transform::identity()).unwrap();
        graph.create_item(group, desc(1)).unwrap();
        graph.create_item(group, desc(2)).unwrap();

        let first: Vec<ItemKey> = graph.traverse_scene(scene).map(|d| d.key).collect();
        let second: Vec<ItemKey> = graph.traverse_scene(scene).map(|d| d.key).collect();
        assert_eq!(first, second);
        assert_eq!(graph.traverse_layer(layer).count(), 2);
    }

    #[test]
    fn world_matrix_accumulates_group_and_parents() {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("main", 0);
        let layer = graph.create_layer(scene, 0).unwrap();
        let group = graph
            .create_group(layer, Transform::from_translation(100.0, 0.0))
            .unwrap();
        let parent = graph
            .create_item(
                group,
                desc(1).with_transform(Transform::from_translation(0.0, 10.0)),
            )
            .unwrap();
        let child = graph
            .create_child_item(
                parent,
                desc(1).with_transform(Transform::identity().with_scale(2.0, 2.0)),
            )
            .unwrap();

        let drawable = graph
            .traverse_scene(scene)
            .find(|d| d.key == child)
            .unwrap();
        assert_eq!(apply(&drawable.world, [1.0, 1.0]), [102.0, 12.0]);
    }

    #[test]
    fn revision_inherits_from_group_and_ancestors() {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("main", 0);
        let layer = graph.create_layer(scene, 0).unwrap();
        let group = graph.create_group(layer, Transform::identity()).unwrap();
        let parent = graph.create_item(group, desc(1)).unwrap();
        let child = graph.create_child_item(parent, desc(1)).unwrap();
        let sibling = graph.create_item(group, desc(1)).unwrap();

        let revision_of = |graph: &SceneGraph, key: ItemKey| {
            graph
                .traverse_scene(scene)
                .find(|d| d.key == key)
                .map(|d| d.revision)
                .unwrap()
        };
        let child_before = revision_of(&graph, child);
        let sibling_before = revision_of(&graph, sibling);

        graph
            .set_item_transform(parent, Transform::from_translation(1.0, 1.0))
            .unwrap();
        assert!(revision_of(&graph, child) > child_before);
        assert_eq!(revision_of(&graph, sibling), sibling_before);

        graph
            .set_group_transform(group, Transform::from_translation(2.0, 0.0))
            .unwrap();
        assert_eq!(revision_of(&graph, sibling), graph.revision());
    }

    #[test]
    fn stale_keys_yield_nothing() {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene("main", 0);
        let layer = graph.create_layer(scene, 0).unwrap();
        let group = graph.create_group(layer, Transform::identity()).unwrap();
        graph.create_item(group, desc(1)).unwrap();

        graph.destroy_scene(scene).unwrap();
        assert_eq!(graph.traverse_scene(scene).count(), 0);
        assert_eq!(graph.traverse_layer(layer).count(), 0);
    }
}
