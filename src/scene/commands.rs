use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ahash::HashMap;
use tracing::{debug, warn};

use super::*;

/// Handle of a node created through a [`SceneCommandQueue`]. Commands may
/// reference it through [`NodeRef::Pending`] before and after it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Either a live key or the ticket of a node created through a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<K> {
    Key(K),
    Pending(Ticket),
}

impl<K> From<Ticket> for NodeRef<K> {
    fn from(ticket: Ticket) -> Self {
        NodeRef::Pending(ticket)
    }
}

macro_rules! node_ref_from_key {
    ($($key:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$key> for NodeRef<$key> {
                fn from(key: $key) -> Self {
                    NodeRef::Key(key)
                }
            }

            impl ResolveKey for $key {
                fn from_resolved(resolved: ResolvedKey) -> Option<Self> {
                    match resolved {
                        ResolvedKey::$variant(key) => Some(key),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Key a ticket resolved to once its creation command was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKey {
    Scene(SceneKey),
    Layer(LayerKey),
    Group(GroupKey),
    Item(ItemKey),
}

trait ResolveKey: Sized {
    fn from_resolved(resolved: ResolvedKey) -> Option<Self>;
}

node_ref_from_key! {
    SceneKey => Scene,
    LayerKey => Layer,
    GroupKey => Group,
    ItemKey => Item,
}

impl ResolvedKey {
    fn is_live(&self, graph: &SceneGraph) -> bool {
        match self {
            ResolvedKey::Scene(key) => graph.scenes.contains_key(*key),
            ResolvedKey::Layer(key) => graph.layers.contains_key(*key),
            ResolvedKey::Group(key) => graph.groups.contains_key(*key),
            ResolvedKey::Item(key) => graph.items.contains_key(*key),
        }
    }
}

impl<K: ResolveKey + Copy> NodeRef<K> {
    fn resolve(&self, resolved: &HashMap<Ticket, ResolvedKey>) -> Result<K, SceneError> {
        match self {
            NodeRef::Key(key) => Ok(*key),
            NodeRef::Pending(ticket) => resolved
                .get(ticket)
                .copied()
                .and_then(K::from_resolved)
                .ok_or(SceneError::UnresolvedTicket(ticket.0)),
        }
    }
}

/// Deferred scene mutation.
#[derive(Debug, Clone)]
pub enum SceneCommand {
    CreateScene {
        ticket: Ticket,
        name: String,
        z_index: i32,
    },
    CreateLayer {
        ticket: Ticket,
        scene: NodeRef<SceneKey>,
        z_index: i32,
    },
    CreateGroup {
        ticket: Ticket,
        layer: NodeRef<LayerKey>,
        transform: Transform,
    },
    CreateItem {
        ticket: Ticket,
        group: NodeRef<GroupKey>,
        desc: ItemDesc,
    },
    CreateChildItem {
        ticket: Ticket,
        parent: NodeRef<ItemKey>,
        desc: ItemDesc,
    },
    SetItemTransform {
        item: NodeRef<ItemKey>,
        transform: Transform,
    },
    SetItemMaterial {
        item: NodeRef<ItemKey>,
        material: MaterialId,
    },
    SetItemGeometry {
        item: NodeRef<ItemKey>,
        geometry: Arc<Geometry>,
    },
    SetGroupTransform {
        group: NodeRef<GroupKey>,
        transform: Transform,
    },
    SetLayerZIndex {
        layer: NodeRef<LayerKey>,
        z_index: i32,
    },
    SetSceneZIndex {
        scene: NodeRef<SceneKey>,
        z_index: i32,
    },
    MoveItem {
        item: NodeRef<ItemKey>,
        group: NodeRef<GroupKey>,
    },
    DestroyItem(NodeRef<ItemKey>),
    DestroyGroup(NodeRef<GroupKey>),
    DestroyLayer(NodeRef<LayerKey>),
    DestroyScene(NodeRef<SceneKey>),
}

/// Outcome of applying one batch of commands.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub applied: usize,
    /// Tickets created by this batch.
    pub resolved: HashMap<Ticket, ResolvedKey>,
    pub errors: Vec<SceneError>,
}

impl FlushReport {
    pub fn key(&self, ticket: Ticket) -> Option<ResolvedKey> {
        self.resolved.get(&ticket).copied()
    }
}

/// Thread-safe queue of scene mutations, drained at a frame boundary.
///
/// Clones share the same queue, so producers on other threads keep their own
/// handle while the render loop owns the [`SceneGraph`].
///
/// Tickets stay resolvable across flushes for as long as their node is alive,
/// so a producer can keep addressing a node it created through the queue.
#[derive(Debug, Clone, Default)]
pub struct SceneCommandQueue {
    pending: Arc<Mutex<Vec<SceneCommand>>>,
    resolved: Arc<Mutex<HashMap<Ticket, ResolvedKey>>>,
    next_ticket: Arc<AtomicU64>,
}

impl SceneCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ticket(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    pub fn push(&self, command: SceneCommand) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key of the live node created for `ticket`, once a flush applied it.
    pub fn key(&self, ticket: Ticket) -> Option<ResolvedKey> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket)
            .copied()
    }

    /// Number of tickets that currently resolve to a live node.
    pub fn resolved_count(&self) -> usize {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn create_scene(&self, name: impl Into<String>, z_index: i32) -> Ticket {
        let ticket = self.ticket();
        self.push(SceneCommand::CreateScene {
            ticket,
            name: name.into(),
            z_index,
        });
        ticket
    }

    pub fn create_layer(&self, scene: impl Into<NodeRef<SceneKey>>, z_index: i32) -> Ticket {
        let ticket = self.ticket();
        self.push(SceneCommand::CreateLayer {
            ticket,
            scene: scene.into(),
            z_index,
        });
        ticket
    }

    pub fn create_group(
        &self,
        layer: impl Into<NodeRef<LayerKey>>,
        transform: Transform,
    ) -> Ticket {
        let ticket = self.ticket();
        self.push(SceneCommand::CreateGroup {
            ticket,
            layer: layer.into(),
            transform,
        });
        ticket
    }

    pub fn create_item(&self, group: impl Into<NodeRef<GroupKey>>, desc: ItemDesc) -> Ticket {
        let ticket = self.ticket();
        self.push(SceneCommand::CreateItem {
            ticket,
            group: group.into(),
            desc,
        });
        ticket
    }

    pub fn create_child_item(
        &self,
        parent: impl Into<NodeRef<ItemKey>>,
        desc: ItemDesc,
    ) -> Ticket {
        let ticket = self.ticket();
        self.push(SceneCommand::CreateChildItem {
            ticket,
            parent: parent.into(),
            desc,
        });
        ticket
    }

    /// Takes every queued command under a single lock and applies them in
    /// push order. Failed commands are logged and reported; the rest still
    /// apply.
    ///
    /// Tickets resolved by earlier flushes stay usable. Tickets whose node no
    /// longer exists are forgotten at the end of the flush.
    pub fn flush_into(&self, graph: &mut SceneGraph) -> FlushReport {
        let commands = std::mem::take(
            &mut *self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut resolved = self
            .resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let report = graph.apply_commands_with(commands, &mut resolved);
        if report.applied > 0 {
            let before = resolved.len();
            resolved.retain(|_, key| key.is_live(graph));
            if resolved.len() < before {
                debug!("forgot {} tickets of destroyed nodes", before - resolved.len());
            }
        }
        report
    }
}

impl SceneGraph {
    /// Applies `commands` in order. Tickets resolve only against nodes created
    /// earlier in the same batch.
    pub fn apply_commands(&mut self, commands: Vec<SceneCommand>) -> FlushReport {
        self.apply_commands_with(commands, &mut HashMap::default())
    }

    fn apply_commands_with(
        &mut self,
        commands: Vec<SceneCommand>,
        resolved: &mut HashMap<Ticket, ResolvedKey>,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        if commands.is_empty() {
            return report;
        }

        let count = commands.len();
        for command in commands {
            match self.apply_command(command, resolved) {
                Ok(Some((ticket, key))) => {
                    resolved.insert(ticket, key);
                    report.resolved.insert(ticket, key);
                    report.applied += 1;
                }
                Ok(None) => report.applied += 1,
                Err(error) => {
                    warn!("scene command failed: {error}");
                    report.errors.push(error);
                }
            }
        }

        debug!(
            "applied {}/{} scene commands ({} failed)",
            report.applied,
            count,
            report.errors.len()
        );
        report
    }

    fn apply_command(
        &mut self,
        command: SceneCommand,
        resolved: &HashMap<Ticket, ResolvedKey>,
    ) -> Result<Option<(Ticket, ResolvedKey)>, SceneError> {
        let created = match command {
            SceneCommand::CreateScene {
                ticket,
                name,
                z_index,
            } => Some((ticket, ResolvedKey::Scene(self.create_scene(name, z_index)))),
            SceneCommand::CreateLayer {
                ticket,
                scene,
                z_index,
            } => {
                let layer = self.create_layer(scene.resolve(resolved)?, z_index)?;
                Some((ticket, ResolvedKey::Layer(layer)))
            }
            SceneCommand::CreateGroup {
                ticket,
                layer,
                transform,
            } => {
                let group = self.create_group(layer.resolve(resolved)?, transform)?;
                Some((ticket, ResolvedKey::Group(group)))
            }
            SceneCommand::CreateItem {
                ticket,
                group,
                desc,
            } => {
                let item = self.create_item(group.resolve(resolved)?, desc)?;
                Some((ticket, ResolvedKey::Item(item)))
            }
            SceneCommand::CreateChildItem {
                ticket,
                parent,
                desc,
            } => {
                let item = self.create_child_item(parent.resolve(resolved)?, desc)?;
                Some((ticket, ResolvedKey::Item(item)))
            }
            SceneCommand::SetItemTransform { item, transform } => {
                self.set_item_transform(item.resolve(resolved)?, transform)?;
                None
            }
            SceneCommand::SetItemMaterial { item, material } => {
                self.set_item_material(item.resolve(resolved)?, material)?;
                None
            }
            SceneCommand::SetItemGeometry { item, geometry } => {
                self.set_item_geometry(item.resolve(resolved)?, geometry)?;
                None
            }
            SceneCommand::SetGroupTransform { group, transform } => {
                self.set_group_transform(group.resolve(resolved)?, transform)?;
                None
            }
            SceneCommand::SetLayerZIndex { layer, z_index } => {
                self.set_layer_z_index(layer.resolve(resolved)?, z_index)?;
                None
            }
            SceneCommand::SetSceneZIndex { scene, z_index } => {
                self.set_scene_z_index(scene.resolve(resolved)?, z_index)?;
                None
            }
            SceneCommand::MoveItem { item, group } => {
                self.move_item(item.resolve(resolved)?, group.resolve(resolved)?)?;
                None
            }
            SceneCommand::DestroyItem(item) => {
                self.destroy_item(item.resolve(resolved)?)?;
                None
            }
            SceneCommand::DestroyGroup(group) => {
                self.destroy_group(group.resolve(resolved)?)?;
                None
            }
            SceneCommand::DestroyLayer(layer) => {
                self.destroy_layer(layer.resolve(resolved)?)?;
                None
            }
            SceneCommand::DestroyScene(scene) => {
                self.destroy_scene(scene.resolve(resolved)?)?;
                None
            }
        };
        Ok(created)
    }
}
