use crate::id::{MaterialId, WindowId};
use crate::scene::SceneKey;

/// Errors surfaced by the frame pass and the backend entry points.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// Building the backend pipeline for a material failed (shader compile/link,
    /// layout construction). Nothing was cached; a later request retries.
    #[error("failed to create pipeline for {material}: {reason}")]
    PipelineCreation { material: MaterialId, reason: String },
    /// The asset layer does not know the material.
    #[error("{0} is not registered")]
    MaterialNotFound(MaterialId),
    /// An offscreen target could not be allocated.
    #[error("failed to allocate {width}x{height} target for scene '{scene}': {reason}")]
    TargetAllocation {
        scene: String,
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("{0} is not attached")]
    UnknownWindow(WindowId),
    /// The scene key is stale or the scene is not attached to the window.
    #[error("scene {0:?} is not available")]
    UnknownScene(SceneKey),
    /// The presentable surface could not be acquired.
    #[error("surface error: {0}")]
    Surface(String),
}

/// Errors produced by scene-graph operations on stale or mismatched keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("scene does not exist")]
    SceneNotFound,
    #[error("layer does not exist")]
    LayerNotFound,
    #[error("group does not exist")]
    GroupNotFound,
    #[error("item does not exist")]
    ItemNotFound,
    /// A queued command referenced a ticket that was never resolved.
    #[error("ticket {0} was not resolved by an earlier command")]
    UnresolvedTicket(u64),
}
