//! # Rendering Seam
//!
//! Backend-agnostic rendering types shared by the stereo presenter and the
//! playback driver. The engine never talks to a graphics API directly: it
//! drives a [`SceneRenderer`] implementation, writes per-instance transforms
//! into [`InstancedMesh`] arenas owned by [`SceneResources`], and leaves the
//! upload and draw to the backend.
//!
//! ## Modules
//!
//! - `backend`: renderer, scene and frame-scheduler traits plus pixel rectangles
//! - `camera`: logical camera and the per-draw render camera
//! - `instancing`: fixed-capacity instance transform arenas
//! - `resources`: the explicitly passed scene-resources context
//! - `headless`: recording implementations used by tests and the demo app

pub mod backend;
pub mod camera;
pub mod instancing;
pub mod resources;
pub mod headless;

pub use backend::{
    SceneRenderer, SceneGraph, FrameScheduler, FrameCallback, FrameRequestId,
    Rect, SurfaceSize, RenderTarget, StencilFunc, StencilOp,
};
pub use camera::{Camera, RenderCamera, RenderLayers};
pub use instancing::{InstancedMesh, InstanceData, DirtyFlags, MeshKind};
pub use resources::{SceneResources, MeshKey, RoomModel, RoomSlots};
pub use headless::{RecordingRenderer, RecordingScene, RenderCommand, DrawCall, ManualScheduler};

/// Rendering system errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// An instance write addressed a slot outside the mesh capacity
    #[error("Instance slot {index} out of range for '{mesh}' (capacity {capacity})")]
    SlotOutOfRange {
        /// Mesh name
        mesh: String,
        /// Requested slot
        index: usize,
        /// Mesh capacity
        capacity: usize,
    },

    /// A mesh handle no longer refers to a live mesh
    #[error("Unknown mesh handle: {0}")]
    UnknownMesh(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
