//! Head-mounted display seam
//!
//! [`VrDisplay`] is the part of a device display API the presenter consumes:
//! eye parameters, per-refresh frame data, presentation control and the
//! display's own frame scheduler. [`DisplayProvider`] enumerates displays for
//! the capability probe.

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::render::{FrameCallback, FrameRequestId};

bitflags! {
    /// What a display can do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayCapabilities: u8 {
        /// Reports head position (6DOF)
        const HAS_POSITION = 1 << 0;
        /// Reports head orientation
        const HAS_ORIENTATION = 1 << 1;
        /// Has a separate physical screen, so the canvas is only a mirror
        const HAS_EXTERNAL_DISPLAY = 1 << 2;
        /// Accepts presentation requests
        const CAN_PRESENT = 1 << 3;
    }
}

/// Which eye
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    /// Left eye
    Left,
    /// Right eye
    Right,
}

/// Field of view as four half-angles in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    /// Angle above the optical axis
    pub up_degrees: f32,
    /// Angle below the optical axis
    pub down_degrees: f32,
    /// Angle left of the optical axis
    pub left_degrees: f32,
    /// Angle right of the optical axis
    pub right_degrees: f32,
}

impl FieldOfView {
    /// Symmetric field of view with the same half-angle on every side
    pub fn symmetric(degrees: f32) -> Self {
        Self {
            up_degrees: degrees,
            down_degrees: degrees,
            left_degrees: degrees,
            right_degrees: degrees,
        }
    }
}

/// Per-eye render parameters reported by the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeParameters {
    /// Recommended render width for one eye in pixels
    pub render_width: u32,
    /// Recommended render height for one eye in pixels
    pub render_height: u32,
    /// Eye position relative to the head
    pub offset: Vec3,
    /// Eye field of view
    pub field_of_view: FieldOfView,
}

/// Head pose; either part may be missing on limited hardware
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Head orientation
    pub orientation: Option<Quat>,
    /// Head position
    pub position: Option<Vec3>,
}

/// Display-supplied data for one refresh
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    /// Timestamp in milliseconds
    pub timestamp: f64,
    /// Head pose
    pub pose: Pose,
    /// Left eye projection
    pub left_projection: Mat4,
    /// Left eye view matrix
    pub left_view: Mat4,
    /// Right eye projection
    pub right_projection: Mat4,
    /// Right eye view matrix
    pub right_view: Mat4,
}

/// Normalized eye regions of the presented surface
///
/// A missing side falls back to the presenter's default split.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerBounds {
    /// Left eye `[x, y, width, height]`
    pub left: Option<[f32; 4]>,
    /// Right eye `[x, y, width, height]`
    pub right: Option<[f32; 4]>,
}

/// Identification of an enumerated display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    /// Vendor display name
    pub name: String,
    /// Display capabilities
    pub capabilities: DisplayCapabilities,
}

/// Display errors
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// No display is attached
    #[error("No VR hardware found.")]
    NotAvailable,

    /// The display refused to present
    #[error("Present request rejected: {0}")]
    PresentRejected(String),

    /// The display went away
    #[error("Display disconnected")]
    Disconnected,

    /// Enumeration failed
    #[error("Display enumeration failed: {0}")]
    EnumerationFailed(String),
}

/// Result type for display operations
pub type DisplayResult<T> = Result<T, DisplayError>;

/// A head-mounted display
pub trait VrDisplay {
    /// Vendor display name
    fn display_name(&self) -> &str;

    /// Display capabilities
    fn capabilities(&self) -> DisplayCapabilities;

    /// Whether the display is currently presenting
    fn is_presenting(&self) -> bool;

    /// Render parameters for one eye
    fn eye_parameters(&self, eye: Eye) -> EyeParameters;

    /// Set the depth range used for display-supplied projections
    fn set_depth_range(&mut self, near: f32, far: f32);

    /// Pose and per-eye matrices for the current refresh
    ///
    /// `None` when the display cannot supply frame data; the presenter then
    /// builds projections from the field of view.
    fn frame_data(&mut self) -> Option<FrameData>;

    /// Layers currently presented
    fn layers(&self) -> Vec<LayerBounds>;

    /// Start presenting (or update the presented layer)
    fn request_present(&mut self, layer: LayerBounds) -> DisplayResult<()>;

    /// Stop presenting
    fn exit_present(&mut self) -> DisplayResult<()>;

    /// Hand the finished frame to the display
    fn submit_frame(&mut self);

    /// Schedule a callback on the display's refresh
    fn request_animation_frame(&mut self, callback: FrameCallback) -> FrameRequestId;

    /// Cancel a callback scheduled on the display
    fn cancel_animation_frame(&mut self, id: FrameRequestId);

    /// Name and capabilities as an owned descriptor
    fn info(&self) -> DisplayInfo {
        DisplayInfo {
            name: self.display_name().to_string(),
            capabilities: self.capabilities(),
        }
    }
}

/// Source of attached displays
pub trait DisplayProvider {
    /// Whether the platform exposes a display API at all
    fn has_display_api(&self) -> bool;

    /// List attached displays; may block for a long time on some platforms
    fn enumerate(&self) -> DisplayResult<Vec<DisplayInfo>>;
}
