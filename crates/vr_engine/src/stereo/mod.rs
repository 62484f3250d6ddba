//! # Stereo Presentation
//!
//! Turns one logical render call into a correctly projected dual-eye render
//! for head-mounted displays, and falls back to ordinary rendering when no
//! display is presenting.
//!
//! ## Modules
//!
//! - `display`: the head-mounted display seam and its data types
//! - `projection`: off-axis projections and head-relative eye matrices
//! - `presenter`: the presenter wrapping a [`crate::render::SceneRenderer`]
//! - `capabilities`: startup probing of platform and displays
//! - `simulated`: an in-process display and display provider

pub mod display;
pub mod projection;
pub mod presenter;
pub mod capabilities;
pub mod simulated;

pub use display::{
    VrDisplay, DisplayProvider, DisplayInfo, DisplayCapabilities, DisplayError, DisplayResult,
    Eye, EyeParameters, FieldOfView, FrameData, LayerBounds, Pose,
};
pub use projection::{
    FovPort, NdcScaleOffset, fov_to_ndc_scale_offset, fov_port_to_projection,
    fov_to_projection, eye_matrices,
};
pub use presenter::{StereoPresenter, FrameHandle};
pub use capabilities::{Capabilities, PlatformInfo, DisplayKind};
pub use simulated::{SimulatedDisplay, SimulatedProvider};
