//! # 3D Camera System
//!
//! Two camera types live here:
//!
//! - [`Camera`]: the logical viewer camera owned by the application, described by
//!   position, target, field of view and clipping planes.
//! - [`RenderCamera`]: the camera actually handed to a draw call. It carries a
//!   world transform and an explicit projection matrix so the stereo presenter
//!   can substitute per-eye poses and off-axis projections.
//!
//! ## Coordinate System
//! Right-handed, Y-up, camera looking down -Z. Projection matrices map view
//! depth into clip space in the OpenGL convention unless a display supplies
//! its own matrices.

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Mat4Ext, Transform, Vec3, utils};

bitflags! {
    /// Visibility layers a camera renders
    ///
    /// Eye cameras enable their own layer on top of the default one so content
    /// can be targeted at a single eye.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderLayers: u32 {
        /// Content visible to every camera
        const DEFAULT = 1 << 0;
        /// Content visible only to the left eye
        const LEFT_EYE = 1 << 1;
        /// Content visible only to the right eye
        const RIGHT_EYE = 1 << 2;
    }
}

/// Viewer camera owned by the application
///
/// The stereo presenter reads its depth range and pose, then swaps in per-eye
/// poses and projections when a headset is presenting.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Eye point in world space
    pub position: Vec3,
    /// World point at the centre of the view
    pub target: Vec3,
    /// World up, usually +Y
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Width over height of the surface being drawn
    pub aspect: f32,
    /// Near clip distance; zero or negative makes the presenter use its default
    pub near: f32,
    /// Far clip distance; must exceed `near` to be used as-is
    pub far: f32,
}

impl Camera {
    /// Y-up camera at `position` looking toward -Z, with the field of view in degrees
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: position - Vec3::z(),
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Move the eye point, keeping the target
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera moved to {:?}", position);
    }

    /// Aim at `target` with the given up vector
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera aimed at {:?}", target);
    }

    /// Update camera aspect ratio for viewport changes
    ///
    /// Only logs changes larger than 0.01 to keep resize storms quiet.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if !(aspect.is_finite() && aspect > 0.0) {
            log::warn!("Ignoring degenerate aspect ratio {}", aspect);
            return;
        }
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Symmetric perspective projection
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Camera-to-world transform (the camera's own world matrix)
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix()
            .try_inverse()
            .unwrap_or_else(|| Mat4::new_translation(&self.position))
    }

    /// Build the camera handed to a monoscopic draw call
    pub fn to_render_camera(&self) -> RenderCamera {
        RenderCamera {
            world: Transform::from_matrix(&self.world_matrix()),
            projection: self.projection_matrix(),
            near: self.near,
            far: self.far,
            layers: RenderLayers::DEFAULT,
        }
    }
}

impl Default for Camera {
    /// Standing eye height at the origin, looking down -Z
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.6, 0.0),
            target: Vec3::new(0.0, 1.6, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Camera state for a single draw call
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCamera {
    /// Camera-to-world transform
    pub world: Transform,
    /// Projection matrix
    pub projection: Mat4,
    /// Near clipping distance
    pub near: f32,
    /// Far clipping distance
    pub far: f32,
    /// Layers this camera renders
    pub layers: RenderLayers,
}

impl RenderCamera {
    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        self.world
            .to_matrix()
            .try_inverse()
            .unwrap_or_else(Mat4::identity)
    }

    /// Combined projection * view matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}
