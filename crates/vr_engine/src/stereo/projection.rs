//! Per-eye projection and eye-pose math
//!
//! Head-mounted lenses are usually not centred on their half of the panel, so
//! each eye gets an off-axis projection built from four half-angle tangents.
//! Depth maps `near` to clip 0 and `far` to clip 1.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Quat, Vec3};
use crate::stereo::{FieldOfView, FrameData};

/// Near plane used when none is supplied
pub const DEFAULT_NEAR: f32 = 0.01;

/// Far plane used when none is supplied
pub const DEFAULT_FAR: f32 = 10_000.0;

/// Field of view as tangents of the four half-angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovPort {
    /// Tangent of the up angle
    pub up_tan: f32,
    /// Tangent of the down angle
    pub down_tan: f32,
    /// Tangent of the left angle
    pub left_tan: f32,
    /// Tangent of the right angle
    pub right_tan: f32,
}

impl From<&FieldOfView> for FovPort {
    fn from(fov: &FieldOfView) -> Self {
        Self {
            up_tan: utils::deg_to_rad(fov.up_degrees).tan(),
            down_tan: utils::deg_to_rad(fov.down_degrees).tan(),
            left_tan: utils::deg_to_rad(fov.left_degrees).tan(),
            right_tan: utils::deg_to_rad(fov.right_degrees).tan(),
        }
    }
}

/// Scale and offset mapping a field of view onto normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdcScaleOffset {
    /// X and Y scale
    pub scale: [f32; 2],
    /// X and Y offset
    pub offset: [f32; 2],
}

/// NDC scale and offset for a field of view
pub fn fov_to_ndc_scale_offset(fov: &FovPort) -> NdcScaleOffset {
    let px_scale = 2.0 / (fov.left_tan + fov.right_tan);
    let px_offset = (fov.left_tan - fov.right_tan) * px_scale * 0.5;
    let py_scale = 2.0 / (fov.up_tan + fov.down_tan);
    let py_offset = (fov.up_tan - fov.down_tan) * py_scale * 0.5;
    NdcScaleOffset {
        scale: [px_scale, py_scale],
        offset: [px_offset, py_offset],
    }
}

/// Off-axis projection from half-angle tangents
///
/// `right_handed` selects a view space looking down -Z.
pub fn fov_port_to_projection(fov: &FovPort, right_handed: bool, near: f32, far: f32) -> Mat4 {
    let handedness = if right_handed { -1.0 } else { 1.0 };
    let ndc = fov_to_ndc_scale_offset(fov);

    let mut m = Mat4::zeros();

    // X and Y map clip edges to [-w, +w]
    m[(0, 0)] = ndc.scale[0];
    m[(0, 2)] = ndc.offset[0] * handedness;

    // NDC offset is Y-down, view space is Y-up
    m[(1, 1)] = ndc.scale[1];
    m[(1, 2)] = -ndc.offset[1] * handedness;

    m[(2, 2)] = far / (near - far) * -handedness;
    m[(2, 3)] = (far * near) / (near - far);

    // W = Z in
    m[(3, 2)] = handedness;

    m
}

/// Off-axis projection from a field of view in degrees
pub fn fov_to_projection(fov: &FieldOfView, right_handed: bool, near: f32, far: f32) -> Mat4 {
    fov_port_to_projection(&FovPort::from(fov), right_handed, near, far)
}

/// Head model matrix from a pose; missing parts stay at identity
pub fn head_matrix(orientation: Option<&Quat>, position: Option<&Vec3>) -> Mat4 {
    Mat4::from_pose(
        orientation.unwrap_or(&Quat::identity()),
        position.unwrap_or(&Vec3::zeros()),
    )
}

/// Model matrices of both eyes relative to the head
///
/// A view matrix is `head_to_eye * sitting_to_head`, and the head model matrix
/// is the inverse of `sitting_to_head`, so `view * head` leaves `head_to_eye`.
/// Its inverse places the eye in head space.
pub fn eye_matrices(frame: &FrameData) -> (Mat4, Mat4) {
    let head = head_matrix(frame.pose.orientation.as_ref(), frame.pose.position.as_ref());
    let invert = |view: &Mat4| {
        (view * head).try_inverse().unwrap_or_else(|| {
            log::warn!("Eye view matrix is singular, using identity");
            Mat4::identity()
        })
    };
    (invert(&frame.left_view), invert(&frame.right_view))
}
