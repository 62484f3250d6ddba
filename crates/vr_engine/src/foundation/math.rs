//! nalgebra aliases and the few helpers the presenter and clock need
//!
//! Matrices are column-major `f32` (GPU layout); clock values stay in `f64`
//! until they are quantized into frame indices.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// Position, offset or scale
pub type Vec3 = Vector3<f32>;
/// Homogeneous coordinate
pub type Vec4 = Vector4<f32>;
/// Rotation block of a pose matrix
pub type Mat3 = Matrix3<f32>;
/// View, projection or pose matrix
pub type Mat4 = Matrix4<f32>;
/// Location used by the look-at helper
pub type Point3 = nalgebra::Point3<f32>;
/// Unit orientation as reported by head and hand trackers
pub type Quat = Unit<Quaternion<f32>>;

/// Decomposed pose: where a joint or camera sits, how it is turned, how big it is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World position
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_pose(Vec3::zeros(), Quat::identity())
    }
}

impl Transform {
    /// No offset, no turn, unit scale
    pub fn identity() -> Self {
        Self::default()
    }

    /// Pose with unit scale
    pub fn from_pose(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::repeat(1.0),
        }
    }

    /// Compose translate, rotate, scale into one matrix
    pub fn to_matrix(&self) -> Mat4 {
        let mut matrix = self.rotation.to_homogeneous().prepend_nonuniform_scaling(&self.scale);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        matrix
    }

    /// Split an affine matrix back into position, rotation and scale
    ///
    /// Axes with zero length keep an identity basis instead of producing NaNs.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position: Vec3 = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let mut basis: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vec3::repeat(1.0);
        for (axis, mut column) in basis.column_iter_mut().enumerate() {
            let length = column.norm();
            scale[axis] = length;
            if length > f32::EPSILON {
                column /= length;
            }
        }
        Self {
            position,
            rotation: Quat::from_matrix(&basis),
            scale,
        }
    }

    /// Move along a local-space axis, scaled by `distance`
    ///
    /// The axis is rotated by the current orientation before being applied,
    /// so an eye offset expressed in head space lands in world space.
    pub fn translate_on_axis(&mut self, axis: &Vec3, distance: f32) {
        self.position += self.rotation * (axis * distance);
    }
}

/// Scalar helpers for field-of-view and clock math
pub mod utils {
    /// Field-of-view degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Clamp into `[min, max]`
    ///
    /// NaN collapses to `min` so a bad input can never escape the range.
    pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
        if value.is_nan() || value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// Quadratic ease-out: `f(t) = -t(t - 2)`
    ///
    /// Maps 0 to 0 and 1 to 1 with zero slope at 1.
    pub fn ease_out(t: f64) -> f64 {
        -t * (t - 2.0)
    }
}

/// Pose, projection and view constructors for [`Mat4`]
pub trait Mat4Ext {
    /// Build a rigid transform from an orientation and a position
    fn from_pose(orientation: &Quat, position: &Vec3) -> Mat4;

    /// Create a symmetric perspective projection matrix (right-handed, clip z in [-1, 1])
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed view matrix looking from `eye` at `target`
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn from_pose(orientation: &Quat, position: &Vec3) -> Mat4 {
        let mut matrix = orientation.to_homogeneous();
        matrix[(0, 3)] = position.x;
        matrix[(1, 3)] = position.y;
        matrix[(2, 3)] = position.z;
        matrix
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matrix_roundtrip() {
        let original = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let reconstructed = Transform::from_matrix(&original.to_matrix());

        assert_relative_eq!(reconstructed.position, original.position, epsilon = 1e-5);
        assert_relative_eq!(reconstructed.scale, original.scale, epsilon = 1e-5);
        let dot = original.rotation.coords.dot(&reconstructed.rotation.coords);
        assert!(dot.abs() > 0.999, "rotation drifted, dot = {}", dot);
    }

    #[test]
    fn test_translate_on_axis_follows_orientation() {
        // Facing -X after a 90 degree turn around Y; local +X becomes world -Z
        let mut transform = Transform::from_pose(
            Vec3::zeros(),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2),
        );
        transform.translate_on_axis(&Vec3::new(1.0, 0.0, 0.0), 0.5);

        assert_relative_eq!(transform.position, Vec3::new(0.0, 0.0, -0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_from_pose_places_translation_column() {
        let matrix = Mat4::from_pose(&Quat::identity(), &Vec3::new(0.1, 1.6, -0.2));
        assert_relative_eq!(matrix[(0, 3)], 0.1);
        assert_relative_eq!(matrix[(1, 3)], 1.6);
        assert_relative_eq!(matrix[(2, 3)], -0.2);
        assert_relative_eq!(matrix[(3, 3)], 1.0);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 1.6, 3.0);
        let view = Mat4::look_at(eye, Vec3::new(0.0, 1.6, 0.0), Vec3::y());
        let at_origin = view.transform_point(&Point3::from(eye));
        assert_relative_eq!(at_origin.coords, Vec3::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn test_clamp_and_ease() {
        assert_eq!(utils::clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(utils::clamp(-0.2, 0.0, 1.0), 0.0);
        assert_eq!(utils::clamp(f64::NAN, 0.0, 1.0), 0.0);
        assert_relative_eq!(utils::ease_out(0.0), 0.0);
        assert_relative_eq!(utils::ease_out(1.0), 1.0);
        assert_relative_eq!(utils::ease_out(0.5), 0.75);
    }
}
