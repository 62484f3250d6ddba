//! Recorded performances
//!
//! A performance is one performer's capture: a fixed-rate sequence of frames,
//! each holding the head, left hand and right hand pose. Raw frames store each
//! joint as `[x, y, z, qx, qy, qz, qw]`.

use nalgebra::Quaternion;

use crate::foundation::math::{Quat, Vec3};
use crate::playback::{LoadError, LoadResult};

/// One raw frame: head, left hand, right hand
pub type RawFrame = [[f32; 7]; 3];

/// Raw recording of a room: performers, then frames
pub type RawPerformances = Vec<Vec<RawFrame>>;

/// Position and orientation of one joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    /// Position in room space
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
}

impl JointPose {
    /// Decode `[x, y, z, qx, qy, qz, qw]`
    ///
    /// A zero quaternion decodes to identity instead of NaN.
    pub fn from_raw(raw: &[f32; 7]) -> Self {
        let [x, y, z, qx, qy, qz, qw] = *raw;
        let rotation = Quat::try_new(Quaternion::new(qw, qx, qy, qz), f32::EPSILON)
            .unwrap_or_else(Quat::identity);
        Self {
            position: Vec3::new(x, y, z),
            rotation,
        }
    }
}

/// Decoded frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseFrame {
    /// Head pose
    pub head: JointPose,
    /// Left hand pose
    pub left_hand: JointPose,
    /// Right hand pose
    pub right_hand: JointPose,
}

impl PoseFrame {
    fn from_raw(raw: &RawFrame) -> Self {
        Self {
            head: JointPose::from_raw(&raw[0]),
            left_hand: JointPose::from_raw(&raw[1]),
            right_hand: JointPose::from_raw(&raw[2]),
        }
    }
}

/// Frame index for a time: `floor(seconds * sample_rate) mod frame_count`
///
/// Always in range, for any time. Returns 0 for an empty performance.
pub fn frame_index(seconds: f64, sample_rate: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let number = (seconds * sample_rate).floor() as i64;
    number.rem_euclid(frame_count as i64) as usize
}

/// One performer's immutable recording
#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    frames: Vec<PoseFrame>,
}

impl Performance {
    /// Decode a performer's raw frames; `index` names the performer in errors
    pub fn from_raw(index: usize, frames: &[RawFrame]) -> LoadResult<Self> {
        if frames.is_empty() {
            return Err(LoadError::EmptyPerformance { index });
        }
        Ok(Self {
            frames: frames.iter().map(PoseFrame::from_raw).collect(),
        })
    }

    /// Decode a whole room recording
    pub fn from_raw_set(raw: &RawPerformances) -> LoadResult<Vec<Self>> {
        raw.iter()
            .enumerate()
            .map(|(index, frames)| Self::from_raw(index, frames))
            .collect()
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frame shown at `seconds` into the recording
    pub fn frame_at(&self, seconds: f64, sample_rate: f64) -> &PoseFrame {
        &self.frames[frame_index(seconds, sample_rate, self.frames.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw_frame(z: f32) -> RawFrame {
        [
            [0.0, 1.6, z, 0.0, 0.0, 0.0, 1.0],
            [-0.3, 1.2, z, 0.0, 0.0, 0.0, 1.0],
            [0.3, 1.2, z, 0.0, 0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn test_frame_index_wraps_for_any_time() {
        assert_eq!(frame_index(0.0, 90.0, 100), 0);
        assert_eq!(frame_index(1.0, 90.0, 100), 90);
        assert_eq!(frame_index(2.0, 90.0, 100), 80);
        assert_eq!(frame_index(1.0e6, 90.0, 7), (90_000_000_i64 % 7) as usize);
        assert_eq!(frame_index(5.0, 90.0, 0), 0);
    }

    #[test]
    fn test_negative_times_wrap() {
        let performance = Performance::from_raw(0, &[raw_frame(0.0), raw_frame(1.0)]).unwrap();
        // -0.01 s at 90 Hz floors to frame -1, the last frame
        assert_relative_eq!(performance.frame_at(-0.01, 90.0).head.position.z, 1.0);
    }

    #[test]
    fn test_decode_joint() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let joint = JointPose::from_raw(&[1.0, 2.0, 3.0, 0.0, half, 0.0, half]);
        assert_eq!(joint.position, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(joint.rotation.angle(), std::f32::consts::FRAC_PI_2, epsilon = 1e-5);

        let degenerate = JointPose::from_raw(&[0.0; 7]);
        assert_eq!(degenerate.rotation, Quat::identity());
    }

    #[test]
    fn test_empty_performance_rejected() {
        let raw: RawPerformances = vec![vec![raw_frame(0.0)], vec![]];
        assert!(matches!(
            Performance::from_raw_set(&raw),
            Err(LoadError::EmptyPerformance { index: 1 })
        ));
    }

    #[test]
    fn test_frame_at_uses_sample_rate() {
        let frames: Vec<_> = (0..10).map(|i| raw_frame(i as f32)).collect();
        let performance = Performance::from_raw(0, &frames).unwrap();
        // 0.05s at 90Hz is frame 4
        assert_relative_eq!(performance.frame_at(0.05, 90.0).head.position.z, 4.0);
    }
}
