//! Spatial layout of the rooms

use crate::config::LayoutConfig;
use crate::foundation::math::Vec3;

/// Pure spatial lookup along the playlist
pub trait RoomLayout {
    /// Point on the path at a progress fraction (wraps outside 0..1)
    fn position(&self, progress: f64) -> Vec3;

    /// Whether a room index is odd in this layout
    fn is_odd(&self, index: usize) -> bool {
        index % 2 == 1
    }
}

/// Rooms in a straight corridor along +Z
#[derive(Debug, Clone, PartialEq)]
pub struct LinearLayout {
    room_count: usize,
    room_depth: f32,
    room_offset: f32,
}

impl LinearLayout {
    /// Corridor of `room_count` rooms sized by the layout config
    pub fn new(config: &LayoutConfig, room_count: usize) -> Self {
        Self {
            room_count,
            room_depth: config.room_depth,
            room_offset: config.room_offset,
        }
    }

    /// Corridor length from the first room's front to the last room's back
    pub fn length(&self) -> f32 {
        self.room_count as f32 * (self.room_depth + 0.001)
    }
}

impl RoomLayout for LinearLayout {
    fn position(&self, progress: f64) -> Vec3 {
        let t = progress.rem_euclid(1.0) as f32;
        Vec3::new(0.0, 0.0, self.room_offset + t * self.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_position_wraps_progress() {
        let layout = LinearLayout::new(&LayoutConfig::default(), 4);
        let start = layout.position(0.0);
        assert_relative_eq!(start.z, 2.0);
        assert_relative_eq!(layout.position(1.25), layout.position(0.25), epsilon = 1e-5);
        assert_relative_eq!(layout.position(0.5).z, 2.0 + 2.0 * 5.401, epsilon = 1e-4);
    }

    #[test]
    fn test_default_parity() {
        let layout = LinearLayout::new(&LayoutConfig::default(), 2);
        assert!(!layout.is_odd(0));
        assert!(layout.is_odd(1));
    }
}
