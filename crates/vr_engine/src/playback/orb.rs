//! Playlist position marker

use crate::foundation::math::Vec3;
use crate::playback::RoomLayout;

/// Marker floating through the rooms as the track plays
#[derive(Debug, Clone, PartialEq)]
pub struct Orb {
    position: Vec3,
    visible: bool,
    destroyed: bool,
}

impl Default for Orb {
    fn default() -> Self {
        Self::new()
    }
}

impl Orb {
    /// Hidden orb at the origin
    pub fn new() -> Self {
        Self {
            position: Vec3::zeros(),
            visible: false,
            destroyed: false,
        }
    }

    /// Current position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Place the orb half a playlist ahead of `progress`, raised by `hole_height`
    /// and mirrored along Z
    pub fn move_to<L: RoomLayout + ?Sized>(&mut self, layout: &L, progress: f64, hole_height: f32) {
        if self.destroyed {
            return;
        }
        let mut position = layout.position(progress + 0.5);
        position.y += hole_height;
        position.z = -position.z;
        self.position = position;
    }

    /// Whether the orb is drawn
    pub fn is_visible(&self) -> bool {
        self.visible && !self.destroyed
    }

    /// Show the orb
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Hide the orb
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Remove the orb for good
    pub fn destroy(&mut self) {
        self.visible = false;
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::playback::LinearLayout;
    use approx::assert_relative_eq;

    #[test]
    fn test_orb_follows_layout() {
        let layout = LinearLayout::new(&LayoutConfig::default(), 4);
        let mut orb = Orb::new();
        orb.move_to(&layout, 0.0, 1.0);

        let expected = layout.position(0.5);
        assert_relative_eq!(orb.position(), Vec3::new(expected.x, expected.y + 1.0, -expected.z));
    }

    #[test]
    fn test_hidden_orb_keeps_moving() {
        let layout = LinearLayout::new(&LayoutConfig::default(), 4);
        let mut orb = Orb::new();
        assert!(!orb.is_visible());
        orb.show();
        orb.hide();
        assert!(!orb.is_visible());

        orb.move_to(&layout, 0.25, 0.0);
        assert_relative_eq!(orb.position().z, -layout.position(0.75).z);
        orb.show();
        assert!(orb.is_visible());
    }

    #[test]
    fn test_destroyed_orb_stays_put() {
        let layout = LinearLayout::new(&LayoutConfig::default(), 4);
        let mut orb = Orb::new();
        orb.show();
        assert!(orb.is_visible());

        orb.destroy();
        orb.move_to(&layout, 0.3, 1.0);
        assert_eq!(orb.position(), Vec3::zeros());
        orb.show();
        assert!(!orb.is_visible());
    }
}
