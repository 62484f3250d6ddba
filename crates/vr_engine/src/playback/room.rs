//! Rooms
//!
//! A room owns its performances and a reserved slice of the shared instance
//! pools. It never touches slots outside that slice.

use crate::config::{LayoutConfig, PlaybackConfig};
use crate::foundation::math::Vec3;
use crate::playback::{JointPose, Performance};
use crate::render::{InstancedMesh, RenderResult, RoomSlots, SceneResources};

/// Timing and placement constants shared by every room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomTiming {
    /// Length of one recorded loop in seconds
    pub loop_seconds: f64,
    /// Factor applied to the time a room is handed
    pub time_scale: f64,
    /// Capture rate of the recordings
    pub sample_rate: f64,
    /// Mesh scale while the orthographic model is active
    pub orthographic_scale: f32,
    /// Z offset of the first room
    pub room_offset: f32,
}

impl RoomTiming {
    /// Collect the constants from configuration
    pub fn from_config(playback: &PlaybackConfig, layout: &LayoutConfig) -> Self {
        Self {
            loop_seconds: playback.loop_seconds,
            time_scale: playback.room_time_scale,
            sample_rate: playback.sample_rate,
            orthographic_scale: playback.orthographic_scale,
            room_offset: layout.room_offset,
        }
    }

    /// Recording time a room shows for a handed-in time, in `[0, 2 * loop)`
    ///
    /// Even rooms run half a two-loop period ahead of odd rooms, so a viewer
    /// entering any room lands inside a recording.
    pub fn room_seconds(&self, room_index: usize, time: f64) -> f64 {
        let mut seconds = time * self.time_scale;
        if room_index % 2 == 0 {
            seconds += self.loop_seconds;
        }
        seconds.rem_euclid(self.loop_seconds * 2.0)
    }
}

/// Centre of a room along the corridor
pub fn room_position(index: usize, layout: &LayoutConfig) -> Vec3 {
    Vec3::new(
        0.0,
        layout.room_height * 0.5,
        layout.room_offset + index as f32 * (layout.room_depth + 0.001),
    )
}

/// One room of the playlist
#[derive(Debug)]
pub struct Room {
    index: usize,
    id: String,
    position: Vec3,
    slots: RoomSlots,
    performances: Option<Vec<Performance>>,
}

impl Room {
    /// Reserve the next room slice and place the room shell
    pub fn new(
        id: impl Into<String>,
        resources: &mut SceneResources,
        layout: &LayoutConfig,
    ) -> RenderResult<Self> {
        let slots = resources.reserve_room()?;
        let index = slots.room_index;
        let position = room_position(index, layout);
        resources.set_room_position(index, position)?;

        let id = id.into();
        log::debug!("Room {} '{}' at z={:.3}", index, id, position.z);
        Ok(Self {
            index,
            id,
            position,
            slots,
            performances: None,
        })
    }

    /// Stable room index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Recording identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Room centre
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Reserved instance slots
    pub fn slots(&self) -> &RoomSlots {
        &self.slots
    }

    /// Whether performances have arrived
    pub fn is_loaded(&self) -> bool {
        self.performances.is_some()
    }

    /// Loaded performances
    pub fn performances(&self) -> Option<&[Performance]> {
        self.performances.as_deref()
    }

    /// Install loaded performances, dropping performers beyond the slot capacity
    pub fn set_performances(&mut self, mut performances: Vec<Performance>) {
        let capacity = self.slots.performer_capacity();
        if performances.len() > capacity {
            log::warn!(
                "Room {} has {} performers, only {} fit",
                self.index,
                performances.len(),
                capacity
            );
            performances.truncate(capacity);
        }
        log::debug!("Room {} loaded {} performances", self.index, performances.len());
        self.performances = Some(performances);
    }

    /// Pose every performer for a time
    ///
    /// Does nothing until the performances are loaded.
    pub fn goto_time(
        &self,
        time: f64,
        timing: &RoomTiming,
        resources: &mut SceneResources,
    ) -> RenderResult<()> {
        let seconds = timing.room_seconds(self.index, time);

        let Some(performances) = &self.performances else {
            return Ok(());
        };

        let scale = if resources.is_orthographic() {
            timing.orthographic_scale
        } else {
            1.0
        };
        let z_shift = self.position.z - timing.room_offset;

        for (performer, performance) in performances.iter().enumerate() {
            let (Some(head), Some((left, right))) =
                (self.slots.head_slot(performer), self.slots.hand_slots(performer))
            else {
                break;
            };
            let frame = performance.frame_at(seconds, timing.sample_rate);
            write_joint(resources.heads_mut(), head, &frame.head, z_shift, scale)?;
            let hands = resources.hands_mut();
            write_joint(hands, left, &frame.left_hand, z_shift, scale)?;
            write_joint(hands, right, &frame.right_hand, z_shift, scale)?;
        }
        Ok(())
    }

    /// Release the room's slots and drop its performances
    pub fn destroy(&mut self, resources: &mut SceneResources) {
        if let Err(e) = resources.release_room(&self.slots) {
            log::warn!("Room {} released with errors: {}", self.index, e);
        }
        self.performances = None;
    }
}

fn write_joint(
    mesh: &mut InstancedMesh,
    slot: usize,
    joint: &JointPose,
    z_shift: f32,
    scale: f32,
) -> RenderResult<()> {
    let position = joint.position + Vec3::new(0.0, 0.0, z_shift);
    mesh.set_quaternion_at(slot, joint.rotation)?;
    mesh.set_position_at(slot, position)?;
    mesh.set_scale_at(slot, Vec3::new(scale, scale, scale))
}
