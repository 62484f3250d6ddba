//! Playlist driver
//!
//! Maps the shared audio clock onto every room, once per tick. Each update is
//! a pure function of the absolute audio time.

use crate::config::{PlaybackConfig, PlaylistConfig};
use crate::foundation::math::utils::ease_out;
use crate::playback::loader::{CancellationToken, LoadJob};
use crate::playback::tick::{TickContext, TickSubscriber};
use crate::playback::{AudioClock, Orb, Performance, Room, RoomLayout, RoomTiming};
use crate::render::{RenderResult, SceneResources};

/// Ease motion to a stop over the last slowdown window of the track
///
/// Linear up to `max_time`, then `max_time + ease_out(f) * window` where `f`
/// is the fraction of the window elapsed, saturating at 1.
pub fn slowdown(time: f64, playback: &PlaybackConfig) -> f64 {
    let max_time = playback.max_time();
    if time <= max_time {
        return time;
    }
    let window = playback.slowdown_duration;
    let fraction = (time - max_time).min(window) / window;
    max_time + ease_out(fraction) * window
}

/// Time handed to a room: eased audio time plus `phase_shift` loops, folded
/// into the two-loop period
pub fn room_clock_time(audio: &AudioClock, phase_shift: f64, playback: &PlaybackConfig) -> f64 {
    let period = audio.loop_duration * 2.0;
    (slowdown(audio.time, playback) + phase_shift * audio.loop_duration).rem_euclid(period)
}

/// Rooms of one recording session plus the orb, driven by the audio clock
#[derive(Debug)]
pub struct Playlist<L: RoomLayout> {
    rooms: Vec<Room>,
    orb: Orb,
    layout: L,
    playback: PlaybackConfig,
    timing: RoomTiming,
    hole_height: f32,
    token: CancellationToken,
}

impl<L: RoomLayout> Playlist<L> {
    /// Create one room per recording identifier and park the orb at the start
    pub fn new<I, S>(
        ids: I,
        layout: L,
        config: &PlaylistConfig,
        resources: &mut SceneResources,
    ) -> RenderResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rooms = ids
            .into_iter()
            .map(|id| Room::new(id, resources, &config.layout))
            .collect::<RenderResult<Vec<_>>>()?;

        let mut orb = Orb::new();
        orb.move_to(&layout, 0.0, config.layout.hole_height);

        log::info!("Playlist created with {} rooms", rooms.len());
        Ok(Self {
            rooms,
            orb,
            layout,
            playback: config.playback.clone(),
            timing: RoomTiming::from_config(&config.playback, &config.layout),
            hole_height: config.layout.hole_height,
            token: CancellationToken::new(),
        })
    }

    /// Advance every room to the audio clock
    ///
    /// Skipped entirely during a transition or after destruction. The orb
    /// moves first; rooms wait until the audio reports a loop duration.
    pub fn update(
        &mut self,
        audio: &AudioClock,
        resources: &mut SceneResources,
        in_transition: bool,
    ) -> RenderResult<()> {
        if in_transition || self.is_destroyed() {
            return Ok(());
        }

        let progress = if audio.progress.is_finite() { audio.progress } else { 0.0 };
        self.orb.move_to(&self.layout, progress, self.hole_height);

        if !audio.is_ready() {
            return Ok(());
        }

        for room in &self.rooms {
            let phase_shift = if self.layout.is_odd(room.index()) { 0.0 } else { 1.0 };
            let time = room_clock_time(audio, phase_shift, &self.playback);
            room.goto_time(time, &self.timing, resources)?;
        }
        log::trace!("Playlist at t={:.3}s", audio.time);
        Ok(())
    }

    /// One load job for each room still waiting for its performances
    pub fn load_jobs(&self) -> Vec<LoadJob> {
        self.rooms
            .iter()
            .filter(|room| !room.is_loaded())
            .map(|room| LoadJob {
                room_index: room.index(),
                id: room.id().to_string(),
            })
            .collect()
    }

    /// Hand loaded performances to a room; false if no room has that index
    /// or the playlist is gone
    pub fn set_room_performances(&mut self, room_index: usize, performances: Vec<Performance>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.rooms.iter_mut().find(|room| room.index() == room_index) {
            Some(room) => {
                room.set_performances(performances);
                true
            }
            None => {
                log::warn!("No room with index {} in playlist", room_index);
                false
            }
        }
    }

    /// Token that loads issued for this playlist observe
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether [`Playlist::destroy`] ran
    pub fn is_destroyed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel pending loads, remove the orb and release every room
    pub fn destroy(&mut self, resources: &mut SceneResources) {
        if self.is_destroyed() {
            return;
        }
        self.token.cancel();
        self.orb.destroy();
        for room in &mut self.rooms {
            room.destroy(resources);
        }
        log::info!("Playlist destroyed");
    }

    /// Rooms in playlist order
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Number of rooms whose performances arrived
    pub fn loaded_count(&self) -> usize {
        self.rooms.iter().filter(|room| room.is_loaded()).count()
    }

    /// Position marker
    pub fn orb(&self) -> &Orb {
        &self.orb
    }

    /// Position marker, for show/hide
    pub fn orb_mut(&mut self) -> &mut Orb {
        &mut self.orb
    }

    /// Spatial layout
    pub fn layout(&self) -> &L {
        &self.layout
    }
}

impl<L: RoomLayout> TickSubscriber for Playlist<L> {
    fn tick(&mut self, ctx: &mut TickContext<'_>) {
        if let Err(e) = self.update(&ctx.audio, ctx.resources, ctx.in_transition) {
            log::error!("Playlist update failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{LinearLayout, RawFrame};
    use approx::assert_relative_eq;

    fn playback() -> PlaybackConfig {
        PlaybackConfig::default()
    }

    fn config() -> PlaylistConfig {
        let mut config = PlaylistConfig::default();
        config.playback.room_time_scale = 1.0;
        config.playback.performers_per_room = 1;
        config
    }

    fn recording() -> Vec<Performance> {
        // Head z encodes the frame number
        let frames: Vec<RawFrame> = (0..3600)
            .map(|i| {
                let z = i as f32;
                [
                    [0.0, 1.6, z, 0.0, 0.0, 0.0, 1.0],
                    [-0.3, 1.2, z, 0.0, 0.0, 0.0, 1.0],
                    [0.3, 1.2, z, 0.0, 0.0, 0.0, 1.0],
                ]
            })
            .collect();
        vec![Performance::from_raw(0, &frames).unwrap()]
    }

    fn playlist(rooms: usize) -> (SceneResources, Playlist<LinearLayout>) {
        let config = config();
        let mut resources = SceneResources::allocate(rooms, 1, &config.costume_palette);
        let layout = LinearLayout::new(&config.layout, rooms);
        let ids: Vec<String> = (0..rooms).map(|i| format!("rec-{}", i)).collect();
        let playlist = Playlist::new(ids, layout, &config, &mut resources).unwrap();
        (resources, playlist)
    }

    #[test]
    fn test_adjacent_rooms_differ_by_one_loop() {
        let audio = AudioClock::new(10.0, 0.3, 20.0);
        assert_relative_eq!(room_clock_time(&audio, 1.0, &playback()), 30.0);
        assert_relative_eq!(room_clock_time(&audio, 0.0, &playback()), 10.0);

        for t in [0.0, 7.5, 39.9, 123.4, 216.7] {
            let audio = AudioClock::new(t, 0.0, 20.0);
            let even = room_clock_time(&audio, 1.0, &playback());
            let odd = room_clock_time(&audio, 0.0, &playback());
            assert_relative_eq!((even - odd).rem_euclid(40.0), 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_slowdown_scenario() {
        assert_relative_eq!(slowdown(216.7, &playback()), 216.7611, epsilon = 1e-3);
        assert_relative_eq!(slowdown(100.0, &playback()), 100.0);
    }

    #[test]
    fn test_slowdown_is_continuous_and_stops_at_track_end() {
        let playback = playback();
        let max_time = playback.max_time();
        assert_relative_eq!(slowdown(max_time, &playback), max_time);
        assert_relative_eq!(slowdown(max_time + 1e-9, &playback), max_time, epsilon = 1e-6);

        let end = max_time + playback.slowdown_duration;
        assert_relative_eq!(slowdown(end, &playback), end, epsilon = 1e-12);
        assert_relative_eq!(slowdown(end + 30.0, &playback), end, epsilon = 1e-12);
    }

    #[test]
    fn test_update_drives_rooms_with_phase_offsets() {
        let (mut resources, mut playlist) = playlist(2);
        for job in playlist.load_jobs() {
            assert!(playlist.set_room_performances(job.room_index, recording()));
        }
        assert!(playlist.load_jobs().is_empty());

        let audio = AudioClock::new(10.0, 0.3, 20.0);
        playlist.update(&audio, &mut resources, false).unwrap();

        // Room 0: playlist shift + room shift = 10 + 20 + 20 -> 50 mod 40 = 10 s
        let head0 = resources.heads().transform_at(0).unwrap();
        assert_relative_eq!(head0.position.z, 900.0, epsilon = 1e-3);

        // Room 1: 10 s, no shift, plus the room's z offset
        let head1 = resources.heads().transform_at(1).unwrap();
        assert_relative_eq!(head1.position.z, 900.0 + 5.401, epsilon = 1e-3);
    }

    #[test]
    fn test_update_waits_for_audio() {
        let (mut resources, mut playlist) = playlist(1);
        playlist.set_room_performances(0, recording());
        resources.heads_mut().take_dirty();

        playlist
            .update(&AudioClock::new(5.0, 0.5, 0.0), &mut resources, false)
            .unwrap();

        assert!(resources.heads().dirty().is_empty());
        // The orb still moves
        let expected = playlist.layout().position(1.0);
        assert_relative_eq!(playlist.orb().position().z, -expected.z);
    }

    #[test]
    fn test_transition_skips_everything() {
        let (mut resources, mut playlist) = playlist(1);
        playlist.set_room_performances(0, recording());
        resources.heads_mut().take_dirty();
        let orb_before = playlist.orb().position();

        playlist
            .update(&AudioClock::new(5.0, 0.25, 20.0), &mut resources, true)
            .unwrap();

        assert!(resources.heads().dirty().is_empty());
        assert_eq!(playlist.orb().position(), orb_before);
    }

    #[test]
    fn test_destroy_cancels_and_releases() {
        let (mut resources, mut playlist) = playlist(2);
        let token = playlist.cancellation_token();
        playlist.set_room_performances(0, recording());

        playlist.destroy(&mut resources);

        assert!(token.is_cancelled());
        assert!(!playlist.orb().is_visible());
        assert!(!playlist.set_room_performances(1, recording()));
        assert_eq!(playlist.loaded_count(), 0);
    }
}
