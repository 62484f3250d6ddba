//! Audio clock
//!
//! The playback driver only reads the clock. [`SimulatedAudio`] stands in for
//! the audio collaborator in tests and the headless demo.

use std::time::Duration;

/// Snapshot of the audio position, taken once per tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioClock {
    /// Seconds into the track
    pub time: f64,
    /// Fraction of the track played, 0..1
    pub progress: f64,
    /// Length of one musical loop in seconds; 0 until the audio is ready
    pub loop_duration: f64,
}

impl AudioClock {
    /// Create a clock snapshot
    pub fn new(time: f64, progress: f64, loop_duration: f64) -> Self {
        Self {
            time,
            progress,
            loop_duration,
        }
    }

    /// Whether the audio has reported a loop duration yet
    pub fn is_ready(&self) -> bool {
        self.loop_duration > 0.0
    }
}

/// Audio track that advances when told to
///
/// Time keeps running past the end of the track so playback can ease out.
#[derive(Debug, Clone)]
pub struct SimulatedAudio {
    track_length: f64,
    loop_duration: f64,
    elapsed: f64,
    playing: bool,
}

impl SimulatedAudio {
    /// Track of `track_length` seconds built from loops of `loop_duration` seconds
    pub fn new(track_length: f64, loop_duration: f64) -> Self {
        Self {
            track_length,
            loop_duration,
            elapsed: 0.0,
            playing: false,
        }
    }

    /// Start or resume playback
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Whether the track is playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Jump to a time in seconds
    pub fn seek(&mut self, seconds: f64) {
        self.elapsed = seconds.max(0.0);
    }

    /// Advance by one frame's worth of time while playing
    pub fn advance(&mut self, delta: Duration) {
        if self.playing {
            self.elapsed += delta.as_secs_f64();
        }
    }

    /// Current snapshot; the loop duration reads 0 until playback starts
    pub fn clock(&self) -> AudioClock {
        let started = self.playing || self.elapsed > 0.0;
        AudioClock {
            time: self.elapsed,
            progress: if self.track_length > 0.0 {
                (self.elapsed / self.track_length).min(1.0)
            } else {
                0.0
            },
            loop_duration: if started { self.loop_duration } else { 0.0 },
        }
    }
}
