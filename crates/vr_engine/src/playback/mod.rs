//! # Room Playback
//!
//! Maps a shared audio clock onto the recorded poses of every room, every
//! frame. Each tick is a pure function of the absolute audio time, so dropped
//! frames never cause drift.
//!
//! ## Architecture
//!
//! ```text
//! AudioClock ──► TickDispatcher ──► Playlist::update ──► Orb
//!                      │                    └──────────► Room::goto_time ──► SceneResources
//!                      └──► AudioTimeline
//!
//! PlaylistLoader (worker threads) ──► LoadEvent channel ──► Playlist rooms
//! ```

pub mod performance;
pub mod clock;
pub mod layout;
pub mod room;
pub mod orb;
pub mod playlist;
pub mod loader;
pub mod tick;
pub mod timeline;

pub use performance::{Performance, PoseFrame, JointPose, RawFrame, RawPerformances, frame_index};
pub use clock::{AudioClock, SimulatedAudio};
pub use layout::{RoomLayout, LinearLayout};
pub use room::{Room, RoomTiming, room_position};
pub use orb::Orb;
pub use playlist::{Playlist, slowdown, room_clock_time};
pub use loader::{
    PerformanceStorage, MemoryStorage, RonFileStorage, CancellationToken, LoadJob, LoadEvent,
    LoadSummary, PlaylistLoader,
};
pub use tick::{TickSubscriber, TickContext, TickDispatcher, TickHandle};
pub use timeline::{Keyframe, Timeline, TimelineSource, AudioTimeline};

/// Performance loading errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The playlist was destroyed; never shown to the user
    #[error("playlist destroyed")]
    Cancelled,

    /// Reading a recording failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A recording could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A performer has no frames
    #[error("Performance {index} has no frames")]
    EmptyPerformance {
        /// Performer index within the recording
        index: usize,
    },

    /// No recording exists for an identifier
    #[error("Recording not found: {0}")]
    NotFound(String),
}

impl LoadError {
    /// Whether this is the destruction sentinel rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for loading
pub type LoadResult<T> = Result<T, LoadError>;
