//! # VR Engine
//!
//! Stereo presentation and audio-synchronized room playback for VR
//! performance playlists.
//!
//! ## Features
//!
//! - **Stereo Presentation**: split-eye projection, eye-buffer sizing and
//!   presentation lifecycle on top of any [`render::SceneRenderer`]
//! - **Room Playback**: drift-free mapping of an audio clock onto recorded
//!   head and hand poses in shared instance pools
//! - **Background Loading**: cancellable, bounded-concurrency recording loads
//! - **Capability Probing**: display enumeration with a timeout for platforms
//!   that never answer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vr_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlaylistConfig::default();
//!     let mut resources = SceneResources::allocate(
//!         config.layout.max_rooms,
//!         config.playback.performers_per_room,
//!         &config.costume_palette,
//!     );
//!     let layout = LinearLayout::new(&config.layout, 2);
//!     let mut playlist = Playlist::new(["take-1", "take-2"], layout, &config, &mut resources)?;
//!
//!     let audio = AudioClock::new(10.0, 0.05, 20.0);
//!     playlist.update(&audio, &mut resources, false)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod foundation;
pub mod config;
pub mod render;
pub mod stereo;
pub mod playback;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PlaylistConfig},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        playback::{
            AudioClock, AudioTimeline, CancellationToken, Keyframe, LinearLayout, LoadError,
            Performance, PerformanceStorage, Playlist, PlaylistLoader, RoomLayout, TickDispatcher,
            TickSubscriber, Timeline, TimelineSource,
        },
        render::{
            Camera, RenderCamera, RenderError, RenderTarget, SceneGraph, SceneRenderer,
            SceneResources,
        },
        stereo::{
            Capabilities, DisplayError, DisplayProvider, StereoPresenter, VrDisplay,
        },
    };
}
