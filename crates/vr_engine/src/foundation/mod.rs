//! Shared building blocks for the stereo and playback layers
//!
//! [`math`] holds the nalgebra aliases, eye/projection helpers and easing
//! used by the presenter and the room clock. [`logging`] wires `log` to
//! `env_logger` with a configurable fallback level.

pub mod math;
pub mod logging;
