//! Configuration sections for the playlist, its layout and the stereo presenter

use serde::{Serialize, Deserialize};

use super::{Config, ConfigError};

/// # Playlist Configuration
///
/// Top-level configuration consumed by the composition root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Fallback log level when `RUST_LOG` is not set
    pub log_level: String,
    /// Costume colours (RGBA) cycled by room index
    pub costume_palette: Vec<[f32; 4]>,
    /// Playback driver settings
    pub playback: PlaybackConfig,
    /// Spatial layout of the rooms
    pub layout: LayoutConfig,
    /// Stereo presenter settings
    pub stereo: StereoConfig,
    /// Display capability probing
    pub probe: ProbeConfig,
}

impl Config for PlaylistConfig {}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            costume_palette: vec![
                [0.98, 0.36, 0.36, 1.0],
                [0.36, 0.71, 0.98, 1.0],
                [0.99, 0.82, 0.31, 1.0],
                [0.47, 0.89, 0.56, 1.0],
                [0.80, 0.52, 0.98, 1.0],
            ],
            playback: PlaybackConfig::default(),
            layout: LayoutConfig::default(),
            stereo: StereoConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl PlaylistConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.playback.validate()?;
        self.layout.validate()?;
        self.stereo.validate()?;
        if self.costume_palette.is_empty() {
            return Err(ConfigError::Invalid("costume palette cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Costume colour for a room, cycling through the palette
    pub fn costume_color(&self, room_index: usize) -> [f32; 4] {
        if self.costume_palette.is_empty() {
            return [1.0, 1.0, 1.0, 1.0];
        }
        self.costume_palette[room_index % self.costume_palette.len()]
    }
}

/// # Playback Configuration
///
/// Timing constants of the recorded performances and the authored audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Capture rate of the recorded performances in Hz
    pub sample_rate: f64,
    /// Length of the authored audio track in seconds
    pub track_length: f64,
    /// Length of the ease-out window at the end of the track in seconds
    pub slowdown_duration: f64,
    /// Length of one recorded loop inside a room, in seconds
    pub loop_seconds: f64,
    /// Factor a room applies to the time it is handed (milliseconds to seconds)
    pub room_time_scale: f64,
    /// Uniform mesh scale used while the orthographic room model is active
    pub orthographic_scale: f32,
    /// Instance slots reserved per room for performers
    pub performers_per_room: usize,
    /// Maximum number of rooms loading at the same time
    pub load_concurrency: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 90.0,
            track_length: 216.824_266,
            slowdown_duration: 0.4,
            loop_seconds: 20.0,
            room_time_scale: 0.001,
            orthographic_scale: 1.3,
            performers_per_room: 100,
            load_concurrency: 4,
        }
    }
}

impl PlaybackConfig {
    /// Time after which motion starts easing out to a stop
    pub fn max_time(&self) -> f64 {
        self.track_length - self.slowdown_duration * 0.5
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate <= 0.0 {
            return Err(ConfigError::Invalid("sample rate must be positive".to_string()));
        }
        if self.slowdown_duration <= 0.0 {
            return Err(ConfigError::Invalid("slowdown duration must be positive".to_string()));
        }
        if self.loop_seconds <= 0.0 {
            return Err(ConfigError::Invalid("loop seconds must be positive".to_string()));
        }
        if self.performers_per_room == 0 {
            return Err(ConfigError::Invalid("performers per room must be at least 1".to_string()));
        }
        if self.load_concurrency == 0 {
            return Err(ConfigError::Invalid("load concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// # Layout Configuration
///
/// Room dimensions along the corridor the camera floats through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Maximum number of rooms in a playlist
    pub max_rooms: usize,
    /// Room height in meters
    pub room_height: f32,
    /// Room depth in meters
    pub room_depth: f32,
    /// Z offset of the first room
    pub room_offset: f32,
    /// Height of the orb above the layout path
    pub hole_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_rooms: 20,
            room_height: 4.0,
            room_depth: 5.4,
            room_offset: 2.0,
            hole_height: 1.0,
        }
    }
}

impl LayoutConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rooms == 0 {
            return Err(ConfigError::Invalid("max rooms must be at least 1".to_string()));
        }
        if self.room_depth <= 0.0 || self.room_height <= 0.0 {
            return Err(ConfigError::Invalid("room dimensions must be positive".to_string()));
        }
        Ok(())
    }
}

/// # Stereo Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    /// Inset in pixels applied to each eye's scissor when drawing to the canvas
    pub black_border_px: u32,
    /// Left eye bounds `[x, y, width, height]` used when the display reports none
    pub default_left_bounds: [f32; 4],
    /// Right eye bounds `[x, y, width, height]` used when the display reports none
    pub default_right_bounds: [f32; 4],
    /// Run the stencil pre-pass when a mask scene is set
    pub use_stencil: bool,
    /// Submit to the display at the end of each stereo render
    pub auto_submit_frame: bool,
    /// Initial resolution ratio (clamped into [0, 1])
    pub resolution_ratio: f64,
    /// Build field-of-view projections with the right-handed convention
    pub right_handed: bool,
    /// Near clip used when a camera does not supply one
    pub default_near: f32,
    /// Far clip used when a camera does not supply one
    pub default_far: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            black_border_px: 50,
            default_left_bounds: [0.0, 0.0, 0.5, 1.0],
            default_right_bounds: [0.5, 0.0, 0.5, 1.0],
            use_stencil: true,
            auto_submit_frame: true,
            resolution_ratio: 1.0,
            right_handed: true,
            default_near: 0.01,
            default_far: 10_000.0,
        }
    }
}

impl StereoConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bounds in [&self.default_left_bounds, &self.default_right_bounds] {
            if bounds.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(ConfigError::Invalid(format!(
                    "eye bounds must be normalized, got {:?}",
                    bounds
                )));
            }
        }
        if self.default_near <= 0.0 || self.default_far <= self.default_near {
            return Err(ConfigError::Invalid("depth range must satisfy 0 < near < far".to_string()));
        }
        Ok(())
    }
}

/// # Probe Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// How long to wait for display enumeration on platforms where it may hang
    pub display_timeout_ms: u64,
    /// Force the timeout on every platform, not only the affected ones
    pub always_apply_timeout: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            display_timeout_ms: 2000,
            always_apply_timeout: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlaylistConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.playback.max_time(), 216.624_266, epsilon = 1e-9);
        assert_eq!(config.stereo.black_border_px, 50);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PlaylistConfig = toml::from_str(
            r#"
            log_level = "debug"

            [playback]
            loop_seconds = 12.5
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.log_level, "debug");
        assert_relative_eq!(config.playback.loop_seconds, 12.5);
        assert_relative_eq!(config.playback.sample_rate, 90.0);
        assert_eq!(config.layout.max_rooms, 20);
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut config = PlaylistConfig::default();
        config.stereo.use_stencil = false;
        let text = ron::ser::to_string(&config).expect("serialize");
        let parsed: PlaylistConfig = ron::from_str(&text).expect("parse");
        assert!(!parsed.stereo.use_stencil);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PlaylistConfig::default();
        config.playback.sample_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PlaylistConfig::default();
        config.stereo.default_left_bounds = [0.0, 0.0, 1.5, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_costume_color_cycles() {
        let config = PlaylistConfig::default();
        let n = config.costume_palette.len();
        assert_eq!(config.costume_color(0), config.costume_color(n));
    }
}
