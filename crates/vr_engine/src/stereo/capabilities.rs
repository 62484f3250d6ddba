//! Platform and display capability probing
//!
//! Runs once at startup, outside the frame loop. Every failure degrades to
//! "no VR" with a warning; nothing here returns an error.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{after, bounded, select};

use crate::config::ProbeConfig;
use crate::stereo::{DisplayCapabilities, DisplayError, DisplayInfo, DisplayProvider, DisplayResult};

/// Facts derived from the user agent string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformInfo {
    /// Phone or tablet
    pub mobile: bool,
    /// Tablet (Android without "mobile", or iPad)
    pub tablet: bool,
    /// Android device
    pub android: bool,
    /// Chrome browser
    pub chrome: bool,
}

impl PlatformInfo {
    /// Classify a user agent string
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let android = ua.contains("android");
        let mobile = ["android", "ipad", "iphone", "iemobile"]
            .iter()
            .any(|needle| ua.contains(needle));
        let tablet = (android && !ua.contains("mobile")) || ua.contains("ipad");
        Self {
            mobile,
            tablet,
            android,
            chrome: ua.contains("chrome"),
        }
    }

    /// Whether a software display polyfill should stand in for a missing API
    pub fn polyfill_eligible(&self, has_display_api: bool) -> bool {
        self.mobile && !self.tablet && !self.android && !has_display_api
    }
}

/// Headset family guessed from the display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayKind {
    /// Google Daydream
    Daydream,
    /// HTC Vive
    Vive,
    /// Oculus Rift
    Oculus,
    /// Phone in a viewer, driven by orientation sensors
    Cardboard,
    /// Anything else
    Other,
}

impl DisplayKind {
    /// Classify a display by name and platform
    pub fn classify(display_name: &str, platform: &PlatformInfo) -> Self {
        let name = display_name.to_ascii_lowercase();
        if name.contains("daydream") {
            Self::Daydream
        } else if name.contains("vive") {
            Self::Vive
        } else if name.contains("oculus") {
            Self::Oculus
        } else if platform.mobile {
            Self::Cardboard
        } else {
            Self::Other
        }
    }
}

/// Result of a capability probe
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    /// Platform facts
    pub platform: PlatformInfo,
    /// A render context could be created
    pub has_render_context: bool,
    /// The platform exposes a display API
    pub has_display_api: bool,
    /// A software polyfill would be used
    pub vr_polyfill: bool,
    /// At least one display is attached
    pub has_vr: bool,
    /// Number of attached displays
    pub display_count: usize,
    /// First attached display
    pub display: Option<DisplayInfo>,
    /// First display has a separate screen
    pub has_external_display: bool,
    /// First display tracks position
    pub has_6dof: bool,
    /// Headset family of the first display
    pub kind: Option<DisplayKind>,
}

impl Capabilities {
    /// Probe the platform
    ///
    /// Enumeration is bounded by `config.display_timeout_ms` on Android (where
    /// it can hang forever) or on every platform when forced.
    pub fn probe<P>(
        provider: Arc<P>,
        platform: PlatformInfo,
        has_render_context: bool,
        config: &ProbeConfig,
    ) -> Self
    where
        P: DisplayProvider + Send + Sync + 'static,
    {
        let has_display_api = provider.has_display_api();
        let vr_polyfill = platform.polyfill_eligible(has_display_api);

        let displays = if has_display_api || vr_polyfill {
            let timeout = (platform.android || config.always_apply_timeout)
                .then(|| Duration::from_millis(config.display_timeout_ms));
            match enumerate_displays(provider, timeout) {
                Ok(displays) => displays,
                Err(e) => {
                    log::warn!("Unable to get VR displays: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let display = displays.first().cloned();
        let capabilities = display
            .as_ref()
            .map_or(DisplayCapabilities::empty(), |d| d.capabilities);

        let result = Self {
            platform,
            has_render_context,
            has_display_api,
            vr_polyfill,
            has_vr: !displays.is_empty(),
            display_count: displays.len(),
            has_external_display: capabilities.contains(DisplayCapabilities::HAS_EXTERNAL_DISPLAY),
            has_6dof: capabilities.contains(DisplayCapabilities::HAS_POSITION),
            kind: display.as_ref().map(|d| DisplayKind::classify(&d.name, &platform)),
            display,
        };

        log::info!(
            "Capabilities: vr={} displays={} external={} 6dof={} kind={:?}",
            result.has_vr,
            result.display_count,
            result.has_external_display,
            result.has_6dof,
            result.kind
        );
        result
    }
}

/// Enumerate displays, giving up after `timeout` when one is set
///
/// A timed-out enumeration thread is left to finish on its own.
fn enumerate_displays<P>(provider: Arc<P>, timeout: Option<Duration>) -> DisplayResult<Vec<DisplayInfo>>
where
    P: DisplayProvider + Send + Sync + 'static,
{
    let Some(timeout) = timeout else {
        return provider.enumerate();
    };

    let (sender, receiver) = bounded(1);
    thread::Builder::new()
        .name("display-enumeration".to_string())
        .spawn(move || {
            // The receiver is gone after a timeout; nothing left to tell
            let _ = sender.send(provider.enumerate());
        })
        .map_err(|e| DisplayError::EnumerationFailed(e.to_string()))?;

    select! {
        recv(receiver) -> message => message
            .unwrap_or_else(|_| Err(DisplayError::EnumerationFailed("enumeration thread exited".to_string()))),
        recv(after(timeout)) -> _ => {
            log::warn!("Display enumeration timed out after {:?}", timeout);
            Ok(Vec::new())
        }
    }
}
