//! In-process display used by tests and the headless demo
//!
//! Behaves like a tethered headset: reports eye parameters, presents when
//! asked, counts submitted frames and runs its own frame queue. It can be
//! configured without frame data (forcing the field-of-view path), with or
//! without an external screen, and can be unplugged mid-session.

use std::time::Duration;

use crate::foundation::math::{Mat4, Vec3};
use crate::render::{FrameCallback, FrameRequestId, FrameScheduler, ManualScheduler};
use crate::stereo::{
    fov_to_projection, projection, DisplayCapabilities, DisplayError, DisplayInfo,
    DisplayProvider, DisplayResult, Eye, EyeParameters, FieldOfView, FrameData, LayerBounds,
    Pose, VrDisplay,
};

/// Simulated head-mounted display
#[derive(Debug)]
pub struct SimulatedDisplay {
    name: String,
    capabilities: DisplayCapabilities,
    left: EyeParameters,
    right: EyeParameters,
    supports_frame_data: bool,
    connected: bool,
    presenting: bool,
    reject_present: bool,
    layer: Option<LayerBounds>,
    present_requests: Vec<LayerBounds>,
    pose: Pose,
    depth_near: f32,
    depth_far: f32,
    submitted_frames: u32,
    frame_clock_ms: f64,
    scheduler: ManualScheduler,
}

impl SimulatedDisplay {
    /// Tethered headset with 1080x1200 eyes, frame data and an external screen
    pub fn new(name: impl Into<String>) -> Self {
        let fov = FieldOfView {
            up_degrees: 50.0,
            down_degrees: 50.0,
            left_degrees: 47.0,
            right_degrees: 43.0,
        };
        let mirrored = FieldOfView {
            left_degrees: fov.right_degrees,
            right_degrees: fov.left_degrees,
            ..fov
        };
        Self {
            name: name.into(),
            capabilities: DisplayCapabilities::all(),
            left: EyeParameters {
                render_width: 1080,
                render_height: 1200,
                offset: Vec3::new(-0.032, 0.0, 0.0),
                field_of_view: fov,
            },
            right: EyeParameters {
                render_width: 1080,
                render_height: 1200,
                offset: Vec3::new(0.032, 0.0, 0.0),
                field_of_view: mirrored,
            },
            supports_frame_data: true,
            connected: true,
            presenting: false,
            reject_present: false,
            layer: None,
            present_requests: Vec::new(),
            pose: Pose::default(),
            depth_near: projection::DEFAULT_NEAR,
            depth_far: projection::DEFAULT_FAR,
            submitted_frames: 0,
            frame_clock_ms: 0.0,
            scheduler: ManualScheduler::new(),
        }
    }

    /// Enable or disable frame data
    pub fn with_frame_data(mut self, enabled: bool) -> Self {
        self.supports_frame_data = enabled;
        self
    }

    /// Replace the capability flags
    pub fn with_capabilities(mut self, capabilities: DisplayCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the per-eye render size
    pub fn with_eye_size(mut self, width: u32, height: u32) -> Self {
        for eye in [&mut self.left, &mut self.right] {
            eye.render_width = width;
            eye.render_height = height;
        }
        self
    }

    /// Make every present request fail
    pub fn rejecting_present(mut self) -> Self {
        self.reject_present = true;
        self
    }

    /// Set the head pose reported in frame data
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Unplug the display; presentation ends immediately
    pub fn disconnect(&mut self) {
        log::info!("Simulated display '{}' disconnected", self.name);
        self.connected = false;
        self.presenting = false;
        self.layer = None;
    }

    /// Frames submitted so far
    pub fn submitted_frames(&self) -> u32 {
        self.submitted_frames
    }

    /// Every layer passed to `request_present`, oldest first
    pub fn present_requests(&self) -> &[LayerBounds] {
        &self.present_requests
    }

    /// Depth range last set by the presenter
    pub fn depth_range(&self) -> (f32, f32) {
        (self.depth_near, self.depth_far)
    }

    /// Handle to the display's frame queue
    pub fn scheduler(&self) -> ManualScheduler {
        self.scheduler.clone()
    }

    /// Advance the display clock one refresh and run queued callbacks
    pub fn run_frame(&mut self, frame_time: Duration) -> usize {
        self.frame_clock_ms += frame_time.as_secs_f64() * 1000.0;
        self.scheduler.run_frame(self.frame_clock_ms)
    }

    fn eye(&self, eye: Eye) -> &EyeParameters {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    fn view_matrix(&self, eye: Eye) -> Mat4 {
        let head = projection::head_matrix(self.pose.orientation.as_ref(), self.pose.position.as_ref());
        let eye_offset = Mat4::new_translation(&self.eye(eye).offset);
        (head * eye_offset).try_inverse().unwrap_or_else(Mat4::identity)
    }
}

impl VrDisplay for SimulatedDisplay {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> DisplayCapabilities {
        self.capabilities
    }

    fn is_presenting(&self) -> bool {
        self.presenting
    }

    fn eye_parameters(&self, eye: Eye) -> EyeParameters {
        *self.eye(eye)
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth_near = near;
        self.depth_far = far;
    }

    fn frame_data(&mut self) -> Option<FrameData> {
        if !self.supports_frame_data {
            return None;
        }
        let (near, far) = (self.depth_near, self.depth_far);
        Some(FrameData {
            timestamp: self.frame_clock_ms,
            pose: self.pose,
            left_projection: fov_to_projection(&self.left.field_of_view, true, near, far),
            left_view: self.view_matrix(Eye::Left),
            right_projection: fov_to_projection(&self.right.field_of_view, true, near, far),
            right_view: self.view_matrix(Eye::Right),
        })
    }

    fn layers(&self) -> Vec<LayerBounds> {
        self.layer.into_iter().collect()
    }

    fn request_present(&mut self, layer: LayerBounds) -> DisplayResult<()> {
        if !self.connected {
            return Err(DisplayError::Disconnected);
        }
        if self.reject_present || !self.capabilities.contains(DisplayCapabilities::CAN_PRESENT) {
            return Err(DisplayError::PresentRejected(format!(
                "'{}' refused to present",
                self.name
            )));
        }
        self.present_requests.push(layer);
        self.layer = Some(layer);
        self.presenting = true;
        Ok(())
    }

    fn exit_present(&mut self) -> DisplayResult<()> {
        self.presenting = false;
        self.layer = None;
        Ok(())
    }

    fn submit_frame(&mut self) {
        self.submitted_frames += 1;
    }

    fn request_animation_frame(&mut self, callback: FrameCallback) -> FrameRequestId {
        self.scheduler.request_animation_frame(callback)
    }

    fn cancel_animation_frame(&mut self, id: FrameRequestId) {
        self.scheduler.cancel_animation_frame(id);
    }
}

/// Display provider backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    displays: Vec<DisplayInfo>,
    has_api: bool,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl SimulatedProvider {
    /// Provider with a display API and the given displays
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self {
            displays,
            has_api: true,
            delay: None,
            failure: None,
        }
    }

    /// Platform without any display API
    pub fn without_api() -> Self {
        Self::default()
    }

    /// Block enumeration for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make enumeration fail
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

impl DisplayProvider for SimulatedProvider {
    fn has_display_api(&self) -> bool {
        self.has_api
    }

    fn enumerate(&self) -> DisplayResult<Vec<DisplayInfo>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.failure {
            Some(message) => Err(DisplayError::EnumerationFailed(message.clone())),
            None => Ok(self.displays.clone()),
        }
    }
}
