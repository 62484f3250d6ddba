//! Stereo presenter
//!
//! Wraps a [`SceneRenderer`] and turns a single render call into two eye
//! draws while a head-mounted display is presenting, or a single ordinary
//! draw otherwise. It also owns the output-surface bookkeeping around
//! presentation: the flat size and pixel ratio are recorded when presentation
//! starts and restored exactly when it ends, whether the user exited or the
//! display went away.
//!
//! ## Per-frame flow while presenting
//!
//! 1. Freeze scene matrix auto-updates (one explicit update up front)
//! 2. Eye rectangles from the display layer, or the default half split
//! 3. Eye cameras from frame data, or from field of view plus eye offset
//! 4. Left draw, then right draw, each behind an optional stencil mask
//! 5. Restore full viewport, unfreeze, submit

use crate::config::StereoConfig;
use crate::foundation::math::{utils, Transform};
use crate::render::{
    FrameCallback, FrameRequestId, FrameScheduler, Rect, RenderCamera, RenderLayers,
    RenderResult, RenderTarget, SceneGraph, SceneRenderer, StencilFunc, StencilOp, SurfaceSize,
};
use crate::stereo::{
    eye_matrices, fov_to_projection, DisplayCapabilities, DisplayError, DisplayResult, Eye,
    LayerBounds, VrDisplay,
};

/// Frame request handle that remembers which scheduler issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameHandle {
    /// Issued by the display's scheduler
    Display(FrameRequestId),
    /// Issued by the platform scheduler
    Platform(FrameRequestId),
}

/// Output surface state recorded before presentation
#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedSurface {
    size: SurfaceSize,
    update_style: bool,
    pixel_ratio: f32,
}

/// Stereo presenter over a renderer and an optional display
pub struct StereoPresenter<R: SceneRenderer, D: VrDisplay> {
    renderer: R,
    display: Option<D>,
    platform: Box<dyn FrameScheduler>,
    config: StereoConfig,
    presenting: bool,
    resolution_ratio: f64,
    saved: SavedSurface,
    stencil_scene: Option<R::Scene>,
    /// Submit to the display at the end of every stereo render
    pub auto_submit_frame: bool,
    /// Run the stencil pre-pass when a mask scene is set
    pub use_stencil: bool,
}

impl<R: SceneRenderer, D: VrDisplay> StereoPresenter<R, D> {
    /// Wrap a renderer
    ///
    /// `platform` schedules frames while no display is presenting.
    pub fn new(
        renderer: R,
        display: Option<D>,
        platform: Box<dyn FrameScheduler>,
        config: StereoConfig,
    ) -> Self {
        if display.is_none() {
            log::warn!("Stereo presenter created without a display: HMD not available");
        }
        let saved = SavedSurface {
            size: renderer.size(),
            update_style: false,
            pixel_ratio: renderer.pixel_ratio(),
        };
        Self {
            renderer,
            display,
            platform,
            presenting: false,
            resolution_ratio: utils::clamp(config.resolution_ratio, 0.0, 1.0),
            saved,
            stencil_scene: None,
            auto_submit_frame: config.auto_submit_frame,
            use_stencil: config.use_stencil,
            config,
        }
    }

    /// Wrapped renderer
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Wrapped renderer, mutably
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Attached display
    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    /// Attached display, mutably
    pub fn display_mut(&mut self) -> Option<&mut D> {
        self.display.as_mut()
    }

    /// Attach or replace the display
    pub fn set_display(&mut self, display: Option<D>) {
        self.display = display;
    }

    /// Whether stereo output is active
    pub fn is_presenting(&self) -> bool {
        self.presenting
    }

    /// Current resolution ratio
    pub fn resolution_ratio(&self) -> f64 {
        self.resolution_ratio
    }

    /// Scene drawn into the stencil buffer before each eye
    pub fn set_stencil_scene(&mut self, scene: Option<R::Scene>) {
        self.stencil_scene = scene;
    }

    /// Resize the output
    ///
    /// While presenting the requested size is only recorded for later; the
    /// surface follows the display's eye buffers instead, at pixel ratio 1.
    pub fn set_output_size(&mut self, width: f32, height: f32, update_style: bool) {
        self.saved.size = SurfaceSize::new(width, height);
        self.saved.update_style = update_style;

        if self.presenting {
            self.fit_surface_to_eyes();
        } else {
            self.renderer.set_pixel_ratio(self.saved.pixel_ratio);
            self.renderer.set_size(width, height, update_style);
        }
    }

    /// Pixel ratio used for flat output
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.saved.pixel_ratio = ratio;
        if !self.presenting {
            self.renderer.set_pixel_ratio(ratio);
        }
    }

    /// Scale the presented eye buffers, clamped into [0, 1]
    ///
    /// Only the presented region shrinks; the canvas keeps its size, which
    /// makes this cheap enough to call every frame.
    pub fn set_resolution_ratio(&mut self, ratio: f64) -> DisplayResult<()> {
        self.resolution_ratio = utils::clamp(ratio, 0.0, 1.0);

        let Some(display) = self.display.as_ref() else {
            return Ok(());
        };
        if !display.is_presenting() {
            return Ok(());
        }
        let external = display.capabilities().contains(DisplayCapabilities::HAS_EXTERNAL_DISPLAY);

        self.request_present_to_display()?;

        if external {
            if self.resolution_ratio > 0.0 {
                // Scale the mirror up so the smaller region still fills the screen
                let percent = (1.0 / self.resolution_ratio * 100.0) as f32;
                self.renderer.set_mirror_scale(percent);
            } else {
                log::debug!("Resolution ratio is 0, leaving mirror scale unchanged");
            }
        }
        Ok(())
    }

    /// Enter or leave presentation
    ///
    /// Fails with [`DisplayError::NotAvailable`] without a display and is a
    /// no-op when already in the requested state.
    pub fn set_full_screen(&mut self, enabled: bool) -> DisplayResult<()> {
        let Some(display) = self.display.as_mut() else {
            return Err(DisplayError::NotAvailable);
        };

        if self.presenting == enabled {
            return Ok(());
        }

        if enabled {
            self.request_present_to_display()?;
        } else if display.is_presenting() {
            display.exit_present()?;
        }

        self.on_present_change();
        Ok(())
    }

    /// Start presenting to the display
    pub fn request_present(&mut self) -> DisplayResult<()> {
        self.set_full_screen(true)
    }

    /// Stop presenting to the display
    pub fn exit_present(&mut self) -> DisplayResult<()> {
        self.set_full_screen(false)
    }

    /// React to the display starting or stopping presentation
    ///
    /// Called after our own requests and whenever the display reports a
    /// change on its own, such as a disconnect.
    pub fn on_present_change(&mut self) {
        let was_presenting = self.presenting;
        self.presenting = self.display.as_ref().is_some_and(|d| d.is_presenting());

        if self.presenting {
            if !was_presenting {
                self.saved.pixel_ratio = self.renderer.pixel_ratio();
                self.saved.size = self.renderer.size();
                log::info!(
                    "Presentation started, saved surface {}x{} @ {}",
                    self.saved.size.width,
                    self.saved.size.height,
                    self.saved.pixel_ratio
                );

                self.fit_surface_to_eyes();
                if let Err(e) = self.set_resolution_ratio(self.resolution_ratio) {
                    log::warn!("Failed to apply resolution ratio on present: {}", e);
                }
            }
        } else if was_presenting {
            log::info!(
                "Presentation ended, restoring surface {}x{} @ {}",
                self.saved.size.width,
                self.saved.size.height,
                self.saved.pixel_ratio
            );
            self.renderer.set_pixel_ratio(self.saved.pixel_ratio);
            self.renderer.set_size(
                self.saved.size.width,
                self.saved.size.height,
                self.saved.update_style,
            );
        }
    }

    /// Schedule a frame on the display while presenting, else on the platform
    pub fn request_animation_frame(&mut self, callback: FrameCallback) -> FrameHandle {
        match self.display.as_mut() {
            Some(display) if self.presenting => {
                FrameHandle::Display(display.request_animation_frame(callback))
            }
            _ => FrameHandle::Platform(self.platform.request_animation_frame(callback)),
        }
    }

    /// Cancel a frame on whichever scheduler issued it
    pub fn cancel_animation_frame(&mut self, handle: FrameHandle) {
        match handle {
            FrameHandle::Display(id) => match self.display.as_mut() {
                Some(display) => display.cancel_animation_frame(id),
                None => log::debug!("Display gone, dropping cancel for frame {}", id),
            },
            FrameHandle::Platform(id) => self.platform.cancel_animation_frame(id),
        }
    }

    /// Hand the finished frame to the display if it is presenting
    pub fn submit_frame(&mut self) {
        if let Some(display) = self.display.as_mut() {
            if display.is_presenting() {
                display.submit_frame();
            }
        }
    }

    /// Draw a scene
    ///
    /// While presenting this draws each eye into its half of the surface (or
    /// of `target`), otherwise it is a single draw with the stencil mask.
    pub fn render(
        &mut self,
        scene: &mut R::Scene,
        camera: &RenderCamera,
        mut target: Option<&mut RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()> {
        if !self.presenting || self.display.is_none() {
            return self.render_masked(scene, camera, target.as_deref(), force_clear);
        }

        let auto_update = scene.auto_update();
        if auto_update {
            scene.update_matrix_world();
            scene.set_auto_update(false);
        }

        let result = self.render_eyes(scene, camera, target.as_deref_mut(), force_clear);

        if auto_update {
            scene.set_auto_update(true);
        }
        result?;

        if self.auto_submit_frame {
            self.submit_frame();
        }
        Ok(())
    }

    /// Return the renderer, leaving presentation first
    pub fn dispose(mut self) -> R {
        if self.presenting {
            if let Err(e) = self.exit_present() {
                log::warn!("Failed to exit presentation on dispose: {}", e);
            }
        }
        self.renderer
    }

    fn render_eyes(
        &mut self,
        scene: &R::Scene,
        camera: &RenderCamera,
        mut target: Option<&mut RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()> {
        // Actual back buffer size, not the recommended eye size
        let size = self.renderer.size();
        let (left_bounds, right_bounds) = self.eye_bounds();
        let rect_l = Rect::from_bounds(&left_bounds, size);
        let rect_r = Rect::from_bounds(&right_bounds, size);

        match target.as_deref_mut() {
            Some(target) => {
                self.renderer.set_render_target(Some(&*target));
                target.scissor_test = true;
            }
            None => {
                self.renderer.set_render_target(None);
                self.renderer.set_scissor_test(true);
            }
        }

        if self.renderer.auto_clear() || force_clear {
            self.renderer.clear();
        }

        let (camera_l, camera_r) = self.eye_cameras(camera);
        let border = self.config.black_border_px as i32;

        for (rect, eye_camera) in [(rect_l, &camera_l), (rect_r, &camera_r)] {
            match target.as_deref_mut() {
                Some(target) => {
                    target.viewport = rect;
                    target.scissor = rect;
                }
                None => {
                    self.renderer.set_viewport(rect);
                    self.renderer.set_scissor(rect.inset(border));
                }
            }
            self.render_masked(scene, eye_camera, target.as_deref(), force_clear)?;
        }

        let full = Rect::new(0, 0, size.width as i32, size.height as i32);
        match target {
            Some(target) => {
                target.viewport = full;
                target.scissor = full;
                target.scissor_test = false;
                self.renderer.set_render_target(None);
            }
            None => {
                self.renderer.set_viewport(full);
                self.renderer.set_scissor_test(false);
            }
        }
        Ok(())
    }

    fn render_masked(
        &mut self,
        scene: &R::Scene,
        camera: &RenderCamera,
        target: Option<&RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()> {
        let mask = match (&self.stencil_scene, self.use_stencil) {
            (Some(mask), true) => mask,
            _ => return self.renderer.render(scene, camera, target, force_clear),
        };

        self.renderer.set_stencil_test(true);

        // Paint the eye mask into the stencil buffer
        self.renderer.set_stencil_func(StencilFunc::Always, 1, 0xff);
        self.renderer
            .set_stencil_op(StencilOp::Replace, StencilOp::Replace, StencilOp::Replace);
        self.renderer.render(mask, camera, target, false)?;

        // Only draw where the mask was painted
        self.renderer.set_stencil_func(StencilFunc::Equal, 1, 0xff);
        self.renderer
            .set_stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        let result = self.renderer.render(scene, camera, target, force_clear);

        self.renderer.set_stencil_test(false);
        result
    }

    /// Eye regions from the presented layer, falling back to the half split
    fn eye_bounds(&self) -> ([f32; 4], [f32; 4]) {
        let layer = self
            .display
            .as_ref()
            .and_then(|display| display.layers().into_iter().next())
            .unwrap_or_default();
        (
            layer.left.unwrap_or(self.config.default_left_bounds),
            layer.right.unwrap_or(self.config.default_right_bounds),
        )
    }

    fn eye_cameras(&mut self, camera: &RenderCamera) -> (RenderCamera, RenderCamera) {
        let mut left = RenderCamera {
            layers: camera.layers | RenderLayers::LEFT_EYE,
            ..camera.clone()
        };
        let mut right = RenderCamera {
            layers: camera.layers | RenderLayers::RIGHT_EYE,
            ..camera.clone()
        };

        let (near, far) = self.depth_range(camera);
        let handed = self.config.right_handed;
        let Some(display) = self.display.as_mut() else {
            return (left, right);
        };

        display.set_depth_range(near, far);
        match display.frame_data() {
            Some(frame) => {
                left.projection = frame.left_projection;
                right.projection = frame.right_projection;

                let (eye_l, eye_r) = eye_matrices(&frame);
                let base = camera.world.to_matrix();
                left.world = Transform::from_matrix(&(base * eye_l));
                right.world = Transform::from_matrix(&(base * eye_r));
            }
            None => {
                let params_l = display.eye_parameters(Eye::Left);
                let params_r = display.eye_parameters(Eye::Right);

                left.projection = fov_to_projection(&params_l.field_of_view, handed, near, far);
                right.projection = fov_to_projection(&params_r.field_of_view, handed, near, far);

                let scale_l = left.world.scale.x;
                left.world.translate_on_axis(&params_l.offset, scale_l);
                let scale_r = right.world.scale.x;
                right.world.translate_on_axis(&params_r.offset, scale_r);
            }
        }

        log::trace!(
            "Eye cameras at {:?} / {:?}",
            left.world.position,
            right.world.position
        );
        (left, right)
    }

    /// Camera clip planes, or the configured defaults when they are unusable
    fn depth_range(&self, camera: &RenderCamera) -> (f32, f32) {
        if camera.near > 0.0 && camera.far > camera.near {
            (camera.near, camera.far)
        } else {
            log::debug!(
                "Camera depth range {}..{} unusable, using defaults",
                camera.near,
                camera.far
            );
            (self.config.default_near, self.config.default_far)
        }
    }

    /// Size the surface to both eye buffers at the current ratio, pixel ratio 1
    fn fit_surface_to_eyes(&mut self) {
        let Some(display) = self.display.as_ref() else {
            return;
        };
        let eye = display.eye_parameters(Eye::Left);
        let ratio = self.resolution_ratio as f32;

        // set_pixel_ratio also resizes, so skip it when nothing changes
        if self.renderer.pixel_ratio() != 1.0 {
            self.renderer.set_pixel_ratio(1.0);
        }
        self.renderer.set_size(
            eye.render_width as f32 * 2.0 * ratio,
            eye.render_height as f32 * ratio,
            false,
        );
    }

    /// Ask the display to present the eye regions at the current ratio
    fn request_present_to_display(&mut self) -> DisplayResult<()> {
        let (canvas_width, canvas_height) = self.renderer.drawing_buffer_size();
        let Some(display) = self.display.as_mut() else {
            return Err(DisplayError::NotAvailable);
        };
        let eye = display.eye_parameters(Eye::Left);
        let ratio = self.resolution_ratio;

        let eye_width = (f64::from(eye.render_width) * ratio).floor();
        let eye_height = (f64::from(eye.render_height) * ratio).floor();
        let bounds_width = (eye_width / f64::from(canvas_width.max(1))) as f32;
        let bounds_height = (eye_height / f64::from(canvas_height.max(1))) as f32;

        log::info!(
            "Presenting at resolution ratio {}: {}x{} per eye",
            ratio,
            eye_width,
            eye_height
        );

        display.request_present(LayerBounds {
            left: Some([0.0, 0.0, bounds_width, bounds_height]),
            right: Some([bounds_width, 0.0, bounds_width, bounds_height]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Vec3};
    use crate::render::{
        Camera, ManualScheduler, RecordingRenderer, RecordingScene, RenderCommand,
    };
    use crate::stereo::{Pose, SimulatedDisplay};
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    type TestPresenter = StereoPresenter<RecordingRenderer, SimulatedDisplay>;

    fn presenter(display: Option<SimulatedDisplay>) -> TestPresenter {
        StereoPresenter::new(
            RecordingRenderer::new(1280.0, 720.0, 2.0),
            display,
            Box::new(ManualScheduler::new()),
            StereoConfig::default(),
        )
    }

    fn camera() -> RenderCamera {
        Camera::perspective(Vec3::new(0.0, 1.6, 0.0), 60.0, 16.0 / 9.0, 0.1, 100.0)
            .to_render_camera()
    }

    #[test]
    fn test_resolution_ratio_is_clamped() {
        let mut p = presenter(None);
        p.set_resolution_ratio(1.5).unwrap();
        assert_relative_eq!(p.resolution_ratio(), 1.0);
        p.set_resolution_ratio(-0.2).unwrap();
        assert_relative_eq!(p.resolution_ratio(), 0.0);
        p.set_resolution_ratio(f64::NAN).unwrap();
        assert_relative_eq!(p.resolution_ratio(), 0.0);
    }

    #[test]
    fn test_present_without_display_fails() {
        let mut p = presenter(None);
        let err = p.request_present().unwrap_err();
        assert_eq!(err.to_string(), "No VR hardware found.");
        assert!(!p.is_presenting());
    }

    #[test]
    fn test_present_is_idempotent() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.exit_present().unwrap();
        assert!(p.renderer().commands().is_empty());

        p.request_present().unwrap();
        let requests = p.display().unwrap().present_requests().len();
        p.request_present().unwrap();
        assert_eq!(p.display().unwrap().present_requests().len(), requests);
    }

    #[test]
    fn test_present_resizes_to_eye_buffers() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();

        assert!(p.is_presenting());
        assert_eq!(p.renderer().size(), SurfaceSize::new(2160.0, 1200.0));
        assert_relative_eq!(p.renderer().pixel_ratio(), 1.0);

        let last = *p.display().unwrap().present_requests().last().unwrap();
        assert_eq!(last.left, Some([0.0, 0.0, 0.5, 1.0]));
        assert_eq!(last.right, Some([0.5, 0.0, 0.5, 1.0]));
    }

    #[test]
    fn test_pixel_ratio_only_set_when_different() {
        let mut p = StereoPresenter::new(
            RecordingRenderer::new(1280.0, 720.0, 1.0),
            Some(SimulatedDisplay::new("Sim")),
            Box::new(ManualScheduler::new()),
            StereoConfig::default(),
        );
        p.request_present().unwrap();
        let set_ratio = p
            .renderer()
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::SetPixelRatio(_)))
            .count();
        assert_eq!(set_ratio, 0);
    }

    #[test]
    fn test_exit_restores_surface_exactly() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        let size = p.renderer().size();
        let ratio = p.renderer().pixel_ratio();

        p.request_present().unwrap();
        p.exit_present().unwrap();

        assert!(!p.is_presenting());
        assert_eq!(p.renderer().size(), size);
        assert_relative_eq!(p.renderer().pixel_ratio(), ratio);
    }

    #[test]
    fn test_disconnect_restores_surface() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();

        p.display_mut().unwrap().disconnect();
        p.on_present_change();

        assert!(!p.is_presenting());
        assert_eq!(p.renderer().size(), SurfaceSize::new(1280.0, 720.0));
        assert_relative_eq!(p.renderer().pixel_ratio(), 2.0);
    }

    #[test]
    fn test_resize_while_presenting_keeps_eye_size() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();

        p.set_output_size(800.0, 600.0, true);
        assert_eq!(p.renderer().size(), SurfaceSize::new(2160.0, 1200.0));

        p.exit_present().unwrap();
        assert_eq!(p.renderer().size(), SurfaceSize::new(800.0, 600.0));
    }

    #[test]
    fn test_resolution_ratio_rerequests_smaller_bounds() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();

        p.set_resolution_ratio(0.5).unwrap();

        let last = *p.display().unwrap().present_requests().last().unwrap();
        // floor(1080 * 0.5) / 2160 and floor(1200 * 0.5) / 1200
        assert_eq!(last.left, Some([0.0, 0.0, 0.25, 0.5]));
        assert_eq!(last.right, Some([0.25, 0.0, 0.25, 0.5]));
        assert_relative_eq!(p.renderer().mirror_scale(), 200.0);
    }

    #[test]
    fn test_mirror_untouched_without_external_display() {
        let display = SimulatedDisplay::new("Phone").with_capabilities(
            DisplayCapabilities::HAS_ORIENTATION | DisplayCapabilities::CAN_PRESENT,
        );
        let mut p = presenter(Some(display));
        p.request_present().unwrap();
        p.set_resolution_ratio(0.5).unwrap();
        assert_relative_eq!(p.renderer().mirror_scale(), 100.0);
    }

    #[test]
    fn test_flat_render_is_single_draw() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera(), None, false).unwrap();

        assert_eq!(p.renderer().draws().count(), 1);
        assert_eq!(p.display().unwrap().submitted_frames(), 0);
        assert_eq!(scene.matrix_updates(), 0);
    }

    #[test]
    fn test_stereo_render_draws_left_then_right_with_border() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();
        p.renderer_mut().take_commands();

        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera(), None, false).unwrap();

        let draws: Vec<_> = p.renderer().draws().cloned().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].viewport, Rect::new(0, 0, 1080, 1200));
        assert_eq!(draws[0].scissor, Some(Rect::new(50, 50, 980, 1100)));
        assert_eq!(draws[1].viewport, Rect::new(1080, 0, 1080, 1200));
        assert_eq!(draws[1].scissor, Some(Rect::new(1130, 50, 980, 1100)));
        assert!(draws[0].camera.layers.contains(RenderLayers::LEFT_EYE));
        assert!(draws[1].camera.layers.contains(RenderLayers::RIGHT_EYE));

        // Left eye sits left of the right eye
        assert!(draws[0].camera.world.position.x < draws[1].camera.world.position.x);

        assert_eq!(p.renderer().viewport(), Rect::new(0, 0, 2160, 1200));
        assert!(!p.renderer().scissor_test());
        assert!(scene.auto_update());
        assert_eq!(scene.matrix_updates(), 1);
        assert_eq!(p.display().unwrap().submitted_frames(), 1);
        assert_eq!(p.display().unwrap().depth_range(), (0.1, 100.0));
    }

    #[test]
    fn test_unusable_depth_range_falls_back_to_defaults() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();
        let camera = RenderCamera {
            near: 0.0,
            ..camera()
        };

        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera, None, false).unwrap();
        assert_eq!(p.display().unwrap().depth_range(), (0.01, 10_000.0));
    }

    #[test]
    fn test_frame_data_and_fov_paths_agree() {
        let pose_free = |frame_data| {
            let mut p = presenter(Some(SimulatedDisplay::new("Sim").with_frame_data(frame_data)));
            p.request_present().unwrap();
            let mut scene = RecordingScene::new("main");
            p.render(&mut scene, &camera(), None, false).unwrap();
            p.renderer().draws().cloned().collect::<Vec<_>>()
        };

        let with_frame = pose_free(true);
        let with_fov = pose_free(false);
        for (a, b) in with_frame.iter().zip(&with_fov) {
            assert_relative_eq!(a.camera.world.position, b.camera.world.position, epsilon = 1e-4);
            assert_relative_eq!(a.camera.projection, b.camera.projection, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_eye_offsets_are_head_relative() {
        // The viewer camera already carries the head pose; frame data only adds the eye offset
        let mut display = SimulatedDisplay::new("Sim");
        display.set_pose(Pose {
            orientation: Some(Quat::from_axis_angle(&Vec3::y_axis(), 0.3)),
            position: Some(Vec3::new(0.0, 0.0, -1.0)),
        });
        let mut p = presenter(Some(display));
        p.request_present().unwrap();
        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera(), None, false).unwrap();

        let left = p.renderer().draws().next().unwrap().camera.world.position;
        assert_relative_eq!(left, Vec3::new(-0.032, 1.6, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_render_target_gets_eye_viewports_and_reset() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();
        let mut scene = RecordingScene::new("main");
        let mut target = RenderTarget::new(2160, 1200);

        p.render(&mut scene, &camera(), Some(&mut target), false).unwrap();

        let draws: Vec<_> = p.renderer().draws().cloned().collect();
        assert!(draws.iter().all(|d| d.to_target));
        assert_eq!(draws[0].scissor, Some(Rect::new(0, 0, 1080, 1200)));
        assert_eq!(draws[1].viewport, Rect::new(1080, 0, 1080, 1200));
        assert_eq!(target.viewport, Rect::new(0, 0, 2160, 1200));
        assert!(!target.scissor_test);
    }

    #[test]
    fn test_stencil_pass_wraps_each_draw() {
        let mut p = presenter(None);
        p.set_stencil_scene(Some(RecordingScene::new("mask")));
        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera(), None, false).unwrap();

        let commands = p.renderer().commands();
        assert_eq!(commands[0], RenderCommand::StencilTest(true));
        assert_eq!(commands[1], RenderCommand::StencilFunc(StencilFunc::Always, 1, 0xff));
        assert!(matches!(&commands[3], RenderCommand::Draw(d) if d.scene == "mask"));
        assert_eq!(commands[4], RenderCommand::StencilFunc(StencilFunc::Equal, 1, 0xff));
        assert!(matches!(&commands[6], RenderCommand::Draw(d) if d.scene == "main" && d.stencil_test));
        assert_eq!(commands[7], RenderCommand::StencilTest(false));

        p.use_stencil = false;
        p.renderer_mut().take_commands();
        p.render(&mut scene, &camera(), None, false).unwrap();
        assert_eq!(p.renderer().commands().len(), 1);
    }

    #[test]
    fn test_stereo_stencil_pass_precedes_each_eye() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();
        p.renderer_mut().take_commands();
        p.set_stencil_scene(Some(RecordingScene::new("mask")));

        let mut scene = RecordingScene::new("main");
        p.render(&mut scene, &camera(), None, false).unwrap();

        let draws: Vec<_> = p
            .renderer()
            .draws()
            .map(|d| (d.scene.as_str(), d.stencil_test))
            .collect();
        assert_eq!(
            draws,
            vec![("mask", true), ("main", true), ("mask", true), ("main", true)]
        );

        let toggles: Vec<bool> = p
            .renderer()
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::StencilTest(on) => Some(*on),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, vec![true, false, true, false]);
    }

    #[test]
    fn test_rejected_present_leaves_surface_alone() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim").rejecting_present()));
        let size = p.renderer().size();
        let ratio = p.renderer().pixel_ratio();

        let err = p.request_present().unwrap_err();
        assert!(matches!(err, DisplayError::PresentRejected(_)));
        assert!(!p.is_presenting());
        assert_eq!(p.renderer().size(), size);
        assert_relative_eq!(p.renderer().pixel_ratio(), ratio);
        assert_eq!(p.renderer().size(), SurfaceSize::new(1280.0, 720.0));
    }

    #[test]
    fn test_frames_route_to_display_while_presenting() {
        let platform = ManualScheduler::new();
        let mut p: TestPresenter = StereoPresenter::new(
            RecordingRenderer::new(1280.0, 720.0, 1.0),
            Some(SimulatedDisplay::new("Sim")),
            Box::new(platform.clone()),
            StereoConfig::default(),
        );
        let hits = Rc::new(Cell::new(0));

        let flat = Rc::clone(&hits);
        let handle = p.request_animation_frame(Box::new(move |_| flat.set(flat.get() + 1)));
        assert!(matches!(handle, FrameHandle::Platform(_)));
        assert_eq!(platform.pending(), 1);

        p.request_present().unwrap();
        let stereo = Rc::clone(&hits);
        let handle = p.request_animation_frame(Box::new(move |_| stereo.set(stereo.get() + 10)));
        assert!(matches!(handle, FrameHandle::Display(_)));

        p.cancel_animation_frame(handle);
        assert_eq!(p.display().unwrap().scheduler().pending(), 0);
        platform.run_frame(16.0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_dispose_leaves_presentation() {
        let mut p = presenter(Some(SimulatedDisplay::new("Sim")));
        p.request_present().unwrap();
        let renderer = p.dispose();
        assert_eq!(renderer.size(), SurfaceSize::new(1280.0, 720.0));
    }
}
