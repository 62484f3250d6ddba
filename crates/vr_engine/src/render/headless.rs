//! Headless renderer, scene and frame scheduler
//!
//! [`RecordingRenderer`] keeps the same state a GPU renderer would (size,
//! pixel ratio, viewport, scissor, stencil) and appends every state change and
//! draw to a command log instead of touching a graphics API. Tests assert on
//! the log; the demo app prints a summary of it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::render::{
    FrameCallback, FrameRequestId, FrameScheduler, Rect, RenderCamera, RenderResult,
    RenderTarget, SceneGraph, SceneRenderer, SceneResources, StencilFunc, StencilOp,
    SurfaceSize,
};

/// One recorded renderer call
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Surface resized
    SetSize {
        /// Logical width
        width: f32,
        /// Logical height
        height: f32,
        /// Whether the mirrored (CSS) size followed
        update_style: bool,
    },
    /// Pixel density changed
    SetPixelRatio(f32),
    /// Default framebuffer viewport changed
    SetViewport(Rect),
    /// Default framebuffer scissor changed
    SetScissor(Rect),
    /// Scissor test toggled
    SetScissorTest(bool),
    /// Render target bound; `None` is the default framebuffer
    SetRenderTarget(Option<(u32, u32)>),
    /// Bound framebuffer cleared
    Clear,
    /// Stencil test toggled
    StencilTest(bool),
    /// Stencil comparison set
    StencilFunc(StencilFunc, u8, u8),
    /// Stencil operations set
    StencilOp(StencilOp, StencilOp, StencilOp),
    /// Scene drawn
    Draw(DrawCall),
    /// Mirror scale changed (percent)
    MirrorScale(f32),
}

/// State captured for one draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Name of the drawn scene
    pub scene: String,
    /// Camera used
    pub camera: RenderCamera,
    /// Viewport in effect
    pub viewport: Rect,
    /// Scissor in effect, if scissor testing was enabled
    pub scissor: Option<Rect>,
    /// Whether the stencil test was enabled
    pub stencil_test: bool,
    /// Whether the draw went to an off-screen target
    pub to_target: bool,
}

/// Renderer that records instead of drawing
#[derive(Debug)]
pub struct RecordingRenderer {
    size: SurfaceSize,
    pixel_ratio: f32,
    viewport: Rect,
    scissor: Rect,
    scissor_test: bool,
    stencil_test: bool,
    auto_clear: bool,
    mirror_scale: f32,
    commands: Vec<RenderCommand>,
}

impl RecordingRenderer {
    /// Create a renderer with a logical size and pixel ratio
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        let full = Rect::new(0, 0, width as i32, height as i32);
        Self {
            size: SurfaceSize::new(width, height),
            pixel_ratio,
            viewport: full,
            scissor: full,
            scissor_test: false,
            stencil_test: false,
            auto_clear: true,
            mirror_scale: 100.0,
            commands: Vec::new(),
        }
    }

    /// Toggle clearing before draws
    pub fn set_auto_clear(&mut self, enabled: bool) {
        self.auto_clear = enabled;
    }

    /// Every command recorded so far
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Draw calls recorded so far
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            RenderCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Current viewport
    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Whether scissor testing is enabled
    pub fn scissor_test(&self) -> bool {
        self.scissor_test
    }

    /// Current mirror scale in percent
    pub fn mirror_scale(&self) -> f32 {
        self.mirror_scale
    }
}

impl SceneRenderer for RecordingRenderer {
    type Scene = RecordingScene;

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn set_size(&mut self, width: f32, height: f32, update_style: bool) {
        self.size = SurfaceSize::new(width, height);
        self.viewport = Rect::new(0, 0, width as i32, height as i32);
        self.commands.push(RenderCommand::SetSize { width, height, update_style });
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
        self.commands.push(RenderCommand::SetPixelRatio(ratio));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
        self.commands.push(RenderCommand::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
        self.commands.push(RenderCommand::SetScissor(rect));
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
        self.commands.push(RenderCommand::SetScissorTest(enabled));
    }

    fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        self.commands
            .push(RenderCommand::SetRenderTarget(target.map(|t| (t.width, t.height))));
    }

    fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    fn clear(&mut self) {
        self.commands.push(RenderCommand::Clear);
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.stencil_test = enabled;
        self.commands.push(RenderCommand::StencilTest(enabled));
    }

    fn set_stencil_func(&mut self, func: StencilFunc, reference: u8, mask: u8) {
        self.commands.push(RenderCommand::StencilFunc(func, reference, mask));
    }

    fn set_stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.commands.push(RenderCommand::StencilOp(fail, depth_fail, pass));
    }

    fn render(
        &mut self,
        scene: &RecordingScene,
        camera: &RenderCamera,
        target: Option<&RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()> {
        if force_clear {
            self.clear();
        }

        let (viewport, scissor) = match target {
            Some(target) => (target.viewport, target.scissor_test.then_some(target.scissor)),
            None => (self.viewport, self.scissor_test.then_some(self.scissor)),
        };

        log::trace!("Recording draw of '{}' into {:?}", scene.name(), viewport);
        self.commands.push(RenderCommand::Draw(DrawCall {
            scene: scene.name().to_string(),
            camera: camera.clone(),
            viewport,
            scissor,
            stencil_test: self.stencil_test,
            to_target: target.is_some(),
        }));
        Ok(())
    }

    fn set_mirror_scale(&mut self, percent: f32) {
        self.mirror_scale = percent;
        self.commands.push(RenderCommand::MirrorScale(percent));
    }
}

/// Scene stand-in that tracks matrix updates and instance uploads
#[derive(Debug, Clone)]
pub struct RecordingScene {
    name: String,
    auto_update: bool,
    matrix_updates: u32,
    uploaded_bytes: usize,
}

impl RecordingScene {
    /// Create an empty scene
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_update: true,
            matrix_updates: 0,
            uploaded_bytes: 0,
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many times world matrices were recomputed
    pub fn matrix_updates(&self) -> u32 {
        self.matrix_updates
    }

    /// Total instance bytes uploaded so far
    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }

    /// Upload every visible mesh whose instances changed since the last upload
    ///
    /// Returns the number of meshes uploaded.
    pub fn upload(&mut self, resources: &mut SceneResources) -> usize {
        let mut uploaded = 0;
        for (_, mesh) in resources.meshes_mut() {
            if !mesh.is_visible() || mesh.take_dirty().is_empty() {
                continue;
            }
            self.uploaded_bytes += mesh.instance_bytes().len();
            uploaded += 1;
        }
        uploaded
    }
}

impl SceneGraph for RecordingScene {
    fn auto_update(&self) -> bool {
        self.auto_update
    }

    fn set_auto_update(&mut self, enabled: bool) {
        self.auto_update = enabled;
    }

    fn update_matrix_world(&mut self) {
        self.matrix_updates += 1;
    }
}

#[derive(Default)]
struct SchedulerQueue {
    next_id: FrameRequestId,
    pending: VecDeque<(FrameRequestId, FrameCallback)>,
}

/// Frame scheduler pumped by hand
///
/// Clones share one queue, so the composition root can keep a handle while
/// the presenter owns another.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<SchedulerQueue>>,
}

impl ManualScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame
    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    /// Run every callback queued before this call
    ///
    /// Callbacks that request another frame are queued for the next call.
    pub fn run_frame(&self, timestamp_ms: f64) -> usize {
        let callbacks: Vec<_> = self.queue.borrow_mut().pending.drain(..).collect();
        let count = callbacks.len();
        for (_, callback) in callbacks {
            callback(timestamp_ms);
        }
        count
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_animation_frame(&mut self, callback: FrameCallback) -> FrameRequestId {
        let mut queue = self.queue.borrow_mut();
        queue.next_id = queue.next_id.wrapping_add(1);
        let id = queue.next_id;
        queue.pending.push_back((id, callback));
        id
    }

    fn cancel_animation_frame(&mut self, id: FrameRequestId) {
        self.queue.borrow_mut().pending.retain(|(pending, _)| *pending != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Camera;
    use std::cell::Cell;

    #[test]
    fn test_draw_captures_scissor_only_when_enabled() {
        let mut renderer = RecordingRenderer::new(800.0, 600.0, 2.0);
        let scene = RecordingScene::new("main");
        let camera = Camera::default().to_render_camera();

        renderer.render(&scene, &camera, None, false).unwrap();
        renderer.set_scissor(Rect::new(10, 10, 100, 100));
        renderer.set_scissor_test(true);
        renderer.render(&scene, &camera, None, false).unwrap();

        let draws: Vec<_> = renderer.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].scissor, None);
        assert_eq!(draws[1].scissor, Some(Rect::new(10, 10, 100, 100)));
        assert_eq!(renderer.drawing_buffer_size(), (1600, 1200));
    }

    #[test]
    fn test_draw_into_target_uses_target_state() {
        let mut renderer = RecordingRenderer::new(800.0, 600.0, 1.0);
        let scene = RecordingScene::new("main");
        let camera = Camera::default().to_render_camera();
        let mut target = RenderTarget::new(256, 128);
        target.viewport = Rect::new(128, 0, 128, 128);

        renderer.render(&scene, &camera, Some(&target), true).unwrap();

        assert_eq!(renderer.commands()[0], RenderCommand::Clear);
        let draw = renderer.draws().next().unwrap();
        assert!(draw.to_target);
        assert_eq!(draw.viewport, Rect::new(128, 0, 128, 128));
    }

    #[test]
    fn test_upload_consumes_dirty_visible_meshes() {
        let mut resources = SceneResources::allocate(2, 2, &[[1.0; 4]]);
        let mut scene = RecordingScene::new("main");

        // Three visible meshes start dirty, the hidden orthographic shell is skipped
        assert_eq!(scene.upload(&mut resources), 3);
        assert_eq!(scene.upload(&mut resources), 0);

        resources.heads_mut().set_color_at(0, [0.0; 4]).unwrap();
        assert_eq!(scene.upload(&mut resources), 1);
        assert!(scene.uploaded_bytes() > 0);
    }

    #[test]
    fn test_manual_scheduler_runs_and_cancels() {
        let mut scheduler = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));

        let first = Rc::clone(&hits);
        scheduler.request_animation_frame(Box::new(move |_| first.set(first.get() + 1)));
        let second = Rc::clone(&hits);
        let id = scheduler.request_animation_frame(Box::new(move |_| second.set(second.get() + 10)));
        scheduler.cancel_animation_frame(id);

        let shared = scheduler.clone();
        assert_eq!(shared.pending(), 1);
        assert_eq!(shared.run_frame(16.0), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
