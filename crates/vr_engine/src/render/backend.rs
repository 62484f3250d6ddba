//! Backend abstraction traits for the rendering system
//!
//! These traits describe the subset of a 3D renderer the stereo presenter
//! needs: surface sizing, viewport/scissor state, stencil state and a draw
//! call. A GPU backend implements them; [`crate::render::headless`] provides
//! a recording implementation.

use crate::render::{RenderCamera, RenderResult};

/// Pixel rectangle used for viewports and scissors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Scale normalized bounds `[x, y, width, height]` to a surface, rounding each edge
    pub fn from_bounds(bounds: &[f32; 4], size: SurfaceSize) -> Self {
        Self {
            x: (size.width * bounds[0]).round() as i32,
            y: (size.height * bounds[1]).round() as i32,
            width: (size.width * bounds[2]).round() as i32,
            height: (size.height * bounds[3]).round() as i32,
        }
    }

    /// Shrink the rectangle by `border` pixels on every side
    ///
    /// Width and height never go negative.
    pub fn inset(&self, border: i32) -> Self {
        Self {
            x: self.x + border,
            y: self.y + border,
            width: (self.width - border * 2).max(0),
            height: (self.height - border * 2).max(0),
        }
    }
}

/// Logical (pre pixel-ratio) surface size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceSize {
    /// Width in logical pixels
    pub width: f32,
    /// Height in logical pixels
    pub height: f32,
}

impl SurfaceSize {
    /// Create a new size
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Off-screen render target with its own viewport and scissor state
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Active viewport
    pub viewport: Rect,
    /// Active scissor rectangle
    pub scissor: Rect,
    /// Whether scissor testing is enabled for this target
    pub scissor_test: bool,
}

impl RenderTarget {
    /// Create a render target covering its full extent
    pub fn new(width: u32, height: u32) -> Self {
        let full = Rect::new(0, 0, width as i32, height as i32);
        Self {
            width,
            height,
            viewport: full,
            scissor: full,
            scissor_test: false,
        }
    }

    /// Size of the target as a surface size
    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width as f32, self.height as f32)
    }
}

/// Stencil comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilFunc {
    /// Always passes
    Always,
    /// Passes when the stored value equals the reference
    Equal,
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    /// Keep the stored value
    Keep,
    /// Replace the stored value with the reference
    Replace,
}

/// Scene graph hooks the presenter needs around a stereo render
pub trait SceneGraph {
    /// Whether world matrices are recomputed automatically on every draw
    fn auto_update(&self) -> bool;

    /// Enable or disable automatic world matrix updates
    fn set_auto_update(&mut self, enabled: bool);

    /// Recompute world matrices once
    fn update_matrix_world(&mut self);
}

/// Main renderer trait wrapped by the stereo presenter
pub trait SceneRenderer {
    /// Scene type this renderer draws
    type Scene: SceneGraph;

    /// Logical size of the output surface
    fn size(&self) -> SurfaceSize;

    /// Resize the output surface; `update_style` also resizes the mirrored (CSS) size
    fn set_size(&mut self, width: f32, height: f32, update_style: bool);

    /// Current pixel density
    fn pixel_ratio(&self) -> f32;

    /// Change the pixel density
    fn set_pixel_ratio(&mut self, ratio: f32);

    /// Size of the backing buffer in device pixels
    fn drawing_buffer_size(&self) -> (u32, u32) {
        let size = self.size();
        let ratio = self.pixel_ratio();
        (
            (size.width * ratio).floor() as u32,
            (size.height * ratio).floor() as u32,
        )
    }

    /// Set the viewport rectangle on the default framebuffer
    fn set_viewport(&mut self, rect: Rect);

    /// Set the scissor rectangle on the default framebuffer
    fn set_scissor(&mut self, rect: Rect);

    /// Enable or disable scissor testing on the default framebuffer
    fn set_scissor_test(&mut self, enabled: bool);

    /// Bind an off-screen target, or the default framebuffer with `None`
    fn set_render_target(&mut self, target: Option<&RenderTarget>);

    /// Whether the renderer clears before each draw
    fn auto_clear(&self) -> bool;

    /// Clear the bound framebuffer
    fn clear(&mut self);

    /// Enable or disable stencil testing
    fn set_stencil_test(&mut self, enabled: bool);

    /// Configure the stencil comparison
    fn set_stencil_func(&mut self, func: StencilFunc, reference: u8, mask: u8);

    /// Configure the stencil operations for fail, depth-fail and pass
    fn set_stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);

    /// Draw a scene with a camera
    fn render(
        &mut self,
        scene: &Self::Scene,
        camera: &RenderCamera,
        target: Option<&RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()>;

    /// Scale the mirrored output relative to its container, in percent
    fn set_mirror_scale(&mut self, percent: f32);
}

/// Callback invoked with a frame timestamp in milliseconds
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Identifier returned by a frame scheduler
pub type FrameRequestId = u32;

/// Platform animation-frame scheduler
pub trait FrameScheduler {
    /// Schedule a callback for the next refresh
    fn request_animation_frame(&mut self, callback: FrameCallback) -> FrameRequestId;

    /// Cancel a pending callback
    fn cancel_animation_frame(&mut self, id: FrameRequestId);
}
