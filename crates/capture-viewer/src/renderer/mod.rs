use alloc::sync::Arc;

use ash::vk;
use frame_capture::{FarPlane, FrameSource, FrameSync, VkError, Vulkan};
use surface::Surface;
use swapchain::Swapchain;
use thiserror::Error;

mod drop;
mod new;
mod render;
mod surface;
mod swapchain;

/// A frame that was submitted and not yet presented.
#[derive(Debug, Clone, Copy)]
pub struct RenderedFrame {
    pub image_index: u32,

    /// What captures of this frame read.
    pub source: FrameSource,
}

/// Clears the swapchain image and depth buffer, then draws a moving square closer to the camera.
///
/// Fields drop in declaration order, the Vulkan context must outlive everything created from it.
pub struct Renderer {
    swapchain: Swapchain,
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    window_extent: vk::Extent2D,

    render_pass: vk::RenderPass,

    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    in_flight_fence: vk::Fence,
    image_available: vk::Semaphore,

    frame_sync: FrameSync,
    far_plane: FarPlane,
    frame: u64,

    surface: Surface,
    vulkan: Arc<Vulkan>,
}

impl Renderer {
    /// Flag that the swapchain needs to be rebuilt at `extent`.
    pub fn request_resize(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
        self.swapchain.needs_to_rebuild = true;
    }

    /// Number of frames rendered.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Error variants from renderer creation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreationError {
    /// A Vulkan call returned an error.
    #[error(transparent)]
    VkError(#[from] VkError),

    /// The queue cannot present to the window's surface.
    #[error("The device cannot present to the window")]
    PresentUnsupported,

    /// The surface reports no formats.
    #[error("The surface has no supported formats")]
    NoSurfaceFormat,

    /// No depth format can be rendered to and copied from.
    #[error("The device has no depth format that can be captured")]
    NoDepthFormat,

    /// No device local memory fits the depth buffer.
    #[error("No suitable memory type for the depth buffer")]
    NoSuitableMemoryType,
}
