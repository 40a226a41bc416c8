use alloc::sync::Arc;

use ash::vk;
use frame_capture::{CaptureRequests, FrameCapture, Vulkan, VulkanCreationError};
use raw_window_handle::{HandleError, HasDisplayHandle, HasWindowHandle};
use thiserror::Error;
use tracing::{info, info_span};
use winit::{
    dpi::{PhysicalSize, Size},
    error::OsError,
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes},
};

use crate::{
    config::Config,
    renderer::{self, Renderer},
    should_debug,
    sink::ImageFileSink,
};

/// Everything that lives while the window is open.
///
/// Fields drop in declaration order, the renderer must go before the window it presents to.
pub struct ActiveApp {
    pub renderer: Renderer,
    pub vulkan: Arc<Vulkan>,

    pub capture: FrameCapture,
    pub requests: CaptureRequests,
    pub sink: ImageFileSink,

    pub window: Window,
}

impl ActiveApp {
    pub fn new(event_loop: &ActiveEventLoop, config: &Config) -> Result<Self, Error> {
        let _span = info_span!("ActiveApp::new").entered();

        let window = {
            let attributes = WindowAttributes::default()
                .with_title("Capture Viewer")
                .with_inner_size(Size::Physical(PhysicalSize::new(1280, 720)));

            event_loop.create_window(attributes)?
        };

        let display_handle = window.display_handle()?.as_raw();
        let window_handle = window.window_handle()?.as_raw();

        let vulkan = Arc::new(unsafe { Vulkan::new(should_debug(), Some(display_handle)) }?);

        let renderer = unsafe {
            Renderer::new(
                Arc::clone(&vulkan),
                display_handle,
                window_handle,
                extent(window.inner_size()),
                config.far_plane.into(),
            )
        }?;

        info!(
            "Press '{}' to capture colour and '{}' to capture depth",
            config.color_key, config.depth_key
        );

        Ok(Self {
            renderer,
            vulkan,

            capture: FrameCapture::new(config.capture_settings()),
            requests: CaptureRequests::new(),
            sink: ImageFileSink,

            window,
        })
    }

    pub fn resized(&mut self, new_size: PhysicalSize<u32>) {
        self.renderer.request_resize(extent(new_size));
    }
}

pub fn extent(size: PhysicalSize<u32>) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to create the window:\n{0}")]
    Window(#[from] OsError),

    #[error("Failed to get the window handles:\n{0}")]
    Handle(#[from] HandleError),

    #[error("Failed to create the Vulkan context:\n{0}")]
    Vulkan(#[from] VulkanCreationError),

    #[error("Failed to create the renderer:\n{0}")]
    Renderer(#[from] renderer::CreationError),
}
