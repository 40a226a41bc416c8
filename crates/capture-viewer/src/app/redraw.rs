use ash::vk;
use frame_capture::{CaptureError, VkError};
use tracing::error;

use super::ActiveApp;

impl ActiveApp {
    /// Renders a frame, services pending captures against it, then presents it.
    pub fn redraw(&mut self) -> Result<(), VkError> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let Some(frame) = (unsafe { self.renderer.render() }?) else {
            return Ok(());
        };

        if self.requests.any_requested() {
            let results = unsafe {
                self.capture.service(
                    self.vulkan.as_ref(),
                    &mut self.requests,
                    &frame.source,
                    &mut self.sink,
                )
            };

            // Failures were logged, only a lost device stops the render loop.
            for (target, result) in results {
                match result {
                    Err(CaptureError::Vulkan(e)) if e.result == vk::Result::ERROR_DEVICE_LOST => {
                        error!("The device was lost during a {target} capture");
                        return Err(e);
                    }
                    _ => {}
                }
            }
        }

        unsafe { self.renderer.present(frame) }?;

        self.window.request_redraw();

        Ok(())
    }
}
