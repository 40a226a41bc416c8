use super::Renderer;

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            self.vulkan.device_wait_idle();

            let device = self.vulkan.device();

            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight_fence, None);
            device.destroy_command_pool(self.command_pool, None);

            self.swapchain.destroy(self.vulkan.as_ref(), &self.surface);
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}
