use tracing::error;

use super::{Vulkan, new::destroy_instance};

impl Drop for Vulkan {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle: {e}");
            }

            self.device.destroy_device(None);

            destroy_instance(&self.instance, self.debug_utils.as_ref());
        }
    }
}
