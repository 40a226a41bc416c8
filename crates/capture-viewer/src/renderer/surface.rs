use ash::{khr, vk};
use frame_capture::{VkError, Vulkan};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::CreationError;

pub struct Surface {
    surface: vk::SurfaceKHR,

    surface_instance: khr::surface::Instance,
    swapchain_device: khr::swapchain::Device,
}

impl Surface {
    pub unsafe fn new(
        vulkan: &Vulkan,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<Self, CreationError> {
        let surface = unsafe {
            ash_window::create_surface(
                vulkan.entry(),
                vulkan.instance(),
                display_handle,
                window_handle,
                None,
            )
            .map_err(|e| VkError::new(e, "createSurface"))?
        };

        let surface_instance = khr::surface::Instance::new(vulkan.entry(), vulkan.instance());
        let swapchain_device = khr::swapchain::Device::new(vulkan.instance(), vulkan.device());

        let supported = unsafe {
            surface_instance.get_physical_device_surface_support(
                vulkan.physical_device(),
                vulkan.queue_family_index(),
                surface,
            )
        };

        match supported {
            Ok(true) => {}
            Ok(false) => {
                unsafe { surface_instance.destroy_surface(surface, None) };
                return Err(CreationError::PresentUnsupported);
            }
            Err(e) => {
                unsafe { surface_instance.destroy_surface(surface, None) };
                return Err(VkError::new(e, "vkGetPhysicalDeviceSurfaceSupportKHR").into());
            }
        }

        Ok(Self {
            surface,
            surface_instance,
            swapchain_device,
        })
    }

    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    #[inline]
    pub fn surface_instance(&self) -> &khr::surface::Instance {
        &self.surface_instance
    }

    #[inline]
    pub fn swapchain_device(&self) -> &khr::swapchain::Device {
        &self.swapchain_device
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_instance.destroy_surface(self.surface, None);
        }
    }
}
