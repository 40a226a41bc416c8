use core::fmt::Debug;

pub use new::VulkanCreationError;

use ash::{ext, vk};
use parking_lot::Mutex;
use tracing::error;

mod device;
mod drop;
mod new;

/// The Vulkan Context, owns the instance and the device captures and the renderer share.
///
/// A single graphics capable queue is created, guarded by a mutex so the render loop and captures
/// never submit at the same time.
pub struct Vulkan {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,

    queue_family_index: u32,
    queue: Mutex<vk::Queue>,

    debug_utils: Option<DebugUtils>,
}

/// The validation messenger, only present when debugging.
struct DebugUtils {
    instance: ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl Debug for Vulkan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let properties = unsafe {
            self.instance
                .get_physical_device_properties(self.physical_device)
        };

        let api_version = {
            let major = vk::api_version_major(properties.api_version);
            let minor = vk::api_version_minor(properties.api_version);
            let patch = vk::api_version_patch(properties.api_version);

            format!("{major}.{minor}.{patch}")
        };

        let device_name = properties.device_name_as_c_str().unwrap_or(c"Invalid name");

        f.debug_struct("Vulkan")
            .field("device_name", &device_name)
            .field("device_type", &properties.device_type)
            .field("api_version", &api_version)
            .field("queue_family_index", &self.queue_family_index)
            .field("debug", &self.debug_utils.is_some())
            .finish_non_exhaustive()
    }
}

impl Vulkan {
    /// The loaded Vulkan entry points.
    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The Vulkan instance.
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The logical device.
    #[inline]
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// The selected physical device.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The index of the graphics capable queue family.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// The graphics queue, lock it for every submission or present.
    #[inline]
    pub fn queue(&self) -> &Mutex<vk::Queue> {
        &self.queue
    }

    /// If the validation messenger is active.
    #[inline]
    pub fn is_debugging(&self) -> bool {
        self.debug_utils.is_some()
    }

    /// Finds a memory type allowed by `type_bits` with all of `flags`.
    pub fn find_memory_type_index(
        &self,
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        let properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        };

        properties.memory_types[..properties.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                type_bits & (1 << index) != 0 && memory_type.property_flags.contains(flags)
            })
            .map(|(index, _)| index as u32)
    }

    /// Waits for the device to idle while holding the queue.
    pub unsafe fn device_wait_idle(&self) {
        let queue = self.queue.lock();

        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            error!("Failed to wait for device idle: {e}");
        }

        drop(queue);
    }
}
