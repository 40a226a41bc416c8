use alloc::vec::Vec;
use core::ffi::{CStr, c_void};

use ash::{ext, khr, vk};
use parking_lot::Mutex;
use raw_window_handle::RawDisplayHandle;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::VkError;

use super::{DebugUtils, Vulkan};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

impl Vulkan {
    /// Loads Vulkan and creates the context.
    ///
    /// When `try_debug` is set and the validation layer is installed, validation is enabled and its
    /// messages are forwarded to `tracing`. When a `display_handle` is given the surface and
    /// swapchain extensions it needs are enabled.
    pub unsafe fn new(
        try_debug: bool,
        display_handle: Option<RawDisplayHandle>,
    ) -> Result<Self, VulkanCreationError> {
        let entry = unsafe { ash::Entry::load() }?;

        let should_debug = try_debug && {
            let layers = unsafe { entry.enumerate_instance_layer_properties() }
                .map_err(|e| VkError::new(e, "vkEnumerateInstanceLayerProperties"))?;

            let supported = layers
                .iter()
                .any(|layer| layer.layer_name_as_c_str().unwrap_or(c"") == VALIDATION_LAYER);

            if !supported {
                warn!("Debugging was requested but the validation layer is not installed");
            }

            supported
        };

        // Create instance.
        let instance = {
            let app_info = vk::ApplicationInfo::default()
                .api_version(vk::API_VERSION_1_2)
                .application_name(c"Capture Viewer")
                .engine_name(c"Frame Capture");

            let mut extensions = Vec::new();
            if let Some(handle) = display_handle {
                let required = ash_window::enumerate_required_extensions(handle)
                    .map_err(|e| VkError::new(e, "enumerateWindowExtensions"))?;
                extensions.extend_from_slice(required);
            }

            let mut layers = Vec::new();
            if should_debug {
                extensions.push(ext::debug_utils::NAME.as_ptr());
                layers.push(VALIDATION_LAYER.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layers)
                .enabled_extension_names(&extensions);

            unsafe { entry.create_instance(&create_info, None) }
                .map_err(|e| VkError::new(e, "vkCreateInstance"))?
        };

        let debug_utils = if should_debug {
            match unsafe { DebugUtils::new(&entry, &instance) } {
                Ok(debug_utils) => Some(debug_utils),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let selected = unsafe { select_device(&instance, display_handle.is_some()) };
        let (physical_device, queue_family_index) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { destroy_instance(&instance, debug_utils.as_ref()) };
                return Err(e);
            }
        };

        // Create logical device.
        let device = {
            let mut extensions = Vec::new();

            if display_handle.is_some() {
                extensions.push(khr::swapchain::NAME.as_ptr());
            }

            // Request portability if the device supports it.
            let supports_portability =
                unsafe { supports_extension(&instance, physical_device, khr::portability_subset::NAME) }
                    .unwrap_or(false);
            if supports_portability {
                extensions.push(khr::portability_subset::NAME.as_ptr());
            }

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities)];

            let create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&extensions);

            match unsafe { instance.create_device(physical_device, &create_info, None) } {
                Ok(device) => device,
                Err(e) => {
                    unsafe { destroy_instance(&instance, debug_utils.as_ref()) };
                    return Err(VkError::new(e, "vkCreateDevice").into());
                }
            }
        };

        let queue = Mutex::new(unsafe { device.get_device_queue(queue_family_index, 0) });

        let vulkan = Self {
            entry,
            instance,
            physical_device,
            device,
            queue_family_index,
            queue,
            debug_utils,
        };

        info!("Created Vulkan Context: {:?}", vulkan);

        Ok(vulkan)
    }
}

/// Picks the most capable device with a graphics queue family, and swapchain support when
/// presenting.
unsafe fn select_device(
    instance: &ash::Instance,
    presenting: bool,
) -> Result<(vk::PhysicalDevice, u32), VulkanCreationError> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(|e| VkError::new(e, "vkEnumeratePhysicalDevices"))?;

    let mut candidates = Vec::with_capacity(devices.len());
    for device in devices {
        if presenting && !unsafe { supports_extension(instance, device, khr::swapchain::NAME)? } {
            continue;
        }

        let queue_family = unsafe { instance.get_physical_device_queue_family_properties(device) }
            .into_iter()
            .position(|properties| properties.queue_flags.contains(vk::QueueFlags::GRAPHICS));

        if let Some(index) = queue_family {
            candidates.push((device, index as u32));
        }
    }

    candidates
        .into_iter()
        .min_by_key(|&(device, _)| {
            let properties = unsafe { instance.get_physical_device_properties(device) };

            match properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
                vk::PhysicalDeviceType::CPU => 3,
                vk::PhysicalDeviceType::OTHER => 4,
                _ => 5,
            }
        })
        .ok_or(VulkanCreationError::UnsupportedDevice)
}

unsafe fn supports_extension(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    name: &CStr,
) -> Result<bool, VkError> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .map_err(|e| VkError::new(e, "vkEnumerateDeviceExtensionProperties"))?;

    Ok(extensions
        .iter()
        .any(|properties| properties.extension_name_as_c_str().unwrap_or(c"") == name))
}

pub(super) unsafe fn destroy_instance(instance: &ash::Instance, debug_utils: Option<&DebugUtils>) {
    unsafe {
        if let Some(debug_utils) = debug_utils {
            debug_utils
                .instance
                .destroy_debug_utils_messenger(debug_utils.messenger, None);
        }

        instance.destroy_instance(None);
    }
}

impl DebugUtils {
    unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, VkError> {
        let debug_instance = ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let messenger = unsafe { debug_instance.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| VkError::new(e, "vkCreateDebugUtilsMessengerEXT"))?;

        Ok(Self {
            instance: debug_instance,
            messenger,
        })
    }
}

/// Forwards validation messages to `tracing`.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = unsafe {
        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            alloc::borrow::Cow::Borrowed("No message")
        } else {
            CStr::from_ptr((*p_callback_data).p_message).to_string_lossy()
        }
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[{message_type:?}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[{message_type:?}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[{message_type:?}] {message}"),
        _ => debug!("[{message_type:?}] {message}"),
    }

    vk::FALSE
}

/// Error variants from trying to create the Vulkan Context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VulkanCreationError {
    /// The Vulkan loader could not be found or loaded.
    #[error("Could not load Vulkan:\n{0}")]
    NoLoader(#[from] ash::LoadingError),

    /// A Vulkan call returned an error.
    #[allow(clippy::enum_variant_names)]
    #[error(transparent)]
    VkError(#[from] VkError),

    /// No Physical Devices meet the requirements.
    #[error("No Physical Devices meet the requirements.")]
    UnsupportedDevice,
}
