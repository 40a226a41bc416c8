use ash::vk;
use frame_capture::{VkError, Vulkan};
use tracing::{debug, warn};

use super::{CreationError, surface::Surface};

/// The swapchain and everything sized to it.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,

    pub images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,

    /// Signaled by the frame submission for each image, waited on by present.
    pub render_finished: Vec<vk::Semaphore>,

    pub depth: DepthBuffer,

    /// If the images were created with `TRANSFER_SRC`, colour captures are refused otherwise.
    pub color_transfer_source: bool,

    pub needs_to_rebuild: bool,
}

pub struct DepthBuffer {
    pub image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        vulkan: &Vulkan,
        surface: &Surface,
        render_pass: vk::RenderPass,
        surface_format: vk::SurfaceFormatKHR,
        depth_format: vk::Format,
        window_extent: vk::Extent2D,
        old_swapchain: Option<vk::SwapchainKHR>,
    ) -> Result<Self, CreationError> {
        let capabilities = unsafe {
            surface
                .surface_instance()
                .get_physical_device_surface_capabilities(
                    vulkan.physical_device(),
                    surface.surface(),
                )
        }
        .map_err(|e| VkError::new(e, "vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;

        let extent = if capabilities.current_extent.width == u32::MAX {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        } else {
            capabilities.current_extent
        };

        let image_count = {
            let count = capabilities.min_image_count + 1;
            if capabilities.max_image_count > 0 {
                count.min(capabilities.max_image_count)
            } else {
                count
            }
        };

        let (usage, color_transfer_source) = image_usage(capabilities.supported_usage_flags);
        if !color_transfer_source {
            warn!("Swapchain images cannot be a transfer source, colour captures are disabled");
        }

        let composite_alpha = [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|&flag| capabilities.supported_composite_alpha.contains(flag))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain.unwrap_or_default());

        let swapchain = unsafe {
            surface
                .swapchain_device()
                .create_swapchain(&create_info, None)
        }
        .map_err(|e| VkError::new(e, "vkCreateSwapchainKHR"))?;

        // From here on partially created objects are collected into `this` so a failure can destroy
        // them.
        let mut this = Self {
            swapchain,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            render_finished: Vec::new(),
            depth: DepthBuffer {
                image: vk::Image::null(),
                memory: vk::DeviceMemory::null(),
                view: vk::ImageView::null(),
            },
            color_transfer_source,
            needs_to_rebuild: false,
        };

        if let Err(e) =
            unsafe { this.create_resources(vulkan, surface, render_pass, surface_format, depth_format) }
        {
            unsafe { this.destroy(vulkan, surface) };
            return Err(e);
        }

        debug!(
            "Created swapchain: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            surface_format.format
        );

        Ok(this)
    }

    unsafe fn create_resources(
        &mut self,
        vulkan: &Vulkan,
        surface: &Surface,
        render_pass: vk::RenderPass,
        surface_format: vk::SurfaceFormatKHR,
        depth_format: vk::Format,
    ) -> Result<(), CreationError> {
        let device = vulkan.device();

        self.images = unsafe { surface.swapchain_device().get_swapchain_images(self.swapchain) }
            .map_err(|e| VkError::new(e, "vkGetSwapchainImagesKHR"))?;

        for &image in &self.images {
            let view = unsafe {
                create_view(
                    device,
                    image,
                    surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                )
            }?;
            self.views.push(view);
        }

        unsafe { self.depth.create(vulkan, depth_format, self.extent) }?;

        for &view in &self.views {
            let attachments = [view, self.depth.view];

            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }
                .map_err(|e| VkError::new(e, "vkCreateFramebuffer"))?;
            self.framebuffers.push(framebuffer);
        }

        for _ in &self.images {
            let semaphore =
                unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
                    .map_err(|e| VkError::new(e, "vkCreateSemaphore"))?;
            self.render_finished.push(semaphore);
        }

        Ok(())
    }

    /// Destroys the swapchain and its resources, the device must not be using them.
    pub unsafe fn destroy(&mut self, vulkan: &Vulkan, surface: &Surface) {
        let device = vulkan.device();

        unsafe {
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }

            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }

            self.depth.destroy(device);

            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }

            self.images.clear();

            surface
                .swapchain_device()
                .destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }
}

impl DepthBuffer {
    unsafe fn create(
        &mut self,
        vulkan: &Vulkan,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<(), CreationError> {
        let device = vulkan.device();

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent.into())
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            )
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        self.image = unsafe { device.create_image(&create_info, None) }
            .map_err(|e| VkError::new(e, "vkCreateImage"))?;

        let requirements = unsafe { device.get_image_memory_requirements(self.image) };
        let memory_type_index = vulkan
            .find_memory_type_index(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
            .ok_or(CreationError::NoSuitableMemoryType)?;

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        self.memory = unsafe { device.allocate_memory(&allocate_info, None) }
            .map_err(|e| VkError::new(e, "vkAllocateMemory"))?;

        unsafe { device.bind_image_memory(self.image, self.memory, 0) }
            .map_err(|e| VkError::new(e, "vkBindImageMemory"))?;

        self.view = unsafe { create_view(device, self.image, format, depth_view_aspect(format)) }?;

        Ok(())
    }

    unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }

        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

/// Swapchain image usage, with `TRANSFER_SRC` when the surface supports it.
fn image_usage(supported: vk::ImageUsageFlags) -> (vk::ImageUsageFlags, bool) {
    let transfer_source = supported.contains(vk::ImageUsageFlags::TRANSFER_SRC);

    let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    if transfer_source {
        usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }

    (usage, transfer_source)
}

/// Attachment views of combined formats cover both aspects.
fn depth_view_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView, VkError> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .level_count(1)
                .layer_count(1),
        );

    unsafe { device.create_image_view(&create_info, None) }
        .map_err(|e| VkError::new(e, "vkCreateImageView"))
}

/// Prefers 8-bit UNORM in the sRGB colour space, otherwise the first supported format.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];

    preferred
        .iter()
        .find_map(|&format| {
            formats.iter().copied().find(|surface_format| {
                surface_format.format == format
                    && surface_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

/// The first depth format that can be rendered to and copied from.
pub fn select_depth_format(vulkan: &Vulkan) -> Option<vk::Format> {
    let required =
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT | vk::FormatFeatureFlags::TRANSFER_SRC;

    [
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ]
    .into_iter()
    .find(|&format| {
        let properties = unsafe {
            vulkan
                .instance()
                .get_physical_device_format_properties(vulkan.physical_device(), format)
        };

        properties.optimal_tiling_features.contains(required)
    })
}
