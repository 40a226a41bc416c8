use alloc::sync::Arc;
use core::slice;

use ash::vk;
use frame_capture::{FarPlane, FrameSync, VkError, Vulkan};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;

use super::{
    CreationError, Renderer,
    surface::Surface,
    swapchain::{Swapchain, select_depth_format, select_surface_format},
};

/// Stages that write the attachments.
const ATTACHMENT_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw()
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
);

const ATTACHMENT_WRITES: vk::AccessFlags = vk::AccessFlags::from_raw(
    vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
);

impl Renderer {
    /// Create a new instance of the renderer.
    pub unsafe fn new(
        vulkan: Arc<Vulkan>,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        window_extent: vk::Extent2D,
        far_plane: FarPlane,
    ) -> Result<Self, CreationError> {
        let surface = unsafe { Surface::new(vulkan.as_ref(), display_handle, window_handle) }?;

        let surface_format = {
            let formats = unsafe {
                surface
                    .surface_instance()
                    .get_physical_device_surface_formats(vulkan.physical_device(), surface.surface())
            }
            .map_err(|e| VkError::new(e, "vkGetPhysicalDeviceSurfaceFormatsKHR"))?;

            select_surface_format(&formats).ok_or(CreationError::NoSurfaceFormat)?
        };

        let depth_format = select_depth_format(vulkan.as_ref()).ok_or(CreationError::NoDepthFormat)?;

        info!(
            "Rendering to {:?} with a {:?} depth buffer",
            surface_format.format, depth_format
        );

        let device = vulkan.device();

        let render_pass = unsafe { create_render_pass(device, surface_format.format, depth_format) }?;

        let swapchain = match unsafe {
            Swapchain::new(
                vulkan.as_ref(),
                &surface,
                render_pass,
                surface_format,
                depth_format,
                window_extent,
                None,
            )
        } {
            Ok(swapchain) => swapchain,
            Err(e) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(e);
            }
        };

        // Frame resources
        let command_pool = {
            let create_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::TRANSIENT)
                .queue_family_index(vulkan.queue_family_index());

            unsafe { device.create_command_pool(&create_info, None) }
                .map_err(|e| VkError::new(e, "vkCreateCommandPool"))?
        };

        let command_buffer = {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            unsafe { device.allocate_command_buffers(&allocate_info) }
                .map_err(|e| VkError::new(e, "vkAllocateCommandBuffers"))?[0]
        };

        let in_flight_fence = {
            let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

            unsafe { device.create_fence(&create_info, None) }
                .map_err(|e| VkError::new(e, "vkCreateFence"))?
        };

        let image_available =
            unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
                .map_err(|e| VkError::new(e, "vkCreateSemaphore"))?;

        let frame_sync = unsafe { FrameSync::new(device) }?;

        Ok(Self {
            swapchain,
            surface_format,
            depth_format,
            window_extent,

            render_pass,

            command_pool,
            command_buffer,
            in_flight_fence,
            image_available,

            frame_sync,
            far_plane,
            frame: 0,

            surface,
            vulkan,
        })
    }
}

/// A single subpass clearing both attachments. The colour attachment ends presentable, the depth
/// attachment stays an attachment so it can be captured.
unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass, VkError> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
            .stencil_store_op(vk::AttachmentStoreOp::STORE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_reference = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let depth_reference = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(slice::from_ref(&color_reference))
        .depth_stencil_attachment(&depth_reference);

    let dependencies = [
        // Previous frames and captures before this frame's writes.
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(ATTACHMENT_STAGES | vk::PipelineStageFlags::TRANSFER)
            .src_access_mask(ATTACHMENT_WRITES)
            .dst_stage_mask(ATTACHMENT_STAGES)
            .dst_access_mask(ATTACHMENT_WRITES),
        // Final layout transitions before the frame event is set.
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(ATTACHMENT_STAGES)
            .src_access_mask(ATTACHMENT_WRITES)
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .dst_access_mask(vk::AccessFlags::empty()),
    ];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(slice::from_ref(&subpass))
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| VkError::new(e, "vkCreateRenderPass"))
}
