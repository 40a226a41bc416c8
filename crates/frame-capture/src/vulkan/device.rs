use core::time::Duration;

use ash::vk;
use tracing::debug;

use crate::{
    AllocationError, CaptureDevice, CaptureError, CommandSequence, StagingDescriptor,
    StagingKind, StagingResource, VkError, submit::submit_and_wait,
};

use super::Vulkan;

const STAGING_MEMORY: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

impl Vulkan {
    /// Allocates host visible, host coherent memory for `requirements`.
    unsafe fn allocate_staging_memory(
        &self,
        requirements: vk::MemoryRequirements,
    ) -> Result<vk::DeviceMemory, AllocationError> {
        let memory_type_index = self
            .find_memory_type_index(requirements.memory_type_bits, STAGING_MEMORY)
            .ok_or(AllocationError::NoSuitableMemoryType)?;

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { self.device.allocate_memory(&allocate_info, None) }
            .map_err(|e| VkError::new(e, "vkAllocateMemory"))?;

        Ok(memory)
    }

    unsafe fn allocate_staging_image(
        &self,
        descriptor: &StagingDescriptor,
    ) -> Result<StagingResource, AllocationError> {
        let image = unsafe {
            self.device
                .create_image(&descriptor.image_create_info(), None)
        }
        .map_err(|e| VkError::new(e, "vkCreateImage"))?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let memory = match unsafe { self.allocate_staging_memory(requirements) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            unsafe {
                self.device.destroy_image(image, None);
                self.device.free_memory(memory, None);
            }
            return Err(VkError::new(e, "vkBindImageMemory").into());
        }

        let layout = unsafe {
            let subresource = vk::ImageSubresource::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .array_layer(0);

            self.device.get_image_subresource_layout(image, subresource)
        };

        Ok(StagingResource::Image {
            image,
            memory,
            extent: descriptor.extent,
            offset: layout.offset,
            size: layout.size,
            row_pitch: layout.row_pitch,
        })
    }

    unsafe fn allocate_staging_buffer(
        &self,
        descriptor: &StagingDescriptor,
    ) -> Result<StagingResource, AllocationError> {
        let create_info = descriptor.buffer_create_info();

        let buffer = unsafe { self.device.create_buffer(&create_info, None) }
            .map_err(|e| VkError::new(e, "vkCreateBuffer"))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory = match unsafe { self.allocate_staging_memory(requirements) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(VkError::new(e, "vkBindBufferMemory").into());
        }

        Ok(StagingResource::Buffer {
            buffer,
            memory,
            extent: descriptor.extent,
            size: create_info.size,
            row_pitch: u64::from(descriptor.extent.width) * descriptor.texel_size,
        })
    }
}

impl CaptureDevice for Vulkan {
    unsafe fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    unsafe fn allocate_staging(
        &self,
        descriptor: &StagingDescriptor,
    ) -> Result<StagingResource, CaptureError> {
        let staging = match descriptor.kind {
            StagingKind::Image => unsafe { self.allocate_staging_image(descriptor)? },
            StagingKind::Buffer => unsafe { self.allocate_staging_buffer(descriptor)? },
        };

        Ok(staging)
    }

    unsafe fn execute(
        &self,
        sequence: &CommandSequence,
        timeout: Duration,
    ) -> Result<(), CaptureError> {
        unsafe {
            submit_and_wait(
                &self.device,
                &self.queue,
                self.queue_family_index,
                sequence,
                timeout,
            )
        }
    }

    unsafe fn map_staging(&self, staging: &StagingResource) -> Result<*const u8, CaptureError> {
        let pointer = unsafe {
            self.device.map_memory(
                staging.memory(),
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )
        }
        .map_err(|e| VkError::new(e, "vkMapMemory"))?;

        Ok(pointer.cast_const().cast())
    }

    unsafe fn unmap_staging(&self, staging: &StagingResource) {
        unsafe { self.device.unmap_memory(staging.memory()) };
    }

    unsafe fn destroy_staging(&self, staging: StagingResource) {
        unsafe {
            match staging {
                StagingResource::Image { image, memory, .. } => {
                    self.device.destroy_image(image, None);
                    self.device.free_memory(memory, None);
                }
                StagingResource::Buffer { buffer, memory, .. } => {
                    self.device.destroy_buffer(buffer, None);
                    self.device.free_memory(memory, None);
                }
            }
        }

        debug!("Released staging memory");
    }

    unsafe fn event_signaled(&self, event: vk::Event) -> Result<bool, CaptureError> {
        let signaled = unsafe { self.device.get_event_status(event) }
            .map_err(|e| VkError::new(e, "vkGetEventStatus"))?;

        Ok(signaled)
    }
}
