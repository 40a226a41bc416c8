use core::slice;

use ash::vk;

use crate::{CaptureFormat, ConversionMode, StagingResource};

/// The single data movement command of a capture, over the whole frame extent.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::exhaustive_enums)]
pub enum TransferCommand {
    /// Format converting blit with nearest filtering.
    Blit {
        /// The source image, in `TRANSFER_SRC_OPTIMAL`.
        source: vk::Image,

        /// The staging image, in `TRANSFER_DST_OPTIMAL`.
        destination: vk::Image,

        /// The blit region.
        region: vk::ImageBlit,
    },

    /// Byte exact image to image copy.
    CopyImage {
        /// The source image, in `TRANSFER_SRC_OPTIMAL`.
        source: vk::Image,

        /// The staging image, in `TRANSFER_DST_OPTIMAL`.
        destination: vk::Image,

        /// The copy region.
        region: vk::ImageCopy,
    },

    /// Byte exact image to buffer copy.
    CopyImageToBuffer {
        /// The source image, in `TRANSFER_SRC_OPTIMAL`.
        source: vk::Image,

        /// The staging buffer.
        destination: vk::Buffer,

        /// The copy region.
        region: vk::BufferImageCopy,
    },
}

impl TransferCommand {
    /// The transfer for a colour capture. Blits when `format` converts, otherwise copies.
    ///
    /// Returns `None` if the staging resource is not an image.
    pub fn color(
        format: CaptureFormat,
        source: vk::Image,
        staging: &StagingResource,
        extent: vk::Extent2D,
    ) -> Option<Self> {
        let destination = staging.image()?;
        let subresource = subresource_layers(vk::ImageAspectFlags::COLOR);

        let command = match format.mode {
            ConversionMode::Blit => {
                let corner = vk::Offset3D::default()
                    .x(extent.width as i32)
                    .y(extent.height as i32)
                    .z(1);

                let region = vk::ImageBlit::default()
                    .src_subresource(subresource)
                    .src_offsets([vk::Offset3D::default(), corner])
                    .dst_subresource(subresource)
                    .dst_offsets([vk::Offset3D::default(), corner]);

                Self::Blit {
                    source,
                    destination,
                    region,
                }
            }

            ConversionMode::Copy => {
                let region = vk::ImageCopy::default()
                    .src_subresource(subresource)
                    .src_offset(vk::Offset3D::default())
                    .dst_subresource(subresource)
                    .dst_offset(vk::Offset3D::default())
                    .extent(extent.into());

                Self::CopyImage {
                    source,
                    destination,
                    region,
                }
            }
        };

        Some(command)
    }

    /// The transfer for a depth capture, copying only the depth aspect into a packed buffer.
    ///
    /// Returns `None` if the staging resource is not a buffer.
    pub fn depth(
        source: vk::Image,
        staging: &StagingResource,
        extent: vk::Extent2D,
    ) -> Option<Self> {
        let destination = staging.buffer()?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(extent.width)
            .buffer_image_height(extent.height)
            .image_subresource(subresource_layers(vk::ImageAspectFlags::DEPTH))
            .image_offset(vk::Offset3D::default())
            .image_extent(extent.into());

        Some(Self::CopyImageToBuffer {
            source,
            destination,
            region,
        })
    }

    /// Records the command.
    pub unsafe fn cmd_record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        match self {
            Self::Blit {
                source,
                destination,
                region,
            } => unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    *source,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    *destination,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    slice::from_ref(region),
                    vk::Filter::NEAREST,
                );
            },

            Self::CopyImage {
                source,
                destination,
                region,
            } => unsafe {
                device.cmd_copy_image(
                    command_buffer,
                    *source,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    *destination,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    slice::from_ref(region),
                );
            },

            Self::CopyImageToBuffer {
                source,
                destination,
                region,
            } => unsafe {
                device.cmd_copy_image_to_buffer(
                    command_buffer,
                    *source,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    *destination,
                    slice::from_ref(region),
                );
            },
        }
    }
}

fn subresource_layers(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(aspect)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1)
}
