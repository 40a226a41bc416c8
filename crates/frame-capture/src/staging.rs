use ash::vk;

use crate::{CaptureFormat, CaptureTarget, format::TexelKind};

/// The kind of staging resource a capture copies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum StagingKind {
    /// A linear tiled image, used for colour so blits can convert into it.
    Image,

    /// A tightly packed buffer, used for depth.
    Buffer,
}

/// What to allocate for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingDescriptor {
    /// Image or buffer.
    pub kind: StagingKind,

    /// The format of the staging contents, the capture's target format.
    pub format: vk::Format,

    /// The extent of the captured frame.
    pub extent: vk::Extent2D,

    /// Size of one texel of `format` in bytes.
    pub texel_size: u64,
}

impl StagingDescriptor {
    /// The staging resource for capturing `target` in `format`.
    pub fn new(
        target: CaptureTarget,
        format: CaptureFormat,
        texel: TexelKind,
        extent: vk::Extent2D,
    ) -> Self {
        let kind = match target {
            CaptureTarget::Color => StagingKind::Image,
            CaptureTarget::Depth => StagingKind::Buffer,
        };

        Self {
            kind,
            format: format.target,
            extent,
            texel_size: texel.size(),
        }
    }

    /// Size of the pixel data without any row padding.
    pub fn packed_size(&self) -> u64 {
        u64::from(self.extent.width) * u64::from(self.extent.height) * self.texel_size
    }

    /// Create info for a linear, host readable image.
    pub fn image_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(self.extent.into())
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }

    /// Create info for a packed buffer.
    pub fn buffer_create_info(&self) -> vk::BufferCreateInfo<'static> {
        vk::BufferCreateInfo::default()
            .size(self.packed_size())
            .usage(vk::BufferUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
    }
}

/// A capture owned, host visible destination. Single use, destroyed once read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum StagingResource {
    /// A linear image and the layout of its only subresource.
    Image {
        /// The Vulkan image.
        image: vk::Image,

        /// The image memory.
        memory: vk::DeviceMemory,

        /// The image extent.
        extent: vk::Extent2D,

        /// Offset of the subresource in the memory.
        offset: u64,

        /// Size of the subresource in bytes.
        size: u64,

        /// Bytes between the start of two rows.
        row_pitch: u64,
    },

    /// A packed buffer.
    Buffer {
        /// The Vulkan buffer.
        buffer: vk::Buffer,

        /// The buffer memory.
        memory: vk::DeviceMemory,

        /// The frame extent the buffer holds.
        extent: vk::Extent2D,

        /// The buffer size in bytes.
        size: u64,

        /// Bytes between the start of two rows.
        row_pitch: u64,
    },
}

impl StagingResource {
    /// The backing memory.
    pub fn memory(&self) -> vk::DeviceMemory {
        match *self {
            Self::Image { memory, .. } | Self::Buffer { memory, .. } => memory,
        }
    }

    /// The extent of the pixels held.
    pub fn extent(&self) -> vk::Extent2D {
        match *self {
            Self::Image { extent, .. } | Self::Buffer { extent, .. } => extent,
        }
    }

    /// Offset of the first pixel from the start of the memory.
    pub fn offset(&self) -> u64 {
        match *self {
            Self::Image { offset, .. } => offset,
            Self::Buffer { .. } => 0,
        }
    }

    /// Bytes from [`StagingResource::offset`] that hold pixels.
    pub fn size(&self) -> u64 {
        match *self {
            Self::Image { size, .. } | Self::Buffer { size, .. } => size,
        }
    }

    /// Bytes between the start of two rows.
    pub fn row_pitch(&self) -> u64 {
        match *self {
            Self::Image { row_pitch, .. } | Self::Buffer { row_pitch, .. } => row_pitch,
        }
    }

    /// The staging image as a transfer destination, `None` for buffers.
    pub fn image(&self) -> Option<vk::Image> {
        match *self {
            Self::Image { image, .. } => Some(image),
            Self::Buffer { .. } => None,
        }
    }

    /// The staging buffer as a transfer destination, `None` for images.
    pub fn buffer(&self) -> Option<vk::Buffer> {
        match *self {
            Self::Buffer { buffer, .. } => Some(buffer),
            Self::Image { .. } => None,
        }
    }
}
