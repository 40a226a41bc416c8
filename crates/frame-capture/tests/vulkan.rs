//! Captures against a real device. Returns early when Vulkan is not available.
//!

use core::{slice, time::Duration};
use std::path::{Path, PathBuf};

use ash::vk;
use frame_capture::{
    CaptureDevice, CaptureError, CaptureSettings, FrameCapture, FrameSource, FrameSync, PixelData,
    PixelSink, ResourceState, SourceImage, Vulkan, VulkanCreationError,
};

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 97,
    height: 61,
};

fn try_vulkan() -> Option<Vulkan> {
    match unsafe { Vulkan::new(true, None) } {
        Ok(vulkan) => Some(vulkan),
        Err(VulkanCreationError::NoLoader(e)) => {
            eprintln!("Skipping, no Vulkan loader: {e}");
            None
        }
        Err(VulkanCreationError::UnsupportedDevice) => {
            eprintln!("Skipping, no Vulkan device");
            None
        }
        Err(e) => panic!("Could not create the Vulkan context: {e}"),
    }
}

struct TestImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
}

impl TestImage {
    unsafe fn new(vulkan: &Vulkan, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(EXTENT.into())
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { vulkan.device().create_image(&create_info, None) }.unwrap();
        let requirements = unsafe { vulkan.device().get_image_memory_requirements(image) };

        let memory_type_index = vulkan
            .find_memory_type_index(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
            .unwrap();

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { vulkan.device().allocate_memory(&allocate_info, None) }.unwrap();
        unsafe { vulkan.device().bind_image_memory(image, memory, 0) }.unwrap();

        Self { image, memory }
    }

    unsafe fn destroy(self, vulkan: &Vulkan) {
        unsafe {
            vulkan.device().destroy_image(self.image, None);
            vulkan.device().free_memory(self.memory, None);
        }
    }
}

/// Records `f` into a one-time command buffer and waits for it.
unsafe fn onetime_command<F: FnOnce(&ash::Device, vk::CommandBuffer)>(vulkan: &Vulkan, f: F) {
    let device = vulkan.device();

    unsafe {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(vulkan.queue_family_index());
        let pool = device.create_command_pool(&pool_info, None).unwrap();

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = device.allocate_command_buffers(&allocate_info).unwrap()[0];

        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info).unwrap();
        f(device, command_buffer);
        device.end_command_buffer(command_buffer).unwrap();

        let fence = device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .unwrap();
        let submit = vk::SubmitInfo::default().command_buffers(slice::from_ref(&command_buffer));
        device
            .queue_submit(*vulkan.queue().lock(), slice::from_ref(&submit), fence)
            .unwrap();
        device
            .wait_for_fences(slice::from_ref(&fence), true, u64::MAX)
            .unwrap();

        device.destroy_fence(fence, None);
        device.destroy_command_pool(pool, None);
    }
}

/// Records a barrier moving a whole image from `before` to `after`.
unsafe fn cmd_transition(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    before: ResourceState,
    after: ResourceState,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(before.access)
        .dst_access_mask(after.access)
        .old_layout(before.layout)
        .new_layout(after.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .level_count(1)
                .layer_count(1),
        );

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            before.stage,
            after.stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            slice::from_ref(&barrier),
        );
    }
}

#[derive(Default)]
struct CopySink {
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl PixelSink for CopySink {
    type Error = CaptureError;

    fn write(&mut self, pixels: &PixelData<'_>, _path: &Path) -> Result<(), Self::Error> {
        match pixels {
            PixelData::Color8x4(pixels) => self.color = pixels.to_vec(),
            PixelData::Depth32Float(pixels) => self.depth = pixels.to_vec(),
            _ => return Err(CaptureError::UnsupportedFormat(pixels.format().target)),
        }

        Ok(())
    }
}

#[test]
fn capture_offscreen_colour() {
    let Some(vulkan) = try_vulkan() else {
        return;
    };

    let format = vk::Format::R8G8B8A8_UNORM;
    let image = unsafe { TestImage::new(&vulkan, format, vk::ImageUsageFlags::COLOR_ATTACHMENT) };
    let frame_sync = unsafe { FrameSync::new(vulkan.device()) }.unwrap();

    // "Render" a frame: clear, leave it as a colour attachment and signal the frame event.
    unsafe {
        onetime_command(&vulkan, |device, command_buffer| {
            cmd_transition(
                device,
                command_buffer,
                image.image,
                vk::ImageAspectFlags::COLOR,
                ResourceState::UNINITIALISED,
                ResourceState::TRANSFER_DESTINATION,
            );

            let clear = vk::ClearColorValue {
                float32: [0.25, 0.5, 0.75, 1.0],
            };
            let range = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .layer_count(1);
            device.cmd_clear_color_image(
                command_buffer,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear,
                slice::from_ref(&range),
            );

            cmd_transition(
                device,
                command_buffer,
                image.image,
                vk::ImageAspectFlags::COLOR,
                ResourceState::TRANSFER_DESTINATION,
                ResourceState::COLOR_ATTACHMENT,
            );

            frame_sync.cmd_signal(command_buffer);
        });
    }

    let frame = FrameSource {
        extent: EXTENT,
        color: SourceImage::new(image.image, format, ResourceState::COLOR_ATTACHMENT),
        depth: None,
        frame_event: Some(frame_sync.event()),
    };

    let mut sink = CopySink::default();
    let capture = FrameCapture::default();
    let report = unsafe {
        capture.capture_color(&vulkan, &frame, PathBuf::from("colour.png"), &mut sink)
    }
    .unwrap();

    assert_eq!(report.format.target, vk::Format::R8G8B8A8_UNORM);
    assert_eq!(sink.color.len(), (EXTENT.width * EXTENT.height) as usize);

    for pixel in &sink.color {
        for (channel, expected) in pixel.iter().zip([64_u8, 128, 191, 255]) {
            assert!(channel.abs_diff(expected) <= 1, "{pixel:?}");
        }
    }

    // The capture reset the event.
    assert!(!unsafe { vulkan.event_signaled(frame_sync.event()) }.unwrap());

    unsafe { vulkan.device_wait_idle() };
    drop(frame_sync);
    unsafe { image.destroy(&vulkan) };
}

#[test]
fn capture_offscreen_depth() {
    let Some(vulkan) = try_vulkan() else {
        return;
    };

    let format = vk::Format::D32_SFLOAT;
    let properties = unsafe { vulkan.format_properties(format) };
    if !properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    {
        eprintln!("Skipping, D32_SFLOAT is not a supported attachment format");
        return;
    }

    let image = unsafe {
        TestImage::new(&vulkan, format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
    };

    unsafe {
        onetime_command(&vulkan, |device, command_buffer| {
            cmd_transition(
                device,
                command_buffer,
                image.image,
                vk::ImageAspectFlags::DEPTH,
                ResourceState::UNINITIALISED,
                ResourceState::TRANSFER_DESTINATION,
            );

            let clear = vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            };
            let range = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::DEPTH)
                .level_count(1)
                .layer_count(1);
            device.cmd_clear_depth_stencil_image(
                command_buffer,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear,
                slice::from_ref(&range),
            );

            cmd_transition(
                device,
                command_buffer,
                image.image,
                vk::ImageAspectFlags::DEPTH,
                ResourceState::TRANSFER_DESTINATION,
                ResourceState::DEPTH_ATTACHMENT,
            );
        });
    }

    let color = unsafe {
        TestImage::new(
            &vulkan,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        )
    };

    let frame = FrameSource {
        extent: EXTENT,
        color: SourceImage::new(
            color.image,
            vk::Format::R8G8B8A8_UNORM,
            ResourceState::COLOR_ATTACHMENT,
        ),
        depth: Some(SourceImage::depth_attachment(image.image, format)),
        frame_event: None,
    };

    let mut sink = CopySink::default();
    let capture = FrameCapture::default();
    let report = unsafe {
        capture.capture_depth(&vulkan, &frame, PathBuf::from("depth.png"), &mut sink)
    }
    .unwrap();

    let statistics = report.depth_statistics.unwrap();
    assert_eq!(statistics.far_plane, u64::from(EXTENT.width * EXTENT.height));
    assert_eq!(statistics.finite, 0);
    assert!(sink.depth.iter().all(|&depth| depth == 1.0));

    // A short timeout is still long enough for a small capture.
    let quick = FrameCapture::new(CaptureSettings {
        submission_timeout: Duration::from_secs(5),
        ..Default::default()
    });
    assert!(
        unsafe { quick.capture_depth(&vulkan, &frame, PathBuf::from("depth.png"), &mut sink) }
            .is_ok()
    );

    unsafe { vulkan.device_wait_idle() };
    unsafe { color.destroy(&vulkan) };
    unsafe { image.destroy(&vulkan) };
}
