use core::{slice, time::Duration};

use ash::vk;
use parking_lot::Mutex;
use tracing::{debug, error};
use utilities::DebugTime;

use crate::{BarrierPlan, CaptureError, TransferCommand, VkError, sync::cmd_wait_and_reset};

/// How long a capture submission is waited on before it is abandoned.
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(100);

/// The full ordered command list of one capture.
#[derive(Debug, Clone)]
pub struct CommandSequence {
    /// The render loop's frame event, waited on and reset before anything else.
    pub frame_event: Option<vk::Event>,

    /// The barriers around the transfer.
    pub barriers: BarrierPlan,

    /// The transfer.
    pub transfer: TransferCommand,
}

impl CommandSequence {
    /// Records the sequence: event wait and reset, acquire barrier, transfer, release barrier.
    pub unsafe fn cmd_record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            if let Some(event) = self.frame_event {
                cmd_wait_and_reset(device, command_buffer, event);
            }

            self.barriers.acquire.cmd_record(device, command_buffer);
            self.transfer.cmd_record(device, command_buffer);
            self.barriers.release.cmd_record(device, command_buffer);
        }
    }
}

/// Records `sequence` into a one-time command buffer from a request scoped pool, submits it to
/// `queue` and waits on a request scoped fence for at most `timeout`.
///
/// The pool and fence are destroyed on every path. After a timeout the command buffer may still be
/// pending, the release is then best-effort on a device that has already failed.
pub(crate) unsafe fn submit_and_wait(
    device: &ash::Device,
    queue: &Mutex<vk::Queue>,
    queue_family_index: u32,
    sequence: &CommandSequence,
    timeout: Duration,
) -> Result<(), CaptureError> {
    let _timing = DebugTime::start("Capture submission");

    let command_pool = {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family_index);

        unsafe { device.create_command_pool(&create_info, None) }
            .map_err(|e| VkError::new(e, "vkCreateCommandPool"))?
    };

    let fence = match unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) } {
        Ok(fence) => fence,
        Err(e) => {
            unsafe { device.destroy_command_pool(command_pool, None) };
            return Err(VkError::new(e, "vkCreateFence").into());
        }
    };

    let result = unsafe {
        record_submit_wait(
            device,
            queue,
            command_pool,
            fence,
            sequence,
            timeout,
        )
    };

    if let Err(CaptureError::SubmissionTimeout { .. }) = &result {
        error!(
            "Capture submission timed out, the device is likely lost. Releasing its command pool, \
             fence and staging while the work may still be pending"
        );
    }

    unsafe {
        device.destroy_fence(fence, None);
        device.destroy_command_pool(command_pool, None);
    }

    result
}

unsafe fn record_submit_wait(
    device: &ash::Device,
    queue: &Mutex<vk::Queue>,
    command_pool: vk::CommandPool,
    fence: vk::Fence,
    sequence: &CommandSequence,
    timeout: Duration,
) -> Result<(), CaptureError> {
    let command_buffer = {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| VkError::new(e, "vkAllocateCommandBuffers"))?;

        buffers[0]
    };

    // Record
    unsafe {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| VkError::new(e, "vkBeginCommandBuffer"))?;

        sequence.cmd_record(device, command_buffer);

        device
            .end_command_buffer(command_buffer)
            .map_err(|e| VkError::new(e, "vkEndCommandBuffer"))?;
    }

    // Submit
    {
        let submit = vk::SubmitInfo::default().command_buffers(slice::from_ref(&command_buffer));

        let queue = queue.lock();
        unsafe { device.queue_submit(*queue, slice::from_ref(&submit), fence) }
            .map_err(|e| VkError::new(e, "vkQueueSubmit"))?;
        drop(queue);
    }

    // Wait
    let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
    match unsafe { device.wait_for_fences(slice::from_ref(&fence), true, timeout_ns) } {
        Ok(()) => {
            debug!("Capture submission complete");
            Ok(())
        }
        Err(vk::Result::TIMEOUT) => Err(CaptureError::SubmissionTimeout { timeout }),
        Err(e) => Err(VkError::new(e, "vkWaitForFences").into()),
    }
}
