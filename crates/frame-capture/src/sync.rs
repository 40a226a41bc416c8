use core::slice;

use ash::vk;
use tracing::debug;

use crate::VkError;

/// The stages that have finished writing the frame's colour and depth attachments.
pub(crate) const RENDER_WRITE_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw(),
);

/// A reusable event ordering capture work after the frame's rendering writes.
///
/// The render loop records [`FrameSync::cmd_signal`] at the end of every frame. A capture's command
/// sequence starts by waiting on the event and resetting it, so the event is unsignaled again for
/// the next frame. The event is created unsignaled.
pub struct FrameSync {
    device: ash::Device,
    event: vk::Event,
}

impl FrameSync {
    /// Creates the event, unsignaled.
    pub unsafe fn new(device: &ash::Device) -> Result<Self, VkError> {
        let create_info = vk::EventCreateInfo::default();

        let event = unsafe { device.create_event(&create_info, None) }
            .map_err(|e| VkError::new(e, "vkCreateEvent"))?;

        Ok(Self {
            device: device.clone(),
            event,
        })
    }

    /// The event handle, handed to captures through [`FrameSource`](crate::FrameSource).
    #[inline]
    pub fn event(&self) -> vk::Event {
        self.event
    }

    /// Records the signal at the end of a frame's command buffer, once the attachment writes are
    /// complete.
    pub unsafe fn cmd_signal(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .cmd_set_event(command_buffer, self.event, RENDER_WRITE_STAGES);
        }
    }

    /// Polls the event from the host until it is signaled or `max_wait` elapses.
    ///
    /// Diagnostic only, the device side wait in the capture's command sequence is what orders the
    /// capture. Returns if the event was observed signaled.
    #[cfg(feature = "event-polling")]
    pub unsafe fn poll_until_signaled<D: crate::CaptureDevice + ?Sized>(
        device: &D,
        event: vk::Event,
        max_wait: core::time::Duration,
    ) -> Result<bool, crate::CaptureError> {
        use std::time::Instant;

        const POLL_INTERVAL: core::time::Duration = core::time::Duration::from_millis(1);

        let start = Instant::now();
        let mut polls = 0_u32;

        loop {
            if unsafe { device.event_signaled(event)? } {
                debug!(
                    "Frame event signaled after {polls} polls ({})",
                    utilities::display_duration(start.elapsed())
                );
                return Ok(true);
            }

            if start.elapsed() >= max_wait {
                tracing::warn!(
                    "Frame event was not signaled within {}",
                    utilities::display_duration(max_wait)
                );
                return Ok(false);
            }

            polls += 1;
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Records the wait on the frame event followed by its reset.
pub(crate) unsafe fn cmd_wait_and_reset(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    event: vk::Event,
) {
    unsafe {
        device.cmd_wait_events(
            command_buffer,
            slice::from_ref(&event),
            RENDER_WRITE_STAGES,
            vk::PipelineStageFlags::TRANSFER,
            &[],
            &[],
            &[],
        );

        device.cmd_reset_event(command_buffer, event, vk::PipelineStageFlags::TRANSFER);
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        debug!("Destroying frame event");
        unsafe { self.device.destroy_event(self.event, None) };
    }
}
