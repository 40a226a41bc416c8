use core::time::Duration;

use ash::vk;

use crate::{CaptureError, CommandSequence, StagingDescriptor, StagingResource};

/// The device operations a capture needs.
///
/// Implemented by [`Vulkan`](crate::Vulkan). Every call is made from the thread driving the render
/// loop, between submitting a frame and presenting it.
pub trait CaptureDevice {
    /// The format properties of `format` on the physical device.
    unsafe fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    /// Creates a host visible, host coherent staging resource bound to fresh memory.
    ///
    /// Exhausted memory is reported as [`CaptureError::ResourceAllocation`], anything created
    /// before the failure is destroyed.
    unsafe fn allocate_staging(
        &self,
        descriptor: &StagingDescriptor,
    ) -> Result<StagingResource, CaptureError>;

    /// Records the sequence into a one-time command buffer, submits it to a graphics capable queue
    /// and waits for it to complete for at most `timeout`.
    unsafe fn execute(
        &self,
        sequence: &CommandSequence,
        timeout: Duration,
    ) -> Result<(), CaptureError>;

    /// Maps the whole of the staging memory, returning a pointer to its first byte.
    unsafe fn map_staging(&self, staging: &StagingResource) -> Result<*const u8, CaptureError>;

    /// Unmaps memory previously mapped by [`CaptureDevice::map_staging`].
    unsafe fn unmap_staging(&self, staging: &StagingResource);

    /// Destroys the staging resource and frees its memory.
    unsafe fn destroy_staging(&self, staging: StagingResource);

    /// Host side query of an event's status, `true` when signaled.
    unsafe fn event_signaled(&self, event: vk::Event) -> Result<bool, CaptureError>;
}
