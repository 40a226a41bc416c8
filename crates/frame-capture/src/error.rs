use alloc::boxed::Box;
use core::{error::Error as StdError, time::Duration};
use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::{CaptureTarget, StagingKind};

/// A Vulkan call returned an error, labelled with the entry point that produced it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{call} returned {result}")]
pub struct VkError {
    /// The result returned by Vulkan.
    pub result: vk::Result,

    /// The Vulkan entry point, e.g. `vkQueueSubmit`.
    pub call: &'static str,
}

impl VkError {
    /// Label a Vulkan result with the call that returned it.
    #[inline]
    pub fn new(result: vk::Result, call: &'static str) -> Self {
        Self { result, call }
    }

    /// If the error is Vulkan reporting exhausted host or device memory.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self.result,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY
        )
    }
}

/// Allocating a staging resource failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AllocationError {
    /// No memory type is both host visible and host coherent for the resource.
    #[error("No suitable memory types are available for the allocation")]
    NoSuitableMemoryType,

    /// A Vulkan call returned an error.
    #[error(transparent)]
    VkError(#[from] VkError),
}

/// Capture error variants. Every variant aborts the single request it occurred in.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The staging resource could not be allocated, no GPU work was submitted.
    #[error("Could not allocate the staging resource:\n{0}")]
    ResourceAllocation(#[from] AllocationError),

    /// The capture submission did not complete within the bounded wait.
    #[error("The capture did not complete within {timeout:?}")]
    SubmissionTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The format has no defined host pixel representation, no GPU work was submitted.
    #[error("Format {0:?} has no host pixel representation")]
    UnsupportedFormat(vk::Format),

    /// The mapped staging memory is smaller than the pixel view over it.
    #[error("The pixel view needs {required} bytes but only {mapped} bytes are mapped")]
    MappedSizeMismatch {
        /// Bytes the view reads.
        required: u64,

        /// Bytes mapped.
        mapped: u64,
    },

    /// The device allocated a different kind of staging resource than was described.
    #[error("Expected a staging {expected:?} from the device")]
    StagingMismatch {
        /// The kind that was described.
        expected: StagingKind,
    },

    /// A depth capture was requested for a frame without a depth attachment.
    #[error("The frame has no depth attachment to capture")]
    MissingDepthAttachment,

    /// The source image was not created with transfer source usage, no GPU work was submitted.
    #[error("The {0} image cannot be copied from")]
    NotTransferSource(CaptureTarget),

    /// A Vulkan call returned an error.
    #[error(transparent)]
    Vulkan(#[from] VkError),

    /// The serialization sink failed to write the pixels.
    #[error("Could not write the capture to '{}':\n{source}", path.display())]
    Sink {
        /// The destination the sink was writing to.
        path: PathBuf,

        /// The error reported by the sink.
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use ash::vk;

    use super::{AllocationError, CaptureError, VkError};

    #[test]
    fn labelled_vk_error() {
        let error = VkError::new(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "vkAllocateMemory");
        assert!(error.is_out_of_memory());
        assert!(error.to_string().starts_with("vkAllocateMemory returned"));

        let error = VkError::new(vk::Result::ERROR_DEVICE_LOST, "vkQueueSubmit");
        assert!(!error.is_out_of_memory());
    }

    #[test]
    fn timeout_message() {
        let error = CaptureError::SubmissionTimeout {
            timeout: Duration::from_secs(100),
        };
        assert_eq!(error.to_string(), "The capture did not complete within 100s");
    }

    #[test]
    fn allocation_converts() {
        let error: CaptureError = AllocationError::NoSuitableMemoryType.into();
        assert!(matches!(
            error,
            CaptureError::ResourceAllocation(AllocationError::NoSuitableMemoryType)
        ));
    }
}
