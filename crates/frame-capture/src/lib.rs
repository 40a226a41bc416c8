//! # Frame Capture
//! Reads the presented colour image or the active depth buffer of a Vulkan renderer back into host
//! memory without disturbing the render loop.
//!
//! A capture is serviced inline between submitting a frame and presenting it:
//! 1. The source format is checked for blit conversion support ([`CaptureFormat`]).
//! 1. A host visible staging resource is allocated ([`StagingResource`]).
//! 1. The barriers and the transfer are planned as data ([`BarrierPlan`], [`TransferCommand`])
//!    and recorded into a one-time command buffer ([`CommandSequence`]).
//! 1. The submission is waited on with a bounded timeout.
//! 1. The staging memory is mapped into a typed view ([`PixelData`]) and handed to a
//!    [`PixelSink`].
//!

#![warn(missing_docs)]

extern crate alloc;

pub use barrier::{BarrierPhase, BarrierPlan, ResourceState, Transition, TransitionResource};
pub use capture::{CaptureReport, CaptureSettings, FrameCapture, FrameSource, SourceImage};
pub use device::CaptureDevice;
pub use error::{AllocationError, CaptureError, VkError};
pub use format::{CANONICAL_COLOR_FORMAT, CaptureFormat, ConversionMode, TexelKind};
pub use readback::{
    DepthStatistics, FarPlane, MappedStaging, PixelBuffer2D, PixelData, PixelSink,
};
pub use request::{CaptureRequestState, CaptureRequests, CaptureTarget};
pub use staging::{StagingDescriptor, StagingKind, StagingResource};
pub use submit::{CommandSequence, DEFAULT_SUBMISSION_TIMEOUT};
pub use sync::FrameSync;
pub use transfer::TransferCommand;
pub use vulkan::{Vulkan, VulkanCreationError};

mod barrier;
mod capture;
mod device;
mod error;
mod format;
mod readback;
mod request;
mod staging;
mod submit;
mod sync;
mod transfer;
mod vulkan;
