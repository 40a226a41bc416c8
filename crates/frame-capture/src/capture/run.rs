use alloc::boxed::Box;
use std::path::PathBuf;

use ash::vk;
use tracing::{debug, info, info_span, warn};
use utilities::{DebugTime, display_bytes};

use crate::{
    BarrierPlan, CaptureDevice, CaptureError, CaptureFormat, CaptureTarget, CommandSequence,
    DepthStatistics, MappedStaging, PixelSink, StagingDescriptor, StagingKind, StagingResource,
    TransferCommand, TransitionResource,
};

use super::{CaptureReport, FrameCapture, FrameSource};

impl FrameCapture {
    /// Runs one capture: resolve, allocate, submit, read back, release.
    ///
    /// `frame_event` is taken once the sequence that waits on it is built, the event is reset by
    /// that sequence and cannot be waited on again this frame.
    pub(super) unsafe fn capture<D, S>(
        &self,
        device: &D,
        target: CaptureTarget,
        frame: &FrameSource,
        frame_event: &mut Option<vk::Event>,
        path: PathBuf,
        sink: &mut S,
    ) -> Result<CaptureReport, CaptureError>
    where
        D: CaptureDevice + ?Sized,
        S: PixelSink + ?Sized,
    {
        let _span = info_span!("[Capture]", %target).entered();

        let source = frame.source(target)?;
        let extent = frame.extent;

        let format = match target {
            CaptureTarget::Color => unsafe { CaptureFormat::query_color(device, source.format) },
            CaptureTarget::Depth => CaptureFormat::resolve_depth(source.format),
        };

        // Fail before any GPU work if the pixels cannot be represented on the host.
        let texel = format.texel()?;

        debug!(
            "Capturing {}x{} {:?} as {:?} ({:?})",
            extent.width, extent.height, format.source, format.target, format.mode
        );

        let descriptor = StagingDescriptor::new(target, format, texel, extent);

        let staging = {
            let _timing = DebugTime::start("Allocate staging");
            unsafe { OwnedStaging::allocate(device, &descriptor)? }
        };
        debug!("Allocated staging {:?}: {}", descriptor.kind, display_bytes(staging.size()));

        let transfer = match target {
            CaptureTarget::Color => TransferCommand::color(format, source.image, &staging, extent),
            CaptureTarget::Depth => TransferCommand::depth(source.image, &staging, extent),
        }
        .ok_or(CaptureError::StagingMismatch {
            expected: descriptor.kind,
        })?;

        let sequence = CommandSequence {
            frame_event: frame_event.take(),
            barriers: BarrierPlan::new(
                TransitionResource::image(source.image, source.format),
                source.steady_state,
                &staging,
            ),
            transfer,
        };

        if self.settings.poll_frame_event {
            unsafe { self.poll_frame_event(device, sequence.frame_event) }?;
        }

        unsafe { device.execute(&sequence, self.settings.submission_timeout)? };

        let depth_statistics = {
            let mapping = unsafe { MappedStaging::map(device, &staging)? };
            let pixels = mapping.pixels(format)?;

            let depth_statistics = DepthStatistics::collect(&pixels, self.settings.far_plane);
            if let Some(statistics) = depth_statistics {
                info!(
                    "Depth: {} pixels at the far plane, {} finite",
                    statistics.far_plane, statistics.finite
                );
            }

            let _timing = DebugTime::start("Write capture");
            sink.write(&pixels, &path)
                .map_err(|e| CaptureError::Sink {
                    path: path.clone(),
                    source: Box::new(e),
                })?;

            depth_statistics
        };

        Ok(CaptureReport {
            target,
            format,
            extent,
            path,
            depth_statistics,
        })
    }

    #[cfg(feature = "event-polling")]
    unsafe fn poll_frame_event<D: CaptureDevice + ?Sized>(
        &self,
        device: &D,
        frame_event: Option<vk::Event>,
    ) -> Result<(), CaptureError> {
        let Some(event) = frame_event else {
            debug!("No frame event left to poll");
            return Ok(());
        };

        unsafe {
            crate::FrameSync::poll_until_signaled(device, event, self.settings.submission_timeout)?
        };

        Ok(())
    }

    #[cfg(not(feature = "event-polling"))]
    unsafe fn poll_frame_event<D: CaptureDevice + ?Sized>(
        &self,
        _device: &D,
        _frame_event: Option<vk::Event>,
    ) -> Result<(), CaptureError> {
        warn!("Frame event polling was requested but the 'event-polling' feature is disabled");
        Ok(())
    }
}

/// A staging resource destroyed when dropped, on every path out of a capture.
struct OwnedStaging<'d, D: CaptureDevice + ?Sized> {
    device: &'d D,
    staging: StagingResource,
}

impl<'d, D: CaptureDevice + ?Sized> OwnedStaging<'d, D> {
    unsafe fn allocate(device: &'d D, descriptor: &StagingDescriptor) -> Result<Self, CaptureError> {
        let staging = unsafe { device.allocate_staging(descriptor)? };

        let kind = match staging {
            StagingResource::Image { .. } => StagingKind::Image,
            StagingResource::Buffer { .. } => StagingKind::Buffer,
        };

        let owned = Self { device, staging };

        if kind != descriptor.kind {
            return Err(CaptureError::StagingMismatch {
                expected: descriptor.kind,
            });
        }

        Ok(owned)
    }
}

impl<D: CaptureDevice + ?Sized> core::ops::Deref for OwnedStaging<'_, D> {
    type Target = StagingResource;

    fn deref(&self) -> &Self::Target {
        &self.staging
    }
}

impl<D: CaptureDevice + ?Sized> Drop for OwnedStaging<'_, D> {
    fn drop(&mut self) {
        debug!("Destroying staging resource");
        unsafe { self.device.destroy_staging(self.staging) };
    }
}
