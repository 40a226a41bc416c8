use alloc::vec::Vec;
use core::time::Duration;
use std::path::PathBuf;

use ash::vk;
use tracing::{error, info};

use crate::{
    CaptureDevice, CaptureError, CaptureFormat, CaptureRequests, CaptureTarget,
    DEFAULT_SUBMISSION_TIMEOUT, DepthStatistics, FarPlane, PixelSink, ResourceState,
};

mod run;

/// An image owned by the renderer that can be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceImage {
    /// The Vulkan image.
    pub image: vk::Image,

    /// The image format.
    pub format: vk::Format,

    /// The state the renderer keeps the image in between frames, the capture returns it there.
    pub steady_state: ResourceState,

    /// If the image was created with `TRANSFER_SRC` usage. Captures of other images are refused.
    pub transfer_source: bool,
}

impl SourceImage {
    /// A source in any steady state.
    pub fn new(image: vk::Image, format: vk::Format, steady_state: ResourceState) -> Self {
        Self {
            image,
            format,
            steady_state,
            transfer_source: true,
        }
    }

    /// Marks whether the image can be copied from.
    pub fn with_transfer_source(mut self, transfer_source: bool) -> Self {
        self.transfer_source = transfer_source;
        self
    }

    /// A swapchain image that has been rendered and is waiting to be presented.
    pub fn presentable(image: vk::Image, format: vk::Format) -> Self {
        Self::new(image, format, ResourceState::PRESENTABLE)
    }

    /// A depth-stencil attachment.
    pub fn depth_attachment(image: vk::Image, format: vk::Format) -> Self {
        Self::new(image, format, ResourceState::DEPTH_ATTACHMENT)
    }
}

/// What the render loop exposes about the frame it just submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSource {
    /// The frame extent, the whole extent is captured.
    pub extent: vk::Extent2D,

    /// The colour image of the frame.
    pub color: SourceImage,

    /// The depth attachment of the frame, if the renderer has one.
    pub depth: Option<SourceImage>,

    /// The event the frame signals once its attachment writes are complete.
    ///
    /// Without an event the capture relies on the acquire barrier alone.
    pub frame_event: Option<vk::Event>,
}

impl FrameSource {
    /// The image a capture of `target` reads.
    pub fn source(&self, target: CaptureTarget) -> Result<SourceImage, CaptureError> {
        let source = match target {
            CaptureTarget::Color => self.color,
            CaptureTarget::Depth => self.depth.ok_or(CaptureError::MissingDepthAttachment)?,
        };

        if !source.transfer_source {
            return Err(CaptureError::NotTransferSource(target));
        }

        Ok(source)
    }
}

/// Settings that apply to every capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// How long the capture submission is waited on.
    pub submission_timeout: Duration,

    /// The renderer's depth convention.
    pub far_plane: FarPlane,

    /// Poll the frame event from the host before submitting. Requires the `event-polling`
    /// feature.
    pub poll_frame_event: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
            far_plane: FarPlane::Standard,
            poll_frame_event: false,
        }
    }
}

/// The outcome of a successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    /// What was captured.
    pub target: CaptureTarget,

    /// The resolved format.
    pub format: CaptureFormat,

    /// The captured extent.
    pub extent: vk::Extent2D,

    /// Where the sink wrote the pixels.
    pub path: PathBuf,

    /// Far plane and finite pixel counts, depth captures only.
    pub depth_statistics: Option<DepthStatistics>,
}

/// Services capture requests between submitting a frame and presenting it.
#[derive(Debug, Clone, Default)]
pub struct FrameCapture {
    settings: CaptureSettings,
}

impl FrameCapture {
    /// Creates the orchestrator.
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    /// The settings captures run with.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Captures the frame's colour image into `sink`.
    ///
    /// The capture waits on and resets the frame event. To capture both targets of one frame use
    /// [`FrameCapture::service`].
    ///
    /// # Safety
    /// The handles in `frame` must be valid on `device`, the frame must have been submitted and not
    /// yet presented.
    pub unsafe fn capture_color<D, S>(
        &self,
        device: &D,
        frame: &FrameSource,
        path: PathBuf,
        sink: &mut S,
    ) -> Result<CaptureReport, CaptureError>
    where
        D: CaptureDevice + ?Sized,
        S: PixelSink + ?Sized,
    {
        let mut frame_event = frame.frame_event;
        unsafe {
            self.capture(
                device,
                CaptureTarget::Color,
                frame,
                &mut frame_event,
                path,
                sink,
            )
        }
    }

    /// Captures the frame's depth attachment into `sink`.
    ///
    /// # Safety
    /// See [`FrameCapture::capture_color`].
    pub unsafe fn capture_depth<D, S>(
        &self,
        device: &D,
        frame: &FrameSource,
        path: PathBuf,
        sink: &mut S,
    ) -> Result<CaptureReport, CaptureError>
    where
        D: CaptureDevice + ?Sized,
        S: PixelSink + ?Sized,
    {
        let mut frame_event = frame.frame_event;
        unsafe {
            self.capture(
                device,
                CaptureTarget::Depth,
                frame,
                &mut frame_event,
                path,
                sink,
            )
        }
    }

    /// Runs every requested capture, colour first, returning each request to idle whatever the
    /// outcome. Failures are logged and returned, they never abort the render loop.
    ///
    /// Only the first submitted capture waits on the frame event. Later captures of the same frame
    /// are ordered behind it by submission order.
    ///
    /// # Safety
    /// See [`FrameCapture::capture_color`].
    pub unsafe fn service<D, S>(
        &self,
        device: &D,
        requests: &mut CaptureRequests,
        frame: &FrameSource,
        sink: &mut S,
    ) -> Vec<(CaptureTarget, Result<CaptureReport, CaptureError>)>
    where
        D: CaptureDevice + ?Sized,
        S: PixelSink + ?Sized,
    {
        let mut results = Vec::new();
        let mut frame_event = frame.frame_event;

        for target in [CaptureTarget::Color, CaptureTarget::Depth] {
            let Some(path) = requests.begin(target) else {
                continue;
            };

            let result =
                unsafe { self.capture(device, target, frame, &mut frame_event, path, sink) };

            match &result {
                Ok(report) => info!("Saved {target} capture to '{}'", report.path.display()),
                Err(e) => error!("Could not capture {target}:\n{e}"),
            }

            requests.finish(target);
            results.push((target, result));
        }

        results
    }
}
