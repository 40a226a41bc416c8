use core::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// What a capture reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum CaptureTarget {
    /// The presented colour image.
    Color,

    /// The depth attachment.
    Depth,
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Color => write!(f, "colour"),
            Self::Depth => write!(f, "depth"),
        }
    }
}

/// Lifecycle of a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::exhaustive_enums)]
pub enum CaptureRequestState {
    /// Nothing requested.
    #[default]
    Idle,

    /// Requested, waiting for the render loop to service it.
    Requested,

    /// Being serviced.
    Executing,
}

#[derive(Debug, Default)]
struct RequestSlot {
    state: CaptureRequestState,
    path: Option<PathBuf>,
}

/// The pending capture requests, one slot per target.
///
/// Owned by the render loop driver and passed into
/// [`FrameCapture::service`](crate::FrameCapture::service), which consumes them.
#[derive(Debug, Default)]
pub struct CaptureRequests {
    color: RequestSlot,
    depth: RequestSlot,
}

impl CaptureRequests {
    /// No requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a capture of `target` written to `path`.
    ///
    /// Requesting a target that is already requested replaces the destination, the last request
    /// wins. Returns `false` if the target is currently executing and the request was ignored.
    pub fn request<P: Into<PathBuf>>(&mut self, target: CaptureTarget, path: P) -> bool {
        let slot = self.slot_mut(target);

        match slot.state {
            CaptureRequestState::Idle => {
                slot.state = CaptureRequestState::Requested;
                slot.path = Some(path.into());
                true
            }

            CaptureRequestState::Requested => {
                debug!("Replacing the pending {target} capture request");
                slot.path = Some(path.into());
                true
            }

            CaptureRequestState::Executing => {
                debug!("Ignoring {target} capture request, a capture is executing");
                false
            }
        }
    }

    /// The state of the request for `target`.
    pub fn state(&self, target: CaptureTarget) -> CaptureRequestState {
        self.slot(target).state
    }

    /// The destination of the request for `target`, if any.
    pub fn path(&self, target: CaptureTarget) -> Option<&Path> {
        self.slot(target).path.as_deref()
    }

    /// If any target is requested.
    pub fn any_requested(&self) -> bool {
        self.state(CaptureTarget::Color) == CaptureRequestState::Requested
            || self.state(CaptureTarget::Depth) == CaptureRequestState::Requested
    }

    /// Moves a requested target to executing, returning its destination.
    pub(crate) fn begin(&mut self, target: CaptureTarget) -> Option<PathBuf> {
        let slot = self.slot_mut(target);

        if slot.state != CaptureRequestState::Requested {
            return None;
        }

        slot.state = CaptureRequestState::Executing;
        slot.path.clone()
    }

    /// Returns an executing target to idle, whatever the outcome of the capture.
    pub(crate) fn finish(&mut self, target: CaptureTarget) {
        let slot = self.slot_mut(target);
        slot.state = CaptureRequestState::Idle;
        slot.path = None;
    }

    fn slot(&self, target: CaptureTarget) -> &RequestSlot {
        match target {
            CaptureTarget::Color => &self.color,
            CaptureTarget::Depth => &self.depth,
        }
    }

    fn slot_mut(&mut self, target: CaptureTarget) -> &mut RequestSlot {
        match target {
            CaptureTarget::Color => &mut self.color,
            CaptureTarget::Depth => &mut self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{CaptureRequestState, CaptureRequests, CaptureTarget};

    #[test]
    fn request_lifecycle() {
        let mut requests = CaptureRequests::new();
        assert_eq!(requests.state(CaptureTarget::Color), CaptureRequestState::Idle);
        assert!(!requests.any_requested());

        assert!(requests.request(CaptureTarget::Color, "colour.png"));
        assert_eq!(
            requests.state(CaptureTarget::Color),
            CaptureRequestState::Requested
        );
        assert_eq!(requests.state(CaptureTarget::Depth), CaptureRequestState::Idle);
        assert!(requests.any_requested());

        let path = requests.begin(CaptureTarget::Color).unwrap();
        assert_eq!(path, Path::new("colour.png"));
        assert_eq!(
            requests.state(CaptureTarget::Color),
            CaptureRequestState::Executing
        );

        requests.finish(CaptureTarget::Color);
        assert_eq!(requests.state(CaptureTarget::Color), CaptureRequestState::Idle);
        assert!(requests.path(CaptureTarget::Color).is_none());
    }

    #[test]
    fn last_request_wins() {
        let mut requests = CaptureRequests::new();

        requests.request(CaptureTarget::Depth, "first.png");
        requests.request(CaptureTarget::Depth, "second.png");

        assert_eq!(
            requests.path(CaptureTarget::Depth),
            Some(Path::new("second.png"))
        );
        assert_eq!(
            requests.begin(CaptureTarget::Depth).unwrap(),
            Path::new("second.png")
        );
    }

    #[test]
    fn executing_requests_are_not_interrupted() {
        let mut requests = CaptureRequests::new();

        requests.request(CaptureTarget::Color, "a.png");
        requests.begin(CaptureTarget::Color);

        assert!(!requests.request(CaptureTarget::Color, "b.png"));
        assert_eq!(requests.path(CaptureTarget::Color), Some(Path::new("a.png")));

        // Only requested slots can begin.
        assert!(requests.begin(CaptureTarget::Color).is_none());
        assert!(requests.begin(CaptureTarget::Depth).is_none());
    }
}
