//! Platform seam between the capture pipeline and camera hardware.

use async_trait::async_trait;

use super::types::{CameraError, CameraInfo, Frame, Orientation, Resolution, StreamRequest};

/// Something that can open camera streams.
///
/// Implementations may substitute a different device when the requested
/// orientation is unavailable; the returned stream reports what it actually is.
/// Opening may trigger an OS permission prompt and is allowed to take a long
/// time (or never finish); callers bound it with a timeout.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// List devices this backend can open.
    fn list_devices(&self) -> Result<Vec<CameraInfo>, CameraError>;

    /// Open a stream matching `request` as closely as possible.
    async fn open_stream(&self, request: StreamRequest) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// An open camera stream. Owned by exactly one `CaptureDevice`.
pub trait VideoStream: Send {
    /// Orientation of the device that was actually opened.
    fn orientation(&self) -> Orientation;

    /// Negotiated stream resolution.
    fn resolution(&self) -> Resolution;

    /// Most recent frame, or `None` while the camera is warming up.
    fn latest_frame(&self) -> Option<Frame>;

    /// Whether the device exposes torch/flash control.
    fn torch_capable(&self) -> bool;

    /// Switch the torch on or off.
    fn set_torch(&mut self, on: bool) -> Result<(), CameraError>;

    /// Stop every underlying track. Must not return before the hardware is idle.
    fn stop(&mut self);
}
