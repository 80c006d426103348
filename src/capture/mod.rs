//! Capture pipeline components.
//!
//! Negotiation of devices, still capture from a live device, ingestion of
//! uploaded files, and the artifact both paths produce.

mod artifact;
mod enhance;
mod errors;
mod grabber;
mod negotiator;
mod upload;

pub use artifact::{CapturedImage, SourceKind};
pub use enhance::Enhancement;
pub use errors::CaptureError;
pub use grabber::{FrameGrabber, CAPTURE_JPEG_QUALITY, CAPTURE_MEDIA_TYPE};
pub use negotiator::{CaptureDevice, DeviceNegotiator, NegotiatorSettings, DEFAULT_ACQUIRE_TIMEOUT};
pub use upload::{normalize_media_type, UploadAdapter, DEFAULT_MAX_UPLOAD_BYTES};
