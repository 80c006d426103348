//! Error types for capture operations.
//!
//! Every device, media and session failure is a [`CaptureError`]. Each variant
//! maps to one short user-facing message via [`CaptureError::user_message`].

use crate::camera::CameraError;
use crate::classify::ClassificationError;
use crate::session::SessionState;

/// Errors that can occur while acquiring, capturing, ingesting or handing off.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Camera not ready: no frame available yet")]
    DeviceNotReady,

    #[error("Unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("Cannot {operation} while session is {state}")]
    InvalidSessionState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("History index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

impl CaptureError {
    /// One human-readable message per error category, suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => {
                "Unable to access camera. Please allow camera permissions and try again."
            }
            CaptureError::DeviceUnavailable(_) => {
                "Unable to access camera. Please try again or upload an image instead."
            }
            CaptureError::NotSupported(_) => "This feature is not supported on this device.",
            CaptureError::DeviceNotReady => "Camera not ready. Please wait a moment and try again.",
            CaptureError::UnsupportedMediaType(_) => "Please choose an image file.",
            CaptureError::DecodeError(_) => "That image could not be read. Please try another file.",
            CaptureError::EncodeError(_) => "Unable to save the photo. Please try again.",
            CaptureError::UploadTooLarge { .. } => "That image is too large. Please choose a smaller file.",
            CaptureError::InvalidSessionState { .. } => "That action is not available right now.",
            CaptureError::IndexOutOfRange { .. } => "That scan is no longer in history.",
            CaptureError::Classification(_) => "Error processing image. Please try again.",
        }
    }

    /// Whether retrying the same operation may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::DeviceUnavailable(_))
    }
}

impl From<CameraError> for CaptureError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied => CaptureError::PermissionDenied,
            CameraError::NotSupported(what) => CaptureError::NotSupported(what),
            CameraError::NotFound => CaptureError::DeviceUnavailable("no camera found".to_string()),
            CameraError::OpenFailed(msg) | CameraError::StreamFailed(msg) => {
                CaptureError::DeviceUnavailable(msg)
            }
        }
    }
}
