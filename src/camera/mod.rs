//! Camera access behind a backend trait.
//!
//! - Backend seam via [`CameraBackend`] and [`VideoStream`]
//! - Scriptable in-process backend via [`SyntheticCamera`]
//! - System webcams via `HardwareCamera` (`hardware` feature)
//! - Request and frame types via [`StreamRequest`], [`Resolution`] and [`Frame`]

mod backend;
mod device;
mod synthetic;
mod types;

#[cfg(feature = "hardware")]
mod capture_loop;
#[cfg(feature = "hardware")]
mod frame_utils;
#[cfg(feature = "hardware")]
mod hardware;

pub use backend::{CameraBackend, VideoStream};
pub use device::{infer_orientation, pick_device};
#[cfg(feature = "hardware")]
pub use hardware::HardwareCamera;
pub use synthetic::{PermissionOutcome, SyntheticCamera, SyntheticCameraBuilder};
pub use types::{CameraError, CameraInfo, Frame, Orientation, Resolution, StreamRequest};
