//! waste-scanner library crate.
//!
//! Camera and upload capture pipeline that produces normalized image
//! artifacts for an external waste classifier.

pub mod camera;
pub mod capture;
pub mod classify;
pub mod config;
pub mod history;
pub mod retry;
pub mod session;

pub use capture::{CaptureError, CapturedImage, SourceKind};
pub use classify::{Classification, ClassificationError, Classifier, ScanOutcome};
pub use history::{SessionHistory, HISTORY_CAPACITY};
pub use session::{CaptureSession, SessionState};
