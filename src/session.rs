//! Capture session: the state machine tying negotiation, capture, uploads,
//! history and classification handoff together.
//!
//! ```text
//! Idle --start--> Negotiating --ok--> Live --capture--> Captured --handoff--> Idle
//!  |                  |                 |                   |
//!  |                  +--err--> Idle    +--stop--> Idle     +--reset--> Idle
//!  +--ingest--> Captured
//! ```
//!
//! A live device and a pending image never coexist. Operations attempted from
//! the wrong state fail with `InvalidSessionState` instead of doing nothing.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::camera::{CameraBackend, Orientation};
use crate::capture::{
    CaptureDevice, CaptureError, CapturedImage, DeviceNegotiator, FrameGrabber,
    NegotiatorSettings, UploadAdapter,
};
use crate::classify::{Classifier, ScanOutcome};
use crate::config::Config;
use crate::history::SessionHistory;

/// Where a [`CaptureSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No device, no pending image
    #[default]
    Idle,
    /// Device acquisition in flight
    Negotiating,
    /// Device active and streaming
    Live,
    /// Pending image awaiting handoff, device released
    Captured,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Negotiating => write!(f, "negotiating"),
            SessionState::Live => write!(f, "live"),
            SessionState::Captured => write!(f, "captured"),
        }
    }
}

/// Publishes `during` now and `fallback` on drop unless disarmed.
///
/// Keeps the session out of `Negotiating` when an acquisition future is dropped.
struct StateGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    fallback: SessionState,
    armed: bool,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<SessionState>, during: SessionState, fallback: SessionState) -> Self {
        publish(state, during);
        Self {
            state,
            fallback,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Session operation cancelled, returning to {}", self.fallback);
            publish(self.state, self.fallback);
        }
    }
}

/// Send `next` to subscribers only if it differs from the current state.
/// Returns the previous state.
fn publish(state: &watch::Sender<SessionState>, next: SessionState) -> SessionState {
    let mut prev = next;
    state.send_if_modified(|current| {
        prev = *current;
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    prev
}

/// One scanner session: at most one live device, at most one pending image.
pub struct CaptureSession {
    negotiator: DeviceNegotiator,
    grabber: FrameGrabber,
    uploads: UploadAdapter,
    history: SessionHistory,
    device: Option<CaptureDevice>,
    pending: Option<CapturedImage>,
    state: watch::Sender<SessionState>,
    last_error: Option<&'static str>,
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state())
            .field("device", &self.device)
            .field("pending", &self.pending)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    pub fn new(negotiator: DeviceNegotiator, uploads: UploadAdapter) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            negotiator,
            grabber: FrameGrabber::new(),
            uploads,
            history: SessionHistory::new(),
            device: None,
            pending: None,
            state,
            last_error: None,
        }
    }

    /// Session with default negotiation and upload settings.
    pub fn with_backend(backend: Arc<dyn CameraBackend>) -> Self {
        Self::new(
            DeviceNegotiator::new(backend, NegotiatorSettings::default()),
            UploadAdapter::default(),
        )
    }

    /// Session configured from a loaded [`Config`].
    pub fn from_config(backend: Arc<dyn CameraBackend>, config: &Config) -> Self {
        Self::new(
            DeviceNegotiator::new(backend, config.camera.negotiator_settings()),
            UploadAdapter::new(config.upload.max_bytes),
        )
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes, including `Negotiating` while `start` is awaited.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn device(&self) -> Option<&CaptureDevice> {
        self.device.as_ref()
    }

    /// Image awaiting handoff.
    pub fn pending(&self) -> Option<&CapturedImage> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// User-facing message for the most recent failure, cleared on success.
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error
    }

    pub fn negotiator(&self) -> &DeviceNegotiator {
        &self.negotiator
    }

    /// Acquire a camera. Valid from `Idle`; ends `Live`, or `Idle` on failure.
    ///
    /// Returns the orientation actually opened, which may differ from the
    /// request when the platform substituted a device.
    pub async fn start(&mut self, orientation: Orientation) -> Result<Orientation, CaptureError> {
        self.require("start camera", &[SessionState::Idle])?;
        self.negotiate(orientation).await
    }

    /// Capture a still from the live camera. Valid from `Live`.
    ///
    /// The device is released before encoding; the session stays `Live`
    /// until the image is accepted. A camera still warming up fails with
    /// `DeviceNotReady` and stays `Live`. An encoding failure, or dropping the
    /// future mid-encode, leaves the session `Idle`.
    pub async fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        self.require("capture", &[SessionState::Live])?;

        let mut device = match self.device.take() {
            Some(device) => device,
            None => {
                self.set_state(SessionState::Idle);
                let err = self.invalid("capture");
                return Err(self.fail(err));
            }
        };

        let frame = match self.grabber.grab_frame(&device) {
            Ok(frame) => frame,
            Err(e) => {
                self.device = Some(device);
                return Err(self.fail(e));
            }
        };

        self.negotiator.release(&mut device);
        drop(device);

        let rendered = {
            let guard = StateGuard::enter(&self.state, SessionState::Live, SessionState::Idle);
            let grabber = self.grabber.clone();
            let rendered = tokio::task::spawn_blocking(move || grabber.render(frame))
                .await
                .map_err(|e| CaptureError::EncodeError(e.to_string()))
                .and_then(|r| r);
            guard.disarm();
            rendered
        };

        match rendered {
            Ok(image) => {
                log::info!(
                    "Captured {}x{} image {}",
                    image.width(),
                    image.height(),
                    image.digest()
                );
                Ok(self.accept(image))
            }
            Err(e) => {
                self.set_state(SessionState::Idle);
                Err(self.fail(e))
            }
        }
    }

    /// Ingest an uploaded file. Valid from `Idle`; ends `Captured`, or
    /// stays `Idle` on failure.
    pub async fn ingest(&mut self, bytes: Vec<u8>, media_type: &str) -> Result<CapturedImage, CaptureError> {
        self.require("ingest upload", &[SessionState::Idle])?;

        let uploads = self.uploads.clone();
        let media_type = media_type.to_string();
        let ingested = tokio::task::spawn_blocking(move || uploads.ingest(bytes, &media_type))
            .await
            .map_err(|e| CaptureError::DecodeError(e.to_string()))
            .and_then(|r| r);

        match ingested {
            Ok(image) => Ok(self.accept(image)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Release the camera and re-acquire facing the other way. Valid from `Live`.
    ///
    /// If re-acquisition fails the session is left `Idle` with no device and
    /// the error is returned.
    pub async fn switch_orientation(&mut self) -> Result<Orientation, CaptureError> {
        self.require("switch orientation", &[SessionState::Live])?;

        let target = self
            .device
            .as_ref()
            .map(|d| d.orientation().opposite())
            .unwrap_or_default();
        self.release_device();
        self.set_state(SessionState::Idle);

        log::info!("Switching to {} camera", target);
        self.negotiate(target).await
    }

    /// Whether the live camera has torch control. Valid from `Live`.
    pub fn query_torch(&mut self) -> Result<bool, CaptureError> {
        self.require("query flash", &[SessionState::Live])?;
        match self.device.as_mut() {
            Some(device) => Ok(self.negotiator.query_torch(device)),
            None => Err(self.invalid("query flash")),
        }
    }

    /// Turn the torch on or off. Valid from `Live`.
    pub fn set_torch(&mut self, on: bool) -> Result<(), CaptureError> {
        self.require("set flash", &[SessionState::Live])?;
        let result = match self.device.as_mut() {
            Some(device) => self.negotiator.set_torch(device, on),
            None => Err(self.invalid("set flash")),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Flip the torch. Returns the new torch state.
    pub fn toggle_torch(&mut self) -> Result<bool, CaptureError> {
        let on = !self.device.as_ref().is_some_and(|d| d.torch_enabled());
        self.set_torch(on)?;
        Ok(on)
    }

    /// Make a history entry the pending image again. Valid from `Idle` or `Captured`.
    pub fn select_from_history(&mut self, index: usize) -> Result<CapturedImage, CaptureError> {
        self.require(
            "select from history",
            &[SessionState::Idle, SessionState::Captured],
        )?;
        let image = self.history.select(index).map_err(|e| self.fail(e))?;
        self.pending = Some(image.clone());
        self.last_error = None;
        self.set_state(SessionState::Captured);
        Ok(image)
    }

    /// Hand the pending image to a classifier. Valid from `Captured`.
    ///
    /// On success the pending image is consumed and the session returns to
    /// `Idle`. On failure the image stays pending so the handoff can be retried.
    pub async fn handoff<C>(&mut self, classifier: &C) -> Result<ScanOutcome, CaptureError>
    where
        C: Classifier + ?Sized,
    {
        self.require("hand off image", &[SessionState::Captured])?;
        let image = match self.pending.clone() {
            Some(image) => image,
            None => {
                let err = self.invalid("hand off image");
                return Err(self.fail(err));
            }
        };

        match classifier.classify(&image).await {
            Ok(classification) => {
                log::info!(
                    "Image {} classified as {} ({:.0}%)",
                    image.digest(),
                    classification.category,
                    classification.confidence * 100.0
                );
                self.pending = None;
                self.last_error = None;
                self.set_state(SessionState::Idle);
                Ok(ScanOutcome {
                    classification,
                    image,
                })
            }
            Err(e) => {
                log::warn!("Classification of {} failed: {}", image.digest(), e);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Release the camera if one is live. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        self.release_device();
        if self.state() == SessionState::Live {
            self.set_state(SessionState::Idle);
        }
    }

    /// Drop the camera and any pending image, back to `Idle`. History is kept.
    pub fn reset(&mut self) {
        self.release_device();
        self.pending = None;
        self.last_error = None;
        self.set_state(SessionState::Idle);
    }

    async fn negotiate(&mut self, orientation: Orientation) -> Result<Orientation, CaptureError> {
        self.last_error = None;

        let acquired = {
            let guard = StateGuard::enter(&self.state, SessionState::Negotiating, SessionState::Idle);
            let acquired = self.negotiator.acquire(orientation).await;
            guard.disarm();
            acquired
        };

        match acquired {
            Ok(device) => {
                let effective = device.orientation();
                self.device = Some(device);
                self.set_state(SessionState::Live);
                Ok(effective)
            }
            Err(e) => {
                self.set_state(SessionState::Idle);
                Err(self.fail(e))
            }
        }
    }

    fn accept(&mut self, image: CapturedImage) -> CapturedImage {
        self.history.record(image.clone());
        self.pending = Some(image.clone());
        self.last_error = None;
        self.set_state(SessionState::Captured);
        image
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            self.negotiator.release(&mut device);
        }
    }

    fn set_state(&self, next: SessionState) {
        let prev = publish(&self.state, next);
        if prev != next {
            log::debug!("Session {} -> {}", prev, next);
        }
    }

    fn invalid(&self, operation: &'static str) -> CaptureError {
        CaptureError::InvalidSessionState {
            operation,
            state: self.state(),
        }
    }

    fn require(&mut self, operation: &'static str, allowed: &[SessionState]) -> Result<(), CaptureError> {
        if allowed.contains(&self.state()) {
            Ok(())
        } else {
            let err = self.invalid(operation);
            Err(self.fail(err))
        }
    }

    fn fail(&mut self, err: CaptureError) -> CaptureError {
        self.last_error = Some(err.user_message());
        err
    }
}
