//! Device negotiation: acquiring, releasing and controlling capture devices.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::camera::{CameraBackend, Frame, Orientation, Resolution, StreamRequest, VideoStream};
use crate::retry::{
    calculate_backoff, is_retryable, DEFAULT_ACQUIRE_RETRIES, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_MAX,
};

use super::errors::CaptureError;

/// Default bound on a single acquisition, permission prompt included (5 seconds).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`DeviceNegotiator`].
#[derive(Debug, Clone)]
pub struct NegotiatorSettings {
    /// Resolution requested from the backend
    pub ideal: Resolution,
    /// Hard cap on the requested resolution
    pub max: Resolution,
    /// Bound on the whole acquisition, retries included
    pub acquire_timeout: Duration,
    /// Extra attempts after a transient failure
    pub retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for NegotiatorSettings {
    fn default() -> Self {
        Self {
            ideal: Resolution::IDEAL,
            max: Resolution::MAX,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            retries: DEFAULT_ACQUIRE_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

/// An acquired camera.
///
/// Owns its stream exclusively. Releasing is idempotent, and dropping a
/// device releases it.
pub struct CaptureDevice {
    requested: Orientation,
    orientation: Orientation,
    resolution: Resolution,
    stream: Option<Box<dyn VideoStream>>,
    torch_capable: Option<bool>,
    torch_on: bool,
}

impl fmt::Debug for CaptureDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("requested", &self.requested)
            .field("orientation", &self.orientation)
            .field("resolution", &self.resolution)
            .field("active", &self.is_active())
            .field("torch_on", &self.torch_on)
            .finish_non_exhaustive()
    }
}

impl CaptureDevice {
    /// Wrap an opened stream acquired for `requested`.
    pub fn new(requested: Orientation, stream: Box<dyn VideoStream>) -> Self {
        Self {
            requested,
            orientation: stream.orientation(),
            resolution: stream.resolution(),
            stream: Some(stream),
            torch_capable: None,
            torch_on: false,
        }
    }

    /// Orientation of the device actually opened.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Orientation the caller asked for.
    pub fn requested_orientation(&self) -> Orientation {
        self.requested
    }

    /// True when the backend had to open a different-facing device.
    pub fn is_substituted(&self) -> bool {
        self.orientation != self.requested
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether the device still holds its stream.
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch_on
    }

    /// Latest frame from the stream, `None` once released.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.stream.as_ref().and_then(|s| s.latest_frame())
    }

    /// Stop the stream. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                self.torch_on = false;
                true
            }
            None => false,
        }
    }

    fn torch_capable(&mut self) -> bool {
        if let Some(capable) = self.torch_capable {
            return capable;
        }
        let capable = self.stream.as_ref().is_some_and(|s| s.torch_capable());
        if self.stream.is_some() {
            self.torch_capable = Some(capable);
        }
        capable
    }
}

impl Drop for CaptureDevice {
    fn drop(&mut self) {
        self.release();
    }
}

/// Requests and releases capture devices from a [`CameraBackend`].
#[derive(Clone)]
pub struct DeviceNegotiator {
    backend: Arc<dyn CameraBackend>,
    settings: NegotiatorSettings,
}

impl fmt::Debug for DeviceNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceNegotiator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DeviceNegotiator {
    pub fn new(backend: Arc<dyn CameraBackend>, settings: NegotiatorSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend(&self) -> &Arc<dyn CameraBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &NegotiatorSettings {
        &self.settings
    }

    /// Acquire a device facing `orientation`.
    ///
    /// The whole acquisition, retries included, is bounded by the acquisition
    /// timeout; running out of time fails with `DeviceUnavailable` and is never
    /// retried. Transient failures within the budget are retried with backoff,
    /// permission denials are returned immediately.
    ///
    /// # Errors
    /// * `CaptureError::PermissionDenied` - The user or OS refused access
    /// * `CaptureError::DeviceUnavailable` - No device, busy device, or timeout
    /// * `CaptureError::NotSupported` - The platform has no camera API
    pub async fn acquire(&self, orientation: Orientation) -> Result<CaptureDevice, CaptureError> {
        let timeout = self.settings.acquire_timeout;
        match tokio::time::timeout(timeout, self.acquire_with_retries(orientation)).await {
            Ok(result) => result,
            Err(_) => {
                let err = CaptureError::DeviceUnavailable(format!(
                    "camera did not respond within {:?}",
                    timeout
                ));
                log::warn!("Camera acquisition failed: {}", err);
                Err(err)
            }
        }
    }

    async fn acquire_with_retries(&self, orientation: Orientation) -> Result<CaptureDevice, CaptureError> {
        let request = StreamRequest {
            orientation,
            ideal: self.settings.ideal,
            max: self.settings.max,
        };

        let mut attempt = 0;
        loop {
            match self.acquire_once(request).await {
                Ok(device) => return Ok(device),
                Err(e) if is_retryable(&e) && attempt < self.settings.retries => {
                    let delay = calculate_backoff(
                        attempt,
                        self.settings.backoff_base,
                        self.settings.backoff_max,
                    );
                    log::warn!(
                        "Camera acquisition failed ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.settings.retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::warn!("Camera acquisition failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn acquire_once(&self, request: StreamRequest) -> Result<CaptureDevice, CaptureError> {
        log::debug!(
            "Requesting {} camera at {} (max {})",
            request.orientation,
            request.target(),
            request.max
        );

        let stream = self.backend.open_stream(request).await?;

        let device = CaptureDevice::new(request.orientation, stream);
        if device.is_substituted() {
            log::warn!(
                "No {} camera available, using {} camera instead",
                device.requested_orientation(),
                device.orientation()
            );
        }
        let res = device.resolution();
        if res.width > request.max.width || res.height > request.max.height {
            log::warn!("Camera negotiated {} above the {} cap", res, request.max);
        }
        log::info!("Acquired {} camera at {}", device.orientation(), res);
        Ok(device)
    }

    /// Release a device. Safe to call any number of times.
    pub fn release(&self, device: &mut CaptureDevice) {
        if device.release() {
            log::info!("Released {} camera", device.orientation());
        }
    }

    /// Whether the device supports torch control. Queried once, then cached.
    pub fn query_torch(&self, device: &mut CaptureDevice) -> bool {
        device.torch_capable()
    }

    /// Turn the torch on or off.
    ///
    /// # Errors
    /// * `CaptureError::NotSupported` - The device has no torch or is released
    pub fn set_torch(&self, device: &mut CaptureDevice, on: bool) -> Result<(), CaptureError> {
        if !device.torch_capable() {
            return Err(CaptureError::NotSupported(
                "flash is not supported on this device".to_string(),
            ));
        }
        let stream = device
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::NotSupported("camera is released".to_string()))?;
        stream.set_torch(on)?;
        device.torch_on = on;
        log::debug!("Torch {}", if on { "on" } else { "off" });
        Ok(())
    }
}
