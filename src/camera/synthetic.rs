//! Deterministic in-process camera backend.
//!
//! Produces gradient frames without touching hardware. Used by the CLI when no
//! real camera backend is compiled in, and by the tests to script permission
//! prompts, warm-up, busy devices and torch support.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{CameraBackend, VideoStream};
use super::device::pick_device;
use super::types::{CameraError, CameraInfo, Frame, Orientation, Resolution, StreamRequest};

/// How the simulated permission prompt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionOutcome {
    #[default]
    Granted,
    Denied,
    /// The user never answers the prompt.
    Pending,
}

#[derive(Debug)]
struct Shared {
    devices: Vec<Orientation>,
    native: Resolution,
    warmup_frames: u32,
    torch: bool,
    permission: PermissionOutcome,
    open_delay: Duration,
    failures_remaining: AtomicU32,
    open_attempts: AtomicUsize,
    live_streams: AtomicUsize,
}

/// Scriptable camera backend.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    shared: Arc<Shared>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SyntheticCamera {
    pub fn builder() -> SyntheticCameraBuilder {
        SyntheticCameraBuilder::default()
    }

    /// Number of streams currently holding the (simulated) hardware.
    pub fn live_streams(&self) -> usize {
        self.shared.live_streams.load(Ordering::SeqCst)
    }

    /// Number of `open_stream` calls made so far.
    pub fn open_attempts(&self) -> usize {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }
}

/// Builder for [`SyntheticCamera`].
#[derive(Debug, Clone)]
pub struct SyntheticCameraBuilder {
    devices: Vec<Orientation>,
    native: Resolution,
    warmup_frames: u32,
    torch: bool,
    permission: PermissionOutcome,
    open_delay: Duration,
    transient_failures: u32,
}

impl Default for SyntheticCameraBuilder {
    fn default() -> Self {
        Self {
            devices: vec![Orientation::Front, Orientation::Back],
            native: Resolution::IDEAL,
            warmup_frames: 0,
            torch: false,
            permission: PermissionOutcome::Granted,
            open_delay: Duration::ZERO,
            transient_failures: 0,
        }
    }
}

impl SyntheticCameraBuilder {
    /// Devices present on the simulated system, in enumeration order.
    pub fn devices(mut self, devices: impl IntoIterator<Item = Orientation>) -> Self {
        self.devices = devices.into_iter().collect();
        self
    }

    /// Largest resolution the simulated sensor supports.
    pub fn native_resolution(mut self, native: Resolution) -> Self {
        self.native = native;
        self
    }

    /// Number of zero-sized frames reported before real frames arrive.
    pub fn warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn torch(mut self, capable: bool) -> Self {
        self.torch = capable;
        self
    }

    pub fn permission(mut self, outcome: PermissionOutcome) -> Self {
        self.permission = outcome;
        self
    }

    /// Time the permission prompt / device open takes.
    pub fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Fail this many opens with a busy-device error before succeeding.
    pub fn transient_failures(mut self, count: u32) -> Self {
        self.transient_failures = count;
        self
    }

    pub fn build(self) -> SyntheticCamera {
        SyntheticCamera {
            shared: Arc::new(Shared {
                devices: self.devices,
                native: self.native,
                warmup_frames: self.warmup_frames,
                torch: self.torch,
                permission: self.permission,
                open_delay: self.open_delay,
                failures_remaining: AtomicU32::new(self.transient_failures),
                open_attempts: AtomicUsize::new(0),
                live_streams: AtomicUsize::new(0),
            }),
        }
    }
}

#[async_trait]
impl CameraBackend for SyntheticCamera {
    fn list_devices(&self) -> Result<Vec<CameraInfo>, CameraError> {
        Ok(self
            .shared
            .devices
            .iter()
            .enumerate()
            .map(|(i, orientation)| CameraInfo {
                index: i as u32,
                name: format!("Synthetic {} camera", orientation),
                orientation: *orientation,
            })
            .collect())
    }

    async fn open_stream(&self, request: StreamRequest) -> Result<Box<dyn VideoStream>, CameraError> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.shared.open_delay.is_zero() {
            tokio::time::sleep(self.shared.open_delay).await;
        }

        match self.shared.permission {
            PermissionOutcome::Granted => {}
            PermissionOutcome::Denied => return Err(CameraError::PermissionDenied),
            PermissionOutcome::Pending => std::future::pending::<()>().await,
        }

        let devices = self.list_devices()?;
        let orientation = pick_device(&devices, request.orientation)
            .ok_or(CameraError::NotFound)?
            .orientation;

        let busy = self
            .shared
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(CameraError::OpenFailed("device busy".to_string()));
        }

        self.shared.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            shared: Arc::clone(&self.shared),
            orientation,
            resolution: request.target().capped_at(self.shared.native),
            warmup_remaining: AtomicU32::new(self.shared.warmup_frames),
            torch_on: false,
            stopped: AtomicBool::new(false),
        }))
    }
}

struct SyntheticStream {
    shared: Arc<Shared>,
    orientation: Orientation,
    resolution: Resolution,
    warmup_remaining: AtomicU32,
    torch_on: bool,
    stopped: AtomicBool,
}

impl SyntheticStream {
    fn render_gradient(&self) -> Frame {
        let Resolution { width, height } = self.resolution;
        let blue = match self.orientation {
            Orientation::Front => 64u8,
            Orientation::Back => 192u8,
        };
        let boost = if self.torch_on { 40u8 } else { 0 };
        let mut data = Vec::with_capacity(width as usize * height as usize * Frame::BYTES_PER_PIXEL);
        for y in 0..height {
            let g = (y * 255 / height.saturating_sub(1).max(1)) as u8;
            for x in 0..width {
                let r = (x * 255 / width.saturating_sub(1).max(1)) as u8;
                data.extend_from_slice(&[r.saturating_add(boost), g.saturating_add(boost), blue]);
            }
        }
        Frame::new(data, width, height)
    }
}

impl VideoStream for SyntheticStream {
    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let warming = self
            .warmup_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if warming {
            return Some(Frame::new(Vec::new(), 0, 0));
        }
        Some(self.render_gradient())
    }

    fn torch_capable(&self) -> bool {
        self.shared.torch
    }

    fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
        if !self.shared.torch {
            return Err(CameraError::NotSupported("torch".to_string()));
        }
        self.torch_on = on;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.torch_on = false;
            self.shared.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}
