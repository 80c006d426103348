//! Real webcam backend built on nokhwa.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::backend::{CameraBackend, VideoStream};
use super::capture_loop::run_capture_loop;
use super::device::list_devices;
use super::types::{CameraError, CameraInfo, Frame, Orientation, Resolution, StreamRequest};

/// Opens system cameras through nokhwa. Torch control is not available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareCamera;

impl HardwareCamera {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CameraBackend for HardwareCamera {
    fn list_devices(&self) -> Result<Vec<CameraInfo>, CameraError> {
        list_devices()
    }

    async fn open_stream(&self, request: StreamRequest) -> Result<Box<dyn VideoStream>, CameraError> {
        let frame_buffer = Arc::new(Mutex::new(None));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (info_tx, info_rx) = oneshot::channel();

        // Enumeration and open both block, so they run on the capture thread
        let buffer = Arc::clone(&frame_buffer);
        let stop = Arc::clone(&stop_signal);
        let requested = request.orientation;
        let target = request.target();
        let handle = std::thread::spawn(move || {
            run_capture_loop(requested, target, buffer, stop, info_tx);
        });

        // On failure the thread has already returned and is left to finish detached
        match info_rx.await {
            Ok(Ok((orientation, resolution))) => Ok(Box::new(HardwareStream {
                orientation,
                resolution,
                frame_buffer,
                stop_signal,
                capture_thread: Some(handle),
            })),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CameraError::StreamFailed(
                "Capture thread terminated unexpectedly".to_string(),
            )),
        }
    }
}

/// A live nokhwa stream running on its own thread.
struct HardwareStream {
    orientation: Orientation,
    resolution: Resolution,
    /// Latest captured frame (shared with capture thread)
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    /// Signal to stop capture thread
    stop_signal: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
}

impl VideoStream for HardwareStream {
    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    fn torch_capable(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::NotSupported("torch".to_string()))
    }

    /// Signal the capture thread and wait for it to close the camera.
    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
        if let Ok(mut buffer) = self.frame_buffer.lock() {
            *buffer = None;
        }
    }
}

impl Drop for HardwareStream {
    fn drop(&mut self) {
        self.stop();
    }
}
