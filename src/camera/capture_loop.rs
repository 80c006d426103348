//! Background capture thread for the nokhwa backend.
//!
//! nokhwa cameras are not `Send` on every platform, so each camera is opened,
//! streamed and closed on its own thread. The thread keeps only the latest
//! frame in a shared buffer.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

use super::device::{list_devices, pick_device};
use super::frame_utils::convert_to_rgb;
use super::types::{CameraError, Frame, Orientation, Resolution};

/// Frame rate requested from hardware.
const REQUESTED_FPS: u32 = 30;

/// What the capture thread reports once the camera is streaming.
pub type StartupInfo = Result<(Orientation, Resolution), CameraError>;

/// Run the capture loop in a background thread.
///
/// Enumerates devices, opens the one best matching `requested`, and reports
/// its orientation and negotiated resolution (or the error) through
/// `info_tx`. If nobody is waiting for that report any more, the camera is
/// closed straight away.
pub fn run_capture_loop(
    requested: Orientation,
    target: Resolution,
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    info_tx: oneshot::Sender<StartupInfo>,
) {
    let device = match list_devices().and_then(|devices| {
        pick_device(&devices, requested)
            .cloned()
            .ok_or(CameraError::NotFound)
    }) {
        Ok(device) => device,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };
    let index = CameraIndex::Index(device.index);

    let mut camera = match open_camera_with_fallback(&index, target) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::StreamFailed(e.to_string())));
        return;
    }

    let res = camera.resolution();
    let actual = Resolution::new(res.width(), res.height());
    if info_tx.send(Ok((device.orientation, actual))).is_err() {
        log::debug!("Camera open abandoned by caller, closing stream");
        let _ = camera.stop_stream();
        return;
    }

    while !stop.load(Ordering::Relaxed) {
        if let Ok(raw_frame) = camera.frame() {
            // Undecodable frames are skipped
            if let Some(frame) = convert_to_rgb(&raw_frame) {
                if let Ok(mut buf) = buffer.lock() {
                    *buf = Some(frame);
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(index: &CameraIndex, target: Resolution) -> Result<Camera, CameraError> {
    let resolution = nokhwa::utils::Resolution::new(target.width, target.height);
    // NV12 (native on macOS), then MJPEG, then whatever the camera likes best
    let format_attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::NV12,
            REQUESTED_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::MJPEG,
            REQUESTED_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
    ];

    let mut last_error = None;

    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = Some(e),
        }
    }

    let msg = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no usable format".to_string());
    let lower = msg.to_lowercase();
    if lower.contains("permission")
        || lower.contains("denied")
        || lower.contains("authorization")
    {
        Err(CameraError::PermissionDenied)
    } else {
        Err(CameraError::OpenFailed(msg))
    }
}
