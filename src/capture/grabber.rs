//! Frame grabbing: still frame -> enhanced raster -> JPEG artifact.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::camera::Frame;

use super::artifact::{CapturedImage, SourceKind};
use super::enhance::Enhancement;
use super::errors::CaptureError;
use super::negotiator::CaptureDevice;

/// JPEG quality for live captures (0.9 on a 0-1 scale).
pub const CAPTURE_JPEG_QUALITY: u8 = 90;

/// Media type of every live capture.
pub const CAPTURE_MEDIA_TYPE: &str = "image/jpeg";

/// Turns the current frame of a live device into a [`CapturedImage`].
#[derive(Debug, Clone)]
pub struct FrameGrabber {
    enhancement: Enhancement,
    quality: u8,
}

impl Default for FrameGrabber {
    fn default() -> Self {
        Self {
            enhancement: Enhancement::STANDARD,
            quality: CAPTURE_JPEG_QUALITY,
        }
    }
}

impl FrameGrabber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the device's current frame.
    ///
    /// # Errors
    /// * `CaptureError::DeviceNotReady` - No frame yet, or a zero-sized one
    pub fn grab_frame(&self, device: &CaptureDevice) -> Result<Frame, CaptureError> {
        match device.latest_frame() {
            Some(frame) if frame.is_ready() => Ok(frame),
            _ => Err(CaptureError::DeviceNotReady),
        }
    }

    /// Enhance and encode a frame. CPU-bound; needs no device.
    ///
    /// # Errors
    /// * `CaptureError::DeviceNotReady` - Zero-sized frame
    /// * `CaptureError::EncodeError` - Buffer does not match the dimensions, or encoding failed
    pub fn render(&self, mut frame: Frame) -> Result<CapturedImage, CaptureError> {
        if !frame.is_ready() {
            return Err(CaptureError::DeviceNotReady);
        }
        if frame.data.len() != frame.expected_len() {
            return Err(CaptureError::EncodeError(format!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                frame.data.len(),
                frame.expected_len(),
                frame.width,
                frame.height
            )));
        }

        self.enhancement.apply(&mut frame);

        let (width, height) = (frame.width, frame.height);
        let raster = RgbImage::from_raw(width, height, frame.data).ok_or_else(|| {
            CaptureError::EncodeError("frame buffer does not match dimensions".to_string())
        })?;

        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), self.quality);
        raster
            .write_with_encoder(encoder)
            .map_err(|e| CaptureError::EncodeError(e.to_string()))?;

        Ok(CapturedImage::new(
            width,
            height,
            buf,
            CAPTURE_MEDIA_TYPE,
            SourceKind::LiveCapture,
        ))
    }

    /// Capture a still from `device` and release it.
    ///
    /// On `DeviceNotReady` the device is left live so the caller can retry.
    /// Otherwise the device is released, whether encoding succeeds or not.
    pub fn capture(&self, device: &mut CaptureDevice) -> Result<CapturedImage, CaptureError> {
        let frame = self.grab_frame(device)?;
        device.release();
        let image = self.render(frame)?;
        log::info!(
            "Captured {}x{} frame ({} bytes)",
            image.width(),
            image.height(),
            image.encoded().len()
        );
        Ok(image)
    }
}
