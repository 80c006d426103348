//! Upload adapter: externally supplied image files -> [`CapturedImage`].
//!
//! Only the declared media type is trusted for gating; the file name and
//! extension are never consulted. Dimensions come from actually decoding
//! the bytes.

use image::{GenericImageView, ImageFormat};

use super::artifact::{CapturedImage, SourceKind};
use super::errors::CaptureError;

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Validates and decodes uploaded images.
#[derive(Debug, Clone)]
pub struct UploadAdapter {
    max_bytes: usize,
}

impl Default for UploadAdapter {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadAdapter {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Ingest `bytes` declared as `declared_media_type`.
    ///
    /// The artifact keeps the original bytes untouched.
    ///
    /// # Errors
    /// * `CaptureError::UnsupportedMediaType` - Declared type is not `image/*`
    /// * `CaptureError::UploadTooLarge` - Input exceeds the configured limit
    /// * `CaptureError::DecodeError` - Empty, corrupt, or undecodable image data
    pub fn ingest(&self, bytes: Vec<u8>, declared_media_type: &str) -> Result<CapturedImage, CaptureError> {
        let media_type = normalize_media_type(declared_media_type)
            .ok_or_else(|| CaptureError::UnsupportedMediaType(declared_media_type.to_string()))?;

        if bytes.len() > self.max_bytes {
            return Err(CaptureError::UploadTooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(CaptureError::DecodeError("file is empty".to_string()));
        }

        let (width, height) = decode_dimensions(&bytes, &media_type)?;
        if width == 0 || height == 0 {
            return Err(CaptureError::DecodeError(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        log::info!(
            "Ingested {} upload {}x{} ({} bytes)",
            media_type,
            width,
            height,
            bytes.len()
        );
        Ok(CapturedImage::new(
            width,
            height,
            bytes,
            media_type,
            SourceKind::UploadedFile,
        ))
    }
}

/// Lower-case the type, drop parameters, and require the `image/` family.
///
/// Returns `None` when the declared type is not an image type.
pub fn normalize_media_type(declared: &str) -> Option<String> {
    let essence = declared.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    if subtype.is_empty() {
        return None;
    }
    match subtype {
        "jpg" | "pjpeg" => Some("image/jpeg".to_string()),
        _ => Some(essence),
    }
}

/// Decode with the declared format when we know it, otherwise sniff.
fn decode_dimensions(bytes: &[u8], media_type: &str) -> Result<(u32, u32), CaptureError> {
    let decoded = match ImageFormat::from_mime_type(media_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|e| CaptureError::DecodeError(e.to_string()))?;
    Ok(decoded.dimensions())
}
