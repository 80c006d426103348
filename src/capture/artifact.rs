//! The immutable image artifact produced by both capture paths.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Where a captured image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LiveCapture,
    UploadedFile,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::LiveCapture => write!(f, "live capture"),
            SourceKind::UploadedFile => write!(f, "uploaded file"),
        }
    }
}

/// An encoded still image ready for classification.
///
/// Cheap to clone: the encoded bytes are shared.
#[derive(Clone)]
pub struct CapturedImage {
    width: u32,
    height: u32,
    encoded: Arc<[u8]>,
    media_type: String,
    captured_at: SystemTime,
    source: SourceKind,
    digest: String,
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.encoded.len())
            .field("media_type", &self.media_type)
            .field("source", &self.source)
            .field("digest", &self.digest)
            .finish()
    }
}

impl CapturedImage {
    pub(crate) fn new(
        width: u32,
        height: u32,
        encoded: Vec<u8>,
        media_type: impl Into<String>,
        source: SourceKind,
    ) -> Self {
        debug_assert!(width > 0 && height > 0);
        let digest = content_digest(&encoded);
        Self {
            width,
            height,
            encoded: encoded.into(),
            media_type: media_type.into(),
            captured_at: SystemTime::now(),
            source,
            digest,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// MIME type of the encoded bytes, e.g. `image/jpeg`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Short content hash of the encoded bytes (32 hex chars).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File extension matching the media type.
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "img",
        }
    }
}

/// First 16 bytes of SHA-256, hex encoded. Same bytes, same digest.
fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}
