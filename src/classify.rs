//! Classification handoff contract.
//!
//! The pipeline only knows the shape of the classifier; models and heuristics
//! live behind [`Classifier`] implementations supplied by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::CapturedImage;

/// What a classifier concluded about an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Waste category label, e.g. "recyclable"
    pub category: String,
    /// Confidence in `[0.0, 1.0]`
    pub confidence: f32,
    /// What the user should do with the item
    pub suggested_action: String,
}

/// Errors returned by a classifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Classification failed: {message}")]
pub struct ClassificationError {
    pub message: String,
}

impl ClassificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External collaborator that turns an image into a classification.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &CapturedImage) -> Result<Classification, ClassificationError>;
}

/// A finished scan: the classification and the image it was made from.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub classification: Classification,
    pub image: CapturedImage,
}
