//! Face detector capability.
//!
//! The pipeline treats detection, landmarking and descriptor extraction as
//! one black box: bytes in, detected faces out. The `onnx` feature provides
//! a concrete binding; tests substitute scripted detectors.

use std::future::Future;

use thiserror::Error;

use crate::types::DetectedFace;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("detector unavailable")]
    Unavailable,
}

/// Produces every face in an encoded image, each with a bounding box,
/// a confidence score and a descriptor.
pub trait FaceDetector: Send + Sync {
    fn detect(
        &self,
        image: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<DetectedFace>, DetectionError>> + Send;

    /// Whether the detector can currently serve requests.
    fn is_ready(&self) -> bool {
        true
    }
}
