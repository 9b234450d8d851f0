//! ONNX Runtime face detector: SCRFD for boxes and landmarks, ArcFace for
//! descriptors.
//!
//! Sessions are `!Sync` and need `&mut self`, so callers own an
//! [`OnnxFaceDetector`] on a dedicated thread and reach it through a handle.

mod alignment;
mod arcface;
mod scrfd;

use std::path::Path;

use crate::detector::DetectionError;
use crate::types::DetectedFace;

pub use arcface::ArcFaceRecognizer;
pub use scrfd::{Candidate, ScrfdDetector};

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

pub struct OnnxFaceDetector {
    scrfd: ScrfdDetector,
    arcface: ArcFaceRecognizer,
}

impl OnnxFaceDetector {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path, min_confidence: f32) -> Result<Self, DetectionError> {
        let scrfd = ScrfdDetector::load(&model_dir.join(DETECTOR_MODEL_FILE), min_confidence)?;
        let arcface = ArcFaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self { scrfd, arcface })
    }

    /// Decode an encoded image and return every face with its descriptor.
    pub fn detect_bytes(&mut self, bytes: &[u8]) -> Result<Vec<DetectedFace>, DetectionError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| DetectionError::Decode(e.to_string()))?
            .to_rgb8();

        let candidates = self.scrfd.detect(&image)?;
        let mut faces = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let descriptor = self.arcface.extract(&image, &candidate.landmarks)?;
            faces.push(DetectedFace {
                bounding_box: candidate.bbox,
                confidence: candidate.confidence,
                descriptor,
                landmarks: Some(candidate.landmarks),
            });
        }

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            faces = faces.len(),
            "onnx detection complete"
        );
        Ok(faces)
    }
}
