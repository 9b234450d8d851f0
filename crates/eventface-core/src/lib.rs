//! eventface-core — matching the faces in event photos against enrolled
//! identities.
//!
//! The pipeline for one image is fetch → detect → suppress duplicates →
//! match. The orchestrator runs it over a whole batch and aggregates the
//! per-image outcomes. Detection with SCRFD and ArcFace lives behind the
//! `onnx` feature.

pub mod detector;
pub mod fetcher;
pub mod matcher;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod orchestrator;
pub mod processor;
pub mod report;
pub mod suppressor;
pub mod types;

#[cfg(test)]
mod test_support;

pub use detector::{DetectionError, FaceDetector};
pub use fetcher::{DownloadError, HttpFetcher, ImageFetcher, RetryPolicy};
pub use matcher::{IdentityMatcher, MatchingError, DEFAULT_MAX_DISTANCE};
pub use orchestrator::{BatchOrchestrator, BatchSummary, ImageOutcome, ImageStatus, ValidationError};
pub use processor::{EnrollError, ImageProcessor, ProcessError};
pub use report::EventReport;
pub use types::{BoundingBox, DetectedFace, Descriptor, MatchResult, RegisteredIdentity};
