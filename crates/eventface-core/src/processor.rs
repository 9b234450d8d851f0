//! Single-image pipeline: fetch → detect → suppress → match.

use thiserror::Error;

use crate::detector::{DetectionError, FaceDetector};
use crate::fetcher::{DownloadError, ImageFetcher};
use crate::matcher::{IdentityMatcher, MatchingError};
use crate::suppressor::suppress;
use crate::types::{DetectedFace, MatchResult, RegisteredIdentity};

/// Why one image could not be processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrollError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("no face detected in {0}")]
    NoFaceDetected(String),
}

/// Composes a fetcher, a detector and the matcher for one image at a time.
pub struct ImageProcessor<F, D> {
    fetcher: F,
    detector: D,
    matcher: IdentityMatcher,
}

impl<F: ImageFetcher, D: FaceDetector> ImageProcessor<F, D> {
    pub fn new(fetcher: F, detector: D, matcher: IdentityMatcher) -> Self {
        Self {
            fetcher,
            detector,
            matcher,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn matcher(&self) -> &IdentityMatcher {
        &self.matcher
    }

    /// Fetch, detect, de-duplicate and match every face of one image.
    ///
    /// Either the full result list is returned or an error; never a partial list.
    pub async fn process_image(
        &self,
        url: &str,
        identities: &[RegisteredIdentity],
    ) -> Result<Vec<MatchResult>, ProcessError> {
        let faces = self.detect_faces(url).await?;
        let matches = self.matcher.match_faces(&faces, identities, url)?;

        tracing::info!(
            url,
            faces = matches.len(),
            matched = matches.iter().filter(|m| m.is_matched()).count(),
            "image processed"
        );
        Ok(matches)
    }

    /// Pick the most confident face of an image, for enrolment.
    pub async fn enroll_face(&self, url: &str) -> Result<DetectedFace, EnrollError> {
        let faces = self.detect_faces(url).await?;
        let face = faces
            .into_iter()
            .next()
            .ok_or_else(|| EnrollError::NoFaceDetected(url.to_string()))?;

        tracing::info!(url, confidence = face.confidence, "enrolment face selected");
        Ok(face)
    }

    /// De-duplicated faces in confidence-descending order.
    async fn detect_faces(&self, url: &str) -> Result<Vec<DetectedFace>, ProcessError> {
        let bytes = self.fetcher.fetch(url).await?;
        let detections = self.detector.detect(bytes).await?;
        tracing::debug!(url, detections = detections.len(), "faces detected");
        Ok(suppress(detections))
    }
}
