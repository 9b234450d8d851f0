//! Batch orchestration over all images of an event.
//!
//! Every image runs through its own `pending → processing → {succeeded | failed}`
//! state machine. A failed image is recorded and the batch moves on; only a
//! malformed request stops the batch, and it does so before any image is touched.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::FaceDetector;
use crate::fetcher::ImageFetcher;
use crate::processor::{ImageProcessor, ProcessError};
use crate::types::{MatchResult, RegisteredIdentity};

/// `face_count` recorded for an image that failed processing.
pub const FAILED_FACE_COUNT: i64 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("eventId is required")]
    MissingEventId,
    #[error("at least one image URL is required")]
    NoImages,
    #[error("image URL at position {0} is empty")]
    EmptyImageUrl(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl ImageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ImageStatus::Succeeded | ImageStatus::Failed)
    }
}

/// Per-image record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutcome {
    pub image_url: String,
    pub status: ImageStatus,
    /// Faces after suppression; `FAILED_FACE_COUNT` when processing failed.
    pub face_count: i64,
    pub matches: Vec<MatchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageOutcome {
    pub fn pending(image_url: &str) -> Self {
        Self {
            image_url: image_url.to_string(),
            status: ImageStatus::Pending,
            face_count: 0,
            matches: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ImageStatus::Succeeded
    }

    fn begin(&mut self) {
        if self.status == ImageStatus::Pending {
            self.status = ImageStatus::Processing;
        }
    }

    fn complete(&mut self, result: Result<Vec<MatchResult>, ProcessError>) {
        if self.status != ImageStatus::Processing {
            tracing::warn!(url = %self.image_url, status = ?self.status, "ignoring completion outside processing state");
            return;
        }
        match result {
            Ok(matches) => {
                self.status = ImageStatus::Succeeded;
                self.face_count = matches.len() as i64;
                self.matches = matches;
            }
            Err(e) => {
                self.status = ImageStatus::Failed;
                self.face_count = FAILED_FACE_COUNT;
                self.matches.clear();
                self.error = Some(e.to_string());
            }
        }
    }
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub event_id: String,
    pub total_images_submitted: usize,
    pub images_successfully_processed: usize,
    pub total_faces_detected: usize,
    /// Matches with an identity, in processing order.
    pub matched_results: Vec<MatchResult>,
    /// One entry per submitted URL, in submission order.
    pub outcomes: Vec<ImageOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(event_id: &str, outcomes: Vec<ImageOutcome>) -> Self {
        let mut images_successfully_processed = 0;
        let mut total_faces_detected = 0;
        let mut matched_results = Vec::new();

        for outcome in &outcomes {
            match outcome.status {
                ImageStatus::Succeeded => {
                    images_successfully_processed += 1;
                    total_faces_detected += outcome.face_count.max(0) as usize;
                    matched_results.extend(outcome.matches.iter().filter(|m| m.is_matched()).cloned());
                }
                ImageStatus::Failed | ImageStatus::Pending | ImageStatus::Processing => {}
            }
        }

        Self {
            event_id: event_id.to_string(),
            total_images_submitted: outcomes.len(),
            images_successfully_processed,
            total_faces_detected,
            matched_results,
            outcomes,
        }
    }

    pub fn images_failed(&self) -> usize {
        self.total_images_submitted - self.images_successfully_processed
    }
}

/// Reject malformed batch requests before any processing happens.
pub fn validate_batch(event_id: &str, image_urls: &[String]) -> Result<(), ValidationError> {
    if event_id.trim().is_empty() {
        return Err(ValidationError::MissingEventId);
    }
    if image_urls.is_empty() {
        return Err(ValidationError::NoImages);
    }
    if let Some(pos) = image_urls.iter().position(|u| u.trim().is_empty()) {
        return Err(ValidationError::EmptyImageUrl(pos));
    }
    Ok(())
}

/// Runs the single-image pipeline over every image of a batch.
pub struct BatchOrchestrator<F, D> {
    processor: ImageProcessor<F, D>,
    concurrency: usize,
}

impl<F: ImageFetcher, D: FaceDetector> BatchOrchestrator<F, D> {
    /// `concurrency` is the number of images in flight at once; 1 is sequential.
    pub fn new(processor: ImageProcessor<F, D>, concurrency: usize) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
        }
    }

    pub fn processor(&self) -> &ImageProcessor<F, D> {
        &self.processor
    }

    /// Process every image of an event against a read-only registry snapshot.
    ///
    /// Outcomes are reported in submission order whatever order images finish in.
    /// Identity uniqueness is enforced per image, never across images.
    pub async fn process_batch(
        &self,
        event_id: &str,
        image_urls: &[String],
        identities: &[RegisteredIdentity],
    ) -> Result<BatchSummary, ValidationError> {
        validate_batch(event_id, image_urls)?;

        tracing::info!(
            event_id,
            images = image_urls.len(),
            identities = identities.len(),
            concurrency = self.concurrency,
            "processing batch"
        );

        // Futures are lazy; `buffered` decides how many run at once.
        let pending: Vec<_> = image_urls
            .iter()
            .map(|url| self.run_image(event_id, url, identities))
            .collect();
        let outcomes: Vec<ImageOutcome> = futures::stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let summary = BatchSummary::from_outcomes(event_id, outcomes);
        tracing::info!(
            event_id,
            submitted = summary.total_images_submitted,
            succeeded = summary.images_successfully_processed,
            faces = summary.total_faces_detected,
            matched = summary.matched_results.len(),
            "batch complete"
        );
        Ok(summary)
    }

    async fn run_image(
        &self,
        event_id: &str,
        url: &str,
        identities: &[RegisteredIdentity],
    ) -> ImageOutcome {
        let mut outcome = ImageOutcome::pending(url);
        outcome.begin();

        let result = self.processor.process_image(url, identities).await;
        if let Err(e) = &result {
            tracing::warn!(event_id, url, error = %e, "image failed, continuing with batch");
        }

        outcome.complete(result);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectionError;
    use crate::matcher::IdentityMatcher;
    use crate::test_support::{face, ScriptedDetector, ScriptedFetcher};
    use std::time::Duration;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> Vec<RegisteredIdentity> {
        vec![
            RegisteredIdentity::new("alice", vec![0.0, 0.0]),
            RegisteredIdentity::new("bob", vec![1.0, 1.0]),
        ]
    }

    fn orchestrator(
        fetcher: ScriptedFetcher,
        detector: ScriptedDetector,
        concurrency: usize,
    ) -> BatchOrchestrator<ScriptedFetcher, ScriptedDetector> {
        BatchOrchestrator::new(
            ImageProcessor::new(fetcher, detector, IdentityMatcher::default()),
            concurrency,
        )
    }

    #[tokio::test]
    async fn test_batch_isolates_detection_failure() {
        let detector = ScriptedDetector::new()
            .with_faces("img1", vec![face(0.0, 0.9, vec![0.0, 0.1]), face(200.0, 0.8, vec![5.0, 5.0])])
            .with_error("img2", DetectionError::Decode("truncated".into()))
            .with_faces("img3", vec![face(0.0, 0.95, vec![1.0, 1.1])]);
        let orch = orchestrator(ScriptedFetcher::new(), detector, 1);

        let summary = orch
            .process_batch("evt-1", &urls(&["img1", "img2", "img3"]), &registry())
            .await
            .unwrap();

        assert_eq!(summary.event_id, "evt-1");
        assert_eq!(summary.total_images_submitted, 3);
        assert_eq!(summary.images_successfully_processed, 2);
        assert_eq!(summary.images_failed(), 1);
        assert_eq!(summary.total_faces_detected, 3);

        let failed = &summary.outcomes[1];
        assert_eq!(failed.image_url, "img2");
        assert_eq!(failed.status, ImageStatus::Failed);
        assert_eq!(failed.face_count, FAILED_FACE_COUNT);
        assert!(failed.matches.is_empty());
        assert!(failed.error.as_deref().unwrap().contains("truncated"));

        let ids: Vec<(&str, &str)> = summary
            .matched_results
            .iter()
            .map(|m| (m.image_url.as_str(), m.identity_id.as_deref().unwrap()))
            .collect();
        assert_eq!(ids, vec![("img1", "alice"), ("img3", "bob")]);
    }

    #[tokio::test]
    async fn test_batch_isolates_download_failure() {
        let fetcher = ScriptedFetcher::new().failing("img1");
        let detector = ScriptedDetector::new().with_faces("img2", vec![face(0.0, 0.9, vec![0.0, 0.0])]);
        let orch = orchestrator(fetcher, detector, 1);

        let summary = orch
            .process_batch("evt", &urls(&["img1", "img2"]), &registry())
            .await
            .unwrap();
        assert_eq!(summary.outcomes[0].status, ImageStatus::Failed);
        assert_eq!(summary.outcomes[0].face_count, -1);
        assert_eq!(summary.outcomes[1].status, ImageStatus::Succeeded);
        assert_eq!(summary.images_successfully_processed, 1);
        assert_eq!(summary.matched_results.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_zero_faces_is_not_failure() {
        let orch = orchestrator(ScriptedFetcher::new(), ScriptedDetector::new(), 1);
        let summary = orch
            .process_batch("evt", &urls(&["empty"]), &registry())
            .await
            .unwrap();
        assert!(summary.outcomes[0].succeeded());
        assert_eq!(summary.outcomes[0].face_count, 0);
        assert_eq!(summary.total_faces_detected, 0);
        assert_eq!(summary.images_successfully_processed, 1);
    }

    #[tokio::test]
    async fn test_batch_uniqueness_is_per_image() {
        let detector = ScriptedDetector::new()
            .with_faces("a", vec![face(0.0, 0.9, vec![0.0, 0.0])])
            .with_faces("b", vec![face(0.0, 0.9, vec![0.0, 0.1])]);
        let orch = orchestrator(ScriptedFetcher::new(), detector, 2);
        let summary = orch
            .process_batch("evt", &urls(&["a", "b"]), &registry())
            .await
            .unwrap();
        assert_eq!(summary.matched_results.len(), 2);
        assert!(summary
            .matched_results
            .iter()
            .all(|m| m.identity_id.as_deref() == Some("alice")));
    }

    #[tokio::test]
    async fn test_batch_unmatched_faces_excluded_from_matched_results() {
        let detector = ScriptedDetector::new().with_faces(
            "a",
            vec![face(0.0, 0.9, vec![0.0, 0.0]), face(200.0, 0.8, vec![0.0, 0.2])],
        );
        let orch = orchestrator(ScriptedFetcher::new(), detector, 1);
        let summary = orch
            .process_batch("evt", &urls(&["a"]), &registry())
            .await
            .unwrap();
        // Second face loses alice to the first and is not reported as matched.
        assert_eq!(summary.outcomes[0].matches.len(), 2);
        assert_eq!(summary.matched_results.len(), 1);
        assert_eq!(summary.total_faces_detected, 2);
    }

    #[tokio::test]
    async fn test_batch_validation_fails_fast() {
        let orch = orchestrator(ScriptedFetcher::new(), ScriptedDetector::new(), 1);

        let err = orch.process_batch("", &urls(&["a"]), &registry()).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingEventId);

        let err = orch.process_batch("  ", &urls(&["a"]), &registry()).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingEventId);

        let err = orch.process_batch("evt", &[], &registry()).await.unwrap_err();
        assert_eq!(err, ValidationError::NoImages);

        let err = orch
            .process_batch("evt", &urls(&["a", ""]), &registry())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyImageUrl(1));

        assert_eq!(orch.processor().matcher().max_distance, 0.6);
    }

    #[tokio::test]
    async fn test_batch_validation_touches_no_images() {
        let fetcher = ScriptedFetcher::new();
        let orch = orchestrator(fetcher, ScriptedDetector::new(), 1);
        let _ = orch.process_batch("", &urls(&["a", "b"]), &registry()).await;
        assert_eq!(orch.processor().fetcher().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batch_keeps_submission_order() {
        let fetcher = ScriptedFetcher::new()
            .delayed("slow", Duration::from_millis(300))
            .delayed("medium", Duration::from_millis(100));
        let detector = ScriptedDetector::new()
            .with_faces("slow", vec![face(0.0, 0.9, vec![0.0, 0.0])])
            .with_faces("medium", vec![face(0.0, 0.9, vec![1.0, 1.0])]);
        let orch = orchestrator(fetcher, detector, 3);

        let start = tokio::time::Instant::now();
        let summary = orch
            .process_batch("evt", &urls(&["slow", "medium", "fast"]), &registry())
            .await
            .unwrap();

        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.image_url.as_str()).collect();
        assert_eq!(order, vec!["slow", "medium", "fast"]);
        let matched: Vec<&str> = summary
            .matched_results
            .iter()
            .filter_map(|m| m.identity_id.as_deref())
            .collect();
        assert_eq!(matched, vec!["alice", "bob"]);
        // All three ran at once, so the batch took as long as the slowest image.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_outcome_terminal_state_is_final() {
        let mut outcome = ImageOutcome::pending("u");
        outcome.begin();
        outcome.complete(Ok(vec![]));
        assert!(outcome.status.is_terminal());
        outcome.complete(Err(ProcessError::Detection(DetectionError::Unavailable)));
        assert_eq!(outcome.status, ImageStatus::Succeeded);
        assert_eq!(outcome.face_count, 0);
    }

    #[test]
    fn test_summary_ignores_failed_face_counts() {
        let mut ok = ImageOutcome::pending("a");
        ok.begin();
        ok.complete(Ok(vec![MatchResult {
            face_index: 0,
            identity_id: None,
            distance: Some(0.9),
            image_url: "a".into(),
        }]));
        let mut bad = ImageOutcome::pending("b");
        bad.begin();
        bad.complete(Err(ProcessError::Detection(DetectionError::Unavailable)));

        let summary = BatchSummary::from_outcomes("e", vec![ok, bad]);
        assert_eq!(summary.total_faces_detected, 1);
        assert_eq!(summary.images_successfully_processed, 1);
        assert!(summary.matched_results.is_empty());
    }
}
