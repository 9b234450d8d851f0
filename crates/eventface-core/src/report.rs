//! Caller-facing rendering of a batch summary.

use serde::{Deserialize, Serialize};

use crate::orchestrator::BatchSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUser {
    pub user_id: String,
    pub distance: Option<f32>,
    pub image_url: String,
    pub face_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub image_url: String,
    pub processed: bool,
    pub face_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCounts {
    pub total_images: usize,
    pub successful_images: usize,
    pub failed_images: usize,
    pub known_faces_found: usize,
}

/// Response body of an event recognition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub event_id: String,
    pub images_processed: usize,
    pub total_faces_detected: usize,
    pub matched_users: Vec<MatchedUser>,
    pub images: Vec<ImageReport>,
    pub summary: ReportCounts,
}

impl From<&BatchSummary> for EventReport {
    fn from(s: &BatchSummary) -> Self {
        let matched_users = s
            .matched_results
            .iter()
            .filter_map(|m| {
                m.identity_id.as_ref().map(|id| MatchedUser {
                    user_id: id.clone(),
                    distance: m.distance,
                    image_url: m.image_url.clone(),
                    face_index: m.face_index,
                })
            })
            .collect::<Vec<_>>();

        let images = s
            .outcomes
            .iter()
            .map(|o| ImageReport {
                image_url: o.image_url.clone(),
                processed: o.succeeded(),
                face_count: o.face_count,
                error: o.error.clone(),
            })
            .collect();

        Self {
            event_id: s.event_id.clone(),
            images_processed: s.images_successfully_processed,
            total_faces_detected: s.total_faces_detected,
            summary: ReportCounts {
                total_images: s.total_images_submitted,
                successful_images: s.images_successfully_processed,
                failed_images: s.images_failed(),
                known_faces_found: matched_users.len(),
            },
            matched_users,
            images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ImageOutcome, ImageStatus, FAILED_FACE_COUNT};
    use crate::types::MatchResult;

    fn summary() -> BatchSummary {
        let hit = MatchResult {
            face_index: 0,
            identity_id: Some("alice".into()),
            distance: Some(0.31),
            image_url: "a".into(),
        };
        let outcomes = vec![
            ImageOutcome {
                image_url: "a".into(),
                status: ImageStatus::Succeeded,
                face_count: 2,
                matches: vec![
                    hit.clone(),
                    MatchResult {
                        face_index: 1,
                        identity_id: None,
                        distance: Some(0.8),
                        image_url: "a".into(),
                    },
                ],
                error: None,
            },
            ImageOutcome {
                image_url: "b".into(),
                status: ImageStatus::Failed,
                face_count: FAILED_FACE_COUNT,
                matches: vec![],
                error: Some("download failed".into()),
            },
        ];
        BatchSummary::from_outcomes("evt-9", outcomes)
    }

    #[test]
    fn test_report_counts() {
        let report = EventReport::from(&summary());
        assert_eq!(report.event_id, "evt-9");
        assert_eq!(report.images_processed, 1);
        assert_eq!(report.total_faces_detected, 2);
        assert_eq!(report.summary.total_images, 2);
        assert_eq!(report.summary.failed_images, 1);
        assert_eq!(report.summary.known_faces_found, 1);
        assert_eq!(report.matched_users[0].user_id, "alice");
        assert!(!report.images[1].processed);
        assert_eq!(report.images[1].face_count, -1);
    }

    #[test]
    fn test_report_json_shape() {
        let json = serde_json::to_value(EventReport::from(&summary())).unwrap();
        assert_eq!(json["eventId"], "evt-9");
        assert_eq!(json["matchedUsers"][0]["userId"], "alice");
        assert_eq!(json["summary"]["successfulImages"], 1);
        assert_eq!(json["images"][1]["faceCount"], -1);
        assert_eq!(json["images"][1]["error"], "download failed");
        assert!(json["images"][0].get("error").is_none());
    }
}
