use eventface_store::{EventImageRecord, EventStatus, FaceMatchRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST /users/register-face`. Fields are optional so that a
/// missing one is reported as a validation error rather than a parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFaceRequest {
    pub user_id: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFaceResponse {
    pub success: bool,
    pub message: &'static str,
    pub user_id: String,
    /// Descriptors now enrolled for the user.
    pub descriptors: usize,
    pub confidence: f32,
}

/// Body of `POST /api/events/recognize`. `imageUrl` is accepted for a
/// single-image request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequest {
    pub event_id: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub image_url: Option<String>,
}

impl RecognizeRequest {
    pub fn into_parts(self) -> (String, Vec<String>) {
        let urls = match (self.image_urls, self.image_url) {
            (Some(urls), _) => urls,
            (None, Some(url)) => vec![url],
            (None, None) => Vec::new(),
        };
        (self.event_id.unwrap_or_default(), urls)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMatchesResponse {
    pub event_id: String,
    pub status: EventStatus,
    pub matches: Vec<FaceMatchRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImagesResponse {
    pub event_id: String,
    pub status: EventStatus,
    pub images: Vec<EventImageRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub version: &'static str,
    pub identities: usize,
    pub models_loaded: bool,
}
