mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use eventface_core::{FaceDetector, ImageFetcher};
use tower_http::limit::RequestBodyLimitLayer;

pub use self::state::AppState;

/// Request bodies are small JSON documents; image bytes are fetched by URL.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the HTTP API.
pub fn create_app<F, D>(state: Arc<AppState<F, D>>) -> Router
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    Router::new()
        .route("/users/register-face", post(api::register_face_handler::<F, D>))
        .route("/api/events/recognize", post(api::recognize_handler::<F, D>))
        .route("/api/events/{event_id}/matches", get(api::event_matches_handler::<F, D>))
        .route("/api/events/{event_id}/images", get(api::event_images_handler::<F, D>))
        .route("/health", get(api::health_handler::<F, D>))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
