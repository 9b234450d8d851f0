use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use eventface_core::orchestrator::validate_batch;
use eventface_core::{EventReport, FaceDetector, ImageFetcher};

use super::error::{ApiError, Result};
use super::state::AppState;
use super::types::*;

/// Enrol the most confident face of an image under a user id.
pub async fn register_face_handler<F, D>(
    State(state): State<Arc<AppState<F, D>>>,
    body: std::result::Result<Json<RegisterFaceRequest>, JsonRejection>,
) -> Result<Json<RegisterFaceResponse>>
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    let Json(req) = body?;
    let (Some(user_id), Some(image_url)) = (
        req.user_id.filter(|s| !s.trim().is_empty()),
        req.image_url.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(ApiError::BadRequest("userId and imageUrl are required".into()));
    };

    tracing::info!(user_id = %user_id, image_url = %image_url, "face enrolment requested");
    let face = state.orchestrator.processor().enroll_face(&image_url).await?;
    let descriptors = state.store.enroll_descriptor(&user_id, &face.descriptor).await?;

    Ok(Json(RegisterFaceResponse {
        success: true,
        message: "Face registered successfully",
        user_id,
        descriptors,
        confidence: face.confidence,
    }))
}

/// Match every face in a batch of event photos against the registry and
/// persist the outcome.
pub async fn recognize_handler<F, D>(
    State(state): State<Arc<AppState<F, D>>>,
    body: std::result::Result<Json<RecognizeRequest>, JsonRejection>,
) -> Result<Json<EventReport>>
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    let Json(req) = body?;
    let (event_id, urls) = req.into_parts();
    validate_batch(&event_id, &urls)?;

    let start = Instant::now();
    // One registry snapshot for the whole batch.
    let identities = state.store.list_identities().await.map_err(ApiError::Registry)?;

    let summary = state
        .orchestrator
        .process_batch(&event_id, &urls, &identities)
        .await?;
    // The event row only appears once the whole batch is committed.
    state.store.record_batch(&summary).await.map_err(ApiError::Persist)?;

    tracing::info!(
        event_id = %event_id,
        identities = identities.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "event recognition complete"
    );
    Ok(Json(EventReport::from(&summary)))
}

pub async fn event_matches_handler<F, D>(
    State(state): State<Arc<AppState<F, D>>>,
    Path(event_id): Path<String>,
) -> Result<Json<EventMatchesResponse>>
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    let event = state
        .store
        .event(&event_id)
        .await?
        .ok_or_else(|| ApiError::EventNotFound(event_id.clone()))?;
    let matches = state.store.matches_for_event(&event_id).await?;
    Ok(Json(EventMatchesResponse {
        event_id,
        status: event.status,
        matches,
    }))
}

pub async fn event_images_handler<F, D>(
    State(state): State<Arc<AppState<F, D>>>,
    Path(event_id): Path<String>,
) -> Result<Json<EventImagesResponse>>
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    let event = state
        .store
        .event(&event_id)
        .await?
        .ok_or_else(|| ApiError::EventNotFound(event_id.clone()))?;
    let images = state.store.images_for_event(&event_id).await?;
    Ok(Json(EventImagesResponse {
        event_id,
        status: event.status,
        images,
    }))
}

pub async fn health_handler<F, D>(
    State(state): State<Arc<AppState<F, D>>>,
) -> Result<Json<HealthResponse>>
where
    F: ImageFetcher + 'static,
    D: FaceDetector + 'static,
{
    let identities = state.store.identity_count().await.map_err(ApiError::Registry)?;
    Ok(Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION"),
        identities,
        models_loaded: state.orchestrator.processor().detector().is_ready(),
    }))
}
