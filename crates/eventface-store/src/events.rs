//! Event records, per-image outcomes and face matches.

use std::fmt;

use chrono::{DateTime, Utc};
use eventface_core::BatchSummary;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::{now, parse_timestamp, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Ready,
}

impl EventStatus {
    fn as_str(self) -> &'static str {
        match self {
            EventStatus::Processing => "processing",
            EventStatus::Ready => "ready",
        }
    }

    fn parse(column: usize, raw: &str) -> rusqlite::Result<Self> {
        match raw {
            "processing" => Ok(EventStatus::Processing),
            "ready" => Ok(EventStatus::Ready),
            other => Err(rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                format!("unknown event status {other:?}").into(),
            )),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImageRecord {
    pub id: String,
    pub event_id: String,
    pub image_url: String,
    pub processed: bool,
    /// -1 when the image failed.
    pub face_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatchRecord {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub image_url: String,
    pub face_index: usize,
    pub distance: Option<f32>,
    pub created_at: DateTime<Utc>,
}

const UPSERT_PROCESSING: &str = "INSERT INTO events (event_id, status, created_at, updated_at)
     VALUES (?1, 'processing', ?2, ?2)
     ON CONFLICT(event_id) DO UPDATE SET status = 'processing', updated_at = excluded.updated_at";

impl Store {
    /// Persist a finished batch in one transaction: every image outcome
    /// (including failures), then the matched faces, then flip the event to
    /// `ready`.
    pub async fn record_batch(&self, summary: &BatchSummary) -> Result<(), StoreError> {
        let event_id = summary.event_id.clone();
        let outcomes = summary.outcomes.clone();
        let matches = summary.matched_results.clone();

        let (images, matched) = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let ts = now();
                tx.execute(UPSERT_PROCESSING, params![event_id, ts])?;

                {
                    let mut insert_image = tx.prepare(
                        "INSERT INTO event_images
                         (id, event_id, image_url, processed, face_count, error, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    for outcome in &outcomes {
                        insert_image.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            event_id,
                            outcome.image_url,
                            outcome.succeeded(),
                            outcome.face_count,
                            outcome.error,
                            ts,
                        ])?;
                    }

                    let mut insert_match = tx.prepare(
                        "INSERT INTO face_matches
                         (id, event_id, user_id, image_url, face_index, distance, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    for m in &matches {
                        let Some(user_id) = &m.identity_id else {
                            continue;
                        };
                        insert_match.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            event_id,
                            user_id,
                            m.image_url,
                            m.face_index as i64,
                            m.distance.map(f64::from),
                            ts,
                        ])?;
                    }
                }

                tx.execute(
                    "UPDATE events SET status = 'ready', updated_at = ?2 WHERE event_id = ?1",
                    params![event_id, now()],
                )?;
                tx.commit()?;
                Ok((outcomes.len(), matches.len()))
            })
            .await?;

        tracing::info!(event_id = %summary.event_id, images, matched, "batch results persisted");
        Ok(())
    }

    pub async fn event(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        let id = event_id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT event_id, status, created_at, updated_at FROM events WHERE event_id = ?1",
                        [&id],
                        |row| {
                            Ok(EventRecord {
                                event_id: row.get(0)?,
                                status: EventStatus::parse(1, &row.get::<_, String>(1)?)?,
                                created_at: parse_timestamp(2, &row.get::<_, String>(2)?)?,
                                updated_at: parse_timestamp(3, &row.get::<_, String>(3)?)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    /// Image outcomes of an event, in submission order.
    pub async fn images_for_event(&self, event_id: &str) -> Result<Vec<EventImageRecord>, StoreError> {
        let id = event_id.to_string();
        let images = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, event_id, image_url, processed, face_count, error, created_at
                     FROM event_images WHERE event_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map([&id], |row| {
                    Ok(EventImageRecord {
                        id: row.get(0)?,
                        event_id: row.get(1)?,
                        image_url: row.get(2)?,
                        processed: row.get(3)?,
                        face_count: row.get(4)?,
                        error: row.get(5)?,
                        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(images)
    }

    /// Matched faces of an event, in the order they were found.
    pub async fn matches_for_event(&self, event_id: &str) -> Result<Vec<FaceMatchRecord>, StoreError> {
        let id = event_id.to_string();
        let matches = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, event_id, user_id, image_url, face_index, distance, created_at
                     FROM face_matches WHERE event_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map([&id], |row| {
                    Ok(FaceMatchRecord {
                        id: row.get(0)?,
                        event_id: row.get(1)?,
                        user_id: row.get(2)?,
                        image_url: row.get(3)?,
                        face_index: row.get::<_, i64>(4)? as usize,
                        distance: row.get::<_, Option<f64>>(5)?.map(|d| d as f32),
                        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(matches)
    }
}
