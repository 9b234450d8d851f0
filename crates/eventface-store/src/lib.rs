//! eventface-store — SQLite persistence for the identity registry and for
//! event recognition results.
//!
//! All access goes through a [`tokio_rusqlite::Connection`], which owns the
//! blocking SQLite handle on its own thread.

mod events;
mod registry;
mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_rusqlite::Connection;

pub use events::{EventImageRecord, EventRecord, EventStatus, FaceMatchRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("refusing to enrol an empty descriptor for {0}")]
    EmptyDescriptor(String),
    #[error("refusing to enrol a descriptor with NaN or infinite values for {0}")]
    NonFiniteDescriptor(String),
}

/// Cheap to clone; clones share the same connection thread.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), "opened database");
        Self::initialize(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}
