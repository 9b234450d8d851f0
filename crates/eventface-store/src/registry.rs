//! Identity registry: enrolled users and their reference descriptors.

use eventface_core::{Descriptor, RegisteredIdentity};
use rusqlite::{params, OptionalExtension};

use crate::{now, Store, StoreError};

impl Store {
    /// Append `descriptor` to `user_id`, creating the identity if absent.
    /// Returns how many descriptors the identity now holds.
    pub async fn enroll_descriptor(
        &self,
        user_id: &str,
        descriptor: &Descriptor,
    ) -> Result<usize, StoreError> {
        if descriptor.is_empty() {
            return Err(StoreError::EmptyDescriptor(user_id.to_string()));
        }
        if !descriptor.is_finite() {
            return Err(StoreError::NonFiniteDescriptor(user_id.to_string()));
        }

        let user = user_id.to_string();
        let bytes = descriptor_to_bytes(&descriptor.values);
        let dim = descriptor.len() as i64;

        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let ts = now();
                tx.execute(
                    "INSERT INTO identities (user_id, created_at) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO NOTHING",
                    params![user, ts],
                )?;
                tx.execute(
                    "INSERT INTO descriptors (user_id, descriptor, dim, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user, bytes, dim, ts],
                )?;
                let count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM descriptors WHERE user_id = ?1",
                    [&user],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(count as usize)
            })
            .await?;

        tracing::info!(user_id, dim, descriptors = count, "descriptor enrolled");
        Ok(count)
    }

    /// One entry per identity, in enrolment order, carrying the first
    /// descriptor recorded for it. Identities without descriptors are skipped.
    pub async fn list_identities(&self) -> Result<Vec<RegisteredIdentity>, StoreError> {
        let identities = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT i.user_id, d.descriptor
                     FROM identities i
                     JOIN descriptors d ON d.id = (
                         SELECT MIN(id) FROM descriptors WHERE user_id = i.user_id
                     )
                     ORDER BY i.rowid",
                )?;
                let rows = stmt.query_map([], |row| {
                    let user_id: String = row.get(0)?;
                    let bytes: Vec<u8> = row.get(1)?;
                    Ok(RegisteredIdentity::new(user_id, bytes_to_descriptor(1, &bytes)?))
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;

        tracing::debug!(count = identities.len(), "identity registry loaded");
        Ok(identities)
    }

    pub async fn identity_count(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await?;
        Ok(count)
    }

    /// Number of descriptors enrolled for `user_id`, or `None` if unknown.
    pub async fn descriptor_count(&self, user_id: &str) -> Result<Option<usize>, StoreError> {
        let user = user_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let known = conn
                    .query_row("SELECT 1 FROM identities WHERE user_id = ?1", [&user], |_| Ok(()))
                    .optional()?;
                if known.is_none() {
                    return Ok(None);
                }
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM descriptors WHERE user_id = ?1",
                    [&user],
                    |row| row.get(0),
                )?;
                Ok(Some(n as usize))
            })
            .await?;
        Ok(count)
    }
}

fn descriptor_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_descriptor(column: usize, bytes: &[u8]) -> rusqlite::Result<Descriptor> {
    if bytes.len() % 4 != 0 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Blob,
            format!("descriptor blob of {} bytes is not a whole number of f32s", bytes.len()).into(),
        ));
    }
    Ok(Descriptor::new(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(values: &[f32]) -> Descriptor {
        Descriptor::new(values.to_vec())
    }

    #[test]
    fn test_descriptor_bytes_roundtrip() {
        let values = [0.25f32, -1.5, 3.0e-7];
        let back = bytes_to_descriptor(0, &descriptor_to_bytes(&values)).unwrap();
        assert_eq!(back.values, values);
        assert!(bytes_to_descriptor(0, &[0, 1, 2]).is_err());
    }

    #[tokio::test]
    async fn test_enroll_creates_identity_and_appends() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.enroll_descriptor("alice", &desc(&[0.1, 0.2])).await.unwrap(), 1);
        assert_eq!(store.enroll_descriptor("alice", &desc(&[0.3, 0.4])).await.unwrap(), 2);
        assert_eq!(store.identity_count().await.unwrap(), 1);
        assert_eq!(store.descriptor_count("alice").await.unwrap(), Some(2));
        assert_eq!(store.descriptor_count("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enroll_rejects_empty_descriptor() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store.enroll_descriptor("alice", &desc(&[])).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyDescriptor(ref u) if u == "alice"));
        assert_eq!(store.identity_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enroll_rejects_non_finite_descriptor() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store
            .enroll_descriptor("alice", &desc(&[f32::NAN, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NonFiniteDescriptor(ref u) if u == "alice"));
        assert_eq!(store.identity_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_identities_uses_first_descriptor_in_enrolment_order() {
        let store = Store::open_in_memory().await.unwrap();
        store.enroll_descriptor("bob", &desc(&[1.0, 1.0])).await.unwrap();
        store.enroll_descriptor("alice", &desc(&[0.0, 0.0])).await.unwrap();
        store.enroll_descriptor("bob", &desc(&[9.0, 9.0])).await.unwrap();

        let identities = store.list_identities().await.unwrap();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].identity_id, "bob");
        assert_eq!(identities[0].descriptor.values, vec![1.0, 1.0]);
        assert_eq!(identities[1].identity_id, "alice");
    }

    #[tokio::test]
    async fn test_list_identities_empty_registry() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.list_identities().await.unwrap().is_empty());
    }
}
