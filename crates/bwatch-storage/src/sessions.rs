//! Session record repository.
//!
//! Sessions are single JSON objects keyed by `(icdKey, uploadEpoch)` under the
//! sessions prefix. The repository deserializes through `SessionRecord`, whose
//! flattened catch-all map keeps fields owned by other services intact across
//! the worker's read-modify-write cycle.

use std::sync::Arc;

use tracing::debug;

use bwatch_models::{session_object_key, SessionRecord};

use crate::client::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Repository for session records over a `BlobStore`.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn BlobStore>,
    sessions_prefix: String,
}

impl SessionStore {
    pub fn new(store: Arc<dyn BlobStore>, sessions_prefix: impl Into<String>) -> Self {
        Self {
            store,
            sessions_prefix: sessions_prefix.into(),
        }
    }

    fn key(&self, icd_key: &str, upload_epoch: i64) -> String {
        session_object_key(&self.sessions_prefix, icd_key, upload_epoch)
    }

    /// Read a session by key; `None` when the object does not exist.
    pub async fn read(
        &self,
        icd_key: &str,
        upload_epoch: i64,
    ) -> StorageResult<Option<SessionRecord>> {
        let key = self.key(icd_key, upload_epoch);
        match self.store.read_json(&key).await {
            Ok(value) => {
                let record = serde_json::from_value(value)
                    .map_err(|e| StorageError::invalid_record(&key, e.to_string()))?;
                Ok(Some(record))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a session record under its key.
    pub async fn write(
        &self,
        icd_key: &str,
        upload_epoch: i64,
        record: &SessionRecord,
    ) -> StorageResult<()> {
        let key = self.key(icd_key, upload_epoch);
        let value = serde_json::to_value(record)?;
        self.store.write_json(&key, &value).await
    }

    /// Resolve the session owning an uploaded video.
    ///
    /// First tries the direct `(icdKey, uploadEpoch)` key, then falls back to
    /// scanning the child's records for one whose `storagePath` matches the
    /// event's object name. Returns the epoch alongside the record since the
    /// scan path recovers it from the object key.
    pub async fn resolve(
        &self,
        icd_key: &str,
        upload_epoch: Option<i64>,
        object_name: &str,
    ) -> StorageResult<Option<(i64, SessionRecord)>> {
        if let Some(epoch) = upload_epoch {
            if let Some(record) = self.read(icd_key, epoch).await? {
                return Ok(Some((epoch, record)));
            }
        }

        let prefix = format!("{}/{}/", self.sessions_prefix.trim_matches('/'), icd_key);
        debug!("Session not at direct key, scanning {}", prefix);

        for key in self.store.list(&prefix).await? {
            let Some(epoch) = epoch_from_key(&key) else {
                continue;
            };
            let value = match self.store.read_json(&key).await {
                Ok(value) => value,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let record: SessionRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                // a malformed sibling record must not mask the lookup
                Err(_) => continue,
            };
            if record.storage_path.as_deref() == Some(object_name) {
                return Ok(Some((epoch, record)));
            }
        }

        Ok(None)
    }
}

/// `sessions/<icd>/<epoch>.json` -> epoch
fn epoch_from_key(key: &str) -> Option<i64> {
    key.rsplit('/')
        .next()?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
