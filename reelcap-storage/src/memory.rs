//! In-memory collaborators for tests and offline demos

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reelcap_core::{RecordId, UploadProgress};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::StorageError;
use crate::object_store::{ObjectStorage, SignedUpload};
use crate::records::RecordStore;

const DEFAULT_BASE_URL: &str = "memory://storage";
const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Default)]
struct Failures {
    signing: Option<String>,
    upload: Option<String>,
    remove: Option<String>,
}

/// Object store holding objects in a map
///
/// Transfers are reported to the progress handle in fixed-size steps so
/// observers see the same monotonic sequence a network client produces.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    base_url: String,
    chunk_size: usize,
    objects: Mutex<HashMap<String, Bytes>>,
    pending: Mutex<HashMap<String, String>>,
    removed: Mutex<Vec<String>>,
    failures: Mutex<Failures>,
    next_token: AtomicU64,
    progress_log: Mutex<Vec<u8>>,
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            objects: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            removed: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            next_token: AtomicU64::new(1),
            progress_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Refuse the next signing requests with `reason` until cleared
    pub fn fail_signing(&self, reason: Option<&str>) {
        self.failures.lock().signing = reason.map(str::to_string);
    }

    /// Abort transfers halfway with `reason` until cleared
    pub fn fail_uploads(&self, reason: Option<&str>) {
        self.failures.lock().upload = reason.map(str::to_string);
    }

    pub fn fail_removals(&self, reason: Option<&str>) {
        self.failures.lock().remove = reason.map(str::to_string);
    }

    pub fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.lock().get(name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    /// Every progress value published by transfers, in order
    pub fn progress_log(&self) -> Vec<u8> {
        self.progress_log.lock().clone()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn create_signed_upload_url(&self, name: &str) -> Result<SignedUpload, StorageError> {
        if let Some(reason) = self.failures.lock().signing.clone() {
            return Err(StorageError::Rejected { reason });
        }

        let token = format!("tok{}", self.next_token.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().insert(token.clone(), name.to_string());
        Ok(SignedUpload {
            path: name.to_string(),
            url: format!("{}/upload/{}?token={}", self.base_url, name, token),
            token: Some(token),
        })
    }

    async fn upload_to_signed_url(
        &self,
        destination: &SignedUpload,
        data: Bytes,
        content_type: &str,
        progress: UploadProgress,
    ) -> Result<(), StorageError> {
        let token = destination.token.clone().unwrap_or_default();
        let name = self
            .pending
            .lock()
            .remove(&token)
            .ok_or_else(|| StorageError::Rejected {
                reason: format!("unknown upload token for {}", destination.path),
            })?;

        let failure = self.failures.lock().upload.clone();
        let total = data.len() as u64;
        let mut sent = 0u64;
        for chunk in data.chunks(self.chunk_size) {
            if failure.is_some() && sent * 2 >= total {
                break;
            }
            sent += chunk.len() as u64;
            let value = progress.report(sent, total);
            self.progress_log.lock().push(value);
            tokio::task::yield_now().await;
        }

        if let Some(reason) = failure {
            return Err(StorageError::Rejected { reason });
        }

        debug!(object = %name, content_type, bytes = total, "Stored object");
        self.objects.lock().insert(name, data);
        Ok(())
    }

    fn public_url(&self, name: &str) -> Result<String, StorageError> {
        Ok(format!("{}/public/{}", self.base_url, name))
    }

    async fn remove(&self, names: &[String]) -> Result<(), StorageError> {
        if let Some(reason) = self.failures.lock().remove.clone() {
            return Err(StorageError::Rejected { reason });
        }

        let mut objects = self.objects.lock();
        let mut removed = self.removed.lock();
        for name in names {
            if objects.remove(name).is_some() {
                removed.push(name.clone());
            }
        }
        Ok(())
    }
}

/// Record store keeping every update it receives
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<String, Map<String, Value>>>,
    updates: Mutex<Vec<(String, Map<String, Value>)>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_updates(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_string);
    }

    /// Current fields of a record
    pub fn record(&self, record_id: &str) -> Option<Map<String, Value>> {
        self.records.lock().get(record_id).cloned()
    }

    /// Every accepted update, in order
    pub fn updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn update_record(
        &self,
        record_id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<(), StorageError> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(StorageError::Rejected { reason });
        }

        self.records
            .lock()
            .entry(record_id.to_string())
            .or_default()
            .extend(fields.clone());
        self.updates.lock().push((record_id.to_string(), fields));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_tokens_are_single_use() {
        let storage = InMemoryObjectStorage::new();
        let signed = storage.create_signed_upload_url("a.webm").await.unwrap();
        let progress = UploadProgress::new();

        storage
            .upload_to_signed_url(&signed, Bytes::from_static(b"abc"), "video/webm", progress.clone())
            .await
            .unwrap();
        assert_eq!(storage.object("a.webm").unwrap(), Bytes::from_static(b"abc"));

        let err = storage
            .upload_to_signed_url(&signed, Bytes::from_static(b"abc"), "video/webm", progress)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_record_updates_merge_fields() {
        let store = InMemoryRecordStore::new();
        let id = RecordId::new("rec1").unwrap();

        let mut first = Map::new();
        first.insert("Name".to_string(), Value::from("Ada"));
        store.update_record(&id, first).await.unwrap();

        let mut second = Map::new();
        second.insert("Video Instruction".to_string(), Value::from("x"));
        store.update_record(&id, second).await.unwrap();

        let record = store.record("rec1").unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(store.updates().len(), 2);
    }
}
