//! Capture uploader
//!
//! One attempt runs: sign -> transfer (progress) -> confirm (100%) ->
//! single record update -> delayed, best-effort removal of the object.
//! An object whose record update failed is removed the same way.

use chrono::Utc;
use reelcap_core::{Capture, CaptureError, CaptureResult, RecordId, UploadProgress};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::object_store::ObjectStorage;
use crate::records::RecordStore;

/// Outcome of a successful upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub object_name: String,
    pub public_url: String,
    pub bytes: usize,
    pub elapsed: Duration,
}

impl UploadReceipt {
    /// Average transfer rate over the whole attempt
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Moves a [`Capture`] into object storage and attaches it to a record
pub struct Uploader {
    storage: Arc<dyn ObjectStorage>,
    records: Arc<dyn RecordStore>,
    config: UploaderConfig,
    cleanup: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Uploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        records: Arc<dyn RecordStore>,
        config: UploaderConfig,
    ) -> Self {
        Self {
            storage,
            records,
            config,
            cleanup: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// `{prefix}-{recordId}-{unixMillis}.{ext}`
    pub fn object_name(&self, record_id: &RecordId, extension: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            self.config.object_prefix,
            record_id,
            Utc::now().timestamp_millis(),
            extension
        )
    }

    /// Run one upload attempt
    ///
    /// `progress` is reset to 0, rises monotonically while bytes are handed
    /// to the transport and reaches 100 only once storage confirms. The
    /// record is updated exactly once, after confirmation. The capture is
    /// only borrowed so a failed attempt can be retried with the same data.
    pub async fn upload(
        &self,
        capture: &Capture,
        record_id: &RecordId,
        progress: &UploadProgress,
    ) -> CaptureResult<UploadReceipt> {
        let started = Instant::now();
        progress.reset();

        let object_name = self.object_name(record_id, capture.file_extension());
        info!(
            record_id = %record_id,
            object = %object_name,
            bytes = capture.len(),
            "Starting upload"
        );

        let destination = self
            .storage
            .create_signed_upload_url(&object_name)
            .await
            .map_err(|e| CaptureError::SignedUrlError {
                reason: e.to_string(),
            })?;

        self.storage
            .upload_to_signed_url(
                &destination,
                capture.data().clone(),
                capture.container_type(),
                progress.clone(),
            )
            .await
            .map_err(|e| CaptureError::UploadFailed {
                reason: e.to_string(),
            })?;
        progress.complete();

        let public_url =
            self.storage
                .public_url(&object_name)
                .map_err(|e| CaptureError::UploadFailed {
                    reason: e.to_string(),
                })?;

        let mut fields = Map::new();
        fields.insert(
            self.config.video_field.clone(),
            json!([{ "url": public_url }]),
        );
        if let Err(e) = self.records.update_record(record_id, fields).await {
            warn!(record_id = %record_id, object = %object_name, error = %e, "Record update failed");
            // Nothing references the object now; a retry uploads under a new name
            if self.config.cleanup_enabled {
                self.schedule_cleanup(object_name);
            }
            return Err(CaptureError::RecordUpdateFailed {
                record_id: record_id.to_string(),
                reason: e.to_string(),
            });
        }

        if self.config.cleanup_enabled {
            self.schedule_cleanup(object_name.clone());
        }

        let receipt = UploadReceipt {
            object_name,
            public_url,
            bytes: capture.len(),
            elapsed: started.elapsed(),
        };
        info!(
            record_id = %record_id,
            object = %receipt.object_name,
            rate = receipt.bytes_per_second(),
            "Upload complete"
        );
        Ok(receipt)
    }

    fn schedule_cleanup(&self, object_name: String) {
        let storage = Arc::clone(&self.storage);
        let delay = self.config.cleanup_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match storage.remove(std::slice::from_ref(&object_name)).await {
                Ok(()) => debug!(object = %object_name, "Removed uploaded object"),
                Err(e) => warn!(object = %object_name, error = %e, "Failed to remove uploaded object"),
            }
        });

        let mut cleanup = self.cleanup.lock();
        cleanup.retain(|h| !h.is_finished());
        cleanup.push(handle);
    }

    /// Wait for scheduled removals to run
    pub async fn flush_cleanup(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.cleanup.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("config", &self.config)
            .field("pending_cleanup", &self.cleanup.lock().len())
            .finish()
    }
}
