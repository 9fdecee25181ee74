//! System-of-record collaborator

use async_trait::async_trait;
use reelcap_core::RecordId;
use serde_json::{Map, Value};

use crate::error::StorageError;

/// External record store receiving upload results
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Overwrite `fields` on one record; other fields are untouched
    async fn update_record(
        &self,
        record_id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<(), StorageError>;
}
