//! Object storage collaborator

use async_trait::async_trait;
use bytes::Bytes;
use reelcap_core::UploadProgress;

use crate::error::StorageError;

/// A one-shot upload destination issued by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    /// Object name inside the bucket
    pub path: String,
    /// Absolute URL accepting a single PUT
    pub url: String,
    /// Upload token embedded in the URL, when the store issues one
    pub token: Option<String>,
}

/// Bucketed object store with signed upload destinations
///
/// Implementations report transfer progress through the supplied
/// [`UploadProgress`] as bytes are handed to the transport; they never
/// mark it complete, that is the caller's job once the store confirms.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Reserve `name` and return where to PUT its bytes
    async fn create_signed_upload_url(&self, name: &str) -> Result<SignedUpload, StorageError>;

    /// Transfer `data` to a destination from [`create_signed_upload_url`](Self::create_signed_upload_url)
    async fn upload_to_signed_url(
        &self,
        destination: &SignedUpload,
        data: Bytes,
        content_type: &str,
        progress: UploadProgress,
    ) -> Result<(), StorageError>;

    /// Publicly readable URL of `name`
    fn public_url(&self, name: &str) -> Result<String, StorageError>;

    /// Delete objects by name
    async fn remove(&self, names: &[String]) -> Result<(), StorageError>;
}
