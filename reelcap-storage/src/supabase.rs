//! Supabase Storage REST client
//!
//! Object names are placed in the configured bucket. Uploads go through a
//! signed URL so the transfer itself carries no service credentials.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reelcap_core::UploadProgress;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::SupabaseConfig;
use crate::error::StorageError;
use crate::object_store::{ObjectStorage, SignedUpload};

/// Size of the body chunks handed to the transport
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

/// [`ObjectStorage`] backed by a Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: Client,
    config: SupabaseConfig,
    storage_root: Url,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig) -> Result<Self, StorageError> {
        Self::with_client(Client::new(), config)
    }

    /// Use a preconfigured HTTP client (proxies, timeouts)
    pub fn with_client(client: Client, config: SupabaseConfig) -> Result<Self, StorageError> {
        if config.service_key.trim().is_empty() {
            return Err(StorageError::MissingConfiguration {
                field: "service_key".to_string(),
            });
        }
        if config.bucket.trim().is_empty() {
            return Err(StorageError::MissingConfiguration {
                field: "bucket".to_string(),
            });
        }

        let invalid = |reason: String| StorageError::InvalidUrl {
            url: config.url.clone(),
            reason,
        };
        let mut storage_root = Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = storage_root
                .path_segments_mut()
                .map_err(|_| invalid("not a base URL".to_string()))?;
            segments.pop_if_empty().extend(["storage", "v1"]);
        }

        Ok(Self {
            client,
            config,
            storage_root,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.storage_root.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl {
                url: self.storage_root.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
    }

    async fn ensure_success(endpoint: &str, response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    #[tracing::instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn create_signed_upload_url(&self, name: &str) -> Result<SignedUpload, StorageError> {
        let endpoint = self.endpoint(&["object", "upload", "sign", &self.config.bucket, name])?;
        let response = self
            .authorize(self.client.post(endpoint))
            .json(&json!({}))
            .send()
            .await?;
        let response = Self::ensure_success("object/upload/sign", response).await?;

        let body: SignedUrlResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::MalformedResponse {
                    endpoint: "object/upload/sign".to_string(),
                    reason: e.to_string(),
                })?;

        let absolute = format!(
            "{}{}",
            self.storage_root.as_str().trim_end_matches('/'),
            body.url
        );
        let url = Url::parse(&absolute).map_err(|e| StorageError::InvalidUrl {
            url: absolute.clone(),
            reason: e.to_string(),
        })?;
        let token = url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned());

        debug!(object = name, has_token = token.is_some(), "Issued signed upload URL");
        Ok(SignedUpload {
            path: name.to_string(),
            url: url.to_string(),
            token,
        })
    }

    #[tracing::instrument(skip(self, data, progress), fields(object = %destination.path, bytes = data.len()))]
    async fn upload_to_signed_url(
        &self,
        destination: &SignedUpload,
        data: Bytes,
        content_type: &str,
        progress: UploadProgress,
    ) -> Result<(), StorageError> {
        let total = data.len();
        let chunks: Vec<Bytes> = (0..total)
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
            .collect();

        let mut sent = 0u64;
        let body = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report(sent, total as u64);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let response = self
            .client
            .put(&destination.url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .header("x-upsert", "false")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        Self::ensure_success("object/upload/sign", response).await?;

        info!(object = %destination.path, bytes = total, "Upload accepted by storage");
        Ok(())
    }

    fn public_url(&self, name: &str) -> Result<String, StorageError> {
        self.endpoint(&["object", "public", &self.config.bucket, name])
            .map(String::from)
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn remove(&self, names: &[String]) -> Result<(), StorageError> {
        let endpoint = self.endpoint(&["object", &self.config.bucket])?;
        let response = self
            .authorize(self.client.delete(endpoint))
            .json(&json!({ "prefixes": names }))
            .send()
            .await?;
        Self::ensure_success("object", response).await?;
        debug!(count = names.len(), "Removed objects");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_is_built_locally() {
        let storage =
            SupabaseStorage::new(SupabaseConfig::new("https://proj.supabase.co/", "key")).unwrap();
        let url = storage.public_url("video-rec1-1700000000000.webm").unwrap();
        assert_eq!(
            url,
            "https://proj.supabase.co/storage/v1/object/public/video/video-rec1-1700000000000.webm"
        );
    }

    #[test]
    fn test_object_names_are_escaped() {
        let storage =
            SupabaseStorage::new(SupabaseConfig::new("https://proj.supabase.co", "key")).unwrap();
        let url = storage.public_url("video-a b-1.webm").unwrap();
        assert!(url.ends_with("/video/video-a%20b-1.webm"));
    }

    #[test]
    fn test_rejects_unusable_configuration() {
        let err = SupabaseStorage::new(SupabaseConfig::new("not a url", "key")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));

        let err = SupabaseStorage::new(SupabaseConfig::new("https://proj.supabase.co", " "))
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingConfiguration { .. }));
    }
}
