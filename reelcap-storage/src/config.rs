//! Connection settings for the storage collaborators

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StorageError;

/// Default bucket receiving capture uploads
pub const DEFAULT_BUCKET: &str = "video";
/// Default Airtable table holding candidate records
pub const DEFAULT_TABLE: &str = "SFF Candidate Database";
/// Default attachment field written after upload
pub const DEFAULT_VIDEO_FIELD: &str = "Video Instruction";
/// Default Airtable REST root
pub const DEFAULT_AIRTABLE_API_ROOT: &str = "https://api.airtable.com/v0";

fn required_env(name: &str) -> Result<String, StorageError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(StorageError::MissingConfiguration {
            field: name.to_string(),
        }),
    }
}

fn optional_env(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Supabase Storage project settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Service key sent as bearer token and `apikey` header
    pub service_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            bucket: default_bucket(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Read `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` and optional `SUPABASE_BUCKET`
    pub fn from_env() -> Result<Self, StorageError> {
        Ok(Self {
            url: required_env("SUPABASE_URL")?,
            service_key: required_env("SUPABASE_SERVICE_ROLE_KEY")?,
            bucket: optional_env("SUPABASE_BUCKET", DEFAULT_BUCKET),
        })
    }
}

/// Airtable base settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_video_field")]
    pub video_field: String,
    #[serde(default = "default_api_root")]
    pub api_root: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_video_field() -> String {
    DEFAULT_VIDEO_FIELD.to_string()
}

fn default_api_root() -> String {
    DEFAULT_AIRTABLE_API_ROOT.to_string()
}

impl AirtableConfig {
    pub fn new(api_key: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_id: base_id.into(),
            table: default_table(),
            video_field: default_video_field(),
            api_root: default_api_root(),
        }
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Read `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID` and the optional
    /// `AIRTABLE_TABLE` / `AIRTABLE_VIDEO_FIELD` overrides
    pub fn from_env() -> Result<Self, StorageError> {
        Ok(Self {
            api_key: required_env("AIRTABLE_API_KEY")?,
            base_id: required_env("AIRTABLE_BASE_ID")?,
            table: optional_env("AIRTABLE_TABLE", DEFAULT_TABLE),
            video_field: optional_env("AIRTABLE_VIDEO_FIELD", DEFAULT_VIDEO_FIELD),
            api_root: default_api_root(),
        })
    }
}

/// Uploader behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Wait before removing the object once the record holds its URL
    pub cleanup_delay: Duration,
    /// Record field receiving the attachment list
    pub video_field: String,
    /// Object name prefix, `{prefix}-{recordId}-{unixMillis}.{ext}`
    pub object_prefix: String,
    /// Whether the uploaded object is removed after the record update
    pub cleanup_enabled: bool,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            cleanup_delay: Duration::from_secs(1),
            video_field: DEFAULT_VIDEO_FIELD.to_string(),
            object_prefix: DEFAULT_BUCKET.to_string(),
            cleanup_enabled: true,
        }
    }
}

impl UploaderConfig {
    pub fn with_video_field(mut self, field: impl Into<String>) -> Self {
        self.video_field = field.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let supabase = SupabaseConfig::new("https://x.supabase.co", "key");
        assert_eq!(supabase.bucket, "video");

        let airtable = AirtableConfig::new("pat", "app123");
        assert_eq!(airtable.table, "SFF Candidate Database");
        assert_eq!(airtable.video_field, "Video Instruction");
        assert_eq!(airtable.api_root, "https://api.airtable.com/v0");

        let uploader = UploaderConfig::default();
        assert_eq!(uploader.cleanup_delay, Duration::from_secs(1));
        assert_eq!(uploader.object_prefix, "video");
        assert!(uploader.cleanup_enabled);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: SupabaseConfig =
            serde_json::from_str(r#"{"url":"https://x.supabase.co","service_key":"k"}"#).unwrap();
        assert_eq!(config.bucket, "video");

        let config: AirtableConfig =
            serde_json::from_str(r#"{"api_key":"pat","base_id":"app1","table":"Leads"}"#).unwrap();
        assert_eq!(config.table, "Leads");
        assert_eq!(config.video_field, "Video Instruction");
    }
}
