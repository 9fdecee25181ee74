//! Airtable REST client

use async_trait::async_trait;
use reelcap_core::RecordId;
use reqwest::{Client, Url};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::AirtableConfig;
use crate::error::StorageError;
use crate::records::RecordStore;

/// [`RecordStore`] backed by one Airtable table
#[derive(Debug, Clone)]
pub struct AirtableClient {
    client: Client,
    config: AirtableConfig,
    table_root: Url,
}

impl AirtableClient {
    pub fn new(config: AirtableConfig) -> Result<Self, StorageError> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: AirtableConfig) -> Result<Self, StorageError> {
        for (field, value) in [
            ("api_key", &config.api_key),
            ("base_id", &config.base_id),
            ("table", &config.table),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::MissingConfiguration {
                    field: field.to_string(),
                });
            }
        }

        let invalid = |reason: String| StorageError::InvalidUrl {
            url: config.api_root.clone(),
            reason,
        };
        let mut table_root = Url::parse(&config.api_root).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = table_root
                .path_segments_mut()
                .map_err(|_| invalid("not a base URL".to_string()))?;
            segments
                .pop_if_empty()
                .push(&config.base_id)
                .push(&config.table);
        }

        Ok(Self {
            client,
            config,
            table_root,
        })
    }

    pub fn config(&self) -> &AirtableConfig {
        &self.config
    }

    fn record_url(&self, record_id: &RecordId) -> Result<Url, StorageError> {
        let mut url = self.table_root.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl {
                url: self.table_root.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .push(record_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    #[tracing::instrument(skip(self, fields), fields(table = %self.config.table))]
    async fn update_record(
        &self,
        record_id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<(), StorageError> {
        let url = self.record_url(record_id)?;
        let field_names: Vec<String> = fields.keys().cloned().collect();

        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                endpoint: format!("{}/{}", self.config.table, record_id),
                status: status.as_u16(),
                body,
            });
        }

        info!(record_id = %record_id, fields = ?field_names, "Record updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_url_escapes_table_name() {
        let client = AirtableClient::new(AirtableConfig::new("pat", "appXYZ")).unwrap();
        let url = client.record_url(&RecordId::new("rec42").unwrap()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appXYZ/SFF%20Candidate%20Database/rec42"
        );
    }

    #[test]
    fn test_requires_credentials() {
        let err = AirtableClient::new(AirtableConfig::new("", "appXYZ")).unwrap_err();
        assert!(matches!(err, StorageError::MissingConfiguration { ref field } if field == "api_key"));
    }
}
