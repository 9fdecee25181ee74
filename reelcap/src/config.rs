//! Configuration types and defaults

use reelcap_core::{CaptureConfig, CaptureError, QualityPreset};
use reelcap_storage::UploaderConfig;
use serde::{Deserialize, Serialize};

/// Everything a [`CaptureWorkflow`](crate::CaptureWorkflow) needs besides its collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Acquisition, recorder and timer settings
    pub capture: CaptureConfig,
    /// Upload naming and cleanup
    pub uploader: UploaderConfig,
    /// Preset selected when the workflow mounts
    pub default_quality: QualityPreset,
    /// Capacity of the workflow event channel
    pub event_capacity: usize,
}

impl WorkflowConfig {
    /// Load from a JSON document; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json).map_err(|e| CaptureError::invalid_config("workflow config", e))
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        self.capture.validate()?;
        if self.uploader.video_field.trim().is_empty() {
            return Err(CaptureError::MissingConfiguration {
                field: "uploader.video_field".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn event_capacity(&self) -> usize {
        if self.event_capacity == 0 {
            DEFAULT_EVENT_CAPACITY
        } else {
            self.event_capacity
        }
    }
}

/// Event channel capacity used when none is configured
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = WorkflowConfig::from_json(
            r#"{ "default_quality": "high", "capture": { "max_duration": { "secs": 60, "nanos": 0 } } }"#,
        )
        .unwrap();
        assert_eq!(config.default_quality, QualityPreset::High);
        assert_eq!(config.capture.max_duration, Duration::from_secs(60));
        assert_eq!(config.capture.acquisition_timeout, Duration::from_secs(10));
        assert_eq!(config.uploader.video_field, "Video Instruction");
        assert_eq!(config.event_capacity(), DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_invalid_json_is_a_configuration_error() {
        let err = WorkflowConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidConfiguration { ref field, .. } if field == "workflow config"
        ));
        assert_eq!(err.user_message(), "Invalid workflow config setting.");
    }
}
