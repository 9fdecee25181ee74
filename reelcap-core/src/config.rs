//! Quality presets and capture timing configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CaptureError;

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD: Self = Self::new(1280, 720);
    pub const FULL_HD: Self = Self::new(1920, 1080);

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Recording quality preset chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// 1280x720 at 1.5 Mbps
    #[default]
    Standard,
    /// 1920x1080 at 2.5 Mbps
    High,
}

impl QualityPreset {
    /// Ideal capture resolution hint
    pub fn resolution(&self) -> VideoResolution {
        match self {
            QualityPreset::Standard => VideoResolution::HD,
            QualityPreset::High => VideoResolution::FULL_HD,
        }
    }

    /// Encoder video bitrate in bits per second
    pub fn video_bitrate(&self) -> u32 {
        match self {
            QualityPreset::Standard => 1_500_000,
            QualityPreset::High => 2_500_000,
        }
    }

    /// Label shown in the quality selector
    pub fn label(&self) -> &'static str {
        match self {
            QualityPreset::Standard => "720p",
            QualityPreset::High => "1080p",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityPreset {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "720p" | "standard" => Ok(QualityPreset::Standard),
            "1080p" | "high" => Ok(QualityPreset::High),
            other => Err(CaptureError::invalid_config(
                "quality preset",
                format_args!("unknown label '{other}'"),
            )),
        }
    }
}

/// Timing and encoder configuration for one capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Upper bound on the permission prompt / hardware negotiation
    pub acquisition_timeout: Duration,
    /// Ideal frame rate hint
    pub frame_rate: u32,
    /// Recorder data slice length
    pub timeslice: Duration,
    /// Elapsed time at which the user sees a duration warning
    pub duration_warning: Duration,
    /// Elapsed time at which recording is stopped automatically
    pub max_duration: Duration,
    /// Minimum spacing between play retries on the preview surface
    pub play_retry_interval: Duration,
    /// Container/codec candidates in preference order
    pub mime_candidates: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout: Duration::from_secs(10),
            frame_rate: 30,
            timeslice: Duration::from_millis(100),
            duration_warning: Duration::from_secs(90),
            max_duration: Duration::from_secs(120),
            play_retry_interval: Duration::from_millis(100),
            mime_candidates: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ],
        }
    }
}

impl CaptureConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(CaptureError::invalid_config(
                "frame_rate",
                format_args!("{} is outside 1..=120", self.frame_rate),
            ));
        }

        if self.timeslice.is_zero() {
            return Err(CaptureError::invalid_config("timeslice", "must be non-zero"));
        }

        // The recording timer counts whole seconds
        for (field, value) in [
            ("duration_warning", self.duration_warning),
            ("max_duration", self.max_duration),
        ] {
            if value.subsec_nanos() != 0 {
                return Err(CaptureError::invalid_config(
                    field,
                    format_args!("{value:?} is not a whole number of seconds"),
                ));
            }
            if u32::try_from(value.as_secs()).is_err() {
                return Err(CaptureError::invalid_config(
                    field,
                    format_args!("{value:?} is too long"),
                ));
            }
        }

        if self.max_duration < Duration::from_secs(1) {
            return Err(CaptureError::invalid_config(
                "max_duration",
                "must be at least one second",
            ));
        }

        if self.duration_warning >= self.max_duration {
            return Err(CaptureError::invalid_config(
                "duration_warning",
                "must be below max_duration",
            ));
        }

        if self.mime_candidates.is_empty() {
            return Err(CaptureError::MissingConfiguration {
                field: "mime_candidates".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_hints() {
        assert_eq!(QualityPreset::Standard.resolution(), VideoResolution::new(1280, 720));
        assert_eq!(QualityPreset::High.resolution(), VideoResolution::new(1920, 1080));
        assert_eq!(QualityPreset::Standard.video_bitrate(), 1_500_000);
        assert_eq!(QualityPreset::High.video_bitrate(), 2_500_000);
        assert_eq!(QualityPreset::default(), QualityPreset::Standard);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("1080p".parse::<QualityPreset>().ok(), Some(QualityPreset::High));
        assert_eq!(" Standard ".parse::<QualityPreset>().ok(), Some(QualityPreset::Standard));

        let err = "4k".parse::<QualityPreset>().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidConfiguration { ref field, ref reason }
                if field == "quality preset" && reason.contains("4k")
        ));
        assert_eq!(err.user_message(), "Invalid quality preset setting.");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition_timeout, Duration::from_secs(10));
        assert_eq!(config.max_duration, Duration::from_secs(120));
    }

    #[test]
    fn test_config_rejects_warning_after_cap() {
        let config = CaptureConfig {
            duration_warning: Duration::from_secs(130),
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_sub_second_cap() {
        let config = CaptureConfig {
            duration_warning: Duration::ZERO,
            max_duration: Duration::from_millis(500),
            ..CaptureConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidConfiguration { ref field, .. } if field == "max_duration"
        ));
    }

    #[test]
    fn test_config_rejects_fractional_seconds() {
        let config = CaptureConfig {
            duration_warning: Duration::from_millis(90_500),
            ..CaptureConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidConfiguration { ref field, .. } if field == "duration_warning"
        ));

        let config = CaptureConfig {
            max_duration: Duration::from_secs(u64::from(u32::MAX) + 1),
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_errors_are_invalid_not_missing() {
        let config = CaptureConfig {
            frame_rate: 0,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfiguration { ref field, .. }) if field == "frame_rate"
        ));

        let config = CaptureConfig {
            timeslice: Duration::ZERO,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfiguration { ref field, .. }) if field == "timeslice"
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: CaptureConfig = serde_json::from_str(r#"{ "frame_rate": 24 }"#).unwrap();
        assert_eq!(config.frame_rate, 24);
        assert_eq!(config.timeslice, Duration::from_millis(100));
    }
}
