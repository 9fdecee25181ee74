//! Camera and microphone acquisition
//!
//! [`DeviceAcquisition`] wraps a platform [`MediaDevices`] implementation with
//! the timeout, liveness validation and failure mapping every caller needs.

use async_trait::async_trait;
use reelcap_core::{CaptureConfig, CaptureError, CaptureResult, QualityPreset};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::stream::{MediaConstraints, MediaStream};

/// Failure names a platform capture request can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// `NotAllowedError`
    NotAllowed(String),
    /// `NotFoundError`
    NotFound(String),
    /// `NotReadableError`: device exists but is busy or broken
    NotReadable(String),
    /// `OverconstrainedError`
    Overconstrained(String),
    /// Capture API missing on this platform
    Unsupported(String),
    /// Anything else
    Other(String),
}

impl From<DeviceError> for CaptureError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotAllowed(operation) => CaptureError::PermissionDenied { operation },
            DeviceError::NotFound(reason) => CaptureError::DeviceNotFound { reason },
            DeviceError::Unsupported(missing) => CaptureError::UnsupportedBrowser { missing },
            DeviceError::NotReadable(reason)
            | DeviceError::Overconstrained(reason)
            | DeviceError::Other(reason) => CaptureError::Unknown { reason },
        }
    }
}

/// Platform capture API
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether capture is available at all on this platform
    fn is_supported(&self) -> bool {
        true
    }

    /// Request a combined audio+video stream
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError>;
}

/// Bounded, validated camera acquisition
#[derive(Clone)]
pub struct DeviceAcquisition {
    devices: Arc<dyn MediaDevices>,
    timeout: Duration,
    frame_rate: u32,
}

impl DeviceAcquisition {
    pub fn new(devices: Arc<dyn MediaDevices>, config: &CaptureConfig) -> Self {
        Self {
            devices,
            timeout: config.acquisition_timeout,
            frame_rate: config.frame_rate,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Request a live stream matching `preset`
    ///
    /// Any partially acquired tracks are stopped before an error is returned.
    pub async fn acquire(&self, preset: QualityPreset) -> CaptureResult<MediaStream> {
        if !self.devices.is_supported() {
            warn!("Media capture API not available");
            return Err(CaptureError::UnsupportedBrowser {
                missing: "mediaDevices.getUserMedia".to_string(),
            });
        }

        let constraints = MediaConstraints::for_preset(preset, self.frame_rate);
        debug!(
            quality = %preset,
            resolution = %constraints.ideal_resolution(),
            frame_rate = constraints.ideal_frame_rate,
            "Requesting camera access"
        );

        let stream = match tokio::time::timeout(
            self.timeout,
            self.devices.get_user_media(&constraints),
        )
        .await
        {
            Err(_) => {
                warn!(timeout = ?self.timeout, "Camera access request timed out");
                return Err(CaptureError::AcquisitionTimeout {
                    duration: self.timeout,
                });
            }
            Ok(Err(err)) => {
                warn!(error = ?err, "Camera access error");
                return Err(err.into());
            }
            Ok(Ok(stream)) => stream,
        };

        if !stream.has_live_video() {
            warn!(stream = stream.id(), "Granted stream has no live video track");
            stream.stop_all_tracks();
            return Err(CaptureError::StreamNotActive);
        }

        info!(
            stream = stream.id(),
            settings = ?stream.video_settings(),
            "Camera stream acquired"
        );
        Ok(stream)
    }
}
