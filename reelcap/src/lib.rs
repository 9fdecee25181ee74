//! # reelcap - record, review and upload a short video
//!
//! A client-side workflow over five phases: *instructions -> camera preview
//! -> recording -> review -> upload/result*. The camera, the preview surface
//! and the encoder sit behind platform traits; the object store and the
//! system of record are injected collaborators.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reelcap::mock::{MockMediaDevices, MockRecorderFactory, MockSurface};
//! use reelcap::{CaptureWorkflow, InMemoryObjectStorage, InMemoryRecordStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), reelcap::CaptureError> {
//! let mut workflow = CaptureWorkflow::builder("recA1B2C3")
//!     .media_devices(Arc::new(MockMediaDevices::granting()))
//!     .recorder_factory(Arc::new(MockRecorderFactory::new()))
//!     .preview_surface(Arc::new(MockSurface::new()))
//!     .object_storage(Arc::new(InMemoryObjectStorage::new()))
//!     .record_store(Arc::new(InMemoryRecordStore::new()))
//!     .build()?;
//!
//! workflow.start_camera().await?;
//! workflow.start_recording().await?;
//! while let Some(event) = workflow.next_event().await {
//!     if workflow.session().elapsed_seconds() >= 5 || event.error().is_some() {
//!         break;
//!     }
//! }
//! workflow.stop_recording().await?;
//! let receipt = workflow.accept().await?;
//! println!("attached {}", receipt.public_url);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

// Re-export core types for easy access
pub use reelcap_core::{
    Capture, CaptureConfig, CaptureError, CaptureResult, CaptureSession, ErrorCategory,
    Lifecycle, Phase, QualityPreset, RecordId, UploadProgress, VideoResolution, INSTRUCTIONS,
};

pub use reelcap_media::{
    mock, DeviceAcquisition, DeviceError, FrameClock, IntervalFrameClock, MediaConstraints,
    MediaDevices, MediaRecorderBackend, MediaRecorderFactory, MediaStream, MediaTrack,
    PreviewBinder, PreviewBinding, PreviewEvent, PreviewSurface, Recorder, RecorderHandle,
    RecorderOptions, RecorderState, RecordingTimer, ReviewGate, SurfaceEvent, SurfaceReadyState,
    TimerEvent, TrackKind, TrackReadyState, TrackSettings,
};

pub use reelcap_storage::{
    AirtableClient, AirtableConfig, InMemoryObjectStorage, InMemoryRecordStore, ObjectStorage,
    RecordStore, SignedUpload, StorageError, SupabaseConfig, SupabaseStorage, UploadReceipt,
    Uploader, UploaderConfig,
};

pub use reelcap_diagnostics::{DebugLogger, SessionReport, SessionTrace};

// Public API modules
pub mod config;
pub mod event;
pub mod workflow;

// Re-export main API types
pub use config::WorkflowConfig;
pub use event::{EventStream, WorkflowEvent};
pub use workflow::{CaptureWorkflow, CaptureWorkflowBuilder};
