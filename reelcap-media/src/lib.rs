//! # reelcap media
//!
//! Camera acquisition, live preview binding, chunked recording, the recording
//! timer and the review gate. Platform APIs sit behind the [`MediaDevices`],
//! [`PreviewSurface`] and [`MediaRecorderFactory`] traits; [`mock`] provides
//! in-process implementations.

#![warn(clippy::all)]

pub mod devices;
pub mod mock;
pub mod preview;
pub mod recorder;
pub mod review;
pub mod stream;
pub mod timer;

pub use devices::{DeviceAcquisition, DeviceError, MediaDevices};
pub use preview::{
    FrameClock, IntervalFrameClock, PreviewBinder, PreviewBinding, PreviewEvent, PreviewSurface,
    SurfaceEvent, SurfaceReadyState,
};
pub use recorder::{
    MediaRecorderBackend, MediaRecorderFactory, Recorder, RecorderHandle, RecorderOptions,
    RecorderState,
};
pub use review::ReviewGate;
pub use stream::{
    MediaConstraints, MediaStream, MediaTrack, TrackKind, TrackReadyState, TrackSettings,
};
pub use timer::{RecordingTimer, TimerEvent, TimerHandle};
