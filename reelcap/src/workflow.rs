//! The five-phase capture workflow
//!
//! `instructions -> camera-preview -> recording -> review -> uploading ->
//! succeeded | upload-failed`. The workflow owns every resource of a
//! session (preview binding, active recording, timer, review gate, pending
//! upload) and releases them on phase exit or [`CaptureWorkflow::teardown`].

use reelcap_core::{
    Capture, CaptureError, CaptureResult, CaptureSession, Lifecycle, Phase, QualityPreset,
    RecordId, UploadProgress, INSTRUCTIONS,
};
use reelcap_diagnostics::{SessionReport, SessionTrace, UploadAttempt};
use reelcap_media::{
    DeviceAcquisition, FrameClock, MediaDevices, MediaRecorderFactory, MediaStream,
    PreviewBinder, PreviewBinding, PreviewEvent, PreviewSurface, Recorder, RecorderHandle,
    RecordingTimer, ReviewGate, TimerEvent, TimerHandle,
};
use reelcap_storage::{
    AirtableClient, AirtableConfig, ObjectStorage, RecordStore, StorageError, SupabaseConfig,
    SupabaseStorage, UploadReceipt, Uploader,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::event::{EventStream, WorkflowEvent};

fn torn_down() -> CaptureError {
    CaptureError::InvalidState {
        expected: "mounted workflow".to_string(),
        actual: "torn down".to_string(),
    }
}

fn storage_setup_error(err: StorageError) -> CaptureError {
    match err {
        StorageError::MissingConfiguration { field } => CaptureError::MissingConfiguration { field },
        StorageError::InvalidUrl { url, reason } => {
            CaptureError::invalid_config("storage URL", format_args!("{url}: {reason}"))
        }
        other => CaptureError::invalid_config("storage client", other),
    }
}

fn missing(field: &str) -> CaptureError {
    CaptureError::MissingConfiguration {
        field: field.to_string(),
    }
}

/// Fluent builder wiring a workflow to its collaborators
pub struct CaptureWorkflowBuilder {
    record_id: String,
    config: WorkflowConfig,
    quality: Option<QualityPreset>,
    devices: Option<Arc<dyn MediaDevices>>,
    recorder_factory: Option<Arc<dyn MediaRecorderFactory>>,
    surface: Option<Arc<dyn PreviewSurface>>,
    frame_clock: Option<Arc<dyn FrameClock>>,
    storage: Option<Arc<dyn ObjectStorage>>,
    records: Option<Arc<dyn RecordStore>>,
}

impl CaptureWorkflowBuilder {
    fn new(record_id: String) -> Self {
        Self {
            record_id,
            config: WorkflowConfig::default(),
            quality: None,
            devices: None,
            recorder_factory: None,
            surface: None,
            frame_clock: None,
            storage: None,
            records: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial quality preset (defaults to the configured one)
    pub fn quality(mut self, quality: QualityPreset) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Platform camera API (required)
    pub fn media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Platform encoder (required)
    pub fn recorder_factory(mut self, factory: Arc<dyn MediaRecorderFactory>) -> Self {
        self.recorder_factory = Some(factory);
        self
    }

    /// Surface the live preview renders into (required)
    pub fn preview_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Frame scheduler for the playback monitor
    pub fn frame_clock(mut self, clock: Arc<dyn FrameClock>) -> Self {
        self.frame_clock = Some(clock);
        self
    }

    /// Object store receiving uploads (required)
    pub fn object_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// System of record receiving the public URL (required)
    pub fn record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Upload into a Supabase Storage bucket
    pub fn supabase(self, config: SupabaseConfig) -> CaptureResult<Self> {
        let storage = SupabaseStorage::new(config).map_err(storage_setup_error)?;
        Ok(self.object_storage(Arc::new(storage)))
    }

    /// Attach uploads to an Airtable record; also selects the attachment field
    pub fn airtable(mut self, config: AirtableConfig) -> CaptureResult<Self> {
        self.config.uploader.video_field = config.video_field.clone();
        let client = AirtableClient::new(config).map_err(storage_setup_error)?;
        Ok(self.record_store(Arc::new(client)))
    }

    /// Validate and assemble the workflow in the `instructions` phase
    pub fn build(self) -> CaptureResult<CaptureWorkflow> {
        let record_id = RecordId::new(self.record_id)?;
        self.config.validate()?;

        let devices = self.devices.ok_or_else(|| missing("media_devices"))?;
        let factory = self
            .recorder_factory
            .ok_or_else(|| missing("recorder_factory"))?;
        let surface = self.surface.ok_or_else(|| missing("preview_surface"))?;
        let storage = self.storage.ok_or_else(|| missing("object_storage"))?;
        let records = self.records.ok_or_else(|| missing("record_store"))?;

        let config = self.config;
        let capture_config = &config.capture;
        let acquisition = DeviceAcquisition::new(devices, capture_config);
        let recorder = Recorder::new(acquisition.clone(), factory, capture_config);
        let mut binder = PreviewBinder::new(capture_config);
        if let Some(clock) = self.frame_clock {
            binder = binder.with_clock(clock);
        }
        let timer = RecordingTimer::new(capture_config);
        let uploader = Uploader::new(storage, records, config.uploader.clone());

        let quality = self.quality.unwrap_or(config.default_quality);
        let session = CaptureSession::new(record_id, quality);
        let trace = SessionTrace::new(&session);
        let (events, _) = broadcast::channel(config.event_capacity());

        info!(
            session = %session.id(),
            record_id = %session.record_id(),
            quality = %quality,
            "Capture workflow mounted"
        );

        Ok(CaptureWorkflow {
            session,
            config,
            acquisition,
            binder,
            recorder,
            timer,
            uploader,
            surface,
            lifecycle: Lifecycle::new(),
            preview: None,
            preview_events: None,
            recording: None,
            timer_handle: None,
            review: None,
            pending_upload: None,
            progress: UploadProgress::new(),
            progress_forwarder: None,
            events,
            trace,
        })
    }
}

enum Source {
    Timer(TimerEvent),
    Preview(Result<PreviewEvent, broadcast::error::RecvError>),
}

async fn next_timer_event(timer: &mut Option<TimerHandle>) -> Option<TimerEvent> {
    match timer {
        Some(handle) => handle.recv().await,
        None => None,
    }
}

async fn next_preview_event(
    events: &mut Option<broadcast::Receiver<PreviewEvent>>,
) -> Option<Result<PreviewEvent, broadcast::error::RecvError>> {
    match events {
        Some(rx) => Some(rx.recv().await),
        None => None,
    }
}

/// One capture session from instructions to upload result
pub struct CaptureWorkflow {
    session: CaptureSession,
    config: WorkflowConfig,
    acquisition: DeviceAcquisition,
    binder: PreviewBinder,
    recorder: Recorder,
    timer: RecordingTimer,
    uploader: Uploader,
    surface: Arc<dyn PreviewSurface>,
    lifecycle: Lifecycle,
    preview: Option<PreviewBinding>,
    preview_events: Option<broadcast::Receiver<PreviewEvent>>,
    recording: Option<RecorderHandle>,
    timer_handle: Option<TimerHandle>,
    review: Option<ReviewGate>,
    pending_upload: Option<Capture>,
    progress: UploadProgress,
    progress_forwarder: Option<JoinHandle<()>>,
    events: broadcast::Sender<WorkflowEvent>,
    trace: SessionTrace,
}

impl CaptureWorkflow {
    /// Start configuring a workflow for `record_id`
    pub fn builder(record_id: impl Into<String>) -> CaptureWorkflowBuilder {
        CaptureWorkflowBuilder::new(record_id.into())
    }

    /// Best-practice tips shown in the instructions phase
    pub fn instructions() -> &'static [&'static str] {
        &INSTRUCTIONS
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn phase(&self) -> &Phase {
        self.session.phase()
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Message currently shown to the user, if any
    pub fn error_message(&self) -> Option<&str> {
        self.session.error_message()
    }

    pub fn quality(&self) -> QualityPreset {
        self.session.quality()
    }

    /// Elapsed recording time as `m:ss`
    pub fn elapsed_display(&self) -> String {
        RecordingTimer::format(self.session.elapsed_seconds())
    }

    /// Whether the elapsed time should be shown in the warning style
    pub fn is_duration_warning(&self) -> bool {
        self.timer.is_warning(self.session.elapsed_seconds())
    }

    /// The stream currently rendered by the preview
    pub fn preview_stream(&self) -> Option<&MediaStream> {
        self.preview.as_ref().map(PreviewBinding::stream)
    }

    /// Whether a recording is running
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// The capture under review or awaiting an upload retry
    pub fn capture(&self) -> Option<&Capture> {
        self.review
            .as_ref()
            .map(ReviewGate::capture)
            .or(self.pending_upload.as_ref())
    }

    /// Subscribe to workflow events
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Watch the upload percentage
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn upload_percent(&self) -> u8 {
        self.progress.current()
    }

    /// Handle for background work that must stop at teardown
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    /// Snapshot of what happened in this session so far
    pub fn report(&self) -> SessionReport {
        self.trace.report()
    }

    /// Request camera access and show the live preview
    pub async fn start_camera(&mut self) -> CaptureResult<()> {
        let result = self.open_camera().await;
        self.settle(result)
    }

    /// Change the quality preset; re-acquires the camera when it is live
    pub async fn set_quality(&mut self, quality: QualityPreset) -> CaptureResult<()> {
        let result = self.change_quality(quality).await;
        self.settle(result)
    }

    /// Start recording from the live preview
    pub async fn start_recording(&mut self) -> CaptureResult<()> {
        let result = self.begin_recording().await;
        self.settle(result)
    }

    /// Stop recording and move the capture into review
    pub async fn stop_recording(&mut self) -> CaptureResult<()> {
        let result = self.finish_recording().await;
        self.settle(result)
    }

    /// Accept the capture under review and upload it
    pub async fn accept(&mut self) -> CaptureResult<UploadReceipt> {
        let result = self.accept_capture().await;
        self.settle(result)
    }

    /// Upload the held capture again after a failed attempt
    pub async fn retry_upload(&mut self) -> CaptureResult<UploadReceipt> {
        let result = self.upload_again().await;
        self.settle(result)
    }

    /// Discard the capture and go back to a fresh camera preview
    pub async fn record_again(&mut self) -> CaptureResult<()> {
        let result = self.discard_and_reacquire().await;
        self.settle(result)
    }

    /// Save the capture as a local file without uploading; the phase is unchanged
    pub async fn export_capture(&mut self, dir: &Path) -> CaptureResult<PathBuf> {
        let result = self.write_capture(dir).await;
        self.settle(result)
    }

    /// Abandon the current attempt and show the instructions again
    pub fn return_to_instructions(&mut self) -> CaptureResult<()> {
        let result = self.reset_to_instructions();
        self.settle(result)
    }

    /// Wait for the next timer or preview event and apply it
    ///
    /// Elapsed seconds are recorded on each tick and reaching the duration
    /// cap stops the recording before the cap event is returned. Returns
    /// `None` when no timer or preview is active, or after teardown.
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        loop {
            if !self.lifecycle.is_mounted() {
                return None;
            }

            let source = tokio::select! {
                Some(event) = next_timer_event(&mut self.timer_handle) => Source::Timer(event),
                Some(event) = next_preview_event(&mut self.preview_events) => Source::Preview(event),
                else => return None,
            };

            let event = match source {
                Source::Timer(event) => self.apply_timer_event(event).await,
                Source::Preview(Ok(event)) => self.apply_preview_event(event),
                Source::Preview(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!(skipped, "Preview events lagged");
                    continue;
                }
                Source::Preview(Err(broadcast::error::RecvError::Closed)) => {
                    self.preview_events = None;
                    continue;
                }
            };

            self.emit(event.clone());
            return Some(event);
        }
    }

    /// Stop every track, cancel every task and drop the capture
    ///
    /// Idempotent. Results of work still in flight are discarded.
    pub fn teardown(&mut self) {
        if !self.lifecycle.unmount() {
            return;
        }

        if let Some(mut timer) = self.timer_handle.take() {
            timer.cancel();
        }
        if let Some(handle) = self.recording.take() {
            handle.abort();
        }
        self.release_preview();
        if let Some(gate) = self.review.take() {
            gate.discard();
        }
        self.pending_upload = None;
        if let Some(forwarder) = self.progress_forwarder.take() {
            forwarder.abort();
        }

        info!(session = %self.session.id(), phase = %self.session.phase(), "Capture workflow torn down");
    }

    async fn open_camera(&mut self) -> CaptureResult<()> {
        self.ensure_mounted()?;
        self.session.require(&["instructions", "camera-preview"])?;
        self.acquire_preview().await
    }

    async fn change_quality(&mut self, quality: QualityPreset) -> CaptureResult<()> {
        self.ensure_mounted()?;
        self.session.require(&["instructions", "camera-preview"])?;
        if quality == self.session.quality() {
            return Ok(());
        }

        self.session.set_quality(quality);
        info!(quality = %quality, "Quality preset changed");

        if *self.session.phase() == Phase::CameraPreview {
            self.acquire_preview().await?;
        }
        Ok(())
    }

    async fn begin_recording(&mut self) -> CaptureResult<()> {
        self.ensure_mounted()?;
        let stream = match &self.preview {
            Some(binding) if binding.stream().is_active() => binding.stream().clone(),
            _ => return Err(CaptureError::NoActiveStream),
        };
        self.session.require(&["camera-preview"])?;

        let handle = self.recorder.start(&stream, self.session.quality()).await?;
        if !self.lifecycle.is_mounted() {
            handle.abort();
            return Err(torn_down());
        }

        if let Some(binding) = self.preview.as_mut() {
            binding.start_monitoring();
        }
        self.recording = Some(handle);
        self.timer_handle = Some(self.timer.start(self.lifecycle.clone()));
        self.session.clear_error();
        self.enter(Phase::Recording)
    }

    async fn finish_recording(&mut self) -> CaptureResult<()> {
        self.ensure_mounted()?;
        self.session.require(&["recording"])?;

        if let Some(mut timer) = self.timer_handle.take() {
            timer.cancel();
        }
        let handle = self
            .recording
            .take()
            .ok_or_else(|| CaptureError::RecorderUnavailable {
                reason: "no active recording".to_string(),
            })?;
        let capture = self.recorder.stop(handle).await;

        // The preview is rebuilt by a fresh acquisition if the user records again
        if let Some(binding) = self.preview.as_mut() {
            binding.stop_monitoring();
        }
        self.release_preview();

        self.trace.record_capture(capture.len());
        self.review = Some(ReviewGate::new(capture));
        self.enter(Phase::Review)
    }

    async fn accept_capture(&mut self) -> CaptureResult<UploadReceipt> {
        self.ensure_mounted()?;
        self.session.require(&["review"])?;

        let gate = self.review.take().ok_or_else(|| {
            CaptureError::invalid_state("a capture under review", self.session.phase())
        })?;
        self.pending_upload = Some(gate.accept());
        self.run_upload().await
    }

    async fn upload_again(&mut self) -> CaptureResult<UploadReceipt> {
        self.ensure_mounted()?;
        self.session.require(&["upload-failed"])?;
        self.run_upload().await
    }

    async fn run_upload(&mut self) -> CaptureResult<UploadReceipt> {
        let capture = self.pending_upload.clone().ok_or_else(|| {
            CaptureError::invalid_state("a capture awaiting upload", self.session.phase())
        })?;

        self.session.clear_error();
        self.enter(Phase::Uploading)?;
        self.ensure_progress_forwarder();

        let started = Instant::now();
        let result = self
            .uploader
            .upload(&capture, self.session.record_id(), &self.progress)
            .await;

        if !self.lifecycle.is_mounted() {
            debug!("Upload settled after teardown; result discarded");
            return Err(torn_down());
        }

        match result {
            Ok(receipt) => {
                self.trace.record_upload(UploadAttempt {
                    bytes: receipt.bytes,
                    elapsed: receipt.elapsed,
                    succeeded: true,
                    error: None,
                });
                self.pending_upload = None;
                self.enter(Phase::Succeeded {
                    public_url: receipt.public_url.clone(),
                })?;
                Ok(receipt)
            }
            Err(error) => {
                self.trace.record_upload(UploadAttempt {
                    bytes: capture.len(),
                    elapsed: started.elapsed(),
                    succeeded: false,
                    error: Some(error.to_string()),
                });
                self.enter(Phase::UploadFailed {
                    error: error.clone(),
                })?;
                Err(error)
            }
        }
    }

    async fn discard_and_reacquire(&mut self) -> CaptureResult<()> {
        self.ensure_mounted()?;
        self.session.require(&["review", "upload-failed"])?;

        self.drop_capture();
        self.session.clear_error();
        self.enter(Phase::CameraPreview)?;
        self.acquire_preview().await
    }

    async fn write_capture(&mut self, dir: &Path) -> CaptureResult<PathBuf> {
        self.ensure_mounted()?;
        self.session.require(&["review", "upload-failed"])?;

        match (&self.review, &self.pending_upload) {
            (Some(gate), _) => gate.export_to(dir).await,
            (None, Some(capture)) => ReviewGate::new(capture.clone()).export_to(dir).await,
            (None, None) => Err(CaptureError::invalid_state(
                "a capture to export",
                self.session.phase(),
            )),
        }
    }

    fn reset_to_instructions(&mut self) -> CaptureResult<()> {
        self.ensure_mounted()?;
        self.session
            .require(&["camera-preview", "review", "upload-failed"])?;

        self.release_preview();
        self.drop_capture();
        self.session.clear_error();
        self.enter(Phase::Instructions)
    }

    /// Replace the preview stream with a fresh acquisition at the current preset
    async fn acquire_preview(&mut self) -> CaptureResult<()> {
        self.release_preview();

        match self.acquisition.acquire(self.session.quality()).await {
            Ok(stream) => {
                if !self.lifecycle.is_mounted() {
                    stream.stop_all_tracks();
                    return Err(torn_down());
                }

                let mut binding = self
                    .binder
                    .bind(self.surface.clone(), stream, self.lifecycle.clone())
                    .await;
                self.preview_events = Some(binding.subscribe());
                self.preview = Some(binding);
                self.session.clear_error();

                if *self.session.phase() != Phase::CameraPreview {
                    self.enter(Phase::CameraPreview)?;
                }
                Ok(())
            }
            Err(error) => {
                // Without a stream the preview has nothing to show
                if *self.session.phase() == Phase::CameraPreview {
                    self.enter(Phase::Instructions)?;
                }
                Err(error)
            }
        }
    }

    fn release_preview(&mut self) {
        self.preview_events = None;
        if let Some(binding) = self.preview.take() {
            binding.stream().stop_all_tracks();
            binding.release();
        }
    }

    fn drop_capture(&mut self) {
        if let Some(gate) = self.review.take() {
            gate.discard();
        }
        if let Some(capture) = self.pending_upload.take() {
            debug!(size = capture.len(), "Pending upload discarded");
        }
        self.progress.reset();
    }

    async fn apply_timer_event(&mut self, event: TimerEvent) -> WorkflowEvent {
        match event {
            TimerEvent::Tick { elapsed } => {
                self.session.set_elapsed_seconds(elapsed);
                WorkflowEvent::TimerTick {
                    elapsed_seconds: elapsed,
                    display: RecordingTimer::format(elapsed),
                    warning: self.timer.is_warning(elapsed),
                }
            }
            TimerEvent::Warning { elapsed, remaining } => WorkflowEvent::DurationWarning {
                elapsed_seconds: elapsed,
                remaining_seconds: remaining,
            },
            TimerEvent::CapReached { elapsed } => {
                info!(elapsed, "Stopping recording at the duration cap");
                // A failure here has already been surfaced through settle
                let _ = self.stop_recording().await;
                WorkflowEvent::DurationCapReached {
                    elapsed_seconds: elapsed,
                }
            }
        }
    }

    fn apply_preview_event(&mut self, event: PreviewEvent) -> WorkflowEvent {
        match event {
            PreviewEvent::Bound { stream_id } => WorkflowEvent::PreviewBound { stream_id },
            PreviewEvent::PlaybackResumed => WorkflowEvent::PlaybackResumed,
            PreviewEvent::PauseSuppressed => WorkflowEvent::PauseSuppressed,
            PreviewEvent::Fault(error) => {
                self.session.report_error(&error);
                self.trace.record_error(error.to_string());
                WorkflowEvent::PreviewFault { error }
            }
        }
    }

    fn ensure_progress_forwarder(&mut self) {
        if self
            .progress_forwarder
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }

        let mut rx = self.progress.subscribe();
        let events = self.events.clone();
        let lifecycle = self.lifecycle.clone();
        self.progress_forwarder = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let percent = *rx.borrow_and_update();
                if !lifecycle.is_mounted() {
                    break;
                }
                let _ = events.send(WorkflowEvent::UploadProgress { percent });
            }
        }));
    }

    fn enter(&mut self, next: Phase) -> CaptureResult<()> {
        let from = self.session.transition(next)?;
        let to = self.session.phase().clone();
        self.trace.record_phase(&to);
        info!(
            session = %self.session.id(),
            from = from.name(),
            to = to.name(),
            "Workflow phase changed"
        );
        self.emit(WorkflowEvent::PhaseChanged { from, to });
        Ok(())
    }

    fn emit(&self, event: WorkflowEvent) {
        if self.lifecycle.is_mounted() {
            let _ = self.events.send(event);
        }
    }

    fn ensure_mounted(&self) -> CaptureResult<()> {
        if self.lifecycle.is_mounted() {
            Ok(())
        } else {
            Err(torn_down())
        }
    }

    /// Surface a failed operation as the single message shown in place
    fn settle<T>(&mut self, result: CaptureResult<T>) -> CaptureResult<T> {
        if let Err(error) = &result {
            if self.lifecycle.is_mounted() {
                warn!(
                    category = ?error.category(),
                    phase = %self.session.phase(),
                    error = %error,
                    "Workflow operation failed"
                );
                self.session.report_error(error);
                self.trace.record_error(error.to_string());
                self.emit(WorkflowEvent::Error {
                    error: error.clone(),
                    message: error.user_message().to_string(),
                });
            }
        }
        result
    }
}

impl fmt::Debug for CaptureWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureWorkflow")
            .field("session", &self.session)
            .field("preview", &self.preview_stream())
            .field("recording", &self.recording.is_some())
            .field("mounted", &self.lifecycle.is_mounted())
            .finish()
    }
}

impl Drop for CaptureWorkflow {
    fn drop(&mut self) {
        self.teardown();
    }
}
