//! Record and Upload Demo
//!
//! Walks one capture session through every phase using the virtual camera,
//! preview surface and encoder. Uploads go to in-memory storage unless
//! `SUPABASE_URL` and `AIRTABLE_API_KEY` (plus their companions) are set.
//!
//! ```text
//! cargo run --example record_and_upload -- recXXXXXXXXXXXXXX 5
//! ```

use anyhow::Context;
use reelcap::mock::{MockMediaDevices, MockRecorderFactory, MockSurface};
use reelcap::{
    AirtableConfig, CaptureWorkflow, CaptureWorkflowBuilder, DebugLogger, InMemoryObjectStorage,
    InMemoryRecordStore, QualityPreset, SupabaseConfig, WorkflowEvent,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    DebugLogger::init_logging()?;

    let mut args = std::env::args().skip(1);
    let record_id = args.next().unwrap_or_else(|| "recDemo0000000001".to_string());
    let seconds: u32 = match args.next() {
        Some(raw) => raw.parse().context("duration must be whole seconds")?,
        None => 5,
    };

    println!("🎬 reelcap record & upload demo");
    println!("===============================");
    for (i, tip) in CaptureWorkflow::instructions().iter().enumerate() {
        println!("  {}. {}", i + 1, tip);
    }

    let mut workflow = with_destinations(
        CaptureWorkflow::builder(record_id)
            .quality(QualityPreset::Standard)
            .media_devices(Arc::new(MockMediaDevices::granting()))
            .recorder_factory(Arc::new(MockRecorderFactory::new()))
            .preview_surface(Arc::new(MockSurface::new())),
    )?
    .build()?;

    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                WorkflowEvent::PhaseChanged { from, to } => println!("➡️  {from} -> {to}"),
                WorkflowEvent::UploadProgress { percent } => println!("⬆️  {percent}%"),
                WorkflowEvent::Error { message, .. } => println!("❌ {message}"),
                _ => {}
            }
        }
    });

    workflow.start_camera().await?;
    println!("📹 Camera live at {}", workflow.quality());

    workflow.start_recording().await?;
    while let Some(event) = workflow.next_event().await {
        match event {
            WorkflowEvent::TimerTick {
                display, warning, ..
            } => println!("🔴 {display}{}", if warning { " ⚠️" } else { "" }),
            WorkflowEvent::DurationCapReached { .. } => break,
            other if other.error().is_some() => println!("⚠️  {:?}", other.error()),
            _ => {}
        }
        if workflow.session().elapsed_seconds() >= seconds {
            break;
        }
    }
    if workflow.is_recording() {
        workflow.stop_recording().await?;
    }

    if let Some(capture) = workflow.capture() {
        println!(
            "🎞️  Captured {} bytes in {} slices ({})",
            capture.len(),
            capture.slice_count(),
            capture.mime_type()
        );
    }

    let receipt = workflow.accept().await?;
    println!("✅ Attached {} to the record", receipt.public_url);

    let report = workflow.report();
    println!("{}", report.to_json()?);

    workflow.teardown();
    Ok(())
}

fn with_destinations(builder: CaptureWorkflowBuilder) -> anyhow::Result<CaptureWorkflowBuilder> {
    match (SupabaseConfig::from_env(), AirtableConfig::from_env()) {
        (Ok(supabase), Ok(airtable)) => {
            println!("☁️  Uploading to bucket '{}'", supabase.bucket);
            Ok(builder.supabase(supabase)?.airtable(airtable)?)
        }
        _ => {
            println!("💾 Using in-memory storage (set SUPABASE_* and AIRTABLE_* to upload)");
            Ok(builder
                .object_storage(Arc::new(InMemoryObjectStorage::new()))
                .record_store(Arc::new(InMemoryRecordStore::new())))
        }
    }
}
