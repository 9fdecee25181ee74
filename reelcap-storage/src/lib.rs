//! # reelcap-storage
//!
//! Destinations for finished captures: an object store that issues signed
//! upload URLs and a system of record that gets one attachment field per
//! upload. Ships REST clients for Supabase Storage and Airtable, in-memory
//! implementations for tests and demos, and the [`Uploader`] that ties them
//! together.

#![warn(clippy::all)]

pub mod airtable;
pub mod config;
pub mod error;
pub mod memory;
pub mod object_store;
pub mod records;
pub mod supabase;
pub mod uploader;

pub use airtable::AirtableClient;
pub use config::{AirtableConfig, SupabaseConfig, UploaderConfig};
pub use error::StorageError;
pub use memory::{InMemoryObjectStorage, InMemoryRecordStore};
pub use object_store::{ObjectStorage, SignedUpload};
pub use records::RecordStore;
pub use supabase::SupabaseStorage;
pub use uploader::{UploadReceipt, Uploader};
