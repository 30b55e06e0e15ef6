//! # Telemetry Ingestion Pipeline
//!
//! Polls a ThingSpeak channel, normalizes the returned feeds and stores the
//! new ones:
//!
//! 1. `thingspeak` fetches the most recent raw feeds (soft-fails to empty)
//! 2. `transform` turns each feed into a `Record`, dropping invalid ones
//! 3. `db` inserts records one by one; the store rejects repeated timestamps
//! 4. `ingestion` sequences the three steps and reports an `IngestionOutcome`
//! 5. `scheduler` fires an ingestion run on a fixed period
//!
//! Runs are independent: every run builds its own fetcher, gateway and
//! orchestrator through `PipelineFactory`. The only shared resource is the
//! store connection held by `StoreHandle`.
//!
//! ## Module Organization
//!
//! - `types` - Record, RawFeedEntry, IngestionOutcome
//! - `config` - Settings from environment variables
//! - `error` - PipelineError
//! - `thingspeak` - remote fetcher
//! - `transform` - raw feed to record conversion
//! - `db` - store handle and record gateway
//! - `ingestion` - orchestrator and per-run factory
//! - `scheduler` - periodic trigger

pub mod types;
pub mod config;
pub mod error;
pub mod thingspeak;
pub mod transform;
pub mod db;
pub mod ingestion;
pub mod scheduler;

// Re-export commonly used types
pub use types::{IngestionOutcome, OutcomeStatus, RawFeedEntry, Record};
pub use config::{ConfigError, Settings};
pub use error::PipelineError;
pub use thingspeak::{FeedSource, ThingSpeakFetcher};
pub use db::{RecordGateway, SqliteRecordGateway, StoreHandle};
pub use ingestion::{IngestionOrchestrator, PipelineFactory};
pub use scheduler::{IngestionJob, IngestionScheduler};
