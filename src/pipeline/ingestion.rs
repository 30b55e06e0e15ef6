//! Pipeline ingestion - fetch, transform, persist
//!
//! `IngestionOrchestrator` sequences one run over injected collaborators.
//! `PipelineFactory` builds a fresh orchestrator per run so scheduled and
//! on-demand runs never share in-memory state; overlapping runs only meet
//! at the store, where the unique index keeps writes idempotent.

use super::config::Settings;
use super::db::{RecordGateway, SqliteRecordGateway, StoreHandle};
use super::error::PipelineError;
use super::scheduler::IngestionJob;
use super::thingspeak::{FeedSource, ThingSpeakFetcher};
use super::transform::transform_feeds;
use super::types::IngestionOutcome;
use async_trait::async_trait;
use std::sync::Arc;

pub const NO_NEW_DATA: &str = "no new data found on the remote channel";
pub const ALL_FEEDS_INVALID: &str = "all feeds received were invalid";

pub struct IngestionOrchestrator {
    source: Arc<dyn FeedSource>,
    gateway: Arc<dyn RecordGateway>,
}

impl IngestionOrchestrator {
    pub fn new(source: Arc<dyn FeedSource>, gateway: Arc<dyn RecordGateway>) -> Self {
        Self { source, gateway }
    }

    /// One pipeline run
    ///
    /// Once records survive the transform the outcome is `success`, even
    /// when every record was a duplicate and `saved_count` is 0.
    pub async fn run(&self) -> Result<IngestionOutcome, PipelineError> {
        let feeds = self.source.fetch_latest().await;
        if feeds.is_empty() {
            return Ok(IngestionOutcome::failure(NO_NEW_DATA, 0));
        }

        let records = transform_feeds(&feeds);
        if records.is_empty() {
            return Ok(IngestionOutcome::failure(ALL_FEEDS_INVALID, feeds.len()));
        }

        let saved = self.gateway.save(records).await?;

        Ok(IngestionOutcome::success(saved, feeds.len()))
    }
}

/// Builds pipeline collaborators per invocation
pub struct PipelineFactory {
    settings: Arc<Settings>,
    store: StoreHandle,
}

impl PipelineFactory {
    pub fn new(settings: Arc<Settings>, store: StoreHandle) -> Self {
        Self { settings, store }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Fresh gateway over the configured collection
    pub async fn gateway(&self) -> Result<SqliteRecordGateway, PipelineError> {
        self.store.gateway().await
    }

    /// Fresh fetcher + gateway + orchestrator
    pub async fn build(&self) -> Result<IngestionOrchestrator, PipelineError> {
        let remote = self.settings.remote()?;
        let fetcher = ThingSpeakFetcher::new(remote)
            .map_err(|e| PipelineError::Task(format!("failed to build HTTP client: {}", e)))?;
        let gateway = self.gateway().await?;

        Ok(IngestionOrchestrator::new(Arc::new(fetcher), Arc::new(gateway)))
    }
}

#[async_trait]
impl IngestionJob for PipelineFactory {
    /// Scheduled collection: results only go to the log
    async fn run_once(&self) {
        log::info!("🔄 Starting scheduled feed collection");

        let result = match self.build().await {
            Ok(orchestrator) => orchestrator.run().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                log::info!(
                    "✅ Collection finished: status={:?} | {}",
                    outcome.status,
                    outcome.message
                );
            }
            Err(PipelineError::Config(e)) => {
                log::error!("❌ Environment error (scheduled collection): {}. Check your .env", e);
            }
            Err(e) => {
                log::error!("❌ Critical error in scheduled collection: {}", e);
            }
        }

        log::info!("   └─ Scheduled feed collection done");
    }
}
