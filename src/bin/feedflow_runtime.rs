//! Feedflow Runtime
//!
//! - Loads settings from the environment (`.env` supported)
//! - Starts the ingestion scheduler (one run every FETCH_INTERVAL_SECS)
//! - Serves the HTTP API until CTRL+C
//! - Stops the scheduler and closes the store on shutdown
//!
//! Usage:
//!   cargo run --release --bin feedflow_runtime
//!
//! Environment variables:
//!   THINGSPEAK_CHANNEL_ID, THINGSPEAK_READ_API_KEY - remote channel (required)
//!   STORE_URI, STORE_DB_NAME, STORE_COLLECTION_NAME - record store (required)
//!   FETCH_INTERVAL_SECS - Scheduler period (default: 300)
//!   HOST / PORT - API bind address (default: 0.0.0.0:8000)

use dotenv::dotenv;
use feedflow::api::{self, AppState};
use feedflow::pipeline::{IngestionScheduler, PipelineFactory, Settings, StoreHandle};
use log::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Feedflow Runtime");

    let settings = Arc::new(Settings::from_env());

    info!("📊 Configuration:");
    info!("   ├─ Remote: {}", settings.base_url);
    info!(
        "   ├─ Channel: {}",
        settings.channel_id.as_deref().unwrap_or("<unset>")
    );
    info!("   ├─ Results per fetch: {}", settings.results);
    info!("   ├─ Fetch interval: {}s", settings.fetch_interval_secs);
    info!("   └─ API: http://{}", settings.bind_addr());

    // Report missing settings early; runs will keep failing until they are set
    if let Err(e) = settings.remote() {
        warn!("⚠️  {}", e);
    }
    if let Err(e) = settings.store() {
        warn!("⚠️  {}", e);
    }

    let store = StoreHandle::new(settings.clone());
    let factory = Arc::new(PipelineFactory::new(settings.clone(), store.clone()));

    // idle -> running
    let mut scheduler = IngestionScheduler::new(factory.clone(), settings.fetch_interval());
    scheduler.start();

    let app = api::router(AppState::new(factory));
    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    info!("✅ Listening on http://{}", listener.local_addr()?);
    info!("🔄 Press CTRL+C to shutdown gracefully");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
            }
        })
        .await;

    // running -> idle; in-flight runs are left to finish on their own
    scheduler.stop();
    store.close();

    if let Err(e) = served {
        error!("❌ HTTP server error: {}", e);
        return Err(e.into());
    }

    info!("✅ Feedflow runtime stopped");
    Ok(())
}
