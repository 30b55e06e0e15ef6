//! ThingSpeak channel feed retrieval
//!
//! ## API Reference
//!
//! Endpoint: https://api.thingspeak.com/channels/{channel_id}/feeds.json?api_key={key}&results={n}
//! Returns: `{ "channel": {...}, "feeds": [ { "created_at": "...", "field1": "...", ... } ] }`
//!
//! Failures never reach the caller: network errors, timeouts, non-2xx
//! statuses and undecodable bodies are logged and reported as "no data".

use super::config::RemoteConfig;
use super::types::RawFeedEntry;
use async_trait::async_trait;
use serde::Deserialize;

/// Source of raw feed entries
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Most recent raw entries, or an empty vector when nothing could be fetched
    async fn fetch_latest(&self) -> Vec<RawFeedEntry>;
}

/// Channel feed response body (only `feeds` is used)
#[derive(Debug, Deserialize)]
struct FeedsResponse {
    #[serde(default)]
    feeds: Vec<RawFeedEntry>,
}

pub struct ThingSpeakFetcher {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl ThingSpeakFetcher {
    /// Build a fetcher with the configured request timeout
    pub fn new(config: RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    async fn request_feeds(&self) -> Result<Vec<RawFeedEntry>, Box<dyn std::error::Error + Send + Sync>> {
        let results = self.config.results.to_string();
        let response = self
            .client
            .get(self.config.feeds_url())
            .query(&[
                ("api_key", self.config.read_api_key.as_str()),
                ("results", results.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("ThingSpeak API error: {}", response.status()).into());
        }

        let body: FeedsResponse = response.json().await?;
        Ok(body.feeds)
    }
}

#[async_trait]
impl FeedSource for ThingSpeakFetcher {
    async fn fetch_latest(&self) -> Vec<RawFeedEntry> {
        match self.request_feeds().await {
            Ok(feeds) => {
                log::debug!(
                    "📡 Fetched {} feeds from channel {}",
                    feeds.len(),
                    self.config.channel_id
                );
                feeds
            }
            Err(e) => {
                log::error!(
                    "❌ Failed to fetch feeds from channel {}: {}",
                    self.config.channel_id,
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn feeds_handler(
        Path(channel): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if params.get("api_key").map(String::as_str) != Some("READKEY") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        match channel.as_str() {
            "ok" => {
                let results: usize = params
                    .get("results")
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(0);
                let feeds: Vec<Value> = (0..results)
                    .map(|i| json!({ "created_at": format!("2024-01-01T00:00:0{}Z", i), "field1": "1.5" }))
                    .collect();
                Ok(Json(json!({ "channel": { "id": 1 }, "feeds": feeds })))
            }
            "nofeeds" => Ok(Json(json!({ "channel": { "id": 1 } }))),
            "mixed" => Ok(Json(json!({
                "feeds": [
                    { "created_at": "2024-01-01T00:00:00Z", "field1": "1" },
                    "garbage",
                    null,
                    { "created_at": "2024-01-01T00:00:01Z", "field1": "2" }
                ]
            }))),
            "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Json(json!({ "feeds": [] })))
            }
            _ => Ok(Json(json!(-1))),
        }
    }

    /// Serve a mock channel API on an ephemeral port
    async fn spawn_mock_channel() -> String {
        let app = Router::new().route("/channels/:channel/feeds.json", get(feeds_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn remote(base_url: &str, channel: &str, key: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            channel_id: channel.to_string(),
            read_api_key: key.to_string(),
            results: 3,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_fetch_latest_returns_feeds() {
        let base = spawn_mock_channel().await;
        let fetcher = ThingSpeakFetcher::new(remote(&base, "ok", "READKEY")).unwrap();

        let feeds = fetcher.fetch_latest().await;

        assert_eq!(feeds.len(), 3);
        assert_eq!(feeds[0]["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(feeds[2]["field1"], "1.5");
    }

    #[tokio::test]
    async fn test_missing_feeds_key_is_empty() {
        let base = spawn_mock_channel().await;
        let fetcher = ThingSpeakFetcher::new(remote(&base, "nofeeds", "READKEY")).unwrap();

        assert!(fetcher.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_entries_do_not_discard_batch() {
        let base = spawn_mock_channel().await;
        let fetcher = ThingSpeakFetcher::new(remote(&base, "mixed", "READKEY")).unwrap();

        let feeds = fetcher.fetch_latest().await;
        assert_eq!(feeds.len(), 4);

        let records = crate::pipeline::transform::transform_feeds(&feeds);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_degrades_to_empty() {
        let base = spawn_mock_channel().await;

        let broken = ThingSpeakFetcher::new(remote(&base, "broken", "READKEY")).unwrap();
        assert!(broken.fetch_latest().await.is_empty());

        let bad_key = ThingSpeakFetcher::new(remote(&base, "ok", "WRONG")).unwrap();
        assert!(bad_key.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body_degrades_to_empty() {
        let base = spawn_mock_channel().await;
        let fetcher = ThingSpeakFetcher::new(remote(&base, "unknown", "READKEY")).unwrap();

        assert!(fetcher.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let base = spawn_mock_channel().await;
        let fetcher = ThingSpeakFetcher::new(remote(&base, "slow", "READKEY")).unwrap();

        let started = std::time::Instant::now();
        assert!(fetcher.fetch_latest().await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_unreachable_host_degrades_to_empty() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher =
            ThingSpeakFetcher::new(remote(&format!("http://{}", addr), "ok", "READKEY")).unwrap();
        assert!(fetcher.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    #[ignore] // Run only when testing with live API
    async fn test_fetch_public_channel() {
        // ThingSpeak public demo channel
        let config = RemoteConfig {
            base_url: "https://api.thingspeak.com".to_string(),
            channel_id: "9".to_string(),
            read_api_key: String::new(),
            results: 10,
            timeout: Duration::from_secs(10),
        };
        let fetcher = ThingSpeakFetcher::new(config).unwrap();

        let feeds = fetcher.fetch_latest().await;
        assert!(!feeds.is_empty());
    }
}
