//! Core data types for the ingestion pipeline
//!
//! - `RawFeedEntry` - untyped payload as returned by the remote channel
//! - `Record` - validated telemetry sample (timestamp + measurements)
//! - `IngestionOutcome` - summary of one pipeline run

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Timestamp format used by the remote channel and by the store
pub const FEED_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Number of measurement fields a channel can carry (field1..field8)
pub const FIELD_COUNT: usize = 8;

/// One untyped feed entry, exactly as decoded from the remote JSON body
///
/// Normally an object; anything else is rejected by the transformer.
pub type RawFeedEntry = serde_json::Value;

/// Parse a timestamp in the channel's fixed `YYYY-MM-DDTHH:MM:SSZ` format
pub fn parse_feed_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, FEED_TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Render a timestamp in the channel's fixed format
pub fn format_feed_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(FEED_TIMESTAMP_FORMAT).to_string()
}

/// Validated telemetry record
///
/// Immutable once constructed. `created_at` is the deduplication key;
/// `id` is only present on records read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<String>,
    created_at: DateTime<Utc>,
    fields: [Option<f64>; FIELD_COUNT],
}

impl Record {
    pub fn new(created_at: DateTime<Utc>, fields: [Option<f64>; FIELD_COUNT]) -> Self {
        Self {
            id: None,
            created_at,
            fields,
        }
    }

    /// Record as loaded from the store, carrying its assigned id
    pub fn persisted(id: String, created_at: DateTime<Utc>, fields: [Option<f64>; FIELD_COUNT]) -> Self {
        Self {
            id: Some(id),
            created_at,
            fields,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Measurement `fieldN` (1-based, matching the channel's naming)
    pub fn field(&self, n: usize) -> Option<f64> {
        if n == 0 || n > FIELD_COUNT {
            return None;
        }
        self.fields[n - 1]
    }

    pub fn fields(&self) -> &[Option<f64>; FIELD_COUNT] {
        &self.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("created_at", &format_feed_timestamp(&self.created_at))?;
        for (idx, value) in self.fields.iter().enumerate() {
            if let Some(value) = value {
                map.serialize_entry(&format!("field{}", idx + 1), value)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Result of one `IngestionOrchestrator::run` call (never persisted)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub saved_count: usize,
    pub received_count: usize,
}

impl IngestionOutcome {
    pub fn success(saved_count: usize, received_count: usize) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: format!("{} records saved", saved_count),
            saved_count,
            received_count,
        }
    }

    pub fn failure(message: impl Into<String>, received_count: usize) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: message.into(),
            saved_count: 0,
            received_count,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
