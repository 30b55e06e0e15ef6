//! Raw feed normalization into validated `Record`s
//!
//! Each entry is handled on its own. An entry with a bad timestamp or a
//! measurement of the wrong JSON type is dropped with a warning; the rest of
//! the batch is unaffected.

use super::types::{parse_feed_timestamp, RawFeedEntry, Record, FIELD_COUNT};
use serde_json::Value;

#[derive(Debug, PartialEq)]
pub enum TransformError {
    NotAnObject(String),
    MissingTimestamp,
    InvalidTimestamp(String),
    InvalidField { field: String, value: String },
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::NotAnObject(v) => write!(f, "entry is not an object: {}", v),
            TransformError::MissingTimestamp => write!(f, "missing created_at"),
            TransformError::InvalidTimestamp(v) => write!(f, "invalid created_at '{}'", v),
            TransformError::InvalidField { field, value } => {
                write!(f, "{} has unsupported value {}", field, value)
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Convert raw entries into records, dropping invalid ones
pub fn transform_feeds(feeds: &[RawFeedEntry]) -> Vec<Record> {
    feeds
        .iter()
        .filter_map(|feed| match parse_feed(feed) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("⚠️  Feed skipped: {} - data: {}", e, feed);
                None
            }
        })
        .collect()
}

/// Convert one raw entry
pub fn parse_feed(feed: &RawFeedEntry) -> Result<Record, TransformError> {
    let feed = feed
        .as_object()
        .ok_or_else(|| TransformError::NotAnObject(feed.to_string()))?;

    let created_at = match feed.get("created_at") {
        Some(Value::String(s)) => {
            parse_feed_timestamp(s).map_err(|_| TransformError::InvalidTimestamp(s.clone()))?
        }
        Some(Value::Null) | None => return Err(TransformError::MissingTimestamp),
        Some(other) => return Err(TransformError::InvalidTimestamp(other.to_string())),
    };

    let mut fields = [None; FIELD_COUNT];
    for (idx, slot) in fields.iter_mut().enumerate() {
        let name = format!("field{}", idx + 1);
        *slot = coerce_measurement(&name, feed.get(&name))?;
    }

    Ok(Record::new(created_at, fields))
}

/// Parse-or-absent for one measurement
///
/// Numbers and numeric strings yield a value; missing, null, blank and
/// non-numeric strings yield `None`. Other JSON types are rejected.
fn coerce_measurement(name: &str, value: Option<&Value>) -> Result<Option<f64>, TransformError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64().filter(|v| v.is_finite())),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => {
                    log::debug!("{} value '{}' is not numeric, treating as absent", name, s);
                    Ok(None)
                }
            }
        }
        Some(other) => Err(TransformError::InvalidField {
            field: name.to_string(),
            value: other.to_string(),
        }),
    }
}
