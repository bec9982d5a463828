//! Feed message validation and conversion into trade records
//!
//! The wire payload stays a `serde_json::Value` inside this module only;
//! everything downstream sees [`TradeRecord`].
//!
//! Batch entries are kept as raw JSON until each is parsed on its own, so an
//! entry the parser cannot represent (e.g. a number beyond `f64`) only fails
//! that entry.

use crate::{data::*, error::NormalizationError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{value::RawValue, Value};

/// Envelope of a realtime table message; `data` is left unparsed
#[derive(Debug, Deserialize)]
struct TableMessage<'a> {
    table: Option<String>,
    action: Option<String>,
    #[serde(borrow)]
    data: Option<&'a RawValue>,
}

/// Outcome of normalizing one feed message
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Not a `trade`/`insert` message; nothing to do
    Ignored,
    /// One result per batch entry, in array order
    Trades(Vec<Result<TradeRecord, NormalizationError>>),
}

impl FeedMessage {
    /// Valid records of the batch, skipping malformed entries
    pub fn records(&self) -> impl Iterator<Item = &TradeRecord> {
        let entries: &[Result<TradeRecord, NormalizationError>] = match self {
            FeedMessage::Ignored => &[],
            FeedMessage::Trades(entries) => entries,
        };
        entries.iter().filter_map(|entry| entry.as_ref().ok())
    }
}

/// Trait for converting raw feed payloads into trade records
pub trait EventNormalizer: Send + Sync {
    fn normalize_message(&self, data: &str) -> Result<FeedMessage, NormalizationError>;
    fn normalize_entry(&self, entry: &Value) -> Result<TradeRecord, NormalizationError>;
}

/// BitMEX realtime `trade` table normalizer
#[derive(Debug, Clone, Default)]
pub struct BitmexNormalizer;

impl BitmexNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Extract a strictly positive, finite JSON number
    fn extract_positive(&self, obj: &Value, field: &str) -> Result<f64, NormalizationError> {
        let value = obj
            .get(field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NormalizationError::malformed(format!("missing field: {}", field)))?;

        let number = value.as_f64().ok_or_else(|| {
            NormalizationError::malformed(format!("non-numeric {}: {}", field, value))
        })?;

        if !number.is_finite() || number <= 0.0 {
            return Err(NormalizationError::malformed(format!(
                "{} must be positive, got {}",
                field, number
            )));
        }

        Ok(number)
    }

    /// Parse trade side, case-insensitively
    fn parse_trade_side(&self, obj: &Value) -> Result<TradeSide, NormalizationError> {
        let side_str = obj
            .get("side")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NormalizationError::malformed("missing field: side"))?;

        match side_str.to_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            _ => Err(NormalizationError::malformed(format!(
                "unknown side: {}",
                side_str
            ))),
        }
    }

    /// Parse an ISO-8601 timestamp, truncated to millisecond resolution
    fn parse_timestamp(&self, obj: &Value) -> Result<DateTime<Utc>, NormalizationError> {
        let timestamp_str = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NormalizationError::malformed("missing field: timestamp"))?;

        let parsed = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|e| {
                NormalizationError::malformed(format!(
                    "invalid timestamp {:?}: {}",
                    timestamp_str, e
                ))
            })?
            .with_timezone(&Utc);

        DateTime::from_timestamp_millis(parsed.timestamp_millis()).ok_or_else(|| {
            NormalizationError::malformed(format!("timestamp out of range: {}", timestamp_str))
        })
    }

    fn is_trade_insert(message: &TableMessage<'_>) -> bool {
        message.table.as_deref() == Some("trade") && message.action.as_deref() == Some("insert")
    }

    fn normalize_raw_entry(&self, raw: &RawValue) -> Result<TradeRecord, NormalizationError> {
        let entry: Value = serde_json::from_str(raw.get())
            .map_err(|e| NormalizationError::malformed(format!("unreadable entry: {}", e)))?;
        self.normalize_entry(&entry)
    }
}

impl EventNormalizer for BitmexNormalizer {
    fn normalize_message(&self, data: &str) -> Result<FeedMessage, NormalizationError> {
        let message: TableMessage<'_> = match serde_json::from_str(data) {
            Ok(message) => message,
            // Valid JSON of another shape (arrays, non-string table names) is not a trade
            Err(e) => {
                return match serde_json::from_str::<serde::de::IgnoredAny>(data) {
                    Ok(_) => Ok(FeedMessage::Ignored),
                    Err(_) => Err(NormalizationError::InvalidJson(e.to_string())),
                };
            }
        };

        if !Self::is_trade_insert(&message) {
            return Ok(FeedMessage::Ignored);
        }

        let entries: Vec<&RawValue> = message
            .data
            .and_then(|raw| serde_json::from_str(raw.get()).ok())
            .ok_or_else(|| NormalizationError::malformed("trade insert without data array"))?;

        Ok(FeedMessage::Trades(
            entries.into_iter().map(|raw| self.normalize_raw_entry(raw)).collect(),
        ))
    }

    fn normalize_entry(&self, entry: &Value) -> Result<TradeRecord, NormalizationError> {
        if !entry.is_object() {
            return Err(NormalizationError::malformed(format!(
                "entry is not an object: {}",
                entry
            )));
        }

        Ok(TradeRecord {
            price: self.extract_positive(entry, "price")?,
            size: self.extract_positive(entry, "size")?,
            side: self.parse_trade_side(entry)?,
            timestamp: self.parse_timestamp(entry)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(price: Value, size: Value, side: &str) -> Value {
        json!({
            "timestamp": "2024-03-01T12:00:00.123Z",
            "symbol": "XBTUSD",
            "side": side,
            "size": size,
            "price": price,
        })
    }

    #[test]
    fn test_side_is_case_insensitive() {
        let normalizer = BitmexNormalizer::new();
        let record = normalizer.normalize_entry(&entry(json!(100.5), json!(3), "Buy")).unwrap();
        assert_eq!(record.side, TradeSide::Buy);

        let record = normalizer.normalize_entry(&entry(json!(100.5), json!(3), "SELL")).unwrap();
        assert_eq!(record.side, TradeSide::Sell);
    }

    #[test]
    fn test_timestamp_millisecond_resolution() {
        let normalizer = BitmexNormalizer::new();
        let mut raw = entry(json!(1), json!(1), "buy");
        raw["timestamp"] = json!("2024-03-01T12:00:00.123456Z");

        let record = normalizer.normalize_entry(&raw).unwrap();
        assert_eq!(record.timestamp.timestamp_subsec_micros(), 123_000);
    }

    #[test]
    fn test_rejects_bad_fields() {
        let normalizer = BitmexNormalizer::new();
        let cases = vec![
            entry(Value::Null, json!(1), "buy"),
            entry(json!("100"), json!(1), "buy"),
            entry(json!(100), json!(0), "buy"),
            entry(json!(-5), json!(1), "sell"),
            entry(json!(100), json!(1), "hold"),
            json!({"price": 1, "size": 1, "side": "buy", "timestamp": "yesterday"}),
            json!({"price": 1, "size": 1, "side": "buy"}),
            json!([1, 2, 3]),
        ];

        for raw in cases {
            let result = normalizer.normalize_entry(&raw);
            assert!(
                matches!(result, Err(NormalizationError::MalformedTrade(_))),
                "expected rejection for {}",
                raw
            );
        }
    }

    #[test]
    fn test_non_trade_messages_ignored() {
        let normalizer = BitmexNormalizer::new();
        let messages = [
            r#"{"info":"Welcome to the BitMEX Realtime API.","version":"2.0.0"}"#,
            r#"{"success":true,"subscribe":"trade:XBTUSD"}"#,
            r#"{"table":"trade","action":"partial","data":[]}"#,
            r#"{"table":"liquidation","action":"insert","data":[]}"#,
        ];

        for message in messages {
            assert_eq!(normalizer.normalize_message(message), Ok(FeedMessage::Ignored));
        }
    }

    #[test]
    fn test_invalid_json() {
        let normalizer = BitmexNormalizer::new();
        assert!(matches!(
            normalizer.normalize_message("{not json"),
            Err(NormalizationError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unrepresentable_number_fails_only_its_entry() {
        let normalizer = BitmexNormalizer::new();
        let message = r#"{"table":"trade","action":"insert","data":[
            {"timestamp":"2024-03-01T12:00:00.000Z","side":"Buy","size":1e400,"price":10}
        ]}"#;

        match normalizer.normalize_message(message).unwrap() {
            FeedMessage::Trades(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(matches!(entries[0], Err(NormalizationError::MalformedTrade(_))));
            }
            other => panic!("expected trades, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_without_data_array() {
        let normalizer = BitmexNormalizer::new();
        let result = normalizer.normalize_message(r#"{"table":"trade","action":"insert","data":{}}"#);
        assert!(matches!(result, Err(NormalizationError::MalformedTrade(_))));
    }
}
