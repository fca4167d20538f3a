//! Signal message parsing.
//!
//! The source emits JSON objects like:
//!
//! ```json
//! {
//!   "symbol": "EURUSD",
//!   "timeframe": "M1",
//!   "direction": "up",
//!   "indicator": "RSI(14)",
//!   "datetime": "2026-08-07T12:00:00+00:00",
//!   "next_datetime": "2026-08-07T12:01:00+00:00"
//! }
//! ```
//!
//! `direction` accepts the numeric codes 1/2 as well as the aliases
//! up/buy/long and down/sell/short.

use chrono::DateTime;
use model::{timeframe_minutes, Direction, Signal};
use serde_json::Value;
use thiserror::Error;

/// Why a message was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),

    #[error("unusable direction")]
    UnusableDirection,

    #[error("invalid datetime '{0}'")]
    InvalidDatetime(String),
}

fn parse_direction(value: Option<&Value>) -> Option<Direction> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Direction::from_code),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "up" | "buy" | "long" => Some(Direction::Up),
            "2" | "down" | "sell" | "short" => Some(Direction::Down),
            _ => None,
        },
        _ => None,
    }
}

fn required_str<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a str, ParseError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField(field))
}

fn parse_ts_ms(raw: &str) -> Result<i64, ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| ParseError::InvalidDatetime(raw.to_string()))
}

/// Parse one raw WebSocket message into a [`Signal`].
pub fn parse_signal(text: &str) -> Result<Signal, ParseError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    let symbol = required_str(&value, "symbol")?.to_uppercase();
    let timeframe = required_str(&value, "timeframe")?.to_uppercase();
    if timeframe_minutes(&timeframe).is_none() {
        return Err(ParseError::UnknownTimeframe(timeframe));
    }

    let direction = parse_direction(value.get("direction")).ok_or(ParseError::UnusableDirection)?;

    let candle_ts_ms = parse_ts_ms(required_str(&value, "datetime")?)?;
    let next_candle_ts_ms = match value.get("next_datetime").and_then(|v| v.as_str()) {
        Some(raw) if !raw.trim().is_empty() => Some(parse_ts_ms(raw.trim())?),
        _ => None,
    };

    let indicator = value
        .get("indicator")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Signal {
        symbol,
        timeframe,
        direction: Some(direction),
        indicator,
        candle_ts_ms: Some(candle_ts_ms),
        next_candle_ts_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_message() -> serde_json::Value {
        serde_json::json!({
            "symbol": "eurusd",
            "timeframe": "m1",
            "direction": "up",
            "indicator": "RSI(14)",
            "datetime": "2026-08-07T12:00:00+00:00",
            "next_datetime": "2026-08-07T12:01:00+00:00",
        })
    }

    #[test]
    fn test_parse_full_message() {
        let signal = parse_signal(&base_message().to_string()).unwrap();

        assert_eq!(signal.symbol, "EURUSD");
        assert_eq!(signal.timeframe, "M1");
        assert_eq!(signal.direction, Some(Direction::Up));
        assert_eq!(signal.indicator.as_deref(), Some("RSI(14)"));
        assert!(signal.candle_ts_ms.is_some());
        assert_eq!(
            signal.next_candle_ts_ms.unwrap() - signal.candle_ts_ms.unwrap(),
            60_000
        );
    }

    #[test]
    fn test_direction_aliases() {
        for (raw, expected) in [
            (serde_json::json!(1), Direction::Up),
            (serde_json::json!(2), Direction::Down),
            (serde_json::json!("buy"), Direction::Up),
            (serde_json::json!("SELL"), Direction::Down),
            (serde_json::json!("long"), Direction::Up),
            (serde_json::json!("short"), Direction::Down),
        ] {
            let mut message = base_message();
            message["direction"] = raw;
            let signal = parse_signal(&message.to_string()).unwrap();
            assert_eq!(signal.direction, Some(expected));
        }
    }

    #[test]
    fn test_unusable_direction_rejected() {
        for raw in [serde_json::json!(0), serde_json::json!(3), serde_json::json!("both")] {
            let mut message = base_message();
            message["direction"] = raw;
            assert!(matches!(
                parse_signal(&message.to_string()),
                Err(ParseError::UnusableDirection)
            ));
        }
    }

    #[test]
    fn test_unknown_timeframe_rejected() {
        let mut message = base_message();
        message["timeframe"] = serde_json::json!("T7");
        assert!(matches!(
            parse_signal(&message.to_string()),
            Err(ParseError::UnknownTimeframe(_))
        ));
    }

    #[test]
    fn test_missing_fields_rejected() {
        for field in ["symbol", "timeframe", "datetime"] {
            let mut message = base_message();
            message.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(
                    parse_signal(&message.to_string()),
                    Err(ParseError::MissingField(_))
                ),
                "missing {field} must be rejected"
            );
        }
    }

    #[test]
    fn test_optional_fields_absent() {
        let mut message = base_message();
        message.as_object_mut().unwrap().remove("indicator");
        message.as_object_mut().unwrap().remove("next_datetime");

        let signal = parse_signal(&message.to_string()).unwrap();
        assert!(signal.indicator.is_none());
        assert!(signal.next_candle_ts_ms.is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(parse_signal("not json"), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_signal(r#"{"datetime": "yesterday", "symbol": "EURUSD", "timeframe": "M1", "direction": 1}"#),
            Err(ParseError::InvalidDatetime(_))
        ));
    }
}
