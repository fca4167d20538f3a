//! Directional signals and the keys they are published under.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard token accepted in either field of a [`SignalKey`].
pub const ANY: &str = "*";

/// Predicted price direction for one candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Parse the 1/2 wire code used by signal sources and the venue.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            _ => None,
        }
    }

    /// Wire code: 1 = up, 2 = down.
    pub fn code(&self) -> u8 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// One directional prediction for a (symbol, timeframe) pair.
///
/// Immutable after creation. `direction` may be `None` for pushes that only
/// clear previous state; such pushes still bump the key version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: String,
    pub direction: Option<Direction>,
    /// Name of the indicator that produced the prediction, e.g. "RSI(14)".
    pub indicator: Option<String>,
    /// Open time of the candle the prediction is for (epoch ms).
    pub candle_ts_ms: Option<i64>,
    /// Open time of the next candle, used as the classic expiry anchor.
    pub next_candle_ts_ms: Option<i64>,
}

/// Publication key for the signal bus.
///
/// Either field may be the wildcard `"*"`. A push for a concrete pair fans
/// out to the exact key plus all matching wildcard combinations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    symbol: String,
    timeframe: String,
}

impl SignalKey {
    /// Build a key, normalizing both fields to upper case.
    pub fn new(symbol: impl AsRef<str>, timeframe: impl AsRef<str>) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase(),
            timeframe: timeframe.as_ref().trim().to_uppercase(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    /// Returns true if neither field is a wildcard.
    pub fn is_concrete(&self) -> bool {
        self.symbol != ANY && self.timeframe != ANY
    }

    /// The four keys touched by a push for this concrete pair:
    /// exact/exact, any/tf, sym/any, any/any.
    pub fn fanout(&self) -> [SignalKey; 4] {
        [
            self.clone(),
            SignalKey::new(ANY, &self.timeframe),
            SignalKey::new(&self.symbol, ANY),
            SignalKey::new(ANY, ANY),
        ]
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.timeframe)
    }
}
