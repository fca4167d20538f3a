//! Trade-side types: serialization keys, expiry kinds, settlement results.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The serialization unit: one concrete (symbol, timeframe) pair being
/// traded. A strategy bound to wildcards creates one `TradeKey` per
/// concrete signal it receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeKey {
    symbol: String,
    timeframe: String,
}

impl TradeKey {
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
}

impl fmt::Display for TradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.timeframe)
    }
}

/// Trade expiry mode.
///
/// Sprint trades expire a fixed number of minutes after placement; classic
/// trades expire at an absolute candle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeKind {
    Sprint,
    Classic,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sprint => write!(f, "sprint"),
            Self::Classic => write!(f, "classic"),
        }
    }
}

/// Error parsing a trade kind string.
#[derive(Debug, Clone)]
pub struct ParseTradeKindError(String);

impl fmt::Display for ParseTradeKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid trade kind '{}', expected 'sprint' or 'classic'", self.0)
    }
}

impl std::error::Error for ParseTradeKindError {}

impl FromStr for TradeKind {
    type Err = ParseTradeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sprint" => Ok(Self::Sprint),
            "classic" => Ok(Self::Classic),
            _ => Err(ParseTradeKindError(s.to_string())),
        }
    }
}

/// Settlement state of a placed trade.
///
/// Transitions exactly once from `Pending` to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Pending,
    Profit(Decimal),
    Loss(Decimal),
    Unknown,
}

impl TradeResult {
    /// Classify a signed profit figure from the venue.
    ///
    /// `None` means the venue could not determine the outcome within the
    /// polling window.
    pub fn from_profit(profit: Option<Decimal>) -> Self {
        match profit {
            Some(p) if p >= Decimal::ZERO => Self::Profit(p),
            Some(p) => Self::Loss(p.abs()),
            None => Self::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Whether the venue account is in demo or real-money mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountMode {
    Demo,
    Real,
}

impl AccountMode {
    pub fn from_demo_flag(is_demo: bool) -> Self {
        if is_demo {
            Self::Demo
        } else {
            Self::Real
        }
    }
}

impl fmt::Display for AccountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo => write!(f, "demo"),
            Self::Real => write!(f, "real"),
        }
    }
}
