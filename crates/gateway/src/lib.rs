//! Broker gateway abstraction and the REST reference implementation.
//!
//! The engine consumes the [`BrokerGateway`] capability and treats every
//! transport failure as "no result, try later" — never as fatal. The wire
//! protocol of the real venue is out of engine scope; [`RestBrokerGateway`]
//! documents the plain-text/form protocol it assumes.

mod credentials;
mod error;
mod rest;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use model::{Direction, TradeKind};
use rust_decimal::Decimal;

pub use credentials::SessionCredentials;
pub use error::GatewayError;
pub use rest::RestBrokerGateway;

/// Expiry of a trade being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeExpiry {
    /// Expires a fixed number of minutes after placement.
    Sprint { minutes: u32 },
    /// Expires at an absolute candle boundary (epoch ms).
    Classic { end_ts_ms: i64 },
}

impl TradeExpiry {
    pub fn kind(&self) -> TradeKind {
        match self {
            Self::Sprint { .. } => TradeKind::Sprint,
            Self::Classic { .. } => TradeKind::Classic,
        }
    }
}

/// A trade placement request.
#[derive(Debug, Clone)]
pub struct TradeOrder {
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub expiry: TradeExpiry,
    pub currency: String,
}

/// A payout-percent quote request.
#[derive(Debug, Clone)]
pub struct PayoutQuote {
    pub symbol: String,
    pub stake: Decimal,
    pub minutes: u32,
    pub currency: String,
    pub kind: TradeKind,
}

/// Account balance as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub amount: Decimal,
    pub currency: String,
}

/// Remote venue operations the engine depends on.
///
/// All methods may fail with a transport error; `Ok(None)` from
/// `place_trade` is a business rejection (no retry), `Ok(None)` from
/// `check_result` means the outcome stayed undetermined after bounded
/// polling.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Place a trade. Returns the venue-assigned trade id, or `None` when
    /// the venue refused the trade.
    async fn place_trade(&self, order: &TradeOrder) -> Result<Option<String>, GatewayError>;

    /// Wait `initial_wait`, then poll for the settled profit of a trade.
    /// Returns the signed profit, or `None` when polling was exhausted.
    async fn check_result(
        &self,
        trade_id: &str,
        initial_wait: Duration,
    ) -> Result<Option<Decimal>, GatewayError>;

    /// Current payout percent for a quote, or `None` when the venue did
    /// not return a usable figure.
    async fn payout_percent(&self, quote: &PayoutQuote) -> Result<Option<u32>, GatewayError>;

    /// Current account balance.
    async fn balance(&self) -> Result<AccountBalance, GatewayError>;

    /// Whether the account is in demo mode.
    async fn is_demo(&self) -> Result<bool, GatewayError>;
}

/// Shared gateway handle.
pub type SharedGateway = Arc<dyn BrokerGateway>;
