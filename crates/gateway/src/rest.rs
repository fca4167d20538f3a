//! REST reference implementation of [`BrokerGateway`].
//!
//! The venue speaks a form-POST protocol with plain-text responses:
//!
//! - `balance.php` → `"<amount>;<currency>"`
//! - `ajax_percent.php` → the payout percent as a bare integer
//! - `ajax5_new.php` → markup containing `data-id="<trade id>"` on success
//! - `trade_check2.php` → `"<rate>;<result>;<investment>"` once settled
//! - `profile` → markup containing `demo-account` for demo sessions
//!
//! Only this module knows those shapes; everything above works against the
//! trait. Responses that do not match parse as "no result".

use std::time::Duration;

use async_trait::async_trait;
use common::ExponentialBackoff;
use model::TradeKind;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::credentials::SessionCredentials;
use crate::error::GatewayError;
use crate::rules;
use crate::{AccountBalance, BrokerGateway, PayoutQuote, TradeExpiry, TradeOrder};

const PATH_BALANCE: &str = "/balance.php";
const PATH_TRADE: &str = "/ajax5_new.php";
const PATH_TRADE_CHECK: &str = "/trade_check2.php";
const PATH_PERCENT: &str = "/ajax_percent.php";
const PATH_PROFILE: &str = "/profile";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settlement polling bounds.
const RESULT_MAX_ATTEMPTS: u32 = 60;
const RESULT_POLL_BASE: Duration = Duration::from_secs(1);
const RESULT_POLL_CAP: Duration = Duration::from_secs(10);

/// Gateway talking to the venue over HTTP.
pub struct RestBrokerGateway {
    http: Client,
    base_url: String,
    credentials: SessionCredentials,
}

impl RestBrokerGateway {
    /// Create a gateway with the default request timeout.
    pub fn new(base_url: &str, credentials: SessionCredentials) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, credentials, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: SessionCredentials,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::RequestBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_form(&self, path: &str, params: &[(&str, String)]) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST form");

        let response = self.http.post(&url).form(params).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.text().await?)
        } else if status.as_u16() == 429 {
            Err(GatewayError::RateLimited {
                retry_after_ms: 60_000,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Http {
                status: status.as_u16(),
                message: body,
            })
        }
    }

    fn session_params(&self) -> [(&'static str, String); 2] {
        [
            ("user_id", self.credentials.user_id().to_string()),
            ("user_hash", self.credentials.expose_hash().to_string()),
        ]
    }
}

/// Pull the value of a `data-id="..."` attribute out of placement markup.
fn extract_trade_id(body: &str) -> Option<String> {
    let start = body.find("data-id=\"")? + "data-id=\"".len();
    let rest = &body[start..];
    let end = rest.find('"')?;
    let id = &rest[..end];
    (!id.is_empty()).then(|| id.to_string())
}

/// Parse a `"<rate>;<result>;<investment>"` settlement line into signed
/// profit (`result - investment`).
fn parse_settlement(body: &str) -> Option<Decimal> {
    let mut parts = body.trim().split(';');
    let _rate = parts.next()?;
    let result: Decimal = parts.next()?.trim().parse().ok()?;
    let investment: Decimal = parts.next()?.trim().parse().ok()?;
    Some(result - investment)
}

/// Parse a `"<amount>;<currency>"` balance line.
fn parse_balance(body: &str) -> Option<AccountBalance> {
    let mut parts = body.trim().split(';');
    let amount: Decimal = parts.next()?.trim().parse().ok()?;
    let currency = parts.next()?.trim().to_uppercase();
    (!currency.is_empty()).then_some(AccountBalance { amount, currency })
}

#[async_trait]
impl BrokerGateway for RestBrokerGateway {
    async fn place_trade(&self, order: &TradeOrder) -> Result<Option<String>, GatewayError> {
        // Venue-side validity is checked locally first; a violation is a
        // business rejection, not a transport failure.
        if !rules::stake_in_range(&order.currency, order.stake) {
            warn!(
                symbol = %order.symbol,
                stake = %order.stake,
                currency = %order.currency,
                "stake outside venue limits, refusing placement"
            );
            return Ok(None);
        }

        let (time_value, date_value, trade_type) = match order.expiry {
            TradeExpiry::Sprint { minutes } => {
                let Some(minutes) = rules::normalize_sprint(&order.symbol, minutes) else {
                    warn!(
                        symbol = %order.symbol,
                        minutes,
                        "sprint minutes not permitted, refusing placement"
                    );
                    return Ok(None);
                };
                (minutes.to_string(), "0".to_string(), "sprint")
            }
            TradeExpiry::Classic { end_ts_ms } => {
                // Epoch seconds; the venue anchors classic expiries to the
                // candle boundary.
                ((end_ts_ms / 1000).to_string(), "0".to_string(), "classic")
            }
        };

        let mut params: Vec<(&str, String)> = self.session_params().into();
        params.push(("option", order.symbol.replace('/', "")));
        params.push(("investment", order.stake.to_string()));
        params.push(("time", time_value));
        params.push(("date", date_value));
        params.push(("trade_type", trade_type.to_string()));
        params.push(("status", order.direction.code().to_string()));

        let body = self.post_form(PATH_TRADE, &params).await?;
        Ok(extract_trade_id(&body))
    }

    async fn check_result(
        &self,
        trade_id: &str,
        initial_wait: Duration,
    ) -> Result<Option<Decimal>, GatewayError> {
        tokio::time::sleep(initial_wait).await;

        let mut params: Vec<(&str, String)> = self.session_params().into();
        params.push(("trade_id", trade_id.to_string()));

        let mut backoff = ExponentialBackoff::new(RESULT_POLL_BASE, RESULT_POLL_CAP, 0.1);
        for attempt in 0..RESULT_MAX_ATTEMPTS {
            match self.post_form(PATH_TRADE_CHECK, &params).await {
                Ok(body) => {
                    if let Some(profit) = parse_settlement(&body) {
                        return Ok(Some(profit));
                    }
                }
                Err(e) => {
                    // Settlement polling rides out transport failures; the
                    // attempt budget bounds the total effort.
                    warn!(trade_id, attempt, error = %e, "settlement poll failed");
                }
            }
            tokio::time::sleep(backoff.next_delay()).await;
        }

        Ok(None)
    }

    async fn payout_percent(&self, quote: &PayoutQuote) -> Result<Option<u32>, GatewayError> {
        let type_name = match quote.kind {
            TradeKind::Classic => "Classic",
            TradeKind::Sprint => "Sprint",
        };

        let mut params: Vec<(&str, String)> = vec![
            ("type", type_name.to_string()),
            ("currency_name", quote.currency.clone()),
            ("investment", quote.stake.to_string()),
            ("percent", "79".to_string()),
            ("option", quote.symbol.replace('/', "")),
        ];
        if quote.kind == TradeKind::Sprint {
            params.push(("time", quote.minutes.to_string()));
        }

        let body = self.post_form(PATH_PERCENT, &params).await?;
        Ok(body.trim().parse::<u32>().ok())
    }

    async fn balance(&self) -> Result<AccountBalance, GatewayError> {
        let params: Vec<(&str, String)> = self.session_params().into();
        let body = self.post_form(PATH_BALANCE, &params).await?;
        parse_balance(&body)
            .ok_or_else(|| GatewayError::Parse(format!("unexpected balance response: {body}")))
    }

    async fn is_demo(&self) -> Result<bool, GatewayError> {
        let url = format!("{}{}", self.base_url, PATH_PROFILE);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message: body,
            });
        }
        let body = response.text().await?;
        Ok(body.contains("demo-account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_extract_trade_id() {
        let body = r#"<tr class="trade_graph_tick" data-id="123456"><td>...</td></tr>"#;
        assert_eq!(extract_trade_id(body), Some("123456".to_string()));
    }

    #[test]
    fn test_extract_trade_id_missing() {
        assert_eq!(extract_trade_id("<html>rejected</html>"), None);
        assert_eq!(extract_trade_id(r#"data-id="""#), None);
    }

    #[test]
    fn test_parse_settlement_profit() {
        assert_eq!(parse_settlement("1.85;185.00;100.00"), Some(dec!(85.00)));
    }

    #[test]
    fn test_parse_settlement_loss() {
        assert_eq!(parse_settlement("0;0;100"), Some(dec!(-100)));
    }

    #[test]
    fn test_parse_settlement_not_ready() {
        assert_eq!(parse_settlement(""), None);
        assert_eq!(parse_settlement("pending"), None);
        assert_eq!(parse_settlement("1.85;x;100"), None);
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(
            parse_balance("1024.50;USD"),
            Some(AccountBalance {
                amount: dec!(1024.50),
                currency: "USD".to_string()
            })
        );
        assert_eq!(parse_balance("garbage"), None);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let gateway = RestBrokerGateway::new(
            "https://venue.example.com/",
            SessionCredentials::new("1".into(), "h".into()),
        )
        .unwrap();
        assert_eq!(gateway.base_url(), "https://venue.example.com");
    }
}
