//! WebSocket session management with automatic reconnection.

use std::time::{Duration, Instant};

use common::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use metrics::SharedMetrics;
use signal_bus::SharedSignalBus;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::parser::parse_signal;

/// Duration of stable connection before resetting backoff.
const STABLE_CONNECTION_THRESHOLD: Duration = Duration::from_secs(300);

/// Timeout for WebSocket connection attempts.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector failure modes.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("invalid connector configuration: {0}")]
    Config(String),

    #[error("connection closed")]
    ConnectionClosed,
}

/// Signal source connection settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// WebSocket URL of the signal source.
    pub url: String,
    /// Optional bearer token sent as an `Authorization` header.
    pub auth_token: Option<String>,
    /// Candles older than this are dropped at the ingestion boundary.
    pub max_signal_age: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            auth_token: None,
            max_signal_age: Duration::from_secs(300),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum ConnectResult {
    Connected(WsStream),
    Shutdown,
    Error(ConnectorError),
}

enum SessionResult {
    /// Shutdown was requested.
    Shutdown,
    /// Session connected and later ended (returns how long it lasted).
    Connected {
        duration: Duration,
        error: ConnectorError,
    },
    /// Failed to connect at all.
    ConnectFailed(ConnectorError),
}

fn build_request(
    config: &ConnectorConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ConnectorError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ConnectorError::Config(e.to_string()))?;

    if let Some(token) = &config.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ConnectorError::Config(e.to_string()))?;
        request.headers_mut().insert("Authorization", value);
    }
    Ok(request)
}

async fn connect_with_timeout(
    config: &ConnectorConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectResult {
    loop {
        let request = match build_request(config) {
            Ok(request) => request,
            Err(e) => return ConnectResult::Error(e),
        };

        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return ConnectResult::Shutdown;
                }
                // Spurious wakeup; retry the connection attempt.
            }

            result = tokio::time::timeout(CONNECTION_TIMEOUT, connect_async(request)) => {
                return match result {
                    Ok(Ok((stream, _))) => ConnectResult::Connected(stream),
                    Ok(Err(e)) => ConnectResult::Error(ConnectorError::WebSocket(e.to_string())),
                    Err(_) => {
                        ConnectResult::Error(ConnectorError::WebSocket("connection timeout".to_string()))
                    }
                };
            }
        }
    }
}

async fn run_session(
    config: &ConnectorConfig,
    bus: &SharedSignalBus,
    shutdown_rx: &mut watch::Receiver<bool>,
    metrics: &SharedMetrics,
) -> SessionResult {
    info!(url = %config.url, "connecting to signal source");

    let ws_stream = match connect_with_timeout(config, shutdown_rx).await {
        ConnectResult::Connected(stream) => stream,
        ConnectResult::Shutdown => return SessionResult::Shutdown,
        ConnectResult::Error(e) => return SessionResult::ConnectFailed(e),
    };

    info!("connected to signal source");
    let connected_at = Instant::now();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("shutdown signal received, closing connection");
                    let _ = write.close().await;
                    return SessionResult::Shutdown;
                }
            }

            msg_opt = read.next() => {
                let msg = match msg_opt {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        metrics.inc_feed_errors();
                        return SessionResult::Connected {
                            duration: connected_at.elapsed(),
                            error: ConnectorError::WebSocket(e.to_string()),
                        };
                    }
                    None => {
                        return SessionResult::Connected {
                            duration: connected_at.elapsed(),
                            error: ConnectorError::ConnectionClosed,
                        };
                    }
                };

                match msg {
                    Message::Text(text) => match parse_signal(&text) {
                        Ok(signal) => {
                            if bus.push_if_fresh(&signal, config.max_signal_age) {
                                debug!(
                                    symbol = %signal.symbol,
                                    timeframe = %signal.timeframe,
                                    direction = ?signal.direction,
                                    "signal ingested"
                                );
                            } else {
                                metrics.inc_signals_dropped_stale();
                            }
                        }
                        Err(e) => {
                            metrics.inc_feed_errors();
                            warn!(error = %e, "unparseable signal message");
                        }
                    },
                    Message::Ping(data) => {
                        debug!("received ping, sending pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            metrics.inc_feed_errors();
                            return SessionResult::Connected {
                                duration: connected_at.elapsed(),
                                error: ConnectorError::WebSocket(e.to_string()),
                            };
                        }
                    }
                    Message::Close(_) => {
                        info!("connection closed by signal source");
                        return SessionResult::Connected {
                            duration: connected_at.elapsed(),
                            error: ConnectorError::ConnectionClosed,
                        };
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Run the connector with automatic reconnection.
///
/// Returns only when the shutdown signal fires; every other failure mode
/// reconnects with jittered exponential backoff, reset after five minutes
/// of stable connection.
pub async fn run_connector(
    config: ConnectorConfig,
    bus: SharedSignalBus,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: SharedMetrics,
) -> Result<(), ConnectorError> {
    let mut backoff = ExponentialBackoff::default();

    loop {
        if *shutdown_rx.borrow() {
            info!("shutdown requested, exiting connector");
            return Ok(());
        }

        let error = match run_session(&config, &bus, &mut shutdown_rx, &metrics).await {
            SessionResult::Shutdown => {
                info!("connector shutdown complete");
                return Ok(());
            }
            SessionResult::Connected { duration, error } => {
                if duration >= STABLE_CONNECTION_THRESHOLD {
                    debug!(
                        duration_secs = duration.as_secs(),
                        "connection was stable, resetting backoff"
                    );
                    backoff.reset();
                }
                error
            }
            SessionResult::ConnectFailed(e) => e,
        };

        metrics.inc_feed_reconnects();
        let delay = backoff.next_delay();
        warn!(
            error = %error,
            attempt = backoff.attempt(),
            delay_secs = delay.as_secs_f64(),
            "connection lost, reconnecting"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("shutdown requested during backoff");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_plain() {
        let config = ConnectorConfig::default();
        let request = build_request(&config).unwrap();
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_build_request_with_token() {
        let config = ConnectorConfig {
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let request = build_request(&config).unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn test_build_request_rejects_bad_url() {
        let config = ConnectorConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_request(&config),
            Err(ConnectorError::Config(_))
        ));
    }
}
