//! WebSocket signal ingestion.
//!
//! Connects to the external signal source, parses its JSON messages and
//! pushes fresh signals into the bus. Reconnects automatically with
//! jittered exponential backoff; the shutdown signal is raced at every
//! await so a stop never waits out a dead connection.

mod client;
mod parser;

pub use client::{run_connector, ConnectorConfig, ConnectorError};
pub use parser::{parse_signal, ParseError};
