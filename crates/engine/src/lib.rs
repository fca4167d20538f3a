//! Trade execution engine.
//!
//! Wires the signal bus, payout cache, slot limiter and execution queues
//! into per-trade-key coordination lanes driven by strategy lifecycles.
//!
//! # Architecture
//!
//! ```text
//! SignalBus ──> listener (per bot) ──> lane queue (per trade key)
//!                                          │
//!                                   ExecutionCoordinator
//!                      slot limiter / global lock / pending mailbox
//!                                          │
//!                                 trade execution loop
//!                  payout cache → balance gate → serialized placement
//!                            → pending board → settlement queue
//!                                          │
//!                              stake policy + observers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = Engine::new(EngineConfig::default(), gateway);
//! let bot = Bot::new(config, engine.clone(), policy_factory)?
//!     .with_observer(observer);
//! bot.start()?;
//! // ... signals flow, trades execute ...
//! bot.stop().await;
//! ```

mod bot;
mod config;
mod coordinator;
mod engine;
mod error;
pub mod examples;
mod execution;
mod validity;

pub use bot::{Bot, BotManager, PolicyFactory};
pub use config::{EngineConfig, StrategyConfig};
pub use engine::{Engine, SharedEngine};
pub use error::EngineError;
pub use validity::StaleReason;
