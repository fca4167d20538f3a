//! Reference stake policies.
//!
//! The engine treats staking arithmetic as a pluggable collaborator; these
//! policies cover the common schemes and double as usage examples for
//! implementing your own.

mod fibonacci;
mod fixed;
mod martingale;

pub use fibonacci::FibonacciPolicy;
pub use fixed::FixedStakePolicy;
pub use martingale::MartingalePolicy;
