// queuebench Core - Claim protocol, workers, producers and coordination
// NO database drivers here: stores are reached through `port`

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
