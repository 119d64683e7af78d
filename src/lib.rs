//! wakegate - transparent TCP relay that wakes its target on demand
//!
//! A client connects to the relay; the relay wakes the real destination
//! (Wake-on-LAN magic packet or hypervisor API), retries the connection
//! until the destination is up, then pipes bytes in both directions.

pub mod cli;
pub mod common;
pub mod proxy;
pub mod wakeup;

pub use common::{
    config::Config,
    error::{Error, Result},
};

/// wakegate library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// wakegate library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// wakegate library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
