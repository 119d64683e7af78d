//! CLI command implementations
//!
//! This module contains the implementation of all CLI commands.

pub mod config;
pub mod serve;
pub mod version;
pub mod wake;

use crate::common::error::Result;

/// Common result type for all command operations
pub type CommandResult = Result<()>;
