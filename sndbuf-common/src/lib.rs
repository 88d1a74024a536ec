//! # sndbuf Common Library
//!
//! Shared code for the sndbuf crates:
//! - Error type used by configuration loading
//! - TOML configuration discovery and loading
//! - Logging configuration

pub mod config;
pub mod error;

pub use config::{CompiledDefaults, ConfigResolver, LoggingConfig};
pub use error::{Error, Result};
