//! # songrec common library
//!
//! Shared code for the songrec pipeline and CLI:
//! - Error types
//! - Configuration loading (TOML folder table, credentials, timeouts)
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
