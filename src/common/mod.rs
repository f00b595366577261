//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the settlement engine.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - The root error type

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Network, SettlementConfig};
pub use error::{BridgeError, Result};
pub use logging::{
    init_from_config, init_logging, log_broadcast_event, log_proof_rejected, log_reveal_event,
    log_sweep_event, ErrorDetails, EventCategory, LogEvent, LogLevel, LoggingError,
};
