//! Structured Logging for the Settlement Engine
//!
//! Provides structured logging with:
//! - JSON output for log aggregation on mainnet
//! - Pretty output for development
//! - Typed settlement events (reveals, sweeps, rejected proofs, broadcasts)
//!
//! # Usage
//!
//! ```rust,ignore
//! use sweepbridge::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//!
//! tracing::info!(target: "sweepbridge::sweep", wallet = %wallet, "sweep accepted");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::types::units::sats_to_display;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Deposit reveals
    Reveal,
    /// Sweep settlement
    Sweep,
    /// SPV proof verification
    Proof,
    /// Sweep transaction building and broadcast
    Assembler,
    /// System events (startup, shutdown)
    System,
    /// Error events
    Error,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Transaction or outpoint the event is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            subject: None,
            data: None,
            error: None,
        }
    }

    /// Attach the transaction hash or outpoint key
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add error details
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// Log this event to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Settlement Event Logging
// ============================================================================

/// Log a deposit reveal
pub fn log_reveal_event(
    outpoint_key: &str,
    funding_tx_hash: &str,
    funding_output_index: u32,
    amount_sats: u64,
    error: Option<(&str, &str)>,
) {
    let level = if error.is_none() { LogLevel::Info } else { LogLevel::Warn };
    let message = if error.is_none() { "deposit revealed" } else { "reveal rejected" };
    let mut event = LogEvent::new(level, EventCategory::Reveal, message)
        .with_subject(outpoint_key)
        .with_data(serde_json::json!({
            "funding_tx_hash": funding_tx_hash,
            "funding_output_index": funding_output_index,
            "amount": sats_to_display(amount_sats),
        }));

    match error {
        None => tracing::info!(target: "sweepbridge::reveal", "{}", event.to_json()),
        Some((code, msg)) => {
            event = event.with_error(code, msg);
            tracing::warn!(target: "sweepbridge::reveal", "{}", event.to_json());
        }
    }
}

/// Log an accepted sweep
pub fn log_sweep_event(
    sweep_tx_hash: &str,
    wallet_pub_key_hash: &str,
    deposits: usize,
    total_fee: u64,
    fee_share: u64,
    main_utxo_value: u64,
) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Sweep, "sweep accepted")
        .with_subject(sweep_tx_hash)
        .with_data(serde_json::json!({
            "wallet_pub_key_hash": wallet_pub_key_hash,
            "deposits": deposits,
            "total_fee": total_fee,
            "fee_share": fee_share,
            "main_utxo": sats_to_display(main_utxo_value),
        }));

    tracing::info!(target: "sweepbridge::sweep", "{}", event.to_json());
}

/// Log a proof or sweep the engine refused
pub fn log_proof_rejected(tx_hash: &str, code: &str, reason: &str) {
    let event = LogEvent::new(LogLevel::Warn, EventCategory::Proof, "sweep rejected")
        .with_subject(tx_hash)
        .with_error(code, reason);

    tracing::warn!(target: "sweepbridge::spv", "{}", event.to_json());
}

/// Log the outcome of a sweep broadcast
pub fn log_broadcast_event(txid: &str, output_value: u64, error: Option<&str>) {
    let level = if error.is_none() { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Assembler, "sweep broadcast")
        .with_subject(txid)
        .with_data(serde_json::json!({
            "output": sats_to_display(output_value),
            "accepted": error.is_none(),
        }));

    match error {
        None => tracing::info!(target: "sweepbridge::assembler", "{}", event.to_json()),
        Some(err) => {
            event = event.with_error("BROADCAST_ERROR", err);
            tracing::error!(target: "sweepbridge::assembler", "{}", event.to_json());
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (recommended for production)
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sweepbridge={}", level.as_filter())));

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from SettlementConfig
pub fn init_from_config(config: &super::config::SettlementConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.network == super::config::Network::Mainnet;

    init_logging(level, json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

// ============================================================================
// Tests
// ============================================================================
