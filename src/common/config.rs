//! Environment-based Configuration for the Settlement Engine
//!
//! All sensitive values (wallet keys) MUST come from environment variables,
//! never from hardcoded values. A `.env` file is honoured when present.
//!
//! # Environment Variables
//!
//! ## Network Configuration
//! - `SWEEP_NETWORK` - "mainnet", "testnet", or "regtest" (default: "regtest")
//! - `SWEEP_ESPLORA_URL` - Esplora API endpoint URL
//!
//! ## Verification Policy
//! - `SWEEP_TX_PROOF_DIFFICULTY_FACTOR` - Headers of work a proof must carry (default: 6)
//! - `SWEEP_DEPOSIT_DUST_THRESHOLD` - Minimum revealed deposit in sats (default: 0, disabled)
//! - `SWEEP_DEPOSIT_TX_MAX_FEE` - Maximum sweep fee per deposit in sats (default: unset)
//! - `SWEEP_FEE_REMAINDER_POLICY` - "drop" or "last" (default: "drop")
//!
//! ## Assembler
//! - `SWEEP_WALLET_KEY` - Hex-encoded wallet signing key
//! - `SWEEP_WITNESS_OUTPUT` - Pay the sweep to P2WPKH instead of P2PKH (default: true)
//!
//! ## Optional Settings
//! - `SWEEP_DB_PATH` - SQLite database path (default: in-memory store)
//! - `SWEEP_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::spv::difficulty::{MAINNET_POW_LIMIT_BITS, REGTEST_POW_LIMIT_BITS};
use crate::sweep::fee::FeeRemainderPolicy;

/// Smallest proof factor accepted for production
pub const MIN_PRODUCTION_DIFFICULTY_FACTOR: u64 = 6;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("network mismatch: expected {0}, got {1}")]
    NetworkMismatch(String, String),

    #[error("policy too weak for production: {0}")]
    WeakPolicy(String),
}

/// Bitcoin network the engine verifies against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" | "reg" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "SWEEP_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Compact encoding of the easiest allowed target
    pub fn pow_limit_bits(&self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => MAINNET_POW_LIMIT_BITS,
            Network::Regtest => REGTEST_POW_LIMIT_BITS,
        }
    }

    /// Get default Esplora API for this network
    pub fn default_esplora_url(&self) -> &'static str {
        match self {
            Network::Mainnet => crate::esplora::MAINNET_URL,
            Network::Testnet => crate::esplora::TESTNET_URL,
            Network::Regtest => crate::esplora::REGTEST_URL,
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Network environment
    pub network: Network,

    /// Esplora API endpoint
    pub esplora_url: String,

    /// Required accumulated difficulty, in multiples of the epoch difficulty
    pub tx_proof_difficulty_factor: u64,

    /// Reveals below this amount are rejected; 0 disables the check
    pub deposit_dust_threshold: u64,

    /// Maximum sweep fee charged per deposit
    pub deposit_tx_max_fee: Option<u64>,

    /// What happens to `fee % deposits`
    pub fee_remainder_policy: FeeRemainderPolicy,

    /// SQLite path; in-memory store when unset
    pub db_path: Option<String>,

    /// Hex-encoded wallet key for the assembler
    pub wallet_key: Option<String>,

    /// Sweep output type: P2WPKH when true, P2PKH otherwise
    pub witness_output: bool,

    /// Log level
    pub log_level: String,
}

impl SettlementConfig {
    /// Defaults for a network, without consulting the environment
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            esplora_url: network.default_esplora_url().to_string(),
            tx_proof_difficulty_factor: MIN_PRODUCTION_DIFFICULTY_FACTOR,
            deposit_dust_threshold: 0,
            deposit_tx_max_fee: None,
            fee_remainder_policy: FeeRemainderPolicy::Drop,
            db_path: None,
            wallet_key: None,
            witness_output: true,
            log_level: "info".to_string(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = lookup("SWEEP_NETWORK")
            .unwrap_or_else(|| "regtest".to_string())
            .parse()?;

        let defaults = Self::for_network(network);

        let esplora_url = lookup("SWEEP_ESPLORA_URL").unwrap_or(defaults.esplora_url);

        let tx_proof_difficulty_factor = parse_var(&lookup, "SWEEP_TX_PROOF_DIFFICULTY_FACTOR")?
            .unwrap_or(defaults.tx_proof_difficulty_factor);
        if tx_proof_difficulty_factor == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_TX_PROOF_DIFFICULTY_FACTOR".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let deposit_dust_threshold = parse_var(&lookup, "SWEEP_DEPOSIT_DUST_THRESHOLD")?
            .unwrap_or(defaults.deposit_dust_threshold);

        let deposit_tx_max_fee = parse_var(&lookup, "SWEEP_DEPOSIT_TX_MAX_FEE")?;

        let fee_remainder_policy = parse_var(&lookup, "SWEEP_FEE_REMAINDER_POLICY")?
            .unwrap_or(defaults.fee_remainder_policy);

        let db_path = lookup("SWEEP_DB_PATH").filter(|p| !p.is_empty());

        let wallet_key = lookup("SWEEP_WALLET_KEY").filter(|k| !k.is_empty());

        let witness_output = match lookup("SWEEP_WITNESS_OUTPUT") {
            None => defaults.witness_output,
            Some(v) => parse_bool("SWEEP_WITNESS_OUTPUT", &v)?,
        };

        let log_level = lookup("SWEEP_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            network,
            esplora_url,
            tx_proof_difficulty_factor,
            deposit_dust_threshold,
            deposit_tx_max_fee,
            fee_remainder_policy,
            db_path,
            wallet_key,
            witness_output,
            log_level,
        })
    }

    /// Wallet key, required by the assembler
    pub fn require_wallet_key(&self) -> Result<&str, ConfigError> {
        self.wallet_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SWEEP_WALLET_KEY".to_string()))
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.network != Network::Mainnet {
            return Err(ConfigError::NetworkMismatch(
                "mainnet".to_string(),
                format!("{:?}", self.network),
            ));
        }

        if self.tx_proof_difficulty_factor < MIN_PRODUCTION_DIFFICULTY_FACTOR {
            return Err(ConfigError::WeakPolicy(format!(
                "difficulty factor {} below {}",
                self.tx_proof_difficulty_factor, MIN_PRODUCTION_DIFFICULTY_FACTOR
            )));
        }

        if self.db_path.is_none() {
            return Err(ConfigError::MissingEnvVar("SWEEP_DB_PATH".to_string()));
        }

        Ok(())
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== Settlement Configuration ===");
        println!("Network: {:?}", self.network);
        println!("Esplora URL: {}", self.esplora_url);
        println!("Proof Difficulty Factor: {}", self.tx_proof_difficulty_factor);
        println!("Dust Threshold: {} sats", self.deposit_dust_threshold);
        match self.deposit_tx_max_fee {
            Some(max) => println!("Max Fee per Deposit: {} sats", max),
            None => println!("Max Fee per Deposit: unlimited"),
        }
        println!("Fee Remainder: {}", self.fee_remainder_policy);
        println!("Database: {}", self.db_path.as_deref().unwrap_or("in-memory"));
        println!(
            "Wallet Key: {}",
            if self.wallet_key.is_some() { "configured" } else { "not set" }
        );
        println!("Witness Output: {}", self.witness_output);
        println!("Log Level: {}", self.log_level);
        println!("================================");
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
        })
        .transpose()
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("expected a boolean, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_network_parsing() {
        assert!(matches!("mainnet".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("testnet".parse::<Network>(), Ok(Network::Testnet)));
        assert!(matches!("REGTEST".parse::<Network>(), Ok(Network::Regtest)));
        assert!("invalid".parse::<Network>().is_err());
    }

    #[test]
    fn test_pow_limits() {
        assert_eq!(Network::Mainnet.pow_limit_bits(), 0x1d00ffff);
        assert_eq!(Network::Testnet.pow_limit_bits(), 0x1d00ffff);
        assert_eq!(Network::Regtest.pow_limit_bits(), 0x207fffff);
    }

    #[test]
    fn test_defaults() {
        let config = SettlementConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.tx_proof_difficulty_factor, 6);
        assert_eq!(config.deposit_dust_threshold, 0);
        assert_eq!(config.deposit_tx_max_fee, None);
        assert_eq!(config.fee_remainder_policy, FeeRemainderPolicy::Drop);
        assert!(config.witness_output);
        assert!(config.db_path.is_none());
        assert!(config.require_wallet_key().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = SettlementConfig::from_lookup(lookup(&[
            ("SWEEP_NETWORK", "mainnet"),
            ("SWEEP_TX_PROOF_DIFFICULTY_FACTOR", "12"),
            ("SWEEP_DEPOSIT_DUST_THRESHOLD", "1000000"),
            ("SWEEP_DEPOSIT_TX_MAX_FEE", "10000"),
            ("SWEEP_FEE_REMAINDER_POLICY", "last"),
            ("SWEEP_WITNESS_OUTPUT", "false"),
            ("SWEEP_DB_PATH", "/tmp/sweep.db"),
            ("SWEEP_WALLET_KEY", "aa"),
        ]))
        .unwrap();

        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.esplora_url, crate::esplora::MAINNET_URL);
        assert_eq!(config.tx_proof_difficulty_factor, 12);
        assert_eq!(config.deposit_dust_threshold, 1_000_000);
        assert_eq!(config.deposit_tx_max_fee, Some(10_000));
        assert_eq!(config.fee_remainder_policy, FeeRemainderPolicy::ChargeLastDepositor);
        assert!(!config.witness_output);
        assert_eq!(config.require_wallet_key().unwrap(), "aa");
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            SettlementConfig::from_lookup(lookup(&[("SWEEP_TX_PROOF_DIFFICULTY_FACTOR", "six")])),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert!(matches!(
            SettlementConfig::from_lookup(lookup(&[("SWEEP_TX_PROOF_DIFFICULTY_FACTOR", "0")])),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert!(matches!(
            SettlementConfig::from_lookup(lookup(&[("SWEEP_FEE_REMAINDER_POLICY", "split")])),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert!(matches!(
            SettlementConfig::from_lookup(lookup(&[("SWEEP_WITNESS_OUTPUT", "maybe")])),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn test_production_validation() {
        let regtest = SettlementConfig::for_network(Network::Regtest);
        assert!(matches!(
            regtest.validate_for_production(),
            Err(ConfigError::NetworkMismatch(_, _))
        ));

        let mut weak = SettlementConfig::for_network(Network::Mainnet);
        weak.db_path = Some("/tmp/sweep.db".to_string());
        weak.tx_proof_difficulty_factor = 1;
        assert!(matches!(weak.validate_for_production(), Err(ConfigError::WeakPolicy(_))));
    }
}
