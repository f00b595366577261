//! Esplora API Client
//!
//! HTTP access to a Bitcoin node through the Esplora REST API. Used to
//! fetch UTXO transactions, broadcast sweeps and gather SPV proof data.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Esplora API endpoints
pub const MAINNET_URL: &str = "https://blockstream.info/api";
pub const TESTNET_URL: &str = "https://blockstream.info/testnet/api";
pub const REGTEST_URL: &str = "http://127.0.0.1:3002";

/// What the assembler needs from a Bitcoin node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitcoinClient: Send + Sync {
    /// Fully serialized transaction for a display-order txid
    async fn get_raw_transaction(&self, txid: &str) -> Result<Vec<u8>, EsploraError>;

    /// Submit a hex transaction; returns the txid the node reports
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, EsploraError>;
}

/// Chain data needed to prove a confirmed transaction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn tx_status(&self, txid: &str) -> Result<EsploraTxStatus, EsploraError>;

    async fn raw_transaction(&self, txid: &str) -> Result<Vec<u8>, EsploraError>;

    async fn merkle_proof(&self, txid: &str) -> Result<EsploraMerkleProof, EsploraError>;

    async fn tip_height(&self) -> Result<u64, EsploraError>;

    /// Display-order hex hash of the block at `height`
    async fn block_hash(&self, height: u64) -> Result<String, EsploraError>;

    /// Raw 80-byte header
    async fn block_header(&self, block_hash: &str) -> Result<Vec<u8>, EsploraError>;
}

/// Esplora HTTP client
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    /// Create a new client with custom URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client for Bitcoin mainnet
    pub fn new_mainnet() -> Self {
        Self::new(MAINNET_URL)
    }

    /// Create a client for Bitcoin testnet
    pub fn new_testnet() -> Self {
        Self::new(TESTNET_URL)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get transaction status
    pub async fn get_tx_status(&self, txid: &str) -> Result<EsploraTxStatus, EsploraError> {
        let url = format!("{}/tx/{}/status", self.base_url, txid);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(EsploraError::TxNotFound(txid.to_string()));
        }

        let status: EsploraTxStatus = resp.json().await?;
        Ok(status)
    }

    /// Get current block height
    pub async fn get_block_height(&self) -> Result<u64, EsploraError> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let resp = self.client.get(&url).send().await?;

        let height: u64 = resp
            .text()
            .await?
            .trim()
            .parse()
            .map_err(|_| EsploraError::ParseError("Failed to parse block height".to_string()))?;

        Ok(height)
    }

    /// Raw transaction bytes
    pub async fn get_tx_hex(&self, txid: &str) -> Result<Vec<u8>, EsploraError> {
        let url = format!("{}/tx/{}/hex", self.base_url, txid);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(EsploraError::TxNotFound(txid.to_string()));
        }

        let tx_hex = resp.text().await?;
        hex::decode(tx_hex.trim())
            .map_err(|e| EsploraError::ParseError(format!("invalid tx hex: {}", e)))
    }

    /// Merkle inclusion proof for a confirmed transaction
    pub async fn get_merkle_proof(&self, txid: &str) -> Result<EsploraMerkleProof, EsploraError> {
        let url = format!("{}/tx/{}/merkle-proof", self.base_url, txid);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(EsploraError::TxNotFound(txid.to_string()));
        }

        let proof: EsploraMerkleProof = resp.json().await?;
        Ok(proof)
    }

    /// Block hash (display order hex) at a height
    pub async fn get_block_hash(&self, height: u64) -> Result<String, EsploraError> {
        let url = format!("{}/block-height/{}", self.base_url, height);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(EsploraError::BlockNotFound(format!("height {}", height)));
        }

        Ok(resp.text().await?.trim().to_string())
    }

    /// Raw 80-byte header for a block hash
    pub async fn get_block_header(&self, block_hash: &str) -> Result<Vec<u8>, EsploraError> {
        let url = format!("{}/block/{}/header", self.base_url, block_hash);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(EsploraError::BlockNotFound(block_hash.to_string()));
        }

        let header_hex = resp.text().await?;
        let header = hex::decode(header_hex.trim())
            .map_err(|e| EsploraError::ParseError(format!("invalid header hex: {}", e)))?;

        if header.len() != 80 {
            return Err(EsploraError::ParseError(format!(
                "invalid header length: {} bytes",
                header.len()
            )));
        }

        Ok(header)
    }

    /// Broadcast a raw transaction
    pub async fn broadcast_tx(&self, tx_hex: &str) -> Result<String, EsploraError> {
        let url = format!("{}/tx", self.base_url);
        let resp = self.client.post(&url).body(tx_hex.to_string()).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(EsploraError::BroadcastFailed(error_text));
        }

        let txid = resp.text().await?;
        Ok(txid.trim().to_string())
    }
}

#[async_trait]
impl BitcoinClient for EsploraClient {
    async fn get_raw_transaction(&self, txid: &str) -> Result<Vec<u8>, EsploraError> {
        self.get_tx_hex(txid).await
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, EsploraError> {
        self.broadcast_tx(raw_tx_hex).await
    }
}

#[async_trait]
impl ChainSource for EsploraClient {
    async fn tx_status(&self, txid: &str) -> Result<EsploraTxStatus, EsploraError> {
        self.get_tx_status(txid).await
    }

    async fn raw_transaction(&self, txid: &str) -> Result<Vec<u8>, EsploraError> {
        self.get_tx_hex(txid).await
    }

    async fn merkle_proof(&self, txid: &str) -> Result<EsploraMerkleProof, EsploraError> {
        self.get_merkle_proof(txid).await
    }

    async fn tip_height(&self) -> Result<u64, EsploraError> {
        self.get_block_height().await
    }

    async fn block_hash(&self, height: u64) -> Result<String, EsploraError> {
        self.get_block_hash(height).await
    }

    async fn block_header(&self, block_hash: &str) -> Result<Vec<u8>, EsploraError> {
        self.get_block_header(block_hash).await
    }
}

/// Transaction status
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraTxStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub block_time: Option<u64>,
}

/// Merkle proof as returned by `/tx/:txid/merkle-proof`
///
/// Siblings are hex in display (reversed) byte order.
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraMerkleProof {
    pub block_height: u64,
    pub merkle: Vec<String>,
    pub pos: u32,
}

/// Esplora error types
#[derive(Debug, thiserror::Error)]
pub enum EsploraError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Transaction not found: {0}")]
    TxNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_urls() {
        let mainnet = EsploraClient::new_mainnet();
        assert_eq!(mainnet.base_url(), MAINNET_URL);

        let testnet = EsploraClient::new_testnet();
        assert_eq!(testnet.base_url(), TESTNET_URL);

        let custom = EsploraClient::new("http://localhost:3002/");
        assert_eq!(custom.base_url(), "http://localhost:3002");
    }

    #[test]
    fn test_merkle_proof_deserialize() {
        let json = r#"{"block_height":812345,"merkle":["aa","bb"],"pos":3}"#;
        let proof: EsploraMerkleProof = serde_json::from_str(json).unwrap();
        assert_eq!(proof.block_height, 812345);
        assert_eq!(proof.merkle.len(), 2);
        assert_eq!(proof.pos, 3);
    }
}
