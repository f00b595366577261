//! Spendable outputs

use bitcoin::hashes::Hash;
use bitcoin::{Transaction, TxOut};
use serde::{Deserialize, Serialize};

use super::AssemblerError;
use crate::esplora::BitcoinClient;
use crate::primitives::reverse_bytes;

/// An output the assembler may spend, with its full funding transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Internal byte order
    pub transaction_hash: [u8; 32],
    pub output_index: u32,
    pub value: u64,
    /// Serialized funding transaction
    pub raw_tx: Vec<u8>,
}

impl Utxo {
    pub fn from_transaction(tx: &Transaction, output_index: u32) -> Result<Self, AssemblerError> {
        let output = tx.output.get(output_index as usize).ok_or_else(|| {
            AssemblerError::InvalidUtxo(format!("transaction has no output {}", output_index))
        })?;

        Ok(Self {
            transaction_hash: tx.compute_txid().to_byte_array(),
            output_index,
            value: output.value.to_sat(),
            raw_tx: bitcoin::consensus::serialize(tx),
        })
    }

    /// Display-order txid
    pub fn txid_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.transaction_hash))
    }

    /// Check `raw_tx` against the claimed outpoint and value
    ///
    /// Returns the output being spent.
    pub fn verify(&self) -> Result<TxOut, AssemblerError> {
        let tx: Transaction = bitcoin::consensus::deserialize(&self.raw_tx)
            .map_err(|e| AssemblerError::InvalidUtxo(format!("undecodable transaction: {}", e)))?;

        if tx.compute_txid().to_byte_array() != self.transaction_hash {
            return Err(AssemblerError::InvalidUtxo(format!(
                "transaction does not hash to {}",
                self.txid_hex()
            )));
        }

        let output = tx
            .output
            .get(self.output_index as usize)
            .cloned()
            .ok_or_else(|| {
                AssemblerError::InvalidUtxo(format!(
                    "{} has no output {}",
                    self.txid_hex(),
                    self.output_index
                ))
            })?;

        if output.value.to_sat() != self.value {
            return Err(AssemblerError::InvalidUtxo(format!(
                "{}:{} holds {} sats, not {}",
                self.txid_hex(),
                self.output_index,
                output.value.to_sat(),
                self.value
            )));
        }

        Ok(output)
    }
}

/// Fetch a UTXO's funding transaction from a Bitcoin node
pub async fn fetch_utxo(
    client: &dyn BitcoinClient,
    txid: &str,
    output_index: u32,
) -> Result<Utxo, AssemblerError> {
    let raw = client.get_raw_transaction(txid).await?;
    let tx: Transaction = bitcoin::consensus::deserialize(&raw).map_err(|e| {
        AssemblerError::InvalidUtxo(format!("undecodable transaction {}: {}", txid, e))
    })?;

    let utxo = Utxo::from_transaction(&tx, output_index)?;
    if utxo.txid_hex() != txid.to_lowercase() {
        return Err(AssemblerError::InvalidUtxo(format!(
            "node returned {} for {}",
            utxo.txid_hex(),
            txid
        )));
    }

    Ok(utxo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esplora::{EsploraError, MockBitcoinClient};
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, Txid, Witness};

    fn payment(value: u64) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([7u8; 32]),
                    vout: 1,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::from_bytes(crate::primitives::p2wpkh_script(&[0x11; 20])),
            }],
        }
    }

    #[test]
    fn test_verify() {
        let utxo = Utxo::from_transaction(&payment(12_000), 0).unwrap();
        assert_eq!(utxo.verify().unwrap().value.to_sat(), 12_000);

        let mut wrong_value = utxo.clone();
        wrong_value.value = 12_001;
        assert!(matches!(wrong_value.verify(), Err(AssemblerError::InvalidUtxo(_))));

        let mut wrong_hash = utxo.clone();
        wrong_hash.transaction_hash[0] ^= 1;
        assert!(matches!(wrong_hash.verify(), Err(AssemblerError::InvalidUtxo(_))));

        let mut wrong_index = utxo;
        wrong_index.output_index = 1;
        assert!(matches!(wrong_index.verify(), Err(AssemblerError::InvalidUtxo(_))));

        assert!(Utxo::from_transaction(&payment(1), 3).is_err());
    }

    #[tokio::test]
    async fn test_fetch_utxo() {
        let tx = payment(17_000);
        let txid = tx.compute_txid().to_string();
        let raw = bitcoin::consensus::serialize(&tx);

        let mut client = MockBitcoinClient::new();
        client
            .expect_get_raw_transaction()
            .returning(move |_| Ok(raw.clone()));

        let utxo = fetch_utxo(&client, &txid, 0).await.unwrap();
        assert_eq!(utxo.value, 17_000);
        assert_eq!(utxo.txid_hex(), txid);

        assert!(matches!(
            fetch_utxo(&client, &"00".repeat(32), 0).await,
            Err(AssemblerError::InvalidUtxo(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_utxo_client_error() {
        let mut client = MockBitcoinClient::new();
        client
            .expect_get_raw_transaction()
            .returning(|txid| Err(EsploraError::TxNotFound(txid.to_string())));

        assert!(matches!(
            fetch_utxo(&client, "ab", 0).await,
            Err(AssemblerError::Client(EsploraError::TxNotFound(_)))
        ));
    }
}
