//! Sweep Transaction Builder
//!
//! Validates every UTXO against the deposit parameters, lays out the
//! inputs, computes all sighashes and then fills in scriptSigs and
//! witnesses.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::{self, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use super::signer::SweepSigner;
use super::utxo::Utxo;
use super::AssemblerError;
use crate::primitives::script::{classify_script, p2pkh_script, p2wpkh_script, ScriptKind};
use crate::primitives::{hash160, reverse_bytes, sha256};
use crate::types::deposit::DepositParams;
use crate::types::sweep::BitcoinTxInfo;

/// How one input is unlocked
#[derive(Debug, Clone)]
enum Spend {
    /// Wallet P2PKH output; carries the previous locking script
    P2pkh(ScriptBuf),
    /// Wallet P2WPKH output; carries the previous locking script
    P2wpkh(ScriptBuf),
    /// Deposit behind P2SH; carries the redeem script
    P2sh(ScriptBuf),
    /// Deposit behind P2WSH; carries the witness script
    P2wsh(ScriptBuf),
}

struct PlannedInput {
    outpoint: OutPoint,
    value: u64,
    spend: Spend,
}

/// A signed sweep ready for broadcast
#[derive(Debug, Clone)]
pub struct AssembledSweep {
    pub transaction: Transaction,
    /// Full serialization, witnesses included
    pub raw: Vec<u8>,
    /// Internal byte order
    pub txid: [u8; 32],
    pub output_value: u64,
    /// Legacy view the sweep processor verifies
    pub tx_info: BitcoinTxInfo,
}

impl AssembledSweep {
    /// Display-order txid
    pub fn txid_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.txid))
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Sweep transaction builder
#[derive(Debug, Clone, Copy)]
pub struct SweepAssembler {
    witness_output: bool,
}

impl SweepAssembler {
    /// `witness_output` selects a P2WPKH sweep output instead of P2PKH
    pub fn new(witness_output: bool) -> Self {
        Self { witness_output }
    }

    pub fn witness_output(&self) -> bool {
        self.witness_output
    }

    /// Build and sign a sweep
    ///
    /// `utxos[i]` must be the funding output described by `deposits[i]`.
    pub fn assemble(
        &self,
        fee: u64,
        signer: &dyn SweepSigner,
        utxos: &[Utxo],
        deposits: &[DepositParams],
        main_utxo: Option<&Utxo>,
    ) -> Result<AssembledSweep, AssemblerError> {
        if deposits.is_empty() || utxos.len() != deposits.len() {
            return Err(AssemblerError::EmptyOrMismatchedInputSet {
                utxos: utxos.len(),
                deposits: deposits.len(),
            });
        }

        let wallet_public_key = signer.public_key();
        let wallet_pub_key_hash = signer.pub_key_hash();

        let mut planned = Vec::with_capacity(utxos.len() + 1);

        if let Some(main) = main_utxo {
            let prev = main.verify()?;
            let spend = match classify_script(prev.script_pubkey.as_bytes()) {
                ScriptKind::P2pkh(hash) if hash == wallet_pub_key_hash => {
                    Spend::P2pkh(prev.script_pubkey)
                }
                ScriptKind::P2wpkh(hash) if hash == wallet_pub_key_hash => {
                    Spend::P2wpkh(prev.script_pubkey)
                }
                _ => return Err(AssemblerError::UtxoNotOwnedByWallet),
            };
            planned.push(planned_input(main, spend));
        }

        for (index, (utxo, params)) in utxos.iter().zip(deposits).enumerate() {
            let prev = utxo.verify()?;

            if utxo.value != params.amount {
                return Err(AssemblerError::AmountMismatch {
                    index,
                    utxo: utxo.value,
                    expected: params.amount,
                });
            }
            if params.wallet_pub_key_hash != wallet_pub_key_hash {
                return Err(AssemblerError::WalletKeyMismatch { index });
            }

            let deposit_script = params.script_params().script();
            let spend = match classify_script(prev.script_pubkey.as_bytes()) {
                ScriptKind::P2sh(hash) if hash == hash160(&deposit_script) => {
                    Spend::P2sh(ScriptBuf::from_bytes(deposit_script))
                }
                ScriptKind::P2wsh(hash) if hash == sha256(&deposit_script) => {
                    Spend::P2wsh(ScriptBuf::from_bytes(deposit_script))
                }
                ScriptKind::P2sh(_) | ScriptKind::P2wsh(_) => {
                    return Err(AssemblerError::DepositScriptMismatch { index })
                }
                _ => return Err(AssemblerError::UnsupportedDepositScript { index }),
            };
            planned.push(planned_input(utxo, spend));
        }

        let total_inputs = planned
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value))
            .ok_or_else(|| AssemblerError::InvalidUtxo("input value overflows".to_string()))?;
        let output_value = total_inputs
            .checked_sub(fee)
            .ok_or(AssemblerError::FeeExceedsInputs {
                fee,
                inputs: total_inputs,
            })?;

        let output_script = if self.witness_output {
            p2wpkh_script(&wallet_pub_key_hash)
        } else {
            p2pkh_script(&wallet_pub_key_hash)
        };

        let mut tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: planned
                .iter()
                .map(|input| TxIn {
                    previous_output: input.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(output_value),
                script_pubkey: ScriptBuf::from_bytes(output_script),
            }],
        };

        let digests = sighashes(&tx, &planned)?;

        let pubkey_bytes = wallet_public_key.to_bytes();
        for (index, (input, digest)) in planned.iter().zip(digests).enumerate() {
            let signature = bitcoin::ecdsa::Signature {
                signature: signer.sign_digest(digest)?,
                sighash_type: EcdsaSighashType::All,
            }
            .to_vec();

            let txin = &mut tx.input[index];
            match &input.spend {
                Spend::P2pkh(_) => {
                    txin.script_sig = script_sig(&[signature, pubkey_bytes.clone()])?;
                }
                Spend::P2sh(redeem_script) => {
                    txin.script_sig =
                        script_sig(&[signature, pubkey_bytes.clone(), redeem_script.to_bytes()])?;
                }
                Spend::P2wpkh(_) => {
                    txin.witness = Witness::from_slice(&[signature, pubkey_bytes.clone()]);
                }
                Spend::P2wsh(witness_script) => {
                    txin.witness = Witness::from_slice(&[
                        signature,
                        pubkey_bytes.clone(),
                        witness_script.to_bytes(),
                    ]);
                }
            }
        }

        let txid = tx.compute_txid().to_byte_array();
        let sweep = AssembledSweep {
            raw: bitcoin::consensus::serialize(&tx),
            txid,
            output_value,
            tx_info: BitcoinTxInfo::from_transaction(&tx),
            transaction: tx,
        };

        tracing::info!(
            target: "sweepbridge::assembler",
            txid = %sweep.txid_hex(),
            inputs = planned.len(),
            output_value,
            fee,
            "sweep assembled"
        );

        Ok(sweep)
    }
}

fn planned_input(utxo: &Utxo, spend: Spend) -> PlannedInput {
    PlannedInput {
        outpoint: OutPoint {
            txid: Txid::from_byte_array(utxo.transaction_hash),
            vout: utxo.output_index,
        },
        value: utxo.value,
        spend,
    }
}

/// SIGHASH_ALL digest of every input, computed before any input is signed
fn sighashes(tx: &Transaction, planned: &[PlannedInput]) -> Result<Vec<[u8; 32]>, AssemblerError> {
    let mut cache = SighashCache::new(tx);

    planned
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let amount = Amount::from_sat(input.value);
            let digest = match &input.spend {
                Spend::P2pkh(script) | Spend::P2sh(script) => cache
                    .legacy_signature_hash(index, script, EcdsaSighashType::All.to_u32())
                    .map_err(signing_error)?
                    .to_byte_array(),
                Spend::P2wpkh(script) => cache
                    .p2wpkh_signature_hash(index, script, amount, EcdsaSighashType::All)
                    .map_err(signing_error)?
                    .to_byte_array(),
                Spend::P2wsh(script) => cache
                    .p2wsh_signature_hash(index, script, amount, EcdsaSighashType::All)
                    .map_err(signing_error)?
                    .to_byte_array(),
            };
            Ok::<_, AssemblerError>(digest)
        })
        .collect()
}

fn signing_error(e: impl std::fmt::Display) -> AssemblerError {
    AssemblerError::Signing(e.to_string())
}

fn script_sig(pushes: &[Vec<u8>]) -> Result<ScriptBuf, AssemblerError> {
    let mut builder = script::Builder::new();
    for data in pushes {
        let push = PushBytesBuf::try_from(data.clone())
            .map_err(|e| AssemblerError::Signing(format!("push too large: {}", e)))?;
        builder = builder.push_slice(push);
    }
    Ok(builder.into_script())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assembler::signer::WalletSigner;
    use crate::primitives::script::{p2sh_script, p2wsh_script};
    use crate::types::deposit::LedgerAddress;
    use secp256k1::{Message, SECP256K1};

    pub(crate) fn deposit_params(
        signer: &WalletSigner,
        amount: u64,
        depositor: u8,
    ) -> DepositParams {
        DepositParams {
            amount,
            depositor: LedgerAddress([depositor; 20]),
            blinding_factor: [depositor, 0xf0, 0xc9, 0x0d, 0x00, 0x03, 0x95, 0x23],
            wallet_pub_key_hash: signer.pub_key_hash(),
            refund_pub_key_hash: [0x28; 20],
            refund_locktime: [0x60, 0xbc, 0xea, 0x61],
        }
    }

    /// Funding transaction paying `script_pubkey` at output 0
    pub(crate) fn funding(value: u64, script_pubkey: Vec<u8>, salt: u8) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([salt; 32]),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::from_bytes(script_pubkey),
            }],
        }
    }

    pub(crate) fn deposit_utxo(params: &DepositParams, witness: bool) -> Utxo {
        let script = params.script_params().script();
        let locking = if witness {
            p2wsh_script(&sha256(&script))
        } else {
            p2sh_script(&hash160(&script))
        };
        Utxo::from_transaction(&funding(params.amount, locking, params.depositor.0[0]), 0).unwrap()
    }

    fn scenario_a(signer: &WalletSigner) -> (Vec<Utxo>, Vec<DepositParams>) {
        let deposits = vec![
            deposit_params(signer, 25_000, 0x01),
            deposit_params(signer, 12_000, 0x02),
        ];
        let utxos = vec![deposit_utxo(&deposits[0], false), deposit_utxo(&deposits[1], true)];
        (utxos, deposits)
    }

    const ALL: EcdsaSighashType = EcdsaSighashType::All;

    fn assert_signed(sweep: &AssembledSweep, signer: &WalletSigner, prevouts: &[(Spend, u64)]) {
        let mut cache = SighashCache::new(&sweep.transaction);
        for (index, (spend, value)) in prevouts.iter().enumerate() {
            let input = &sweep.transaction.input[index];
            let (sig_bytes, digest) = match spend {
                Spend::P2pkh(s) | Spend::P2sh(s) => {
                    let first = input.script_sig.instructions().next().unwrap().unwrap();
                    let sig = first.push_bytes().unwrap().as_bytes().to_vec();
                    let digest = cache
                        .legacy_signature_hash(index, s, EcdsaSighashType::All.to_u32())
                        .unwrap()
                        .to_byte_array();
                    (sig, digest)
                }
                Spend::P2wpkh(s) => (
                    input.witness.nth(0).unwrap().to_vec(),
                    cache
                        .p2wpkh_signature_hash(index, s, Amount::from_sat(*value), ALL)
                        .unwrap()
                        .to_byte_array(),
                ),
                Spend::P2wsh(s) => (
                    input.witness.nth(0).unwrap().to_vec(),
                    cache
                        .p2wsh_signature_hash(index, s, Amount::from_sat(*value), ALL)
                        .unwrap()
                        .to_byte_array(),
                ),
            };

            let sig = bitcoin::ecdsa::Signature::from_slice(&sig_bytes).unwrap();
            assert_eq!(sig.sighash_type, EcdsaSighashType::All);
            let message = Message::from_digest(digest);
            SECP256K1
                .verify_ecdsa(&message, &sig.signature, &signer.public_key().inner)
                .unwrap();
        }
    }

    #[test]
    fn test_scenario_a_two_deposits() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let (utxos, deposits) = scenario_a(&signer);

        let sweep = SweepAssembler::new(true)
            .assemble(1_600, &signer, &utxos, &deposits, None)
            .unwrap();
        let tx = &sweep.transaction;

        assert_eq!(sweep.output_value, 35_400);
        assert_eq!(tx.version, Version::ONE);
        assert_eq!(tx.lock_time, LockTime::ZERO);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(
            tx.output[0].script_pubkey.as_bytes(),
            &p2wpkh_script(&signer.pub_key_hash())[..]
        );

        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.input[0].previous_output.txid.to_byte_array(), utxos[0].transaction_hash);
        assert_eq!(tx.input[1].previous_output.txid.to_byte_array(), utxos[1].transaction_hash);
        assert!(tx.input.iter().all(|i| i.sequence == Sequence::MAX));

        // P2SH: sig, pubkey, redeem script; no witness
        assert_eq!(tx.input[0].script_sig.instructions().count(), 3);
        assert!(tx.input[0].witness.is_empty());
        // P2WSH: empty scriptSig, three witness items
        assert!(tx.input[1].script_sig.is_empty());
        assert_eq!(tx.input[1].witness.len(), 3);
        assert_eq!(
            tx.input[1].witness.nth(2).unwrap(),
            &deposits[1].script_params().script()[..]
        );

        assert_eq!(sweep.tx_info.hash(), sweep.txid);
        assert_signed(
            &sweep,
            &signer,
            &[
                (Spend::P2sh(ScriptBuf::from_bytes(deposits[0].script_params().script())), 25_000),
                (Spend::P2wsh(ScriptBuf::from_bytes(deposits[1].script_params().script())), 12_000),
            ],
        );
    }

    #[test]
    fn test_scenario_b_with_main_utxo() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let (utxos, deposits) = scenario_a(&signer);
        let first = SweepAssembler::new(true)
            .assemble(1_600, &signer, &utxos, &deposits, None)
            .unwrap();
        let main = Utxo::from_transaction(&first.transaction, 0).unwrap();
        assert_eq!(main.value, 35_400);

        let next = vec![
            deposit_params(&signer, 17_000, 0x03),
            deposit_params(&signer, 10_000, 0x04),
        ];
        let next_utxos = vec![deposit_utxo(&next[0], true), deposit_utxo(&next[1], false)];

        let sweep = SweepAssembler::new(false)
            .assemble(1_600, &signer, &next_utxos, &next, Some(&main))
            .unwrap();
        let tx = &sweep.transaction;

        assert_eq!(sweep.output_value, 60_800);
        assert_eq!(
            tx.output[0].script_pubkey.as_bytes(),
            &p2pkh_script(&signer.pub_key_hash())[..]
        );

        let spent: Vec<[u8; 32]> = tx
            .input
            .iter()
            .map(|i| i.previous_output.txid.to_byte_array())
            .collect();
        assert_eq!(
            spent,
            vec![
                main.transaction_hash,
                next_utxos[0].transaction_hash,
                next_utxos[1].transaction_hash
            ]
        );
        assert_eq!(tx.input[0].previous_output.vout, 0);

        // Main UTXO is P2WPKH: [sig, pubkey]
        let pkh = signer.pub_key_hash();
        assert_eq!(tx.input[0].witness.len(), 2);
        assert!(tx.input[0].script_sig.is_empty());

        assert_signed(
            &sweep,
            &signer,
            &[
                (Spend::P2wpkh(ScriptBuf::from_bytes(p2wpkh_script(&pkh))), 35_400),
                (Spend::P2wsh(ScriptBuf::from_bytes(next[0].script_params().script())), 17_000),
                (Spend::P2sh(ScriptBuf::from_bytes(next[1].script_params().script())), 10_000),
            ],
        );
    }

    #[test]
    fn test_p2pkh_main_utxo() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let pkh = signer.pub_key_hash();
        let main = Utxo::from_transaction(&funding(50_000, p2pkh_script(&pkh), 0x70), 0).unwrap();
        let deposits = vec![deposit_params(&signer, 10_000, 0x05)];
        let utxos = vec![deposit_utxo(&deposits[0], true)];

        let sweep = SweepAssembler::new(true)
            .assemble(1_000, &signer, &utxos, &deposits, Some(&main))
            .unwrap();
        assert_eq!(sweep.output_value, 59_000);
        assert_eq!(sweep.transaction.input[0].script_sig.instructions().count(), 2);
        assert_signed(
            &sweep,
            &signer,
            &[
                (Spend::P2pkh(ScriptBuf::from_bytes(p2pkh_script(&pkh))), 50_000),
                (Spend::P2wsh(ScriptBuf::from_bytes(deposits[0].script_params().script())), 10_000),
            ],
        );
    }

    #[test]
    fn test_input_set_mismatch() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let (utxos, deposits) = scenario_a(&signer);
        let assembler = SweepAssembler::new(true);

        assert!(matches!(
            assembler.assemble(1_600, &signer, &utxos[..1], &deposits, None),
            Err(AssemblerError::EmptyOrMismatchedInputSet { utxos: 1, deposits: 2 })
        ));
        assert!(matches!(
            assembler.assemble(1_600, &signer, &[], &[], None),
            Err(AssemblerError::EmptyOrMismatchedInputSet { utxos: 0, deposits: 0 })
        ));
    }

    #[test]
    fn test_main_utxo_not_owned() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let (utxos, deposits) = scenario_a(&signer);
        let foreign_tx = funding(35_400, p2wpkh_script(&[0x01; 20]), 0x71);
        let foreign = Utxo::from_transaction(&foreign_tx, 0).unwrap();

        assert!(matches!(
            SweepAssembler::new(true).assemble(1_600, &signer, &utxos, &deposits, Some(&foreign)),
            Err(AssemblerError::UtxoNotOwnedByWallet)
        ));
    }

    #[test]
    fn test_deposit_checks() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let assembler = SweepAssembler::new(true);
        let (utxos, deposits) = scenario_a(&signer);

        let mut wrong_amount = deposits.clone();
        wrong_amount[1].amount = 12_001;
        assert!(matches!(
            assembler.assemble(1_600, &signer, &utxos, &wrong_amount, None),
            Err(AssemblerError::AmountMismatch { index: 1, utxo: 12_000, expected: 12_001 })
        ));

        let other = WalletSigner::from_bytes(&[0x22; 32]).unwrap();
        assert!(matches!(
            assembler.assemble(1_600, &other, &utxos, &deposits, None),
            Err(AssemblerError::WalletKeyMismatch { index: 0 })
        ));

        let mut tampered = deposits.clone();
        tampered[0].blinding_factor[7] ^= 1;
        assert!(matches!(
            assembler.assemble(1_600, &signer, &utxos, &tampered, None),
            Err(AssemblerError::DepositScriptMismatch { index: 0 })
        ));

        let plain_tx = funding(25_000, p2wpkh_script(&signer.pub_key_hash()), 0x72);
        let plain = Utxo::from_transaction(&plain_tx, 0).unwrap();
        assert!(matches!(
            assembler.assemble(1_600, &signer, &[plain, utxos[1].clone()], &deposits, None),
            Err(AssemblerError::UnsupportedDepositScript { index: 0 })
        ));

        assert!(matches!(
            assembler.assemble(37_001, &signer, &utxos, &deposits, None),
            Err(AssemblerError::FeeExceedsInputs { fee: 37_001, inputs: 37_000 })
        ));
        assert_eq!(
            assembler.assemble(37_000, &signer, &utxos, &deposits, None).unwrap().output_value,
            0
        );
    }

    #[test]
    fn test_invalid_utxo_rejected() {
        let signer = WalletSigner::from_bytes(&[0x11; 32]).unwrap();
        let (mut utxos, deposits) = scenario_a(&signer);
        utxos[0].raw_tx.truncate(10);

        assert!(matches!(
            SweepAssembler::new(true).assemble(1_600, &signer, &utxos, &deposits, None),
            Err(AssemblerError::InvalidUtxo(_))
        ));
    }
}
