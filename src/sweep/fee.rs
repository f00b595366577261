//! Sweep fee allocation
//!
//! The Bitcoin fee of a sweep is split evenly across the swept deposits.
//! The previous main UTXO contributes value but never pays a share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fee errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("output value {output} exceeds input value {inputs}")]
    NegativeFee { inputs: u64, output: u64 },

    #[error("fee {fee} exceeds {max_per_deposit} per deposit for {deposits} deposits")]
    FeeTooHigh {
        fee: u64,
        max_per_deposit: u64,
        deposits: usize,
    },

    #[error("deposit {index} of {amount} sats cannot cover its fee share of {charge}")]
    FeeShareExceedsDeposit { index: usize, amount: u64, charge: u64 },

    #[error("no deposits to charge")]
    NoDeposits,
}

/// What happens to `fee % deposits`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRemainderPolicy {
    /// The remainder is paid by nobody and stays on the ledger side unminted
    #[default]
    Drop,
    /// The last deposit in input order also pays the remainder
    ChargeLastDepositor,
}

impl FromStr for FeeRemainderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(FeeRemainderPolicy::Drop),
            "last" | "charge_last" | "charge-last-depositor" => {
                Ok(FeeRemainderPolicy::ChargeLastDepositor)
            }
            other => Err(format!("unknown fee remainder policy: {}", other)),
        }
    }
}

impl fmt::Display for FeeRemainderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeRemainderPolicy::Drop => f.write_str("drop"),
            FeeRemainderPolicy::ChargeLastDepositor => f.write_str("last"),
        }
    }
}

/// Per-deposit charges of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeAllocation {
    pub total_fee: u64,
    /// `total_fee / deposits`, rounded down
    pub fee_share: u64,
    /// Amount credited per deposit, in input order
    pub credits: Vec<u64>,
}

/// `inputs - output`, rejecting sweeps that create value
pub fn sweep_fee(total_inputs: u64, output: u64) -> Result<u64, FeeError> {
    total_inputs
        .checked_sub(output)
        .ok_or(FeeError::NegativeFee {
            inputs: total_inputs,
            output,
        })
}

/// Split `total_fee` over `amounts`
pub fn allocate_fee(
    total_fee: u64,
    amounts: &[u64],
    max_fee_per_deposit: Option<u64>,
    policy: FeeRemainderPolicy,
) -> Result<FeeAllocation, FeeError> {
    let deposits = amounts.len();
    if deposits == 0 {
        return Err(FeeError::NoDeposits);
    }

    if let Some(max) = max_fee_per_deposit {
        let limit = max.saturating_mul(deposits as u64);
        if total_fee > limit {
            return Err(FeeError::FeeTooHigh {
                fee: total_fee,
                max_per_deposit: max,
                deposits,
            });
        }
    }

    let fee_share = total_fee / deposits as u64;
    let remainder = total_fee % deposits as u64;

    let credits = amounts
        .iter()
        .enumerate()
        .map(|(index, &amount)| {
            let charge = match policy {
                FeeRemainderPolicy::ChargeLastDepositor if index == deposits - 1 => {
                    fee_share + remainder
                }
                _ => fee_share,
            };
            amount
                .checked_sub(charge)
                .ok_or(FeeError::FeeShareExceedsDeposit { index, amount, charge })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeeAllocation {
        total_fee,
        fee_share,
        credits,
    })
}
