//! Sweep broadcast
//!
//! Fire-and-forget: the sweep settles once its proof is submitted, so a
//! node rejecting the broadcast is logged and the local txid returned.

use std::sync::Arc;

use super::builder::AssembledSweep;
use crate::common::logging::log_broadcast_event;
use crate::esplora::BitcoinClient;

pub struct SweepBroadcaster {
    client: Arc<dyn BitcoinClient>,
}

impl SweepBroadcaster {
    pub fn new(client: Arc<dyn BitcoinClient>) -> Self {
        Self { client }
    }

    /// Submit the sweep; always returns the locally computed txid
    pub async fn broadcast(&self, sweep: &AssembledSweep) -> String {
        let local_txid = sweep.txid_hex();

        match self.client.broadcast(&sweep.raw_hex()).await {
            Ok(reported) => {
                if reported != local_txid {
                    tracing::warn!(
                        target: "sweepbridge::assembler",
                        local = %local_txid,
                        reported = %reported,
                        "node reported a different txid"
                    );
                }
                log_broadcast_event(&local_txid, sweep.output_value, None);
            }
            Err(e) => log_broadcast_event(&local_txid, sweep.output_value, Some(&e.to_string())),
        }

        local_txid
    }
}
