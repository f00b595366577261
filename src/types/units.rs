//! Unit Conversion Utilities
//!
//! Satoshi formatting used by log lines and config summaries.

/// Satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Convert satoshis to a fixed 8-decimal BTC string (e.g., "0.00100000")
///
/// Integer arithmetic only, so large balances never pick up float noise.
pub fn sats_to_btc_string(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Convert satoshis to human-readable string
/// e.g., 35400 -> "35,400 sats (0.00035400 BTC)"
pub fn sats_to_display(sats: u64) -> String {
    format!("{} sats ({} BTC)", group_thousands(sats), sats_to_btc_string(sats))
}

/// Parse satoshi amount from string, tolerating `,` and `_` separators
pub fn parse_sats(s: &str) -> Option<u64> {
    s.trim().replace([',', '_'], "").parse().ok()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}
