//! Bitcoin Primitives
//!
//! Pure functions over raw Bitcoin bytes:
//! - Compact-size integers and bounds-checked fixed-width readers
//! - Input/output vector parsing
//! - Script templates and classification
//! - SHA256, double-SHA256 and HASH160

pub mod encoding;
pub mod hash;
pub mod script;
pub mod vectors;

// Re-exports for convenience
pub use encoding::{read_compact_size, reverse_bytes, write_compact_size, PrimitiveError};
pub use hash::{double_sha256, double_sha256_pair, hash160, sha256};
pub use script::{
    classify_script, deposit_script, p2pkh_script, p2sh_script, p2wpkh_script, p2wsh_script,
    ScriptKind,
};
pub use vectors::{
    extract_input_at, extract_output_at, input_outpoint, output_script, output_value,
    parse_vector_prefix, split_inputs, split_outputs, validate_input_vector,
    validate_output_vector,
};
