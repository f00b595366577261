//! Transaction input and output vector parsing
//!
//! A vector is a compact-size element count followed by the serialized
//! elements, exactly as they appear inside a legacy transaction.
//!
//! Input: `txid (32) ‖ index (4) ‖ script_len (var) ‖ script ‖ sequence (4)`
//! Output: `value (8) ‖ script_len (var) ‖ script`

use super::encoding::{
    read_array, read_compact_size, read_slice, read_u32_le, read_u64_le, PrimitiveError,
};

/// Read the element count prefix: `(prefix_length, element_count)`
pub fn parse_vector_prefix(vector: &[u8]) -> Result<(usize, u64), PrimitiveError> {
    read_compact_size(vector)
}

fn var_field_end(bytes: &[u8], offset: usize) -> Result<usize, PrimitiveError> {
    let rest = bytes.get(offset..).unwrap_or_default();
    let (prefix, len) = read_compact_size(rest)?;
    let len = usize::try_from(len)
        .map_err(|_| PrimitiveError::MalformedVector("script length overflows".to_string()))?;
    offset
        .checked_add(prefix)
        .and_then(|o| o.checked_add(len))
        .ok_or_else(|| PrimitiveError::MalformedVector("script length overflows".to_string()))
}

/// Length of the input starting at `offset`
fn input_length(vector: &[u8], offset: usize) -> Result<usize, PrimitiveError> {
    let script_end = var_field_end(vector, offset + 36)?;
    let end = script_end
        .checked_add(4)
        .ok_or_else(|| PrimitiveError::MalformedVector("input length overflows".to_string()))?;
    if end > vector.len() {
        return Err(PrimitiveError::MalformedVector(format!(
            "input at offset {} runs past end of vector",
            offset
        )));
    }
    Ok(end - offset)
}

/// Length of the output starting at `offset`
fn output_length(vector: &[u8], offset: usize) -> Result<usize, PrimitiveError> {
    let end = var_field_end(vector, offset + 8)?;
    if end > vector.len() {
        return Err(PrimitiveError::MalformedVector(format!(
            "output at offset {} runs past end of vector",
            offset
        )));
    }
    Ok(end - offset)
}

fn split_vector<'a>(
    vector: &'a [u8],
    kind: &str,
    element_length: fn(&[u8], usize) -> Result<usize, PrimitiveError>,
) -> Result<Vec<&'a [u8]>, PrimitiveError> {
    let (prefix, count) = parse_vector_prefix(vector)?;
    if count == 0 {
        return Err(PrimitiveError::MalformedVector(format!("{} vector is empty", kind)));
    }

    let mut elements = Vec::new();
    let mut offset = prefix;
    for _ in 0..count {
        if offset >= vector.len() {
            return Err(PrimitiveError::MalformedVector(format!(
                "{} vector declares {} elements but holds {}",
                kind,
                count,
                elements.len()
            )));
        }
        let len = element_length(vector, offset)?;
        elements.push(&vector[offset..offset + len]);
        offset += len;
    }

    if offset != vector.len() {
        return Err(PrimitiveError::MalformedVector(format!(
            "{} vector has {} trailing bytes",
            kind,
            vector.len() - offset
        )));
    }

    Ok(elements)
}

/// Split a validated input vector into its inputs
pub fn split_inputs(vector: &[u8]) -> Result<Vec<&[u8]>, PrimitiveError> {
    split_vector(vector, "input", input_length)
}

/// Split a validated output vector into its outputs
pub fn split_outputs(vector: &[u8]) -> Result<Vec<&[u8]>, PrimitiveError> {
    split_vector(vector, "output", output_length)
}

/// Check the count is non-zero and the inputs end exactly at the vector's end
pub fn validate_input_vector(vector: &[u8]) -> Result<usize, PrimitiveError> {
    split_inputs(vector).map(|inputs| inputs.len())
}

/// Check the count is non-zero and the outputs end exactly at the vector's end
pub fn validate_output_vector(vector: &[u8]) -> Result<usize, PrimitiveError> {
    split_outputs(vector).map(|outputs| outputs.len())
}

/// The `index`th input
pub fn extract_input_at(vector: &[u8], index: usize) -> Result<&[u8], PrimitiveError> {
    let inputs = split_inputs(vector)?;
    let count = inputs.len();
    inputs.into_iter().nth(index).ok_or_else(|| {
        PrimitiveError::MalformedVector(format!("input {} out of range ({} inputs)", index, count))
    })
}

/// The `index`th output
pub fn extract_output_at(vector: &[u8], index: usize) -> Result<&[u8], PrimitiveError> {
    let outputs = split_outputs(vector)?;
    let count = outputs.len();
    outputs.into_iter().nth(index).ok_or_else(|| {
        PrimitiveError::MalformedVector(format!(
            "output {} out of range ({} outputs)",
            index, count
        ))
    })
}

/// Spent outpoint of an input: `(tx_hash in internal order, output index)`
pub fn input_outpoint(input: &[u8]) -> Result<([u8; 32], u32), PrimitiveError> {
    Ok((read_array::<32>(input, 0)?, read_u32_le(input, 32)?))
}

pub fn output_value(output: &[u8]) -> Result<u64, PrimitiveError> {
    read_u64_le(output, 0)
}

/// Locking script of an output, without its length prefix
pub fn output_script(output: &[u8]) -> Result<&[u8], PrimitiveError> {
    let rest = output.get(8..).unwrap_or_default();
    let (prefix, len) = read_compact_size(rest)?;
    let len = usize::try_from(len)
        .map_err(|_| PrimitiveError::MalformedVector("script length overflows".to_string()))?;
    read_slice(output, 8 + prefix, len)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::primitives::encoding::write_compact_size;

    pub(crate) fn input(txid: [u8; 32], index: u32, script: &[u8]) -> Vec<u8> {
        let mut out = txid.to_vec();
        out.extend_from_slice(&index.to_le_bytes());
        out.extend(write_compact_size(script.len() as u64));
        out.extend_from_slice(script);
        out.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        out
    }

    pub(crate) fn output(value: u64, script: &[u8]) -> Vec<u8> {
        let mut out = value.to_le_bytes().to_vec();
        out.extend(write_compact_size(script.len() as u64));
        out.extend_from_slice(script);
        out
    }

    pub(crate) fn vector(elements: &[Vec<u8>]) -> Vec<u8> {
        let mut out = write_compact_size(elements.len() as u64);
        for e in elements {
            out.extend_from_slice(e);
        }
        out
    }

    #[test]
    fn test_split_inputs() {
        let a = input([1u8; 32], 0, &[]);
        let b = input([2u8; 32], 7, &[0xaa; 107]);
        let vin = vector(&[a.clone(), b.clone()]);

        assert_eq!(validate_input_vector(&vin).unwrap(), 2);
        assert_eq!(extract_input_at(&vin, 0).unwrap(), &a[..]);
        assert_eq!(extract_input_at(&vin, 1).unwrap(), &b[..]);
        assert!(extract_input_at(&vin, 2).is_err());

        assert_eq!(input_outpoint(&b).unwrap(), ([2u8; 32], 7));
    }

    #[test]
    fn test_split_outputs() {
        let a = output(35_400, &[0x00, 0x14, 0x11]);
        let b = output(1, &[0x6a; 300]);
        let vout = vector(&[a.clone(), b.clone()]);

        assert_eq!(validate_output_vector(&vout).unwrap(), 2);
        let second = extract_output_at(&vout, 1).unwrap();
        assert_eq!(output_value(second).unwrap(), 1);
        assert_eq!(output_script(second).unwrap().len(), 300);
        assert_eq!(output_script(&a).unwrap(), &[0x00, 0x14, 0x11]);
    }

    #[test]
    fn test_empty_vector_rejected() {
        assert!(matches!(
            validate_input_vector(&[0x00]),
            Err(PrimitiveError::MalformedVector(_))
        ));
        assert!(validate_output_vector(&[]).is_err());
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let a = output(10, &[0x51]);
        let mut vout = vector(&[a.clone()]);
        vout[0] = 2;
        assert!(validate_output_vector(&vout).is_err());

        let mut trailing = vector(&[a]);
        trailing.push(0x00);
        assert!(validate_output_vector(&trailing).is_err());
    }

    #[test]
    fn test_truncated_script_rejected() {
        let mut vin = vector(&[input([1u8; 32], 0, &[0x51; 10])]);
        vin.truncate(vin.len() - 6);
        assert!(validate_input_vector(&vin).is_err());

        assert!(output_script(&[0u8; 8]).is_err());
        assert!(output_value(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_huge_script_length_rejected() {
        // Declared script length ends the input exactly at usize::MAX
        let mut vin = vec![0x01];
        vin.extend_from_slice(&[0x11; 32]);
        vin.extend_from_slice(&0u32.to_le_bytes());
        vin.push(0xff);
        vin.extend_from_slice(&((usize::MAX - 46) as u64).to_le_bytes());

        assert!(matches!(
            validate_input_vector(&vin),
            Err(PrimitiveError::MalformedVector(_))
        ));

        let mut vout = vec![0x01];
        vout.extend_from_slice(&0u64.to_le_bytes());
        vout.push(0xff);
        vout.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            validate_output_vector(&vout),
            Err(PrimitiveError::MalformedVector(_))
        ));
    }
}
