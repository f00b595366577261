//! Bounds-checked byte readers and compact-size integers

use thiserror::Error;

/// Errors from decoding raw Bitcoin bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    #[error("malformed vector: {0}")]
    MalformedVector(String),

    #[error("read past end: need {needed} bytes at offset {offset}, have {len}")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        len: usize,
    },
}

/// Borrow `len` bytes at `offset`
pub fn read_slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], PrimitiveError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(PrimitiveError::OutOfBounds {
            offset,
            needed: len,
            len: bytes.len(),
        })
}

/// Copy a fixed-width field at `offset`
pub fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], PrimitiveError> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_slice(bytes, offset, N)?);
    Ok(out)
}

pub fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, PrimitiveError> {
    read_array::<2>(bytes, offset).map(u16::from_le_bytes)
}

pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, PrimitiveError> {
    read_array::<4>(bytes, offset).map(u32::from_le_bytes)
}

pub fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64, PrimitiveError> {
    read_array::<8>(bytes, offset).map(u64::from_le_bytes)
}

/// Decode a compact-size integer at the start of `bytes`
///
/// Returns `(prefix_length, value)`. Non-minimal encodings are accepted,
/// matching how consensus parses them.
pub fn read_compact_size(bytes: &[u8]) -> Result<(usize, u64), PrimitiveError> {
    let first = *bytes
        .first()
        .ok_or_else(|| PrimitiveError::MalformedVector("missing compact-size prefix".to_string()))?;

    let truncated =
        |_| PrimitiveError::MalformedVector("truncated compact-size integer".to_string());

    match first {
        0xfd => Ok((3, read_u16_le(bytes, 1).map_err(truncated)? as u64)),
        0xfe => Ok((5, read_u32_le(bytes, 1).map_err(truncated)? as u64)),
        0xff => Ok((9, read_u64_le(bytes, 1).map_err(truncated)?)),
        n => Ok((1, n as u64)),
    }
}

/// Minimal compact-size encoding of `n`
pub fn write_compact_size(n: u64) -> Vec<u8> {
    match n {
        0..=0xfc => vec![n as u8],
        0xfd..=0xffff => {
            let mut out = vec![0xfd];
            out.extend_from_slice(&(n as u16).to_le_bytes());
            out
        }
        0x1_0000..=0xffff_ffff => {
            let mut out = vec![0xfe];
            out.extend_from_slice(&(n as u32).to_le_bytes());
            out
        }
        _ => {
            let mut out = vec![0xff];
            out.extend_from_slice(&n.to_le_bytes());
            out
        }
    }
}

/// Flip a 32-byte hash between internal and display byte order
pub fn reverse_bytes(hash: &[u8; 32]) -> [u8; 32] {
    let mut out = *hash;
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_size_widths() {
        assert_eq!(read_compact_size(&[0x00]).unwrap(), (1, 0));
        assert_eq!(read_compact_size(&[0xfc]).unwrap(), (1, 0xfc));
        assert_eq!(read_compact_size(&[0xfd, 0xfd, 0x00]).unwrap(), (3, 0xfd));
        assert_eq!(
            read_compact_size(&[0xfe, 0x01, 0x00, 0x01, 0x00]).unwrap(),
            (5, 0x0001_0001)
        );
        assert_eq!(
            read_compact_size(&[0xff, 1, 0, 0, 0, 0, 0, 0, 1]).unwrap(),
            (9, 0x0100_0000_0000_0001)
        );
    }

    #[test]
    fn test_compact_size_truncated() {
        assert!(matches!(
            read_compact_size(&[]),
            Err(PrimitiveError::MalformedVector(_))
        ));
        assert!(matches!(
            read_compact_size(&[0xfd, 0x01]),
            Err(PrimitiveError::MalformedVector(_))
        ));
        assert!(read_compact_size(&[0xff, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_write_compact_size_is_minimal() {
        assert_eq!(write_compact_size(0xfc), vec![0xfc]);
        assert_eq!(write_compact_size(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(write_compact_size(0x1_0000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(write_compact_size(u64::MAX).len(), 9);

        for n in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            let encoded = write_compact_size(n);
            assert_eq!(read_compact_size(&encoded).unwrap(), (encoded.len(), n));
        }
    }

    #[test]
    fn test_fixed_readers_bounds() {
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(read_u32_le(&bytes, 0).unwrap(), 1);
        assert_eq!(read_u64_le(&bytes, 4).unwrap(), 2);
        assert_eq!(
            read_u64_le(&bytes, 5),
            Err(PrimitiveError::OutOfBounds {
                offset: 5,
                needed: 8,
                len: 12
            })
        );
        assert!(read_slice(&bytes, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_reverse_bytes() {
        let mut hash = [0u8; 32];
        hash[0] = 0xaa;
        let reversed = reverse_bytes(&hash);
        assert_eq!(reversed[31], 0xaa);
        assert_eq!(reverse_bytes(&reversed), hash);
    }
}
