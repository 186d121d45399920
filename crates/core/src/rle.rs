//! Run-length compression of the FEC-encoded byte stream.
//!
//! Hamming blocks of short or sparse frames are mostly zero bytes, so the
//! protected stream is squeezed with a byte-oriented run-length pass before
//! it goes on the wire.
//!
//! # Format
//!
//! ```text
//! +-------+-------+-------+-------+-----
//! | value | count | value | count | ...
//! +-------+-------+-------+-------+-----
//! ```
//!
//! `count` is 1..=255. A run longer than 255 bytes continues in a new pair
//! with the same value.

use crate::error::{Result, RleError};

/// Longest run a single pair can describe.
pub const MAX_RUN: usize = u8::MAX as usize;

/// Collapse runs of identical bytes into (value, count) pairs.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = data.iter().copied();

    let Some(mut value) = iter.next() else {
        return out;
    };
    let mut run = 1usize;

    for byte in iter {
        if byte == value && run < MAX_RUN {
            run += 1;
        } else {
            out.push(value);
            out.push(run as u8);
            value = byte;
            run = 1;
        }
    }
    out.push(value);
    out.push(run as u8);

    out
}

/// Expand (value, count) pairs back into the flat byte sequence.
///
/// # Errors
/// `RleError::DanglingValue` if the stream has an odd length.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
    if encoded.len() % 2 != 0 {
        return Err(RleError::DanglingValue { len: encoded.len() }.into());
    }

    let total: usize = encoded.chunks_exact(2).map(|pair| pair[1] as usize).sum();
    let mut out = Vec::with_capacity(total);

    for pair in encoded.chunks_exact(2) {
        out.resize(out.len() + pair[1] as usize, pair[0]);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_runs_are_merged() {
        let encoded = encode(b"aaabccccd");
        assert_eq!(encoded, vec![b'a', 3, b'b', 1, b'c', 4, b'd', 1]);
        assert_eq!(decode(&encoded).unwrap(), b"aaabccccd");
    }

    #[test]
    fn test_zero_block_then_one_bit() {
        // 256 zero bits followed by a single set bit
        let mut data = vec![0u8; 32];
        data.push(0x01);

        let encoded = encode(&data);
        assert_eq!(encoded, vec![0x00, 32, 0x01, 1]);
        assert_eq!(encoded.len() / 2, 2);
    }

    #[test]
    fn test_long_run_is_split() {
        let data = vec![7u8; 600];
        let encoded = encode(&data);

        assert_eq!(encoded, vec![7, 255, 7, 255, 7, 90]);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_exact_max_run() {
        let data = vec![0u8; MAX_RUN];
        assert_eq!(encode(&data), vec![0, 255]);

        let data = vec![0u8; MAX_RUN + 1];
        assert_eq!(encode(&data), vec![0, 255, 0, 1]);
    }

    #[test]
    fn test_dangling_value() {
        let result = decode(&[1, 2, 3]);
        assert!(matches!(
            result,
            Err(crate::error::Error::Rle(RleError::DanglingValue { len: 3 }))
        ));
    }

    #[test]
    fn test_zero_count_pair_expands_to_nothing() {
        assert_eq!(decode(&[9, 0, 4, 2]).unwrap(), vec![4, 4]);
    }
}
