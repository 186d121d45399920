//! Bit-level I/O utilities.
//!
//! This module provides the bit plumbing the Hamming codec is built on:
//! - [`BitReader`] / [`BitWriter`]: stream individual bits MSB-first out of
//!   and into byte buffers
//! - [`BitBlock`]: a fixed 256-bit block with explicit get/set/flip, standing
//!   in for an arbitrary-precision integer
//!
//! # Bit Order
//! Everything is MSB-first: bit 0 of a stream (or block) is the most
//! significant bit of the first byte.
//!
//! # Padding Rules
//! - BitWriter: pads incomplete bytes with trailing zeros
//! - BitReader: ignores padding bits at the end (caller must track exact bit count)
//!
//! # Example
//! ```
//! use crawler_core::bitio::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! for bit in [true, false, true] {
//!     writer.write_bit(bit);
//! }
//! let bytes = writer.finish();
//! assert_eq!(bytes, vec![0b1010_0000]);
//!
//! let mut reader = BitReader::new(&bytes);
//! assert!(reader.read_bit().unwrap());
//! assert!(!reader.read_bit().unwrap());
//! ```

use crate::error::{BitIoError, Result};

/// Number of bits in one [`BitBlock`].
pub const BLOCK_BITS: usize = 256;

/// Number of bytes one [`BitBlock`] occupies on the wire.
pub const BLOCK_BYTES: usize = BLOCK_BITS / 8;

/// Writes bits MSB-first into a byte buffer.
///
/// # Invariants
/// - `bit_count` is always < 8
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Accumulator for the current partial byte (MSB-aligned)
    bit_buffer: u8,
    /// Number of bits in bit_buffer (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// Create a new BitWriter with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a BitWriter whose output buffer can hold `bytes` without reallocating.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.bit_buffer |= 0x80 >> self.bit_count;
        }
        self.bit_count += 1;

        if self.bit_count == 8 {
            self.bytes.push(self.bit_buffer);
            self.bit_buffer = 0;
            self.bit_count = 0;
        }
    }

    /// Finish writing and return the output bytes.
    ///
    /// Any partial byte is padded with trailing zeros. This consumes the writer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }

    /// Return the total number of bits written (including partial byte).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }
}

/// Reads bits MSB-first from a byte buffer.
///
/// # Invariants
/// - `bit_position` never exceeds `data.len() * 8`
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// Source data
    data: &'a [u8],
    /// Current bit position (0 = MSB of first byte)
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new BitReader for the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
        }
    }

    /// Read a single bit.
    ///
    /// # Errors
    /// `BitIoError::UnexpectedEof` once every bit has been consumed.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.is_empty() {
            return Err(BitIoError::UnexpectedEof.into());
        }

        let byte = self.data[self.bit_position / 8];
        let bit = byte & (0x80 >> (self.bit_position % 8)) != 0;
        self.bit_position += 1;
        Ok(bit)
    }

    /// Read a bit, yielding `false` past the end of the buffer.
    ///
    /// Used when filling the last, partially occupied Hamming block.
    pub fn read_bit_or_zero(&mut self) -> bool {
        self.read_bit().unwrap_or(false)
    }

    /// Return the number of bits remaining in the buffer.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }

    /// Check if we're at the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.bit_position >= self.data.len() * 8
    }
}

/// A fixed-size block of [`BLOCK_BITS`] bits.
///
/// Bit `p` lives in byte `p / 8` under mask `0x80 >> (p % 8)`, so the
/// serialized form reads MSB-first like the rest of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitBlock {
    bytes: [u8; BLOCK_BYTES],
}

impl BitBlock {
    /// An all-zero block.
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; BLOCK_BYTES],
        }
    }

    /// Rebuild a block from its serialized form.
    pub fn from_bytes(bytes: [u8; BLOCK_BYTES]) -> Self {
        Self { bytes }
    }

    /// Serialized form (32 bytes).
    pub fn as_bytes(&self) -> &[u8; BLOCK_BYTES] {
        &self.bytes
    }

    /// Read bit `index`.
    pub fn get(&self, index: usize) -> Result<bool> {
        let (byte, mask) = locate(index)?;
        Ok(self.bytes[byte] & mask != 0)
    }

    /// Set bit `index` to `value`.
    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        let (byte, mask) = locate(index)?;
        if value {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
        Ok(())
    }

    /// Invert bit `index`.
    pub fn flip(&mut self, index: usize) -> Result<()> {
        let (byte, mask) = locate(index)?;
        self.bytes[byte] ^= mask;
        Ok(())
    }

    /// Number of set bits in the whole block.
    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Positions of all set bits, in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..BLOCK_BITS).filter(move |&p| self.bytes[p / 8] & (0x80 >> (p % 8)) != 0)
    }
}

impl Default for BitBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

fn locate(index: usize) -> Result<(usize, u8)> {
    if index >= BLOCK_BITS {
        return Err(BitIoError::IndexOutOfRange {
            index,
            len: BLOCK_BITS,
        }
        .into());
    }
    Ok((index / 8, 0x80 >> (index % 8)))
}
