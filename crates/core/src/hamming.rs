//! Extended Hamming code (SECDED) over 256-bit blocks.
//!
//! Every outgoing frame is protected before it hits the wire. A block holds
//! [`BLOCK_BITS`] bits of which [`PARITY_BITS`] are parity, leaving
//! [`DATA_BITS`] for payload:
//!
//! ```text
//! position 0              overall (extended) parity
//! positions 1,2,4,...,128 Hamming parity bits
//! every other position    data bits, in increasing position order
//! ```
//!
//! The Hamming parity bit at `2^i` covers every position whose index has
//! bit `i` set, so the XOR of the indices of all set bits (the syndrome) of
//! a valid block is zero. The overall parity bit makes the total popcount
//! even, which separates single errors (odd popcount, correctable) from
//! double errors (even popcount, non-zero syndrome, detect only).
//!
//! # Multi-block frames
//!
//! A frame is read MSB-first in groups of [`DATA_BITS`]; each group becomes
//! one 32-byte block and the final group is zero padded. Decoding therefore
//! needs the original byte length to strip that padding.

use crate::bitio::{BitBlock, BitReader, BitWriter, BLOCK_BITS, BLOCK_BYTES};
use crate::error::{HammingError, Result};
use rand::Rng;

/// Parity bits per block: `log2(BLOCK_BITS) + 1`.
pub const PARITY_BITS: usize = BLOCK_BITS.trailing_zeros() as usize + 1;

/// Payload bits carried per block.
pub const DATA_BITS: usize = BLOCK_BITS - PARITY_BITS;

/// Outcome of checking one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Syndrome zero, parity even
    Clean,
    /// A single flipped bit at this position was repaired
    Corrected(usize),
}

/// Payload recovered from a sequence of encoded blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Original bytes, padding stripped
    pub data: Vec<u8>,
    /// Number of blocks in which one bit was corrected
    pub corrected: usize,
}

/// True for the positions reserved for parity (0 and the powers of two).
pub fn is_parity_position(pos: usize) -> bool {
    pos == 0 || pos.is_power_of_two()
}

/// Number of blocks needed to carry `len` bytes.
pub fn blocks_for(len: usize) -> usize {
    (len * 8).div_ceil(DATA_BITS)
}

/// XOR of the positions of all set bits.
pub fn syndrome(block: &BitBlock) -> usize {
    block.ones().fold(0, |acc, pos| acc ^ pos)
}

/// Encode `data` into `blocks_for(data.len())` consecutive blocks.
pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    let blocks = blocks_for(data.len());
    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(blocks * BLOCK_BYTES);

    for _ in 0..blocks {
        let block = encode_block(&mut reader)?;
        out.extend_from_slice(block.as_bytes());
    }

    Ok(out)
}

/// Fill one block with the next [`DATA_BITS`] bits of `reader` and compute parity.
///
/// Bits past the end of the reader are zero.
pub fn encode_block(reader: &mut BitReader<'_>) -> Result<BitBlock> {
    let mut block = BitBlock::zeroed();

    for pos in (0..BLOCK_BITS).filter(|&p| !is_parity_position(p)) {
        block.set(pos, reader.read_bit_or_zero())?;
    }

    let parity = syndrome(&block);
    for i in 0..PARITY_BITS - 1 {
        block.set(1 << i, (parity >> i) & 1 == 1)?;
    }

    let residual = syndrome(&block);
    if residual != 0 {
        return Err(HammingError::ParityInvariant { syndrome: residual }.into());
    }

    // position 0 is still clear, so this is the parity of every other bit
    let odd = block.count_ones() % 2 == 1;
    block.set(0, odd)?;

    Ok(block)
}

/// Check and, if possible, repair one block in place.
///
/// `index` only labels the error.
pub fn decode_block(block: &mut BitBlock, index: usize) -> Result<BlockStatus> {
    let position = syndrome(block);
    let odd = block.count_ones() % 2 == 1;

    match (position, odd) {
        (0, false) => Ok(BlockStatus::Clean),
        (position, true) => {
            block.flip(position)?;
            Ok(BlockStatus::Corrected(position))
        }
        (_, false) => Err(HammingError::Uncorrectable { block: index }.into()),
    }
}

/// Decode blocks produced by [`encode`], returning the first `data_len` bytes.
///
/// # Errors
/// - `HammingError::MisalignedInput` if `encoded` is not whole blocks
/// - `HammingError::InsufficientData` if the blocks carry fewer than `data_len` bytes
/// - `HammingError::Uncorrectable` on the first block with a double error
pub fn decode(encoded: &[u8], data_len: usize) -> Result<Decoded> {
    if encoded.len() % BLOCK_BYTES != 0 {
        return Err(HammingError::MisalignedInput {
            len: encoded.len(),
            block_bytes: BLOCK_BYTES,
        }
        .into());
    }

    let blocks = encoded.len() / BLOCK_BYTES;
    let available = blocks * DATA_BITS / 8;
    if data_len > available {
        return Err(HammingError::InsufficientData {
            required: data_len,
            available,
        }
        .into());
    }

    let mut writer = BitWriter::with_capacity(available + 1);
    let mut corrected = 0;

    for (index, chunk) in encoded.chunks_exact(BLOCK_BYTES).enumerate() {
        let mut bytes = [0u8; BLOCK_BYTES];
        bytes.copy_from_slice(chunk);
        let mut block = BitBlock::from_bytes(bytes);

        if let BlockStatus::Corrected(_) = decode_block(&mut block, index)? {
            corrected += 1;
        }

        for pos in (0..BLOCK_BITS).filter(|&p| !is_parity_position(p)) {
            writer.write_bit(block.get(pos)?);
        }
    }

    let mut data = writer.finish();
    data.truncate(data_len);

    Ok(Decoded { data, corrected })
}

/// Emulate line noise on an encoded frame.
///
/// Flips 0, 1 or 2 distinct bits (weights 50/20/5) at positions `1..256`
/// of randomly chosen blocks. Must run after parity has been computed.
/// Returns the number of bits flipped.
pub fn inject_bit_errors<R: Rng + ?Sized>(encoded: &mut [u8], rng: &mut R) -> usize {
    let blocks = encoded.len() / BLOCK_BYTES;
    if blocks == 0 {
        return 0;
    }

    let count = match rng.gen_range(0..75) {
        0..=49 => 0,
        50..=69 => 1,
        _ => 2,
    };

    let mut flipped: Vec<(usize, usize)> = Vec::with_capacity(count);
    while flipped.len() < count {
        let target = (rng.gen_range(0..blocks), rng.gen_range(1..BLOCK_BITS));
        if flipped.contains(&target) {
            continue;
        }
        let (block, bit) = target;
        encoded[block * BLOCK_BYTES + bit / 8] ^= 0x80 >> (bit % 8);
        flipped.push(target);
    }

    count
}
