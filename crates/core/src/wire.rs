//! The datagram pipeline between a frame and the wire.
//!
//! ```text
//! frame -> pad to even length -> Hamming encode -> line noise -> RLE -> datagram
//! ```
//!
//! Each stage after padding can be switched off. [`WireCodec::decode`] runs
//! the pipeline backwards the way a receiver would; it recovers the frame
//! length from the first protected bytes of the header.

use crate::bitio::BLOCK_BYTES;
use crate::error::{FrameError, Result};
use crate::fault::FaultInjector;
use crate::frame::{pad_to_even, FrameHeader, HEADER_SIZE, LENGTH_BIAS};
use crate::{hamming, rle};

/// Bytes of header needed to learn the frame length.
const LENGTH_PREFIX: usize = 4;

/// A datagram ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub datagram: Vec<u8>,
    /// Bits flipped by line-noise injection
    pub bit_errors: usize,
}

/// A frame recovered from a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    /// Frame bytes including any zero pad byte
    pub frame: Vec<u8>,
    /// Hamming blocks that needed a single-bit repair
    pub corrected: usize,
}

/// Which pipeline stages are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCodec {
    pub fec: bool,
    pub compression: bool,
}

impl WireCodec {
    pub fn new(fec: bool, compression: bool) -> Self {
        Self { fec, compression }
    }

    /// Turn an unencoded frame into a datagram.
    ///
    /// Line noise, when the injector has it enabled, is applied strictly
    /// after parity has been computed.
    pub fn encode(&self, frame: &[u8], faults: &mut FaultInjector) -> Result<Encoded> {
        let mut bytes = frame.to_vec();
        pad_to_even(&mut bytes);

        let mut bit_errors = 0;
        if self.fec {
            bytes = hamming::encode(&bytes)?;
            bit_errors = faults.corrupt(&mut bytes);
        }

        if self.compression {
            bytes = rle::encode(&bytes);
        }

        Ok(Encoded {
            datagram: bytes,
            bit_errors,
        })
    }

    /// Recover the frame bytes from a datagram.
    ///
    /// # Errors
    /// - `RleError::DanglingValue` for a truncated run-length stream
    /// - `HammingError::Uncorrectable` when a block has a double error
    /// - `FrameError::TooShort` if not even the length field survives
    pub fn decode(&self, datagram: &[u8]) -> Result<Recovered> {
        let bytes = if self.compression {
            rle::decode(datagram)?
        } else {
            datagram.to_vec()
        };

        if !self.fec {
            return Ok(Recovered {
                frame: bytes,
                corrected: 0,
            });
        }

        let frame_len = frame_length(&bytes)?;
        let padded_len = frame_len + frame_len % 2;
        let decoded = hamming::decode(&bytes, padded_len)?;

        Ok(Recovered {
            frame: decoded.data,
            corrected: decoded.corrected,
        })
    }

    /// Decode a datagram all the way to its header.
    pub fn decode_header(&self, datagram: &[u8]) -> Result<FrameHeader> {
        let recovered = self.decode(datagram)?;
        FrameHeader::parse(&recovered.frame)
    }
}

/// Frame length announced by the header, read from the first Hamming block.
fn frame_length(encoded: &[u8]) -> Result<usize> {
    let first = &encoded[..encoded.len().min(BLOCK_BYTES)];
    let prefix = hamming::decode(first, LENGTH_PREFIX)?;
    let total_length = u16::from_be_bytes([prefix.data[2], prefix.data[3]]) as usize;

    let frame_len = total_length + HEADER_SIZE - LENGTH_BIAS;
    if frame_len < HEADER_SIZE {
        return Err(FrameError::TooShort {
            required: HEADER_SIZE,
            actual: frame_len,
        }
        .into());
    }
    Ok(frame_len)
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(true, true)
    }
}
