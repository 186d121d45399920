//! Error types for the crawler upload client.
//!
//! Codec and framing operations return structured errors rather than
//! panicking. The upload session itself never aborts an in-progress file on
//! a receiver-side problem; these errors surface only for genuinely invalid
//! input (a malformed frame handed to a decoder, an unreadable file, ...).

use thiserror::Error;

/// Top-level error type for all operations in the crate.
///
/// Each variant corresponds to a specific failure domain:
/// - Bit I/O: reading/writing bits inside a byte buffer or Hamming block
/// - Hamming: forward error correction encode/decode failures
/// - RLE: malformed run-length streams
/// - Frame: protocol header/payload parsing
/// - I/O: file system and socket operations
#[derive(Debug, Error)]
pub enum Error {
    /// Bit I/O operation failed (e.g., reading past end of buffer)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Hamming codec error (e.g., uncorrectable double error)
    #[error("hamming codec error: {0}")]
    Hamming(#[from] HammingError),

    /// Run-length codec error
    #[error("run-length codec error: {0}")]
    Rle(#[from] RleError),

    /// Protocol frame error (e.g., invalid magic, length mismatch)
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// File or socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bit-level I/O errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitIoError {
    /// Attempted to read past the end of the buffer
    #[error("unexpected end of bit stream")]
    UnexpectedEof,

    /// Bit position outside of a fixed-size block
    #[error("bit index {index} out of range for {len}-bit block")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Extended Hamming (SECDED) errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HammingError {
    /// Two (or an even number of) bit errors in one block: detected, not correctable
    #[error("uncorrectable double bit error in block {block}")]
    Uncorrectable { block: usize },

    /// Encoded input is not a whole number of blocks
    #[error("encoded length {len} is not a multiple of the {block_bytes}-byte block size")]
    MisalignedInput { len: usize, block_bytes: usize },

    /// Encoded input holds fewer data bits than the caller asked for
    #[error("encoded data too short: need {required} bytes, blocks carry {available}")]
    InsufficientData { required: usize, available: usize },

    /// Parity assignment left a non-zero syndrome; indicates an encoder bug
    #[error("parity invariant violated: residual syndrome {syndrome:#x}")]
    ParityInvariant { syndrome: usize },
}

/// Run-length codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RleError {
    /// Encoded stream ends with a value byte that has no count
    #[error("dangling value byte: encoded length {len} is odd")]
    DanglingValue { len: usize },
}

/// Protocol frame errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is too short to contain the header or command payload
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    TooShort { required: usize, actual: usize },

    /// Invalid magic number in header
    #[error("invalid magic number: expected {expected:#06x}, got {actual:#06x}")]
    InvalidMagic { expected: u16, actual: u16 },

    /// Length field does not agree with the frame size
    #[error("length mismatch: header says {expected}, frame carries {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Command tag is not one of UPLD, MODE, SEQN, DATA
    #[error("unknown command tag {0:?}")]
    UnknownCommand([u8; 4]),

    /// Payload does not fit the 16-bit length field
    #[error("payload of {len} bytes does not fit the length field")]
    PayloadTooLarge { len: usize },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
