//! Protocol frame construction and parsing.
//!
//! Every datagram the crawler sends is one frame: a fixed header followed by
//! a command-specific payload. All integers are big-endian.
//!
//! # Frame Format
//!
//! ```text
//! +--------------------+
//! | magic (2)          |  0xC505
//! +--------------------+
//! | total_length (2)   |  payload length + 6 (agent id + command tag)
//! +--------------------+
//! | agent_id (2)       |  random per session
//! +--------------------+
//! | command (4)        |  "UPLD" | "MODE" | "SEQN" | "DATA"
//! +--------------------+
//! | payload            |  UPLD: UTF-8 file path
//! | (variable)         |  MODE: mode name
//! |                    |  SEQN: u16 starting sequence number
//! |                    |  DATA: upload_id (2) + sequence (2) + chunk bytes
//! +--------------------+
//! ```
//!
//! Frames of odd length get one zero byte of padding before FEC encoding;
//! the padding is not counted by `total_length`.

use crate::error::{FrameError, Result};

/// Fixed protocol identifier at offset 0.
pub const MAGIC: u16 = 0xC505;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 10;

/// Bytes counted by `total_length` on top of the payload.
pub const LENGTH_BIAS: usize = 6;

/// Raw file bytes per data frame.
pub const CHUNK_SIZE: usize = 498;

/// Bytes of a data frame payload ahead of the chunk.
const DATA_PREFIX: usize = 4;

/// The four frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Upload,
    Mode,
    Sequence,
    Data,
}

impl Command {
    /// Wire tag.
    pub fn tag(self) -> [u8; 4] {
        match self {
            Command::Upload => *b"UPLD",
            Command::Mode => *b"MODE",
            Command::Sequence => *b"SEQN",
            Command::Data => *b"DATA",
        }
    }

    /// Look up a wire tag.
    pub fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"UPLD" => Some(Command::Upload),
            b"MODE" => Some(Command::Mode),
            b"SEQN" => Some(Command::Sequence),
            b"DATA" => Some(Command::Data),
            _ => None,
        }
    }
}

/// Parsed or freshly built frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u16,
    pub total_length: u16,
    pub agent_id: u16,
    pub command: Command,
}

impl FrameHeader {
    /// Build the header for a payload of `payload_len` bytes.
    ///
    /// # Errors
    /// `FrameError::PayloadTooLarge` if the length field would overflow.
    pub fn new(command: Command, payload_len: usize, agent_id: u16) -> Result<Self> {
        let total_length = u16::try_from(payload_len + LENGTH_BIAS)
            .map_err(|_| FrameError::PayloadTooLarge { len: payload_len })?;

        Ok(Self {
            magic: MAGIC,
            total_length,
            agent_id,
            command,
        })
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.magic.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.agent_id.to_be_bytes());
        bytes[6..10].copy_from_slice(&self.command.tag());
        bytes
    }

    /// Parse the first [`HEADER_SIZE`] bytes of a frame.
    ///
    /// # Errors
    /// - `FrameError::TooShort` if fewer than 10 bytes are given
    /// - `FrameError::InvalidMagic` if the magic number doesn't match
    /// - `FrameError::UnknownCommand` for an unrecognised tag
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::TooShort {
                required: HEADER_SIZE,
                actual: bytes.len(),
            }
            .into());
        }

        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            }
            .into());
        }

        let tag = [bytes[6], bytes[7], bytes[8], bytes[9]];
        let command = Command::from_tag(tag).ok_or(FrameError::UnknownCommand(tag))?;

        Ok(Self {
            magic,
            total_length: u16::from_be_bytes([bytes[2], bytes[3]]),
            agent_id: u16::from_be_bytes([bytes[4], bytes[5]]),
            command,
        })
    }

    /// Full frame size (header + payload) this header announces.
    pub fn frame_len(&self) -> usize {
        self.total_length as usize + HEADER_SIZE - LENGTH_BIAS
    }
}

/// A logical frame, independent of agent identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Start uploading the file at `path`
    Upload { path: String },
    /// Switch the receiver's upload mode
    Mode { mode: String },
    /// Override the first sequence number
    Sequence { start: u16 },
    /// One chunk of file content; an empty chunk marks end of file
    Data {
        upload_id: u16,
        sequence: u16,
        chunk: Vec<u8>,
    },
}

impl Frame {
    /// Command tag for this frame.
    pub fn command(&self) -> Command {
        match self {
            Frame::Upload { .. } => Command::Upload,
            Frame::Mode { .. } => Command::Mode,
            Frame::Sequence { .. } => Command::Sequence,
            Frame::Data { .. } => Command::Data,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            Frame::Upload { path } => path.as_bytes().to_vec(),
            Frame::Mode { mode } => mode.as_bytes().to_vec(),
            Frame::Sequence { start } => start.to_be_bytes().to_vec(),
            Frame::Data {
                upload_id,
                sequence,
                chunk,
            } => {
                let mut payload = Vec::with_capacity(DATA_PREFIX + chunk.len());
                payload.extend_from_slice(&upload_id.to_be_bytes());
                payload.extend_from_slice(&sequence.to_be_bytes());
                payload.extend_from_slice(chunk);
                payload
            }
        }
    }

    /// Serialize header + payload for the given agent.
    pub fn serialize(&self, agent_id: u16) -> Result<Vec<u8>> {
        let payload = self.payload();
        let header = FrameHeader::new(self.command(), payload.len(), agent_id)?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + 1);
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Parse a complete frame, tolerating one trailing zero pad byte.
    ///
    /// # Errors
    /// - Header errors from [`FrameHeader::parse`]
    /// - `FrameError::LengthMismatch` if the length field disagrees with the frame
    /// - `FrameError::TooShort` if a SEQN/DATA payload is truncated
    pub fn parse(bytes: &[u8]) -> Result<(FrameHeader, Frame)> {
        let header = FrameHeader::parse(bytes)?;
        let expected = header.frame_len();

        let padded = bytes.len() == expected + 1 && bytes[expected] == 0;
        if bytes.len() != expected && !padded {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: bytes.len(),
            }
            .into());
        }

        let payload = &bytes[HEADER_SIZE..expected];
        let frame = match header.command {
            Command::Upload => Frame::Upload {
                path: String::from_utf8_lossy(payload).into_owned(),
            },
            Command::Mode => Frame::Mode {
                mode: String::from_utf8_lossy(payload).into_owned(),
            },
            Command::Sequence => {
                require(payload, 2)?;
                Frame::Sequence {
                    start: u16::from_be_bytes([payload[0], payload[1]]),
                }
            }
            Command::Data => {
                require(payload, DATA_PREFIX)?;
                Frame::Data {
                    upload_id: u16::from_be_bytes([payload[0], payload[1]]),
                    sequence: u16::from_be_bytes([payload[2], payload[3]]),
                    chunk: payload[DATA_PREFIX..].to_vec(),
                }
            }
        };

        Ok((header, frame))
    }
}

fn require(payload: &[u8], len: usize) -> Result<()> {
    if payload.len() < len {
        return Err(FrameError::TooShort {
            required: HEADER_SIZE + len,
            actual: HEADER_SIZE + payload.len(),
        }
        .into());
    }
    Ok(())
}

/// Append a zero byte if `frame` has odd length.
pub fn pad_to_even(frame: &mut Vec<u8>) {
    if frame.len() % 2 == 1 {
        frame.push(0);
    }
}
