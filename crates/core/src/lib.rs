//! crawler-core: FEC-protected file upload over an unreliable datagram link
//!
//! This library provides the client side of a small upload protocol that:
//! - Frames file chunks behind a fixed binary header
//! - Protects every frame with an Extended Hamming (SECDED) code on 256-bit blocks
//! - Run-length compresses the protected bytes
//! - Recovers from receiver-reported loss by resending exactly the missing frames
//! - Can inject reordering and bit errors to exercise a receiver
//!
//! # Architecture
//!
//! - `bitio`: Bit-level reading/writing and the 256-bit block
//! - `hamming`: Extended Hamming codec
//! - `rle`: Run-length codec
//! - `frame`: Frame header and payload serialization
//! - `wire`: The frame -> datagram pipeline and its inverse
//! - `response`: Receiver response parsing
//! - `queue`: Sent-frame record used for replay
//! - `fault`: Seeded fault injection
//! - `transport`: Datagram transport boundary (UDP)
//! - `session`: The upload state machine
//! - `config`, `metrics`: Session settings and counters
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **Deterministic**: Seeded randomness makes runs reproducible
//! - **Resilient**: No receiver answer aborts an upload in progress

pub mod bitio;
pub mod config;
pub mod error;
pub mod fault;
pub mod frame;
pub mod hamming;
pub mod metrics;
pub mod queue;
pub mod response;
pub mod rle;
pub mod session;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use metrics::SessionMetrics;
pub use session::{upload_order, SessionState, UploadSession};
pub use transport::{Transport, UdpTransport};
pub use wire::WireCodec;
