//! Upload session configuration.
//!
//! One explicit value object handed to [`UploadSession`](crate::session::UploadSession)
//! at construction. Defaults match the documented behavior of the crawler
//! with no overrides set.

use std::time::Duration;

/// Upload mode the receiver assumes when no MODE frame is sent.
pub const DEFAULT_MODE: &str = "block";

/// Receive timeout when none is configured.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One data frame in 101 is withheld when reordering is enabled.
pub const DEFAULT_OUT_OF_ORDER_RATE: f64 = 1.0 / 101.0;

/// Everything that tunes one upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Send MODE and SEQN frames even when they carry default values
    pub metadata_always: bool,

    /// Upload mode announced in the MODE frame
    pub mode: String,

    /// First sequence number of every file upload
    pub start_sequence: u16,

    /// Withhold a few data frames and replay them after the rest of the file
    pub out_of_order: bool,

    /// Chance for a data frame to be withheld when `out_of_order` is set.
    /// Values outside `0.0..=1.0` are clamped; NaN falls back to the default.
    pub out_of_order_rate: f64,

    /// Flip random bits after Hamming encoding
    pub bit_errors: bool,

    /// Upload the first file of the list twice
    pub duplicate_first: bool,

    /// Hamming-encode frames before sending
    pub fec: bool,

    /// Run-length compress the (encoded) frame before sending
    pub compression: bool,

    /// How long to wait for a response before treating it as absent
    pub receive_timeout: Duration,

    /// Give up on loss recovery after this many waves per loss report.
    /// `None` resends until the receiver stops reporting losses.
    pub max_loss_waves: Option<u32>,
}

impl SessionConfig {
    /// True when a MODE frame must follow the upload-start frame.
    pub fn sends_mode(&self) -> bool {
        self.metadata_always || self.mode != DEFAULT_MODE
    }

    /// True when a SEQN frame must follow the upload-start frame.
    pub fn sends_sequence(&self) -> bool {
        self.metadata_always || self.start_sequence != 0
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metadata_always: false,
            mode: DEFAULT_MODE.to_string(),
            start_sequence: 0,
            out_of_order: false,
            out_of_order_rate: DEFAULT_OUT_OF_ORDER_RATE,
            bit_errors: false,
            duplicate_first: false,
            fec: true,
            compression: true,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            max_loss_waves: None,
        }
    }
}
