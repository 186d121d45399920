//! Metrics collection and reporting for an upload session.
//!
//! Counters are updated at each step of the send path so a run can be
//! judged afterwards: how much FEC and compression cost or saved on the
//! wire, and how hard the recovery machinery had to work.
//!
//! # Thread Safety
//!
//! `SessionMetrics` is owned by a single session. Agents running in
//! parallel each keep their own and can be combined with [`SessionMetrics::merge`].

use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Counters for one upload session.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    // === Timing ===
    /// When the session started
    pub start_time: Instant,

    /// When the session ended (set on completion)
    pub end_time: Option<Instant>,

    // === Files ===
    /// Files whose end-of-file frame was sent
    pub files_uploaded: u64,

    /// File content bytes read
    pub file_bytes: u64,

    // === Frames ===
    /// Datagrams handed to the transport (first sends and replays)
    pub frames_sent: u64,

    /// Unencoded frame bytes of those datagrams
    pub raw_bytes: u64,

    /// Bytes actually put on the wire after FEC and compression
    pub wire_bytes: u64,

    /// Data frames held back by the fault injector
    pub frames_withheld: u64,

    /// Held-back frames sent after the in-order pass
    pub frames_replayed: u64,

    /// Frames resent because the receiver reported them lost
    pub frames_resent: u64,

    /// Handshake frames sent again for lack of the expected ack
    pub handshake_retries: u64,

    // === Receiver feedback ===
    /// Receives that timed out
    pub timeouts: u64,

    /// Error reports received
    pub receiver_errors: u64,

    /// Loss-recovery waves run
    pub loss_waves: u64,

    // === Fault injection ===
    /// Bits flipped after Hamming encoding
    pub bit_errors_injected: u64,
}

impl SessionMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            files_uploaded: 0,
            file_bytes: 0,
            frames_sent: 0,
            raw_bytes: 0,
            wire_bytes: 0,
            frames_withheld: 0,
            frames_replayed: 0,
            frames_resent: 0,
            handshake_retries: 0,
            timeouts: 0,
            receiver_errors: 0,
            loss_waves: 0,
            bit_errors_injected: 0,
        }
    }

    /// Mark the session as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Wire bytes per raw frame byte. Above 1.0 means FEC cost more than
    /// compression saved.
    pub fn expansion_ratio(&self) -> f64 {
        if self.raw_bytes == 0 {
            0.0
        } else {
            self.wire_bytes as f64 / self.raw_bytes as f64
        }
    }

    /// Fold another agent's counters into this one.
    pub fn merge(&mut self, other: &SessionMetrics) {
        self.start_time = self.start_time.min(other.start_time);
        self.end_time = match (self.end_time, other.end_time) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.files_uploaded += other.files_uploaded;
        self.file_bytes += other.file_bytes;
        self.frames_sent += other.frames_sent;
        self.raw_bytes += other.raw_bytes;
        self.wire_bytes += other.wire_bytes;
        self.frames_withheld += other.frames_withheld;
        self.frames_replayed += other.frames_replayed;
        self.frames_resent += other.frames_resent;
        self.handshake_retries += other.handshake_retries;
        self.timeouts += other.timeouts;
        self.receiver_errors += other.receiver_errors;
        self.loss_waves += other.loss_waves;
        self.bit_errors_injected += other.bit_errors_injected;
    }

    /// Human-readable report.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Upload Summary ===");
        let _ = writeln!(out, "Duration: {:.2?}", self.duration());
        let _ = writeln!(
            out,
            "Files: {} ({} bytes)",
            self.files_uploaded, self.file_bytes
        );
        let _ = writeln!(
            out,
            "Frames sent: {} ({} raw bytes -> {} wire bytes, x{:.2})",
            self.frames_sent,
            self.raw_bytes,
            self.wire_bytes,
            self.expansion_ratio()
        );
        let _ = writeln!(
            out,
            "Withheld/replayed: {}/{}",
            self.frames_withheld, self.frames_replayed
        );
        let _ = writeln!(
            out,
            "Loss waves: {}, frames resent: {}",
            self.loss_waves, self.frames_resent
        );
        let _ = writeln!(
            out,
            "Handshake retries: {}, timeouts: {}, receiver errors: {}",
            self.handshake_retries, self.timeouts, self.receiver_errors
        );
        let _ = write!(out, "Bit errors injected: {}", self.bit_errors_injected);
        out
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
