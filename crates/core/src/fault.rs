//! Test-mode fault injection.
//!
//! Sits between the upload session and the transport and makes the link
//! look worse than it is, so the receiver's recovery paths get exercised:
//! - **Reordering**: data frames are occasionally withheld and replayed
//!   after the rest of the file
//! - **Line noise**: 0-2 bits of the Hamming-encoded frame are flipped
//!
//! # Determinism
//!
//! All dice come from a seeded ChaCha8 RNG owned by the injector. Given the
//! same seed and inputs, the same frames are withheld and the same bits flip.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{SessionConfig, DEFAULT_OUT_OF_ORDER_RATE};
use crate::hamming;
use crate::queue::PacketKey;

/// Decides which frames to hold back or corrupt.
#[derive(Debug)]
pub struct FaultInjector {
    rng: ChaCha8Rng,
    out_of_order: bool,
    out_of_order_rate: f64,
    bit_errors: bool,
    /// Closed once the withheld frames have been drained for this file
    accepting: bool,
    withheld: VecDeque<(PacketKey, Vec<u8>)>,
}

impl FaultInjector {
    /// Create an injector driven by `rng`.
    pub fn new(config: &SessionConfig, rng: ChaCha8Rng) -> Self {
        let rate = config.out_of_order_rate;
        let out_of_order_rate = if rate.is_nan() {
            DEFAULT_OUT_OF_ORDER_RATE
        } else {
            rate.clamp(0.0, 1.0)
        };

        Self {
            rng,
            out_of_order: config.out_of_order,
            out_of_order_rate,
            bit_errors: config.bit_errors,
            accepting: true,
            withheld: VecDeque::new(),
        }
    }

    /// An injector that never interferes.
    pub fn disabled(seed: u64) -> Self {
        Self::new(&SessionConfig::default(), ChaCha8Rng::seed_from_u64(seed))
    }

    /// Start a new file: withholding is allowed again.
    pub fn begin_file(&mut self) {
        self.accepting = true;
        self.withheld.clear();
    }

    /// Roll the out-of-order dice for a frame about to be sent.
    ///
    /// Only data frames are ever withheld. A withheld frame is kept verbatim
    /// and returns `true`; the caller must not send it now.
    pub fn withhold(&mut self, key: PacketKey, frame: &[u8]) -> bool {
        if !self.out_of_order || !self.accepting || !key.is_data() {
            return false;
        }

        if self.rng.gen_bool(self.out_of_order_rate) {
            self.withheld.push_back((key, frame.to_vec()));
            return true;
        }
        false
    }

    /// Stop withholding for the rest of the file so replays are sent for real.
    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Take the oldest withheld frame.
    ///
    /// Frames come back in the order they were withheld; the rest stay held
    /// until their own turn.
    pub fn next_withheld(&mut self) -> Option<(PacketKey, Vec<u8>)> {
        self.withheld.pop_front()
    }

    /// True while `key` is held back and has not been replayed yet.
    pub fn is_withheld(&self, key: PacketKey) -> bool {
        self.withheld.iter().any(|(held, _)| *held == key)
    }

    /// Number of frames currently held back.
    pub fn pending(&self) -> usize {
        self.withheld.len()
    }

    /// Apply line noise to an encoded frame; returns the bits flipped.
    pub fn corrupt(&mut self, encoded: &mut [u8]) -> usize {
        if !self.bit_errors {
            return 0;
        }
        hamming::inject_bit_errors(encoded, &mut self.rng)
    }
}
