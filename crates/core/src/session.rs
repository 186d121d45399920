//! Upload session: one agent pushing files to the receiver.
//!
//! # State machine
//!
//! ```text
//! Idle -> Handshaking -> Transferring -> Draining -> Done
//!           UPLD/MODE/SEQN   DATA ...      replays     DATA (empty)
//! ```
//!
//! Every frame goes through the same synchronous path: serialize, encode
//! (see [`WireCodec`]), send, then block for one response. The session never
//! has more than one frame in flight.
//!
//! # Recovery
//!
//! - Handshake frames are resent unchanged until their acknowledgment arrives.
//! - Error reports are logged and counted; the upload carries on.
//! - Loss reports trigger waves of resends taken from the [`PacketQueue`].
//!   A wave's still-missing set is every sequence number reported lost in the
//!   responses to that wave's resends, limited to frames the queue knows.
//!   The loop ends when a wave comes back clean, or after
//!   [`SessionConfig::max_loss_waves`] waves when a limit is set.
//! - Withheld frames only enter the queue once they are replayed; a loss
//!   report naming one before that is left to the replay.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::fault::FaultInjector;
use crate::frame::{Frame, CHUNK_SIZE};
use crate::metrics::SessionMetrics;
use crate::queue::{PacketKey, PacketQueue};
use crate::response::Response;
use crate::transport::Transport;
use crate::wire::WireCodec;

/// Where a session is in the current file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Handshaking,
    Transferring,
    /// Replaying frames the fault injector held back
    Draining,
    Done,
}

/// One upload agent bound to a transport.
pub struct UploadSession<T: Transport> {
    config: SessionConfig,
    transport: T,
    codec: WireCodec,
    faults: FaultInjector,
    agent_id: u16,
    upload_id: Option<u16>,
    sequence: u16,
    queue: PacketQueue,
    state: SessionState,
    metrics: SessionMetrics,
}

impl<T: Transport> UploadSession<T> {
    /// Create a session.
    ///
    /// The agent identity is drawn from `rng`, which also seeds the fault
    /// injector; the same seed replays the same session.
    pub fn new(config: SessionConfig, transport: T, mut rng: ChaCha8Rng) -> Self {
        let agent_id = rng.gen_range(1..=u16::MAX);
        let faults = FaultInjector::new(&config, ChaCha8Rng::seed_from_u64(rng.gen()));
        let codec = WireCodec::new(config.fec, config.compression);

        tracing::debug!(
            "Agent {} ready (fec: {}, compression: {})",
            agent_id,
            config.fec,
            config.compression
        );

        Self {
            sequence: config.start_sequence,
            config,
            transport,
            codec,
            faults,
            agent_id,
            upload_id: None,
            queue: PacketQueue::new(),
            state: SessionState::Idle,
            metrics: SessionMetrics::new(),
        }
    }

    /// Upload every file, in [`upload_order`], and return how many completed.
    ///
    /// A file that cannot be uploaded (unreadable, path too long for a frame)
    /// is logged and skipped.
    pub fn run(&mut self, files: &[PathBuf]) -> usize {
        let order = upload_order(files, self.config.duplicate_first);
        tracing::debug!("Agent {} will upload {} files", self.agent_id, order.len());

        let mut uploaded = 0;
        for path in &order {
            match self.upload_file(path) {
                Ok(()) => uploaded += 1,
                Err(e) => tracing::warn!("Agent {}: skipping {:?}: {}", self.agent_id, path, e),
            }
        }

        self.metrics.complete();
        uploaded
    }

    /// Read `path` and upload its contents under that path.
    pub fn upload_file(&mut self, path: &Path) -> Result<()> {
        let data = fs::read(path)?;
        self.upload(&path.to_string_lossy(), &data)
    }

    /// Perform one complete file upload.
    pub fn upload(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let span = tracing::info_span!("upload", agent = self.agent_id, file = name);
        let _guard = span.enter();
        tracing::info!("Uploading {} ({} bytes)", name, data.len());

        // the receiver starts every upload identifier from scratch
        self.queue.clear();
        self.faults.begin_file();
        self.sequence = self.config.start_sequence;
        self.upload_id = None;

        self.enter(SessionState::Handshaking);
        let upload_id = self.handshake(name)?;
        self.upload_id = Some(upload_id);

        self.enter(SessionState::Transferring);
        for chunk in data.chunks(CHUNK_SIZE) {
            self.send_data(upload_id, chunk.to_vec())?;
        }

        self.enter(SessionState::Draining);
        self.faults.close();
        if self.faults.pending() > 0 {
            tracing::debug!("Replaying {} withheld frames", self.faults.pending());
        }
        while let Some((key, frame)) = self.faults.next_withheld() {
            tracing::debug!("Replaying withheld frame {}", key);
            self.metrics.frames_replayed += 1;
            self.send_recv(key, frame)?;
        }

        // end of file
        self.send_data(upload_id, Vec::new())?;
        self.enter(SessionState::Done);

        self.metrics.files_uploaded += 1;
        self.metrics.file_bytes += data.len() as u64;
        Ok(())
    }

    fn enter(&mut self, state: SessionState) {
        tracing::trace!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// UPLD, then MODE and SEQN when configured. Returns the upload identifier.
    fn handshake(&mut self, name: &str) -> Result<u16> {
        let upload = Frame::Upload {
            path: name.to_string(),
        }
        .serialize(self.agent_id)?;
        let upload_id = self.exchange_until(PacketKey::Upload, upload, |r| match r {
            Response::UploadAck(id) => Some(*id),
            _ => None,
        })?;
        tracing::debug!("Upload accepted with id {:#06x}", upload_id);

        if self.config.sends_mode() {
            let mode = Frame::Mode {
                mode: self.config.mode.clone(),
            }
            .serialize(self.agent_id)?;
            self.exchange_until(PacketKey::Mode, mode, |r| {
                matches!(r, Response::ModeAck).then_some(())
            })?;
        }

        if self.config.sends_sequence() {
            let sequence = Frame::Sequence {
                start: self.config.start_sequence,
            }
            .serialize(self.agent_id)?;
            self.exchange_until(PacketKey::Sequence, sequence, |r| {
                matches!(r, Response::SequenceAck).then_some(())
            })?;
        }

        Ok(upload_id)
    }

    /// Resend the identical frame until `accept` recognizes the response.
    fn exchange_until<R, F>(&mut self, key: PacketKey, frame: Vec<u8>, accept: F) -> Result<R>
    where
        F: Fn(&Response) -> Option<R>,
    {
        loop {
            let response = self.send_recv(key, frame.clone())?;
            if let Some(accepted) = accept(&response) {
                return Ok(accepted);
            }
            self.metrics.handshake_retries += 1;
            tracing::debug!("No acknowledgment for {} ({:?}), resending", key, response);
        }
    }

    fn send_data(&mut self, upload_id: u16, chunk: Vec<u8>) -> Result<()> {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let frame = Frame::Data {
            upload_id,
            sequence,
            chunk,
        }
        .serialize(self.agent_id)?;
        let key = PacketKey::Data(sequence);

        if self.faults.withhold(key, &frame) {
            tracing::debug!("Withholding frame {}", key);
            self.metrics.frames_withheld += 1;
            return Ok(());
        }

        self.send_recv(key, frame)?;
        Ok(())
    }

    /// Send a frame, remember it, and act on the response.
    fn send_recv(&mut self, key: PacketKey, frame: Vec<u8>) -> Result<Response> {
        let response = self.exchange(&frame)?;
        self.queue.insert(key, frame);

        match &response {
            Response::Error(message) => self.receiver_error(message),
            Response::Loss(reported) => self.recover(reported)?,
            Response::UploadComplete(path) => tracing::info!("Receiver finished {}", path),
            Response::Unrecognized(bytes) => {
                tracing::debug!("Unrecognized response for {}: {:02x?}", key, bytes)
            }
            _ => {}
        }
        Ok(response)
    }

    /// One datagram out, one response back.
    fn exchange(&mut self, frame: &[u8]) -> Result<Response> {
        let encoded = self.codec.encode(frame, &mut self.faults)?;

        self.metrics.frames_sent += 1;
        self.metrics.raw_bytes += frame.len() as u64;
        self.metrics.wire_bytes += encoded.datagram.len() as u64;
        self.metrics.bit_errors_injected += encoded.bit_errors as u64;

        if let Err(e) = self.transport.send(&encoded.datagram) {
            tracing::warn!("Send failed: {}", e);
        }

        let response = match self.transport.recv() {
            Ok(Some(bytes)) => Response::parse(&bytes),
            Ok(None) => Response::Timeout,
            Err(e) => {
                tracing::warn!("Receive failed: {}", e);
                Response::Timeout
            }
        };

        if response == Response::Timeout {
            self.metrics.timeouts += 1;
            tracing::trace!("Timed out waiting for a response");
        }
        Ok(response)
    }

    fn receiver_error(&mut self, message: &str) {
        self.metrics.receiver_errors += 1;
        tracing::warn!("Receiver error: {}", message);
    }

    /// Resend lost frames wave by wave until a wave comes back clean.
    fn recover(&mut self, reported: &[u16]) -> Result<()> {
        let mut missing = self.known_losses(reported);
        let mut waves: u32 = 0;

        while !missing.is_empty() {
            if self.config.max_loss_waves.is_some_and(|limit| waves >= limit) {
                tracing::warn!(
                    "Giving up on {} lost frames after {} waves",
                    missing.len(),
                    waves
                );
                return Ok(());
            }
            waves += 1;
            self.metrics.loss_waves += 1;
            tracing::debug!("Loss wave {}: resending {:?}", waves, missing);

            let mut still_missing = Vec::new();
            for sequence in missing {
                let Some(frame) = self.queue.get(&PacketKey::Data(sequence)).map(<[u8]>::to_vec)
                else {
                    continue;
                };

                self.metrics.frames_resent += 1;
                match self.exchange(&frame)? {
                    Response::Loss(lost) => still_missing.extend(lost),
                    Response::Error(message) => self.receiver_error(&message),
                    _ => {}
                }
            }

            missing = self.known_losses(&still_missing);
        }

        Ok(())
    }

    /// De-duplicate reported sequence numbers and drop those never sent.
    fn known_losses(&self, reported: &[u16]) -> Vec<u16> {
        let mut seen = HashSet::new();
        reported
            .iter()
            .copied()
            .filter(|sequence| seen.insert(*sequence))
            .filter(|&sequence| {
                let key = PacketKey::Data(sequence);
                if self.queue.contains(&key) {
                    return true;
                }
                if self.faults.is_withheld(key) {
                    tracing::debug!("Frame {} reported lost before its replay", sequence);
                } else {
                    tracing::warn!("Receiver reported unknown frame {} lost", sequence);
                }
                false
            })
            .collect()
    }

    pub fn agent_id(&self) -> u16 {
        self.agent_id
    }

    /// Identifier of the current (or last) upload, once acknowledged.
    pub fn upload_id(&self) -> Option<u16> {
        self.upload_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence number the next data frame will carry.
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    pub fn queue(&self) -> &PacketQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, keeping its counters.
    pub fn into_metrics(self) -> SessionMetrics {
        self.metrics
    }
}

/// Order in which a file list is uploaded; the first file appears twice when
/// `duplicate_first` is set.
pub fn upload_order(files: &[PathBuf], duplicate_first: bool) -> Vec<PathBuf> {
    let mut order = Vec::with_capacity(files.len() + 1);
    if duplicate_first {
        order.extend(files.first().cloned());
    }
    order.extend_from_slice(files);
    order
}
