//! In-memory receiver used by the integration tests.
//!
//! Decodes every datagram through the same wire pipeline a real receiver
//! would, reassembles uploads by sequence number, and answers the way the
//! protocol does: acks for handshake frames, a loss report once the
//! end-of-file frame shows gaps, an upload-end message when a file is whole.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io;

use crawler_core::frame::Frame;
use crawler_core::response::Response;
use crawler_core::{Transport, WireCodec};

struct Upload {
    path: String,
    upload_id: u16,
    start: u16,
    chunks: BTreeMap<u16, Vec<u8>>,
    eof: Option<u16>,
}

impl Upload {
    fn missing(&self, eof: u16) -> Vec<u16> {
        let mut missing = Vec::new();
        let mut seq = self.start;
        while seq != eof {
            if !self.chunks.contains_key(&seq) {
                missing.push(seq);
            }
            seq = seq.wrapping_add(1);
        }
        missing
    }

    fn assemble(&self, eof: u16) -> Vec<u8> {
        let mut data = Vec::new();
        let mut seq = self.start;
        while seq != eof {
            if let Some(chunk) = self.chunks.get(&seq) {
                data.extend_from_slice(chunk);
            }
            seq = seq.wrapping_add(1);
        }
        data
    }
}

pub struct SimReceiver {
    codec: WireCodec,
    /// Raw datagrams in arrival order
    pub datagrams: Vec<Vec<u8>>,
    /// Frames that decoded, in arrival order
    pub log: Vec<Frame>,
    /// Datagrams rejected by the decoder
    pub undecodable: usize,
    /// Hamming blocks repaired
    pub corrected: usize,
    /// Loss reports sent
    pub loss_reports: usize,
    /// Completed uploads: (path, content)
    pub completed: Vec<(String, Vec<u8>)>,

    /// Data sequence numbers whose first arrival is discarded
    pub drop_first: HashSet<u16>,
    /// UPLD frames to ignore before acknowledging
    pub ignore_uploads: usize,
    /// Data sequence numbers answered with an error report (once)
    pub error_on: HashSet<u16>,

    next_upload_id: u16,
    upload: Option<Upload>,
    pending: Option<Response>,
}

impl SimReceiver {
    pub fn new(codec: WireCodec) -> Self {
        Self {
            codec,
            datagrams: Vec::new(),
            log: Vec::new(),
            undecodable: 0,
            corrected: 0,
            loss_reports: 0,
            completed: Vec::new(),
            drop_first: HashSet::new(),
            ignore_uploads: 0,
            error_on: HashSet::new(),
            next_upload_id: 0x1000,
            upload: None,
            pending: None,
        }
    }

    /// Data frames in arrival order as (sequence, chunk length).
    pub fn data_frames(&self) -> Vec<(u16, usize)> {
        self.log
            .iter()
            .filter_map(|frame| match frame {
                Frame::Data {
                    sequence, chunk, ..
                } => Some((*sequence, chunk.len())),
                _ => None,
            })
            .collect()
    }

    fn handle(&mut self, datagram: &[u8]) -> Option<Response> {
        let recovered = match self.codec.decode(datagram) {
            Ok(recovered) => recovered,
            Err(_) => {
                self.undecodable += 1;
                return None;
            }
        };
        self.corrected += recovered.corrected;

        let (_, frame) = Frame::parse(&recovered.frame).expect("decoded frame must parse");
        self.log.push(frame.clone());

        match frame {
            Frame::Upload { path } => {
                if self.ignore_uploads > 0 {
                    self.ignore_uploads -= 1;
                    return None;
                }
                let upload_id = self.next_upload_id;
                self.next_upload_id += 1;
                self.upload = Some(Upload {
                    path,
                    upload_id,
                    start: 0,
                    chunks: BTreeMap::new(),
                    eof: None,
                });
                Some(Response::UploadAck(upload_id))
            }
            Frame::Mode { .. } => Some(Response::ModeAck),
            Frame::Sequence { start } => {
                if let Some(upload) = self.upload.as_mut() {
                    upload.start = start;
                }
                Some(Response::SequenceAck)
            }
            Frame::Data {
                upload_id,
                sequence,
                chunk,
            } => self.data(upload_id, sequence, chunk),
        }
    }

    fn data(&mut self, upload_id: u16, sequence: u16, chunk: Vec<u8>) -> Option<Response> {
        if self.drop_first.remove(&sequence) {
            return None;
        }

        let upload = self.upload.as_mut()?;
        if upload.upload_id != upload_id {
            return None;
        }

        if chunk.is_empty() {
            upload.eof = Some(sequence);
        } else {
            upload.chunks.insert(sequence, chunk);
        }

        if self.error_on.remove(&sequence) {
            return Some(Response::Error(format!("cannot store chunk {sequence}")));
        }

        let eof = upload.eof?;
        let missing = upload.missing(eof);
        if !missing.is_empty() {
            self.loss_reports += 1;
            return Some(Response::Loss(missing));
        }

        let content = upload.assemble(eof);
        let path = upload.path.clone();
        self.completed.push((path.clone(), content));
        self.upload = None;
        Some(Response::UploadComplete(path))
    }
}

impl Transport for SimReceiver {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.datagrams.push(datagram.to_vec());
        self.pending = self.handle(datagram);
        Ok(())
    }

    fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.pending.take().map(|response| response.to_bytes()))
    }
}

/// Deterministic, mildly compressible file content.
pub fn sample(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if i % 7 < 3 { 0 } else { (i * 31 % 251) as u8 })
        .collect()
}
