//! Integration tests for the full upload path.
//!
//! These tests drive an `UploadSession` against an in-memory receiver:
//! frame -> pad -> Hamming -> noise -> RLE -> receiver decode -> reassemble,
//! with verification that the receiver ends up with the original file.

mod common;

use std::collections::HashSet;
use std::fs;

use common::{sample, SimReceiver};
use crawler_core::frame::{Frame, CHUNK_SIZE};
use crawler_core::{SessionConfig, UploadSession, WireCodec};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

fn session(config: SessionConfig, seed: u64) -> UploadSession<SimReceiver> {
    let receiver = SimReceiver::new(WireCodec::new(config.fec, config.compression));
    UploadSession::new(config, receiver, ChaCha8Rng::seed_from_u64(seed))
}

/// Simple upload over a clean link.
#[test]
fn test_upload_reconstructs_file() {
    let data = sample(1000);
    let mut session = session(SessionConfig::default(), 1);

    session.upload("/data/file.bin", &data).expect("upload failed");

    let receiver = session.transport();
    assert_eq!(
        receiver.completed,
        vec![("/data/file.bin".to_string(), data)],
        "receiver content doesn't match input"
    );
    assert_eq!(
        receiver.data_frames(),
        vec![(0, 498), (1, 498), (2, 4), (3, 0)]
    );
    assert!(matches!(&receiver.log[0], Frame::Upload { path } if path == "/data/file.bin"));
    assert_eq!(receiver.undecodable, 0);
}

/// A file that fills its last chunk exactly still gets an empty end-of-file frame.
#[test]
fn test_exact_multiple_of_chunk_size() {
    let data = sample(CHUNK_SIZE * 2);
    let mut session = session(SessionConfig::default(), 2);

    session.upload("exact", &data).expect("upload failed");

    let receiver = session.transport();
    assert_eq!(receiver.data_frames(), vec![(0, 498), (1, 498), (2, 0)]);
    assert_eq!(receiver.completed[0].1, data);
}

/// Every frame carries the agent identity and the data frames the upload id.
#[test]
fn test_headers_carry_identity() {
    let mut session = session(SessionConfig::default(), 3);
    session.upload("f", &sample(700)).expect("upload failed");

    let agent = session.agent_id();
    let upload_id = session.upload_id().expect("upload id known");
    let receiver = session.transport();
    let codec = WireCodec::default();

    for datagram in &receiver.datagrams {
        let header = codec.decode_header(datagram).expect("header decodes");
        assert_eq!(header.agent_id, agent);
        assert_eq!(header.magic, 0xC505);
    }
    for frame in &receiver.log[1..] {
        assert!(matches!(frame, Frame::Data { upload_id: id, .. } if *id == upload_id));
    }
}

#[test]
fn test_mode_and_sequence_overrides() {
    let config = SessionConfig {
        mode: "compressed".to_string(),
        start_sequence: 100,
        ..SessionConfig::default()
    };
    let data = sample(1200);
    let mut session = session(config, 4);

    session.upload("f", &data).expect("upload failed");

    let receiver = session.transport();
    assert_eq!(
        receiver.log[1],
        Frame::Mode {
            mode: "compressed".to_string()
        }
    );
    assert_eq!(receiver.log[2], Frame::Sequence { start: 100 });
    assert_eq!(
        receiver.data_frames(),
        vec![(100, 498), (101, 498), (102, 204), (103, 0)]
    );
    assert_eq!(receiver.completed[0].1, data);
}

#[test]
fn test_metadata_always_sends_defaults() {
    let config = SessionConfig {
        metadata_always: true,
        ..SessionConfig::default()
    };
    let mut session = session(config, 5);

    session.upload("f", b"tiny").expect("upload failed");

    let receiver = session.transport();
    assert_eq!(receiver.log[1], Frame::Mode { mode: "block".to_string() });
    assert_eq!(receiver.log[2], Frame::Sequence { start: 0 });
}

#[test]
fn test_no_metadata_by_default() {
    let mut session = session(SessionConfig::default(), 6);
    session.upload("f", b"tiny").expect("upload failed");

    let receiver = session.transport();
    assert!(receiver
        .log
        .iter()
        .all(|f| !matches!(f, Frame::Mode { .. } | Frame::Sequence { .. })));
}

/// Frames the receiver never got are resent wave by wave until it is whole.
#[test]
fn test_lost_frames_are_resent() {
    let data = sample(2000);
    let mut session = session(SessionConfig::default(), 7);
    session.transport_mut().drop_first = HashSet::from([1, 3]);

    session.upload("lossy", &data).expect("upload failed");

    let receiver = session.transport();
    assert_eq!(receiver.completed, vec![("lossy".to_string(), data)]);

    // end of file reports [1, 3]; resending 1 still reports 3; the second
    // wave's resend of 3 comes back clean
    let metrics = session.metrics();
    assert_eq!(metrics.loss_waves, 2);
    assert_eq!(metrics.frames_resent, 3);
    assert_eq!(receiver.loss_reports, 2);
}

#[test]
fn test_handshake_retried_until_ack() {
    let mut session = session(SessionConfig::default(), 8);
    session.transport_mut().ignore_uploads = 3;

    session.upload("f", b"content").expect("upload failed");

    let receiver = session.transport();
    let uploads: Vec<_> = receiver.datagrams[..4].to_vec();
    assert!(uploads.windows(2).all(|w| w[0] == w[1]), "retries must be identical");
    assert_eq!(session.metrics().handshake_retries, 3);
    assert_eq!(receiver.completed.len(), 1);
}

#[test]
fn test_receiver_errors_are_survived() {
    let data = sample(1500);
    let mut session = session(SessionConfig::default(), 9);
    session.transport_mut().error_on = HashSet::from([0, 2]);

    session.upload("f", &data).expect("upload failed");

    assert_eq!(session.metrics().receiver_errors, 2);
    assert_eq!(session.transport().completed[0].1, data);
}

/// Withheld frames arrive after the in-order pass, before end of file.
#[test]
fn test_out_of_order_replay() {
    let config = SessionConfig {
        out_of_order: true,
        out_of_order_rate: 0.2,
        ..SessionConfig::default()
    };
    let data = sample(CHUNK_SIZE * 50);
    let mut session = session(config, 10);

    session.upload("ooo", &data).expect("upload failed");

    let withheld = session.metrics().frames_withheld as usize;
    assert!(withheld > 0);
    assert_eq!(session.metrics().frames_replayed as usize, withheld);

    let receiver = session.transport();
    let sequences: Vec<u16> = receiver.data_frames().iter().map(|(s, _)| *s).collect();
    let (eof, sent) = sequences.split_last().expect("frames sent");
    assert_eq!(*eof, 50);

    let (in_order, replayed) = sent.split_at(50 - withheld);
    assert!(in_order.windows(2).all(|w| w[0] < w[1]));
    assert!(replayed.windows(2).all(|w| w[0] < w[1]));

    let in_order: HashSet<u16> = in_order.iter().copied().collect();
    let replayed: HashSet<u16> = replayed.iter().copied().collect();
    assert!(in_order.is_disjoint(&replayed));
    assert_eq!(in_order.len() + replayed.len(), 50);

    assert_eq!(receiver.completed[0].1, data);
}

/// Injected noise never makes the receiver accept wrong data.
#[test]
fn test_noisy_link_never_delivers_corrupt_data() {
    let config = SessionConfig {
        bit_errors: true,
        ..SessionConfig::default()
    };
    let data = sample(CHUNK_SIZE * 30);
    let mut session = session(config, 11);

    session.upload("noisy", &data).expect("upload failed");

    let receiver = session.transport();
    assert!(session.metrics().bit_errors_injected > 0);
    assert!(receiver.corrected > 0);

    for frame in &receiver.log {
        if let Frame::Data {
            sequence, chunk, ..
        } = frame
        {
            let start = *sequence as usize * CHUNK_SIZE;
            let end = (start + CHUNK_SIZE).min(data.len());
            assert_eq!(&chunk[..], &data[start.min(end)..end], "chunk {sequence} corrupted");
        }
    }
    for (_, content) in &receiver.completed {
        assert_eq!(content, &data);
    }
}

#[test]
fn test_plain_link_without_fec_or_rle() {
    let config = SessionConfig {
        fec: false,
        compression: false,
        ..SessionConfig::default()
    };
    let data = sample(900);
    let mut session = session(config, 12);

    session.upload("plain", &data).expect("upload failed");

    let receiver = session.transport();
    assert_eq!(receiver.completed[0].1, data);
    // data frame 0: 10 header + 4 ids + 498 chunk, already even
    assert_eq!(receiver.datagrams[1].len(), 512);
}

#[test]
fn test_fec_without_compression() {
    let config = SessionConfig {
        compression: false,
        ..SessionConfig::default()
    };
    let data = sample(600);
    let mut session = session(config, 13);

    session.upload("fec-only", &data).expect("upload failed");

    let receiver = session.transport();
    assert!(receiver.datagrams.iter().all(|d| d.len() % 32 == 0));
    assert_eq!(receiver.completed[0].1, data);
}

/// Same seed, same traffic; noise and reordering included.
#[test]
fn test_same_seed_same_traffic() {
    let config = SessionConfig {
        out_of_order: true,
        out_of_order_rate: 0.1,
        bit_errors: true,
        ..SessionConfig::default()
    };
    let data = sample(CHUNK_SIZE * 10);

    let mut a = session(config.clone(), 99);
    let mut b = session(config, 99);
    a.upload("f", &data).expect("upload failed");
    b.upload("f", &data).expect("upload failed");

    assert_eq!(a.transport().datagrams, b.transport().datagrams);
}

/// `run` reads files from disk, duplicating the first when asked.
#[test]
fn test_run_uploads_files_from_disk() {
    let dir = TempDir::new().expect("temp dir");
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    fs::write(&a, sample(600)).expect("write a");
    fs::write(&b, sample(10)).expect("write b");
    let missing = dir.path().join("missing.bin");

    let config = SessionConfig {
        duplicate_first: true,
        ..SessionConfig::default()
    };
    let mut session = session(config, 14);

    let uploaded = session.run(&[a.clone(), missing, b.clone()]);
    assert_eq!(uploaded, 3);

    let receiver = session.transport();
    let paths: Vec<String> = receiver.completed.iter().map(|(p, _)| p.clone()).collect();
    let name = |p: &std::path::Path| p.to_string_lossy().into_owned();
    assert_eq!(paths, vec![name(&a), name(&a), name(&b)]);
    assert_eq!(receiver.completed[2].1, sample(10));

    let metrics = session.metrics();
    assert_eq!(metrics.files_uploaded, 3);
    assert_eq!(metrics.file_bytes, 1210);
    assert!(metrics.end_time.is_some());
}
