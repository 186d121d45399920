//! Receiver responses.
//!
//! The receiver answers each datagram with a short ASCII-tagged message.
//! Responses are not FEC protected.
//!
//! ```text
//! UPLOADING  upload_id (u16)                  upload accepted
//! METADATAMODE                                mode frame accepted
//! METADATASEQN                                sequence frame accepted
//! IAMERR     length (u16)  message            length counts the 8 header bytes
//! LOSS       length (u16)  seq (u16) ...      frames that did not decode
//! UPLOAD END \0 path                          end-of-file acknowledged
//! ```

const UPLOAD_ACK: &[u8] = b"UPLOADING";
const MODE_ACK: &[u8] = b"METADATAMODE";
const SEQUENCE_ACK: &[u8] = b"METADATASEQN";
const ERROR: &[u8] = b"IAMERR";
const LOSS: &[u8] = b"LOSS";
const UPLOAD_END: &[u8] = b"UPLOAD END\0";

/// A classified response datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Nothing arrived before the receive timeout
    Timeout,
    UploadAck(u16),
    ModeAck,
    SequenceAck,
    /// Receiver-side error report
    Error(String),
    /// Sequence numbers the receiver did not get cleanly
    Loss(Vec<u16>),
    UploadComplete(String),
    /// Anything that matches no known token (including a truncated ack)
    Unrecognized(Vec<u8>),
}

impl Response {
    /// Classify a raw response. An empty datagram is treated as a timeout.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Response::Timeout;
        }

        if let Some(rest) = bytes.strip_prefix(UPLOAD_ACK) {
            return match rest {
                [hi, lo, ..] => Response::UploadAck(u16::from_be_bytes([*hi, *lo])),
                _ => Response::Unrecognized(bytes.to_vec()),
            };
        }
        if bytes.starts_with(MODE_ACK) {
            return Response::ModeAck;
        }
        if bytes.starts_with(SEQUENCE_ACK) {
            return Response::SequenceAck;
        }
        if let Some(rest) = bytes.strip_prefix(ERROR) {
            return Response::Error(parse_error_message(rest));
        }
        if let Some(rest) = bytes.strip_prefix(UPLOAD_END) {
            return Response::UploadComplete(String::from_utf8_lossy(rest).into_owned());
        }
        if let Some(rest) = bytes.strip_prefix(LOSS) {
            let list = rest.get(2..).unwrap_or_default();
            let sequences = list
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return Response::Loss(sequences);
        }

        Response::Unrecognized(bytes.to_vec())
    }

    /// Wire form of this response, as a receiver would send it.
    ///
    /// `Timeout` encodes to an empty datagram.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Timeout => Vec::new(),
            Response::UploadAck(id) => [UPLOAD_ACK, &id.to_be_bytes()[..]].concat(),
            Response::ModeAck => MODE_ACK.to_vec(),
            Response::SequenceAck => SEQUENCE_ACK.to_vec(),
            Response::Error(message) => {
                let length = (ERROR.len() + 2 + message.len()) as u16;
                [ERROR, &length.to_be_bytes()[..], message.as_bytes()].concat()
            }
            Response::Loss(sequences) => {
                let length = (LOSS.len() + 2 + sequences.len() * 2) as u16;
                let mut out = [LOSS, &length.to_be_bytes()[..]].concat();
                for seq in sequences {
                    out.extend_from_slice(&seq.to_be_bytes());
                }
                out
            }
            Response::UploadComplete(path) => [UPLOAD_END, path.as_bytes()].concat(),
            Response::Unrecognized(bytes) => bytes.clone(),
        }
    }
}

/// Message bytes of an `IAMERR` response, after the tag.
///
/// The length field counts the whole response; it is clamped to what
/// actually arrived.
fn parse_error_message(rest: &[u8]) -> String {
    let header = ERROR.len() + 2;
    let Some((len_bytes, body)) = rest.split_first_chunk::<2>() else {
        return String::new();
    };
    let declared = (u16::from_be_bytes(*len_bytes) as usize).saturating_sub(header);
    let body = &body[..declared.min(body.len())];
    String::from_utf8_lossy(body).into_owned()
}
