//! Record of every frame sent during one file upload.
//!
//! Loss reports name data frames by sequence number; the queue keeps the
//! original, unencoded bytes so the exact frame can be replayed. Entries keep
//! their first-insertion order; storing a key again replaces the bytes in
//! place.

use std::collections::HashMap;
use std::fmt;

/// Identifies a sent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKey {
    Upload,
    Mode,
    Sequence,
    /// Data frame by sequence number
    Data(u16),
}

impl PacketKey {
    /// True for data frames, the only frames the fault injector may withhold.
    pub fn is_data(&self) -> bool {
        matches!(self, PacketKey::Data(_))
    }
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKey::Upload => f.write_str("UPLD"),
            PacketKey::Mode => f.write_str("MODE"),
            PacketKey::Sequence => f.write_str("SEQN"),
            PacketKey::Data(seq) => write!(f, "{seq}"),
        }
    }
}

/// Insertion-ordered map from [`PacketKey`] to original frame bytes.
#[derive(Debug, Default)]
pub struct PacketQueue {
    entries: Vec<(PacketKey, Vec<u8>)>,
    index: HashMap<PacketKey, usize>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` under `key`.
    pub fn insert(&mut self, key: PacketKey, frame: Vec<u8>) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = frame,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, frame));
            }
        }
    }

    pub fn get(&self, key: &PacketKey) -> Option<&[u8]> {
        self.index
            .get(key)
            .map(|&slot| self.entries[slot].1.as_slice())
    }

    pub fn contains(&self, key: &PacketKey) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = PacketKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything; called when the next file upload starts.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
