//! # Persistence Format
//!
//! Single-file snapshot of a [`MemoryStore`](crate::MemoryStore), used by the
//! `file` backend.
//!
//! Format: Header (5 bytes) + postcard-serialized [`StoreSnapshot`].
//! - 4 bytes: Magic ("MANA")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is parsed, so a corrupt
//! or oversized file is rejected without allocating for it.

use crate::storage::StoreSnapshot;
use crate::{ManaError, primitives};

/// Maximum accepted snapshot size.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

const HEADER_LEN: usize = 5;

/// The header in front of every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), ManaError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(ManaError::Serialization(
                "not a snapshot file: bad magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(ManaError::Serialization(format!(
                "unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManaError> {
        let Some(head) = bytes.get(..HEADER_LEN) else {
            return Err(ManaError::Serialization("header too short".to_string()));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a snapshot (header + payload).
pub fn snapshot_to_bytes(snapshot: &StoreSnapshot) -> Result<Vec<u8>, ManaError> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| ManaError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a snapshot produced by [`snapshot_to_bytes`].
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<StoreSnapshot, ManaError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(ManaError::Serialization(format!(
            "snapshot is {} bytes, limit is {}",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..])
        .map_err(|e| ManaError::Serialization(format!("corrupt snapshot payload: {}", e)))
}
