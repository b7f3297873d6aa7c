//! # Snapshot Format
//!
//! Binary serialization for fact store snapshots.
//!
//! File I/O lives in the app layer; this module only transforms bytes.
//!
//! Format: Header (5 bytes) + postcard-serialized store.
//! - 4 bytes: Magic ("ADVT")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is deserialized.

use crate::store::{FactStore, SerializableStore, Snapshot};
use crate::{AdviceError, primitives};

/// Maximum accepted input size, checked before deserialization.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header preceding all snapshot data.
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

    pub fn validate(&self) -> Result<(), AdviceError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(AdviceError::SerializationError(
                "invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(AdviceError::SerializationError(format!(
                "unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AdviceError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(AdviceError::SerializationError(
                "header too short".to_string(),
            )),
        }
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to bytes (header + payload).
pub fn store_to_bytes(store: &FactStore) -> Result<Vec<u8>, AdviceError> {
    let payload = postcard::to_stdvec(&SerializableStore::from(store))
        .map_err(|e| AdviceError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE.saturating_add(payload.len()));
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Serialize a snapshot to bytes.
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, AdviceError> {
    store_to_bytes(snapshot.store())
}

/// Deserialize a snapshot from bytes.
///
/// Rejects data that is too short, too large or carries a foreign header.
/// Facts naming undeclared entities are dropped on load.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, AdviceError> {
    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(AdviceError::SerializationError(format!(
            "data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let serializable: SerializableStore = postcard::from_bytes(payload).map_err(|e| {
        AdviceError::SerializationError(format!("failed to deserialize snapshot: {e}"))
    })?;

    Ok(Snapshot::from(FactStore::from(serializable)))
}

// =============================================================================
// TESTS
// =============================================================================
