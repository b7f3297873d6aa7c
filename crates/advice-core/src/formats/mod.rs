//! # Formats
//!
//! Byte-level encodings of reasoning state.

pub mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_PAYLOAD_SIZE, PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes,
    store_to_bytes,
};
