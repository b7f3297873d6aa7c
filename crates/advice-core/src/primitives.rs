//! # Innate Primitives
//!
//! Hardcoded runtime constants for the reasoning core.
//!
//! These primitives are compiled into the binary and are immutable at runtime.

/// Magic bytes for the snapshot binary format header.
///
/// - File Header = Magic Bytes ("ADVT") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"ADVT";

/// Current serialization format version.
pub const FORMAT_VERSION: u8 = 1;

/// Default search depth used when no depth is configured.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Hard ceiling on any configured search depth.
pub const MAX_PLAN_DEPTH: usize = 64;

/// Mode label of actions produced by the walk rule.
pub const WALK_MODE: &str = "by walking";

/// Mode label of actions produced by the drive rule.
pub const DRIVE_MODE: &str = "by driving";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for entity names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum number of entities a world description may declare.
pub const MAX_WORLD_ENTITIES: usize = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ADVT");
    }

    #[test]
    fn default_depth_within_ceiling() {
        assert!(DEFAULT_MAX_DEPTH <= MAX_PLAN_DEPTH);
    }
}
