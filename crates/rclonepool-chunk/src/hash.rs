//! Manifest checksum helper.
//!
//! The manifest's `checksum` field is a weak integrity marker only, not a
//! content-addressing key. A truncated BLAKE3 digest of the chunk layout
//! (remote, path, size, offset per chunk) is cheap to compute and cheap
//! to store.

use rclonepool_core::ChunkDescriptor;

/// Computes a short opaque checksum string over a chunk layout.
pub fn layout_checksum(chunks: &[ChunkDescriptor]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in chunks {
        hasher.update(&c.index.to_le_bytes());
        hasher.update(c.remote.as_bytes());
        hasher.update(c.path.as_bytes());
        hasher.update(&c.size.to_le_bytes());
        hasher.update(&c.offset.to_le_bytes());
    }
    let hash = hasher.finalize();
    hash.to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            index,
            remote: "r2:".into(),
            path: format!("data/f.chunk.{index:03}"),
            size: 100,
            offset: index * 100,
        }
    }

    #[test]
    fn checksum_is_deterministic() {
        let chunks = vec![chunk(0), chunk(1)];
        assert_eq!(layout_checksum(&chunks), layout_checksum(&chunks));
    }

    #[test]
    fn checksum_changes_with_layout() {
        let a = vec![chunk(0), chunk(1)];
        let b = vec![chunk(0)];
        assert_ne!(layout_checksum(&a), layout_checksum(&b));
    }

    #[test]
    fn checksum_of_empty_layout_is_stable() {
        assert_eq!(layout_checksum(&[]), layout_checksum(&[]));
        assert_eq!(layout_checksum(&[]).len(), 16);
    }
}
