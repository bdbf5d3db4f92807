use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// A single chunk's placement: which remote, what path on that remote, and
/// where it sits in the reassembled file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub index: u64,
    pub remote: String,
    pub path: String,
    pub size: u64,
    pub offset: u64,
}

/// The sole persisted metadata record for a logical file, stored redundantly
/// on every configured remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub file_path: String,
    pub file_name: String,
    pub remote_dir: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u64,
    pub chunks: Vec<ChunkDescriptor>,
    pub created_at: f64,
    pub checksum: String,
    /// Unknown keys from a previously-loaded manifest, preserved and echoed
    /// back on save for forward compatibility.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Split `file_path` (POSIX-style, leading `/`) into `(remote_dir, file_name)`
    /// such that `remote_dir + "/" + file_name == file_path`.
    pub fn split_path(file_path: &str) -> (String, String) {
        match file_path.rfind('/') {
            Some(idx) => {
                let dir = &file_path[..idx];
                let name = &file_path[idx + 1..];
                (if dir.is_empty() { "/".to_string() } else { dir.to_string() }, name.to_string())
            }
            None => ("/".to_string(), file_path.to_string()),
        }
    }

    /// Checks structural invariants 1-4. Invariant 5 (remote membership)
    /// is checked at use time against the live config, not here.
    pub fn validate(&self) -> PoolResult<()> {
        let sum: u64 = self.chunks.iter().map(|c| c.size).sum();
        if sum != self.file_size {
            return Err(PoolError::ManifestCorrupt {
                remote: self.file_path.clone(),
                reason: format!(
                    "sum of chunk sizes ({sum}) does not match file_size ({})",
                    self.file_size
                ),
            });
        }

        if self.chunks.len() as u64 != self.chunk_count {
            return Err(PoolError::ManifestCorrupt {
                remote: self.file_path.clone(),
                reason: format!(
                    "chunk_count ({}) does not match chunks.len() ({})",
                    self.chunk_count,
                    self.chunks.len()
                ),
            });
        }

        let mut expected_offset = 0u64;
        for (i, c) in self.chunks.iter().enumerate() {
            if c.index != i as u64 {
                return Err(PoolError::ManifestCorrupt {
                    remote: self.file_path.clone(),
                    reason: format!("chunk at position {i} has index {}", c.index),
                });
            }
            if c.offset != expected_offset {
                return Err(PoolError::ManifestCorrupt {
                    remote: self.file_path.clone(),
                    reason: format!(
                        "chunk {i} offset {} does not follow prefix sum (expected {expected_offset})",
                        c.offset
                    ),
                });
            }
            let is_last = i + 1 == self.chunks.len();
            if c.size > self.chunk_size {
                return Err(PoolError::ManifestCorrupt {
                    remote: self.file_path.clone(),
                    reason: format!("chunk {i} size {} exceeds chunk_size {}", c.size, self.chunk_size),
                });
            }
            if !is_last && c.size < self.chunk_size {
                return Err(PoolError::ManifestCorrupt {
                    remote: self.file_path.clone(),
                    reason: format!("non-last chunk {i} has short size {}", c.size),
                });
            }
            expected_offset += c.size;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64, size: u64, offset: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            index,
            remote: "r2:".into(),
            path: format!("data/f.chunk.{index:03}"),
            size,
            offset,
        }
    }

    fn manifest(chunk_size: u64, chunks: Vec<ChunkDescriptor>) -> Manifest {
        let file_size = chunks.iter().map(|c| c.size).sum();
        Manifest {
            version: 1,
            file_path: "/t/a.bin".into(),
            file_name: "a.bin".into(),
            remote_dir: "/t".into(),
            file_size,
            chunk_size,
            chunk_count: chunks.len() as u64,
            chunks,
            created_at: 0.0,
            checksum: "deadbeef".into(),
            extra: Default::default(),
        }
    }

    #[test]
    fn split_path_basic() {
        assert_eq!(
            Manifest::split_path("/t/a.bin"),
            ("/t".to_string(), "a.bin".to_string())
        );
        assert_eq!(
            Manifest::split_path("/a.bin"),
            ("/".to_string(), "a.bin".to_string())
        );
    }

    #[test]
    fn validate_three_chunk_manifest() {
        let m = manifest(100, vec![chunk(0, 100, 0), chunk(1, 100, 100), chunk(2, 50, 200)]);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_prefix_sum() {
        let mut m = manifest(100, vec![chunk(0, 100, 0), chunk(1, 100, 150)]);
        m.file_size = 200;
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_non_last_chunk() {
        let m = manifest(100, vec![chunk(0, 50, 0), chunk(1, 100, 50)]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_index_gap() {
        let m = manifest(100, vec![chunk(0, 100, 0), chunk(2, 100, 100)]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_empty_file_zero_chunks() {
        let m = manifest(100, vec![]);
        assert!(m.validate().is_ok());
        assert_eq!(m.file_size, 0);
    }
}
