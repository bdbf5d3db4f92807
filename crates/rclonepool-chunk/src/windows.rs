//! Fixed-size chunk windowing.
//!
//! Splits a random-access byte source of known length into a lazy sequence
//! of `(index, offset, length)` windows of size `chunk_size`, except
//! possibly the last window, which may be shorter. Stateless: this module
//! never touches the source bytes, only arithmetic over lengths.

use rclonepool_core::{PoolError, PoolResult};

/// One chunk's position within a file, without its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
}

/// A lazy iterator over the fixed-size windows of a `total_len`-byte source.
///
/// `fileSize == 0` yields zero windows (an empty file has no chunks; this
/// implementation pins empty-file semantics to "zero chunks", and
/// `rclonepool-pool`'s upload/download paths are written to agree).
pub struct ChunkWindows {
    total_len: u64,
    chunk_size: u64,
    next_offset: u64,
    next_index: u64,
}

impl ChunkWindows {
    pub fn new(total_len: u64, chunk_size: u64) -> PoolResult<Self> {
        if chunk_size == 0 {
            return Err(PoolError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            total_len,
            chunk_size,
            next_offset: 0,
            next_index: 0,
        })
    }
}

impl Iterator for ChunkWindows {
    type Item = ChunkWindow;

    fn next(&mut self) -> Option<ChunkWindow> {
        if self.next_offset >= self.total_len {
            return None;
        }
        let remaining = self.total_len - self.next_offset;
        let length = remaining.min(self.chunk_size);
        let window = ChunkWindow {
            index: self.next_index,
            offset: self.next_offset,
            length,
        };
        self.next_offset += length;
        self.next_index += 1;
        Some(window)
    }
}

/// Computes the windows for `total_len` bytes at `chunk_size`, eagerly.
/// Convenience wrapper for callers (e.g. manifest construction) that want a
/// `Vec` rather than driving the iterator by hand.
pub fn windows(total_len: u64, chunk_size: u64) -> PoolResult<Vec<ChunkWindow>> {
    Ok(ChunkWindows::new(total_len, chunk_size)?.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_size_chunk_is_rejected() {
        assert!(matches!(
            ChunkWindows::new(10, 0),
            Err(PoolError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn empty_file_yields_no_windows() {
        let w = windows(0, 100).unwrap();
        assert!(w.is_empty());
    }

    #[test]
    fn exact_multiple_yields_equal_chunks() {
        let w = windows(250, 100).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], ChunkWindow { index: 0, offset: 0, length: 100 });
        assert_eq!(w[1], ChunkWindow { index: 1, offset: 100, length: 100 });
        assert_eq!(w[2], ChunkWindow { index: 2, offset: 200, length: 50 });
    }

    #[test]
    fn size_equal_to_chunk_size_is_one_chunk() {
        assert_eq!(windows(100, 100).unwrap().len(), 1);
    }

    #[test]
    fn size_one_less_than_chunk_size_is_one_chunk() {
        assert_eq!(windows(99, 100).unwrap().len(), 1);
    }

    #[test]
    fn size_one_more_than_chunk_size_is_two_chunks() {
        let w = windows(101, 100).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[1].length, 1);
    }

    proptest! {
        #[test]
        fn windows_cover_full_input_without_gaps(total in 0u64..=1_000_000, chunk_size in 1u64..=200_000) {
            let ws = windows(total, chunk_size).unwrap();
            let mut expected_offset = 0u64;
            for (i, w) in ws.iter().enumerate() {
                prop_assert_eq!(w.index, i as u64);
                prop_assert_eq!(w.offset, expected_offset);
                prop_assert!(w.length <= chunk_size);
                expected_offset += w.length;
            }
            prop_assert_eq!(expected_offset, total);
        }

        #[test]
        fn only_the_last_window_may_be_short(total in 1u64..=1_000_000, chunk_size in 1u64..=200_000) {
            let ws = windows(total, chunk_size).unwrap();
            let last = ws.len().saturating_sub(1);
            for (i, w) in ws.iter().enumerate() {
                if i != last {
                    prop_assert_eq!(w.length, chunk_size);
                }
            }
        }
    }
}
