//! Streaming chunk reader: turns any `AsyncRead` into a sequence of
//! `(ChunkWindow, Vec<u8>)` pairs without ever holding more than one
//! chunk's worth of bytes in memory — the "peak additional memory must be
//! O(chunk_size), not O(fileSize).

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::windows::ChunkWindow;
use rclonepool_core::{PoolError, PoolResult};

/// Reads fixed-size chunks off of an `AsyncRead` source, one at a time.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    next_offset: u64,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: u64) -> PoolResult<Self> {
        if chunk_size == 0 {
            return Err(PoolError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            reader,
            chunk_size: chunk_size as usize,
            next_index: 0,
            next_offset: 0,
        })
    }

    /// Reads the next chunk, or `None` at end of stream. A short final read
    /// (fewer than `chunk_size` bytes before EOF) becomes the manifest's
    /// last, shorter chunk.
    pub async fn next_chunk(&mut self) -> PoolResult<Option<(ChunkWindow, Vec<u8>)>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0usize;

        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        let window = ChunkWindow {
            index: self.next_index,
            offset: self.next_offset,
            length: filled as u64,
        };
        self.next_index += 1;
        self.next_offset += filled as u64;
        Ok(Some((window, buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_source_yields_no_chunks() {
        let data: &[u8] = b"";
        let mut r = ChunkReader::new(data, 10).unwrap();
        assert!(r.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn splits_into_fixed_windows_with_short_last() {
        let data = vec![b'A'; 250];
        let mut r = ChunkReader::new(data.as_slice(), 100).unwrap();

        let (w0, b0) = r.next_chunk().await.unwrap().unwrap();
        assert_eq!((w0.index, w0.offset, w0.length), (0, 0, 100));
        assert_eq!(b0.len(), 100);

        let (w1, _) = r.next_chunk().await.unwrap().unwrap();
        assert_eq!((w1.index, w1.offset, w1.length), (1, 100, 100));

        let (w2, b2) = r.next_chunk().await.unwrap().unwrap();
        assert_eq!((w2.index, w2.offset, w2.length), (2, 200, 50));
        assert_eq!(b2.len(), 50);

        assert!(r.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reassembly_equals_source() {
        let data: Vec<u8> = (0u8..=255).cycle().take(10_007).collect();
        let mut r = ChunkReader::new(data.as_slice(), 777).unwrap();

        let mut assembled = Vec::new();
        while let Some((_, bytes)) = r.next_chunk().await.unwrap() {
            assembled.extend_from_slice(&bytes);
        }
        assert_eq!(assembled, data);
    }

    #[tokio::test]
    async fn zero_chunk_size_rejected() {
        let data: &[u8] = b"x";
        assert!(ChunkReader::new(data, 0).is_err());
    }
}
