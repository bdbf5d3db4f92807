//! rclonepool-chunk: fixed-size streaming chunker and manifest checksum hashing.
//!
//! - `windows`: pure arithmetic over `(total_len, chunk_size)` — the chunk
//!   layout a manifest records.
//! - `stream`: drives an `AsyncRead` source through that layout one chunk
//!   at a time, bounding peak memory to `O(chunk_size)`.
//! - `hash`: the manifest's weak integrity-marker checksum.

pub mod hash;
pub mod stream;
pub mod windows;

pub use hash::layout_checksum;
pub use stream::ChunkReader;
pub use windows::{windows, ChunkWindow, ChunkWindows};
