use thiserror::Error;

pub type PoolResult<T> = Result<T, PoolError>;

/// The error taxonomy for rclonepool. Each variant is a distinct kind, not
/// a wrapper type — callers match on variant, not on a downcast.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("transport error on {remote}: {detail}")]
    Transport { remote: String, detail: String },

    #[error("transport timeout on {remote} after {elapsed_ms}ms")]
    TransportTimeout { remote: String, elapsed_ms: u64 },

    #[error("no eligible remote for {chunk_size} bytes")]
    NoEligibleRemote { chunk_size: u64 },

    #[error("temp directory full: {0}")]
    TempFull(String),

    #[error("manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("manifest save failed: zero of {attempted} remotes acked for {path}")]
    ManifestSaveFailed { path: String, attempted: usize },

    #[error("manifest corrupt ({remote}): {reason}")]
    ManifestCorrupt { remote: String, reason: String },

    #[error("chunk missing: index {index} of {path}")]
    ChunkMissing { path: String, index: u64 },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("unsatisfiable range for {path} ({file_size} bytes)")]
    UnsatisfiableRange { path: String, file_size: u64 },

    #[error("upload failed for {path}: {reason}")]
    UploadFailed { path: String, reason: String },

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PoolError {
    /// Maps a domain error to the CLI exit codes:
    /// 0 success, 1 generic failure, 2 misuse, 3 not-found, 4 partial-failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            PoolError::ManifestNotFound(_) | PoolError::ChunkMissing { .. } => 3,
            PoolError::ConfigInvalid(_) | PoolError::InvalidRange(_) | PoolError::InvalidChunkSize(_) => 2,
            PoolError::ManifestSaveFailed { .. } | PoolError::UploadFailed { .. } => 4,
            _ => 1,
        }
    }
}
