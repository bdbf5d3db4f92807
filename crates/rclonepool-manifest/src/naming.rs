//! On-remote layout:
//!
//! ```text
//! <dataPrefix>/<fileName>.chunk.<index:03d>
//! <manifestPrefix>/<sanitize(filePath)>.manifest.json
//! ```

/// Replaces `/` with `_` and trims leading/trailing `_`.
pub fn sanitize(file_path: &str) -> String {
    file_path.replace('/', "_").trim_matches('_').to_string()
}

/// `<fileName>.chunk.<index:03d>`. Index is zero-padded to three digits,
/// supporting up to 1000 chunks per file.
pub fn chunk_name(file_name: &str, index: u64) -> String {
    format!("{file_name}.chunk.{index:03}")
}

/// `<sanitize(filePath)>.manifest.json`.
pub fn manifest_name(file_path: &str) -> String {
    format!("{}.manifest.json", sanitize(file_path))
}

/// Full chunk path on a remote: `<dataPrefix>/<chunkName>`.
pub fn chunk_path(data_prefix: &str, file_name: &str, index: u64) -> String {
    format!("{data_prefix}/{}", chunk_name(file_name, index))
}

/// Full manifest path on a remote: `<manifestPrefix>/<manifestName>`.
pub fn manifest_path(manifest_prefix: &str, file_path: &str) -> String {
    format!("{manifest_prefix}/{}", manifest_name(file_path))
}
