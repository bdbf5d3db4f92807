//! Directory synthesis: the WebDAV surface has no real directories, only
//! file paths recorded in manifests. The set of directories at any depth
//! is derived from path components of those known files.

use std::collections::BTreeSet;

use rclonepool_pool::FileSummary;

#[derive(Debug, Clone)]
pub enum Entry {
    File(FileSummary),
    Dir(String),
}

/// Immediate children of `dir` (e.g. `"/"` or `"/movies"`) among `files`.
/// Subdirectories are deduplicated; files are listed as-is.
pub fn immediate_children(dir: &str, files: &[FileSummary]) -> Vec<Entry> {
    let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir.trim_end_matches('/')) };
    let mut dir_names = BTreeSet::new();
    let mut out = Vec::new();

    for f in files {
        let Some(rest) = f.file_path.strip_prefix(&prefix) else { continue };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((sub, _)) => {
                dir_names.insert(sub.to_string());
            }
            None => out.push(Entry::File(f.clone())),
        }
    }

    for name in dir_names {
        out.push(Entry::Dir(name));
    }
    out
}

/// True if `path` is a known file, or a prefix of any known file's path
/// (i.e. a virtual directory), or the root.
pub fn is_directory(path: &str, files: &[FileSummary]) -> bool {
    if path == "/" {
        return true;
    }
    let prefix = format!("{}/", path.trim_end_matches('/'));
    files.iter().any(|f| f.file_path.starts_with(&prefix))
}

pub fn find_file<'a>(path: &str, files: &'a [FileSummary]) -> Option<&'a FileSummary> {
    files.iter().find(|f| f.file_path == path)
}
