//! File discovery.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// List the files to upload under `path`.
///
/// A regular file yields itself. A directory yields the files directly in
/// it, or every file below it when `recurse` is set. Symlinks are listed but
/// not followed. Entries that cannot be read are skipped.
pub fn scan(path: &Path, recurse: bool) -> io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is neither a file nor a directory", path.display()),
        ));
    }

    let mut walker = WalkDir::new(path)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    if !recurse {
        walker = walker.max_depth(1);
    }

    let files = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    Ok(files)
}
