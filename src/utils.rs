use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::DownloadError;

/// Directory value that stands for the folder holding the running program.
pub const CURRENT_DIR_ALIAS: &str = "current";

/// The last `/`-delimited segment of the URL path, without query or fragment.
pub fn get_filename_from_url(url_str: &str) -> Result<String, DownloadError> {
    let url = Url::parse(url_str).map_err(|e| DownloadError::invalid_url(url_str, e.to_string()))?;

    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default();

    match filename {
        "" => Err(DownloadError::invalid_url(url_str, "URL path has no file name")),
        "." | ".." => Err(DownloadError::invalid_url(url_str, "URL path ends in a relative segment")),
        name if name.contains('\\') => Err(DownloadError::invalid_url(url_str, "file name contains a path separator")),
        name => Ok(name.to_string()),
    }
}

/// Maps the raw directory input to a path, honoring the `current` alias.
pub fn resolve_directory(raw: &str) -> PathBuf {
    if raw.eq_ignore_ascii_case(CURRENT_DIR_ALIAS) {
        return program_dir();
    }
    PathBuf::from(raw)
}

fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `file.bin` -> `file.bin.part`, `file` -> `file.part`.
pub fn staged_path(filepath: &Path) -> PathBuf {
    let mut part_filepath = filepath.to_path_buf();
    if let Some(extension) = filepath.extension() {
        let mut ext = extension.to_os_string();
        ext.push(".part");
        part_filepath.set_extension(ext);
    } else {
        part_filepath.set_extension("part");
    }
    part_filepath
}

/// Appends `_1`, `_2`, ... to the stem until no other transfer writes there.
pub fn get_unique_filepath(path: &Path, taken: &HashSet<PathBuf>) -> PathBuf {
    let is_free = |p: &Path| !taken.contains(p);
    if is_free(path) {
        return path.to_path_buf();
    }

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let new_filename = if extension.is_empty() {
            format!("{}_{}", file_stem, counter)
        } else {
            format!("{}_{}.{}", file_stem, counter, extension)
        };
        let candidate = dir.join(new_filename);
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
