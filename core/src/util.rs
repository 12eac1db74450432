//! Shared helpers for output artifacts and executable lookup.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Wall-clock timestamp slug used to name per-call artifacts.
/// Millisecond resolution, sortable: `20240131_235959_042`.
#[inline]
pub(crate) fn timestamp_slug() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Create a fresh file under `dir` named `<prefix>_<timestamp>.<ext>`.
/// The name is claimed with `create_new`, so concurrent callers inside the
/// same millisecond get `_1`, `_2`, ... suffixes instead of sharing a file.
pub(crate) fn create_artifact(
    dir: &Path,
    prefix: &str,
    ext: &str,
) -> io::Result<(PathBuf, File)> {
    let stem = format!("{}_{}", prefix, timestamp_slug());
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            dir.join(format!("{stem}.{ext}"))
        } else {
            dir.join(format!("{stem}_{n}.{ext}"))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(&p);
        if pb.exists() {
            return Some(pb);
        }
        if let Some(found) = get_from_path(&p) {
            return Some(found);
        }
    }
    get_from_path(default_bin)
}

pub(crate) fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.is_empty() {
        return None;
    }
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(bin);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}
