//! Filesystem utilities for Quarry.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read a file, returning `None` when it does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, UtilError> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write `data` to `path` through a uniquely named temp file in the same
/// directory and a rename, so readers never observe a partially written file.
///
/// # Errors
/// Returns an error if the parent directory cannot be created or the file
/// cannot be written or renamed.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), UtilError> {
    let mut tmp = temp_file_for(path)?;
    tmp.write_all(data).map_err(|source| UtilError::Io {
        path: tmp.path().display().to_string(),
        source,
    })?;
    tmp.persist(path).map_err(|e| UtilError::Io {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// A fresh temp file next to `path`, creating the directory first. Dropped
/// temp files delete themselves.
pub(crate) fn temp_file_for(path: &Path) -> Result<NamedTempFile, UtilError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })
}

/// Return the Quarry home directory (`~/.quarry`).
///
/// Resolves via `HOME` (Unix) or `USERPROFILE` (Windows).
///
/// # Errors
/// Returns an error if neither environment variable is set.
pub fn quarry_home() -> Result<PathBuf, UtilError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| UtilError::NoHomeDir)?;
    Ok(home.join(".quarry"))
}

/// Turn an arbitrary string into a single safe path component.
///
/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`, and never returns
/// `.`/`..` or an empty string.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_owned()
    } else {
        cleaned
    }
}
