//! Artifact file download and atomic placement into a cache directory.

use std::path::{Path, PathBuf};

use crate::error::UtilError;
use crate::transport::{Credentials, Transport};

/// Result of ensuring an artifact file is available locally.
#[derive(Debug, Clone)]
pub struct ArtifactResult {
    /// Path to the artifact on disk.
    pub path: PathBuf,
    /// `true` if the artifact was downloaded this call, `false` if it already existed.
    pub freshly_downloaded: bool,
}

/// Ensure a single-file artifact exists at `dest`, downloading from `url` if needed.
///
/// 1. If `dest` already exists, return immediately with `freshly_downloaded = false`.
/// 2. If missing, create parent directories, stream the download into a
///    uniquely named temp file next to `dest`, then rename it into place.
///    Concurrent callers each download into their own temp file, so the
///    file at `dest` is always one complete download.
/// 3. If the rename fails because another caller placed the file, keep theirs.
/// 4. The temp file is removed on every error path.
///
/// # Errors
/// Returns an error if the download fails or an I/O operation fails.
pub fn ensure_artifact(
    transport: &dyn Transport,
    url: &str,
    credentials: Option<&Credentials>,
    dest: &Path,
) -> Result<ArtifactResult, UtilError> {
    if dest.exists() {
        return Ok(ArtifactResult {
            path: dest.to_path_buf(),
            freshly_downloaded: false,
        });
    }

    let mut tmp = crate::fs::temp_file_for(dest)?;
    transport.fetch_to(url, credentials, &mut tmp)?;

    match tmp.persist(dest) {
        Ok(_) => {}
        Err(_) if dest.exists() => {}
        Err(e) => {
            return Err(UtilError::Io {
                path: dest.display().to_string(),
                source: e.error,
            })
        }
    }

    Ok(ArtifactResult {
        path: dest.to_path_buf(),
        freshly_downloaded: true,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingTransport {
        body: Option<&'static [u8]>,
        calls: AtomicUsize,
    }

    impl Transport for CountingTransport {
        fn fetch(&self, url: &str, _: Option<&Credentials>) -> Result<Vec<u8>, UtilError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body.map(<[u8]>::to_vec).ok_or_else(|| UtilError::NotFound {
                url: url.to_owned(),
            })
        }
    }

    #[test]
    fn downloads_missing_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("org.example").join("lib-1.0.jar");
        let transport = CountingTransport {
            body: Some(b"jar"),
            calls: AtomicUsize::new(0),
        };

        let result = ensure_artifact(&transport, "http://repo/lib-1.0.jar", None, &dest).unwrap();
        assert!(result.freshly_downloaded);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jar");
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn existing_artifact_is_not_fetched() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("lib-1.0.jar");
        std::fs::write(&dest, b"cached").unwrap();
        let transport = CountingTransport {
            body: Some(b"fresh"),
            calls: AtomicUsize::new(0),
        };

        let result = ensure_artifact(&transport, "http://repo/lib-1.0.jar", None, &dest).unwrap();
        assert!(!result.freshly_downloaded);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"cached");
    }

    #[test]
    fn failed_download_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("lib-1.0.jar");
        let transport = CountingTransport {
            body: None,
            calls: AtomicUsize::new(0),
        };

        let err = ensure_artifact(&transport, "http://repo/lib-1.0.jar", None, &dest).unwrap_err();
        assert!(err.is_not_found());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    /// Writes the body in small chunks, yielding between them, so concurrent
    /// downloads interleave.
    struct ChunkedTransport {
        body: Vec<u8>,
    }

    impl Transport for ChunkedTransport {
        fn fetch(&self, _: &str, _: Option<&Credentials>) -> Result<Vec<u8>, UtilError> {
            Ok(self.body.clone())
        }

        fn fetch_to(
            &self,
            url: &str,
            _: Option<&Credentials>,
            dest: &mut dyn std::io::Write,
        ) -> Result<u64, UtilError> {
            for chunk in self.body.chunks(256) {
                dest.write_all(chunk).map_err(|source| UtilError::Io {
                    path: url.to_owned(),
                    source,
                })?;
                std::thread::yield_now();
            }
            Ok(self.body.len() as u64)
        }
    }

    #[test]
    fn concurrent_downloads_place_one_complete_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("org.example").join("lib-1.0.jar");
        let body: Vec<u8> = (0..64 * 1024u32)
            .map(|i| u8::try_from(i % 251).unwrap())
            .collect();
        let transport = ChunkedTransport { body: body.clone() };

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    ensure_artifact(&transport, "http://repo/lib-1.0.jar", None, &dest).unwrap();
                });
            }
        });

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }
}
