//! The fetch seam between the resolver and the network.
//!
//! Everything the resolver downloads goes through [`Transport::fetch`]. The
//! default implementation, [`HttpTransport`], speaks HTTP(S) through ureq and
//! also reads `file://` URLs so that plain directories can act as remote
//! repositories.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use base64::Engine;

use crate::error::UtilError;

/// Username/password pair sent with every request to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_owned(),
            password: password.to_owned(),
        }
    }

    /// Value of the `Authorization` header for HTTP basic authentication.
    pub fn basic_auth_header(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.user, self.password));
        format!("Basic {token}")
    }
}

/// Fetches the bytes behind a URL.
pub trait Transport: Send + Sync {
    /// Fetch the whole document at `url`.
    ///
    /// # Errors
    /// Returns `UtilError::NotFound` when the resource does not exist and
    /// `UtilError::Transport` for any other failure.
    fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>, UtilError>;

    /// Stream the document at `url` into `dest`, returning the byte count.
    ///
    /// # Errors
    /// Same as [`Transport::fetch`], plus write failures on `dest`.
    fn fetch_to(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
        dest: &mut dyn Write,
    ) -> Result<u64, UtilError> {
        let data = self.fetch(url, credentials)?;
        dest.write_all(&data).map_err(|source| UtilError::Io {
            path: url.to_owned(),
            source,
        })?;
        Ok(data.len() as u64)
    }
}

/// HTTP(S) and `file://` transport backed by a shared ureq agent.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_connect(Some(Duration::from_secs(30)))
                .timeout_global(Some(Duration::from_secs(600)))
                .build(),
        );
        Self { agent }
    }

    fn open(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<ureq::http::Response<ureq::Body>, UtilError> {
        let mut request = self.agent.get(url);
        if let Some(credentials) = credentials {
            request = request.header("Authorization", credentials.basic_auth_header());
        }
        request.call().map_err(|e| match e {
            ureq::Error::StatusCode(404 | 410) => UtilError::NotFound {
                url: url.to_owned(),
            },
            other => UtilError::Transport {
                url: url.to_owned(),
                message: other.to_string(),
            },
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>, UtilError> {
        if let Some(path) = file_url_path(url) {
            return read_file_url(url, path);
        }
        let response = self.open(url, credentials)?;
        let mut body = response.into_body();
        let mut data = Vec::new();
        body.as_reader()
            .read_to_end(&mut data)
            .map_err(|e| UtilError::Transport {
                url: url.to_owned(),
                message: e.to_string(),
            })?;
        Ok(data)
    }

    fn fetch_to(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
        dest: &mut dyn Write,
    ) -> Result<u64, UtilError> {
        if let Some(path) = file_url_path(url) {
            let data = read_file_url(url, path)?;
            dest.write_all(&data).map_err(|source| UtilError::Io {
                path: url.to_owned(),
                source,
            })?;
            return Ok(data.len() as u64);
        }

        let response = self.open(url, credentials)?;
        let mut body = response.into_body();
        let mut reader = body.as_reader();
        let mut copied: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).map_err(|e| UtilError::Transport {
                url: url.to_owned(),
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            let Some(chunk) = buf.get(..n) else {
                break; // unreachable: n is bounded by buf.len()
            };
            dest.write_all(chunk).map_err(|source| UtilError::Io {
                path: url.to_owned(),
                source,
            })?;
            copied = copied.saturating_add(n as u64);
        }

        Ok(copied)
    }
}

/// The filesystem path of a `file://` URL, if `url` is one.
pub fn file_url_path(url: &str) -> Option<&Path> {
    url.strip_prefix("file://").map(Path::new)
}

fn read_file_url(url: &str, path: &Path) -> Result<Vec<u8>, UtilError> {
    if path.is_dir() {
        return Ok(directory_listing(path).into_bytes());
    }
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            UtilError::NotFound {
                url: url.to_owned(),
            }
        } else {
            UtilError::Io {
                path: path.display().to_string(),
                source,
            }
        }
    })
}

/// Render a directory as the HTML index a web server would serve, so that
/// directory-scraping callers work the same against `file://` URLs.
fn directory_listing(dir: &Path) -> String {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    if e.path().is_dir() {
                        format!("{name}/")
                    } else {
                        name
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    let mut html = String::from("<html><body>\n<a href=\"../\">../</a>\n");
    for name in names {
        html.push_str(&format!("<a href=\"{name}\">{name}</a>\n"));
    }
    html.push_str("</body></html>\n");
    html
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn basic_auth_header_is_base64() {
        let credentials = Credentials::new("user", "secret");
        assert_eq!(credentials.basic_auth_header(), "Basic dXNlcjpzZWNyZXQ=");
    }

    #[test]
    fn file_url_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.xml");
        fs::write(&path, b"<metadata/>").unwrap();

        let url = format!("file://{}", path.display());
        let data = HttpTransport::new().fetch(&url, None).unwrap();
        assert_eq!(data, b"<metadata/>");
    }

    #[test]
    fn file_url_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("file://{}", tmp.path().join("missing.xml").display());
        let err = HttpTransport::new().fetch(&url, None).unwrap_err();
        assert!(err.is_not_found(), "error was: {err}");
    }

    #[test]
    fn file_url_directory_is_listed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("1.0")).unwrap();
        fs::create_dir_all(tmp.path().join("1.1")).unwrap();

        let url = format!("file://{}", tmp.path().display());
        let html = String::from_utf8(HttpTransport::new().fetch(&url, None).unwrap()).unwrap();
        assert!(html.contains("href=\"1.0/\""), "listing was: {html}");
        assert!(html.contains("href=\"1.1/\""), "listing was: {html}");
    }

    #[test]
    fn fetch_to_streams_file_url() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lib.jar");
        fs::write(&path, b"jar-bytes").unwrap();

        let mut out = Vec::new();
        let url = format!("file://{}", path.display());
        let n = HttpTransport::new().fetch_to(&url, None, &mut out).unwrap();
        assert_eq!(n, 9);
        assert_eq!(out, b"jar-bytes");
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let err = HttpTransport::new()
            .fetch("http://127.0.0.1:1/nonexistent", None)
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("cannot fetch"), "error was: {err}");
    }
}
