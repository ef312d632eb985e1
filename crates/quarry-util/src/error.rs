//! Error types for quarry-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The remote side reported that the resource does not exist.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// A fetch failed for any other reason.
    #[error("cannot fetch {url}: {message}")]
    Transport { url: String, message: String },

    /// A coordinate string is malformed.
    #[error("invalid coordinate \"{coordinate}\": {reason}")]
    InvalidCoordinate { coordinate: String, reason: String },

    /// Cannot determine the user's home directory.
    #[error("cannot determine home directory, set the HOME environment variable")]
    NoHomeDir,
}

impl UtilError {
    /// Whether this error means the resource is simply absent at the source.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
