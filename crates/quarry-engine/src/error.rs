//! Error types for quarry-engine.

/// Errors produced while evaluating a version expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// A `{regex}` expression does not compile.
    #[error("bad version pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A bracketed range does not parse.
    #[error("bad version range `{spec}`: {reason}")]
    InvalidRange { spec: String, reason: String },

    /// Nothing selected a version and there is nothing to fall back on.
    #[error("cannot resolve `{expression}`: the artifact has an empty version list")]
    EmptyVersionList { expression: String },
}

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A utility operation failed (I/O, transport, coordinate text).
    #[error("{0}")]
    Util(#[from] quarry_util::error::UtilError),

    /// The registry configuration is unusable.
    #[error("{0}")]
    Config(#[from] quarry_config::ConfigError),

    /// The user repository settings file could not be read or written.
    #[error("{0}")]
    Settings(#[from] quarry_config::SettingsError),

    /// A version expression could not be evaluated.
    #[error("{0}")]
    Version(#[from] VersionError),

    /// A fetched document is not well-formed XML.
    #[error("cannot parse {location}: {message}")]
    Xml { location: String, message: String },

    /// A descriptor document is well-formed but unusable.
    #[error("invalid descriptor {location}: {reason}")]
    InvalidDescriptor { location: String, reason: String },

    /// No source has the artifact.
    #[error("artifact {path} not found in any repository")]
    NotFound { path: String },

    /// The caller cancelled the resolution.
    #[error("resolution cancelled")]
    Cancelled,

    /// A parent or import chain leads back to an artifact still being resolved.
    #[error("cyclic reference: {chain}")]
    CyclicReference { chain: String },

    /// The artifact has no binary file (e.g. `pom` packaging).
    #[error("artifact {path} has packaging `{packaging}` and no binary file")]
    NoArtifactFile { path: String, packaging: String },
}

impl EngineError {
    /// Whether this failure means "not here" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Util(e) => e.is_not_found(),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }
}
