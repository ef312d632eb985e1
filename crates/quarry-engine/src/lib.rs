#![forbid(unsafe_code)]
//! Artifact resolution: version expressions, metadata, descriptor merging,
//! repositories and the registry that searches them.

pub mod descriptor;
pub mod error;
pub mod expr;
pub mod metadata;
pub mod monitor;
mod properties;
pub mod range;
pub mod registry;
pub mod repository;
mod resolver;
#[cfg(test)]
mod testing;
pub mod version;
mod xml;

pub use descriptor::{Dependency, Descriptor, License, Profile, Scope};
pub use error::{EngineError, VersionError};
pub use expr::VersionExpression;
pub use metadata::ArtifactMetadata;
pub use monitor::{CancelFlag, NullMonitor, ProgressMonitor};
pub use registry::Registry;
pub use repository::{Repository, RepositoryKind};
pub use version::ArtifactVersion;
