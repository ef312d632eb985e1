//! Parse and validate `quarry.toml` and the user repository settings file.

pub mod config;
pub mod settings;

pub use config::{BuiltinRepository, ConfigError, RegistryConfig};
pub use settings::{RepositorySettings, SettingsError};
