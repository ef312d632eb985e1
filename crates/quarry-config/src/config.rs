use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use quarry_util::maven::MAVEN_CENTRAL;

/// File name of the user repository settings inside the data directory.
pub const SETTINGS_FILE_NAME: &str = "maven-repositories.xml";

/// The `quarry.toml` registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Root of every repository cache and of the built-in local repository.
    /// Defaults to `~/.quarry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// User-declared repository file. Defaults to `<data_dir>/maven-repositories.xml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,
    /// Prefixes of `group:artifact:version` paths hidden from version lists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_versions: Vec<String>,
    /// Platform version matched by `jdk` profile activation clauses.
    #[serde(default = "default_jdk_version")]
    pub jdk_version: String,
    /// Built-in global repositories.
    #[serde(default = "default_repositories", rename = "repository")]
    pub repositories: Vec<BuiltinRepository>,
}

/// A built-in global repository declared in `quarry.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinRepository {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub order: i32,
    /// Groups this repository serves. Empty means every group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

fn default_jdk_version() -> String {
    "17".to_owned()
}

fn default_repositories() -> Vec<BuiltinRepository> {
    vec![BuiltinRepository {
        id: "maven-central".to_owned(),
        name: Some("Maven Central".to_owned()),
        url: MAVEN_CENTRAL.to_owned(),
        order: 0,
        scopes: Vec::new(),
    }]
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            settings_file: None,
            ignored_versions: Vec::new(),
            jdk_version: default_jdk_version(),
            repositories: default_repositories(),
        }
    }
}

impl RegistryConfig {
    /// Read and parse a `quarry.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// declares an unusable repository.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: RegistryConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Configuration for an isolated data directory, with the default
    /// built-in repositories.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: Some(data_dir.to_path_buf()),
            ..Self::default()
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for repo in &self.repositories {
            if repo.id.trim().is_empty() || repo.url.trim().is_empty() {
                return Err(ConfigError::InvalidRepository {
                    path: path.display().to_string(),
                    id: repo.id.clone(),
                    reason: "both `id` and `url` are required".to_owned(),
                });
            }
        }
        if let Some(dup) = self
            .repositories
            .iter()
            .enumerate()
            .find(|(i, r)| self.repositories.iter().skip(i + 1).any(|o| o.id == r.id))
            .map(|(_, r)| r)
        {
            return Err(ConfigError::InvalidRepository {
                path: path.display().to_string(),
                id: dup.id.clone(),
                reason: "declared more than once".to_owned(),
            });
        }
        Ok(())
    }

    /// The resolved data directory.
    ///
    /// # Errors
    /// Returns an error if no data directory is configured and the home
    /// directory cannot be determined.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(quarry_util::fs::quarry_home()?),
        }
    }

    /// The resolved user repository settings file.
    ///
    /// # Errors
    /// Same as [`RegistryConfig::data_dir`].
    pub fn settings_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.settings_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join(SETTINGS_FILE_NAME)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid quarry.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid repository `{id}` in {path}: {reason}")]
    InvalidRepository {
        path: String,
        id: String,
        reason: String,
    },
    #[error("{0}")]
    Util(#[from] quarry_util::error::UtilError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = tempdir();
        let path = dir.path().join("quarry.toml");
        fs::write(&path, "").unwrap_or_else(|e| panic!("{e}"));

        let config = RegistryConfig::from_path(&path).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.jdk_version, "17");
    }

    #[test]
    fn parse_full_config() {
        let dir = tempdir();
        let path = dir.path().join("quarry.toml");
        fs::write(
            &path,
            r#"
data_dir = "/var/lib/quarry"
ignored_versions = ["com.mysql:mysql-connector-j:8.0.0"]
jdk_version = "11.0.2"

[[repository]]
id = "corp"
url = "https://nexus.corp.example/repository/maven/"
order = 5
scopes = ["com.corp"]
"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let config = RegistryConfig::from_path(&path).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/quarry")));
        assert_eq!(config.jdk_version, "11.0.2");
        assert_eq!(config.ignored_versions.len(), 1);
        let repo = config
            .repositories
            .first()
            .unwrap_or_else(|| panic!("missing repository"));
        assert_eq!(repo.id, "corp");
        assert_eq!(repo.order, 5);
        assert_eq!(repo.scopes, vec!["com.corp".to_owned()]);
        assert_eq!(
            config.settings_path().unwrap_or_else(|e| panic!("{e}")),
            PathBuf::from("/var/lib/quarry").join(SETTINGS_FILE_NAME)
        );
    }

    #[test]
    fn rejects_duplicate_repository_ids() {
        let dir = tempdir();
        let path = dir.path().join("quarry.toml");
        fs::write(
            &path,
            r#"
[[repository]]
id = "a"
url = "https://one.example/"

[[repository]]
id = "a"
url = "https://two.example/"
"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let err = RegistryConfig::from_path(&path)
            .err()
            .unwrap_or_else(|| panic!("expected an error"));
        assert!(err.to_string().contains("more than once"), "error was: {err}");
    }

    #[test]
    fn rejects_invalid_toml() {
        let dir = tempdir();
        let path = dir.path().join("quarry.toml");
        fs::write(&path, "data_dir = [").unwrap_or_else(|e| panic!("{e}"));
        assert!(RegistryConfig::from_path(&path).is_err());
    }
}
