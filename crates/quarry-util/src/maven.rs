//! Artifact coordinate parsing and repository path generation.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Maven Central repository URL.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Symbolic version: the repository's latest release.
pub const VERSION_RELEASE: &str = "RELEASE";
/// Symbolic version: the repository's latest published version.
pub const VERSION_LATEST: &str = "LATEST";
/// Symbolic version: the newest snapshot.
pub const VERSION_SNAPSHOT: &str = "SNAPSHOT";

/// File extension of descriptor documents.
pub const EXT_POM: &str = "pom";
/// File extension of binary artifacts.
pub const EXT_JAR: &str = "jar";

/// An immutable artifact coordinate: `group:artifact[:classifier]:version`.
///
/// The version is kept as written; it may be an exact version, a range, a
/// `{regex}` pattern, or one of the symbolic tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    group_id: String,
    artifact_id: String,
    classifier: Option<String>,
    version: String,
}

impl Coordinate {
    /// Create a coordinate. Surrounding whitespace is trimmed and an empty
    /// classifier is treated as absent.
    pub fn new(group_id: &str, artifact_id: &str, classifier: Option<&str>, version: &str) -> Self {
        Self {
            group_id: group_id.trim().to_owned(),
            artifact_id: artifact_id.trim().to_owned(),
            classifier: classifier
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned),
            version: version.trim().to_owned(),
        }
    }

    /// Parse the compact form `group[:artifact[:classifier]]:version`.
    ///
    /// Accepted shapes:
    /// - `"group"`: artifact defaults to the group, version to `RELEASE`
    /// - `"group:artifact"`: version defaults to `RELEASE`
    /// - `"group:artifact:version"`
    /// - `"group:artifact:classifier:version"`
    ///
    /// # Errors
    /// Returns `UtilError::InvalidCoordinate` when there are more than four
    /// parts or any part is empty.
    pub fn parse(coord: &str) -> Result<Self, UtilError> {
        let parts: Vec<&str> = coord.trim().split(':').map(str::trim).collect();

        if parts.len() > 4 {
            return Err(UtilError::InvalidCoordinate {
                coordinate: coord.to_owned(),
                reason: format!(
                    "expected at most 4 colon-separated parts (group:artifact:classifier:version), got {}",
                    parts.len()
                ),
            });
        }

        if let Some(i) = parts.iter().position(|p| p.is_empty()) {
            let label = match (i, parts.len()) {
                (0, _) => "group",
                (1, _) => "artifact",
                (2, 4) => "classifier",
                _ => "version",
            };
            return Err(UtilError::InvalidCoordinate {
                coordinate: coord.to_owned(),
                reason: format!("{label} is empty"),
            });
        }

        let coordinate = match parts.as_slice() {
            [group] => Self::new(group, group, None, VERSION_RELEASE),
            [group, artifact] => Self::new(group, artifact, None, VERSION_RELEASE),
            [group, artifact, version] => Self::new(group, artifact, None, version),
            [group, artifact, classifier, version] => {
                Self::new(group, artifact, Some(*classifier), version)
            }
            _ => {
                return Err(UtilError::InvalidCoordinate {
                    coordinate: coord.to_owned(),
                    reason: "expected at least a group".to_owned(),
                })
            }
        };
        Ok(coordinate)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// The version expression as written.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The same identity with a different version expression.
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.trim().to_owned(),
            ..self.clone()
        }
    }

    /// Stable identity without the version: `group:artifact[:classifier]`.
    pub fn id(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}:{}:{}", self.group_id, self.artifact_id, classifier),
            None => format!("{}:{}", self.group_id, self.artifact_id),
        }
    }

    /// Full path string: `id:version`.
    pub fn path(&self) -> String {
        format!("{}:{}", self.id(), self.version)
    }

    /// Check that the group, artifact and classifier can be used as path
    /// segments in a cache or repository directory.
    ///
    /// # Errors
    /// Returns `UtilError::InvalidCoordinate` naming the offending part.
    pub fn ensure_safe_id(&self) -> Result<(), UtilError> {
        let parts = [
            ("group", Some(self.group_id.as_str())),
            ("artifact", Some(self.artifact_id.as_str())),
            ("classifier", self.classifier.as_deref()),
        ];
        for (label, value) in parts {
            if let Some(value) = value {
                self.ensure_segment(label, value)?;
            }
        }
        Ok(())
    }

    /// Check the id and a concrete `version` before they become file paths.
    ///
    /// # Errors
    /// Returns `UtilError::InvalidCoordinate` naming the offending part.
    pub fn ensure_safe_path(&self, version: &str) -> Result<(), UtilError> {
        self.ensure_safe_id()?;
        self.ensure_segment("version", version)
    }

    fn ensure_segment(&self, label: &str, value: &str) -> Result<(), UtilError> {
        let unsafe_segment = value.is_empty()
            || value.starts_with('.')
            || value.contains("..")
            || value.contains(['/', '\\', ':', '\0']);
        if unsafe_segment {
            return Err(UtilError::InvalidCoordinate {
                coordinate: self.path(),
                reason: format!("{label} `{value}` is not a safe path segment"),
            });
        }
        Ok(())
    }

    /// The group with dots replaced by `/`.
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Directory URL holding every version of this artifact, with a trailing `/`.
    pub fn base_url(&self, repository_url: &str) -> String {
        let base = repository_url.trim_end_matches('/');
        format!("{}/{}/{}/", base, self.group_path(), self.artifact_id)
    }

    /// Published file name of `version` with the given extension.
    ///
    /// The classifier only applies to binaries; descriptors are shared by
    /// every classifier of a version.
    pub fn file_name(&self, version: &str, extension: &str) -> String {
        match (&self.classifier, extension) {
            (Some(classifier), EXT_JAR) => {
                format!("{}-{}-{}.{}", self.artifact_id, version, classifier, extension)
            }
            _ => format!("{}-{}.{}", self.artifact_id, version, extension),
        }
    }

    /// Download URL of `version`'s file in a remote repository.
    pub fn file_url(&self, repository_url: &str, version: &str, extension: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url(repository_url),
            version,
            self.file_name(version, extension)
        )
    }

    /// Path of `version`'s file inside a repository laid out on disk
    /// (`group/path/artifact/version/file`).
    pub fn repository_path(&self, root: &Path, version: &str, extension: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.group_id.split('.') {
            path.push(segment);
        }
        path.join(&self.artifact_id)
            .join(version)
            .join(self.file_name(version, extension))
    }

    /// Path of `version`'s file in a repository cache directory:
    /// `cache_root/group/artifact-version[-classifier].ext`.
    pub fn cache_path(&self, cache_root: &Path, version: &str, extension: &str) -> PathBuf {
        let file = match &self.classifier {
            Some(classifier) => {
                format!("{}-{}-{}.{}", self.artifact_id, version, classifier, extension)
            }
            None => format!("{}-{}.{}", self.artifact_id, version, extension),
        };
        cache_root.join(&self.group_id).join(file)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_three_part() {
        let coord = Coordinate::parse("org.postgresql:postgresql:42.7.3").unwrap();
        assert_eq!(coord.group_id(), "org.postgresql");
        assert_eq!(coord.artifact_id(), "postgresql");
        assert_eq!(coord.classifier(), None);
        assert_eq!(coord.version(), "42.7.3");
    }

    #[test]
    fn parse_four_part_has_classifier() {
        let coord = Coordinate::parse("com.oracle:ojdbc:jdk8:[19,)").unwrap();
        assert_eq!(coord.classifier(), Some("jdk8"));
        assert_eq!(coord.version(), "[19,)");
        assert_eq!(coord.id(), "com.oracle:ojdbc:jdk8");
        assert_eq!(coord.path(), "com.oracle:ojdbc:jdk8:[19,)");
    }

    #[test]
    fn parse_defaults_missing_segments() {
        let coord = Coordinate::parse("h2database").unwrap();
        assert_eq!(coord.artifact_id(), "h2database");
        assert_eq!(coord.version(), VERSION_RELEASE);

        let coord = Coordinate::parse("com.h2database:h2").unwrap();
        assert_eq!(coord.artifact_id(), "h2");
        assert_eq!(coord.version(), VERSION_RELEASE);
    }

    #[test]
    fn parse_rejects_five_parts() {
        let err = Coordinate::parse("a:b:c:d:e").unwrap_err().to_string();
        assert!(err.contains("invalid coordinate"), "error was: {err}");
    }

    #[test]
    fn parse_rejects_empty_parts() {
        let err = Coordinate::parse("org.example::1.0").unwrap_err().to_string();
        assert!(err.contains("artifact is empty"), "error was: {err}");
    }

    #[test]
    fn safe_id_accepts_ordinary_coordinates() {
        let coord = Coordinate::new("org.postgresql", "postgresql", Some("jdk8"), "[42,)");
        assert!(coord.ensure_safe_id().is_ok());
        assert!(coord.ensure_safe_path("42.7.3-SNAPSHOT").is_ok());
    }

    #[test]
    fn safe_path_rejects_traversal() {
        let coord = Coordinate::new("org.example", "lib", None, "1.0");
        for version in ["1/../../escaped", "..", "1\\..\\x", ".hidden", ""] {
            let err = coord.ensure_safe_path(version).unwrap_err().to_string();
            assert!(err.contains("not a safe path segment"), "error was: {err}");
        }
    }

    #[test]
    fn safe_id_rejects_separators_in_group_and_artifact() {
        assert!(Coordinate::new("..", "lib", None, "1.0").ensure_safe_id().is_err());
        assert!(Coordinate::new("org/../..", "lib", None, "1.0").ensure_safe_id().is_err());
        assert!(Coordinate::new("org.example", "../lib", None, "1.0").ensure_safe_id().is_err());
        assert!(Coordinate::new("org.example", "lib", Some("a/b"), "1.0").ensure_safe_id().is_err());
    }

    #[test]
    fn file_name_classifier_only_on_jar() {
        let coord = Coordinate::new("org.example", "lib", Some("linux"), "1.0");
        assert_eq!(coord.file_name("1.0", EXT_JAR), "lib-1.0-linux.jar");
        assert_eq!(coord.file_name("1.0", EXT_POM), "lib-1.0.pom");
    }

    #[test]
    fn file_url_normalizes_trailing_slash() {
        let coord = Coordinate::new("org.postgresql", "postgresql", None, "42.7.3");
        let a = coord.file_url("https://repo.example.com/maven", "42.7.3", EXT_POM);
        let b = coord.file_url("https://repo.example.com/maven/", "42.7.3", EXT_POM);
        assert_eq!(a, b);
        assert_eq!(
            a,
            "https://repo.example.com/maven/org/postgresql/postgresql/42.7.3/postgresql-42.7.3.pom"
        );
    }

    #[test]
    fn repository_path_layout() {
        let coord = Coordinate::new("org.postgresql", "postgresql", None, "42.7.3");
        let path = coord.repository_path(Path::new("/repo"), "42.7.3", EXT_JAR);
        assert_eq!(
            path,
            Path::new("/repo/org/postgresql/postgresql/42.7.3/postgresql-42.7.3.jar")
        );
    }

    #[test]
    fn cache_path_layout() {
        let coord = Coordinate::new("org.example", "lib", Some("linux"), "RELEASE");
        let path = coord.cache_path(Path::new("/cache"), "2.0", EXT_POM);
        assert_eq!(path, Path::new("/cache/org.example/lib-2.0-linux.pom"));
    }

    proptest! {
        #[test]
        fn parse_path_is_stable(
            group in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}",
            artifact in "[a-z][a-z0-9-]{0,10}",
            version in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
        ) {
            let text = format!("{group}:{artifact}:{version}");
            let coord = Coordinate::parse(&text).unwrap();
            prop_assert_eq!(coord.path(), text.clone());
            prop_assert_eq!(Coordinate::parse(&coord.path()).unwrap(), coord);
        }
    }
}
