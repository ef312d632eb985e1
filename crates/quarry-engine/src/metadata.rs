//! Published-version metadata of one artifact in one repository.
//!
//! The list comes from `maven-metadata.xml` next to the artifact's version
//! directories. When that document is missing or broken the directory
//! index is scraped instead; when both fail the list is empty.

use std::path::Path;
use std::sync::OnceLock;

use quarry_util::maven::Coordinate;
use quarry_util::transport::{Credentials, Transport};
use regex::Regex;

use crate::error::{EngineError, VersionError};
use crate::expr::{self, VersionExpression};
use crate::monitor::{self, ProgressMonitor};
use crate::xml;

pub const MAVEN_METADATA_XML: &str = "maven-metadata.xml";

/// Versions published for a versionless coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    coordinate: Coordinate,
    versions: Vec<String>,
    latest: Option<String>,
    release: Option<String>,
    /// Epoch milliseconds.
    last_update: Option<u64>,
}

impl ArtifactMetadata {
    pub fn empty(coordinate: &Coordinate) -> Self {
        Self {
            coordinate: coordinate.with_version(""),
            versions: Vec::new(),
            latest: None,
            release: None,
            last_update: None,
        }
    }

    /// Parse a `maven-metadata.xml` document. `<version>` entries keep
    /// document order and duplicates.
    ///
    /// # Errors
    /// Returns `EngineError::Xml` if the document is not well-formed.
    pub fn parse(coordinate: &Coordinate, text: &str, location: &str) -> Result<Self, EngineError> {
        let doc = xml::parse(text, location)?;
        let mut metadata = Self::empty(coordinate);

        for node in doc.descendants().filter(|n| n.is_element()) {
            let in_snapshot = node
                .ancestors()
                .any(|a| a.has_tag_name("snapshotVersion"));
            if in_snapshot {
                continue;
            }
            match node.tag_name().name() {
                "version" => metadata.versions.extend(xml::text(node)),
                "latest" => metadata.latest = metadata.latest.or_else(|| xml::text(node)),
                "release" => metadata.release = metadata.release.or_else(|| xml::text(node)),
                "lastUpdate" => {
                    let raw = xml::text(node).unwrap_or_default();
                    match raw.parse() {
                        Ok(millis) => metadata.last_update = Some(millis),
                        Err(_) => tracing::warn!("{location}: bad lastUpdate `{raw}`"),
                    }
                }
                _ => {}
            }
        }
        Ok(metadata)
    }

    /// Build the version list from an HTML directory index: every
    /// `href="NAME/"` names a version, `..` excepted.
    pub fn from_listing(coordinate: &Coordinate, html: &str) -> Self {
        static HREF: OnceLock<Option<Regex>> = OnceLock::new();
        let mut metadata = Self::empty(coordinate);
        let Some(href) = HREF.get_or_init(|| Regex::new(r#"href="([^"]*/)""#).ok()) else {
            return metadata;
        };

        for capture in href.captures_iter(html) {
            let Some(link) = capture.get(1) else {
                continue;
            };
            let link = link.as_str().trim_end_matches('/');
            let name = link.rsplit('/').next().unwrap_or(link);
            if name.is_empty() || name == ".." || name == "." {
                continue;
            }
            metadata.versions.push(name.to_owned());
        }
        metadata
    }

    pub fn from_versions(coordinate: &Coordinate, versions: Vec<String>) -> Self {
        Self {
            versions,
            ..Self::empty(coordinate)
        }
    }

    /// The versionless coordinate these versions belong to.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    pub fn last_update(&self) -> Option<u64> {
        self.last_update
    }

    /// Drop versions whose `group:artifact:version` starts with any of `prefixes`.
    pub fn remove_ignored(&mut self, prefixes: &[String]) {
        if prefixes.is_empty() {
            return;
        }
        let group = self.coordinate.group_id().to_owned();
        let artifact = self.coordinate.artifact_id().to_owned();
        self.versions.retain(|version| {
            let path = format!("{group}:{artifact}:{version}");
            !prefixes.iter().any(|p| path.starts_with(p.as_str()))
        });
    }

    /// Versions matching `filter`, in list order. Non-pattern filters return
    /// the whole list.
    ///
    /// # Errors
    /// Returns an error if `filter` is a malformed regex or range.
    pub fn list_versions(&self, filter: &str) -> Result<Vec<String>, VersionError> {
        if !expr::is_pattern(filter) {
            return Ok(self.versions.clone());
        }
        let expression = VersionExpression::parse(filter)?;
        Ok(self
            .versions
            .iter()
            .filter(|v| expression.matches(v))
            .cloned()
            .collect())
    }

    /// Evaluate `expression` against this list.
    ///
    /// # Errors
    /// Returns `VersionError::EmptyVersionList` when nothing can be selected.
    pub fn select(&self, raw: &str, expression: &VersionExpression) -> Result<String, VersionError> {
        expression.select(raw, &self.versions, self.release(), self.latest())
    }
}

/// Load metadata from a remote repository.
///
/// Transport and parse failures are recovered; only cancellation is an error.
pub(crate) fn load_remote(
    transport: &dyn Transport,
    credentials: Option<&Credentials>,
    repository_url: &str,
    coordinate: &Coordinate,
    monitor: &dyn ProgressMonitor,
) -> Result<ArtifactMetadata, EngineError> {
    let base_url = coordinate.base_url(repository_url);
    let metadata_url = format!("{base_url}{MAVEN_METADATA_XML}");
    monitor::checkpoint(monitor, &format!("Load metadata {}", coordinate.id()))?;

    let parsed = transport
        .fetch(&metadata_url, credentials)
        .map_err(EngineError::from)
        .and_then(|bytes| xml::decode(bytes, &metadata_url))
        .and_then(|text| ArtifactMetadata::parse(coordinate, &text, &metadata_url));
    match parsed {
        Ok(metadata) => return Ok(metadata),
        Err(e) if e.is_not_found() => tracing::debug!("{metadata_url}: not found"),
        Err(e) => tracing::warn!("{e}"),
    }

    monitor::checkpoint(monitor, &format!("List directory {base_url}"))?;
    match transport.fetch(&base_url, credentials) {
        Ok(bytes) => Ok(ArtifactMetadata::from_listing(
            coordinate,
            &String::from_utf8_lossy(&bytes),
        )),
        Err(e) => {
            tracing::debug!("{base_url}: no directory listing: {e}");
            Ok(ArtifactMetadata::empty(coordinate))
        }
    }
}

/// Load metadata from a repository laid out on disk: `maven-metadata.xml`
/// when present, else the names of the artifact's subdirectories.
pub(crate) fn load_local(coordinate: &Coordinate, artifact_dir: &Path) -> ArtifactMetadata {
    let metadata_path = artifact_dir.join(MAVEN_METADATA_XML);
    let location = metadata_path.display().to_string();
    if let Ok(text) = std::fs::read_to_string(&metadata_path) {
        match ArtifactMetadata::parse(coordinate, &text, &location) {
            Ok(metadata) => return metadata,
            Err(e) => tracing::warn!("{e}"),
        }
    }

    let mut versions: Vec<String> = std::fs::read_dir(artifact_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    versions.sort();
    ArtifactMetadata::from_versions(coordinate, versions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::monitor::NullMonitor;
    use crate::testing::MemoryTransport;

    const REPO: &str = "https://repo.example/maven2/";

    fn coordinate() -> Coordinate {
        Coordinate::parse("org.postgresql:postgresql:RELEASE").unwrap()
    }

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.postgresql</groupId>
  <artifactId>postgresql</artifactId>
  <versioning>
    <latest>42.7.3</latest>
    <release>42.7.3</release>
    <versions>
      <version>42.6.0</version>
      <version>42.7.3</version>
      <version>42.7.1</version>
      <version>42.7.1</version>
    </versions>
    <lastUpdated>20240315000000</lastUpdated>
    <lastUpdate>1710460800000</lastUpdate>
  </versioning>
</metadata>"#;

    #[test]
    fn parse_keeps_document_order_and_duplicates() {
        let metadata = ArtifactMetadata::parse(&coordinate(), METADATA, "test").unwrap();
        assert_eq!(metadata.versions(), ["42.6.0", "42.7.3", "42.7.1", "42.7.1"]);
        assert_eq!(metadata.latest(), Some("42.7.3"));
        assert_eq!(metadata.release(), Some("42.7.3"));
        assert_eq!(metadata.last_update(), Some(1_710_460_800_000));
        assert_eq!(metadata.coordinate().id(), "org.postgresql:postgresql");
    }

    #[test]
    fn listing_scrapes_directories() {
        let html = r#"<html><body>
<a href="../">../</a>
<a href="1.0/">1.0/</a>
<a href="https://repo.example/maven2/g/a/1.1/">1.1/</a>
<a href="maven-metadata.xml">maven-metadata.xml</a>
</body></html>"#;
        let metadata = ArtifactMetadata::from_listing(&coordinate(), html);
        assert_eq!(metadata.versions(), ["1.0", "1.1"]);
    }

    #[test]
    fn ignored_versions_are_removed() {
        let mut metadata = ArtifactMetadata::parse(&coordinate(), METADATA, "test").unwrap();
        metadata.remove_ignored(&["org.postgresql:postgresql:42.7".to_owned()]);
        assert_eq!(metadata.versions(), ["42.6.0"]);
    }

    #[test]
    fn list_versions_filters_patterns_only() {
        let metadata = ArtifactMetadata::parse(&coordinate(), METADATA, "test").unwrap();
        assert_eq!(metadata.list_versions("42.6.0").unwrap().len(), 4);
        assert_eq!(metadata.list_versions("[42.7,)").unwrap(), ["42.7.3", "42.7.1", "42.7.1"]);
        assert_eq!(metadata.list_versions(r"{42\.6\..*}").unwrap(), ["42.6.0"]);
        assert!(metadata.list_versions("[42.7").is_err());
    }

    #[test]
    fn load_remote_falls_back_to_listing() {
        let transport = MemoryTransport::new();
        let base = coordinate().base_url(REPO);
        transport.insert(&base, r#"<a href="9.4/">9.4/</a>"#);

        let metadata = load_remote(&transport, None, REPO, &coordinate(), &NullMonitor).unwrap();
        assert_eq!(metadata.versions(), ["9.4"]);
    }

    #[test]
    fn load_remote_with_nothing_is_empty() {
        let transport = MemoryTransport::new();
        let metadata = load_remote(&transport, None, REPO, &coordinate(), &NullMonitor).unwrap();
        assert!(metadata.versions().is_empty());
    }

    #[test]
    fn load_local_reads_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("1.2")).unwrap();
        std::fs::create_dir_all(dir.path().join("1.10")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let metadata = load_local(&coordinate(), dir.path());
        assert_eq!(metadata.versions(), ["1.10", "1.2"]);
    }
}
