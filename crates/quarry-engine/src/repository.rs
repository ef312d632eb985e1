//! One source of artifacts and its caches.
//!
//! A repository memoizes, per artifact id, the published-version metadata
//! and every descriptor it has built. Each cache entry is a single-flight
//! slot: concurrent callers asking for the same entry wait for the first
//! build and share its result. Failed builds leave the slot empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quarry_config::{BuiltinRepository, RepositorySettings};
use quarry_util::artifact;
use quarry_util::error::UtilError;
use quarry_util::fs::{read_if_exists, sanitize_component, write_atomic};
use quarry_util::maven::{Coordinate, EXT_JAR, EXT_POM};
use quarry_util::transport::{Credentials, Transport};

use crate::descriptor::{DeclaredRepository, Descriptor};
use crate::error::{EngineError, VersionError};
use crate::expr::VersionExpression;
use crate::metadata::{self, ArtifactMetadata};
use crate::monitor::{self, ProgressMonitor};
use crate::registry::{Registry, ResolveContext};
use crate::resolver;
use crate::xml;

/// Id of the built-in local repository.
pub const LOCAL_REPOSITORY_ID: &str = "local";

/// Where a repository comes from, which decides how it stores and finds files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryKind {
    /// Built into the configuration.
    Global,
    /// The on-disk repository under the data directory.
    Local,
    /// Declared by the user in the settings file.
    Custom,
    /// Declared inside a descriptor; never persisted.
    External,
}

impl RepositoryKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Local => "local",
            Self::Custom => "custom",
            Self::External => "external",
        }
    }

    /// Remote kinds download into a cache; the local kind reads its own tree.
    pub fn fetches_remotely(self) -> bool {
        self != Self::Local
    }

    /// Whether the settings file stores repositories of this kind.
    pub fn is_persisted(self) -> bool {
        self == Self::Custom
    }

    /// Cache directory for a repository of this kind under `maven_root`.
    fn cache_dir(self, maven_root: &Path, id: &str, url: &str) -> PathBuf {
        match self {
            Self::Local => maven_root.join(LOCAL_REPOSITORY_ID),
            Self::External => {
                let (host, path) = split_url(url);
                maven_root
                    .join("external")
                    .join(sanitize_component(host))
                    .join(sanitize_component(path))
            }
            Self::Global | Self::Custom => maven_root.join(sanitize_component(id)),
        }
    }
}

fn split_url(url: &str) -> (&str, &str) {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    match without_scheme.split_once('/') {
        Some((host, path)) if !path.trim_matches('/').is_empty() => (host, path.trim_matches('/')),
        Some((host, _)) => (host, "root"),
        None => (without_scheme, "root"),
    }
}

/// Where one file of an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    /// Downloaded from `url` into `cache` on first use.
    Remote { url: String, cache: PathBuf },
    /// Read in place.
    Local(PathBuf),
}

type DescriptorSlot = Arc<Mutex<Option<Arc<Descriptor>>>>;

#[derive(Debug, Default)]
struct ArtifactCell {
    metadata: Mutex<Option<Arc<ArtifactMetadata>>>,
    descriptors: Mutex<HashMap<String, DescriptorSlot>>,
}

impl ArtifactCell {
    fn slot(&self, version: &str) -> DescriptorSlot {
        Arc::clone(lock(&self.descriptors).entry(version.to_owned()).or_default())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Repository {
    id: String,
    name: String,
    description: Option<String>,
    url: String,
    kind: RepositoryKind,
    order: i32,
    enabled: bool,
    scopes: Vec<String>,
    credentials: Option<Credentials>,
    cache_dir: PathBuf,
    artifacts: Mutex<HashMap<String, Arc<ArtifactCell>>>,
}

impl Repository {
    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: RepositoryKind,
        id: &str,
        name: &str,
        url: &str,
        order: i32,
        scopes: Vec<String>,
        credentials: Option<Credentials>,
        maven_root: &Path,
    ) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            description: None,
            url: url.to_owned(),
            kind,
            order,
            enabled: true,
            scopes,
            credentials,
            cache_dir: kind.cache_dir(maven_root, id, url),
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub fn global(builtin: &BuiltinRepository, maven_root: &Path) -> Self {
        Self::new(
            RepositoryKind::Global,
            &builtin.id,
            builtin.name.as_deref().unwrap_or(&builtin.id),
            &builtin.url,
            builtin.order,
            builtin.scopes.clone(),
            None,
            maven_root,
        )
    }

    pub fn custom(settings: &RepositorySettings, maven_root: &Path) -> Self {
        let credentials = settings.auth_user.as_deref().map(|user| {
            Credentials::new(user, settings.auth_password.as_deref().unwrap_or_default())
        });
        let mut repo = Self::new(
            RepositoryKind::Custom,
            &settings.id,
            &settings.name,
            &settings.url,
            settings.order,
            settings.scopes.clone(),
            credentials,
            maven_root,
        );
        repo.description.clone_from(&settings.description);
        repo.enabled = settings.enabled;
        repo
    }

    /// The on-disk repository at `<maven_root>/local`, laid out like a remote one.
    pub fn local(maven_root: &Path) -> Self {
        let dir = RepositoryKind::Local.cache_dir(maven_root, LOCAL_REPOSITORY_ID, "");
        let url = format!("file://{}/", dir.display());
        Self::new(
            RepositoryKind::Local,
            LOCAL_REPOSITORY_ID,
            "Local",
            &url,
            i32::MAX,
            Vec::new(),
            None,
            maven_root,
        )
    }

    pub fn external(declared: &DeclaredRepository, maven_root: &Path) -> Self {
        Self::new(
            RepositoryKind::External,
            &declared.id,
            declared.name.as_deref().unwrap_or(&declared.id),
            &declared.url,
            0,
            Vec::new(),
            None,
            maven_root,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether this repository may be asked for artifacts of `group_id`.
    pub fn serves_group(&self, group_id: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == group_id)
    }

    /// Same base URL, ignoring trailing slashes.
    pub fn same_url(&self, url: &str) -> bool {
        self.url.trim_end_matches('/') == url.trim_end_matches('/')
    }

    /// Settings-file entry for this repository.
    pub fn to_settings(&self) -> RepositorySettings {
        RepositorySettings {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            order: self.order,
            enabled: self.enabled,
            auth_user: self.credentials.as_ref().map(|c| c.user.clone()),
            auth_password: self.credentials.as_ref().map(|c| c.password.clone()),
            scopes: self.scopes.clone(),
        }
    }

    /// Where `version`'s file with `extension` is found.
    ///
    /// # Errors
    /// Returns `InvalidCoordinate` when a coordinate part or `version` would
    /// leave the repository directory.
    pub fn locate(
        &self,
        coordinate: &Coordinate,
        version: &str,
        extension: &str,
    ) -> Result<FileLocation, UtilError> {
        coordinate.ensure_safe_path(version)?;
        let location = if self.kind.fetches_remotely() {
            FileLocation::Remote {
                url: coordinate.file_url(&self.url, version, extension),
                cache: coordinate.cache_path(&self.cache_dir, version, extension),
            }
        } else {
            FileLocation::Local(coordinate.repository_path(&self.cache_dir, version, extension))
        };
        Ok(location)
    }

    fn cell(&self, id: &str) -> Arc<ArtifactCell> {
        Arc::clone(lock(&self.artifacts).entry(id.to_owned()).or_default())
    }

    /// Forget everything cached for artifact `id`.
    pub fn reset_artifact(&self, id: &str) {
        lock(&self.artifacts).remove(id);
    }

    fn metadata(
        &self,
        registry: &Registry,
        monitor: &dyn ProgressMonitor,
        cell: &ArtifactCell,
        coordinate: &Coordinate,
    ) -> Result<Arc<ArtifactMetadata>, EngineError> {
        let mut guard = lock(&cell.metadata);
        if let Some(metadata) = guard.as_ref() {
            return Ok(Arc::clone(metadata));
        }

        let mut loaded = if self.kind.fetches_remotely() {
            metadata::load_remote(
                registry.transport(),
                self.credentials.as_ref(),
                &self.url,
                coordinate,
                monitor,
            )?
        } else {
            metadata::load_local(coordinate, &self.artifact_dir(coordinate))
        };
        loaded.remove_ignored(registry.ignored_versions());

        let loaded = Arc::new(loaded);
        *guard = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn artifact_dir(&self, coordinate: &Coordinate) -> PathBuf {
        let mut dir = self.cache_dir.clone();
        dir.extend(coordinate.group_id().split('.'));
        dir.join(coordinate.artifact_id())
    }

    /// Published versions of `coordinate` matching `filter`.
    ///
    /// # Errors
    /// Returns an error if `filter` is malformed or the call is cancelled.
    pub fn list_versions(
        &self,
        registry: &Registry,
        monitor: &dyn ProgressMonitor,
        coordinate: &Coordinate,
        filter: &str,
    ) -> Result<Vec<String>, EngineError> {
        let cell = self.cell(&coordinate.id());
        let metadata = self.metadata(registry, monitor, &cell, coordinate)?;
        Ok(metadata.list_versions(filter)?)
    }

    /// Find and build the descriptor for `coordinate` in this repository.
    ///
    /// # Errors
    /// Returns `NotFound` when this repository does not have the artifact,
    /// and fetch, parse or cancellation errors otherwise. Nothing is cached
    /// on error.
    pub(crate) fn find_artifact(
        self: &Arc<Self>,
        registry: &Registry,
        ctx: &mut ResolveContext<'_>,
        coordinate: &Coordinate,
    ) -> Result<Arc<Descriptor>, EngineError> {
        let expression = VersionExpression::parse(coordinate.version())?;
        let cell = self.cell(&coordinate.id());

        let version = if expression.needs_metadata() {
            let metadata = self.metadata(registry, ctx.monitor(), &cell, coordinate)?;
            metadata
                .select(coordinate.version(), &expression)
                .map_err(|e| match e {
                    VersionError::EmptyVersionList { .. } => EngineError::NotFound {
                        path: coordinate.path(),
                    },
                    other => other.into(),
                })?
        } else {
            coordinate.version().to_owned()
        };

        let concrete = coordinate.with_version(&version);
        if concrete.path() == coordinate.path() {
            return self.build_in_slot(registry, ctx, &cell, &concrete);
        }

        // A symbolic or ranged request can land on a version that is already
        // being built further up; its slot is locked by this thread.
        ctx.enter(&concrete.path())?;
        let built = self.build_in_slot(registry, ctx, &cell, &concrete);
        ctx.leave();
        built
    }

    fn build_in_slot(
        self: &Arc<Self>,
        registry: &Registry,
        ctx: &mut ResolveContext<'_>,
        cell: &ArtifactCell,
        concrete: &Coordinate,
    ) -> Result<Arc<Descriptor>, EngineError> {
        let slot = cell.slot(concrete.version());
        let mut guard = lock(&slot);
        if let Some(descriptor) = guard.as_ref() {
            return Ok(Arc::clone(descriptor));
        }

        let (text, location) = self.load_descriptor(registry.transport(), ctx.monitor(), concrete)?;
        let descriptor = Arc::new(resolver::build_descriptor(
            registry, ctx, self, concrete, &text, &location,
        )?);
        *guard = Some(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Descriptor text and where it was read from. Remote documents are
    /// checked for well-formedness before they are cached.
    fn load_descriptor(
        &self,
        transport: &dyn Transport,
        monitor: &dyn ProgressMonitor,
        coordinate: &Coordinate,
    ) -> Result<(String, String), EngineError> {
        let version = coordinate.version();
        match self.locate(coordinate, version, EXT_POM)? {
            FileLocation::Local(path) => {
                let location = path.display().to_string();
                let bytes = std::fs::read(&path).map_err(|source| UtilError::Io {
                    path: location.clone(),
                    source,
                })?;
                Ok((xml::decode(bytes, &location)?, location))
            }
            FileLocation::Remote { url, cache } => {
                if let Some(bytes) = read_if_exists(&cache)? {
                    let location = cache.display().to_string();
                    return Ok((xml::decode(bytes, &location)?, location));
                }

                monitor::checkpoint(monitor, &format!("Load descriptor {coordinate}"))?;
                let bytes = transport.fetch(&url, self.credentials.as_ref())?;
                let text = xml::decode(bytes, &url)?;
                xml::parse(&text, &url)?;
                if let Err(e) = write_atomic(&cache, text.as_bytes()) {
                    tracing::warn!("cannot cache {url}: {e}");
                }
                Ok((text, url))
            }
        }
    }

    /// Make the binary file of `descriptor` available on disk.
    ///
    /// # Errors
    /// Returns `NoArtifactFile` for `pom` packaging, `NotFound` when a local
    /// file is missing, and download errors.
    pub fn artifact_file(
        &self,
        transport: &dyn Transport,
        monitor: &dyn ProgressMonitor,
        descriptor: &Descriptor,
    ) -> Result<PathBuf, EngineError> {
        let extension = match descriptor.packaging() {
            "pom" => {
                return Err(EngineError::NoArtifactFile {
                    path: descriptor.coordinate().path(),
                    packaging: descriptor.packaging().to_owned(),
                })
            }
            "jar" | "bundle" | "maven-plugin" => EXT_JAR,
            other => other,
        };

        match self.locate(descriptor.coordinate(), descriptor.version(), extension)? {
            FileLocation::Local(path) if path.is_file() => Ok(path),
            FileLocation::Local(_) => Err(EngineError::NotFound {
                path: descriptor.coordinate().path(),
            }),
            FileLocation::Remote { url, cache } => {
                if !cache.is_file() {
                    monitor::checkpoint(monitor, &format!("Download {url}"))?;
                }
                let placed =
                    artifact::ensure_artifact(transport, &url, self.credentials.as_ref(), &cache)?;
                if placed.freshly_downloaded {
                    tracing::debug!("downloaded {url}");
                }
                Ok(placed.path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dirs_by_kind() {
        let root = Path::new("/data/maven");
        let global = Repository::global(
            &BuiltinRepository {
                id: "maven-central".to_owned(),
                name: None,
                url: "https://repo1.maven.org/maven2/".to_owned(),
                order: 0,
                scopes: Vec::new(),
            },
            root,
        );
        assert_eq!(global.cache_dir(), root.join("maven-central"));
        assert_eq!(global.name(), "maven-central");

        let external = Repository::external(
            &DeclaredRepository {
                id: "central".to_owned(),
                name: None,
                url: "https://repo.spring.io/milestone/".to_owned(),
            },
            root,
        );
        assert_eq!(
            external.cache_dir(),
            root.join("external").join("repo.spring.io").join("milestone")
        );

        let local = Repository::local(root);
        assert_eq!(local.cache_dir(), root.join("local"));
        assert!(!local.kind().fetches_remotely());
    }

    #[test]
    fn external_repositories_on_one_host_do_not_collide() {
        let root = Path::new("/data/maven");
        let a = RepositoryKind::External.cache_dir(root, "x", "https://host.example/a/maven2");
        let b = RepositoryKind::External.cache_dir(root, "x", "https://host.example/b/maven2");
        assert_ne!(a, b);
        assert_eq!(
            RepositoryKind::External.cache_dir(root, "x", "https://host.example/"),
            root.join("external").join("host.example").join("root")
        );
    }

    #[test]
    fn locate_by_kind() {
        let root = Path::new("/data/maven");
        let coordinate = Coordinate::parse("org.postgresql:postgresql:42.7.3")
            .unwrap_or_else(|e| panic!("{e}"));

        let local = Repository::local(root);
        assert_eq!(
            local.locate(&coordinate, "42.7.3", EXT_POM).ok(),
            Some(FileLocation::Local(
                root.join("local/org/postgresql/postgresql/42.7.3/postgresql-42.7.3.pom")
            ))
        );

        let mut settings = RepositorySettings::new("corp", "https://nexus.example/maven/");
        settings.auth_user = Some("ci".to_owned());
        let custom = Repository::custom(&settings, root);
        assert_eq!(
            custom.locate(&coordinate, "42.7.3", EXT_JAR).ok(),
            Some(FileLocation::Remote {
                url: "https://nexus.example/maven/org/postgresql/postgresql/42.7.3/postgresql-42.7.3.jar"
                    .to_owned(),
                cache: root.join("corp/org.postgresql/postgresql-42.7.3.jar"),
            })
        );
        assert_eq!(custom.to_settings().auth_user.as_deref(), Some("ci"));
        assert_eq!(custom.to_settings().auth_password.as_deref(), Some(""));
    }

    #[test]
    fn scopes_restrict_groups() {
        let mut settings = RepositorySettings::new("foo", "https://foo.example/");
        settings.scopes = vec!["com.foo".to_owned()];
        let repo = Repository::custom(&settings, Path::new("/tmp"));
        assert!(repo.serves_group("com.foo"));
        assert!(!repo.serves_group("com.bar"));
        assert!(repo.same_url("https://foo.example"));
    }
}
