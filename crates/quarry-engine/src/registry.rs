//! The ordered, scoped set of repositories and the multi-repository search.
//!
//! A coordinate is looked up, first hit wins, in:
//! 1. the referencing descriptor's own repository
//! 2. every enabled registered repository whose scopes admit the group
//! 3. the repositories declared by the referencing descriptor's active
//!    profiles, along its parent chain
//! 4. the built-in local repository
//!
//! Coordinates that no source has are remembered until
//! [`Registry::reset_artifact_info`] or a change of custom repositories.

use std::collections::{HashMap, HashSet};
use std::iter;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use quarry_config::{settings, BuiltinRepository, RegistryConfig, RepositorySettings};
use quarry_util::maven::Coordinate;
use quarry_util::transport::{HttpTransport, Transport};

use crate::descriptor::{DeclaredRepository, Descriptor};
use crate::error::EngineError;
use crate::expr::VersionExpression;
use crate::monitor::{self, ProgressMonitor};
use crate::repository::{lock, Repository, RepositoryKind};

/// Where a lookup may look besides the registered repositories.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchHints {
    source: Option<Arc<Repository>>,
    declared: Vec<DeclaredRepository>,
}

impl SearchHints {
    pub(crate) fn for_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            source: descriptor.source(),
            declared: descriptor
                .active_repositories()
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

/// State of one top-level resolution: the monitor and the coordinates
/// currently being built, innermost last.
pub(crate) struct ResolveContext<'m> {
    monitor: &'m dyn ProgressMonitor,
    in_progress: Vec<String>,
}

impl<'m> ResolveContext<'m> {
    pub(crate) fn new(monitor: &'m dyn ProgressMonitor) -> Self {
        Self {
            monitor,
            in_progress: Vec::new(),
        }
    }

    pub(crate) fn monitor(&self) -> &'m dyn ProgressMonitor {
        self.monitor
    }

    pub(crate) fn enter(&mut self, path: &str) -> Result<(), EngineError> {
        if self.in_progress.iter().any(|p| p == path) {
            let mut chain = self.in_progress.clone();
            chain.push(path.to_owned());
            return Err(EngineError::CyclicReference {
                chain: chain.join(" -> "),
            });
        }
        self.in_progress.push(path.to_owned());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.in_progress.pop();
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    initialized: bool,
    repositories: Vec<Arc<Repository>>,
    /// Descriptor-declared repositories, by normalized URL.
    external: HashMap<String, Arc<Repository>>,
    /// Paths (`id:version`) no source has.
    not_found: HashSet<String>,
}

pub struct Registry {
    transport: Arc<dyn Transport>,
    maven_root: PathBuf,
    settings_path: PathBuf,
    builtins: Vec<BuiltinRepository>,
    ignored_versions: Vec<String>,
    jdk_version: String,
    local: Arc<Repository>,
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("maven_root", &self.maven_root)
            .field("settings_path", &self.settings_path)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create a registry. Repositories are loaded on first use.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be determined.
    pub fn new(config: &RegistryConfig, transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        let maven_root = config.data_dir()?.join("maven");
        Ok(Self {
            transport,
            settings_path: config.settings_path()?,
            builtins: config.repositories.clone(),
            ignored_versions: config.ignored_versions.clone(),
            jdk_version: config.jdk_version.clone(),
            local: Arc::new(Repository::local(&maven_root)),
            maven_root,
            state: Mutex::new(RegistryState::default()),
        })
    }

    /// A registry fetching over HTTP.
    ///
    /// # Errors
    /// Same as [`Registry::new`].
    pub fn with_http(config: &RegistryConfig) -> Result<Self, EngineError> {
        Self::new(config, Arc::new(HttpTransport::new()))
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn ignored_versions(&self) -> &[String] {
        &self.ignored_versions
    }

    pub(crate) fn jdk_version(&self) -> &str {
        &self.jdk_version
    }

    /// The state, loading built-in and user-declared repositories on first use.
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        let mut state = lock(&self.state);
        if !state.initialized {
            state.repositories = self
                .builtins
                .iter()
                .map(|b| Arc::new(Repository::global(b, &self.maven_root)))
                .collect();
            match settings::load_settings(&self.settings_path) {
                Ok(custom) => state.repositories.extend(
                    custom
                        .iter()
                        .map(|s| Arc::new(Repository::custom(s, &self.maven_root))),
                ),
                Err(e) => tracing::warn!("{e}"),
            }
            state.repositories.sort_by_key(|r| r.order());
            state.initialized = true;
        }
        state
    }

    /// Registered repositories in search order, without the local one.
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.state().repositories.clone()
    }

    pub fn local_repository(&self) -> &Arc<Repository> {
        &self.local
    }

    /// A registered repository, or the local one, by id.
    pub fn find_repository(&self, id: &str) -> Option<Arc<Repository>> {
        self.repositories()
            .into_iter()
            .chain(iter::once(Arc::clone(&self.local)))
            .find(|r| r.id() == id)
    }

    /// Resolve `coordinate`, or `None` when no source has it or the lookup
    /// fails. Failures are logged.
    pub fn resolve(
        &self,
        monitor: &dyn ProgressMonitor,
        referencing: Option<&Descriptor>,
        coordinate: &Coordinate,
    ) -> Option<Arc<Descriptor>> {
        match self.try_resolve(monitor, referencing, coordinate) {
            Ok(descriptor) => Some(descriptor),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{e}");
                None
            }
            Err(e) => {
                tracing::warn!("{coordinate}: {e}");
                None
            }
        }
    }

    /// Resolve `coordinate`, reporting why it failed.
    ///
    /// # Errors
    /// Returns `NotFound` when no source has the artifact, `Cancelled` when
    /// the monitor stopped the lookup, and `Version` for a malformed version
    /// expression.
    pub fn try_resolve(
        &self,
        monitor: &dyn ProgressMonitor,
        referencing: Option<&Descriptor>,
        coordinate: &Coordinate,
    ) -> Result<Arc<Descriptor>, EngineError> {
        let hints = referencing
            .map(SearchHints::for_descriptor)
            .unwrap_or_default();
        let mut ctx = ResolveContext::new(monitor);
        self.resolve_in(&mut ctx, &hints, coordinate)
    }

    pub(crate) fn resolve_in(
        &self,
        ctx: &mut ResolveContext<'_>,
        hints: &SearchHints,
        coordinate: &Coordinate,
    ) -> Result<Arc<Descriptor>, EngineError> {
        VersionExpression::parse(coordinate.version())?;
        coordinate.ensure_safe_id()?;
        let path = coordinate.path();
        if self.state().not_found.contains(&path) {
            return Err(EngineError::NotFound { path });
        }

        ctx.enter(&path)?;
        let result = self.search(ctx, hints, coordinate);
        ctx.leave();

        if let Err(EngineError::NotFound { .. }) = &result {
            self.state().not_found.insert(path);
        }
        result
    }

    fn search(
        &self,
        ctx: &mut ResolveContext<'_>,
        hints: &SearchHints,
        coordinate: &Coordinate,
    ) -> Result<Arc<Descriptor>, EngineError> {
        let mut tried = Vec::new();

        if let Some(source) = &hints.source {
            if let Some(found) = self.attempt(ctx, source, coordinate, &mut tried)? {
                return Ok(found);
            }
        }

        let group_id = coordinate.group_id();
        for repo in self.repositories() {
            if !repo.is_enabled() || !repo.serves_group(group_id) {
                continue;
            }
            if let Some(found) = self.attempt(ctx, &repo, coordinate, &mut tried)? {
                return Ok(found);
            }
        }

        for declared in &hints.declared {
            let repo = self.external_repository(declared);
            if let Some(found) = self.attempt(ctx, &repo, coordinate, &mut tried)? {
                return Ok(found);
            }
        }

        let local = Arc::clone(&self.local);
        if let Some(found) = self.attempt(ctx, &local, coordinate, &mut tried)? {
            return Ok(found);
        }

        Err(EngineError::NotFound {
            path: coordinate.path(),
        })
    }

    /// Try one repository unless an equivalent one was already tried.
    /// Absence and per-repository failures yield `None`; cancellation and
    /// cycles propagate.
    fn attempt(
        &self,
        ctx: &mut ResolveContext<'_>,
        repo: &Arc<Repository>,
        coordinate: &Coordinate,
        tried: &mut Vec<Arc<Repository>>,
    ) -> Result<Option<Arc<Descriptor>>, EngineError> {
        if tried
            .iter()
            .any(|t| Arc::ptr_eq(t, repo) || t.same_url(repo.url()))
        {
            return Ok(None);
        }
        tried.push(Arc::clone(repo));

        match repo.find_artifact(self, ctx, coordinate) {
            Ok(found) => Ok(Some(found)),
            Err(e @ (EngineError::Cancelled | EngineError::CyclicReference { .. })) => Err(e),
            Err(e) => {
                tracing::debug!("{coordinate}: not in {}: {e}", repo.id());
                Ok(None)
            }
        }
    }

    /// The shared repository for a descriptor-declared URL.
    fn external_repository(&self, declared: &DeclaredRepository) -> Arc<Repository> {
        let key = declared.url.trim_end_matches('/').to_owned();
        let mut state = self.state();
        Arc::clone(
            state
                .external
                .entry(key)
                .or_insert_with(|| Arc::new(Repository::external(declared, &self.maven_root))),
        )
    }

    /// Published versions of `coordinate` matching `filter`, from the first
    /// repository that lists any.
    ///
    /// # Errors
    /// Returns an error if `filter` is malformed or the monitor cancels.
    pub fn list_versions(
        &self,
        monitor: &dyn ProgressMonitor,
        coordinate: &Coordinate,
        filter: &str,
    ) -> Result<Vec<String>, EngineError> {
        VersionExpression::parse(filter)?;
        coordinate.ensure_safe_id()?;
        monitor::checkpoint(monitor, &format!("List versions of {}", coordinate.id()))?;

        let candidates = self
            .repositories()
            .into_iter()
            .filter(|r| r.is_enabled() && r.serves_group(coordinate.group_id()))
            .chain(iter::once(Arc::clone(&self.local)));
        for repo in candidates {
            match repo.list_versions(self, monitor, coordinate, filter) {
                Ok(versions) if !versions.is_empty() => return Ok(versions),
                Ok(_) => {}
                Err(e @ (EngineError::Cancelled | EngineError::Version(_))) => return Err(e),
                Err(e) => tracing::debug!("{}: versions unavailable in {}: {e}", coordinate.id(), repo.id()),
            }
        }
        Ok(Vec::new())
    }

    /// Forget that `coordinate` was not found and drop every repository's
    /// cached data for it.
    pub fn reset_artifact_info(&self, coordinate: &Coordinate) {
        let id = coordinate.id();
        let prefix = format!("{id}:");
        let repositories: Vec<Arc<Repository>> = {
            let mut state = self.state();
            state.not_found.retain(|path| !path.starts_with(&prefix));
            state
                .repositories
                .iter()
                .chain(state.external.values())
                .cloned()
                .collect()
        };
        for repo in repositories.iter().chain(iter::once(&self.local)) {
            repo.reset_artifact(&id);
        }
    }

    /// Whether `coordinate` is remembered as missing from every source.
    pub fn is_known_missing(&self, coordinate: &Coordinate) -> bool {
        self.state().not_found.contains(&coordinate.path())
    }

    /// Replace the user-declared repositories. Forgets every not-found entry.
    pub fn set_custom_repositories(&self, custom: &[RepositorySettings]) {
        let mut state = self.state();
        state
            .repositories
            .retain(|r| r.kind() != RepositoryKind::Custom);
        state.repositories.extend(
            custom
                .iter()
                .map(|s| Arc::new(Repository::custom(s, &self.maven_root))),
        );
        state.repositories.sort_by_key(|r| r.order());
        state.not_found.clear();
    }

    /// Write the user-declared repositories to the settings file.
    ///
    /// # Errors
    /// Returns an error if the settings file cannot be written.
    pub fn save_configuration(&self) -> Result<(), EngineError> {
        let custom: Vec<RepositorySettings> = self
            .repositories()
            .iter()
            .filter(|r| r.kind().is_persisted())
            .map(|r| r.to_settings())
            .collect();
        settings::save_settings(&self.settings_path, &custom)?;
        Ok(())
    }

    /// Download (or locate) the binary file of a resolved descriptor.
    ///
    /// # Errors
    /// Returns `NotFound` if the descriptor's repository is gone or lacks
    /// the file, `NoArtifactFile` for `pom` packaging, and download errors.
    pub fn artifact_file(
        &self,
        monitor: &dyn ProgressMonitor,
        descriptor: &Descriptor,
    ) -> Result<PathBuf, EngineError> {
        let repo = descriptor.source().ok_or_else(|| EngineError::NotFound {
            path: descriptor.coordinate().path(),
        })?;
        repo.artifact_file(self.transport(), monitor, descriptor)
    }
}
