//! Resolved artifact descriptors.
//!
//! A descriptor keeps its dependency data inside profiles. The implicit root
//! profile holds the top-level sections and is always active; declared
//! profiles contribute only when active. Effective views (dependencies,
//! management lookups, repositories, properties) are computed on demand by
//! walking the descriptor and then its parent chain.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use quarry_util::maven::Coordinate;

use crate::repository::Repository;

/// Id of the implicit profile holding a descriptor's top-level data.
pub const ROOT_PROFILE_ID: &str = "#root";

/// Packaging assumed when a descriptor declares none.
pub const DEFAULT_PACKAGING: &str = "jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

impl Scope {
    /// Parse a `<scope>` value, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compile" => Some(Self::Compile),
            "provided" => Some(Self::Provided),
            "runtime" => Some(Self::Runtime),
            "test" => Some(Self::Test),
            "system" => Some(Self::System),
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::System => "system",
            Self::Import => "import",
        }
    }

    /// Whether a dependency in this scope is needed to run its dependent.
    pub fn is_runtime_visible(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `group:artifact` pair excluded from a dependency's closure. `*` matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        (self.group_id == "*" || self.group_id == group_id)
            && (self.artifact_id == "*" || self.artifact_id == artifact_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    /// Whether this dependency's exclusions drop `group_id:artifact_id`.
    pub fn excludes(&self, group_id: &str, artifact_id: &str) -> bool {
        self.exclusions.iter().any(|e| e.matches(group_id, artifact_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// A repository declared inside a descriptor's `<repositories>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRepository {
    pub id: String,
    pub name: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub active: bool,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub repositories: Vec<DeclaredRepository>,
}

impl Profile {
    pub(crate) fn new(id: &str, active: bool) -> Self {
        Self {
            id: id.to_owned(),
            active,
            properties: BTreeMap::new(),
            dependencies: Vec::new(),
            dependency_management: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

/// A fully merged artifact descriptor for one concrete version.
#[derive(Debug)]
pub struct Descriptor {
    pub(crate) coordinate: Coordinate,
    pub(crate) packaging: String,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) parent: Option<Arc<Descriptor>>,
    pub(crate) licenses: Vec<License>,
    pub(crate) profiles: Vec<Profile>,
    pub(crate) imports: Vec<Arc<Descriptor>>,
    pub(crate) source: Weak<Repository>,
}

impl Descriptor {
    /// The coordinate with its concrete version.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn version(&self) -> &str {
        self.coordinate.version()
    }

    pub fn packaging(&self) -> &str {
        &self.packaging
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<Descriptor>> {
        self.parent.as_ref()
    }

    pub fn licenses(&self) -> &[License] {
        &self.licenses
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Descriptors merged in through `import`-scoped management entries.
    pub fn imports(&self) -> &[Arc<Descriptor>] {
        &self.imports
    }

    /// The repository this descriptor was loaded from, while it is alive.
    pub fn source(&self) -> Option<Arc<Repository>> {
        self.source.upgrade()
    }

    pub fn active_profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter().filter(|p| p.active)
    }

    /// This descriptor followed by its ancestors, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &Descriptor> {
        std::iter::successors(Some(self), |d| d.parent.as_deref())
    }

    /// Effective dependencies: every active profile's dependencies, this
    /// descriptor first and then each ancestor. Neither deduplicated nor
    /// filtered by exclusions.
    pub fn dependencies(&self) -> Vec<&Dependency> {
        self.lineage()
            .flat_map(Descriptor::active_profiles)
            .flat_map(|p| p.dependencies.iter())
            .collect()
    }

    /// The management entry for `group_id:artifact_id`: own active profiles
    /// first, then imported descriptors depth-first, then the parent.
    pub fn find_management(&self, group_id: &str, artifact_id: &str) -> Option<&Dependency> {
        let own = self
            .active_profiles()
            .flat_map(|p| p.dependency_management.iter())
            .find(|d| {
                d.coordinate.group_id() == group_id && d.coordinate.artifact_id() == artifact_id
            });
        own.or_else(|| {
            self.imports
                .iter()
                .find_map(|i| i.find_management(group_id, artifact_id))
        })
        .or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.find_management(group_id, artifact_id))
        })
    }

    /// Repositories declared by active profiles along the lineage, unique by
    /// id with the nearest declaration winning.
    pub fn active_repositories(&self) -> Vec<&DeclaredRepository> {
        let mut seen = HashSet::new();
        self.lineage()
            .flat_map(Descriptor::active_profiles)
            .flat_map(|p| p.repositories.iter())
            .filter(|r| seen.insert(r.id.as_str()))
            .collect()
    }

    /// A property from the active profiles along the lineage. Within one
    /// descriptor later profiles override earlier ones; across the lineage
    /// the nearest descriptor wins.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.lineage().find_map(|d| {
            d.profiles
                .iter()
                .rev()
                .filter(|p| p.active)
                .find_map(|p| p.properties.get(key))
                .map(String::as_str)
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.coordinate, f)
    }
}
