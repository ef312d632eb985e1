//! Builds a [`Descriptor`] from a fetched POM document.
//!
//! Building runs in passes over the document:
//! 1. top-level fields, licenses, and every profile's activation state,
//!    properties and repositories (inactive profiles are not read further)
//! 2. the parent, resolved through the registry
//! 3. dependency management of active profiles, resolving `import` BOMs
//! 4. plain dependencies of active profiles, keeping only required
//!    compile and runtime entries
//!
//! Each pass sees everything the earlier passes produced, so versions and
//! scopes can be inherited from the parent and from imported BOMs.

use std::sync::Arc;

use quarry_util::maven::Coordinate;
use roxmltree::Node;

use crate::descriptor::{
    DeclaredRepository, Dependency, Descriptor, Exclusion, License, Profile, Scope,
    DEFAULT_PACKAGING, ROOT_PROFILE_ID,
};
use crate::error::EngineError;
use crate::expr::{self, VersionExpression};
use crate::properties::PropertySources;
use crate::registry::{Registry, ResolveContext, SearchHints};
use crate::repository::Repository;
use crate::xml;

/// A `<dependency>` element with properties interpolated and nothing inherited yet.
struct DeclaredDependency {
    group_id: String,
    artifact_id: String,
    classifier: Option<String>,
    version: Option<String>,
    scope: Option<Scope>,
    optional: Option<bool>,
    exclusions: Vec<Exclusion>,
}

/// Which dependency block is being read.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Management,
    Dependencies,
}

pub(crate) fn build_descriptor(
    registry: &Registry,
    ctx: &mut ResolveContext<'_>,
    source: &Arc<Repository>,
    coordinate: &Coordinate,
    text: &str,
    location: &str,
) -> Result<Descriptor, EngineError> {
    let doc = xml::parse(text, location)?;
    let root = doc.root_element();
    if !root.has_tag_name("project") {
        return Err(EngineError::InvalidDescriptor {
            location: location.to_owned(),
            reason: format!("expected <project>, found <{}>", root.tag_name().name()),
        });
    }

    let version = xml::child_text(root, "version")
        .filter(|v| !v.contains("${"))
        .unwrap_or_else(|| coordinate.version().to_owned());

    let mut descriptor = Descriptor {
        coordinate: coordinate.with_version(&version),
        packaging: xml::child_text(root, "packaging")
            .unwrap_or_else(|| DEFAULT_PACKAGING.to_owned()),
        name: xml::child_text(root, "name").map(|n| xml::compact(&n)),
        description: xml::child_text(root, "description").map(|d| xml::compact(&d)),
        url: xml::child_text(root, "url"),
        parent: None,
        licenses: read_licenses(root),
        profiles: Vec::new(),
        imports: Vec::new(),
        source: Arc::downgrade(source),
    };

    let mut sections = vec![root];
    descriptor.profiles.push(read_profile(root, ROOT_PROFILE_ID, true));
    for (index, node) in xml::nested(root, "profiles", "profile").into_iter().enumerate() {
        let id = xml::child_text(node, "id").unwrap_or_else(|| format!("profile-{index}"));
        let active = is_active(node, registry.jdk_version());
        descriptor.profiles.push(read_profile(node, &id, active));
        sections.push(node);
    }

    if let Some(parent) = xml::child(root, "parent") {
        resolve_parent(registry, ctx, &mut descriptor, parent)?;
    }

    for block in [Block::Management, Block::Dependencies] {
        for (index, section) in sections.iter().enumerate() {
            if !descriptor.profiles.get(index).is_some_and(|p| p.active) {
                continue;
            }
            let nodes = match block {
                Block::Management => xml::child(*section, "dependencyManagement")
                    .map(|m| xml::nested(m, "dependencies", "dependency"))
                    .unwrap_or_default(),
                Block::Dependencies => xml::nested(*section, "dependencies", "dependency"),
            };
            for node in nodes {
                read_entry(registry, ctx, &mut descriptor, index, block, node)?;
            }
        }
    }

    Ok(descriptor)
}

fn resolve_parent(
    registry: &Registry,
    ctx: &mut ResolveContext<'_>,
    descriptor: &mut Descriptor,
    node: Node<'_, '_>,
) -> Result<(), EngineError> {
    let props = PropertySources::new(descriptor);
    let field = |name: &str| xml::child_text(node, name).map(|v| props.interpolate(&v));
    let (Some(group_id), Some(artifact_id), Some(version)) =
        (field("groupId"), field("artifactId"), field("version"))
    else {
        tracing::warn!("{}: incomplete <parent>, ignored", descriptor.coordinate);
        return Ok(());
    };

    let parent = Coordinate::new(&group_id, &artifact_id, None, &version);
    let hints = SearchHints::for_descriptor(descriptor);
    match registry.resolve_in(ctx, &hints, &parent) {
        Ok(found) => descriptor.parent = Some(found),
        Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
        Err(e) => tracing::warn!(
            "{}: parent {parent} unavailable: {e}",
            descriptor.coordinate
        ),
    }
    Ok(())
}

/// Read one dependency element into profile `index`, resolving it as a BOM
/// when it is an import.
fn read_entry(
    registry: &Registry,
    ctx: &mut ResolveContext<'_>,
    descriptor: &mut Descriptor,
    index: usize,
    block: Block,
    node: Node<'_, '_>,
) -> Result<(), EngineError> {
    let Some(declared) = read_dependency(&PropertySources::new(descriptor), node) else {
        tracing::warn!(
            "{}: dependency without groupId or artifactId, skipped",
            descriptor.coordinate
        );
        return Ok(());
    };

    if block == Block::Management && declared.scope == Some(Scope::Import) {
        return import_bom(registry, ctx, descriptor, declared);
    }

    let Some(dependency) = inherit(descriptor, declared, block) else {
        return Ok(());
    };
    if let Some(profile) = descriptor.profiles.get_mut(index) {
        match block {
            Block::Management => profile.dependency_management.push(dependency),
            Block::Dependencies => profile.dependencies.push(dependency),
        }
    }
    Ok(())
}

fn import_bom(
    registry: &Registry,
    ctx: &mut ResolveContext<'_>,
    descriptor: &mut Descriptor,
    declared: DeclaredDependency,
) -> Result<(), EngineError> {
    let Some(version) = declared.version else {
        tracing::warn!(
            "{}: import {}:{} has no version, skipped",
            descriptor.coordinate,
            declared.group_id,
            declared.artifact_id
        );
        return Ok(());
    };

    let bom = Coordinate::new(&declared.group_id, &declared.artifact_id, None, &version);
    let hints = SearchHints::for_descriptor(descriptor);
    match registry.resolve_in(ctx, &hints, &bom) {
        Ok(found) => descriptor.imports.push(found),
        Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
        Err(e) => tracing::warn!("{}: import {bom} unavailable: {e}", descriptor.coordinate),
    }
    Ok(())
}

/// Fill scope, optionality, version and exclusions from the matching
/// management entry. Plain dependencies that are optional or outside
/// compile/runtime scope are dropped, as are entries with no version.
fn inherit(descriptor: &Descriptor, declared: DeclaredDependency, block: Block) -> Option<Dependency> {
    let managed = descriptor.find_management(&declared.group_id, &declared.artifact_id);
    let scope = declared
        .scope
        .or(managed.map(|m| m.scope))
        .unwrap_or(Scope::Compile);
    let optional = declared
        .optional
        .or(managed.map(|m| m.optional))
        .unwrap_or(false);

    if block == Block::Dependencies && (optional || !scope.is_runtime_visible()) {
        return None;
    }

    let Some(version) = declared
        .version
        .or_else(|| managed.map(|m| m.coordinate.version().to_owned()))
    else {
        tracing::warn!(
            "{}: dependency {}:{} has no version, skipped",
            descriptor.coordinate,
            declared.group_id,
            declared.artifact_id
        );
        return None;
    };

    let mut exclusions = declared.exclusions;
    for inherited in managed.iter().flat_map(|m| m.exclusions.iter()) {
        if !exclusions.contains(inherited) {
            exclusions.push(inherited.clone());
        }
    }

    Some(Dependency {
        coordinate: Coordinate::new(
            &declared.group_id,
            &declared.artifact_id,
            declared.classifier.as_deref(),
            &version,
        ),
        scope,
        optional,
        exclusions,
    })
}

fn read_dependency(props: &PropertySources<'_>, node: Node<'_, '_>) -> Option<DeclaredDependency> {
    let field = |name: &str| xml::child_text(node, name).map(|v| props.interpolate(&v));
    let group_id = field("groupId")?;
    let artifact_id = field("artifactId")?;

    let scope = field("scope").and_then(|raw| {
        let parsed = Scope::parse(&raw);
        if parsed.is_none() {
            tracing::debug!("{group_id}:{artifact_id}: unknown scope `{raw}`");
        }
        parsed
    });

    let exclusions = xml::nested(node, "exclusions", "exclusion")
        .into_iter()
        .filter_map(|e| {
            Some(Exclusion {
                group_id: xml::child_text(e, "groupId")?,
                artifact_id: xml::child_text(e, "artifactId")?,
            })
        })
        .collect();

    Some(DeclaredDependency {
        classifier: field("classifier"),
        version: field("version"),
        scope,
        optional: field("optional").map(|v| v.eq_ignore_ascii_case("true")),
        exclusions,
        group_id,
        artifact_id,
    })
}

/// Properties and repositories of a profile. Inactive profiles stay empty.
fn read_profile(node: Node<'_, '_>, id: &str, active: bool) -> Profile {
    let mut profile = Profile::new(id, active);
    if !active {
        return profile;
    }

    if let Some(properties) = xml::child(node, "properties") {
        for property in properties.children().filter(Node::is_element) {
            profile.properties.insert(
                property.tag_name().name().to_owned(),
                xml::text(property).unwrap_or_default(),
            );
        }
    }

    for repo in xml::nested(node, "repositories", "repository") {
        let (Some(id), Some(url)) = (xml::child_text(repo, "id"), xml::child_text(repo, "url"))
        else {
            continue;
        };
        profile.repositories.push(DeclaredRepository {
            id,
            name: xml::child_text(repo, "name"),
            url,
        });
    }
    profile
}

fn read_licenses(root: Node<'_, '_>) -> Vec<License> {
    xml::nested(root, "licenses", "license")
        .into_iter()
        .map(|l| License {
            name: xml::child_text(l, "name").map(|n| xml::compact(&n)),
            url: xml::child_text(l, "url"),
        })
        .filter(|l| l.name.is_some() || l.url.is_some())
        .collect()
}

/// Minimal activation: `activeByDefault`, overridden by a `jdk` clause,
/// and forced on by a negated `property` clause.
fn is_active(profile: Node<'_, '_>, jdk_version: &str) -> bool {
    let Some(activation) = xml::child(profile, "activation") else {
        return false;
    };

    let mut active = xml::child_text(activation, "activeByDefault")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if let Some(jdk) = xml::child_text(activation, "jdk") {
        active = jdk_matches(&jdk, jdk_version);
    }
    let negated_property = xml::child(activation, "property")
        .and_then(|p| xml::child_text(p, "name"))
        .is_some_and(|name| name.starts_with('!'));
    active || negated_property
}

fn jdk_matches(clause: &str, jdk_version: &str) -> bool {
    if expr::is_pattern(clause) {
        return VersionExpression::parse(clause).is_ok_and(|e| e.matches(jdk_version));
    }
    match clause.strip_prefix('!') {
        Some(negated) => !jdk_version.starts_with(negated.trim()),
        None => jdk_version.starts_with(clause),
    }
}
