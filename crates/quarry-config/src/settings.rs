//! The user-declared repository settings file.
//!
//! ```xml
//! <maven>
//!   <repository id="corp" order="10" enabled="true" url="https://nexus.corp.example/maven/"
//!               name="Corporate" auth-user="ci" auth-password="...">
//!     <scope group="com.corp"/>
//!   </repository>
//! </maven>
//! ```
//!
//! The password attribute is stored and returned as an opaque string.

use std::path::Path;

const TAG_ROOT: &str = "maven";
const TAG_REPOSITORY: &str = "repository";
const TAG_SCOPE: &str = "scope";

/// One user-declared repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub order: i32,
    pub enabled: bool,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
    /// Groups this repository serves. Empty means every group.
    pub scopes: Vec<String>,
}

impl RepositorySettings {
    /// An enabled, unscoped repository without credentials.
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: id.to_owned(),
            description: None,
            url: url.to_owned(),
            order: 0,
            enabled: true,
            auth_user: None,
            auth_password: None,
            scopes: Vec::new(),
        }
    }
}

/// Read the settings file. A missing file yields an empty list.
///
/// # Errors
/// Returns an error if the file exists but cannot be read, is not valid XML,
/// or a `<repository>` lacks its `id` or `url`.
pub fn load_settings(path: &Path) -> Result<Vec<RepositorySettings>, SettingsError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    parse_settings(&content).map_err(|reason| SettingsError::Parse {
        path: path.display().to_string(),
        reason,
    })
}

fn parse_settings(content: &str) -> Result<Vec<RepositorySettings>, String> {
    let doc = roxmltree::Document::parse(content).map_err(|e| e.to_string())?;
    let root = doc.root_element();
    if !root.has_tag_name(TAG_ROOT) {
        return Err(format!(
            "expected <{TAG_ROOT}> root element, found <{}>",
            root.tag_name().name()
        ));
    }

    let mut repositories = Vec::new();
    for node in root
        .children()
        .filter(|n| n.is_element() && n.has_tag_name(TAG_REPOSITORY))
    {
        let attr = |name: &str| {
            node.attribute(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let id = attr("id").ok_or_else(|| "<repository> without `id`".to_owned())?;
        let url = attr("url").ok_or_else(|| format!("repository `{id}` has no `url`"))?;
        let order = match attr("order") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("repository `{id}` has invalid order `{raw}`"))?,
            None => 0,
        };
        let enabled = attr("enabled").map_or(true, |v| v != "false");
        let scopes = node
            .children()
            .filter(|n| n.is_element() && n.has_tag_name(TAG_SCOPE))
            .filter_map(|n| n.attribute("group"))
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_owned)
            .collect();

        repositories.push(RepositorySettings {
            name: attr("name").unwrap_or_else(|| id.clone()),
            description: attr("description"),
            url,
            order,
            enabled,
            auth_user: attr("auth-user"),
            auth_password: attr("auth-password"),
            scopes,
            id,
        });
    }
    Ok(repositories)
}

/// Write the settings file atomically.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save_settings(path: &Path, repositories: &[RepositorySettings]) -> Result<(), SettingsError> {
    quarry_util::fs::write_atomic(path, render_settings(repositories).as_bytes())
        .map_err(SettingsError::Write)
}

fn render_settings(repositories: &[RepositorySettings]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<maven>\n");
    for repo in repositories {
        xml.push_str("    <repository");
        push_attr(&mut xml, "id", &repo.id);
        push_attr(&mut xml, "order", &repo.order.to_string());
        push_attr(&mut xml, "enabled", if repo.enabled { "true" } else { "false" });
        push_attr(&mut xml, "url", &repo.url);
        push_attr(&mut xml, "name", &repo.name);
        if let Some(description) = &repo.description {
            push_attr(&mut xml, "description", description);
        }
        if let Some(user) = &repo.auth_user {
            push_attr(&mut xml, "auth-user", user);
        }
        if let Some(password) = &repo.auth_password {
            push_attr(&mut xml, "auth-password", password);
        }
        if repo.scopes.is_empty() {
            xml.push_str("/>\n");
            continue;
        }
        xml.push_str(">\n");
        for group in &repo.scopes {
            xml.push_str("        <scope");
            push_attr(&mut xml, "group", group);
            xml.push_str("/>\n");
        }
        xml.push_str("    </repository>\n");
    }
    xml.push_str("</maven>\n");
    xml
}

fn push_attr(xml: &mut String, name: &str, value: &str) {
    xml.push(' ');
    xml.push_str(name);
    xml.push_str("=\"");
    for c in value.chars() {
        match c {
            '&' => xml.push_str("&amp;"),
            '<' => xml.push_str("&lt;"),
            '>' => xml.push_str("&gt;"),
            '"' => xml.push_str("&quot;"),
            '\'' => xml.push_str("&apos;"),
            '\n' => xml.push_str("&#10;"),
            '\r' => xml.push_str("&#13;"),
            '\t' => xml.push_str("&#9;"),
            _ => xml.push(c),
        }
    }
    xml.push('"');
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid repository settings at {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("cannot write repository settings: {0}")]
    Write(quarry_util::error::UtilError),
}
