//! Small helpers over roxmltree for descriptor and metadata documents.
//!
//! Tag names are matched by local name, so namespaced POMs
//! (`xmlns="http://maven.apache.org/POM/4.0.0"`) read the same as bare ones.

use roxmltree::{Document, Node};

use crate::error::EngineError;

/// Decode and parse a fetched document.
pub(crate) fn parse<'i>(text: &'i str, location: &str) -> Result<Document<'i>, EngineError> {
    Document::parse(text).map_err(|e| EngineError::Xml {
        location: location.to_owned(),
        message: e.to_string(),
    })
}

pub(crate) fn decode(bytes: Vec<u8>, location: &str) -> Result<String, EngineError> {
    String::from_utf8(bytes).map_err(|e| EngineError::Xml {
        location: location.to_owned(),
        message: e.to_string(),
    })
}

/// First element child named `name`.
pub(crate) fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

/// Every element child named `name`.
pub(crate) fn children<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// `<container><item/>...</container>` items, or nothing when the container is absent.
pub(crate) fn nested<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    container: &str,
    item: &'a str,
) -> Vec<Node<'a, 'i>> {
    child(node, container)
        .map(|c| children(c, item).collect())
        .unwrap_or_default()
}

/// Trimmed text of the child named `name`; empty text counts as absent.
pub(crate) fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}

/// Trimmed text content of an element; empty text counts as absent.
pub(crate) fn text(node: Node<'_, '_>) -> Option<String> {
    let raw: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Collapse every whitespace run to one space.
pub(crate) fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
