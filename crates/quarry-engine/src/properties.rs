//! `${...}` interpolation for descriptor values.
//!
//! Keys are looked up in a fixed order:
//! 1. project fields: `project.version`, `project.groupId`,
//!    `project.artifactId` (and their `pom.` aliases), `project.parent.version`
//! 2. properties of active profiles, from the descriptor outward through
//!    its parent chain; the nearest definition wins
//!
//! Unknown keys stay in the text verbatim.

use crate::descriptor::Descriptor;

/// Replacement passes before giving up on self-referencing properties.
const MAX_PASSES: usize = 16;

/// The property sources of one descriptor.
pub(crate) struct PropertySources<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> PropertySources<'a> {
    pub(crate) fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<&'a str> {
        let d = self.descriptor;
        match key {
            "project.version" | "pom.version" | "version" => return Some(d.version()),
            "project.groupId" | "pom.groupId" | "groupId" => return Some(d.coordinate.group_id()),
            "project.artifactId" | "pom.artifactId" | "artifactId" => {
                return Some(d.coordinate.artifact_id())
            }
            "project.parent.version" | "parent.version" => {
                if let Some(parent) = d.parent() {
                    return Some(parent.version());
                }
            }
            _ => {}
        }
        d.property(key)
    }

    /// Replace every resolvable `${key}` in `text`, repeatedly, so property
    /// values that reference other properties resolve too.
    pub(crate) fn interpolate(&self, text: &str) -> String {
        let mut current = text.to_owned();
        for _ in 0..MAX_PASSES {
            let next = self.replace_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn replace_once(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            let (before, tail) = rest.split_at(start);
            out.push_str(before);
            let Some(end) = tail.find('}') else {
                out.push_str(tail);
                return out;
            };
            let key = tail.get(2..end).unwrap_or_default();
            match self.lookup(key.trim()) {
                Some(value) => out.push_str(value),
                None => out.push_str(tail.get(..=end).unwrap_or_default()),
            }
            rest = tail.get(end + 1..).unwrap_or_default();
        }
        out.push_str(rest);
        out
    }
}
