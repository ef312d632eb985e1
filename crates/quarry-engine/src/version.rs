//! Version ordering.
//!
//! Versions are split into items at `.` and `-` and wherever digits meet
//! letters. Numeric items compare numerically, qualifier items by a fixed
//! rank (`alpha < beta < milestone < rc < snapshot < release < sp`), unknown
//! qualifiers sort after every known one and lexically among themselves.
//! Trailing zero items carry no weight, so `1.0` equals `1`.

use std::cmp::Ordering;
use std::fmt;

/// Known qualifiers in ascending order. The empty string is a plain release.
const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

/// Qualifiers that mark a version as not yet released.
const PRE_RELEASE: [&str; 9] = [
    "alpha", "beta", "milestone", "rc", "snapshot", "ea", "preview", "dev", "pre",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Decimal digits without leading zeros (`"0"` for zero).
    Number(String),
    Qualifier(String),
}

/// A parsed, comparable version string.
#[derive(Debug, Clone)]
pub struct ArtifactVersion {
    raw: String,
    items: Vec<Item>,
}

impl ArtifactVersion {
    pub fn parse(raw: &str) -> Self {
        let mut items = Vec::new();
        let mut current = String::new();
        let mut digits = false;

        for c in raw.trim().to_lowercase().chars() {
            if c == '.' || c == '-' {
                push_item(&mut items, &mut current, digits);
                continue;
            }
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != digits {
                push_item(&mut items, &mut current, digits);
            }
            digits = is_digit;
            current.push(c);
        }
        push_item(&mut items, &mut current, digits);

        while items.last().is_some_and(Item::is_null) {
            items.pop();
        }

        Self {
            raw: raw.trim().to_owned(),
            items,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether any qualifier marks this version as a pre-release.
    pub fn is_pre_release(&self) -> bool {
        self.items.iter().any(|item| match item {
            Item::Qualifier(q) => PRE_RELEASE.contains(&q.as_str()),
            Item::Number(_) => false,
        })
    }
}

impl Item {
    fn is_null(&self) -> bool {
        match self {
            Self::Number(n) => n == "0",
            Self::Qualifier(q) => q.is_empty(),
        }
    }
}

fn push_item(items: &mut Vec<Item>, current: &mut String, digits: bool) {
    if current.is_empty() {
        return;
    }
    let token = std::mem::take(current);
    if digits {
        let trimmed = token.trim_start_matches('0');
        items.push(Item::Number(if trimmed.is_empty() {
            "0".to_owned()
        } else {
            trimmed.to_owned()
        }));
        return;
    }

    let qualifier = match token.as_str() {
        "a" => "alpha",
        "b" => "beta",
        "m" => "milestone",
        "cr" => "rc",
        "ga" | "final" | "release" => "",
        other => other,
    };
    // `1.0-beta` and `1-beta` name the same version.
    while items.len() > 1 && items.last().is_some_and(Item::is_null) {
        items.pop();
    }
    items.push(Item::Qualifier(qualifier.to_owned()));
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn qualifier_rank(q: &str) -> usize {
    QUALIFIERS
        .iter()
        .position(|known| *known == q)
        .unwrap_or(QUALIFIERS.len())
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a)
        .cmp(&qualifier_rank(b))
        .then_with(|| a.cmp(b))
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Item::Number(x)), Some(Item::Number(y))) => compare_numbers(x, y),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => compare_qualifiers(x, y),
        (Some(Item::Number(x)), None) => compare_numbers(x, "0"),
        (Some(Item::Qualifier(x)), None) => compare_qualifiers(x, ""),
        (None, Some(_)) => compare_items(b, a).reverse(),
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        (0..len)
            .map(|i| compare_items(self.items.get(i), other.items.get(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArtifactVersion {}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether `version` carries a pre-release qualifier.
pub fn is_pre_release(version: &str) -> bool {
    ArtifactVersion::parse(version).is_pre_release()
}

/// The highest of `versions` by version ordering. On ties the later entry wins.
pub fn highest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .map(|v| (ArtifactVersion::parse(v), v))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v)
}
