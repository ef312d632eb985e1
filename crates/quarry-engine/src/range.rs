//! Bracketed version ranges.
//!
//! | Spec | Meaning |
//! |---|---|
//! | `1.0` | recommend 1.0, accept anything |
//! | `[1.0]` | exactly 1.0 |
//! | `[1.0,2.0)` | 1.0 inclusive to 2.0 exclusive |
//! | `[1.5,)` | 1.5 and higher |
//! | `(,1.0],[1.2,)` | up to 1.0, or 1.2 and higher |

use crate::error::VersionError;
use crate::version::ArtifactVersion;

/// One contiguous interval of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    lower: Option<ArtifactVersion>,
    lower_inclusive: bool,
    upper: Option<ArtifactVersion>,
    upper_inclusive: bool,
}

impl Restriction {
    /// The unbounded interval.
    pub fn everything() -> Self {
        Self {
            lower: None,
            lower_inclusive: false,
            upper: None,
            upper_inclusive: false,
        }
    }

    pub fn lower_bound(&self) -> Option<&ArtifactVersion> {
        self.lower.as_ref()
    }

    pub fn contains(&self, version: &ArtifactVersion) -> bool {
        if let Some(lower) = &self.lower {
            if lower > version || (lower == version && !self.lower_inclusive) {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            if upper < version || (upper == version && !self.upper_inclusive) {
                return false;
            }
        }
        true
    }
}

/// A parsed range: restriction intervals plus an optional recommended version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    recommended: Option<ArtifactVersion>,
    restrictions: Vec<Restriction>,
}

impl VersionRange {
    /// Parse a range specification.
    ///
    /// # Errors
    /// Returns `VersionError::InvalidRange` for unterminated sets, overlapping
    /// or inverted sets, single versions not enclosed in `[]`, identical
    /// bounds, and a bare version mixed with sets.
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidRange {
            spec: spec.to_owned(),
            reason: reason.to_owned(),
        };

        let mut restrictions = Vec::new();
        let mut recommended = None;
        let mut previous_upper: Option<ArtifactVersion> = None;
        let mut process = spec.trim();

        while process.starts_with('[') || process.starts_with('(') {
            let close = [process.find(')'), process.find(']')]
                .into_iter()
                .flatten()
                .min()
                .ok_or_else(|| invalid("unbounded range"))?;
            let set = process.get(..=close).ok_or_else(|| invalid("unbounded range"))?;
            let restriction = parse_restriction(spec, set)?;

            if let Some(upper) = &previous_upper {
                match &restriction.lower {
                    Some(lower) if lower >= upper => {}
                    _ => return Err(invalid("ranges overlap")),
                }
            }
            previous_upper = restriction.upper.clone();
            restrictions.push(restriction);

            process = process.get(close + 1..).unwrap_or_default().trim();
            if let Some(rest) = process.strip_prefix(',') {
                process = rest.trim();
            }
        }

        if !process.is_empty() {
            if !restrictions.is_empty() {
                return Err(invalid(
                    "only fully-qualified sets allowed in multiple set scenario",
                ));
            }
            recommended = Some(ArtifactVersion::parse(process));
            restrictions.push(Restriction::everything());
        }

        Ok(Self {
            recommended,
            restrictions,
        })
    }

    pub fn recommended(&self) -> Option<&ArtifactVersion> {
        self.recommended.as_ref()
    }

    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    pub fn contains(&self, version: &ArtifactVersion) -> bool {
        self.restrictions.iter().any(|r| r.contains(version))
    }

    /// The highest of `versions` inside this range.
    pub fn match_highest<'a, I>(&self, versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        versions
            .into_iter()
            .map(|v| (ArtifactVersion::parse(v), v))
            .filter(|(parsed, _)| self.contains(parsed))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v)
    }
}

fn parse_restriction(spec: &str, set: &str) -> Result<Restriction, VersionError> {
    let invalid = |reason: &str| VersionError::InvalidRange {
        spec: spec.to_owned(),
        reason: format!("{reason}: {set}"),
    };

    let lower_inclusive = set.starts_with('[');
    let upper_inclusive = set.ends_with(']');
    let inner = set
        .get(1..set.len().saturating_sub(1))
        .unwrap_or_default()
        .trim();

    let Some((lower, upper)) = inner.split_once(',') else {
        if !lower_inclusive || !upper_inclusive {
            return Err(invalid("single version must be surrounded by []"));
        }
        let version = ArtifactVersion::parse(inner);
        return Ok(Restriction {
            lower: Some(version.clone()),
            lower_inclusive,
            upper: Some(version),
            upper_inclusive,
        });
    };

    let (lower, upper) = (lower.trim(), upper.trim());
    if lower == upper {
        return Err(invalid("range cannot have identical boundaries"));
    }
    let lower = (!lower.is_empty()).then(|| ArtifactVersion::parse(lower));
    let upper = (!upper.is_empty()).then(|| ArtifactVersion::parse(upper));
    if let (Some(l), Some(u)) = (&lower, &upper) {
        if u < l {
            return Err(invalid("range defies version ordering"));
        }
    }

    Ok(Restriction {
        lower,
        lower_inclusive,
        upper,
        upper_inclusive,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(s: &str) -> ArtifactVersion {
        ArtifactVersion::parse(s)
    }

    #[test]
    fn bare_version_is_recommendation() {
        let range = VersionRange::parse("1.0").unwrap();
        assert_eq!(range.recommended().map(ArtifactVersion::as_str), Some("1.0"));
        assert!(range.contains(&v("0.1")));
        assert!(range.contains(&v("99")));
    }

    #[test]
    fn half_open_range() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.recommended().is_none());
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));
        let first = range.restrictions().first().unwrap();
        assert_eq!(first.lower_bound().map(ArtifactVersion::as_str), Some("1.0"));
    }

    #[test]
    fn exact_set() {
        let range = VersionRange::parse("[1.5]").unwrap();
        assert!(range.contains(&v("1.5")));
        assert!(!range.contains(&v("1.5.1")));
    }

    #[test]
    fn multiple_sets() {
        let range = VersionRange::parse("(,1.0],[1.2,)").unwrap();
        assert_eq!(range.restrictions().len(), 2);
        assert!(range.contains(&v("0.5")));
        assert!(!range.contains(&v("1.1")));
        assert!(range.contains(&v("3.0")));
    }

    #[test]
    fn match_highest_respects_bounds() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert_eq!(
            range.match_highest(["0.9", "1.2", "1.10", "2.0", "2.1"]),
            Some("1.10")
        );
        assert_eq!(range.match_highest(["3.0"]), None);
    }

    #[test]
    fn rejects_malformed_ranges() {
        for spec in ["[1.0,2.0", "(1.0)", "[1.0,1.0]", "[2.0,1.0]", "[1.0,2.0],[1.5,3.0]", "[1.0,2.0],3.0"] {
            assert!(VersionRange::parse(spec).is_err(), "accepted {spec}");
        }
    }
}
