//! Version expressions: exact versions, ranges, `{regex}` patterns and the
//! symbolic tokens `RELEASE`, `LATEST` and `SNAPSHOT`.

use quarry_util::maven::{VERSION_LATEST, VERSION_RELEASE, VERSION_SNAPSHOT};
use regex::Regex;

use crate::error::VersionError;
use crate::range::VersionRange;
use crate::version::{self, ArtifactVersion};

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Whether `expr` can only be evaluated against a version list.
///
/// True for strings starting with `[`, `(` or `{`, ending with `]`, `)` or
/// `}`, or containing a comma. Symbolic tokens are not patterns.
pub fn is_pattern(expr: &str) -> bool {
    let expr = expr.trim();
    expr.starts_with(['[', '(', '{']) || expr.ends_with([']', ')', '}']) || expr.contains(',')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbolic {
    Release,
    Latest,
    Snapshot,
}

/// A classified version expression.
#[derive(Debug, Clone)]
pub enum VersionExpression {
    Exact(String),
    Range(VersionRange),
    /// Anchored to match the whole version string.
    Regex(Regex),
    Symbolic(Symbolic),
}

impl VersionExpression {
    /// Classify and compile `expr`.
    ///
    /// # Errors
    /// Returns an error for a `{regex}` that does not compile or a range that
    /// does not parse.
    pub fn parse(expr: &str) -> Result<Self, VersionError> {
        let expr = expr.trim();
        match expr {
            VERSION_RELEASE => return Ok(Self::Symbolic(Symbolic::Release)),
            VERSION_LATEST => return Ok(Self::Symbolic(Symbolic::Latest)),
            VERSION_SNAPSHOT => return Ok(Self::Symbolic(Symbolic::Snapshot)),
            _ => {}
        }

        if let Some(body) = expr.strip_prefix('{').and_then(|e| e.strip_suffix('}')) {
            let regex = Regex::new(&format!("^(?:{body})$")).map_err(|e| {
                VersionError::InvalidPattern {
                    pattern: expr.to_owned(),
                    message: e.to_string(),
                }
            })?;
            return Ok(Self::Regex(regex));
        }

        if is_pattern(expr) {
            return Ok(Self::Range(VersionRange::parse(expr)?));
        }
        Ok(Self::Exact(expr.to_owned()))
    }

    /// Whether evaluating this expression needs the artifact's version list.
    pub fn needs_metadata(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Whether `version` satisfies this expression.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::Exact(exact) => ArtifactVersion::parse(exact) == ArtifactVersion::parse(version),
            Self::Range(range) => range.contains(&ArtifactVersion::parse(version)),
            Self::Regex(regex) => regex.is_match(version),
            Self::Symbolic(_) => true,
        }
    }

    /// Pick a concrete version from an artifact's published versions.
    ///
    /// Regex patterns take their highest match. Ranges take the recommended
    /// version, else the first restriction's lower bound, else their highest
    /// member. `RELEASE` ignores a pre-release `release` field. Whatever
    /// selects nothing falls back to the highest available version.
    ///
    /// # Errors
    /// Returns `VersionError::EmptyVersionList` when nothing was selected and
    /// `available` is empty.
    pub fn select(
        &self,
        expression: &str,
        available: &[String],
        release: Option<&str>,
        latest: Option<&str>,
    ) -> Result<String, VersionError> {
        let candidates = || available.iter().map(String::as_str);
        let chosen = match self {
            Self::Exact(exact) => Some(exact.as_str()),
            Self::Regex(regex) => version::highest(candidates().filter(|v| regex.is_match(v))),
            Self::Range(range) => range
                .recommended()
                .or_else(|| range.restrictions().first().and_then(|r| r.lower_bound()))
                .map(ArtifactVersion::as_str)
                .or_else(|| range.match_highest(candidates())),
            Self::Symbolic(Symbolic::Release) => {
                release.filter(|r| !version::is_pre_release(r))
            }
            Self::Symbolic(Symbolic::Latest) => latest,
            Self::Symbolic(Symbolic::Snapshot) => latest
                .filter(|l| is_snapshot(l))
                .or_else(|| version::highest(candidates().filter(|v| is_snapshot(v)))),
        };

        chosen
            .or_else(|| version::highest(candidates()))
            .map(str::to_owned)
            .ok_or_else(|| VersionError::EmptyVersionList {
                expression: expression.to_owned(),
            })
    }
}

fn is_snapshot(version: &str) -> bool {
    version
        .len()
        .checked_sub(SNAPSHOT_SUFFIX.len())
        .and_then(|start| version.get(start..))
        .is_some_and(|suffix| suffix.eq_ignore_ascii_case(SNAPSHOT_SUFFIX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| (*v).to_owned()).collect()
    }

    fn select(expr: &str, available: &[&str], release: Option<&str>, latest: Option<&str>) -> String {
        VersionExpression::parse(expr)
            .unwrap()
            .select(expr, &versions(available), release, latest)
            .unwrap()
    }

    #[test]
    fn pattern_classification() {
        assert!(is_pattern("[1.0,2.0)"));
        assert!(is_pattern("{.*-SNAPSHOT}"));
        assert!(is_pattern("1.0,2.0"));
        assert!(!is_pattern("1.2.3"));
        assert!(!is_pattern("RELEASE"));
    }

    #[test]
    fn regex_takes_highest_by_version_order() {
        assert_eq!(select(r"{1\..*}", &["1.9", "1.10", "2.0"], None, None), "1.10");
    }

    #[test]
    fn regex_is_anchored() {
        let expr = VersionExpression::parse(r"{1\.2}").unwrap();
        assert!(expr.matches("1.2"));
        assert!(!expr.matches("11.2.0"));
    }

    #[test]
    fn regex_without_match_falls_back_to_highest() {
        assert_eq!(select("{9\\..*}", &["1.0", "2.0"], None, None), "2.0");
    }

    #[test]
    fn range_prefers_recommended_then_lower_bound() {
        assert_eq!(select("[1.5,2.0)", &["1.5", "1.9"], None, None), "1.5");
        assert_eq!(select("(,2.0)", &["1.5", "1.9", "2.1"], None, None), "1.9");
    }

    #[test]
    fn release_skips_pre_release_field() {
        let available = ["1.0", "2.0", "3.0.0-beta1"];
        assert_eq!(select("RELEASE", &available, Some("3.0.0-beta1"), None), "3.0.0-beta1");
        assert_eq!(select("RELEASE", &["1.0", "2.0"], Some("3.0.0-beta1"), None), "2.0");
        assert_eq!(select("RELEASE", &["1.0", "2.0"], Some("1.0"), None), "1.0");
    }

    #[test]
    fn latest_uses_latest_field() {
        assert_eq!(select("LATEST", &["1.0", "2.0"], None, Some("1.0")), "1.0");
        assert_eq!(select("LATEST", &["1.0", "2.0"], None, None), "2.0");
    }

    #[test]
    fn snapshot_token() {
        let available = ["1.0", "1.1-SNAPSHOT", "1.2-SNAPSHOT", "1.1"];
        assert_eq!(select("SNAPSHOT", &available, None, Some("1.1")), "1.2-SNAPSHOT");
        assert_eq!(select("SNAPSHOT", &available, None, Some("1.1-SNAPSHOT")), "1.1-SNAPSHOT");
        assert_eq!(select("SNAPSHOT", &["1.0"], None, None), "1.0");
    }

    #[test]
    fn empty_list_fails() {
        let err = VersionExpression::parse("LATEST")
            .unwrap()
            .select("LATEST", &[], None, None)
            .unwrap_err();
        assert!(matches!(err, VersionError::EmptyVersionList { .. }));
    }

    #[test]
    fn bad_regex_is_an_error() {
        assert!(matches!(
            VersionExpression::parse("{1.(}"),
            Err(VersionError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn exact_needs_no_metadata() {
        let expr = VersionExpression::parse("2.3.1").unwrap();
        assert!(!expr.needs_metadata());
        assert_eq!(expr.select("2.3.1", &[], None, None).unwrap(), "2.3.1");
    }
}
