//! Version parsing, range shapes and range rewriting for both ecosystems

use crate::{Ecosystem, Error, Result};
use semver::{Version, VersionReq as SemverReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A concrete published version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedVersion {
    /// Cargo version (`semver`)
    Semver(Version),
    /// npm version (`node-semver`)
    Npm(node_semver::Version),
}

impl ParsedVersion {
    /// Parse a version string based on ecosystem.
    ///
    /// npm versions tolerate a leading `v` or `=`, like the npm CLI does.
    pub fn parse(raw: &str, ecosystem: Ecosystem) -> Result<Self> {
        let trimmed = raw.trim();
        match ecosystem {
            Ecosystem::Rust => Version::parse(trimmed)
                .map(Self::Semver)
                .map_err(|e| Error::InvalidVersion(raw.to_string(), e.to_string())),
            Ecosystem::JavaScript => {
                let cleaned = trimmed.trim_start_matches('=').trim_start_matches('v');
                node_semver::Version::parse(cleaned)
                    .map(Self::Npm)
                    .map_err(|e| Error::InvalidVersion(raw.to_string(), e.to_string()))
            }
        }
    }

    /// Whether this is a prerelease (`1.0.0-beta.1`)
    pub fn is_prerelease(&self) -> bool {
        match self {
            Self::Semver(v) => !v.pre.is_empty(),
            Self::Npm(v) => v.is_prerelease(),
        }
    }

    fn components(&self) -> (u64, u64, u64) {
        match self {
            Self::Semver(v) => (v.major, v.minor, v.patch),
            Self::Npm(v) => (v.major, v.minor, v.patch),
        }
    }

    /// Whether `other` sits on the same caret line as `self`
    fn caret_compatible(&self, other: &Self) -> bool {
        match (self.components(), other.components()) {
            ((0, 0, patch), (0, 0, other_patch)) => patch == other_patch,
            ((0, minor, _), (0, other_minor, _)) => minor == other_minor,
            ((major, _, _), (other_major, _, _)) => major == other_major,
        }
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Semver(a), Self::Semver(b)) => a.cmp(b),
            (Self::Npm(a), Self::Npm(b)) => a.cmp(b),
            // One run never mixes ecosystems; keep the order total anyway.
            (Self::Semver(_), Self::Npm(_)) => Ordering::Less,
            (Self::Npm(_), Self::Semver(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver(v) => write!(f, "{}", v),
            Self::Npm(v) => write!(f, "{}", v),
        }
    }
}

/// Parsed version requirement that handles both semver and npm-style
#[derive(Debug, Clone)]
pub enum ParsedRange {
    /// Semver requirement (Cargo: "1.0", "^1.0", ">=1.0, <2.0")
    Semver(SemverReq),
    /// npm-style requirement (npm: "^1.0.0", "~1.0.0", "*", "1.x || 2.x")
    Npm(node_semver::Range),
}

impl ParsedRange {
    /// Parse a version requirement based on ecosystem
    pub fn parse(raw: &str, ecosystem: Ecosystem) -> Result<Self> {
        let trimmed = raw.trim();
        match ecosystem {
            Ecosystem::Rust => SemverReq::parse(trimmed)
                .map(Self::Semver)
                .map_err(|e| Error::InvalidVersion(raw.to_string(), e.to_string())),
            Ecosystem::JavaScript => {
                // npm treats an empty range as "any version".
                let input = if trimmed.is_empty() { "*" } else { trimmed };
                node_semver::Range::parse(input)
                    .map(Self::Npm)
                    .map_err(|e| Error::InvalidVersion(raw.to_string(), e.to_string()))
            }
        }
    }

    /// Check if a version satisfies this requirement
    pub fn satisfies(&self, version: &ParsedVersion) -> bool {
        match (self, version) {
            (Self::Semver(req), ParsedVersion::Semver(v)) => req.matches(v),
            (Self::Npm(range), ParsedVersion::Npm(v)) => range.satisfies(v),
            _ => false,
        }
    }
}

/// Operator shape of a declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeShape {
    /// Pinned to one version (`1.2.3`, `=1.2.3`)
    Exact,
    /// `^1.2.3`, or a bare Cargo requirement (`1.2`)
    Caret,
    /// `~1.2.3`
    Tilde,
    /// Anything else: comparators, unions, hyphen ranges, wildcards
    Complex,
}

/// A declared range with its shape and base version.
#[derive(Debug, Clone)]
pub struct RangeSpec {
    raw: String,
    shape: RangeShape,
    operator: String,
    base: Option<ParsedVersion>,
    range: ParsedRange,
}

impl RangeSpec {
    /// Analyze a declared range.
    ///
    /// # Errors
    ///
    /// `Error::InvalidVersion` if the text is not a valid range at all.
    pub fn parse(raw: &str, ecosystem: Ecosystem) -> Result<Self> {
        let range = ParsedRange::parse(raw, ecosystem)?;
        let trimmed = raw.trim();

        let (shape, operator, base) = match ecosystem {
            Ecosystem::JavaScript => analyze_npm(trimmed),
            Ecosystem::Rust => analyze_cargo(trimmed),
        };

        let base = match base {
            Some(text) => match ParsedVersion::parse(&text, ecosystem) {
                Ok(version) => Some(version),
                Err(_) => return Ok(Self::complex(raw, range)),
            },
            None => None,
        };

        if base.is_none() {
            return Ok(Self::complex(raw, range));
        }

        Ok(Self {
            raw: raw.to_string(),
            shape,
            operator,
            base,
            range,
        })
    }

    fn complex(raw: &str, range: ParsedRange) -> Self {
        Self {
            raw: raw.to_string(),
            shape: RangeShape::Complex,
            operator: String::new(),
            base: None,
            range,
        }
    }

    /// The range as declared
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Operator shape
    pub fn shape(&self) -> RangeShape {
        self.shape
    }

    /// Lowest version the range names (`None` for complex ranges)
    pub fn base(&self) -> Option<&ParsedVersion> {
        self.base.as_ref()
    }

    /// Whether this is an exact pin
    pub fn is_pinned(&self) -> bool {
        self.shape == RangeShape::Exact
    }

    /// Check if a version satisfies this range
    pub fn satisfies(&self, version: &ParsedVersion) -> bool {
        self.range.satisfies(version)
    }

    /// The parsed requirement
    pub fn range(&self) -> &ParsedRange {
        &self.range
    }

    /// Rewrite this range to point at `target`, keeping the operator.
    ///
    /// Returns `None` for complex ranges, which are never rewritten.
    pub fn rewrite(&self, target: &ParsedVersion) -> Option<String> {
        match self.shape {
            RangeShape::Complex => None,
            _ => Some(format!("{}{}", self.operator, target)),
        }
    }

    /// Whether moving this range to `target` is a breaking bump.
    ///
    /// Breaking means the leftmost non-zero component of the base changes,
    /// the same line both npm and Cargo caret requirements draw: `1.x` to
    /// `2.0.0`, `0.3.x` to `0.4.0`, or `0.0.3` to `0.0.4`.
    pub fn is_breaking_bump(&self, target: &ParsedVersion) -> bool {
        self.base
            .as_ref()
            .is_some_and(|base| !base.caret_compatible(target))
    }
}

/// Returns (shape, operator, base version text) for an npm range.
fn analyze_npm(raw: &str) -> (RangeShape, String, Option<String>) {
    if let Some(rest) = raw.strip_prefix('^') {
        return (
            RangeShape::Caret,
            "^".to_string(),
            complete_version(rest.trim_start_matches('v')),
        );
    }
    if let Some(rest) = raw.strip_prefix('~') {
        if rest.starts_with('>') {
            return (RangeShape::Complex, String::new(), None);
        }
        return (
            RangeShape::Tilde,
            "~".to_string(),
            complete_version(rest.trim_start_matches('v')),
        );
    }

    let (operator, rest) = if let Some(rest) = raw.strip_prefix('=') {
        ("=", rest)
    } else if let Some(rest) = raw.strip_prefix('v') {
        ("v", rest)
    } else {
        ("", raw)
    };

    // In npm a partial bare version (`1.2`) is an x-range, not a pin.
    match complete_version(rest) {
        Some(full) if full == rest => (RangeShape::Exact, operator.to_string(), Some(full)),
        _ => (RangeShape::Complex, String::new(), None),
    }
}

/// Returns (shape, operator, base version text) for a Cargo requirement.
fn analyze_cargo(raw: &str) -> (RangeShape, String, Option<String>) {
    if let Some(rest) = raw.strip_prefix('=') {
        let rest = rest.trim_start();
        return match complete_version(rest) {
            Some(full) if full == rest => (RangeShape::Exact, "=".to_string(), Some(full)),
            _ => (RangeShape::Complex, String::new(), None),
        };
    }
    if let Some(rest) = raw.strip_prefix('^') {
        return (
            RangeShape::Caret,
            "^".to_string(),
            complete_version(rest.trim_start()),
        );
    }
    if let Some(rest) = raw.strip_prefix('~') {
        return (
            RangeShape::Tilde,
            "~".to_string(),
            complete_version(rest.trim_start()),
        );
    }
    // A bare requirement is a caret requirement; the bare form is preserved.
    (RangeShape::Caret, String::new(), complete_version(raw))
}

/// Complete a possibly partial version (`1`, `1.2`, `1.2.3-beta.1`) to three components.
///
/// Returns `None` if the text contains anything but a single version.
fn complete_version(text: &str) -> Option<String> {
    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }

    let core_end = text.find(['-', '+']).unwrap_or(text.len());
    let (core, suffix) = text.split_at(core_end);
    let parts: Vec<&str> = core.split('.').collect();

    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    match parts.len() {
        3 => Some(text.to_string()),
        // Prerelease tags only make sense on a full version.
        _ if !suffix.is_empty() => None,
        1 => Some(format!("{}.0.0", core)),
        _ => Some(format!("{}.0", core)),
    }
}

/// Operator used when writing a brand-new declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePrefix {
    /// `^1.2.3` (Cargo: bare `1.2.3`)
    #[default]
    Caret,
    /// `~1.2.3`
    Tilde,
    /// `1.2.3` (Cargo: `=1.2.3`)
    Exact,
}

impl RangePrefix {
    /// Format a new range for `version`
    pub fn format(&self, ecosystem: Ecosystem, version: &ParsedVersion) -> String {
        match (self, ecosystem) {
            (RangePrefix::Caret, Ecosystem::JavaScript) => format!("^{}", version),
            (RangePrefix::Caret, Ecosystem::Rust) => version.to_string(),
            (RangePrefix::Tilde, _) => format!("~{}", version),
            (RangePrefix::Exact, Ecosystem::JavaScript) => version.to_string(),
            (RangePrefix::Exact, Ecosystem::Rust) => format!("={}", version),
        }
    }
}

impl FromStr for RangePrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "^" | "caret" => Ok(RangePrefix::Caret),
            "~" | "tilde" => Ok(RangePrefix::Tilde),
            "" | "=" | "exact" => Ok(RangePrefix::Exact),
            other => Err(Error::InvalidVersion(
                other.to_string(),
                "expected one of '^', '~', '='".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npm(v: &str) -> ParsedVersion {
        ParsedVersion::parse(v, Ecosystem::JavaScript).unwrap()
    }

    fn cargo(v: &str) -> ParsedVersion {
        ParsedVersion::parse(v, Ecosystem::Rust).unwrap()
    }

    #[test]
    fn test_npm_shapes() {
        let cases = [
            ("4.17.15", RangeShape::Exact),
            ("=4.17.15", RangeShape::Exact),
            ("v4.17.15", RangeShape::Exact),
            ("^4.17.0", RangeShape::Caret),
            ("^4.17", RangeShape::Caret),
            ("~1.2.3", RangeShape::Tilde),
            ("4.17", RangeShape::Complex),
            ("4.x", RangeShape::Complex),
            ("*", RangeShape::Complex),
            ("", RangeShape::Complex),
            (">=1.0.0 <2.0.0", RangeShape::Complex),
            ("^1.0.0 || ^2.0.0", RangeShape::Complex),
            ("1.0.0 - 2.0.0", RangeShape::Complex),
        ];
        for (raw, shape) in cases {
            let spec = RangeSpec::parse(raw, Ecosystem::JavaScript).unwrap();
            assert_eq!(spec.shape(), shape, "shape of {:?}", raw);
        }
    }

    #[test]
    fn test_cargo_shapes() {
        let cases = [
            ("=1.0.3", RangeShape::Exact),
            ("1.0", RangeShape::Caret),
            ("1", RangeShape::Caret),
            ("^1.0.3", RangeShape::Caret),
            ("~1.2", RangeShape::Tilde),
            ("=1.0", RangeShape::Complex),
            (">=1.0, <2.0", RangeShape::Complex),
            ("*", RangeShape::Complex),
        ];
        for (raw, shape) in cases {
            let spec = RangeSpec::parse(raw, Ecosystem::Rust).unwrap();
            assert_eq!(spec.shape(), shape, "shape of {:?}", raw);
        }
    }

    #[test]
    fn test_invalid_range_is_an_error() {
        assert!(RangeSpec::parse("not a range!", Ecosystem::Rust).is_err());
    }

    #[test]
    fn test_rewrite_keeps_operator() {
        let target = npm("4.17.21");
        let rewrite = |raw: &str| {
            RangeSpec::parse(raw, Ecosystem::JavaScript)
                .unwrap()
                .rewrite(&target)
        };
        assert_eq!(rewrite("4.17.15").as_deref(), Some("4.17.21"));
        assert_eq!(rewrite("=4.17.15").as_deref(), Some("=4.17.21"));
        assert_eq!(rewrite("^4.17.0").as_deref(), Some("^4.17.21"));
        assert_eq!(rewrite("~4.17.0").as_deref(), Some("~4.17.21"));
        assert_eq!(rewrite(">=4 <5"), None);

        let target = cargo("1.0.210");
        let spec = RangeSpec::parse("1.0", Ecosystem::Rust).unwrap();
        assert_eq!(spec.rewrite(&target).as_deref(), Some("1.0.210"));
        let spec = RangeSpec::parse("=1.0.100", Ecosystem::Rust).unwrap();
        assert_eq!(spec.rewrite(&target).as_deref(), Some("=1.0.210"));
    }

    #[test]
    fn test_breaking_bump_detection() {
        let spec = RangeSpec::parse("^1.2.0", Ecosystem::JavaScript).unwrap();
        assert!(spec.is_breaking_bump(&npm("2.0.0")));
        assert!(!spec.is_breaking_bump(&npm("1.9.0")));

        let spec = RangeSpec::parse(">=1.0.0", Ecosystem::JavaScript).unwrap();
        assert!(!spec.is_breaking_bump(&npm("2.0.0")));

        // below 1.0 the leftmost non-zero component is the breaking one
        let spec = RangeSpec::parse("^0.3.0", Ecosystem::JavaScript).unwrap();
        assert!(spec.is_breaking_bump(&npm("0.4.0")));
        assert!(!spec.is_breaking_bump(&npm("0.3.9")));

        let spec = RangeSpec::parse("~0.0.3", Ecosystem::JavaScript).unwrap();
        assert!(spec.is_breaking_bump(&npm("0.0.4")));

        let spec = RangeSpec::parse("~1.2.0", Ecosystem::JavaScript).unwrap();
        assert!(!spec.is_breaking_bump(&npm("1.3.0")));

        let spec = RangeSpec::parse("0.3", Ecosystem::Rust).unwrap();
        assert!(spec.is_breaking_bump(&cargo("0.4.0")));
        assert!(!spec.is_breaking_bump(&cargo("0.3.17")));
    }

    #[test]
    fn test_satisfies() {
        let spec = RangeSpec::parse("^1.0.0", Ecosystem::JavaScript).unwrap();
        assert!(spec.satisfies(&npm("1.0.0")));
        assert!(spec.satisfies(&npm("1.1.0")));
        assert!(!spec.satisfies(&npm("2.0.0")));

        let spec = RangeSpec::parse("1.0", Ecosystem::Rust).unwrap();
        assert!(spec.satisfies(&cargo("1.0.210")));
        assert!(!spec.satisfies(&cargo("2.0.0")));
    }

    #[test]
    fn test_version_ordering_is_semantic() {
        assert!(npm("1.10.0") > npm("1.9.0"));
        assert!(npm("1.0.0") > npm("1.0.0-beta.2"));
        assert!(npm("1.0.0-beta.10") > npm("1.0.0-beta.2"));
        assert!(cargo("0.10.0") > cargo("0.9.9"));
        assert_eq!(npm("v1.2.3"), npm("1.2.3"));
    }

    #[test]
    fn test_range_prefix_format() {
        let v = npm("2.1.0");
        assert_eq!(RangePrefix::Caret.format(Ecosystem::JavaScript, &v), "^2.1.0");
        assert_eq!(RangePrefix::Exact.format(Ecosystem::JavaScript, &v), "2.1.0");

        let v = cargo("2.1.0");
        assert_eq!(RangePrefix::Caret.format(Ecosystem::Rust, &v), "2.1.0");
        assert_eq!(RangePrefix::Exact.format(Ecosystem::Rust, &v), "=2.1.0");
        assert_eq!("~".parse::<RangePrefix>().unwrap(), RangePrefix::Tilde);
    }
}
