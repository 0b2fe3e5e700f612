//! Minimal version and constraint matching for lock verification.
//!
//! Kiln never resolves dependencies; it only checks that a lock file still
//! satisfies the manifest that produced it. That check needs exact pins,
//! lower bounds, and compatible-release ranges — constraint forms beyond
//! those are rejected at manifest parse time rather than silently widened.

use std::cmp::Ordering;
use std::fmt;

/// A dotted numeric version with an optional pre-release suffix.
///
/// `1.2.3`, `2025.4`, and `1.0.0rc1` all parse. Missing components compare
/// as zero, so `1.2` and `1.2.0` are equal.
///
/// # Examples
///
/// ```
/// use kiln_core::Version;
///
/// let a = Version::parse("1.2").unwrap();
/// let b = Version::parse("1.2.0").unwrap();
/// assert_eq!(a, b);
/// assert!(Version::parse("1.10").unwrap() > Version::parse("1.9").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
    suffix: Option<String>,
}

impl Version {
    /// Parse a version string. Returns `None` for input that does not start
    /// with a numeric component.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let mut components = Vec::new();
        let mut rest = input;
        loop {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                // arch-lint: allow(no-silent-result-drop) reason="str::find returns Option — no non-digit means the rest is all digits"
                .unwrap_or(rest.len());
            if digits == 0 {
                return None;
            }
            // arch-lint: allow(no-silent-result-drop) reason="Version::parse returns Option by contract — unparsable components map to None"
            components.push(rest[..digits].parse().ok()?);
            rest = &rest[digits..];
            match rest.strip_prefix('.') {
                Some(r) if r.starts_with(|c: char| c.is_ascii_digit()) => rest = r,
                _ => break,
            }
        }
        let suffix = rest.trim_start_matches(['-', '.', '+']);
        let suffix = (!suffix.is_empty()).then(|| suffix.to_ascii_lowercase());
        Some(Self { components, suffix })
    }

    /// First component of the version (`2` for `2.1.4`).
    pub fn major(&self) -> u64 {
        // arch-lint: allow(no-silent-result-drop) reason="Option from slice::first — empty components default to major 0"
        self.components.first().copied().unwrap_or(0)
    }

    /// Whether the version carries a pre-release suffix (`1.0.0rc1`).
    pub fn is_prerelease(&self) -> bool {
        self.suffix.is_some()
    }

    fn component(&self, idx: usize) -> u64 {
        // arch-lint: allow(no-silent-result-drop) reason="Option from slice::get — missing components compare as zero"
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for idx in 0..len {
            match self.component(idx).cmp(&other.component(idx)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        // A release outranks its own pre-release: 1.0.0 > 1.0.0rc1.
        match (&self.suffix, &other.suffix) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, c) in self.components.iter().enumerate() {
            if idx > 0 {
                write!(f, ".")?;
            }
            write!(f, "{c}")?;
        }
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

/// A version constraint from a dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Any version satisfies the requirement (bare name, `*`).
    Any,
    /// Exactly this version (`==1.0.0`, cargo `=1.0.0`).
    Exact(Version),
    /// This version or newer (`>=1.2`).
    AtLeast(Version),
    /// Same major line, this version or newer (`^1.2`, `~=1.4`).
    Compatible(Version),
}

type Build = fn(Version) -> VersionSpec;

const OPERATORS: &[(&str, Build)] = &[
    ("==", VersionSpec::Exact as Build),
    (">=", VersionSpec::AtLeast as Build),
    ("~=", VersionSpec::Compatible as Build),
    ("^", VersionSpec::Compatible as Build),
    ("~", VersionSpec::Compatible as Build),
    ("=", VersionSpec::Exact as Build),
];

impl VersionSpec {
    /// Parse an operator-prefixed constraint (`==1.0`, `>=1.2`, `^2`, `~=1.4`,
    /// `*`). Returns `None` when the input carries no recognized operator;
    /// callers decide what a bare version means in their ecosystem.
    pub fn parse_prefixed(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input == "*" {
            return Some(Self::Any);
        }
        for (op, build) in OPERATORS {
            if let Some(rest) = input.strip_prefix(op) {
                return Version::parse(rest).map(build);
            }
        }
        None
    }

    /// Whether `version` satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(want) => version == want,
            Self::AtLeast(min) => version >= min,
            Self::Compatible(base) => version >= base && version.major() == base.major(),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "=={v}"),
            Self::AtLeast(v) => write!(f, ">={v}"),
            Self::Compatible(v) => write!(f, "^{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    // ── Version parsing and ordering ──

    #[test]
    fn parse_plain_versions() {
        assert_eq!(v("1.2.3"), v("1.2.3"));
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("2025.4"), v("2025.4.0"));
    }

    #[test]
    fn parse_rejects_non_numeric_start() {
        assert!(Version::parse("").is_none());
        assert!(Version::parse("abc").is_none());
        assert!(Version::parse(">=1.0").is_none());
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("0.3.11") > v("0.3.2"));
    }

    #[test]
    fn release_outranks_prerelease() {
        assert!(v("1.0.0") > v("1.0.0rc1"));
        assert!(v("1.0.0-rc1") < v("1.0.0"));
        assert!(v("1.0.0rc1").is_prerelease());
    }

    #[test]
    fn suffix_separator_does_not_matter() {
        assert_eq!(v("1.0.0rc1"), v("1.0.0-rc1"));
    }

    // ── Constraint parsing and matching ──

    #[test]
    fn parse_prefixed_operators() {
        assert_eq!(VersionSpec::parse_prefixed("*"), Some(VersionSpec::Any));
        assert_eq!(
            VersionSpec::parse_prefixed("==1.0.0"),
            Some(VersionSpec::Exact(v("1.0.0")))
        );
        assert_eq!(
            VersionSpec::parse_prefixed(">=0.3"),
            Some(VersionSpec::AtLeast(v("0.3")))
        );
        assert_eq!(
            VersionSpec::parse_prefixed("^1.2"),
            Some(VersionSpec::Compatible(v("1.2")))
        );
        assert_eq!(
            VersionSpec::parse_prefixed("~=2.31"),
            Some(VersionSpec::Compatible(v("2.31")))
        );
    }

    #[test]
    fn parse_prefixed_rejects_bare_and_unknown() {
        assert_eq!(VersionSpec::parse_prefixed("1.2.3"), None);
        assert_eq!(VersionSpec::parse_prefixed("<2.0"), None);
        assert_eq!(VersionSpec::parse_prefixed("!=1.0"), None);
    }

    #[test]
    fn exact_requires_equality() {
        let spec = VersionSpec::Exact(v("1.0"));
        assert!(spec.matches(&v("1.0.0")));
        assert!(!spec.matches(&v("1.1")));
        assert!(!spec.matches(&v("1.0.1")));
    }

    #[test]
    fn at_least_is_a_lower_bound() {
        let spec = VersionSpec::AtLeast(v("1.2"));
        assert!(spec.matches(&v("1.2")));
        assert!(spec.matches(&v("2.0")));
        assert!(!spec.matches(&v("1.1.9")));
    }

    #[test]
    fn compatible_stays_on_the_major_line() {
        let spec = VersionSpec::Compatible(v("1.2"));
        assert!(spec.matches(&v("1.2")));
        assert!(spec.matches(&v("1.9.4")));
        assert!(!spec.matches(&v("2.0")));
        assert!(!spec.matches(&v("1.1")));
    }

    // ── Property-based tests ──

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Strategy: dotted numeric version, 1-4 components, optional suffix
        fn version_string() -> impl Strategy<Value = String> {
            (
                proptest::collection::vec(0u64..1000, 1..=4),
                proptest::option::of("[a-z]{1,5}[0-9]{0,2}"),
            )
                .prop_map(|(comps, suffix)| {
                    let base = comps
                        .iter()
                        .map(u64::to_string)
                        .collect::<Vec<_>>()
                        .join(".");
                    match suffix {
                        Some(s) => format!("{base}-{s}"),
                        None => base,
                    }
                })
        }

        proptest! {
            #[test]
            fn parse_never_panics(input in "\\PC{0,40}") {
                let _ = Version::parse(&input);
                let _ = VersionSpec::parse_prefixed(&input);
            }

            #[test]
            fn well_formed_versions_always_parse(input in version_string()) {
                prop_assert!(Version::parse(&input).is_some(), "failed on {input}");
            }

            #[test]
            fn display_roundtrips(input in version_string()) {
                let parsed = Version::parse(&input).unwrap();
                let reparsed = Version::parse(&parsed.to_string()).unwrap();
                prop_assert_eq!(parsed, reparsed);
            }

            #[test]
            fn exact_always_matches_itself(input in version_string()) {
                let version = Version::parse(&input).unwrap();
                prop_assert!(VersionSpec::Exact(version.clone()).matches(&version));
            }

            #[test]
            fn at_least_is_reflexive(input in version_string()) {
                let version = Version::parse(&input).unwrap();
                prop_assert!(VersionSpec::AtLeast(version.clone()).matches(&version));
            }

            #[test]
            fn compatible_is_reflexive(input in version_string()) {
                let version = Version::parse(&input).unwrap();
                prop_assert!(VersionSpec::Compatible(version.clone()).matches(&version));
            }

            #[test]
            fn compatible_never_crosses_major(a in version_string(), b in version_string()) {
                let base = Version::parse(&a).unwrap();
                let candidate = Version::parse(&b).unwrap();
                if VersionSpec::Compatible(base.clone()).matches(&candidate) {
                    prop_assert_eq!(base.major(), candidate.major());
                }
            }

            #[test]
            fn ordering_is_antisymmetric(a in version_string(), b in version_string()) {
                let a = Version::parse(&a).unwrap();
                let b = Version::parse(&b).unwrap();
                prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            }
        }
    }
}
