//! Lock files and the frozen-restore consistency gate.
//!
//! A build never resolves versions. The lock file is the single source of
//! truth for what gets installed, and [`verify_frozen`] is the gate that
//! refuses to proceed when the manifest and lock disagree.

use std::collections::BTreeMap;

use crate::manifest::{DependencyManifest, normalize_name};
use crate::version::Version;

/// One exact pin from a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    /// Package name as written in the lock file
    pub name: String,
    /// Exact resolved version
    pub version: Version,
    /// Content checksum when the lock format records one
    pub checksum: Option<String>,
    /// Marked as development-only by the lock format
    pub dev: bool,
}

/// A parsed lock file, toolchain-agnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    pub packages: Vec<LockedPackage>,
}

impl Lockfile {
    pub fn new(packages: Vec<LockedPackage>) -> Self {
        Self { packages }
    }
}

/// The verified, installable set: every pin that survived the consistency
/// gate, keyed by normalized name so iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct FrozenSet {
    packages: BTreeMap<String, LockedPackage>,
}

impl FrozenSet {
    /// Pins in normalized-name order.
    pub fn packages(&self) -> impl Iterator<Item = &LockedPackage> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(&normalize_name(name))
    }
}

/// Check a manifest against its lock file and produce the set to install.
///
/// Every requirement selected by the dev policy must have a lock entry whose
/// pinned version satisfies the requirement's constraint. The returned set
/// holds all lock pins except development-only ones when `include_dev` is
/// false, so transitive dependencies install even though the manifest never
/// names them.
///
/// # Errors
///
/// Any inconsistency aborts the build before a single package is restored:
/// no partial installs, no fallback resolution.
pub fn verify_frozen(
    manifest: &DependencyManifest,
    lock: &Lockfile,
    include_dev: bool,
) -> Result<FrozenSet, ConsistencyError> {
    let mut pins: BTreeMap<String, LockedPackage> = BTreeMap::new();
    for package in &lock.packages {
        let key = normalize_name(&package.name);
        if pins.insert(key.clone(), package.clone()).is_some() {
            return Err(ConsistencyError::DuplicatePin { name: key });
        }
    }

    for requirement in manifest.selected(include_dev) {
        let key = normalize_name(&requirement.name);
        let pinned = pins
            .get(&key)
            .ok_or_else(|| ConsistencyError::MissingFromLock {
                name: requirement.name.clone(),
            })?;
        if !requirement.spec.matches(&pinned.version) {
            return Err(ConsistencyError::VersionMismatch {
                name: requirement.name.clone(),
                required: requirement.spec.to_string(),
                locked: pinned.version.to_string(),
            });
        }
    }

    if !include_dev {
        for name in manifest.dev_only_names() {
            pins.remove(&name);
        }
        pins.retain(|_, package| !package.dev);
    }

    tracing::debug!(
        packages = pins.len(),
        include_dev,
        "lock file verified against manifest"
    );

    Ok(FrozenSet { packages: pins })
}

#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("manifest requires '{name}' but the lock file has no entry for it — re-lock and retry")]
    MissingFromLock { name: String },

    #[error(
        "manifest requires '{name}' {required} but the lock file pins {locked} — re-lock and retry"
    )]
    VersionMismatch {
        name: String,
        required: String,
        locked: String,
    },

    #[error("lock file pins '{name}' more than once")]
    DuplicatePin { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Requirement;
    use crate::version::VersionSpec;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn pin(name: &str, version: &str) -> LockedPackage {
        LockedPackage {
            name: name.to_owned(),
            version: v(version),
            checksum: None,
            dev: false,
        }
    }

    fn dev_pin(name: &str, version: &str) -> LockedPackage {
        LockedPackage {
            dev: true,
            ..pin(name, version)
        }
    }

    // ── The consistency gate ──

    #[test]
    fn matching_exact_pin_passes() {
        let manifest = DependencyManifest::new(vec![Requirement::runtime(
            "x",
            VersionSpec::Exact(v("1.0")),
        )]);
        let lock = Lockfile::new(vec![pin("x", "1.0")]);
        let frozen = verify_frozen(&manifest, &lock, false).unwrap();
        assert_eq!(frozen.len(), 1);
        assert!(frozen.contains("x"));
    }

    #[test]
    fn requirement_bump_without_relock_fails() {
        // Manifest moved to ==1.1 but the lock still pins 1.0.
        let manifest = DependencyManifest::new(vec![Requirement::runtime(
            "x",
            VersionSpec::Exact(v("1.1")),
        )]);
        let lock = Lockfile::new(vec![pin("x", "1.0")]);
        let err = verify_frozen(&manifest, &lock, false).unwrap_err();
        assert!(
            matches!(err, ConsistencyError::VersionMismatch { .. }),
            "got: {err}"
        );
        assert!(err.to_string().contains("1.0"), "got: {err}");
        assert!(err.to_string().contains("1.1"), "got: {err}");
    }

    #[test]
    fn missing_lock_entry_fails() {
        let manifest =
            DependencyManifest::new(vec![Requirement::runtime("ghost", VersionSpec::Any)]);
        let lock = Lockfile::new(vec![pin("x", "1.0")]);
        let err = verify_frozen(&manifest, &lock, false).unwrap_err();
        assert!(
            matches!(err, ConsistencyError::MissingFromLock { .. }),
            "got: {err}"
        );
    }

    #[test]
    fn duplicate_pin_fails() {
        let manifest = DependencyManifest::default();
        let lock = Lockfile::new(vec![pin("x", "1.0"), pin("X", "1.1")]);
        let err = verify_frozen(&manifest, &lock, false).unwrap_err();
        assert!(
            matches!(err, ConsistencyError::DuplicatePin { .. }),
            "got: {err}"
        );
    }

    #[test]
    fn names_compare_normalized() {
        let manifest = DependencyManifest::new(vec![Requirement::runtime(
            "Typing_Extensions",
            VersionSpec::AtLeast(v("4.0")),
        )]);
        let lock = Lockfile::new(vec![pin("typing-extensions", "4.12.2")]);
        assert!(verify_frozen(&manifest, &lock, false).is_ok());
    }

    // ── Transitive and dev handling ──

    #[test]
    fn transitive_pins_install_without_a_requirement() {
        let manifest = DependencyManifest::new(vec![Requirement::runtime(
            "stario",
            VersionSpec::Exact(v("0.3.1")),
        )]);
        let lock = Lockfile::new(vec![pin("stario", "0.3.1"), pin("anyio", "4.4.0")]);
        let frozen = verify_frozen(&manifest, &lock, false).unwrap();
        assert_eq!(frozen.len(), 2);
        assert!(frozen.contains("anyio"));
    }

    #[test]
    fn dev_marked_pins_drop_without_include_dev() {
        let manifest = DependencyManifest::new(vec![Requirement::runtime(
            "stario",
            VersionSpec::Exact(v("0.3.1")),
        )]);
        let lock = Lockfile::new(vec![pin("stario", "0.3.1"), dev_pin("pytest", "8.3.2")]);
        let frozen = verify_frozen(&manifest, &lock, false).unwrap();
        assert!(!frozen.contains("pytest"));

        let frozen = verify_frozen(&manifest, &lock, true).unwrap();
        assert!(frozen.contains("pytest"));
    }

    #[test]
    fn dev_only_requirement_names_drop_without_include_dev() {
        // Lock format without dev markers: the manifest's dev group decides.
        let manifest = DependencyManifest::new(vec![
            Requirement::runtime("stario", VersionSpec::Exact(v("0.3.1"))),
            Requirement::dev("pytest", VersionSpec::Any),
        ]);
        let lock = Lockfile::new(vec![pin("stario", "0.3.1"), pin("pytest", "8.3.2")]);
        let frozen = verify_frozen(&manifest, &lock, false).unwrap();
        assert!(!frozen.contains("pytest"));
        assert!(frozen.contains("stario"));
    }

    #[test]
    fn dev_requirement_missing_from_lock_only_fails_with_include_dev() {
        let manifest = DependencyManifest::new(vec![Requirement::dev("pytest", VersionSpec::Any)]);
        let lock = Lockfile::default();
        assert!(verify_frozen(&manifest, &lock, false).is_ok());
        assert!(verify_frozen(&manifest, &lock, true).is_err());
    }

    #[test]
    fn frozen_set_iterates_in_name_order() {
        let manifest = DependencyManifest::default();
        let lock = Lockfile::new(vec![pin("zlib", "1.3"), pin("anyio", "4.4.0")]);
        let frozen = verify_frozen(&manifest, &lock, false).unwrap();
        let names: Vec<&str> = frozen.packages().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["anyio", "zlib"]);
    }
}
