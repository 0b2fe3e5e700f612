//! The dependency manifest: what the application declares it needs.

use crate::version::VersionSpec;

/// One declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Package name as written in the manifest
    pub name: String,
    /// Version constraint
    pub spec: VersionSpec,
    /// Declared in a development-only group
    pub dev: bool,
}

impl Requirement {
    pub fn runtime(name: impl Into<String>, spec: VersionSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            dev: false,
        }
    }

    pub fn dev(name: impl Into<String>, spec: VersionSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            dev: true,
        }
    }
}

/// A parsed dependency manifest, toolchain-agnostic.
///
/// Produced by a [`Toolchain`](crate::Toolchain) parser and verified against
/// the corresponding lock file before any dependency is restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    pub requirements: Vec<Requirement>,
}

impl DependencyManifest {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    /// Requirements selected for installation under the given dev policy.
    pub fn selected(&self, include_dev: bool) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(move |req| include_dev || !req.dev)
    }

    /// Names that appear only in development groups, normalized.
    pub fn dev_only_names(&self) -> Vec<String> {
        let runtime: Vec<String> = self
            .requirements
            .iter()
            .filter(|req| !req.dev)
            .map(|req| normalize_name(&req.name))
            .collect();
        let mut dev_only: Vec<String> = self
            .requirements
            .iter()
            .filter(|req| req.dev)
            .map(|req| normalize_name(&req.name))
            .filter(|name| !runtime.contains(name))
            .collect();
        dev_only.sort();
        dev_only.dedup();
        dev_only
    }
}

/// Normalize a package name for comparison across manifest and lock file.
///
/// Lowercases and folds `_` to `-`, so `MarkupSafe` and `markupsafe` (or
/// `typing_extensions` and `typing-extensions`) compare equal.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

/// Split a requirement string into name and constraint at the first operator
/// character (`fastapi>=0.100` becomes `("fastapi", ">=0.100")`).
pub fn split_constraint(input: &str) -> (&str, &str) {
    let boundary = input
        .find(['=', '>', '<', '^', '~', '!', '*'])
        // arch-lint: allow(no-silent-result-drop) reason="str::find returns Option — no operator means the whole input is the name"
        .unwrap_or(input.len());
    let (name, constraint) = input.split_at(boundary);
    (name.trim(), constraint.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn exact(s: &str) -> VersionSpec {
        VersionSpec::Exact(Version::parse(s).unwrap())
    }

    #[test]
    fn selected_excludes_dev_by_default() {
        let manifest = DependencyManifest::new(vec![
            Requirement::runtime("stario", exact("0.3.1")),
            Requirement::dev("pytest", VersionSpec::Any),
        ]);
        let names: Vec<&str> = manifest
            .selected(false)
            .map(|req| req.name.as_str())
            .collect();
        assert_eq!(names, ["stario"]);
    }

    #[test]
    fn selected_includes_dev_when_asked() {
        let manifest = DependencyManifest::new(vec![
            Requirement::runtime("stario", exact("0.3.1")),
            Requirement::dev("pytest", VersionSpec::Any),
        ]);
        assert_eq!(manifest.selected(true).count(), 2);
    }

    #[test]
    fn dev_only_names_exclude_shared_packages() {
        let manifest = DependencyManifest::new(vec![
            Requirement::runtime("requests", VersionSpec::Any),
            Requirement::dev("requests", VersionSpec::Any),
            Requirement::dev("Pytest_Cov", VersionSpec::Any),
        ]);
        assert_eq!(manifest.dev_only_names(), ["pytest-cov"]);
    }

    #[test]
    fn normalize_folds_case_and_underscores() {
        assert_eq!(normalize_name("MarkupSafe"), "markupsafe");
        assert_eq!(normalize_name("typing_extensions"), "typing-extensions");
        assert_eq!(normalize_name(" stario "), "stario");
    }

    #[test]
    fn split_constraint_finds_operator_boundary() {
        assert_eq!(split_constraint("stario==0.3.1"), ("stario", "==0.3.1"));
        assert_eq!(split_constraint("fastapi >= 0.100"), ("fastapi", ">= 0.100"));
        assert_eq!(split_constraint("requests"), ("requests", ""));
        assert_eq!(split_constraint("tokio^1.0"), ("tokio", "^1.0"));
    }
}
