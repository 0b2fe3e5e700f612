//! Toolchains: the dependency managers kiln knows how to drive.
//!
//! A toolchain names the manifest/lock pair it owns, parses both formats
//! into the common model, and materializes install records in its
//! ecosystem's on-disk layout. Everything downstream (planning, caching,
//! restoration) is toolchain-agnostic.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::lockfile::{LockedPackage, Lockfile};
use crate::manifest::{DependencyManifest, Requirement, normalize_name, split_constraint};
use crate::version::{Version, VersionSpec};

/// Identity of a built-in toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainId {
    Uv,
    Npm,
    Cargo,
}

impl ToolchainId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uv => "uv",
            Self::Npm => "npm",
            Self::Cargo => "cargo",
        }
    }
}

impl fmt::Display for ToolchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dependency manager a build installs, pinned to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
}

impl fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A dependency manager kiln can drive end to end.
pub trait Toolchain: Send + Sync + fmt::Debug {
    fn id(&self) -> ToolchainId;

    /// Manifest file name at the context root (`pyproject.toml`).
    fn manifest_file(&self) -> &'static str;

    /// Lock file name at the context root (`uv.lock`).
    fn lock_file(&self) -> &'static str;

    /// Name of the dependency manager binary.
    fn tool_name(&self) -> &'static str;

    /// Pinned default version of the dependency manager.
    fn default_tool_version(&self) -> &'static str;

    /// Pinned default base runtime reference.
    fn default_base(&self) -> &'static str;

    /// Launch convention when kiln.toml declares no entrypoint.
    fn default_entrypoint(&self) -> &'static [&'static str];

    /// Parse the manifest into the common model.
    fn parse_manifest(&self, path: &Path, content: &str) -> crate::Result<DependencyManifest>;

    /// Parse the lock file into the common model.
    fn parse_lockfile(&self, path: &Path, content: &str) -> crate::Result<Lockfile>;

    /// Materialize one verified pin under `app_root` in this ecosystem's
    /// installed layout.
    fn install_record(&self, app_root: &Path, package: &LockedPackage) -> std::io::Result<()>;
}

// ── Registry ──

/// The set of toolchains a build can select from.
pub struct ToolchainRegistry {
    toolchains: Vec<Box<dyn Toolchain>>,
}

impl ToolchainRegistry {
    /// All built-in toolchains.
    pub fn builtin() -> Self {
        Self {
            toolchains: vec![
                Box::new(UvToolchain),
                Box::new(NpmToolchain),
                Box::new(CargoToolchain),
            ],
        }
    }

    pub fn get(&self, id: ToolchainId) -> &dyn Toolchain {
        self.toolchains
            .iter()
            .find(|t| t.id() == id)
            .map(Box::as_ref)
            .expect("registry always contains every built-in id")
    }

    /// Look up a toolchain by its configured name.
    pub fn by_name(&self, name: &str) -> crate::Result<&dyn Toolchain> {
        self.toolchains
            .iter()
            .find(|t| t.id().as_str() == name)
            .map(Box::as_ref)
            .ok_or_else(|| crate::Error::UnknownToolchain {
                id: name.to_owned(),
                known: self.known_ids(),
            })
    }

    /// Detect the toolchain from manifests present at the context root.
    ///
    /// # Errors
    ///
    /// - [`Error::NoManifestInContext`](crate::Error::NoManifestInContext)
    ///   when no known manifest is present
    /// - [`Error::AmbiguousToolchain`](crate::Error::AmbiguousToolchain)
    ///   when more than one toolchain's manifest is present
    pub fn detect(&self, dir: &Path) -> crate::Result<&dyn Toolchain> {
        let matches: Vec<&dyn Toolchain> = self
            .toolchains
            .iter()
            .map(Box::as_ref)
            .filter(|t| dir.join(t.manifest_file()).is_file())
            .collect();

        match matches.as_slice() {
            [] => Err(crate::Error::NoManifestInContext {
                dir: dir.to_path_buf(),
                expected: self
                    .toolchains
                    .iter()
                    .map(|t| t.manifest_file().to_owned())
                    .collect(),
            }),
            [single] => {
                tracing::debug!(toolchain = %single.id(), "toolchain detected");
                Ok(*single)
            }
            many => Err(crate::Error::AmbiguousToolchain {
                dir: dir.to_path_buf(),
                matches: many.iter().map(|t| t.id().to_string()).collect(),
            }),
        }
    }

    pub fn known_ids(&self) -> Vec<String> {
        self.toolchains.iter().map(|t| t.id().to_string()).collect()
    }
}

impl Default for ToolchainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── uv (Python) ──

/// Python projects managed by uv: `pyproject.toml` + `uv.lock`.
#[derive(Debug)]
pub struct UvToolchain;

#[derive(Deserialize)]
struct PyProject {
    #[serde(default)]
    project: PyProjectMeta,
    #[serde(default, rename = "dependency-groups")]
    dependency_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize, Default)]
struct PyProjectMeta {
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct UvLock {
    #[serde(default)]
    package: Vec<UvLockedPackage>,
}

#[derive(Deserialize)]
struct UvLockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: Option<UvSource>,
}

#[derive(Deserialize, Default)]
struct UvSource {
    #[serde(default)]
    editable: Option<String>,
    #[serde(default, rename = "virtual")]
    virtual_root: Option<String>,
}

impl UvSource {
    /// The project's own entry in the lock; it is not a restorable pin.
    fn is_project_root(&self) -> bool {
        self.editable.is_some() || self.virtual_root.is_some()
    }
}

impl Toolchain for UvToolchain {
    fn id(&self) -> ToolchainId {
        ToolchainId::Uv
    }

    fn manifest_file(&self) -> &'static str {
        "pyproject.toml"
    }

    fn lock_file(&self) -> &'static str {
        "uv.lock"
    }

    fn tool_name(&self) -> &'static str {
        "uv"
    }

    fn default_tool_version(&self) -> &'static str {
        "0.8.4"
    }

    fn default_base(&self) -> &'static str {
        "python:3.12-slim"
    }

    fn default_entrypoint(&self) -> &'static [&'static str] {
        &["uv", "run", "main.py"]
    }

    fn parse_manifest(&self, path: &Path, content: &str) -> crate::Result<DependencyManifest> {
        let parsed: PyProject = toml::from_str(content).map_err(|e| parse_error(path, &e))?;

        let mut requirements = Vec::new();
        for raw in &parsed.project.dependencies {
            requirements.push(parse_pep508(raw, false, path)?);
        }
        for group in parsed.dependency_groups.values() {
            for raw in group {
                requirements.push(parse_pep508(raw, true, path)?);
            }
        }
        Ok(DependencyManifest::new(requirements))
    }

    fn parse_lockfile(&self, path: &Path, content: &str) -> crate::Result<Lockfile> {
        let parsed: UvLock = toml::from_str(content).map_err(|e| lock_error(path, &e))?;

        let mut packages = Vec::new();
        for entry in parsed.package {
            if entry.source.as_ref().is_some_and(UvSource::is_project_root) {
                continue;
            }
            packages.push(LockedPackage {
                version: parse_locked_version(path, &entry.name, &entry.version)?,
                name: entry.name,
                checksum: None,
                dev: false,
            });
        }
        Ok(Lockfile::new(packages))
    }

    fn install_record(&self, app_root: &Path, package: &LockedPackage) -> std::io::Result<()> {
        let dist = normalize_name(&package.name).replace('-', "_");
        let dir = app_root
            .join(".venv")
            .join("lib")
            .join("site-packages")
            .join(format!("{dist}-{}.dist-info", package.version));
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("METADATA"),
            format!(
                "Metadata-Version: 2.3\nName: {}\nVersion: {}\n",
                package.name, package.version
            ),
        )?;
        std::fs::write(dir.join("INSTALLER"), "uv\n")
    }
}

/// PEP 508-lite: name, optional extras, optional constraint, optional
/// environment marker (dropped).
fn parse_pep508(raw: &str, dev: bool, path: &Path) -> crate::Result<Requirement> {
    let head = raw.split_once(';').map_or(raw, |(head, _)| head);
    let (name_part, constraint) = split_constraint(head);
    let name = name_part
        .split_once('[')
        .map_or(name_part, |(name, _)| name)
        .trim();

    if name.is_empty() {
        return Err(crate::Error::ManifestParse {
            path: path.to_path_buf(),
            detail: format!("requirement {raw:?} has no package name"),
        });
    }

    let spec = parse_spec(constraint, VersionSpec::Any).ok_or_else(|| {
        crate::Error::ManifestParse {
            path: path.to_path_buf(),
            detail: format!("unsupported constraint {constraint:?} for '{name}'"),
        }
    })?;

    Ok(Requirement {
        name: name.to_owned(),
        spec,
        dev,
    })
}

// ── npm (Node.js) ──

/// Node.js projects managed by npm: `package.json` + `package-lock.json`.
#[derive(Debug)]
pub struct NpmToolchain;

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PackageLock {
    #[serde(default, rename = "lockfileVersion")]
    lockfile_version: u32,
    #[serde(default)]
    packages: BTreeMap<String, PackageLockEntry>,
}

#[derive(Deserialize)]
struct PackageLockEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    link: bool,
}

impl Toolchain for NpmToolchain {
    fn id(&self) -> ToolchainId {
        ToolchainId::Npm
    }

    fn manifest_file(&self) -> &'static str {
        "package.json"
    }

    fn lock_file(&self) -> &'static str {
        "package-lock.json"
    }

    fn tool_name(&self) -> &'static str {
        "npm"
    }

    fn default_tool_version(&self) -> &'static str {
        "10.9.2"
    }

    fn default_base(&self) -> &'static str {
        "node:22-slim"
    }

    fn default_entrypoint(&self) -> &'static [&'static str] {
        &["npm", "start"]
    }

    fn parse_manifest(&self, path: &Path, content: &str) -> crate::Result<DependencyManifest> {
        let parsed: PackageJson =
            serde_json::from_str(content).map_err(|e| parse_error(path, &e))?;

        let mut requirements = Vec::new();
        for (dev, table) in [(false, &parsed.dependencies), (true, &parsed.dev_dependencies)] {
            for (name, range) in table {
                let spec = parse_spec_exact_bare(range).ok_or_else(|| {
                    crate::Error::ManifestParse {
                        path: path.to_path_buf(),
                        detail: format!("unsupported version range {range:?} for '{name}'"),
                    }
                })?;
                requirements.push(Requirement {
                    name: name.clone(),
                    spec,
                    dev,
                });
            }
        }
        Ok(DependencyManifest::new(requirements))
    }

    fn parse_lockfile(&self, path: &Path, content: &str) -> crate::Result<Lockfile> {
        let parsed: PackageLock =
            serde_json::from_str(content).map_err(|e| lock_error(path, &e))?;

        if parsed.lockfile_version < 2 {
            return Err(crate::Error::LockfileParse {
                path: path.to_path_buf(),
                detail: format!(
                    "lockfileVersion {} is not supported — regenerate with npm 7 or newer",
                    parsed.lockfile_version
                ),
            });
        }

        let mut packages = Vec::new();
        for (key, entry) in &parsed.packages {
            // Top-level installs only. Nested entries under a second
            // node_modules/ are version conflicts the flat layout cannot
            // represent.
            let Some(name) = key.strip_prefix("node_modules/") else {
                continue;
            };
            if name.contains("node_modules/") || entry.link {
                continue;
            }
            let Some(version) = &entry.version else {
                continue;
            };
            packages.push(LockedPackage {
                name: name.to_owned(),
                version: parse_locked_version(path, name, version)?,
                checksum: entry.integrity.clone(),
                dev: entry.dev,
            });
        }
        Ok(Lockfile::new(packages))
    }

    fn install_record(&self, app_root: &Path, package: &LockedPackage) -> std::io::Result<()> {
        let dir = app_root.join("node_modules").join(&package.name);
        std::fs::create_dir_all(&dir)?;
        let mut record = serde_json::json!({
            "name": package.name,
            "version": package.version.to_string(),
        });
        if let Some(integrity) = &package.checksum {
            record["_integrity"] = serde_json::Value::String(integrity.clone());
        }
        std::fs::write(dir.join("package.json"), format!("{record:#}\n"))
    }
}

// ── cargo (Rust) ──

/// Rust projects managed by cargo: `Cargo.toml` + `Cargo.lock`.
#[derive(Debug)]
pub struct CargoToolchain;

#[derive(Deserialize)]
struct CargoManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, CargoDependency>,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: BTreeMap<String, CargoDependency>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CargoDependency {
    Version(String),
    Detailed {
        #[serde(default)]
        version: Option<String>,
    },
}

impl CargoDependency {
    fn version(&self) -> Option<&str> {
        match self {
            Self::Version(v) => Some(v),
            Self::Detailed { version } => version.as_deref(),
        }
    }
}

#[derive(Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockedPackage>,
}

#[derive(Deserialize)]
struct CargoLockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    checksum: Option<String>,
}

impl Toolchain for CargoToolchain {
    fn id(&self) -> ToolchainId {
        ToolchainId::Cargo
    }

    fn manifest_file(&self) -> &'static str {
        "Cargo.toml"
    }

    fn lock_file(&self) -> &'static str {
        "Cargo.lock"
    }

    fn tool_name(&self) -> &'static str {
        "cargo"
    }

    fn default_tool_version(&self) -> &'static str {
        "1.84.0"
    }

    fn default_base(&self) -> &'static str {
        "rust:1.84-bookworm"
    }

    fn default_entrypoint(&self) -> &'static [&'static str] {
        &["cargo", "run", "--release", "--frozen"]
    }

    fn parse_manifest(&self, path: &Path, content: &str) -> crate::Result<DependencyManifest> {
        let parsed: CargoManifest = toml::from_str(content).map_err(|e| parse_error(path, &e))?;

        let mut requirements = Vec::new();
        for (dev, table) in [(false, &parsed.dependencies), (true, &parsed.dev_dependencies)] {
            for (name, dependency) in table {
                // Bare cargo requirements are caret ranges. Path and
                // workspace dependencies carry no registry constraint.
                let spec = match dependency.version() {
                    None => VersionSpec::Any,
                    Some(raw) => {
                        parse_spec_with_bare(raw, VersionSpec::Compatible).ok_or_else(|| {
                            crate::Error::ManifestParse {
                                path: path.to_path_buf(),
                                detail: format!("unsupported requirement {raw:?} for '{name}'"),
                            }
                        })?
                    }
                };
                requirements.push(Requirement {
                    name: name.clone(),
                    spec,
                    dev,
                });
            }
        }
        Ok(DependencyManifest::new(requirements))
    }

    fn parse_lockfile(&self, path: &Path, content: &str) -> crate::Result<Lockfile> {
        let parsed: CargoLock = toml::from_str(content).map_err(|e| lock_error(path, &e))?;

        let mut packages = Vec::new();
        for entry in parsed.package {
            // Entries without a source are workspace members, not pins.
            if entry.source.is_none() {
                continue;
            }
            packages.push(LockedPackage {
                version: parse_locked_version(path, &entry.name, &entry.version)?,
                name: entry.name,
                checksum: entry.checksum,
                dev: false,
            });
        }
        Ok(Lockfile::new(packages))
    }

    fn install_record(&self, app_root: &Path, package: &LockedPackage) -> std::io::Result<()> {
        let dir = app_root
            .join("vendor")
            .join(format!("{}-{}", package.name, package.version));
        std::fs::create_dir_all(&dir)?;
        let record = serde_json::json!({
            "files": {},
            "package": package.checksum,
        });
        std::fs::write(dir.join(".cargo-checksum.json"), format!("{record}\n"))
    }
}

// ── Shared parsing helpers ──

fn parse_error(path: &Path, err: &dyn fmt::Display) -> crate::Error {
    crate::Error::ManifestParse {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

fn lock_error(path: &Path, err: &dyn fmt::Display) -> crate::Error {
    crate::Error::LockfileParse {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

fn parse_locked_version(path: &Path, name: &str, raw: &str) -> crate::Result<Version> {
    Version::parse(raw).ok_or_else(|| crate::Error::LockfileParse {
        path: path.to_path_buf(),
        detail: format!("invalid version {raw:?} for package '{name}'"),
    })
}

/// Operator-prefixed constraint, with `bare` as the meaning of no operator
/// at all (empty string).
fn parse_spec(constraint: &str, bare: VersionSpec) -> Option<VersionSpec> {
    if constraint.trim().is_empty() {
        return Some(bare);
    }
    VersionSpec::parse_prefixed(constraint)
}

/// Constraint where a bare version means an exact pin (npm `"4.19.2"`).
fn parse_spec_exact_bare(constraint: &str) -> Option<VersionSpec> {
    parse_spec_with_bare(constraint, VersionSpec::Exact)
}

fn parse_spec_with_bare(
    constraint: &str,
    bare: fn(Version) -> VersionSpec,
) -> Option<VersionSpec> {
    match VersionSpec::parse_prefixed(constraint) {
        Some(spec) => Some(spec),
        None => Version::parse(constraint).map(bare),
    }
}
