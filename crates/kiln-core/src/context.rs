//! Build context discovery: the directory a build reads from.
//!
//! A context is a snapshot of file paths, a selected toolchain, and the
//! manifest/lock pair that toolchain owns. Discovery fails fast on anything
//! the pipeline would otherwise trip over later: no manifest, no lock file,
//! or two toolchains' manifests side by side with no configured choice.

use std::path::{Path, PathBuf};

use crate::config::KilnConfig;
use crate::toolchain::{ToolchainId, ToolchainRegistry};

/// Paths never shipped in a build context, regardless of configuration.
const KILN_EXCLUDES: &[&str] = &[".kiln", ".git"];

/// A discovered build context.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Canonicalized context root
    pub root: PathBuf,
    /// Context files relative to the root, sorted for determinism
    pub files: Vec<PathBuf>,
    /// Toolchain selected for this context
    pub toolchain_id: ToolchainId,
    /// Dependency manifest, relative to the root
    pub manifest_path: PathBuf,
    /// Lock file, relative to the root
    pub lock_path: PathBuf,
}

impl BuildContext {
    /// Discover the build context at `dir`.
    ///
    /// The toolchain comes from `[toolchain] id` in kiln.toml when set,
    /// otherwise from which manifest file is present at the context root.
    ///
    /// # Errors
    ///
    /// - [`Error::ContextDirResolve`](crate::Error::ContextDirResolve) if `dir` cannot be canonicalized
    /// - [`Error::NoManifestInContext`](crate::Error::NoManifestInContext) if no known manifest is present
    /// - [`Error::AmbiguousToolchain`](crate::Error::AmbiguousToolchain) if several manifests are present
    /// - [`Error::MissingLockfile`](crate::Error::MissingLockfile) if the manifest has no lock beside it
    pub fn discover(
        dir: &Path,
        registry: &ToolchainRegistry,
        config: &KilnConfig,
    ) -> crate::Result<Self> {
        let root = dir
            .canonicalize()
            .map_err(|e| crate::Error::ContextDirResolve {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let toolchain = match &config.toolchain.id {
            Some(name) => registry.by_name(name)?,
            None => registry.detect(&root)?,
        };

        let manifest_path = PathBuf::from(toolchain.manifest_file());
        if !root.join(&manifest_path).is_file() {
            return Err(crate::Error::NoManifestInContext {
                dir: root,
                expected: vec![toolchain.manifest_file().to_owned()],
            });
        }

        // A manifest without its lock cannot be restored frozen.
        let lock_path = PathBuf::from(toolchain.lock_file());
        if !root.join(&lock_path).is_file() {
            return Err(crate::Error::MissingLockfile {
                path: root.join(&lock_path),
            });
        }

        let files = walk_context(&root, &config.context.exclude)?;

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            toolchain = %toolchain.id(),
            "build context discovered"
        );

        Ok(Self {
            root,
            files,
            toolchain_id: toolchain.id(),
            manifest_path,
            lock_path,
        })
    }

    /// The files staged ahead of the source tree: manifest and lock only.
    pub fn manifest_files(&self) -> Vec<PathBuf> {
        vec![self.manifest_path.clone(), self.lock_path.clone()]
    }

    /// Absolute path of a context-relative file.
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a context-relative file to a string.
    pub fn read_to_string(&self, relative: &Path) -> crate::Result<String> {
        let path = self.root.join(relative);
        std::fs::read_to_string(&path).map_err(|e| crate::Error::ManifestRead { path, source: e })
    }
}

fn walk_context(root: &Path, extra_excludes: &[String]) -> crate::Result<Vec<PathBuf>> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .follow_links(false)
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| crate::Error::ContextWalk {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if is_excluded(relative, extra_excludes) {
            continue;
        }
        files.push(relative.to_path_buf());
    }
    files.sort();
    Ok(files)
}

fn is_excluded(relative: &Path, extra: &[String]) -> bool {
    KILN_EXCLUDES
        .iter()
        .any(|prefix| relative.starts_with(prefix))
        || extra.iter().any(|prefix| relative.starts_with(prefix))
}
