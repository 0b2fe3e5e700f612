//! The build executor: drives a plan through the layer cache.
//!
//! Per step: derive the cache key from the parent key and the step's
//! declared inputs, look it up, and only on a miss copy the parent
//! snapshot, apply the step, and commit. The image manifest is recorded
//! after the final step, so a failed build leaves the index untouched and
//! at most some reusable layers behind.

use std::path::{Path, PathBuf};

use chrono::Utc;
use kiln_core::{
    BuildContext, ConsistencyError, ImageManifest, ToolchainId, ToolchainRegistry, verify_frozen,
};
use sha2::{Digest, Sha256};

use crate::base::{BaseError, BaseResolver, PinnedBaseResolver, ResolvedBase};
use crate::cache::{CacheKey, hash_file};
use crate::plan::BuildPlan;
use crate::step::BuildStep;
use crate::store::{Layer, LayerStore, StoreError};

/// Sequential, cache-aware plan executor.
pub struct BuildExecutor<'a, B: BaseResolver = PinnedBaseResolver> {
    store: &'a LayerStore,
    registry: &'a ToolchainRegistry,
    resolver: B,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(store: &'a LayerStore, registry: &'a ToolchainRegistry) -> Self {
        Self {
            store,
            registry,
            resolver: PinnedBaseResolver,
        }
    }
}

impl<'a, B: BaseResolver> BuildExecutor<'a, B> {
    /// Executor with a custom base resolver.
    pub fn with_resolver(
        store: &'a LayerStore,
        registry: &'a ToolchainRegistry,
        resolver: B,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
        }
    }

    /// Run every step of the plan in order.
    ///
    /// All-or-nothing: the first failing step aborts the build, and the
    /// image index is only written after the last step committed.
    pub fn build(
        &self,
        plan: &BuildPlan,
        context: &BuildContext,
    ) -> Result<BuildReport, BuildError> {
        let mut parent: Option<Layer> = None;
        let mut steps = Vec::with_capacity(plan.steps().len());

        for step in plan.steps() {
            let inputs = self.fingerprint(step, plan, context)?;
            let input_refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            let key = CacheKey::chain(
                parent.as_ref().map(|layer| &layer.key),
                step.kind(),
                &input_refs,
            );

            let (layer, cache) = match self.store.lookup(&key) {
                Some(layer) => {
                    tracing::debug!(step = %step.label(), key = %key.short(), "layer cache hit");
                    (layer, CacheStatus::Hit)
                }
                None => {
                    let staged = self.store.begin(&key)?;
                    let applied = self.apply(step, plan, context, &staged.rootfs(), &parent);
                    if let Err(e) = applied {
                        self.store.discard(staged);
                        return Err(e);
                    }
                    let layer =
                        self.store
                            .commit(staged, parent.as_ref().map(|l| &l.key), &step.label())?;
                    tracing::debug!(step = %step.label(), key = %key.short(), "layer built");
                    (layer, CacheStatus::Miss)
                }
            };

            steps.push(StepReport {
                label: step.label(),
                key,
                cache,
            });
            parent = Some(layer);
        }

        let image = assemble_manifest(plan, &steps);
        self.store.record_image(&image)?;
        tracing::debug!(
            image = %image.short_id(),
            layers = image.layers.len(),
            hits = steps.iter().filter(|s| s.cache.is_hit()).count(),
            "image recorded"
        );

        Ok(BuildReport { image, steps })
    }

    /// The declared inputs of a step, as bytes for the key derivation.
    ///
    /// Content the step consumes from the previous snapshot is deliberately
    /// absent: the parent key already covers it.
    fn fingerprint(
        &self,
        step: &BuildStep,
        plan: &BuildPlan,
        context: &BuildContext,
    ) -> Result<Vec<Vec<u8>>, BuildError> {
        let mut inputs: Vec<Vec<u8>> = Vec::new();
        match step {
            BuildStep::EstablishBase { reference } => {
                inputs.push(reference.canonical().into_bytes());
                inputs.push(plan.workdir().as_bytes().to_vec());
            }
            BuildStep::InstallTool { tool } => {
                inputs.push(tool.name.clone().into_bytes());
                inputs.push(tool.version.clone().into_bytes());
            }
            BuildStep::StageManifest { files } => {
                for file in files {
                    inputs.push(path_bytes(file));
                    inputs.push(self.content_hash(context, file)?);
                }
            }
            BuildStep::RestoreDependencies {
                toolchain,
                include_dev,
            } => {
                inputs.push(toolchain.as_str().as_bytes().to_vec());
                inputs.push(if *include_dev { b"dev".to_vec() } else { b"no-dev".to_vec() });
            }
            BuildStep::CopySource => {
                for file in &context.files {
                    inputs.push(path_bytes(file));
                    inputs.push(self.content_hash(context, file)?);
                }
            }
            BuildStep::SetEntrypoint { entrypoint } => {
                for arg in entrypoint.argv() {
                    inputs.push(arg.clone().into_bytes());
                }
                inputs.push(plan.workdir().as_bytes().to_vec());
            }
        }
        Ok(inputs)
    }

    fn content_hash(&self, context: &BuildContext, file: &Path) -> Result<Vec<u8>, BuildError> {
        let path = context.absolute(file);
        let digest = hash_file(&path).map_err(|e| BuildError::StepIo {
            action: "hash",
            path,
            source: e,
        })?;
        Ok(digest.to_vec())
    }

    /// Apply one step to a freshly staged rootfs.
    fn apply(
        &self,
        step: &BuildStep,
        plan: &BuildPlan,
        context: &BuildContext,
        rootfs: &Path,
        parent: &Option<Layer>,
    ) -> Result<(), BuildError> {
        if let Some(parent) = parent {
            copy_tree(&parent.rootfs(), rootfs)?;
        }
        let app_root = workdir_path(rootfs, plan.workdir());

        match step {
            BuildStep::EstablishBase { reference } => {
                let base = self.resolver.resolve(reference)?;
                write_base_skeleton(rootfs, &base, &app_root)?;
            }
            BuildStep::InstallTool { tool } => {
                let inventory = rootfs.join("var/lib/kiln");
                create_dirs(&inventory)?;
                let record = serde_json::json!([{
                    "name": tool.name,
                    "version": tool.version,
                }]);
                write_file(inventory.join("tools.json"), format!("{record:#}\n").as_bytes())?;

                let bin = rootfs.join("usr/local/bin");
                create_dirs(&bin)?;
                write_file(
                    bin.join(&tool.name),
                    format!("{} {}\n", tool.name, tool.version).as_bytes(),
                )?;
            }
            BuildStep::StageManifest { files } => {
                for file in files {
                    copy_into(&context.absolute(file), &app_root.join(file))?;
                }
            }
            BuildStep::RestoreDependencies {
                toolchain,
                include_dev,
            } => {
                self.restore(*toolchain, *include_dev, &app_root)?;
            }
            BuildStep::CopySource => {
                for file in &context.files {
                    copy_into(&context.absolute(file), &app_root.join(file))?;
                }
            }
            // The rootfs is final; the entrypoint lives in the manifest.
            BuildStep::SetEntrypoint { .. } => {}
        }
        Ok(())
    }

    /// Frozen restore against the staged manifest/lock pair.
    ///
    /// Reads from the snapshot rather than the context, so this layer is a
    /// function of the previous layer alone.
    fn restore(
        &self,
        id: ToolchainId,
        include_dev: bool,
        app_root: &Path,
    ) -> Result<(), BuildError> {
        let toolchain = self.registry.get(id);

        let manifest_path = app_root.join(toolchain.manifest_file());
        let manifest_text = read_file(&manifest_path)?;
        let manifest = toolchain.parse_manifest(&manifest_path, &manifest_text)?;

        let lock_path = app_root.join(toolchain.lock_file());
        let lock_text = read_file(&lock_path)?;
        let lock = toolchain.parse_lockfile(&lock_path, &lock_text)?;

        let frozen = verify_frozen(&manifest, &lock, include_dev)?;
        for package in frozen.packages() {
            toolchain
                .install_record(app_root, package)
                .map_err(|e| BuildError::StepIo {
                    action: "write install record for",
                    path: app_root.to_path_buf(),
                    source: e,
                })?;
        }

        tracing::debug!(
            toolchain = %id,
            packages = frozen.len(),
            include_dev,
            "dependencies restored frozen"
        );
        Ok(())
    }
}

// ── Reports ──

/// What a build produced, step by step.
#[derive(Debug)]
pub struct BuildReport {
    pub image: ImageManifest,
    pub steps: Vec<StepReport>,
}

impl BuildReport {
    pub fn cache_hits(&self) -> usize {
        self.steps.iter().filter(|s| s.cache.is_hit()).count()
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub label: String,
    pub key: CacheKey,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }
}

// ── Manifest assembly ──

fn assemble_manifest(plan: &BuildPlan, steps: &[StepReport]) -> ImageManifest {
    let layers: Vec<String> = steps.iter().map(|s| s.key.to_string()).collect();

    let mut hasher = Sha256::new();
    hasher.update(plan.base().canonical());
    for layer in &layers {
        hasher.update(layer.as_bytes());
    }
    for arg in plan.entrypoint().argv() {
        hasher.update(arg.as_bytes());
        hasher.update([0]);
    }
    hasher.update(plan.workdir().as_bytes());

    ImageManifest {
        id: format!("sha256:{}", hex::encode(hasher.finalize())),
        base: plan.base().canonical(),
        toolchain: plan.toolchain_id().to_string(),
        layers,
        entrypoint: plan.entrypoint().argv().to_vec(),
        workdir: plan.workdir().to_owned(),
        created: Utc::now(),
    }
}

// ── Rootfs helpers ──

/// Resolve the image workdir inside a staged rootfs.
pub fn workdir_path(rootfs: &Path, workdir: &str) -> PathBuf {
    rootfs.join(workdir.trim_start_matches('/'))
}

fn path_bytes(path: &Path) -> Vec<u8> {
    path.as_os_str().as_encoded_bytes().to_vec()
}

fn write_base_skeleton(
    rootfs: &Path,
    base: &ResolvedBase,
    app_root: &Path,
) -> Result<(), BuildError> {
    let etc = rootfs.join("etc");
    create_dirs(&etc)?;
    write_file(
        etc.join("image-base"),
        format!(
            "REFERENCE={}\nOS_FAMILY={}\n",
            base.reference.canonical(),
            base.os_family
        )
        .as_bytes(),
    )?;
    create_dirs(app_root)
}

fn create_dirs(path: &Path) -> Result<(), BuildError> {
    std::fs::create_dir_all(path).map_err(|e| BuildError::StepIo {
        action: "create",
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: PathBuf, content: &[u8]) -> Result<(), BuildError> {
    std::fs::write(&path, content).map_err(|e| BuildError::StepIo {
        action: "write",
        path,
        source: e,
    })
}

fn read_file(path: &Path) -> Result<String, BuildError> {
    std::fs::read_to_string(path).map_err(|e| BuildError::StepIo {
        action: "read",
        path: path.to_path_buf(),
        source: e,
    })
}

fn copy_into(src: &Path, dest: &Path) -> Result<(), BuildError> {
    if let Some(parent) = dest.parent() {
        create_dirs(parent)?;
    }
    std::fs::copy(src, dest).map_err(|e| BuildError::StepIo {
        action: "copy",
        path: src.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Recursively copy a committed rootfs into a staging rootfs.
fn copy_tree(src: &Path, dest: &Path) -> Result<(), BuildError> {
    create_dirs(dest)?;
    let entries = std::fs::read_dir(src).map_err(|e| BuildError::StepIo {
        action: "read",
        path: src.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::StepIo {
            action: "read",
            path: src.to_path_buf(),
            source: e,
        })?;
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| BuildError::StepIo {
            action: "stat",
            path: entry.path(),
            source: e,
        })?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| BuildError::StepIo {
                action: "copy",
                path: entry.path(),
                source: e,
            })?;
        }
    }
    Ok(())
}

// ── Errors ──

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Context(#[from] kiln_core::Error),

    #[error("frozen restore refused: manifest and lock file disagree")]
    Consistency {
        #[from]
        source: ConsistencyError,
    },

    #[error("base runtime resolution failed")]
    Base {
        #[from]
        source: BaseError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to {action} {path}")]
    StepIo {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}
