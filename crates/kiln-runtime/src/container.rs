use std::path::PathBuf;

use kiln_build::cache::CacheKey;
use kiln_build::executor::workdir_path;
use kiln_build::store::LayerStore;
use kiln_core::ImageManifest;

use crate::process::{ProcessError, ProcessRunner, RealRunner};

/// Launches image entrypoints inside their materialized snapshots,
/// parameterized over the runner for testability.
pub struct Runtime<R: ProcessRunner = RealRunner> {
    runner: R,
}

impl Runtime<RealRunner> {
    pub fn new() -> Self {
        Self { runner: RealRunner }
    }
}

impl Default for Runtime<RealRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> Runtime<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Run the image's entrypoint to completion.
    ///
    /// The top layer's snapshot already holds the fully assembled
    /// filesystem, so the process runs with the image workdir inside that
    /// snapshot as its working directory. Blocks until the process exits.
    pub async fn start(
        &self,
        image: &ImageManifest,
        store: &LayerStore,
    ) -> Result<ContainerExit, StartError> {
        let top = image.top_layer().ok_or_else(|| StartError::EmptyImage {
            id: image.id.clone(),
        })?;
        let key = CacheKey::parse(top).ok_or_else(|| StartError::InvalidLayerKey {
            key: top.to_owned(),
        })?;
        let layer = store.lookup(&key).ok_or_else(|| StartError::MissingLayer {
            key: top.to_owned(),
        })?;

        let cwd = workdir_path(&layer.rootfs(), &image.workdir);
        if !cwd.is_dir() {
            return Err(StartError::WorkdirMissing { path: cwd });
        }

        let (program, args) =
            image
                .entrypoint
                .split_first()
                .ok_or_else(|| StartError::NoEntrypoint {
                    id: image.id.clone(),
                })?;

        tracing::debug!(
            image = %image.short_id(),
            program,
            cwd = %cwd.display(),
            "starting entrypoint"
        );
        let code = self.runner.run(program, args, &cwd).await?;
        tracing::debug!(image = %image.short_id(), code, "entrypoint exited");

        Ok(ContainerExit { code })
    }
}

/// How the entrypoint process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerExit {
    pub code: i32,
}

impl ContainerExit {
    pub fn success(self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("image {id} has no layers")]
    EmptyImage { id: String },

    #[error("image records a malformed layer key {key:?}")]
    InvalidLayerKey { key: String },

    #[error("layer {key} is not in the store — rebuild the image")]
    MissingLayer { key: String },

    #[error("workdir {path} does not exist in the image snapshot")]
    WorkdirMissing { path: PathBuf },

    #[error("image {id} has no entrypoint")]
    NoEntrypoint { id: String },

    #[error("entrypoint failed to launch")]
    Launch {
        #[from]
        source: ProcessError,
    },
}
