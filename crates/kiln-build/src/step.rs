//! Build steps: the fixed vocabulary of layer operations.
//!
//! A step is pure data; the executor decides how to fingerprint and apply
//! it. The order steps appear in a plan is the cache-friendliness order:
//! what changes rarely comes first.

use std::path::PathBuf;

use kiln_core::{Entrypoint, ImageReference, ToolSpec, ToolchainId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStep {
    /// Lay down the pinned base runtime with the prepared working directory.
    EstablishBase { reference: ImageReference },
    /// Install the dependency manager at its pinned version.
    InstallTool { tool: ToolSpec },
    /// Stage the manifest/lock pair ahead of the source tree.
    StageManifest { files: Vec<PathBuf> },
    /// Install exactly the locked dependency set, nothing resolved.
    RestoreDependencies {
        toolchain: ToolchainId,
        include_dev: bool,
    },
    /// Copy the full build context into the working directory.
    CopySource,
    /// Declare how the image starts. Metadata only; the rootfs is final.
    SetEntrypoint { entrypoint: Entrypoint },
}

impl BuildStep {
    /// Stable discriminator mixed into the cache key, so two step kinds
    /// with coincidentally equal inputs never share a layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EstablishBase { .. } => "base",
            Self::InstallTool { .. } => "tool",
            Self::StageManifest { .. } => "manifest",
            Self::RestoreDependencies { .. } => "restore",
            Self::CopySource => "source",
            Self::SetEntrypoint { .. } => "entrypoint",
        }
    }

    /// Human-readable progress line.
    pub fn label(&self) -> String {
        match self {
            Self::EstablishBase { reference } => format!("establish base {reference}"),
            Self::InstallTool { tool } => format!("install {tool}"),
            Self::StageManifest { files } => {
                let names: Vec<String> = files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect();
                format!("stage dependency manifest ({})", names.join(", "))
            }
            Self::RestoreDependencies { include_dev, .. } => {
                if *include_dev {
                    "restore dependencies (frozen, with dev)".to_owned()
                } else {
                    "restore dependencies (frozen)".to_owned()
                }
            }
            Self::CopySource => "copy source".to_owned(),
            Self::SetEntrypoint { entrypoint } => format!("set entrypoint {entrypoint}"),
        }
    }
}
