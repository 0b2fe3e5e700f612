mod build;
mod images;
mod init;
mod plan;
mod run;

use std::path::{Path, PathBuf};

use kiln_core::{BuildContext, KilnConfig, ToolchainRegistry};

pub use build::build;
pub use images::images;
pub use init::init_project;
pub use plan::plan;
pub use run::run;

/// Every command operates on the current directory.
pub(crate) fn context_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Load kiln.toml and discover the build context in one go.
pub(crate) fn load_project(
    registry: &ToolchainRegistry,
) -> anyhow::Result<(KilnConfig, BuildContext)> {
    let dir = context_dir();
    let config = KilnConfig::load(&dir)?;
    let context = BuildContext::discover(&dir, registry, &config)?;
    Ok((config, context))
}

/// The layer store location for the current directory.
pub(crate) fn store_dir(config: &KilnConfig) -> PathBuf {
    config.store_dir(Path::new("."))
}
