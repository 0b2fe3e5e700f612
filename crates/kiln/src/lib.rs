//! Reproducible container images from locked project manifests.
//!
//! This is the unified facade crate that re-exports the Kiln sub-crates.
//! Use feature flags to control which components are included.
//!
//! # Feature flags
//!
//! | Feature | Default | Crate | Description |
//! |---------|---------|-------|-------------|
//! | `core` | yes | [`kiln-core`](https://crates.io/crates/kiln-core) | Configuration, toolchains, and shared types |
//! | `build` | yes | [`kiln-build`](https://crates.io/crates/kiln-build) | Build planning, layer cache, and image assembly |
//! | `runtime` | yes | [`kiln-runtime`](https://crates.io/crates/kiln-runtime) | Entrypoint process launching |
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! kiln = "0.1"
//! ```
//!
//! ```rust,no_run
//! use std::path::Path;
//! use kiln::{BuildContext, KilnConfig, ToolchainRegistry};
//! use kiln::build::{BuildExecutor, BuildPlan, LayerStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = Path::new(".");
//! let registry = ToolchainRegistry::builtin();
//! let config = KilnConfig::load(dir)?;
//! let context = BuildContext::discover(dir, &registry, &config)?;
//! let plan = BuildPlan::resolve(&config, &context, &registry)?;
//! let store = LayerStore::open(config.store_dir(dir))?;
//! let report = BuildExecutor::new(&store, &registry).build(&plan, &context)?;
//! println!("built {}", report.image.id);
//! # Ok(())
//! # }
//! ```

// Core types flattened into the root namespace for convenience.
#[cfg(feature = "core")]
pub use kiln_core::*;

/// Build planning, the layer cache, and image assembly.
///
/// See [`kiln-build`](https://crates.io/crates/kiln-build) for details.
#[cfg(feature = "build")]
pub mod build {
    pub use kiln_build::*;
}

/// Entrypoint process launching for built images.
///
/// See [`kiln-runtime`](https://crates.io/crates/kiln-runtime) for details.
#[cfg(feature = "runtime")]
pub mod runtime {
    pub use kiln_runtime::*;
}
