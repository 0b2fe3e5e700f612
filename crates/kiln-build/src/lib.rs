//! Build planning, layer cache, and image assembly for kiln.
//!
//! # Build pipeline
//!
//! ```text
//! kiln build
//!   1. Discover ── BuildContext::discover (context walk + toolchain selection)
//!   2. Plan     ── BuildPlan::resolve (fixed step order, defaults filled in)
//!   3. Execute  ── BuildExecutor::build (per step: key → lookup → apply → commit)
//!   4. Record   ── LayerStore::record_image (only after every step committed)
//! ```
//!
//! # Cache contract
//!
//! Each layer's key is `chain(parent_key, step_kind, step_inputs)` and its
//! snapshot is a full rootfs, so:
//!
//! - Identical inputs reuse identical layers, on any machine
//! - A change invalidates its own layer and everything above it, never below
//! - Dependency layers sit below the source layer, so source edits rebuild
//!   in two cheap steps
//!
//! # Failure semantics
//!
//! The first failing step aborts the build. Committed layers stay (they are
//! valid and reusable); the image index is written last, so no partial
//! image is ever listed.

pub mod base;
pub mod cache;
pub mod executor;
pub mod plan;
pub mod step;
pub mod store;

pub use base::{BaseError, BaseResolver, PinnedBaseResolver, ResolvedBase};
pub use cache::CacheKey;
pub use executor::{BuildError, BuildExecutor, BuildReport, CacheStatus, StepReport};
pub use plan::BuildPlan;
pub use step::BuildStep;
pub use store::{Layer, LayerMeta, LayerStore, StagedLayer, StoreError};
