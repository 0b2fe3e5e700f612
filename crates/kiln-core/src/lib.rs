//! Core types and configuration for kiln.
//!
//! This crate defines the `kiln.toml` schema ([`KilnConfig`]), build context
//! discovery ([`BuildContext`]), the toolchain contract ([`Toolchain`]), the
//! manifest/lock data model with its frozen-restore gate ([`verify_frozen`]),
//! and shared error types.

pub mod config;
pub mod context;
pub mod error;
pub mod image;
pub mod lockfile;
pub mod manifest;
pub mod toolchain;
pub mod version;

pub use config::{
    AppConfig, ContextConfig, ImageConfig, KilnConfig, StoreConfig, ToolchainConfig,
};
pub use context::BuildContext;
pub use error::{Error, Result};
pub use image::{Entrypoint, ImageManifest, ImageReference};
pub use lockfile::{ConsistencyError, FrozenSet, LockedPackage, Lockfile, verify_frozen};
pub use manifest::{DependencyManifest, Requirement};
pub use toolchain::{Toolchain, ToolchainId, ToolchainRegistry, ToolSpec};
pub use version::{Version, VersionSpec};
