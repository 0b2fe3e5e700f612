use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// kiln.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Base runtime reference (defaults to the toolchain's pinned base).
    /// Must carry an explicit version tag; floating tags are rejected.
    pub base: Option<String>,
    /// Working directory inside the image
    #[serde(default = "default_workdir")]
    pub workdir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Toolchain id (`uv`, `npm`, `cargo`); detected from the context when unset
    pub id: Option<String>,
    /// Dependency manager version to install (defaults to the toolchain's pin)
    pub tool_version: Option<String>,
    /// Restore development dependencies in addition to runtime ones
    #[serde(default)]
    pub include_dev: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entrypoint argv (defaults to the toolchain's launch convention)
    pub entrypoint: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context paths to exclude, matched as path prefixes relative to the
    /// context root. `.kiln` and `.git` are always excluded.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Layer store location (defaults to `.kiln/store` under the context)
    pub dir: Option<PathBuf>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base: None,
            workdir: default_workdir(),
        }
    }
}

impl KilnConfig {
    /// Load from kiln.toml at the given path, or return defaults if not found.
    pub fn load(context_dir: &Path) -> crate::Result<Self> {
        let config_path = context_dir.join("kiln.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the layer store directory for a build context.
    pub fn store_dir(&self, context_dir: &Path) -> PathBuf {
        match &self.store.dir {
            Some(dir) => dir.clone(),
            None => context_dir.join(".kiln").join("store"),
        }
    }
}

fn default_workdir() -> String {
    "/app".to_owned()
}
