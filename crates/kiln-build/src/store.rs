//! The layer store: content-addressed snapshots and the image index.
//!
//! On-disk layout:
//!
//! ```text
//! store/
//!   layers/<key>/layer.json   metadata (parent key, label, timestamp)
//!   layers/<key>/rootfs/      full filesystem snapshot for that key
//!   images/<digest>.json      one manifest per recorded image
//!   tmp/                      staging area for atomic commits
//! ```
//!
//! Commits stage under `tmp/` and land with a single rename, so a key
//! either has a complete snapshot or nothing. Concurrent builders writing
//! the same key are harmless: content under one key never differs, and
//! whichever rename lands first wins.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use kiln_core::ImageManifest;
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle to an opened store directory.
#[derive(Debug)]
pub struct LayerStore {
    root: PathBuf,
}

/// Metadata written beside each layer's rootfs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerMeta {
    pub key: String,
    pub parent: Option<String>,
    pub label: String,
    pub created: DateTime<Utc>,
}

/// A committed layer.
#[derive(Debug, Clone)]
pub struct Layer {
    pub key: CacheKey,
    dir: PathBuf,
}

impl Layer {
    /// The layer's full filesystem snapshot.
    pub fn rootfs(&self) -> PathBuf {
        self.dir.join("rootfs")
    }

    pub fn metadata(&self) -> Result<LayerMeta, StoreError> {
        let path = self.dir.join("layer.json");
        let content = std::fs::read_to_string(&path).map_err(|e| StoreError::ReadMeta {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| StoreError::ParseMeta { path, source: e })
    }
}

/// A layer under construction, not yet visible to lookups.
#[derive(Debug)]
pub struct StagedLayer {
    key: CacheKey,
    dir: PathBuf,
}

impl StagedLayer {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Where the step writes its snapshot.
    pub fn rootfs(&self) -> PathBuf {
        self.dir.join("rootfs")
    }
}

impl LayerStore {
    /// Open (creating if needed) the store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for sub in ["layers", "images", "tmp"] {
            let path = root.join(sub);
            std::fs::create_dir_all(&path)
                .map_err(|e| StoreError::Create { path, source: e })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layer_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join("layers").join(key.digest())
    }

    // ── Layers ──

    /// Materialize the snapshot for a key, or report a cache miss as `None`.
    pub fn lookup(&self, key: &CacheKey) -> Option<Layer> {
        let dir = self.layer_dir(key);
        dir.join("rootfs").is_dir().then(|| Layer {
            key: key.clone(),
            dir,
        })
    }

    /// Start staging a snapshot for `key` under `tmp/`.
    pub fn begin(&self, key: &CacheKey) -> Result<StagedLayer, StoreError> {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = self.root.join("tmp").join(format!(
            "{}-{}-{seq}",
            key.short(),
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("rootfs")).map_err(|e| StoreError::Stage {
            key: key.to_string(),
            source: e,
        })?;
        Ok(StagedLayer {
            key: key.clone(),
            dir,
        })
    }

    /// Commit a staged snapshot under its key with one atomic rename.
    ///
    /// Idempotent per key: if the key landed already (earlier build, or a
    /// concurrent one), the staging is discarded and the existing layer is
    /// returned.
    pub fn commit(
        &self,
        staged: StagedLayer,
        parent: Option<&CacheKey>,
        label: &str,
    ) -> Result<Layer, StoreError> {
        let meta = LayerMeta {
            key: staged.key.to_string(),
            parent: parent.map(ToString::to_string),
            label: label.to_owned(),
            created: Utc::now(),
        };
        let encoded = serde_json::to_string_pretty(&meta).map_err(|e| StoreError::EncodeMeta {
            key: staged.key.to_string(),
            source: e,
        })?;
        std::fs::write(staged.dir.join("layer.json"), encoded).map_err(|e| StoreError::Stage {
            key: staged.key.to_string(),
            source: e,
        })?;

        let dest = self.layer_dir(&staged.key);
        if dest.join("rootfs").is_dir() {
            // arch-lint: allow(no-silent-result-drop) reason="best-effort cleanup of a redundant staging dir; the layer already exists"
            let _ = std::fs::remove_dir_all(&staged.dir);
            return Ok(Layer {
                key: staged.key,
                dir: dest,
            });
        }
        match std::fs::rename(&staged.dir, &dest) {
            Ok(()) => Ok(Layer {
                key: staged.key,
                dir: dest,
            }),
            // Lost the race after the existence check; the winner's snapshot
            // is equivalent by construction.
            Err(_) if dest.join("rootfs").is_dir() => {
                // arch-lint: allow(no-silent-result-drop) reason="best-effort cleanup after losing the commit race; the winner's snapshot is equivalent"
                let _ = std::fs::remove_dir_all(&staged.dir);
                Ok(Layer {
                    key: staged.key,
                    dir: dest,
                })
            }
            Err(e) => Err(StoreError::Commit {
                key: staged.key.to_string(),
                source: e,
            }),
        }
    }

    /// Drop an abandoned staging directory.
    pub fn discard(&self, staged: StagedLayer) {
        // arch-lint: allow(no-silent-result-drop) reason="discard is best-effort by contract; a leftover tmp dir is harmless"
        let _ = std::fs::remove_dir_all(&staged.dir);
    }

    // ── Image index ──

    fn image_path(&self, id: &str) -> PathBuf {
        // arch-lint: allow(no-silent-result-drop) reason="strip_prefix returns Option — an unprefixed id is already the digest"
        let digest = id.strip_prefix("sha256:").unwrap_or(id);
        self.root.join("images").join(format!("{digest}.json"))
    }

    /// Record a built image. Written via `tmp/` and renamed into place, so
    /// the index never lists a half-written manifest.
    pub fn record_image(&self, manifest: &ImageManifest) -> Result<(), StoreError> {
        let record = |source| StoreError::RecordImage {
            id: manifest.id.clone(),
            source,
        };
        let encoded =
            serde_json::to_string_pretty(manifest).map_err(|e| StoreError::EncodeImage {
                id: manifest.id.clone(),
                source: e,
            })?;

        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let staging = self.root.join("tmp").join(format!(
            "image-{}-{seq}.json",
            std::process::id()
        ));
        std::fs::write(&staging, encoded).map_err(record)?;
        std::fs::rename(&staging, self.image_path(&manifest.id)).map_err(record)
    }

    /// All recorded images, newest first.
    pub fn list_images(&self) -> Result<Vec<ImageManifest>, StoreError> {
        let dir = self.root.join("images");
        let entries = std::fs::read_dir(&dir).map_err(|e| StoreError::ReadIndex {
            path: dir.clone(),
            source: e,
        })?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::ReadIndex {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            images.push(self.read_image(&path)?);
        }
        images.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(images)
    }

    /// Find one image by full id or unique digest prefix.
    pub fn find_image(&self, needle: &str) -> Result<ImageManifest, StoreError> {
        // arch-lint: allow(no-silent-result-drop) reason="strip_prefix returns Option — an unprefixed needle is already the digest"
        let wanted = needle.strip_prefix("sha256:").unwrap_or(needle);
        if wanted.is_empty() {
            return Err(StoreError::ImageNotFound {
                needle: needle.to_owned(),
            });
        }

        let matches: Vec<ImageManifest> = self
            .list_images()?
            .into_iter()
            .filter(|image| {
                image
                    .id
                    .strip_prefix("sha256:")
                    // arch-lint: allow(no-silent-result-drop) reason="strip_prefix returns Option — an unprefixed id is already the digest"
                    .unwrap_or(&image.id)
                    .starts_with(wanted)
            })
            .collect();

        match matches.len() {
            0 => Err(StoreError::ImageNotFound {
                needle: needle.to_owned(),
            }),
            1 => Ok(matches.into_iter().next().expect("len checked above")),
            _ => Err(StoreError::AmbiguousImage {
                needle: needle.to_owned(),
                matches: matches.iter().map(|m| m.short_id().to_owned()).collect(),
            }),
        }
    }

    fn read_image(&self, path: &Path) -> Result<ImageManifest, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::ReadIndex {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| StoreError::ParseImage {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create store directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stage layer {key}")]
    Stage {
        key: String,
        source: std::io::Error,
    },

    #[error("failed to encode metadata for layer {key}")]
    EncodeMeta {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to commit layer {key}")]
    Commit {
        key: String,
        source: std::io::Error,
    },

    #[error("failed to read layer metadata {path}")]
    ReadMeta {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse layer metadata {path}")]
    ParseMeta {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode image manifest {id}")]
    EncodeImage {
        id: String,
        source: serde_json::Error,
    },

    #[error("failed to record image {id}")]
    RecordImage {
        id: String,
        source: std::io::Error,
    },

    #[error("failed to read image index at {path}")]
    ReadIndex {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse image manifest {path}")]
    ParseImage {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no image matches '{needle}' — run `kiln images` to list what is recorded")]
    ImageNotFound { needle: String },

    #[error("'{needle}' matches {} images ({}) — use more digits", matches.len(), matches.join(", "))]
    AmbiguousImage {
        needle: String,
        matches: Vec<String>,
    },
}
