//! Image references, entrypoints, and the recorded image manifest.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pinned reference to a base runtime image.
///
/// Kiln refuses floating references: every base must carry an explicit
/// version tag, and `latest` does not count. This keeps the first layer of
/// every build reproducible.
///
/// # Examples
///
/// ```
/// use kiln_core::ImageReference;
///
/// let base = ImageReference::parse("python:3.12-slim").unwrap();
/// assert_eq!(base.repository, "python");
/// assert_eq!(base.tag, "3.12-slim");
/// assert!(ImageReference::parse("python:latest").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Repository, possibly registry-qualified (`python`, `ghcr.io/astral-sh/uv`)
    pub repository: String,
    /// Explicit version tag (`3.12-slim`)
    pub tag: String,
}

impl ImageReference {
    /// Parse `repository:tag`, rejecting anything unpinned.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`](crate::Error::InvalidReference) when the
    /// tag is missing, empty, or `latest`, or when the repository is empty.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let input = input.trim();
        let invalid = |reason| crate::Error::InvalidReference {
            reference: input.to_owned(),
            reason,
        };

        // The tag separator is the last ':' after the last '/', so
        // registry ports (`registry:5000/app:1.0`) parse correctly.
        let slash = input.rfind('/').map_or(0, |idx| idx + 1);
        let colon = match input[slash..].rfind(':') {
            Some(idx) => slash + idx,
            None => return Err(invalid("missing version tag — pin an explicit tag")),
        };

        let repository = &input[..colon];
        let tag = &input[colon + 1..];
        if repository.is_empty() {
            return Err(invalid("empty repository"));
        }
        if tag.is_empty() {
            return Err(invalid("empty version tag — pin an explicit tag"));
        }
        if tag.eq_ignore_ascii_case("latest") {
            return Err(invalid("floating tag 'latest' — pin an explicit version"));
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(invalid("version tag contains whitespace"));
        }

        Ok(Self {
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// Canonical `repository:tag` form.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// The command an image runs when started.
///
/// Declared at build time, executed verbatim at run time; no shell is
/// involved, so the argv is exactly what the process receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrypoint {
    argv: Vec<String>,
}

impl Entrypoint {
    /// Build an entrypoint from an argv.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyEntrypoint`](crate::Error::EmptyEntrypoint) when the
    /// argv is empty or its first element is blank.
    pub fn new(argv: Vec<String>) -> crate::Result<Self> {
        match argv.first() {
            Some(program) if !program.trim().is_empty() => Ok(Self { argv }),
            _ => Err(crate::Error::EmptyEntrypoint),
        }
    }

    /// The program to execute (`argv[0]`).
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the program.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// The full argv.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for Entrypoint {
    /// Exec-form rendering: `["uv", "run", "main.py"]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, arg) in self.argv.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg:?}")?;
        }
        write!(f, "]")
    }
}

/// The recorded result of a successful build.
///
/// Written to the image index only after every layer committed, so a listed
/// image always has its full layer chain in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Content-derived identity, `sha256:<hex>`
    pub id: String,
    /// Canonical base reference the build started from
    pub base: String,
    /// Toolchain id that drove dependency restoration
    pub toolchain: String,
    /// Layer cache keys, bottom layer first
    pub layers: Vec<String>,
    /// Entrypoint argv
    pub entrypoint: Vec<String>,
    /// Working directory inside the image
    pub workdir: String,
    /// When the image was recorded
    pub created: DateTime<Utc>,
}

impl ImageManifest {
    /// The topmost layer's cache key, if any layers exist.
    pub fn top_layer(&self) -> Option<&str> {
        self.layers.last().map(String::as_str)
    }

    /// Abbreviated id for display (`sha256:` prefix stripped, 12 hex chars).
    pub fn short_id(&self) -> &str {
        // arch-lint: allow(no-silent-result-drop) reason="strip_prefix returns Option — an unprefixed id is already the digest"
        let digest = self.id.strip_prefix("sha256:").unwrap_or(&self.id);
        &digest[..digest.len().min(12)]
    }
}
