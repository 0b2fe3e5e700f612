use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidReference {
        reference: String,
        reason: &'static str,
    },

    #[error("entrypoint is empty — set `entrypoint` under [app] in kiln.toml")]
    EmptyEntrypoint,

    // ── Build context discovery ──
    #[error("failed to resolve context directory {path}")]
    ContextDirResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk context directory {path}: {detail}")]
    ContextWalk { path: PathBuf, detail: String },

    #[error(
        "no dependency manifest found in {dir}; looked for: {}",
        format_names(expected)
    )]
    NoManifestInContext { dir: PathBuf, expected: Vec<String> },

    #[error(
        "multiple toolchains match {dir}: {}; set `id` under [toolchain] in kiln.toml to select one",
        format_names(matches)
    )]
    AmbiguousToolchain { dir: PathBuf, matches: Vec<String> },

    #[error("unknown toolchain '{id}'; known toolchains: {}", format_names(known))]
    UnknownToolchain { id: String, known: Vec<String> },

    #[error("lock file {path} is missing — lock the manifest with the toolchain's tool and retry")]
    MissingLockfile { path: PathBuf },

    // ── Manifest and lock file parsing ──
    #[error("failed to read {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {detail}")]
    ManifestParse { path: PathBuf, detail: String },

    #[error("failed to parse lock file {path}: {detail}")]
    LockfileParse { path: PathBuf, detail: String },
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}
