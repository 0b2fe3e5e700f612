use kiln_core::KilnConfig;
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = KilnConfig::load(tmp.path()).unwrap();

    assert!(config.image.base.is_none());
    assert_eq!(config.image.workdir, "/app");
    assert!(config.toolchain.id.is_none());
    assert!(config.toolchain.tool_version.is_none());
    assert!(!config.toolchain.include_dev);
    assert!(config.app.entrypoint.is_none());
    assert!(config.context.exclude.is_empty());
    assert!(config.store.dir.is_none());
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[image]
base = "python:3.13-slim"
workdir = "/srv/app"

[toolchain]
id = "uv"
tool_version = "0.8.11"
include_dev = true

[app]
entrypoint = ["uv", "run", "serve.py"]

[context]
exclude = ["data", "notebooks"]

[store]
dir = "/var/cache/kiln"
"#;
    std::fs::write(tmp.path().join("kiln.toml"), toml).unwrap();

    let config = KilnConfig::load(tmp.path()).unwrap();

    assert_eq!(config.image.base.as_deref(), Some("python:3.13-slim"));
    assert_eq!(config.image.workdir, "/srv/app");
    assert_eq!(config.toolchain.id.as_deref(), Some("uv"));
    assert_eq!(config.toolchain.tool_version.as_deref(), Some("0.8.11"));
    assert!(config.toolchain.include_dev);
    assert_eq!(
        config.app.entrypoint.as_deref(),
        Some(["uv", "run", "serve.py"].map(String::from).as_slice())
    );
    assert_eq!(config.context.exclude, vec!["data", "notebooks"]);
    assert_eq!(
        config.store.dir.as_deref(),
        Some(std::path::Path::new("/var/cache/kiln"))
    );
}

#[test]
fn load_partial_config_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[image]
base = "python:3.11-slim"
"#;
    std::fs::write(tmp.path().join("kiln.toml"), toml).unwrap();

    let config = KilnConfig::load(tmp.path()).unwrap();

    assert_eq!(config.image.base.as_deref(), Some("python:3.11-slim"));
    // Defaults preserved
    assert_eq!(config.image.workdir, "/app");
    assert!(!config.toolchain.include_dev);
    assert!(config.store.dir.is_none());
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("kiln.toml"), "not valid {{{{ toml").unwrap();

    let result = KilnConfig::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("parse"));
}

#[test]
fn load_empty_config_returns_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("kiln.toml"), "").unwrap();

    let config = KilnConfig::load(tmp.path()).unwrap();
    assert_eq!(config.image.workdir, "/app");
}

// ── Store directory resolution ──

#[test]
fn store_dir_defaults_under_the_context() {
    let tmp = TempDir::new().unwrap();
    let config = KilnConfig::load(tmp.path()).unwrap();

    assert_eq!(
        config.store_dir(tmp.path()),
        tmp.path().join(".kiln").join("store")
    );
}

#[test]
fn store_dir_honors_explicit_location() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[store]
dir = "/var/cache/kiln"
"#;
    std::fs::write(tmp.path().join("kiln.toml"), toml).unwrap();

    let config = KilnConfig::load(tmp.path()).unwrap();
    assert_eq!(
        config.store_dir(tmp.path()),
        std::path::PathBuf::from("/var/cache/kiln")
    );
}
