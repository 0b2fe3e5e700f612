use std::path::Path;

/// Write a starter kiln.toml into the current directory.
pub fn init_project() -> anyhow::Result<()> {
    let config_path = Path::new("kiln.toml");
    if config_path.exists() {
        anyhow::bail!("kiln.toml already exists — edit it instead of reinitializing");
    }

    let config = r#"# Every value is optional; unset values fall back to the
# detected toolchain's pinned defaults.

[image]
# base = "python:3.12-slim"
# workdir = "/app"

[toolchain]
# id = "uv"
# tool_version = "0.8.4"
# include_dev = false

[app]
# entrypoint = ["uv", "run", "main.py"]

[context]
# exclude = ["docs", "scripts"]

[store]
# dir = "/var/cache/kiln/store"
"#;
    std::fs::write(config_path, config)?;

    println!("Created kiln.toml");
    println!();
    println!("Next steps:");
    println!();
    println!("  1. Review the resolved defaults:");
    println!("     kiln plan");
    println!();
    println!("  2. Build an image:");
    println!("     kiln build");
    println!();
    println!("  3. Run it:");
    println!("     kiln run <image>");

    Ok(())
}
