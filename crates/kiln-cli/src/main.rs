mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kiln",
    about = "Build and run container images from locked project manifests"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter kiln.toml to the current directory
    Init,
    /// Show the resolved build plan without executing it
    Plan,
    /// Build an image from the current directory
    Build,
    /// List images recorded in the layer store
    Images,
    /// Run an image's entrypoint and exit with its code
    Run {
        /// Image id, or a unique prefix of one
        image: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="unset or invalid RUST_LOG falls back to the info filter"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init_project()?,
        Commands::Plan => commands::plan()?,
        Commands::Build => commands::build()?,
        Commands::Images => commands::images()?,
        Commands::Run { image } => {
            let code = commands::run(&image).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}
