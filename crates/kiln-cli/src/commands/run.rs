use kiln_build::store::LayerStore;
use kiln_core::KilnConfig;
use kiln_runtime::Runtime;

/// Run an image's entrypoint and hand back its exit code.
///
/// The entrypoint inherits this terminal; kiln's own chatter goes to
/// stderr so the child owns stdout.
pub async fn run(image: &str) -> anyhow::Result<i32> {
    let config = KilnConfig::load(&super::context_dir())?;
    let store = LayerStore::open(super::store_dir(&config))?;
    let manifest = store.find_image(image)?;
    tracing::debug!(image = %manifest.id, "image resolved");

    eprintln!(
        "Running {} ({})",
        manifest.short_id(),
        manifest.entrypoint.join(" ")
    );
    let exit = Runtime::new().start(&manifest, &store).await?;
    Ok(exit.code)
}
