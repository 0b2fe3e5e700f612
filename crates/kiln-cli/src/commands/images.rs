use kiln_build::store::LayerStore;
use kiln_core::KilnConfig;

/// List recorded images, newest first.
pub fn images() -> anyhow::Result<()> {
    let config = KilnConfig::load(&super::context_dir())?;
    let store = LayerStore::open(super::store_dir(&config))?;

    let images = store.list_images()?;
    if images.is_empty() {
        println!("No images recorded. Run `kiln build` first.");
        return Ok(());
    }

    println!("{:<14} {:<24} {:<10} CREATED", "IMAGE", "BASE", "TOOLCHAIN");
    for image in images {
        println!(
            "{:<14} {:<24} {:<10} {}",
            image.short_id(),
            image.base,
            image.toolchain,
            image.created.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
