use kiln_build::executor::BuildExecutor;
use kiln_build::plan::BuildPlan;
use kiln_build::store::LayerStore;
use kiln_core::ToolchainRegistry;

/// Execute the full build pipeline for the current directory.
pub fn build() -> anyhow::Result<()> {
    let registry = ToolchainRegistry::builtin();
    let (config, context) = super::load_project(&registry)?;
    let plan = BuildPlan::resolve(&config, &context, &registry)?;
    let store = LayerStore::open(super::store_dir(&config))?;

    println!("Building with the {} toolchain...", plan.toolchain_id());
    let report = BuildExecutor::new(&store, &registry).build(&plan, &context)?;

    let total = report.steps.len();
    for (i, step) in report.steps.iter().enumerate() {
        let status = if step.cache.is_hit() { "cached" } else { "built" };
        println!("  [{}/{total}] {} ({status})", i + 1, step.label);
    }

    println!();
    println!(
        "Built {} ({} of {total} layers cached)",
        report.image.id,
        report.cache_hits()
    );
    Ok(())
}
