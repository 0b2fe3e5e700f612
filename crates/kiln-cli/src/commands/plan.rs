use kiln_build::plan::BuildPlan;
use kiln_core::ToolchainRegistry;

/// Resolve and print the build plan without executing it.
pub fn plan() -> anyhow::Result<()> {
    let registry = ToolchainRegistry::builtin();
    let (config, context) = super::load_project(&registry)?;
    let plan = BuildPlan::resolve(&config, &context, &registry)?;

    println!("{}", plan.render());
    Ok(())
}
