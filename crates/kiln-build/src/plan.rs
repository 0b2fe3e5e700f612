//! Build planning: from configuration and context to an ordered step list.

use kiln_core::{
    BuildContext, Entrypoint, ImageReference, KilnConfig, ToolSpec, ToolchainId,
    ToolchainRegistry,
};

use crate::step::BuildStep;

/// A resolved, ordered build plan.
///
/// The step order is fixed: base, tool, manifest, restore, source,
/// entrypoint. Dependency layers sit below the source layer on purpose, so
/// day-to-day source edits never invalidate them.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    steps: Vec<BuildStep>,
    base: ImageReference,
    toolchain_id: ToolchainId,
    tool: ToolSpec,
    entrypoint: Entrypoint,
    workdir: String,
    include_dev: bool,
    source_files: usize,
}

impl BuildPlan {
    /// Resolve a plan for the given context.
    ///
    /// Fills every gap in kiln.toml from the toolchain's pinned defaults:
    /// base reference, tool version, entrypoint. The resulting plan is fully
    /// explicit; nothing downstream consults configuration again.
    ///
    /// # Errors
    ///
    /// - [`kiln_core::Error::InvalidReference`] when the configured base is unpinned
    /// - [`kiln_core::Error::EmptyEntrypoint`] when the configured entrypoint is blank
    pub fn resolve(
        config: &KilnConfig,
        context: &BuildContext,
        registry: &ToolchainRegistry,
    ) -> kiln_core::Result<Self> {
        let toolchain = registry.get(context.toolchain_id);

        let base = ImageReference::parse(
            config
                .image
                .base
                .as_deref()
                // arch-lint: allow(no-silent-result-drop) reason="Option config field — absent base falls back to the toolchain's pinned default"
                .unwrap_or_else(|| toolchain.default_base()),
        )?;

        let tool = ToolSpec {
            name: toolchain.tool_name().to_owned(),
            version: config
                .toolchain
                .tool_version
                .clone()
                // arch-lint: allow(no-silent-result-drop) reason="Option config field — absent tool version falls back to the toolchain's pinned default"
                .unwrap_or_else(|| toolchain.default_tool_version().to_owned()),
        };

        let entrypoint = Entrypoint::new(match &config.app.entrypoint {
            Some(argv) => argv.clone(),
            None => toolchain
                .default_entrypoint()
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        })?;

        let include_dev = config.toolchain.include_dev;

        let steps = vec![
            BuildStep::EstablishBase {
                reference: base.clone(),
            },
            BuildStep::InstallTool { tool: tool.clone() },
            BuildStep::StageManifest {
                files: context.manifest_files(),
            },
            BuildStep::RestoreDependencies {
                toolchain: context.toolchain_id,
                include_dev,
            },
            BuildStep::CopySource,
            BuildStep::SetEntrypoint {
                entrypoint: entrypoint.clone(),
            },
        ];

        tracing::debug!(
            base = %base,
            toolchain = %context.toolchain_id,
            tool = %tool,
            steps = steps.len(),
            "build plan resolved"
        );

        Ok(Self {
            steps,
            base,
            toolchain_id: context.toolchain_id,
            tool,
            entrypoint,
            workdir: config.image.workdir.clone(),
            include_dev,
            source_files: context.files.len(),
        })
    }

    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    pub fn base(&self) -> &ImageReference {
        &self.base
    }

    pub fn toolchain_id(&self) -> ToolchainId {
        self.toolchain_id
    }

    pub fn tool(&self) -> &ToolSpec {
        &self.tool
    }

    pub fn entrypoint(&self) -> &Entrypoint {
        &self.entrypoint
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    pub fn include_dev(&self) -> bool {
        self.include_dev
    }

    /// Render the plan as numbered progress lines, one per step.
    pub fn render(&self) -> String {
        let mut out = format!("Build plan ({} toolchain)\n", self.toolchain_id);
        for (idx, step) in self.steps.iter().enumerate() {
            let line = match step {
                BuildStep::CopySource => {
                    format!("copy source ({} files)", self.source_files)
                }
                BuildStep::SetEntrypoint { entrypoint } => {
                    format!("set entrypoint {} in {}", entrypoint, self.workdir)
                }
                other => other.label(),
            };
            out.push_str(&format!("  {}. {line}\n", idx + 1));
        }
        out
    }
}
