use std::path::Path;

use anyhow::Result;
use flowbind_engine::{resolve_channels, DescriptorRegistry};

/// Execute the `check` command: validate the definition and make sure its
/// descriptors register and resolve cleanly.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse, validate, expand
    let (definition, descriptors) = super::load(pipeline_path)?;
    println!("Pipeline structure: OK");

    // 2. Register under the pipeline's group
    let mut registry = DescriptorRegistry::new();
    registry.insert_pipeline(&definition.name, descriptors.clone())?;
    println!("Descriptors:        {} stage(s)", registry.len());

    // 3. Resolve channel names
    let plan = resolve_channels(&definition.name, &descriptors);
    println!(
        "Channels:           {} link(s) across {} module(s)",
        plan.channel_names().len(),
        plan.leaves().len()
    );

    tracing::info!(
        pipeline = definition.name,
        kind = ?definition.kind,
        stages = registry.len(),
        "Pipeline checked"
    );

    println!("\nAll checks passed.");
    Ok(())
}
