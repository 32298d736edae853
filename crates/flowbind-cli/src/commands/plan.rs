use std::path::Path;

use anyhow::Result;
use flowbind_engine::{resolve_channels, DeploymentMetadata, ResolvedStage};

/// Execute the `plan` command: print the effective channels of every stage.
pub fn execute(pipeline_path: &Path, json: bool) -> Result<()> {
    let (definition, descriptors) = super::load(pipeline_path)?;
    let plan = resolve_channels(&definition.name, &descriptors);

    if json {
        let metadata: Vec<DeploymentMetadata> = plan
            .deployments()
            .into_iter()
            .map(|module| module.metadata().clone())
            .collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!(
        "Pipeline '{}' ({:?}), {} stage(s)",
        definition.name,
        definition.kind,
        plan.stages().len()
    );
    println!("  {:<28} {:<10} {:<16} {:<16}", "MODULE", "TYPE", "INPUT", "OUTPUT");
    for stage in plan.stages() {
        print_stage(stage, 0);
    }
    Ok(())
}

fn print_stage(stage: &ResolvedStage<'_>, depth: usize) {
    let label = format!("{}{}", "  ".repeat(depth), stage.descriptor().module_label());
    println!(
        "  {:<28} {:<10} {:<16} {:<16}",
        label,
        stage.descriptor().module_type().as_str(),
        endpoint(stage.input_channel_name()),
        endpoint(stage.output_channel_name()),
    );
    for child in stage.children() {
        print_stage(child, depth + 1);
    }
}

fn endpoint(channel: Option<&str>) -> &str {
    channel.unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_endpoint_renders_dash() {
        assert_eq!(endpoint(None), "-");
        assert_eq!(endpoint(Some("orders.0")), "orders.0");
    }
}
