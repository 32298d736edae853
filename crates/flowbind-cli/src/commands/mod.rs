pub mod bind;
pub mod check;
pub mod plan;

use std::path::Path;

use anyhow::{Context, Result};
use flowbind_engine::config::{parser, validator, PipelineDefinition};
use flowbind_types::ModuleDescriptor;

/// Parse, validate, and expand a definition file.
pub(crate) fn load(pipeline_path: &Path) -> Result<(PipelineDefinition, Vec<ModuleDescriptor>)> {
    let definition = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    validator::validate_pipeline(&definition)?;
    let descriptors = definition.to_descriptors()?;
    Ok((definition, descriptors))
}
