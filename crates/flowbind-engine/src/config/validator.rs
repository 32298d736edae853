//! Semantic validation for parsed pipeline definitions.

use std::collections::HashSet;

use anyhow::{bail, Result};
use flowbind_types::ModuleType;

use crate::config::types::{scalar_to_string, ModuleSpec, PipelineDefinition, PipelineKind};

/// Check one level of siblings, then recurse into composites.
fn validate_modules(modules: &[ModuleSpec], context: &str, errors: &mut Vec<String>) {
    let mut labels = HashSet::new();

    for (i, spec) in modules.iter().enumerate() {
        let at = format!("{context}[{i}]");

        if spec.module.trim().is_empty() {
            errors.push(format!("{at}: module name must not be empty"));
            continue;
        }

        let label = spec.effective_label(i);
        if !labels.insert(label.clone()) {
            errors.push(format!("{at}: duplicate label '{label}'"));
        }

        for (name, value) in &spec.parameters {
            if scalar_to_string(value).is_err() {
                errors.push(format!(
                    "{at}: parameter '{name}' of module '{}' must be a scalar",
                    spec.module
                ));
            }
        }

        if spec.source_channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.push(format!("{at}: source_channel must not be blank"));
        }
        if spec.sink_channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.push(format!("{at}: sink_channel must not be blank"));
        }

        if !spec.modules.is_empty() {
            validate_modules(&spec.modules, &format!("{at}.modules"), errors);
        }
    }
}

fn count_jobs(modules: &[ModuleSpec]) -> usize {
    modules
        .iter()
        .map(|m| usize::from(m.module_type == ModuleType::Job) + count_jobs(&m.modules))
        .sum()
}

/// Validate a parsed pipeline definition.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the definition.
pub fn validate_pipeline(definition: &PipelineDefinition) -> Result<()> {
    let mut errors = Vec::new();

    if definition.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            definition.version
        ));
    }

    if definition.name.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    } else if definition.name.contains('.') {
        errors.push(format!(
            "Pipeline name '{}' must not contain '.'",
            definition.name
        ));
    }

    if definition.modules.is_empty() {
        errors.push("Pipeline must define at least one module".to_string());
    }

    validate_modules(&definition.modules, "modules", &mut errors);

    let jobs = count_jobs(&definition.modules);
    match definition.kind {
        PipelineKind::Job if jobs != 1 || definition.modules.len() != 1 => {
            errors.push(format!(
                "Job pipeline must contain exactly one job module, found {jobs} job(s) among {} module(s)",
                definition.modules.len()
            ));
        }
        PipelineKind::Stream if jobs > 0 => {
            errors.push("Stream pipeline must not contain job modules".to_string());
        }
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}
