//! Serde model of a pipeline definition document.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use flowbind_types::{ModuleDefinition, ModuleDescriptor, ModuleType};
use serde::{Deserialize, Serialize};

/// Whether a definition describes a long-running stream or a batch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    #[default]
    Stream,
    Job,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub kind: PipelineKind,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub module: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub label: Option<String>,
    pub source_channel: Option<String>,
    pub sink_channel: Option<String>,
    pub definition: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl ModuleSpec {
    /// Label this module ends up with once built.
    pub fn effective_label(&self, index: usize) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => flowbind_types::default_label(self.module.trim(), index),
        }
    }

    fn to_descriptor(&self, group: &str, index: usize) -> Result<ModuleDescriptor> {
        let mut builder = ModuleDescriptor::builder()
            .module_name(&self.module)
            .group(group)
            .module_type(self.module_type)
            .index(index);

        if let Some(label) = &self.label {
            builder = builder.module_label(label);
        }
        if let Some(channel) = &self.source_channel {
            builder = builder.source_channel_name(channel);
        }
        if let Some(channel) = &self.sink_channel {
            builder = builder.sink_channel_name(channel);
        }
        if let Some(definition) = &self.definition {
            builder = builder.module_definition(ModuleDefinition::new(definition));
        }
        for (name, value) in &self.parameters {
            let value = scalar_to_string(value)
                .with_context(|| format!("parameter '{name}' of module '{}'", self.module))?;
            builder.set_parameter(name, value);
        }
        for (child_index, child) in self.modules.iter().enumerate() {
            builder = builder.child(child.to_descriptor(group, child_index)?);
        }

        builder
            .build()
            .with_context(|| format!("invalid module '{}' at index {index}", self.module))
    }
}

impl PipelineDefinition {
    /// Expand the definition into one descriptor per top-level module.
    ///
    /// Indices follow document order; every descriptor, nested ones
    /// included, belongs to the group named after the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is not a scalar or a module fails to
    /// build.
    pub fn to_descriptors(&self) -> Result<Vec<ModuleDescriptor>> {
        self.modules
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.to_descriptor(&self.name, index))
            .collect()
    }
}

/// Render a scalar YAML value the way it would appear in a definition.
///
/// # Errors
///
/// Returns an error for sequences, mappings and tagged values.
pub fn scalar_to_string(value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_)
        | serde_yaml::Value::Tagged(_) => bail!("value must be a scalar"),
    }
}
