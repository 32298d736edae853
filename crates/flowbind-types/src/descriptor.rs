//! Module descriptors: one immutable record per pipeline stage instance.
//!
//! A [`ModuleDescriptor`] is produced once by a [`ModuleDescriptorBuilder`]
//! when a stream or job definition is expanded into stage instances, and is
//! never mutated afterwards. Redeploying or deleting the owning definition
//! discards it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{DescriptorError, Result};
use crate::module::{ModuleDefinition, ModuleType};

/// Whether a stage is a single module or an ordered sequence of child stages.
///
/// `Composite` always holds at least one child; the builder produces `Leaf`
/// for an empty child list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    #[default]
    Leaf,
    Composite(Vec<ModuleDescriptor>),
}

/// One stage of a stream or job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    module_name: String,
    module_label: String,
    group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sink_channel_name: Option<String>,
    index: usize,
    module_type: ModuleType,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, String>,
    composition: Composition,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_definition: Option<ModuleDefinition>,
}

/// Label used when a stage is not given one explicitly.
#[must_use]
pub fn default_label(module_name: &str, index: usize) -> String {
    format!("{module_name}-{index}")
}

impl ModuleDescriptor {
    pub fn builder() -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::default()
    }

    /// Name of the module implementation.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Symbolic name, unique within the owning group.
    pub fn module_label(&self) -> &str {
        &self.module_label
    }

    /// Name of the stream or job this stage belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Explicit input channel set by the definition (named channel or tap).
    pub fn source_channel_name(&self) -> Option<&str> {
        self.source_channel_name.as_deref()
    }

    /// Explicit output channel set by the definition.
    pub fn sink_channel_name(&self) -> Option<&str> {
        self.sink_channel_name.as_deref()
    }

    /// Zero-based position among sibling stages.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Child stages of a composite module; empty for a leaf.
    pub fn children(&self) -> &[ModuleDescriptor] {
        match &self.composition {
            Composition::Leaf => &[],
            Composition::Composite(children) => children,
        }
    }

    pub fn module_definition(&self) -> Option<&ModuleDefinition> {
        self.module_definition.as_ref()
    }

    /// True when this stage is made of child stages.
    pub fn is_composed(&self) -> bool {
        matches!(self.composition, Composition::Composite(_))
    }

    /// Sibling order. Only the index takes part; use this with `sort_by`.
    pub fn cmp_by_index(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }

    /// Leaf stages under this descriptor in depth-first order (itself if it is a leaf).
    pub fn leaves(&self) -> Vec<&ModuleDescriptor> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(descriptor: &'a ModuleDescriptor, out: &mut Vec<&'a ModuleDescriptor>) {
    match &descriptor.composition {
        Composition::Leaf => out.push(descriptor),
        Composition::Composite(children) => {
            let mut ordered: Vec<&ModuleDescriptor> = children.iter().collect();
            ordered.sort_by(|a, b| a.cmp_by_index(b));
            for child in ordered {
                collect_leaves(child, out);
            }
        }
    }
}

/// `group/type/label`, then the module name and index, any explicit channels
/// and the number of children, e.g.
/// `orders/processor/enrich (module enrich, index 1, sink queue:enriched, 2 children)`.
impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} (module {}, index {}",
            self.group, self.module_type, self.module_label, self.module_name, self.index
        )?;
        if let Some(channel) = &self.source_channel_name {
            write!(f, ", source {channel}")?;
        }
        if let Some(channel) = &self.sink_channel_name {
            write!(f, ", sink {channel}")?;
        }
        match self.children().len() {
            0 => {}
            1 => f.write_str(", 1 child")?,
            n => write!(f, ", {n} children")?,
        }
        f.write_str(")")
    }
}

/// Check that sibling indices are unique and form `0..N`.
///
/// # Errors
///
/// Returns [`DescriptorError::DuplicateIndex`] when two siblings share an
/// index, or [`DescriptorError::NonContiguousIndex`] when the sorted indices
/// have a gap or do not start at zero.
pub fn validate_sibling_indices<'a, I>(group: &str, siblings: I) -> Result<()>
where
    I: IntoIterator<Item = &'a ModuleDescriptor>,
{
    let mut indices: Vec<usize> = siblings.into_iter().map(ModuleDescriptor::index).collect();
    indices.sort_unstable();

    if let Some(pair) = indices.windows(2).find(|w| w[0] == w[1]) {
        return Err(DescriptorError::DuplicateIndex {
            group: group.to_string(),
            index: pair[0],
        });
    }

    for (expected, &found) in indices.iter().enumerate() {
        if expected != found {
            return Err(DescriptorError::NonContiguousIndex {
                group: group.to_string(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// Mutable accumulator for a [`ModuleDescriptor`].
///
/// Setters are fluent; the `set_*`/`add_*` variants work in place for code
/// that fills a builder step by step. [`build`](Self::build) validates and
/// snapshots the current state, so the builder can keep changing afterwards
/// without affecting descriptors already built.
#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptorBuilder {
    module_name: Option<String>,
    module_label: Option<String>,
    group: Option<String>,
    source_channel_name: Option<String>,
    sink_channel_name: Option<String>,
    index: usize,
    module_type: Option<ModuleType>,
    parameters: BTreeMap<String, String>,
    children: Vec<ModuleDescriptor>,
    module_definition: Option<ModuleDefinition>,
}

impl ModuleDescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a builder with every field of `descriptor`, children and
    /// parameters included.
    pub fn from_descriptor(descriptor: &ModuleDescriptor) -> Self {
        Self {
            module_name: Some(descriptor.module_name.clone()),
            module_label: Some(descriptor.module_label.clone()),
            group: Some(descriptor.group.clone()),
            source_channel_name: descriptor.source_channel_name.clone(),
            sink_channel_name: descriptor.sink_channel_name.clone(),
            index: descriptor.index,
            module_type: Some(descriptor.module_type),
            parameters: descriptor.parameters.clone(),
            children: descriptor.children().to_vec(),
            module_definition: descriptor.module_definition.clone(),
        }
    }

    #[must_use]
    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn module_label(mut self, label: impl Into<String>) -> Self {
        self.set_module_label(label);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn source_channel_name(mut self, channel: impl Into<String>) -> Self {
        self.source_channel_name = Some(channel.into());
        self
    }

    #[must_use]
    pub fn sink_channel_name(mut self, channel: impl Into<String>) -> Self {
        self.sink_channel_name = Some(channel.into());
        self
    }

    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn module_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = Some(module_type);
        self
    }

    #[must_use]
    pub fn module_definition(mut self, definition: ModuleDefinition) -> Self {
        self.module_definition = Some(definition);
        self
    }

    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    #[must_use]
    pub fn parameters<K, V>(mut self, parameters: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.add_parameters(parameters);
        self
    }

    #[must_use]
    pub fn child(mut self, child: ModuleDescriptor) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        self.add_children(children);
        self
    }

    pub fn set_module_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.module_label = Some(label.into());
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Merge `parameters` into the current map; a repeated name keeps the last value.
    pub fn add_parameters<K, V>(&mut self, parameters: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Append children after those already added, keeping call order.
    pub fn add_children(&mut self, children: impl IntoIterator<Item = ModuleDescriptor>) -> &mut Self {
        self.children.extend(children);
        self
    }

    /// Label of the stage being built, trimmed the same way
    /// [`build`](Self::build) trims it.
    ///
    /// When no label was set, computes `"{module_name}-{index}"` and caches it,
    /// so later index changes do not alter it. Returns `None` if no module name
    /// has been set yet.
    pub fn label(&mut self) -> Option<&str> {
        if non_blank(self.module_label.as_deref()).is_none() {
            let name = non_blank(self.module_name.as_deref())?;
            self.module_label = Some(default_label(name, self.index));
        }
        non_blank(self.module_label.as_deref())
    }

    /// Parameters accumulated so far.
    pub fn current_parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Validate the accumulated fields and produce a descriptor.
    ///
    /// # Errors
    ///
    /// Fails when the module name, group or type is missing, or when the
    /// children's indices are duplicated or not contiguous.
    pub fn build(&self) -> Result<ModuleDescriptor> {
        let module_name = non_blank(self.module_name.as_deref())
            .ok_or(DescriptorError::MissingModuleName)?
            .to_string();
        let group = non_blank(self.group.as_deref())
            .ok_or_else(|| DescriptorError::MissingGroup {
                module: module_name.clone(),
            })?
            .to_string();
        let module_type = self
            .module_type
            .ok_or_else(|| DescriptorError::MissingModuleType {
                module: module_name.clone(),
            })?;

        validate_sibling_indices(&group, &self.children)?;

        let module_label = non_blank(self.module_label.as_deref())
            .map_or_else(|| default_label(&module_name, self.index), str::to_string);

        let composition = if self.children.is_empty() {
            Composition::Leaf
        } else {
            Composition::Composite(self.children.clone())
        };

        Ok(ModuleDescriptor {
            module_name,
            module_label,
            group,
            source_channel_name: self.source_channel_name.clone(),
            sink_channel_name: self.sink_channel_name.clone(),
            index: self.index,
            module_type,
            parameters: self.parameters.clone(),
            composition,
            module_definition: self.module_definition.clone(),
        })
    }
}

impl From<&ModuleDescriptor> for ModuleDescriptorBuilder {
    fn from(descriptor: &ModuleDescriptor) -> Self {
        Self::from_descriptor(descriptor)
    }
}

/// Trimmed text of `value`, or `None` when there is none.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
