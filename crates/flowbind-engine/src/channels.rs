//! Channel naming for stage-to-stage links.
//!
//! Stages deployed in separate processes never talk to each other directly;
//! they meet on the message bus by agreeing on a channel name. Names are a
//! pure function of the group, the sibling indices, and any explicit
//! overrides carried by the descriptors, so resolving the same definition
//! twice always yields the same names and a restarted stage reconnects to
//! the channels it had before.
//!
//! Within a namespace `ns` (the group at top level), the link after the
//! sibling with index `i` is named `"{ns}.{i}"`. The children of a composite
//! at index `i` use the namespace `"{ns}.{i}"`, so their internal links carry
//! an extra segment and cannot collide with top-level names.

use std::collections::BTreeSet;

use flowbind_types::{DescriptorKey, ModuleDescriptor};

use crate::deployment::{DeployedModule, DeploymentMetadata};

/// Default name of the link that follows the sibling at `index` in `namespace`.
#[must_use]
pub fn default_channel_name(namespace: &str, index: usize) -> String {
    format!("{namespace}.{index}")
}

/// Effective input and output channel of one stage.
///
/// `None` means the stage has no bus endpoint on that side: the first stage
/// reads from outside the pipeline, the last one terminates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedChannels {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// A descriptor together with its resolved channels.
#[derive(Debug, Clone)]
pub struct ResolvedStage<'a> {
    descriptor: &'a ModuleDescriptor,
    key: DescriptorKey,
    channels: ResolvedChannels,
    children: Vec<ResolvedStage<'a>>,
}

impl<'a> ResolvedStage<'a> {
    pub fn descriptor(&self) -> &'a ModuleDescriptor {
        self.descriptor
    }

    /// Key of this stage; nested stages carry their parent's label as prefix.
    pub fn key(&self) -> &DescriptorKey {
        &self.key
    }

    pub fn channels(&self) -> &ResolvedChannels {
        &self.channels
    }

    pub fn input_channel_name(&self) -> Option<&str> {
        self.channels.input.as_deref()
    }

    pub fn output_channel_name(&self) -> Option<&str> {
        self.channels.output.as_deref()
    }

    /// Resolved children in index order; empty for a leaf.
    pub fn children(&self) -> &[ResolvedStage<'a>] {
        &self.children
    }

    fn collect_leaves<'s>(&'s self, out: &mut Vec<&'s ResolvedStage<'a>>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }
}

/// Channel assignment for every stage of one stream or job.
#[derive(Debug, Clone)]
pub struct ChannelPlan<'a> {
    group: String,
    stages: Vec<ResolvedStage<'a>>,
}

impl<'a> ChannelPlan<'a> {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Top-level stages in index order.
    pub fn stages(&self) -> &[ResolvedStage<'a>] {
        &self.stages
    }

    /// Leaf stages, depth first. These are the units that get bound.
    pub fn leaves(&self) -> Vec<&ResolvedStage<'a>> {
        let mut out = Vec::new();
        for stage in &self.stages {
            stage.collect_leaves(&mut out);
        }
        out
    }

    /// Every channel name used by the plan, internal links included.
    pub fn channel_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for leaf in self.leaves() {
            names.extend(leaf.channels.input.iter().cloned());
            names.extend(leaf.channels.output.iter().cloned());
        }
        names
    }

    /// Deployment view of each leaf, ready to hand to a binder.
    pub fn deployments(&self) -> Vec<DeployedModule> {
        self.leaves()
            .into_iter()
            .map(|leaf| {
                let metadata = DeploymentMetadata::new(
                    leaf.key.clone(),
                    leaf.descriptor.index(),
                    leaf.channels.input.clone(),
                    leaf.channels.output.clone(),
                );
                DeployedModule::new(leaf.descriptor.clone(), metadata)
            })
            .collect()
    }
}

/// Resolve effective channel names for the sibling stages of `group`.
///
/// Stages are taken in ascending index order whatever order they are passed
/// in. Explicit `source_channel_name`/`sink_channel_name` values win over the
/// defaults for that stage only; neighbours keep their default names.
/// Duplicate indices are not detected here (see
/// [`validate_sibling_indices`](flowbind_types::validate_sibling_indices)).
pub fn resolve_channels<'a>(group: &str, stages: &'a [ModuleDescriptor]) -> ChannelPlan<'a> {
    let stages = resolve_siblings(group, None, stages, &ResolvedChannels::default());
    let plan = ChannelPlan {
        group: group.to_string(),
        stages,
    };
    tracing::debug!(
        group,
        stages = plan.stages.len(),
        channels = plan.channel_names().len(),
        "Resolved channel plan"
    );
    plan
}

fn resolve_siblings<'a>(
    namespace: &str,
    parent: Option<&DescriptorKey>,
    siblings: &'a [ModuleDescriptor],
    boundary: &ResolvedChannels,
) -> Vec<ResolvedStage<'a>> {
    let mut ordered: Vec<&'a ModuleDescriptor> = siblings.iter().collect();
    ordered.sort_by(|a, b| a.cmp_by_index(b));

    let mut resolved = Vec::with_capacity(ordered.len());
    for (pos, descriptor) in ordered.iter().copied().enumerate() {
        let default_input = match pos.checked_sub(1) {
            Some(prev) => Some(default_channel_name(namespace, ordered[prev].index())),
            None => boundary.input.clone(),
        };
        let default_output = if pos + 1 < ordered.len() {
            Some(default_channel_name(namespace, descriptor.index()))
        } else {
            boundary.output.clone()
        };

        let channels = ResolvedChannels {
            input: descriptor
                .source_channel_name()
                .map(str::to_string)
                .or(default_input),
            output: descriptor
                .sink_channel_name()
                .map(str::to_string)
                .or(default_output),
        };

        let key = match parent {
            Some(parent) => DescriptorKey::for_descriptor(descriptor).within(parent.label()),
            None => DescriptorKey::for_descriptor(descriptor),
        };

        resolved.push(resolve_stage(namespace, descriptor, key, channels));
    }
    resolved
}

fn resolve_stage<'a>(
    namespace: &str,
    descriptor: &'a ModuleDescriptor,
    key: DescriptorKey,
    channels: ResolvedChannels,
) -> ResolvedStage<'a> {
    if !descriptor.is_composed() {
        return ResolvedStage {
            descriptor,
            key,
            channels,
            children: Vec::new(),
        };
    }

    let inner = default_channel_name(namespace, descriptor.index());
    let children = resolve_siblings(&inner, Some(&key), descriptor.children(), &channels);

    // A composite exposes the outer edges of its children.
    let exposed = ResolvedChannels {
        input: children.first().and_then(|c| c.channels.input.clone()),
        output: children.last().and_then(|c| c.channels.output.clone()),
    };

    ResolvedStage {
        descriptor,
        key,
        channels: exposed,
        children,
    }
}

#[cfg(test)]
mod tests {
    use flowbind_types::ModuleType;

    use super::*;

    fn stage(name: &str, module_type: ModuleType, index: usize) -> ModuleDescriptor {
        ModuleDescriptor::builder()
            .module_name(name)
            .group("orders")
            .module_type(module_type)
            .index(index)
            .build()
            .unwrap()
    }

    fn orders_pipeline() -> Vec<ModuleDescriptor> {
        vec![
            stage("http", ModuleType::Source, 0),
            stage("transform", ModuleType::Processor, 1),
            stage("log", ModuleType::Sink, 2),
        ]
    }

    fn channels(input: Option<&str>, output: Option<&str>) -> ResolvedChannels {
        ResolvedChannels {
            input: input.map(str::to_string),
            output: output.map(str::to_string),
        }
    }

    #[test]
    fn linear_pipeline_uses_group_and_index() {
        let stages = orders_pipeline();
        let plan = resolve_channels("orders", &stages);
        let resolved: Vec<&ResolvedChannels> = plan.stages().iter().map(ResolvedStage::channels).collect();
        assert_eq!(
            resolved,
            [
                &channels(None, Some("orders.0")),
                &channels(Some("orders.0"), Some("orders.1")),
                &channels(Some("orders.1"), None),
            ]
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut stages = orders_pipeline();
        stages.reverse();
        let plan = resolve_channels("orders", &stages);
        assert_eq!(plan.stages()[0].descriptor().module_name(), "http");
        assert_eq!(plan.stages()[2].input_channel_name(), Some("orders.1"));
    }

    #[test]
    fn explicit_source_channel_only_affects_its_stage() {
        let mut stages = orders_pipeline();
        stages[1] = ModuleDescriptor::builder()
            .module_name("transform")
            .group("orders")
            .module_type(ModuleType::Processor)
            .index(1)
            .source_channel_name("orders.tap")
            .build()
            .unwrap();

        let plan = resolve_channels("orders", &stages);
        assert_eq!(plan.stages()[1].input_channel_name(), Some("orders.tap"));
        assert_eq!(plan.stages()[0].output_channel_name(), Some("orders.0"));
        assert_eq!(plan.stages()[1].output_channel_name(), Some("orders.1"));
    }

    #[test]
    fn named_channels_at_both_ends() {
        let stages = vec![
            ModuleDescriptor::builder()
                .module_name("transform")
                .group("relay")
                .module_type(ModuleType::Processor)
                .source_channel_name("queue:in")
                .build()
                .unwrap(),
            ModuleDescriptor::builder()
                .module_name("filter")
                .group("relay")
                .module_type(ModuleType::Processor)
                .index(1)
                .sink_channel_name("queue:out")
                .build()
                .unwrap(),
        ];
        let plan = resolve_channels("relay", &stages);
        assert_eq!(plan.stages()[0].channels(), &channels(Some("queue:in"), Some("relay.0")));
        assert_eq!(plan.stages()[1].channels(), &channels(Some("relay.0"), Some("queue:out")));
    }

    #[test]
    fn single_stage_has_no_channels() {
        let stages = vec![stage("timestamp", ModuleType::Job, 0)];
        let plan = resolve_channels("nightly", &stages);
        assert_eq!(plan.stages()[0].channels(), &ResolvedChannels::default());
        assert!(plan.channel_names().is_empty());
    }

    #[test]
    fn composite_exposes_outer_child_channels() {
        let composite = ModuleDescriptor::builder()
            .module_name("enrich")
            .group("orders")
            .module_type(ModuleType::Processor)
            .index(1)
            .children([
                stage("lookup", ModuleType::Processor, 0),
                stage("merge", ModuleType::Processor, 1),
                stage("format", ModuleType::Processor, 2),
            ])
            .build()
            .unwrap();
        let stages = vec![
            stage("http", ModuleType::Source, 0),
            composite,
            stage("log", ModuleType::Sink, 2),
        ];

        let plan = resolve_channels("orders", &stages);
        let enrich = &plan.stages()[1];
        assert_eq!(enrich.channels(), &channels(Some("orders.0"), Some("orders.1")));

        let inner: Vec<&ResolvedChannels> = enrich.children().iter().map(ResolvedStage::channels).collect();
        assert_eq!(
            inner,
            [
                &channels(Some("orders.0"), Some("orders.1.0")),
                &channels(Some("orders.1.0"), Some("orders.1.1")),
                &channels(Some("orders.1.1"), Some("orders.1")),
            ]
        );

        let leaves: Vec<&str> = plan.leaves().iter().map(|l| l.key().label()).collect();
        assert_eq!(
            leaves,
            ["http-0", "enrich-1.lookup-0", "enrich-1.merge-1", "enrich-1.format-2", "log-2"]
        );
    }

    #[test]
    fn composite_child_override_becomes_boundary() {
        let composite = ModuleDescriptor::builder()
            .module_name("enrich")
            .group("orders")
            .module_type(ModuleType::Processor)
            .index(1)
            .children([
                ModuleDescriptor::builder()
                    .module_name("lookup")
                    .group("orders")
                    .module_type(ModuleType::Processor)
                    .source_channel_name("orders.tap")
                    .build()
                    .unwrap(),
                stage("format", ModuleType::Processor, 1),
            ])
            .build()
            .unwrap();
        let stages = vec![stage("http", ModuleType::Source, 0), composite];

        let plan = resolve_channels("orders", &stages);
        assert_eq!(plan.stages()[1].channels(), &channels(Some("orders.tap"), None));
        assert_eq!(plan.stages()[0].output_channel_name(), Some("orders.0"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let stages = orders_pipeline();
        let first = resolve_channels("orders", &stages).channel_names();
        let second = resolve_channels("orders", &stages).channel_names();
        assert_eq!(first, second);
        assert_eq!(
            first.into_iter().collect::<Vec<_>>(),
            ["orders.0".to_string(), "orders.1".to_string()]
        );
    }

    #[test]
    fn deployments_carry_resolved_names() {
        let stages = orders_pipeline();
        let modules = resolve_channels("orders", &stages).deployments();
        assert_eq!(modules.len(), 3);
        assert_eq!(modules[1].metadata().input_channel_name(), Some("orders.0"));
        assert_eq!(modules[1].metadata().output_channel_name(), Some("orders.1"));
        assert_eq!(modules[2].key().label(), "log-2");
    }
}
