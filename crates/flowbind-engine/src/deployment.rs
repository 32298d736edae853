//! Deployed module instances as seen by binder plugins.

use flowbind_types::{DescriptorKey, ModuleDescriptor, ModuleType};
use serde::Serialize;

/// Per-instance deployment data computed before any binding happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentMetadata {
    key: DescriptorKey,
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_channel_name: Option<String>,
}

impl DeploymentMetadata {
    pub fn new(
        key: DescriptorKey,
        index: usize,
        input_channel_name: Option<String>,
        output_channel_name: Option<String>,
    ) -> Self {
        Self {
            key,
            index,
            input_channel_name,
            output_channel_name,
        }
    }

    pub fn key(&self) -> &DescriptorKey {
        &self.key
    }

    /// Name of the owning stream or job.
    pub fn group(&self) -> &str {
        self.key.stream()
    }

    /// Label qualified by enclosing composite labels, e.g. `enrich-1.lookup-0`.
    pub fn label(&self) -> &str {
        self.key.label()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn input_channel_name(&self) -> Option<&str> {
        self.input_channel_name.as_deref()
    }

    pub fn output_channel_name(&self) -> Option<&str> {
        self.output_channel_name.as_deref()
    }
}

/// A leaf stage instance ready to be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedModule {
    descriptor: ModuleDescriptor,
    metadata: DeploymentMetadata,
}

impl DeployedModule {
    pub fn new(descriptor: ModuleDescriptor, metadata: DeploymentMetadata) -> Self {
        Self {
            descriptor,
            metadata,
        }
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn metadata(&self) -> &DeploymentMetadata {
        &self.metadata
    }

    pub fn key(&self) -> &DescriptorKey {
        self.metadata.key()
    }

    pub fn module_type(&self) -> ModuleType {
        self.descriptor.module_type()
    }
}
