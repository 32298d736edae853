//! Module roles and opaque deployment metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Role of a module within a stream or job.
///
/// Declaration order is the rank order used by
/// [`DescriptorKey::rank_cmp`](crate::DescriptorKey::rank_cmp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// Produces data from outside the pipeline.
    Source,
    /// Transforms data between two channels.
    Processor,
    /// Terminates the flow.
    Sink,
    /// Batch job module.
    Job,
}

impl ModuleType {
    /// Every role, in rank order.
    pub const ALL: [ModuleType; 4] = [Self::Source, Self::Processor, Self::Sink, Self::Job];

    /// Serialized names, in rank order.
    pub const NAMES: [&'static str; 4] = ["source", "processor", "sink", "job"];

    /// Snake-case name of this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Processor => "processor",
            Self::Sink => "sink",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DescriptorError::UnknownModuleType(s.to_string()))
    }
}

/// Opaque reference to the information needed to load a module
/// (a classpath or resource location).
///
/// Owned by the deployment layer; descriptors carry it without looking inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleDefinition(String);

impl ModuleDefinition {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
