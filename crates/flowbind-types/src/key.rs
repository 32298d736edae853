//! Keys identifying a descriptor within a named stream.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::descriptor::ModuleDescriptor;
use crate::error::{DescriptorError, Result};
use crate::module::ModuleType;

/// `(stream, type, label)` identity of a deployed stage.
///
/// Equality and hashing cover all three fields. Ranking, exposed through
/// [`rank_cmp`](Self::rank_cmp), only looks at type then label: keys from
/// different streams interleave when sorted together yet stay distinct as
/// map keys. The two relations disagree on purpose, so this type does not
/// implement `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DescriptorKey {
    stream: String,
    module_type: ModuleType,
    label: String,
}

impl DescriptorKey {
    /// # Errors
    ///
    /// Returns [`DescriptorError::MissingStream`] for an empty stream and
    /// [`DescriptorError::MissingLabel`] for a label with no visible text.
    pub fn new(
        stream: impl Into<String>,
        module_type: ModuleType,
        label: impl Into<String>,
    ) -> Result<Self> {
        let stream = stream.into();
        if stream.is_empty() {
            return Err(DescriptorError::MissingStream);
        }
        let label = label.into();
        if label.trim().is_empty() {
            return Err(DescriptorError::MissingLabel);
        }
        Ok(Self {
            stream,
            module_type,
            label,
        })
    }

    /// Key of `descriptor` within its group.
    ///
    /// Infallible: built descriptors always carry a group and a label.
    pub fn for_descriptor(descriptor: &ModuleDescriptor) -> Self {
        Self {
            stream: descriptor.group().to_string(),
            module_type: descriptor.module_type(),
            label: descriptor.module_label().to_string(),
        }
    }

    /// Key of a stage nested inside the stage labelled `parent`: the label
    /// becomes `"{parent}.{label}"`.
    #[must_use]
    pub fn within(mut self, parent: &str) -> Self {
        self.label = format!("{parent}.{}", self.label);
        self
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Rank order: module type, then label. The stream is ignored.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.module_type
            .cmp(&other.module_type)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.stream, self.module_type, self.label)
    }
}
