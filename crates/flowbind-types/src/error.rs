//! Descriptor validation errors.

use crate::module::ModuleType;

/// Errors raised while constructing descriptors and descriptor keys.
///
/// All of these are construction-time failures: they surface to the caller
/// building the offending value and are never defaulted away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// Descriptor key constructed with an empty stream name.
    #[error("stream is required")]
    MissingStream,

    /// Descriptor key constructed with a blank label.
    #[error("label is required")]
    MissingLabel,

    /// Builder has no (or a blank) module name.
    #[error("module name is required")]
    MissingModuleName,

    /// Builder has no (or a blank) group.
    #[error("group is required for module '{module}'")]
    MissingGroup {
        /// Module name of the offending builder.
        module: String,
    },

    /// Builder has no module type.
    #[error("module type is required for module '{module}'")]
    MissingModuleType {
        /// Module name of the offending builder.
        module: String,
    },

    /// A module type name outside the closed role set.
    #[error("unknown module type '{0}', expected one of {list}", list = ModuleType::NAMES.join(", "))]
    UnknownModuleType(String),

    /// Two sibling descriptors share the same index.
    #[error("duplicate index {index} among modules of '{group}'")]
    DuplicateIndex {
        /// Owning group.
        group: String,
        /// The repeated index.
        index: usize,
    },

    /// Sibling indices do not form the range `0..N`.
    #[error("modules of '{group}' are not indexed contiguously: expected {expected}, found {found}")]
    NonContiguousIndex {
        /// Owning group.
        group: String,
        /// Index expected at this position of the sorted sequence.
        expected: usize,
        /// Index actually found.
        found: usize,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DescriptorError>;
