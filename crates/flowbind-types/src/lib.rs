//! Pipeline topology model shared by the flowbind engine and its callers.
//!
//! A stream or job is an ordered, possibly nested, sequence of
//! [`ModuleDescriptor`]s. This crate holds the descriptor model, its builder,
//! and the [`DescriptorKey`] used to index descriptors per stream. It has no
//! runtime dependencies beyond `serde` and `thiserror`.

#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub mod descriptor;
pub mod error;
pub mod key;
pub mod module;

pub use descriptor::{
    default_label, validate_sibling_indices, Composition, ModuleDescriptor, ModuleDescriptorBuilder,
};
pub use error::DescriptorError;
pub use key::DescriptorKey;
pub use module::{ModuleDefinition, ModuleType};
