//! Channel naming, message bus binding, and pipeline definitions for flowbind.
//!
//! Descriptors from `flowbind-types` go through [`resolve_channels`] to get
//! their input and output channel names, and through a [`BinderPlugin`] to
//! attach those names to a [`MessageBus`].

#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod binder;
pub mod bus;
pub mod channels;
pub mod config;
pub mod deployment;
pub mod error;
pub mod registry;

// Re-export public API for convenience
pub use binder::{BinderPlugin, BoundModule, StreamBinderPlugin};
pub use bus::{Frame, LocalMessageBus, MessageBus};
pub use channels::{resolve_channels, ChannelPlan, ResolvedStage};
pub use deployment::{DeployedModule, DeploymentMetadata};
pub use error::{BindError, BusError, RegistryError};
pub use registry::{DescriptorRegistry, RegistryDiff};
