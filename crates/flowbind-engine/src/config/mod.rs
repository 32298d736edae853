//! YAML pipeline definitions: parsing, validation, and expansion into
//! module descriptors.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_pipeline, parse_pipeline_str};
pub use types::{ModuleSpec, PipelineDefinition, PipelineKind};
pub use validator::validate_pipeline;
