//! Per-request model resolution.

pub mod registry;

pub use registry::{ModelRegistry, ResolvedModel};
