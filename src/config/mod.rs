//! Reading service definitions and application configuration from disk.

pub mod loader;
pub mod sources;

pub use loader::{load_service_tree, load_tree, provider_from_files};
pub use sources::{merge_sources, provider_from_sources, MergeOptions, ServiceDefinitionSource};
