//! Configuration-driven service container.
//!
//! Services are declared in a data tree (usually YAML) and resolved lazily by
//! name. Constructors, factories and selector decisions are registered in a
//! [`SymbolRegistry`] and referenced from declarations by dotted path.

pub mod args;
pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;
pub mod types;

pub use errors::{BoxError, LoadError, MergeError, ProviderError, Result, SymbolError};
pub use infrastructure::container::{
    Namespace, Overrides, ProviderBuilder, ProviderStats, ServiceProvider, ServiceTree,
    ValidationIssue,
};
pub use infrastructure::env::{DotenvEnv, EnvSource, MapEnv, ProcessEnv};
pub use infrastructure::registry::{Arguments, ServiceFactory, Symbol, SymbolRegistry};
pub use types::{Instance, Value};
