//! Service container: declarations, argument resolution, selectors and the
//! provider that ties them together.

pub mod arguments;
pub mod declaration;
pub mod namespace;
pub mod provider;
pub mod selector;

pub use arguments::{lookup_config_path, ArgumentSpec, ResolveContext};
pub use declaration::{Catalog, CreationMethod, Declaration, ServiceTree, ALIAS_KEY};
pub use namespace::{NameTree, Namespace};
pub use provider::{Overrides, ProviderBuilder, ProviderStats, ServiceProvider, ValidationIssue};
pub use selector::ServiceSelector;
