use std::path::PathBuf;

use thiserror::Error;

/// Error type returned by constructors, factories and `build` implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("\"{0}\" is not a service we know of.")]
    UnknownServiceKind(String),

    #[error(
        "You must define either a class, an instance, a factory or a selector for the service \"{0}\", none was found."
    )]
    NoCreationMethodFound(String),

    #[error(
        "You must define either a class, an instance, a factory or a selector for the service \"{service}\", not several (found: {})",
        .methods.join(", ")
    )]
    MultipleCreationMethodsFound {
        service: String,
        methods: Vec<&'static str>,
    },

    #[error("The factory \"{path}\" for the service \"{service}\" does not have a \"build\" method.")]
    NotAServiceFactory { service: String, path: String },

    #[error("The symbol \"{path}\" for the service \"{service}\" is a {found}, expected a {expected}.")]
    WrongSymbolKind {
        service: String,
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("The path \"{segment}\" was not found in the app configuration (while resolving \"{path}\").")]
    BadConfigurationPath { path: String, segment: String },

    #[error("Selector \"{selector}\" requires a value for the '{parameter}' parameter")]
    MissingParameter {
        selector: String,
        parameter: &'static str,
    },

    #[error("Invalid declaration for service \"{service}\": {reason}")]
    InvalidDeclaration { service: String, reason: String },

    #[error("Circular service reference: {}", .chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Service \"{service}\" could not be created: {source}")]
    CreationFailed {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Lookup failures of the symbol registry. These surface unchanged through
/// [`ProviderError::Symbol`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("No module named '{0}'")]
    ModuleNotFound(String),
    #[error("Module '{module}' has no member '{name}'")]
    NameNotFound { module: String, name: String },
    #[error("'{table}' has no key '{key}'")]
    KeyNotFound { table: String, key: String },
    #[error("'{0}' is not a table and cannot be indexed")]
    NotATable(String),
}

/// One colliding key found while merging definition sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub key: String,
    pub source: PathBuf,
    pub previous: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_duplicates(.duplicates))]
pub struct MergeError {
    pub duplicates: Vec<Duplicate>,
}

fn render_duplicates(duplicates: &[Duplicate]) -> String {
    duplicates
        .iter()
        .map(|d| {
            format!(
                "Duplicated entry {} from source ({}), already defined by ({})",
                d.key,
                d.source.display(),
                d.previous.display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failures while reading definition files from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML from file '{}': {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Failed to parse TOML from file '{}': {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("File '{}' must contain a mapping at the top level", .path.display())]
    NotAMapping { path: PathBuf },
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
