//! Several definition files merged into one service tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::config::loader::{load_service_tree, load_tree};
use crate::errors::{Duplicate, LoadError, MergeError};
use crate::infrastructure::container::{
    ProviderBuilder, ServiceProvider, ServiceTree, ALIAS_KEY,
};
use crate::logging::OperationTimer;

/// One definition file and where its services land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinitionSource {
    pub name: String,
    pub path: PathBuf,
    /// Prefix every key with `name.`; otherwise keys land at the root.
    pub as_namespace: bool,
}

impl ServiceDefinitionSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            as_namespace: true,
        }
    }

    pub fn at_root(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            as_namespace: false,
            ..Self::new(name, path)
        }
    }

    pub fn service_key(&self, key: &str) -> String {
        if self.as_namespace {
            format!("{}.{}", self.name, key)
        } else {
            key.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Also register `a_b` as an alias of every key containing `a-b`.
    pub alt_names_for_dashes: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            alt_names_for_dashes: true,
        }
    }
}

/// Merge loaded trees in order. Every collision is collected; the merge
/// fails once at the end if any were found.
pub fn merge_sources(
    sources: &[(ServiceDefinitionSource, ServiceTree)],
    options: MergeOptions,
) -> Result<ServiceTree, MergeError> {
    let mut merged = ServiceTree::new();
    let mut origins: HashMap<String, &Path> = HashMap::new();
    let mut duplicates = Vec::new();

    for (source, services) in sources {
        for (key, declaration) in services {
            let service_key = source.service_key(key);
            let alt_key = (options.alt_names_for_dashes && service_key.contains('-'))
                .then(|| service_key.replace('-', "_"));

            let collision = std::iter::once(&service_key)
                .chain(alt_key.as_ref())
                .find_map(|candidate| origins.get(candidate).map(|prev| (candidate, *prev)));
            if let Some((candidate, previous)) = collision {
                tracing::warn!(key = %candidate, source = %source.path.display(), "Duplicated service entry");
                duplicates.push(Duplicate {
                    key: candidate.clone(),
                    source: source.path.clone(),
                    previous: previous.to_path_buf(),
                });
            }

            if let Some(alt_key) = alt_key {
                origins.insert(alt_key.clone(), &source.path);
                merged.insert(alt_key, json!({ ALIAS_KEY: service_key }));
            }
            origins.insert(service_key.clone(), &source.path);
            merged.insert(service_key, declaration.clone());
        }
    }

    if duplicates.is_empty() {
        Ok(merged)
    } else {
        Err(MergeError { duplicates })
    }
}

/// Load every source, merge them and configure a provider from the result.
pub fn provider_from_sources(
    sources: &[ServiceDefinitionSource],
    options: MergeOptions,
    app_path: Option<&Path>,
    builder: ProviderBuilder,
) -> Result<ServiceProvider, LoadError> {
    let timer = OperationTimer::new("provider_from_sources").with_metadata("sources", sources.len());

    let loaded = sources
        .iter()
        .map(|source| Ok((source.clone(), load_service_tree(&source.path)?)))
        .collect::<Result<Vec<_>, LoadError>>()?;
    let services = merge_sources(&loaded, options)?;
    let app = app_path.map(load_tree).transpose()?;
    let provider = builder.configure(&services, app)?;

    timer.finish();
    Ok(provider)
}
