//! Namespaces: dotted service names grouped by their first segment.

use std::collections::BTreeMap;

use super::provider::{Overrides, ServiceProvider};
use crate::errors::Result;
use crate::types::Value;

/// Service names split on the first `.`, recursively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTree {
    services: Vec<String>,
    namespaces: BTreeMap<String, NameTree>,
}

impl NameTree {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut services = Vec::new();
        let mut grouped: BTreeMap<String, Vec<&'a str>> = BTreeMap::new();

        for name in names {
            match name.split_once('.') {
                Some((namespace, rest)) => grouped.entry(namespace.to_string()).or_default().push(rest),
                None => services.push(name.to_string()),
            }
        }

        let namespaces = grouped
            .into_iter()
            .map(|(namespace, rest)| (namespace, NameTree::from_names(rest)))
            .collect();

        Self {
            services,
            namespaces,
        }
    }

    /// Names held directly at this level.
    pub fn service_names(&self) -> &[String] {
        &self.services
    }

    /// First-level namespace names.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn namespace(&self, name: &str) -> Option<&NameTree> {
        self.namespaces.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.namespaces.is_empty()
    }
}

/// A view of a provider scoped under a namespace prefix.
#[derive(Clone)]
pub struct Namespace {
    provider: ServiceProvider,
    prefix: String,
    tree: NameTree,
}

impl Namespace {
    pub(crate) fn new(provider: ServiceProvider, prefix: String, tree: NameTree) -> Self {
        Self {
            provider,
            prefix,
            tree,
        }
    }

    /// Fully qualified name of the namespace (empty for a provider root).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.provider.get(&self.qualify(name))
    }

    pub fn get_with(&self, name: &str, overrides: &Overrides) -> Result<Value> {
        self.provider.get_with(&self.qualify(name), overrides)
    }

    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        self.provider.set(&self.qualify(name), value)
    }

    pub fn service_names(&self) -> &[String] {
        self.tree.service_names()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.tree.namespaces().map(str::to_string).collect()
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        let tree = self.tree.namespace(name)?;
        Some(Namespace::new(
            self.provider.clone(),
            self.qualify(name),
            tree.clone(),
        ))
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("prefix", &self.prefix)
            .field("tree", &self.tree)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_from_names() {
        let tree = NameTree::from_names([
            "service1",
            "test",
            "test.version-1",
            "test2.foo.bar",
            "test2.service1",
        ]);

        assert_eq!(tree.service_names(), ["service1".to_string(), "test".to_string()]);
        assert_eq!(tree.namespaces().collect::<Vec<_>>(), vec!["test", "test2"]);

        let test2 = tree.namespace("test2").unwrap();
        assert_eq!(test2.service_names(), ["service1".to_string()]);
        assert_eq!(test2.namespaces().collect::<Vec<_>>(), vec!["foo"]);
        assert_eq!(
            test2.namespace("foo").unwrap().service_names(),
            ["bar".to_string()]
        );
        assert!(tree.namespace("missing").is_none());
    }

    #[test]
    fn test_empty_tree() {
        let tree = NameTree::from_names(std::iter::empty());
        assert!(tree.is_empty());
    }
}
