//! 服务提供者
//!
//! Resolves services by name from a parsed [`Catalog`]. Every constructed
//! service is cached; later lookups return the same object. Construction is
//! serialized by a reentrant lock so nested resolutions on the same thread
//! proceed while other threads wait and then hit the cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value as Json;

use super::arguments::{lookup_config_path, ArgumentSpec, ResolveContext};
use super::declaration::{Catalog, CreationMethod, Declaration, ServiceTree};
use super::namespace::Namespace;
use super::selector::ServiceSelector;
use crate::errors::{BoxError, ProviderError, Result, SymbolError};
use crate::infrastructure::env::{EnvSource, ProcessEnv};
use crate::infrastructure::registry::{
    Arguments, Constructor, Decision, FactoryConstructor, Symbol, SymbolRegistry,
};
use crate::types::Value;

/// Named-argument overrides for a single lookup.
pub type Overrides = BTreeMap<String, Value>;

/// Config-driven service provider. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    name: Option<String>,
    registry: SymbolRegistry,
    env: Arc<dyn EnvSource>,
    parents: Vec<(String, ServiceProvider)>,
    catalog: RwLock<Arc<Catalog>>,
    set_services: DashMap<String, Value>,
    instances: DashMap<String, Value>,
    classes: DashMap<String, Arc<dyn Constructor>>,
    factories: DashMap<String, Arc<dyn FactoryConstructor>>,
    selectors: DashMap<String, Arc<ServiceSelector>>,
    build_lock: ReentrantMutex<()>,
    stats: InnerStats,
}

#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

/// Lookup counters of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderStats {
    pub total_resolutions: usize,
    pub cache_hits: usize,
    /// Services actually constructed.
    pub cache_misses: usize,
}

impl ProviderStats {
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total() as f64
        }
    }
}

/// A declaration problem found by [`ServiceProvider::validate`].
#[derive(Debug)]
pub struct ValidationIssue {
    pub service: String,
    pub error: ProviderError,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.error)
    }
}

pub struct ProviderBuilder {
    name: Option<String>,
    registry: SymbolRegistry,
    env: Arc<dyn EnvSource>,
    parents: Vec<(String, ServiceProvider)>,
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self {
            name: None,
            registry: SymbolRegistry::default(),
            env: Arc::new(ProcessEnv),
            parents: Vec::new(),
        }
    }
}

impl ProviderBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn registry(mut self, registry: SymbolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Attach a parent provider reachable as the namespace `name`.
    pub fn parent(mut self, name: impl Into<String>, parent: ServiceProvider) -> Self {
        self.parents.push((name.into(), parent));
        self
    }

    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            inner: Arc::new(ProviderInner {
                name: self.name,
                registry: self.registry,
                env: self.env,
                parents: self.parents,
                catalog: RwLock::new(Arc::new(Catalog::default())),
                set_services: DashMap::new(),
                instances: DashMap::new(),
                classes: DashMap::new(),
                factories: DashMap::new(),
                selectors: DashMap::new(),
                build_lock: ReentrantMutex::new(()),
                stats: InnerStats::default(),
            }),
        }
    }

    /// Build and configure in one step.
    pub fn configure(self, services: &ServiceTree, app: Option<Json>) -> Result<ServiceProvider> {
        let provider = self.build();
        provider.configure(services, app)?;
        Ok(provider)
    }
}

/// Outcome of one construction.
enum Built {
    /// Cached under the requested name.
    Owned(Value),
    /// Produced by a selector's target, which caches itself.
    Delegated(Value),
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.inner.registry
    }

    /// Replace the configuration and forget every cached and set service.
    /// A tree that fails to parse leaves the provider untouched.
    pub fn configure(&self, services: &ServiceTree, app: Option<Json>) -> Result<()> {
        let catalog = Catalog::parse(services, app)?;
        let count = catalog.len();
        let _guard = self.inner.build_lock.lock();
        *self.inner.catalog.write() = Arc::new(catalog);
        self.clear_caches();
        tracing::debug!(provider = ?self.inner.name, services = count, "Provider configured");
        Ok(())
    }

    /// Drop every constructed, set and memoized service.
    pub fn reset(&self) {
        let _guard = self.inner.build_lock.lock();
        self.clear_caches();
    }

    fn clear_caches(&self) {
        self.inner.set_services.clear();
        self.inner.instances.clear();
        self.inner.classes.clear();
        self.inner.factories.clear();
        self.inner.selectors.clear();
    }

    /// Snapshot of the current configuration.
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.inner.catalog.read())
    }

    pub fn env(&self) -> &dyn EnvSource {
        self.inner.env.as_ref()
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.get_with(name, &Overrides::new())
    }

    /// Resolve `name`, using truthy entries of `overrides` in place of the
    /// declared named arguments. Overrides only matter on first construction.
    pub fn get_with(&self, name: &str, overrides: &Overrides) -> Result<Value> {
        let mut chain = Vec::new();
        self.resolve_service(name, overrides, &mut chain)
    }

    /// Install `value` for a declared service, bypassing construction.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let catalog = self.catalog();
        if let Some(canonical) = catalog.canonical(name) {
            tracing::debug!(service = canonical, "Service set explicitly");
            self.inner.set_services.insert(canonical.to_string(), value);
            return Ok(());
        }
        match self.parent_for(name) {
            Some((parent, rest)) => parent.set(rest, value),
            None => Err(ProviderError::UnknownServiceKind(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.catalog().contains(name)
            || self
                .parent_for(name)
                .map_or(false, |(parent, rest)| parent.contains(rest))
    }

    /// Top-level service names, without namespaces.
    pub fn service_names(&self) -> Vec<String> {
        self.catalog().names().service_names().to_vec()
    }

    /// First-level namespaces, parent providers included.
    pub fn namespaces(&self) -> Vec<String> {
        let catalog = self.catalog();
        let mut names: BTreeSet<String> = catalog.names().namespaces().map(str::to_string).collect();
        names.extend(self.inner.parents.iter().map(|(name, _)| name.clone()));
        names.into_iter().collect()
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        let catalog = self.catalog();
        if let Some(tree) = catalog.names().namespace(name) {
            return Some(Namespace::new(self.clone(), name.to_string(), tree.clone()));
        }
        self.inner
            .parents
            .iter()
            .find(|(parent_name, _)| parent_name == name)
            .map(|(_, parent)| {
                Namespace::new(parent.clone(), String::new(), parent.catalog().names().clone())
            })
    }

    pub fn stats(&self) -> ProviderStats {
        let stats = &self.inner.stats;
        ProviderStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Check every declaration without constructing anything: creation
    /// method count and symbol kind, service references, config paths and
    /// symbol arguments.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.check(true)
    }

    /// Like [`ServiceProvider::validate`] but skips registry lookups, for
    /// checking definition files outside the program that registers symbols.
    pub fn validate_structure(&self) -> Vec<ValidationIssue> {
        self.check(false)
    }

    fn check(&self, symbols: bool) -> Vec<ValidationIssue> {
        let catalog = self.catalog();
        let mut issues = Vec::new();

        for (name, declaration) in catalog.declarations() {
            let mut report = |error| {
                issues.push(ValidationIssue {
                    service: name.clone(),
                    error,
                })
            };

            match declaration.creation_method(name) {
                Err(error) => report(error),
                Ok(method) if symbols => {
                    if let Err(error) = self.check_symbol(name, method) {
                        report(error);
                    }
                }
                Ok(_) => {}
            }

            for spec in declaration.argument_specs() {
                match spec {
                    ArgumentSpec::Service(target) if !self.contains(target) => {
                        report(ProviderError::UnknownServiceKind(target.clone()))
                    }
                    ArgumentSpec::ConfigPath(path) => {
                        if let Err(error) = lookup_config_path(catalog.app(), path) {
                            report(error);
                        }
                    }
                    ArgumentSpec::Symbol(path) if symbols => {
                        if let Err(error) = self.inner.registry.resolve(path) {
                            report(error.into());
                        }
                    }
                    _ => {}
                }
            }
        }

        for issue in &issues {
            tracing::warn!(service = %issue.service, error = %issue.error, "Invalid service declaration");
        }
        issues
    }

    fn check_symbol(&self, service: &str, method: &CreationMethod) -> Result<()> {
        let symbol = self.inner.registry.resolve(method.path())?;
        match method {
            CreationMethod::Instance(_) => Ok(()),
            CreationMethod::Class(path) => as_class(service, path, symbol).map(drop),
            CreationMethod::Factory(path) => as_factory(service, path, symbol).map(drop),
            CreationMethod::Selector(path) => as_decision(service, path, symbol).map(drop),
        }
    }

    fn parent_for<'n>(&self, name: &'n str) -> Option<(&ServiceProvider, &'n str)> {
        let (namespace, rest) = name.split_once('.')?;
        self.inner
            .parents
            .iter()
            .find(|(parent_name, _)| parent_name == namespace)
            .map(|(_, parent)| (parent, rest))
    }

    fn resolve_service(
        &self,
        name: &str,
        overrides: &Overrides,
        chain: &mut Vec<String>,
    ) -> Result<Value> {
        let inner = &self.inner;
        inner.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);

        let catalog = self.catalog();
        let Some(name) = catalog.canonical(name) else {
            if let Some((parent, rest)) = self.parent_for(name) {
                return parent.get_with(rest, overrides);
            }
            return Err(ProviderError::UnknownServiceKind(name.to_string()));
        };

        if let Some(value) = self.cached(name, overrides) {
            return Ok(value);
        }

        if chain.iter().any(|n| n == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ProviderError::CircularReference { chain: cycle });
        }

        let _guard = inner.build_lock.lock();
        if let Some(value) = self.cached(name, overrides) {
            return Ok(value);
        }

        // configure() may have swapped the catalog while we waited
        let current = self.catalog();
        let declaration = current
            .declaration(name)
            .ok_or_else(|| ProviderError::UnknownServiceKind(name.to_string()))?;

        chain.push(name.to_string());
        let built = self.construct(&current, name, declaration, overrides, chain);
        chain.pop();

        match built? {
            Built::Owned(value) => {
                inner.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(service = name, "Service constructed");
                inner.instances.insert(name.to_string(), value.clone());
                Ok(value)
            }
            Built::Delegated(value) => Ok(value),
        }
    }

    /// Set services first, then constructed ones. Both count as cache hits.
    fn cached(&self, name: &str, overrides: &Overrides) -> Option<Value> {
        let value = match self.inner.set_services.get(name) {
            Some(value) => value.value().clone(),
            None => self.inner.instances.get(name).map(|v| v.value().clone())?,
        };
        self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(service = name, "Cache hit");
        if !overrides.is_empty() {
            tracing::debug!(service = name, "Service already constructed, overrides ignored");
        }
        Some(value)
    }

    fn construct(
        &self,
        catalog: &Catalog,
        name: &str,
        declaration: &Declaration,
        overrides: &Overrides,
        chain: &mut Vec<String>,
    ) -> Result<Built> {
        match declaration.creation_method(name)? {
            CreationMethod::Instance(path) => {
                let symbol = self.inner.registry.resolve(path)?;
                Ok(Built::Owned(symbol.into_value()))
            }
            CreationMethod::Class(path) => {
                let class = self.class_for(name, path)?;
                let args = self.arguments(catalog, declaration, overrides, chain)?;
                let instance = class
                    .construct(args)
                    .map_err(|source| creation_failed(name, source))?;
                Ok(Built::Owned(Value::Object(instance)))
            }
            CreationMethod::Factory(path) => {
                let factory = self.factory_for(name, path)?;
                let args = self.arguments(catalog, declaration, overrides, chain)?;
                let value = factory
                    .instantiate(args)
                    .and_then(|built| built.build())
                    .map_err(|source| creation_failed(name, source))?;
                Ok(Built::Owned(value))
            }
            CreationMethod::Selector(path) => {
                let selector =
                    self.selector_for(catalog, name, path, declaration, overrides, chain)?;
                let chosen = selector.select().to_string();
                tracing::debug!(selector = name, chosen = %chosen, "Delegating to selected service");
                self.resolve_service(&chosen, &Overrides::new(), chain)
                    .map(Built::Delegated)
            }
        }
    }

    fn class_for(&self, service: &str, path: &str) -> Result<Arc<dyn Constructor>> {
        if let Some(class) = self.inner.classes.get(service) {
            return Ok(Arc::clone(class.value()));
        }
        let class = as_class(service, path, self.inner.registry.resolve(path)?)?;
        self.inner
            .classes
            .insert(service.to_string(), Arc::clone(&class));
        Ok(class)
    }

    fn factory_for(&self, service: &str, path: &str) -> Result<Arc<dyn FactoryConstructor>> {
        if let Some(factory) = self.inner.factories.get(service) {
            return Ok(Arc::clone(factory.value()));
        }
        let factory = as_factory(service, path, self.inner.registry.resolve(path)?)?;
        self.inner
            .factories
            .insert(service.to_string(), Arc::clone(&factory));
        Ok(factory)
    }

    fn selector_for(
        &self,
        catalog: &Catalog,
        service: &str,
        path: &str,
        declaration: &Declaration,
        overrides: &Overrides,
        chain: &mut Vec<String>,
    ) -> Result<Arc<ServiceSelector>> {
        if let Some(selector) = self.inner.selectors.get(service) {
            return Ok(Arc::clone(selector.value()));
        }
        let decision = as_decision(service, path, self.inner.registry.resolve(path)?)?;
        let (_, named) = self
            .arguments(catalog, declaration, overrides, chain)?
            .into_parts();
        let selector = Arc::new(ServiceSelector::from_arguments(service, decision, named)?);
        self.inner
            .selectors
            .insert(service.to_string(), Arc::clone(&selector));
        Ok(selector)
    }

    fn arguments(
        &self,
        catalog: &Catalog,
        declaration: &Declaration,
        overrides: &Overrides,
        chain: &mut Vec<String>,
    ) -> Result<Arguments> {
        let mut cx = Resolution {
            provider: self,
            catalog,
            chain,
        };

        let positional = declaration
            .arguments()
            .iter()
            .map(|spec| spec.resolve(&mut cx))
            .collect::<Result<Vec<_>>>()?;

        let mut named = BTreeMap::new();
        for (key, spec) in declaration.named_arguments() {
            let value = match overrides.get(key) {
                Some(value) if value.is_truthy() => value.clone(),
                _ => spec.resolve(&mut cx)?,
            };
            named.insert(key.clone(), value);
        }

        Ok(Arguments::new(positional, named))
    }
}

impl Default for ServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("name", &self.inner.name)
            .field("services", &self.catalog().len())
            .field(
                "parents",
                &self.inner.parents.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Argument resolution against one provider and one in-flight chain.
struct Resolution<'a> {
    provider: &'a ServiceProvider,
    catalog: &'a Catalog,
    chain: &'a mut Vec<String>,
}

impl ResolveContext for Resolution<'_> {
    fn service(&mut self, name: &str) -> Result<Value> {
        self.provider
            .resolve_service(name, &Overrides::new(), self.chain)
    }

    fn app_config(&self) -> &Json {
        self.catalog.app()
    }

    fn env(&self) -> &dyn EnvSource {
        self.provider.inner.env.as_ref()
    }

    fn symbol(&self, path: &str) -> std::result::Result<Symbol, SymbolError> {
        self.provider.inner.registry.resolve(path)
    }
}

fn creation_failed(service: &str, source: BoxError) -> ProviderError {
    ProviderError::CreationFailed {
        service: service.to_string(),
        source,
    }
}

fn wrong_kind(service: &str, path: &str, expected: &'static str, found: &Symbol) -> ProviderError {
    ProviderError::WrongSymbolKind {
        service: service.to_string(),
        path: path.to_string(),
        expected,
        found: found.kind(),
    }
}

fn as_class(service: &str, path: &str, symbol: Symbol) -> Result<Arc<dyn Constructor>> {
    match symbol {
        Symbol::Class(class) => Ok(class),
        other => Err(wrong_kind(service, path, "class", &other)),
    }
}

fn as_factory(service: &str, path: &str, symbol: Symbol) -> Result<Arc<dyn FactoryConstructor>> {
    match symbol {
        Symbol::Factory(factory) => Ok(factory),
        _ => Err(ProviderError::NotAServiceFactory {
            service: service.to_string(),
            path: path.to_string(),
        }),
    }
}

fn as_decision(service: &str, path: &str, symbol: Symbol) -> Result<Decision> {
    match symbol {
        Symbol::Selector(decision) => Ok(decision),
        other => Err(wrong_kind(service, path, "selector", &other)),
    }
}
