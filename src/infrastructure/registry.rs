//! 符号注册表
//!
//! Classes, factories, decision functions and constants are registered under
//! dotted paths (`module.path.Member`) at startup. Declarations refer to them
//! by path; the registry replaces module introspection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::{BoxError, SymbolError};
use crate::types::{Instance, Value};

/// Positional and named arguments handed to a constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>, named: BTreeMap<String, Value>) -> Self {
        Self { positional, named }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named_arg(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Parameter binding: the positional slot `index` or, failing that, the
    /// named argument `name`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.arg(index).or_else(|| self.named_arg(name))
    }

    /// Like [`Arguments::get`] but reports a missing parameter as an error.
    pub fn require(&self, index: usize, name: &str) -> Result<&Value, BoxError> {
        self.get(index, name)
            .ok_or_else(|| format!("missing required argument '{name}' (position {index})").into())
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Value>, BTreeMap<String, Value>) {
        (self.positional, self.named)
    }
}

/// A constructible type: instantiated with resolved arguments.
pub trait Constructor: Send + Sync {
    fn construct(&self, args: Arguments) -> Result<Instance, BoxError>;

    /// 获取类型名称（用于错误信息）
    fn type_name(&self) -> &'static str;
}

/// The object produced by a factory type. `build` yields the service.
pub trait ServiceFactory: Send + Sync {
    fn build(&self) -> Result<Value, BoxError>;
}

/// A factory type: instantiated with resolved arguments, then built.
pub trait FactoryConstructor: Send + Sync {
    fn instantiate(&self, args: Arguments) -> Result<Box<dyn ServiceFactory>, BoxError>;

    fn type_name(&self) -> &'static str;
}

/// Decision function of a selector service.
pub type Decision = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Closure-backed constructor.
pub struct FnConstructor<F, T> {
    constructor_fn: F,
    type_name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T> FnConstructor<F, T> {
    pub fn new(constructor_fn: F) -> Self {
        Self {
            constructor_fn,
            type_name: std::any::type_name::<T>(),
            _phantom: PhantomData,
        }
    }
}

impl<F, T> Constructor for FnConstructor<F, T>
where
    F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn construct(&self, args: Arguments) -> Result<Instance, BoxError> {
        let service = (self.constructor_fn)(args)?;
        Ok(Arc::new(service))
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Closure-backed factory type.
pub struct FnFactory<F, T> {
    factory_fn: F,
    type_name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T> FnFactory<F, T> {
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            type_name: std::any::type_name::<T>(),
            _phantom: PhantomData,
        }
    }
}

impl<F, T> FactoryConstructor for FnFactory<F, T>
where
    F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    T: ServiceFactory + 'static,
{
    fn instantiate(&self, args: Arguments) -> Result<Box<dyn ServiceFactory>, BoxError> {
        let factory = (self.factory_fn)(args)?;
        Ok(Box::new(factory))
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Anything a dotted path can name.
#[derive(Clone)]
pub enum Symbol {
    Class(Arc<dyn Constructor>),
    Factory(Arc<dyn FactoryConstructor>),
    Selector(Decision),
    Constant(Value),
    Table(Arc<BTreeMap<String, Symbol>>),
}

impl Symbol {
    pub fn class<T, F>(constructor: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Symbol::Class(Arc::new(FnConstructor::new(constructor)))
    }

    pub fn factory<T, F>(factory: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: ServiceFactory + 'static,
    {
        Symbol::Factory(Arc::new(FnFactory::new(factory)))
    }

    pub fn selector<F>(decision: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Symbol::Selector(Arc::new(decision))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Symbol::Constant(value.into())
    }

    pub fn object<T: Send + Sync + 'static>(object: T) -> Self {
        Symbol::Constant(Value::object(object))
    }

    pub fn table<K: Into<String>>(entries: impl IntoIterator<Item = (K, Symbol)>) -> Self {
        Symbol::Table(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Class(_) => "class",
            Symbol::Factory(_) => "factory",
            Symbol::Selector(_) => "selector",
            Symbol::Constant(_) => "constant",
            Symbol::Table(_) => "table",
        }
    }

    /// The value handed out when the symbol is referenced without being invoked.
    pub fn into_value(self) -> Value {
        match self {
            Symbol::Constant(value) => value,
            other => Value::Symbol(Box::new(other)),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class(c) => write!(f, "Class({})", c.type_name()),
            Symbol::Factory(c) => write!(f, "Factory({})", c.type_name()),
            Symbol::Selector(_) => f.write_str("Selector(..)"),
            Symbol::Constant(v) => write!(f, "Constant({v:?})"),
            Symbol::Table(t) => f.debug_map().entries(t.iter()).finish(),
        }
    }
}

/// Registry of symbols, grouped by module path.
#[derive(Clone, Default)]
pub struct SymbolRegistry {
    modules: Arc<DashMap<String, HashMap<String, Symbol>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `symbol` under a dotted path; the last segment is the member name.
    pub fn register(&self, path: &str, symbol: Symbol) {
        let (module, member) = split_path(path);
        tracing::trace!(module, member, kind = symbol.kind(), "Registering symbol");
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(member.to_string(), symbol);
    }

    pub fn register_class<T, F>(&self, path: &str, constructor: F)
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.register(path, Symbol::class(constructor));
    }

    pub fn register_factory<T, F>(&self, path: &str, factory: F)
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: ServiceFactory + 'static,
    {
        self.register(path, Symbol::factory(factory));
    }

    pub fn register_selector<F>(&self, path: &str, decision: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.register(path, Symbol::selector(decision));
    }

    pub fn register_constant(&self, path: &str, value: impl Into<Value>) {
        self.register(path, Symbol::constant(value));
    }

    pub fn register_object<T: Send + Sync + 'static>(&self, path: &str, object: T) {
        self.register(path, Symbol::object(object));
    }

    pub fn register_table<K: Into<String>>(
        &self,
        path: &str,
        entries: impl IntoIterator<Item = (K, Symbol)>,
    ) {
        self.register(path, Symbol::table(entries));
    }

    /// Scope for registering several members of one module.
    pub fn module(&self, module: &str) -> ModuleScope<'_> {
        ModuleScope {
            registry: self,
            module: module.to_string(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolve a dotted path, optionally ending in a `["key"]` table index.
    pub fn resolve(&self, path: &str) -> Result<Symbol, SymbolError> {
        let (module_name, member) = split_path(path);
        let module = self
            .modules
            .get(module_name)
            .ok_or_else(|| SymbolError::ModuleNotFound(module_name.to_string()))?;

        let (name, key) = parse_member(member);
        let symbol = module
            .get(name)
            .ok_or_else(|| SymbolError::NameNotFound {
                module: module_name.to_string(),
                name: name.to_string(),
            })?;

        match key {
            None => Ok(symbol.clone()),
            Some(key) => match symbol {
                Symbol::Table(table) => {
                    table
                        .get(key)
                        .cloned()
                        .ok_or_else(|| SymbolError::KeyNotFound {
                            table: name.to_string(),
                            key: key.to_string(),
                        })
                }
                _ => Err(SymbolError::NotATable(name.to_string())),
            },
        }
    }
}

impl fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("modules", &self.modules.len())
            .finish()
    }
}

/// Registers members under a fixed module path.
pub struct ModuleScope<'a> {
    registry: &'a SymbolRegistry,
    module: String,
}

impl ModuleScope<'_> {
    fn path(&self, name: &str) -> String {
        if self.module.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.module, name)
        }
    }

    pub fn symbol(self, name: &str, symbol: Symbol) -> Self {
        self.registry.register(&self.path(name), symbol);
        self
    }

    pub fn class<T, F>(self, name: &str, constructor: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.symbol(name, Symbol::class(constructor))
    }

    pub fn factory<T, F>(self, name: &str, factory: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
        T: ServiceFactory + 'static,
    {
        self.symbol(name, Symbol::factory(factory))
    }

    pub fn selector<F>(self, name: &str, decision: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.symbol(name, Symbol::selector(decision))
    }

    pub fn constant(self, name: &str, value: impl Into<Value>) -> Self {
        self.symbol(name, Symbol::constant(value))
    }

    pub fn object<T: Send + Sync + 'static>(self, name: &str, object: T) -> Self {
        self.symbol(name, Symbol::object(object))
    }
}

fn split_path(path: &str) -> (&str, &str) {
    // `["key"]` never contains a dot, so the last dot separates module and member.
    path.rsplit_once('.').unwrap_or(("", path))
}

/// Split `NAME["key"]` into (`NAME`, `key`). Keys are `[A-Za-z0-9_-]+`.
fn parse_member(member: &str) -> (&str, Option<&str>) {
    let Some(inner) = member.strip_suffix("\"]") else {
        return (member, None);
    };
    let Some((name, key)) = inner.split_once("[\"") else {
        return (member, None);
    };
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if valid && !name.is_empty() {
        (name, Some(key))
    } else {
        (member, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter {
        greeting: String,
    }

    fn registry() -> SymbolRegistry {
        let registry = SymbolRegistry::new();
        registry
            .module("app.greetings")
            .class("Greeter", |args: Arguments| {
                let greeting = args.require(0, "greeting")?.as_str().unwrap_or("hi").to_string();
                Ok(Greeter { greeting })
            })
            .constant("ANSWER", "42 is the answer");
        registry.register_table(
            "app.greetings.BY_LANG",
            [("en", Symbol::constant("hello")), ("fr-FR", Symbol::constant("bonjour"))],
        );
        registry
    }

    #[test]
    fn test_resolve_class_and_construct() {
        let registry = registry();
        let Symbol::Class(ctor) = registry.resolve("app.greetings.Greeter").unwrap() else {
            panic!("expected a class");
        };
        let instance = ctor
            .construct(Arguments::new(vec![Value::from("hey")], BTreeMap::new()))
            .unwrap();
        let greeter = instance.downcast::<Greeter>().unwrap();
        assert_eq!(greeter.greeting, "hey");
        assert!(ctor.type_name().ends_with("Greeter"));
    }

    #[test]
    fn test_resolve_constant() {
        let symbol = registry().resolve("app.greetings.ANSWER").unwrap();
        assert_eq!(symbol.into_value().as_str(), Some("42 is the answer"));
    }

    #[test]
    fn test_table_lookup() {
        let registry = registry();
        let symbol = registry.resolve("app.greetings.BY_LANG[\"fr-FR\"]").unwrap();
        assert_eq!(symbol.into_value().as_str(), Some("bonjour"));

        let err = registry.resolve("app.greetings.BY_LANG[\"de\"]").unwrap_err();
        assert_eq!(
            err,
            SymbolError::KeyNotFound {
                table: "BY_LANG".to_string(),
                key: "de".to_string()
            }
        );

        let err = registry.resolve("app.greetings.ANSWER[\"x\"]").unwrap_err();
        assert_eq!(err, SymbolError::NotATable("ANSWER".to_string()));
    }

    #[test]
    fn test_lookup_failures() {
        let registry = registry();
        assert_eq!(
            registry.resolve("app.missing.Greeter").unwrap_err(),
            SymbolError::ModuleNotFound("app.missing".to_string())
        );
        assert_eq!(
            registry.resolve("app.greetings.Undefined").unwrap_err(),
            SymbolError::NameNotFound {
                module: "app.greetings".to_string(),
                name: "Undefined".to_string()
            }
        );
        assert!(!registry.contains("Greeter"));
    }

    #[test]
    fn test_missing_required_argument() {
        let registry = registry();
        let Symbol::Class(ctor) = registry.resolve("app.greetings.Greeter").unwrap() else {
            panic!("expected a class");
        };
        let err = ctor.construct(Arguments::default()).err().unwrap();
        assert!(err.to_string().contains("greeting"));
    }

    #[test]
    fn test_parse_member() {
        assert_eq!(parse_member("NAME"), ("NAME", None));
        assert_eq!(parse_member("NAME[\"a_b-c\"]"), ("NAME", Some("a_b-c")));
        assert_eq!(parse_member("NAME[\"a b\"]"), ("NAME[\"a b\"]", None));
        assert_eq!(parse_member("[\"a\"]"), ("[\"a\"]", None));
    }
}
