//! Argument specs
//!
//! A configuration value describing how to obtain one constructor argument.
//! Sigils are inspected once when the configuration is loaded:
//!
//! - `@name` service reference
//! - `%a.b.c%` application configuration path
//! - `$NAME` (or `$NAME$`) environment variable, `["$NAME", default]` with a default
//! - `^module.Member` symbol, returned uninvoked
//! - any other sequence is resolved element-wise, everything else is a literal

use serde_json::Value as Json;

use crate::errors::{ProviderError, Result, SymbolError};
use crate::infrastructure::env::EnvSource;
use crate::infrastructure::registry::Symbol;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSpec {
    Literal(Json),
    Service(String),
    ConfigPath(String),
    Env {
        name: String,
        default: Option<Box<ArgumentSpec>>,
    },
    Symbol(String),
    List(Vec<ArgumentSpec>),
}

impl ArgumentSpec {
    pub fn parse(raw: &Json) -> Self {
        match raw {
            Json::String(s) => Self::parse_str(s),
            Json::Array(items) => match items.first() {
                Some(Json::String(first)) if first.starts_with('$') => ArgumentSpec::Env {
                    name: env_name(first).to_string(),
                    default: items.get(1).map(|d| Box::new(Self::parse(d))),
                },
                _ => ArgumentSpec::List(items.iter().map(Self::parse).collect()),
            },
            other => ArgumentSpec::Literal(other.clone()),
        }
    }

    fn parse_str(s: &str) -> Self {
        if let Some(name) = s.strip_prefix('@') {
            ArgumentSpec::Service(name.to_string())
        } else if s.len() >= 2 && s.starts_with('%') && s.ends_with('%') {
            ArgumentSpec::ConfigPath(s[1..s.len() - 1].to_string())
        } else if s.starts_with('$') {
            ArgumentSpec::Env {
                name: env_name(s).to_string(),
                default: None,
            }
        } else if let Some(path) = s.strip_prefix('^') {
            ArgumentSpec::Symbol(path.to_string())
        } else {
            ArgumentSpec::Literal(Json::String(s.to_string()))
        }
    }

    pub fn resolve(&self, cx: &mut dyn ResolveContext) -> Result<Value> {
        tracing::trace!(argument = ?self, "Resolving argument");
        match self {
            ArgumentSpec::Literal(data) => Ok(Value::Data(data.clone())),
            ArgumentSpec::Service(name) => cx.service(name),
            ArgumentSpec::ConfigPath(path) => {
                lookup_config_path(cx.app_config(), path).map(|data| Value::Data(data.clone()))
            }
            ArgumentSpec::Env { name, default } => match cx.env().var(name) {
                Some(value) => Ok(Value::from(value)),
                None => match default {
                    Some(default) => default.resolve(cx),
                    None => Ok(Value::null()),
                },
            },
            ArgumentSpec::Symbol(path) => Ok(cx.symbol(path)?.into_value()),
            ArgumentSpec::List(items) => items
                .iter()
                .map(|item| item.resolve(cx))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
        }
    }

    /// Every spec nested in this one, including itself, depth first.
    pub fn walk(&self) -> Vec<&ArgumentSpec> {
        let mut out = vec![self];
        match self {
            ArgumentSpec::Env {
                default: Some(default),
                ..
            } => out.extend(default.walk()),
            ArgumentSpec::List(items) => {
                for item in items {
                    out.extend(item.walk());
                }
            }
            _ => {}
        }
        out
    }
}

fn env_name(raw: &str) -> &str {
    let name = raw.strip_prefix('$').unwrap_or(raw);
    name.strip_suffix('$').unwrap_or(name)
}

/// What argument resolution needs from the engine.
pub trait ResolveContext {
    fn service(&mut self, name: &str) -> Result<Value>;
    fn app_config(&self) -> &Json;
    fn env(&self) -> &dyn EnvSource;
    fn symbol(&self, path: &str) -> std::result::Result<Symbol, SymbolError>;
}

/// Walk a dotted path through nested mappings of the application configuration.
pub fn lookup_config_path<'a>(app: &'a Json, path: &str) -> Result<&'a Json> {
    let mut current = app;
    for segment in path.split('.') {
        current = current
            .as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| ProviderError::BadConfigurationPath {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
    }
    Ok(current)
}
