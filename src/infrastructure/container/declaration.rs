//! Service declarations parsed from the configuration tree.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use super::arguments::ArgumentSpec;
use super::namespace::NameTree;
use crate::errors::{ProviderError, Result};

/// Service configuration tree: service name -> declaration.
pub type ServiceTree = serde_json::Map<String, Json>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationMethod {
    Instance(String),
    Class(String),
    Factory(String),
    Selector(String),
}

impl CreationMethod {
    pub const KEYS: [&'static str; 4] = ["instance", "class", "factory", "selector"];

    fn from_key(key: &str, path: String) -> Option<Self> {
        match key {
            "instance" => Some(CreationMethod::Instance(path)),
            "class" => Some(CreationMethod::Class(path)),
            "factory" => Some(CreationMethod::Factory(path)),
            "selector" => Some(CreationMethod::Selector(path)),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            CreationMethod::Instance(_) => "instance",
            CreationMethod::Class(_) => "class",
            CreationMethod::Factory(_) => "factory",
            CreationMethod::Selector(_) => "selector",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            CreationMethod::Instance(p)
            | CreationMethod::Class(p)
            | CreationMethod::Factory(p)
            | CreationMethod::Selector(p) => p,
        }
    }
}

/// How to build one service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declaration {
    creation: Vec<CreationMethod>,
    arguments: Vec<ArgumentSpec>,
    named_arguments: BTreeMap<String, ArgumentSpec>,
}

impl Declaration {
    /// Parse a declaration. Shape errors fail here; creation-key counting is
    /// left to [`Declaration::creation_method`] so it fails on `get`.
    pub fn parse(service: &str, raw: &Json) -> Result<Self> {
        let map = match raw {
            Json::Null => return Ok(Self::default()),
            Json::Object(map) => map,
            other => {
                return Err(invalid(
                    service,
                    format!("expected a mapping, found {}", json_kind(other)),
                ))
            }
        };

        let mut creation = Vec::new();
        for key in CreationMethod::KEYS {
            if let Some(value) = map.get(key) {
                let path = value.as_str().ok_or_else(|| {
                    invalid(service, format!("'{key}' must be a string, found {}", json_kind(value)))
                })?;
                creation.extend(CreationMethod::from_key(key, path.to_string()));
            }
        }

        let arguments = match map.get("arguments") {
            None | Some(Json::Null) => Vec::new(),
            Some(Json::Array(items)) => items.iter().map(ArgumentSpec::parse).collect(),
            Some(other) => {
                return Err(invalid(
                    service,
                    format!("'arguments' must be a sequence, found {}", json_kind(other)),
                ))
            }
        };

        let named_arguments = match map.get("named_arguments") {
            None | Some(Json::Null) => BTreeMap::new(),
            Some(Json::Object(items)) => items
                .iter()
                .map(|(k, v)| (k.clone(), ArgumentSpec::parse(v)))
                .collect(),
            Some(other) => {
                return Err(invalid(
                    service,
                    format!("'named_arguments' must be a mapping, found {}", json_kind(other)),
                ))
            }
        };

        Ok(Self {
            creation,
            arguments,
            named_arguments,
        })
    }

    /// The single creation method, or the counting error.
    pub fn creation_method(&self, service: &str) -> Result<&CreationMethod> {
        match self.creation.as_slice() {
            [] => Err(ProviderError::NoCreationMethodFound(service.to_string())),
            [method] => Ok(method),
            many => Err(ProviderError::MultipleCreationMethodsFound {
                service: service.to_string(),
                methods: many.iter().map(CreationMethod::key).collect(),
            }),
        }
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn named_arguments(&self) -> &BTreeMap<String, ArgumentSpec> {
        &self.named_arguments
    }

    /// Every argument spec of the declaration, nested ones included.
    pub fn argument_specs(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments
            .iter()
            .chain(self.named_arguments.values())
            .flat_map(ArgumentSpec::walk)
    }
}

/// Key of an entry that names another declaration instead of defining one.
pub const ALIAS_KEY: &str = "alias";

/// The parsed configuration: declarations, aliases, application tree and
/// name tree.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    declarations: BTreeMap<String, Declaration>,
    aliases: BTreeMap<String, String>,
    app: Json,
    names: NameTree,
}

impl Catalog {
    /// Parse every entry. `{"alias": "other"}` entries must point at a
    /// declared service, never at another alias.
    pub fn parse(services: &ServiceTree, app: Option<Json>) -> Result<Self> {
        let mut declarations = BTreeMap::new();
        let mut aliases = BTreeMap::new();
        for (name, raw) in services {
            match alias_target(name, raw)? {
                Some(target) => {
                    aliases.insert(name.clone(), target);
                }
                None => {
                    declarations.insert(name.clone(), Declaration::parse(name, raw)?);
                }
            }
        }

        if let Some((alias, target)) = aliases
            .iter()
            .find(|(_, target)| !declarations.contains_key(*target))
        {
            return Err(invalid(
                alias,
                format!("alias target \"{target}\" is not a declared service"),
            ));
        }

        let names = NameTree::from_names(
            declarations
                .keys()
                .chain(aliases.keys())
                .map(String::as_str),
        );
        Ok(Self {
            declarations,
            aliases,
            app: app.unwrap_or(Json::Null),
            names,
        })
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(self.canonical(name)?)
    }

    /// The declared name behind `name`, following an alias.
    pub fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if let Some(target) = self.aliases.get(name) {
            return Some(target.as_str());
        }
        self.declarations.contains_key(name).then_some(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.contains_key(name) || self.aliases.contains_key(name)
    }


    pub fn declarations(&self) -> impl Iterator<Item = (&String, &Declaration)> {
        self.declarations.iter()
    }

    pub fn app(&self) -> &Json {
        &self.app
    }

    pub fn names(&self) -> &NameTree {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

fn alias_target(service: &str, raw: &Json) -> Result<Option<String>> {
    let Some(map) = raw.as_object() else {
        return Ok(None);
    };
    let Some(target) = map.get(ALIAS_KEY) else {
        return Ok(None);
    };
    if map.len() > 1 {
        return Err(invalid(
            service,
            format!("'{ALIAS_KEY}' cannot be combined with other keys"),
        ));
    }
    target.as_str().map(|t| Some(t.to_string())).ok_or_else(|| {
        invalid(
            service,
            format!("'{ALIAS_KEY}' must be a string, found {}", json_kind(target)),
        )
    })
}

fn invalid(service: &str, reason: String) -> ProviderError {
    ProviderError::InvalidDeclaration {
        service: service.to_string(),
        reason,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "a sequence",
        Json::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_class_declaration() {
        let decl = Declaration::parse(
            "svc",
            &json!({
                "class": "app.Salutation",
                "arguments": ["World!", "@other"],
                "named_arguments": {"default": "$USER"}
            }),
        )
        .unwrap();
        assert_eq!(
            decl.creation_method("svc").unwrap(),
            &CreationMethod::Class("app.Salutation".to_string())
        );
        assert_eq!(decl.arguments().len(), 2);
        assert!(decl.named_arguments().contains_key("default"));
        assert_eq!(decl.argument_specs().count(), 3);
    }

    #[test]
    fn test_empty_declarations_fail_on_lookup() {
        for raw in [json!(null), json!({}), json!({"arguments": [1]})] {
            let decl = Declaration::parse("svc", &raw).unwrap();
            assert!(matches!(
                decl.creation_method("svc"),
                Err(ProviderError::NoCreationMethodFound(name)) if name == "svc"
            ));
        }
    }

    #[test]
    fn test_multiple_creation_methods() {
        let decl = Declaration::parse("svc", &json!({"class": "a.B", "factory": "a.F"})).unwrap();
        match decl.creation_method("svc") {
            Err(ProviderError::MultipleCreationMethodsFound { methods, .. }) => {
                assert_eq!(methods, vec!["class", "factory"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_shapes() {
        let cases = [
            json!("a string"),
            json!({"class": 5}),
            json!({"class": "a.B", "arguments": "nope"}),
            json!({"class": "a.B", "named_arguments": ["x"]}),
        ];
        for raw in cases {
            assert!(matches!(
                Declaration::parse("svc", &raw),
                Err(ProviderError::InvalidDeclaration { .. })
            ));
        }
    }

    #[test]
    fn test_catalog_names() {
        let services = json!({
            "root": {"class": "a.B"},
            "ns.one": {"class": "a.B"},
            "ns.sub.two": {"class": "a.B"}
        });
        let catalog = Catalog::parse(services.as_object().unwrap(), None).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains("ns.sub.two"));
        assert_eq!(catalog.names().service_names(), ["root".to_string()]);
        assert!(catalog.app().is_null());
    }

    #[test]
    fn test_catalog_aliases() {
        let services = json!({
            "ns-a.db-client": {"class": "a.B"},
            "ns_a.db_client": {"alias": "ns-a.db-client"}
        });
        let catalog = Catalog::parse(services.as_object().unwrap(), None).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("ns_a.db_client"));
        assert_eq!(catalog.canonical("ns_a.db_client"), Some("ns-a.db-client"));
        assert_eq!(catalog.canonical("ns-a.db-client"), Some("ns-a.db-client"));
        assert_eq!(catalog.canonical("missing"), None);
        assert!(catalog.declaration("ns_a.db_client").is_some());
        let namespaces: Vec<_> = catalog.names().namespaces().collect();
        assert_eq!(namespaces, vec!["ns-a", "ns_a"]);
    }

    #[test]
    fn test_invalid_aliases() {
        let cases = [
            json!({"a": {"alias": "missing"}}),
            json!({"a": {"alias": 5}}),
            json!({"a": {"class": "x.Y"}, "b": {"alias": "a", "class": "x.Y"}}),
            json!({"a": {"class": "x.Y"}, "b": {"alias": "a"}, "c": {"alias": "b"}}),
        ];
        for services in cases {
            assert!(matches!(
                Catalog::parse(services.as_object().unwrap(), None),
                Err(ProviderError::InvalidDeclaration { .. })
            ));
        }
    }
}
