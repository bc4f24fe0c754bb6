//! Selector services choose, at call time, which other service to delegate to.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{ProviderError, Result};
use crate::infrastructure::registry::Decision;
use crate::types::Value;

/// Named argument carrying the fallback service name.
pub const DEFAULT_PARAM: &str = "default";
/// Named argument handed to the decision function.
pub const KEY_PARAM: &str = "key";
/// Named argument switching to boolean (`on`/`off`) mode.
pub const IS_BOOL_PARAM: &str = "is_bool";

/// Evaluates `selector(key)` and maps the outcome to a service name.
#[derive(Clone)]
pub struct ServiceSelector {
    name: String,
    selector: Decision,
    key: Value,
    default: String,
    is_bool: bool,
    options: BTreeMap<String, String>,
}

impl ServiceSelector {
    /// Validates the parameters before any decision is evaluated.
    pub fn new(
        name: impl Into<String>,
        selector: Decision,
        key: Value,
        default: Option<String>,
        is_bool: bool,
        options: BTreeMap<String, String>,
    ) -> Result<Self> {
        let name = name.into();
        let missing = |parameter| ProviderError::MissingParameter {
            selector: name.clone(),
            parameter,
        };

        let default = default
            .filter(|d| !d.is_empty())
            .ok_or_else(|| missing(DEFAULT_PARAM))?;
        if is_bool {
            if !options.contains_key("on") {
                return Err(missing("on"));
            }
        } else if options.is_empty() {
            return Err(missing("options"));
        }

        Ok(Self {
            name,
            selector,
            key,
            default,
            is_bool,
            options,
        })
    }

    /// Build a selector from resolved named arguments: `default`, `key`,
    /// `is_bool`, and every other entry as an option. The default and every
    /// option must resolve to a service name; a null default counts as absent.
    pub fn from_arguments(
        name: impl Into<String>,
        selector: Decision,
        mut named: BTreeMap<String, Value>,
    ) -> Result<Self> {
        let name = name.into();
        let key = named.remove(KEY_PARAM).unwrap_or_else(Value::null);
        let default = named
            .remove(DEFAULT_PARAM)
            .filter(|d| !d.is_null())
            .map(|d| target_name(&name, DEFAULT_PARAM, &d))
            .transpose()?;
        let is_bool = named
            .remove(IS_BOOL_PARAM)
            .map_or(false, |flag| flag.is_truthy());
        let options = named
            .iter()
            .map(|(option, target)| Ok((option.clone(), target_name(&name, option, target)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Self::new(name, selector, key, default, is_bool, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bool(&self) -> bool {
        self.is_bool
    }

    /// Evaluate the decision function and return the chosen service name.
    pub fn select(&self) -> &str {
        let outcome = (self.selector)(&self.key);
        let chosen = if self.is_bool {
            let flag = if outcome.is_truthy() { "on" } else { "off" };
            self.options.get(flag)
        } else {
            outcome
                .selection_key()
                .and_then(|key| self.options.get(&key))
        };
        let target = chosen.unwrap_or(&self.default);
        tracing::trace!(selector = %self.name, outcome = ?outcome, chosen = %target, "Selector evaluated");
        target
    }
}

fn target_name(selector: &str, parameter: &str, target: &Value) -> Result<String> {
    target
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidDeclaration {
            service: selector.to_string(),
            reason: format!("selector parameter '{parameter}' must name a service, found {target:?}"),
        })
}

impl fmt::Debug for ServiceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSelector")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("default", &self.default)
            .field("is_bool", &self.is_bool)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn selector(
        outcome: Value,
        is_bool: bool,
        default: Option<&str>,
        opts: &[(&str, &str)],
    ) -> Result<ServiceSelector> {
        ServiceSelector::new(
            "test",
            Arc::new(move |_: &Value| outcome.clone()),
            Value::from("xxx"),
            default.map(str::to_string),
            is_bool,
            options(opts),
        )
    }

    #[test]
    fn test_selection_value_matches_options() {
        let s = selector(
            Value::from("v1"),
            false,
            Some("default-service"),
            &[("v1", "service-1"), ("v2", "service-2")],
        )
        .unwrap();
        assert_eq!(s.select(), "service-1");
    }

    #[test]
    fn test_selection_value_doesnt_match_uses_default() {
        let s = selector(
            Value::from("zzzz"),
            false,
            Some("default-service"),
            &[("v1", "service-1"), ("v2", "service-2")],
        )
        .unwrap();
        assert_eq!(s.select(), "default-service");
    }

    #[test]
    fn test_selection_is_bool_on_and_off() {
        let opts = [("on", "service-1"), ("off", "service-2")];
        let on = selector(Value::from(true), true, Some("default-service"), &opts).unwrap();
        assert_eq!(on.select(), "service-1");
        let off = selector(Value::from(false), true, Some("default-service"), &opts).unwrap();
        assert_eq!(off.select(), "service-2");
    }

    #[test]
    fn test_selection_is_bool_without_off_uses_default() {
        let s = selector(Value::null(), true, Some("default-service"), &[("on", "service-1")]).unwrap();
        assert_eq!(s.select(), "default-service");
    }

    #[test]
    fn test_decision_receives_key() {
        let s = ServiceSelector::new(
            "test",
            Arc::new(|key: &Value| Value::from(key.as_str() == Some("xxx"))),
            Value::from("xxx"),
            Some("default-service".to_string()),
            true,
            options(&[("on", "service-1")]),
        )
        .unwrap();
        assert_eq!(s.select(), "service-1");
    }

    #[test]
    fn test_missing_parameters() {
        let cases: [(Option<&str>, bool, &[(&str, &str)], &str); 4] = [
            (None, false, &[("v1", "service-1")], "default"),
            (Some(""), false, &[("v1", "service-1")], "default"),
            (Some("default-service"), false, &[], "options"),
            (Some("default-service"), true, &[("off", "service-2")], "on"),
        ];
        for (default, is_bool, opts, expected) in cases {
            match selector(Value::from(true), is_bool, default, opts) {
                Err(ProviderError::MissingParameter { parameter, .. }) => {
                    assert_eq!(parameter, expected)
                }
                other => panic!("expected MissingParameter({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_arguments() {
        let named: BTreeMap<String, Value> = [
            ("default", Value::from("test.version-1")),
            ("key", Value::from("v2")),
            ("v1", Value::from("test.version-1")),
            ("v2", Value::from("test.version-2")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let s = ServiceSelector::from_arguments("test", Arc::new(|key: &Value| key.clone()), named)
            .unwrap();
        assert!(!s.is_bool());
        assert_eq!(s.select(), "test.version-2");
    }

    #[test]
    fn test_from_arguments_rejects_non_string_targets() {
        let decision: Decision = Arc::new(|key: &Value| key.clone());
        let cases = [
            ("v1", Value::from(1_i64)),
            ("v1", Value::object(String::from("built service"))),
            ("default", Value::from(true)),
        ];
        for (parameter, target) in cases {
            let mut named: BTreeMap<String, Value> = [
                ("default", Value::from("d")),
                ("key", Value::from("no")),
                ("v2", Value::from("service-2")),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            named.insert(parameter.to_string(), target);

            match ServiceSelector::from_arguments("obj", Arc::clone(&decision), named) {
                Err(ProviderError::InvalidDeclaration { service, reason }) => {
                    assert_eq!(service, "obj");
                    assert!(reason.contains(&format!("'{parameter}'")), "{reason}");
                }
                other => panic!("expected InvalidDeclaration for {parameter}, got {other:?}"),
            }
        }
    }
}
