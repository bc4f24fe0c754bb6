//! Runtime values flowing through the container.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::infrastructure::registry::Symbol;

/// A constructed service or registered object, shared and type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A resolved argument or service value.
#[derive(Clone)]
pub enum Value {
    /// Literal data, environment values and application configuration lookups.
    Data(serde_json::Value),
    /// A constructed service or a registered object.
    Object(Instance),
    /// An uninvoked class, factory or decision function.
    Symbol(Box<Symbol>),
    /// Element-wise resolved sequence.
    List(Vec<Value>),
}

impl Value {
    pub const fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn object<T: Send + Sync + 'static>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    /// Python-like truthiness: empty and zero values are falsy, objects are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Data(data) => match data {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
                serde_json::Value::String(s) => !s.is_empty(),
                serde_json::Value::Array(items) => !items.is_empty(),
                serde_json::Value::Object(map) => !map.is_empty(),
            },
            Value::Object(_) | Value::Symbol(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(serde_json::Value::as_bool)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(symbol) => Some(symbol.as_ref()),
            _ => None,
        }
    }

    /// Downcast an object value to its concrete type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Value::Object(instance) => Arc::clone(instance).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Identity comparison for object values.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Key used when a value is matched against selector options.
    pub fn selection_key(&self) -> Option<String> {
        match self.as_data()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(data) => write!(f, "Data({data})"),
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Symbol(symbol) => write!(f, "Symbol({})", symbol.kind()),
            Value::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

/// Structural equality for data and lists, identity for objects.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(_), Value::Object(_)) => self.same_object(other),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Value::Data(data)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(serde_json::Value::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Data(serde_json::Value::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Data(serde_json::Value::from(n))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
