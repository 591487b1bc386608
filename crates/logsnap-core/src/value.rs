//! # Host values
//!
//! The runtime extension captures variables for us; this module is the shape it
//! hands them over in. A value is one of a closed set of kinds and every
//! consumer dispatches with a `match`, so there is no runtime type inspection
//! anywhere in the pipeline.
//!
//! ## Cycles
//!
//! Object graphs in the host language can be cyclic. The extension breaks the
//! cycle before handing the value over: the second time it meets an object it
//! emits a [`Value::Reference`] carrying the same handle instead of expanding it
//! again. Values are therefore always finite trees, and the renderer only has to
//! recognise references (and repeated handles on its ancestor path).

use std::fmt;

/// A captured host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    String(String),
    /// List with implicit `0..n` keys
    Sequence(Vec<Value>),
    /// Ordered map with explicit keys
    Mapping(Vec<(Key, Value)>),
    /// Object instance
    Object(ObjectValue),
    /// Back-reference to an object that is already being described
    Reference
    {
        /// Class of the referenced object
        class: String,
        /// Identity handle of the referenced object
        handle: u64,
    },
    /// Something the extension could not capture (resources, closures, ...)
    Opaque
    {
        /// Host type name, used as the rendering
        type_name: String,
    },
}

/// Key of a [`Value::Mapping`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key
{
    /// Integer key
    Int(i64),
    /// String key
    Str(String),
}

impl fmt::Display for Key
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Int(key) => write!(f, "{key}"),
            Self::Str(key) => write!(f, "\"{key}\""),
        }
    }
}

impl From<&str> for Key
{
    fn from(key: &str) -> Self
    {
        Self::Str(key.to_string())
    }
}

impl From<i64> for Key
{
    fn from(key: i64) -> Self
    {
        Self::Int(key)
    }
}

/// Object instance: class, optional identity handle and ordered properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue
{
    /// Class name
    pub class: String,
    /// Identity handle, when the host exposes one
    pub handle: Option<u64>,
    /// Properties in declaration order
    pub properties: Vec<(String, Value)>,
}

impl ObjectValue
{
    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value>
    {
        self.properties.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }
}

impl Value
{
    /// Build an object value.
    pub fn object<I, K>(class: impl Into<String>, handle: Option<u64>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Object(ObjectValue {
            class: class.into(),
            handle,
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Build a mapping from `(key, value)` pairs.
    pub fn mapping<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Key>,
    {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Opaque placeholder for a value of the given host type.
    pub fn opaque(type_name: impl Into<String>) -> Self
    {
        Self::Opaque {
            type_name: type_name.into(),
        }
    }

    /// Host-facing type name of the value.
    #[must_use]
    pub fn type_name(&self) -> &str
    {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) | Self::Mapping(_) => "array",
            Self::Object(object) => &object.class,
            Self::Reference { class, .. } => class,
            Self::Opaque { type_name } => type_name,
        }
    }

    /// Borrow the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value
{
    fn from(value: bool) -> Self
    {
        Self::Bool(value)
    }
}

impl From<i64> for Value
{
    fn from(value: i64) -> Self
    {
        Self::Int(value)
    }
}

impl From<i32> for Value
{
    fn from(value: i32) -> Self
    {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value
{
    fn from(value: f64) -> Self
    {
        Self::Float(value)
    }
}

impl From<&str> for Value
{
    fn from(value: &str) -> Self
    {
        Self::String(value.to_string())
    }
}

impl From<String> for Value
{
    fn from(value: String) -> Self
    {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value
{
    fn from(value: Vec<Value>) -> Self
    {
        Self::Sequence(value)
    }
}

/// Marker keys used when a capture is recorded as plain JSON.
///
/// `{"__class": "Cart", "__handle": 3, "items": [...]}` is an object,
/// `{"__ref": 3, "__class": "Cart"}` a back-reference and
/// `{"__opaque": "resource"}` an uncapturable value.
pub mod json_markers
{
    /// Class name of an object
    pub const CLASS: &str = "__class";
    /// Identity handle of an object
    pub const HANDLE: &str = "__handle";
    /// Handle of a back-reference
    pub const REFERENCE: &str = "__ref";
    /// Type name of an opaque value
    pub const OPAQUE: &str = "__opaque";
}

impl From<serde_json::Value> for Value
{
    fn from(json: serde_json::Value) -> Self
    {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Json::Object(mut map) => {
                if let Some(Json::String(type_name)) = map.get(json_markers::OPAQUE) {
                    return Self::opaque(type_name.clone());
                }

                let class = match map.shift_remove(json_markers::CLASS) {
                    Some(Json::String(class)) => Some(class),
                    _ => None,
                };

                if let Some(handle) = map.get(json_markers::REFERENCE).and_then(Json::as_u64) {
                    return Self::Reference {
                        class: class.unwrap_or_else(|| "object".to_string()),
                        handle,
                    };
                }

                match class {
                    Some(class) => {
                        let handle = map.shift_remove(json_markers::HANDLE).and_then(|h| h.as_u64());
                        Self::object(class, handle, map.into_iter().map(|(k, v)| (k, Self::from(v))))
                    }
                    None => Self::Mapping(map.into_iter().map(|(k, v)| (json_key(k), Self::from(v))).collect()),
                }
            }
        }
    }
}

/// Canonical decimal keys become integer keys, as the host language does.
fn json_key(key: String) -> Key
{
    match key.parse::<i64>() {
        Ok(i) if i.to_string() == key => Key::Int(i),
        _ => Key::Str(key),
    }
}

/// Ordered set of named values: local variables, globals, constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(Vec<(String, Value)>);

impl Bindings
{
    /// Empty set.
    #[must_use]
    pub fn new() -> Self
    {
        Self(Vec::new())
    }

    /// Bind `name`, replacing an existing binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value)
    {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value>
    {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Whether `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool
    {
        self.get(name).is_some()
    }

    /// Drop every binding whose name fails the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool)
    {
        self.0.retain(|(name, _)| keep(name));
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.0.len()
    }

    /// Whether there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }

    /// Iterate in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)>
    {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Bindings
{
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self
    {
        let mut bindings = Self::new();
        for (name, value) in iter {
            bindings.insert(name, value);
        }
        bindings
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Bindings
{
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self
    {
        map.into_iter().map(|(name, value)| (name, Value::from(value))).collect()
    }
}

#[cfg(test)]
mod tests
{
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_scalars()
    {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(5)), Value::Int(5));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!("x")), Value::from("x"));
    }

    #[test]
    fn test_json_object_markers()
    {
        let value = Value::from(json!({"__class": "Node", "__handle": 3, "next": {"__ref": 3, "__class": "Node"}}));

        match value {
            Value::Object(object) => {
                assert_eq!(object.class, "Node");
                assert_eq!(object.handle, Some(3));
                assert_eq!(
                    object.property("next"),
                    Some(&Value::Reference {
                        class: "Node".to_string(),
                        handle: 3
                    })
                );
            }
            other => panic!("Expected object, got {other:?}"),
        }

        assert_eq!(Value::from(json!({"__opaque": "resource"})), Value::opaque("resource"));
    }

    #[test]
    fn test_json_map_keys()
    {
        let value = Value::from(json!({"0": "a", "07": "b", "name": "c"}));
        let Value::Mapping(entries) = value else {
            panic!("Expected mapping");
        };
        let keys: Vec<Key> = entries.into_iter().map(|(k, _)| k).collect();

        assert!(keys.contains(&Key::Int(0)));
        assert!(keys.contains(&Key::Str("07".to_string())));
        assert!(keys.contains(&Key::Str("name".to_string())));
    }

    #[test]
    fn test_json_map_keeps_declaration_order()
    {
        let serde_json::Value::Object(map) = json!({"zeta": 1, "alpha": 2, "mid": {"10": "a", "9": "b"}}) else {
            panic!("Expected object");
        };
        let bindings = Bindings::from(map);

        let names: Vec<&str> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);

        let Some(Value::Mapping(entries)) = bindings.get("mid") else {
            panic!("Expected mapping");
        };
        let keys: Vec<&Key> = entries.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, [&Key::Int(10), &Key::Int(9)]);
    }

    #[test]
    fn test_json_object_keeps_property_order()
    {
        let value = Value::from(json!({"b": 1, "__class": "Pair", "a": 2, "__handle": 4, "c": 3}));
        let Value::Object(object) = value else {
            panic!("Expected object");
        };

        let names: Vec<&str> = object.properties.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(object.handle, Some(4));
    }

    #[test]
    fn test_type_names()
    {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Sequence(Vec::new()).type_name(), "array");
        assert_eq!(Value::Mapping(Vec::new()).type_name(), "array");
        assert_eq!(Value::object("Cart", None, Vec::<(String, Value)>::new()).type_name(), "Cart");
        assert_eq!(Value::opaque("resource").type_name(), "resource");
    }

    #[test]
    fn test_bindings_replace_in_place()
    {
        let mut bindings: Bindings = vec![("a", Value::Int(1)), ("b", Value::Int(2))].into_iter().collect();
        bindings.insert("a", Value::Int(3));

        let names: Vec<&str> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(bindings.get("a"), Some(&Value::Int(3)));
    }
}
