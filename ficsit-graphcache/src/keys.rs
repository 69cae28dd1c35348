use fnv::FnvHashMap;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// Computes the identity of an entity from its data. `None` means the type has no identity and
/// is embedded in its parent instead of being stored by reference.
pub type KeyFn = Arc<dyn Fn(&Map<String, Value>) -> Option<String> + Send + Sync>;

/// The entity key policy: a table from type name to key function.
///
/// Types missing from the table fall back to their `id` or `_id` field.
///
/// ```
/// # use ficsit_graphcache::{Keys, stringify_key};
/// # use serde_json::json;
/// let keys = Keys::new()
///     .no_identity("GetMods")
///     .key("Mod", |data| data.get("mod_reference").and_then(stringify_key));
///
/// let data = json!({ "mod_reference": "SML" });
/// assert_eq!(keys.key_of_entity("Mod", data.as_object().unwrap()), Some("Mod:SML".to_string()));
/// assert_eq!(keys.key_of_entity("GetMods", data.as_object().unwrap()), None);
/// ```
#[derive(Clone, Default)]
pub struct Keys {
    keys: FnvHashMap<String, KeyFn>
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

impl Keys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key function for a type.
    pub fn key<T, F>(mut self, typename: T, key_fn: F) -> Self
    where
        T: Into<String>,
        F: Fn(&Map<String, Value>) -> Option<String> + Send + Sync + 'static
    {
        self.keys.insert(typename.into(), Arc::new(key_fn));
        self
    }

    /// Mark a type as having no identity. Its objects are always embedded in their parent.
    pub fn no_identity<T: Into<String>>(self, typename: T) -> Self {
        self.key(typename, |_| None)
    }

    pub fn typenames(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn contains(&self, typename: &str) -> bool {
        self.keys.contains_key(typename)
    }

    /// Run the key policy for a type without the `Type:` prefix.
    pub fn key_field(&self, typename: &str, data: &Map<String, Value>) -> Option<String> {
        match self.keys.get(typename) {
            Some(key_fn) => key_fn(data),
            None => data
                .get("id")
                .or_else(|| data.get("_id"))
                .and_then(stringify_key)
        }
    }

    /// The storage key of an entity, `Type:key`, or `None` if it has no identity.
    pub fn key_of_entity(&self, typename: &str, data: &Map<String, Value>) -> Option<String> {
        self.key_field(typename, data).map(|id| {
            let mut key = String::with_capacity(typename.len() + id.len() + 1);
            key.push_str(typename);
            key.push(':');
            key.push_str(&id);
            key
        })
    }
}

/// Casts a key field to a string.
///
/// Strings are used as is, numbers and booleans are written out. Anything else (null, lists,
/// objects) can't be an identity.
pub fn stringify_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!()
        }
    }

    #[test]
    fn falls_back_to_id_fields() {
        let keys = Keys::new();

        assert_eq!(
            keys.key_of_entity("Version", &object(json!({ "id": "abc" }))),
            Some("Version:abc".to_string())
        );
        assert_eq!(
            keys.key_of_entity("Version", &object(json!({ "_id": 12 }))),
            Some("Version:12".to_string())
        );
        assert_eq!(keys.key_of_entity("Version", &object(json!({}))), None);
    }

    #[test]
    fn policy_overrides_id() {
        let keys = Keys::new().no_identity("UserMod");

        assert_eq!(
            keys.key_of_entity("UserMod", &object(json!({ "id": "abc" }))),
            None
        );
        assert!(keys.contains("UserMod"));
    }

    #[test]
    fn stringifies_scalars_only() {
        assert_eq!(stringify_key(&json!("x")), Some("x".to_string()));
        assert_eq!(stringify_key(&json!(4)), Some("4".to_string()));
        assert_eq!(stringify_key(&json!(true)), Some("true".to_string()));
        assert_eq!(stringify_key(&json!(null)), None);
        assert_eq!(stringify_key(&json!({ "a": 1 })), None);
    }
}
