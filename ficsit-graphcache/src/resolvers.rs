use fnv::FnvHashMap;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// Computes a field from its parent and arguments without a network round trip.
///
/// Returning an object with a `__typename` and a key (see [`Keys`](./struct.Keys.html)) makes the
/// cache read that entity. Anything else is used as the field's value.
pub type ResolverFn =
    Arc<dyn Fn(&Map<String, Value>, &Map<String, Value>) -> Value + Send + Sync>;

/// The synthetic resolver table, keyed by type name then field name.
///
/// ```
/// # use ficsit_graphcache::Resolvers;
/// # use serde_json::{json, Map};
/// let resolvers = Resolvers::new().resolver("Query", "getModByReference", |_parent, args| {
///     json!({ "__typename": "Mod", "mod_reference": args.get("modReference") })
/// });
///
/// let args = json!({ "modReference": "SML" });
/// let resolved = resolvers.resolve("Query", "getModByReference", &Map::new(), args.as_object().unwrap());
/// assert_eq!(resolved, Some(json!({ "__typename": "Mod", "mod_reference": "SML" })));
/// ```
#[derive(Clone, Default)]
pub struct Resolvers {
    resolvers: FnvHashMap<String, FnvHashMap<String, ResolverFn>>
}

impl fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields()).finish()
    }
}

impl Resolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver<T, N, F>(mut self, typename: T, field_name: N, resolver: F) -> Self
    where
        T: Into<String>,
        N: Into<String>,
        F: Fn(&Map<String, Value>, &Map<String, Value>) -> Value + Send + Sync + 'static
    {
        self.resolvers
            .entry(typename.into())
            .or_default()
            .insert(field_name.into(), Arc::new(resolver));
        self
    }

    pub fn get(&self, typename: &str, field_name: &str) -> Option<&ResolverFn> {
        self.resolvers
            .get(typename)
            .and_then(|fields| fields.get(field_name))
    }

    pub fn resolve(
        &self,
        typename: &str,
        field_name: &str,
        parent: &Map<String, Value>,
        args: &Map<String, Value>
    ) -> Option<Value> {
        self.get(typename, field_name)
            .map(|resolver| resolver(parent, args))
    }

    /// All `(type, field)` pairs with a resolver.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resolvers.iter().flat_map(|(typename, fields)| {
            fields
                .keys()
                .map(move |field| (typename.as_str(), field.as_str()))
        })
    }
}
