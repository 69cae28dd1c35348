//! A lookup view over an introspection result, used to find the types of fields while
//! normalizing and to match fragments against abstract types.

use ficsit_graphql::OperationType;
use fnv::{FnvHashMap, FnvHashSet};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("invalid introspection result: {0}")]
    InvalidIntrospection(String),
    #[error("schema has no query root type")]
    MissingQueryType
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull
}

#[derive(Deserialize)]
struct NamedRef {
    name: String
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTypeRef {
    name: Option<String>,
    of_type: Option<Box<RawTypeRef>>
}

impl RawTypeRef {
    /// Strips list and non-null wrappers.
    fn named(&self) -> Option<&str> {
        match self.name {
            Some(ref name) => Some(name.as_str()),
            None => self.of_type.as_ref().and_then(|inner| inner.named())
        }
    }
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: RawTypeRef
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawType {
    kind: TypeKind,
    name: String,
    #[serde(default)]
    fields: Option<Vec<RawField>>,
    #[serde(default)]
    possible_types: Option<Vec<NamedRef>>
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    query_type: Option<NamedRef>,
    mutation_type: Option<NamedRef>,
    subscription_type: Option<NamedRef>,
    types: Vec<RawType>
}

#[derive(Deserialize)]
struct SchemaRoot {
    #[serde(rename = "__schema")]
    schema: RawSchema
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntrospectionResult {
    Wrapped { data: SchemaRoot },
    Bare(SchemaRoot)
}

#[derive(Debug, Clone)]
struct SchemaType {
    kind: TypeKind,
    /// field name -> named return type
    fields: FnvHashMap<String, String>,
    possible_types: FnvHashSet<String>
}

#[derive(Debug, Clone)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    types: FnvHashMap<String, SchemaType>
}

impl Schema {
    /// Accepts `{"__schema": ...}`, optionally wrapped in `{"data": ...}`.
    /// Minified introspection results (as produced for client-side caches) work too.
    pub fn from_introspection_json(json: &str) -> Result<Self, SchemaError> {
        let root = match serde_json::from_str::<IntrospectionResult>(json)
            .map_err(|e| SchemaError::InvalidIntrospection(e.to_string()))?
        {
            IntrospectionResult::Wrapped { data } => data,
            IntrospectionResult::Bare(root) => root
        };
        let raw = root.schema;

        let query_type = raw.query_type.ok_or(SchemaError::MissingQueryType)?.name;
        let types = raw
            .types
            .into_iter()
            .map(|ty| {
                let fields = ty
                    .fields
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|field| {
                        let named = field.ty.named()?.to_string();
                        Some((field.name, named))
                    })
                    .collect();
                let possible_types = ty
                    .possible_types
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                let schema_type = SchemaType {
                    kind: ty.kind,
                    fields,
                    possible_types
                };
                (ty.name, schema_type)
            })
            .collect::<FnvHashMap<_, _>>();

        if !types.contains_key(&query_type) {
            return Err(SchemaError::MissingQueryType);
        }

        Ok(Schema {
            query_type,
            mutation_type: raw.mutation_type.map(|t| t.name),
            subscription_type: raw.subscription_type.map(|t| t.name),
            types
        })
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn root_type(&self, operation_type: OperationType) -> Option<&str> {
        match operation_type {
            OperationType::Query => Some(self.query_type.as_str()),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref()
        }
    }

    pub fn is_root_type(&self, typename: &str) -> bool {
        typename == self.query_type
            || self.mutation_type.as_deref() == Some(typename)
            || self.subscription_type.as_deref() == Some(typename)
    }

    pub fn has_type(&self, typename: &str) -> bool {
        self.types.contains_key(typename)
    }

    pub fn kind(&self, typename: &str) -> Option<TypeKind> {
        self.types.get(typename).map(|ty| ty.kind)
    }

    pub fn has_field(&self, typename: &str, field: &str) -> bool {
        self.field_type(typename, field).is_some()
    }

    /// The named return type of a field, without list or non-null wrappers.
    pub fn field_type(&self, typename: &str, field: &str) -> Option<&str> {
        self.types
            .get(typename)
            .and_then(|ty| ty.fields.get(field))
            .map(String::as_str)
    }

    /// Whether a fragment on `condition` applies to an object of type `typename`.
    pub fn is_possible_type(&self, condition: &str, typename: &str) -> bool {
        if condition == typename {
            return true;
        }
        self.types
            .get(condition)
            .map(|ty| ty.possible_types.contains(typename))
            .unwrap_or(false)
    }
}
