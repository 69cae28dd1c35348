//! Contains the exchange factory and implementation. The factory is the only thing needed for most
//! users and is reexported from the root.

use crate::{
    selection::{Document, DocumentError},
    store::Store,
    Keys, Resolvers, Schema, SchemaError
};
use ficsit_graphql::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult, OperationType},
    DebugInfo, GraphQLQuery, RequestPolicy, Response, ResultSource
};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;


/// The normalized cache exchange. Responses are split into entities keyed by the
/// [`Keys`](./struct.Keys.html) policy, so a query can be answered from data other queries
/// fetched.
pub struct CacheExchange {
    schema: Result<Arc<Schema>, SchemaError>,
    keys: Keys,
    resolvers: Resolvers
}

impl CacheExchange {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Ok(Arc::new(schema)),
            keys: Keys::default(),
            resolvers: Resolvers::default()
        }
    }

    /// Create the exchange from an introspection result. If it can't be parsed, every operation
    /// run through the exchange fails with the parse error.
    pub fn from_introspection(json: &str) -> Self {
        Self {
            schema: Schema::from_introspection_json(json).map(Arc::new),
            keys: Keys::default(),
            resolvers: Resolvers::default()
        }
    }

    pub fn keys(mut self, keys: Keys) -> Self {
        self.keys = keys;
        self
    }

    pub fn resolvers(mut self, resolvers: Resolvers) -> Self {
        self.resolvers = resolvers;
        self
    }
}

fn check_config(schema: &Schema, keys: &Keys, resolvers: &Resolvers) {
    for typename in keys.typenames() {
        if !schema.has_type(typename) {
            tracing::warn!(typename, "key policy names a type the schema doesn't have");
        }
    }
    for (typename, field) in resolvers.fields() {
        if !schema.has_field(typename, field) {
            tracing::warn!(typename, field, "resolver for a field the schema doesn't have");
        }
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for CacheExchange {
    type Output = CacheExchangeImpl<TNext>;

    fn build(self, next: TNext) -> CacheExchangeImpl<TNext> {
        let keys = self.keys;
        let resolvers = self.resolvers;
        let store = self.schema.map(|schema| {
            check_config(&schema, &keys, &resolvers);
            Store::new(schema, keys, resolvers)
        });
        if let Err(ref e) = store {
            tracing::warn!(error = %e, "cache schema is invalid, operations will fail");
        }

        CacheExchangeImpl {
            next,
            store,
            documents: RwLock::new(FnvHashMap::default())
        }
    }
}

/// The implementation of the normalized cache. Exposed in case someone needs it, but most users
/// shouldn't.
pub struct CacheExchangeImpl<TNext: Exchange> {
    next: TNext,
    store: Result<Store, SchemaError>,
    documents: RwLock<FnvHashMap<u32, Result<Arc<Document>, DocumentError>>>
}

fn variables_of<V: serde::Serialize>(variables: &V) -> Map<String, Value> {
    match serde_json::to_value(variables) {
        Ok(Value::Object(variables)) => variables,
        _ => Map::new()
    }
}

impl<TNext: Exchange> CacheExchangeImpl<TNext> {
    fn document<Q: GraphQLQuery>(
        &self,
        operation: &Operation<Q::Variables>
    ) -> Result<Arc<Document>, DocumentError> {
        let query_key = operation.meta.query_key;
        if let Some(document) = self.documents.read().get(&query_key) {
            return document.clone();
        }

        let document =
            Document::parse(operation.query.query, operation.query.operation_name).map(Arc::new);
        self.documents.write().insert(query_key, document.clone());
        document
    }

    fn read_query<Q: GraphQLQuery>(
        store: &Store,
        document: &Document,
        variables: &Map<String, Value>
    ) -> Option<Q::ResponseData> {
        let cached = store.read_query(document, variables)?;
        match serde_json::from_value(cached) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(
                    operation = Q::OPERATION_NAME,
                    error = %e,
                    "cached data doesn't match the response type"
                );
                None
            }
        }
    }

    fn write_query<Q: GraphQLQuery>(
        store: &Store,
        document: &Document,
        variables: &Map<String, Value>,
        result: &OperationResult<Q::ResponseData>
    ) {
        let response = &result.response;
        let data = match response.data {
            Some(ref data) if !response.has_errors() => data,
            _ => return
        };
        match serde_json::to_value(data) {
            Ok(data) => store.write_query(document, variables, &data),
            Err(e) => tracing::warn!(
                operation = Q::OPERATION_NAME,
                error = %e,
                "failed to serialize response data for the cache"
            )
        }
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for CacheExchangeImpl<TNext> {
    async fn run<Q: GraphQLQuery>(
        &self,
        operation: Operation<Q::Variables>
    ) -> ExchangeResult<Q::ResponseData> {
        if operation.meta.operation_type == OperationType::Subscription {
            return self.next.run::<Q>(operation).await;
        }

        let store = self.store.as_ref().map_err(Clone::clone)?;
        let document = self.document::<Q>(&operation)?;
        let variables = variables_of(&operation.query.variables);
        let request_policy = operation.options.request_policy;

        if operation.meta.operation_type == OperationType::Query
            && request_policy != RequestPolicy::NetworkOnly
        {
            let cached = Self::read_query::<Q>(store, &document, &variables);
            if cached.is_some() || request_policy == RequestPolicy::CacheOnly {
                tracing::debug!(
                    operation = Q::OPERATION_NAME,
                    hit = cached.is_some(),
                    "answered from cache"
                );
                return Ok(OperationResult {
                    key: operation.key,
                    meta: operation.meta,
                    response: Response {
                        debug_info: Some(DebugInfo::from_source(ResultSource::Cache)),
                        data: cached,
                        errors: None
                    }
                });
            }
            tracing::debug!(operation = Q::OPERATION_NAME, "cache miss");
        }

        let result = self.next.run::<Q>(operation).await?;
        Self::write_query::<Q>(store, &document, &variables, &result);
        Ok(result)
    }
}
