use crate::{GraphQLQuery, QueryBody, QueryError, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc};

pub type ExchangeResult<R> = Result<OperationResult<R>, QueryError>;

/// A bi-directional middleware step. Either returns a result itself or forwards the operation
/// to the next exchange in the chain.
#[async_trait]
pub trait Exchange: Send + Sync + 'static {
    async fn run<Q: GraphQLQuery>(
        &self,
        operation: Operation<Q::Variables>
    ) -> ExchangeResult<Q::ResponseData>;
}

/// Builds an exchange around the next exchange in the chain.
pub trait ExchangeFactory<TNext: Exchange> {
    type Output: Exchange;

    fn build(self, next: TNext) -> Self::Output;
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription
}

impl OperationType {
    /// The conventional name of the root type for this operation type.
    pub fn to_str(&self) -> &'static str {
        match self {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => "Subscription"
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPolicy {
    /// Serve from the cache if possible, go to the network otherwise.
    CacheFirst,
    /// Never go to the network. Cache misses return no data.
    CacheOnly,
    /// Always go to the network. The result is still written to the cache.
    NetworkOnly
}

impl Default for RequestPolicy {
    fn default() -> Self {
        RequestPolicy::CacheFirst
    }
}

/// The HTTP method the fetch exchange should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Post,
    /// Encode the request in the URL. Falls back to `Post` if the URL gets too long.
    Get
}

impl Default for FetchMethod {
    fn default() -> Self {
        FetchMethod::Post
    }
}

pub struct HeaderPair(pub String, pub String);

pub type HeaderFn = Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct OperationMeta {
    /// Hash of the query document.
    pub query_key: u32,
    pub operation_type: OperationType
}

/// Instructs the fetch exchange to send the `persistedQuery` extension.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistedQuery {
    /// SHA-256 of the query text, lowercase hex.
    pub sha256_hash: String,
    /// Whether the query text is sent alongside the hash.
    pub include_query: bool
}

#[derive(Clone)]
pub struct OperationOptions {
    pub url: String,
    pub extra_headers: Option<HeaderFn>,
    pub request_policy: RequestPolicy,
    pub fetch_method: FetchMethod,
    pub persisted_query: Option<PersistedQuery>
}

#[derive(Clone)]
pub struct Operation<V: Serialize + Clone + Send + Sync> {
    /// Hash of the query document and the variables.
    pub key: u64,
    pub meta: OperationMeta,
    pub query: QueryBody<V>,
    pub options: OperationOptions
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ResultSource {
    Cache,
    Network
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebugInfo {
    pub source: ResultSource
}

impl DebugInfo {
    pub fn from_source(source: ResultSource) -> Self {
        DebugInfo { source }
    }
}

#[derive(Clone, Debug)]
pub struct OperationResult<R: DeserializeOwned + Send + Sync + Clone> {
    pub key: u64,
    pub meta: OperationMeta,
    pub response: Response<R>
}

/// Per-query overrides of the client defaults.
#[derive(Default, Clone)]
pub struct QueryOptions {
    pub url: Option<String>,
    pub extra_headers: Option<HeaderFn>,
    pub request_policy: Option<RequestPolicy>,
    pub fetch_method: Option<FetchMethod>
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_info_serializes_source_only() {
        let info = DebugInfo::from_source(ResultSource::Cache);
        assert_eq!(serde_json::to_value(&info).unwrap(), json!({ "source": "Cache" }));
    }
}
