//! An exchange-based GraphQL client.
//!
//! # Getting Started
//!
//! Queries are zero-sized types implementing [`GraphQLQuery`](./trait.GraphQLQuery.html).
//! They carry the query document, the operation name and the shape of their variables and
//! response data:
//!
//! ```
//! use ficsit_graphql::GraphQLQuery;
//! use serde::{Deserialize, Serialize};
//!
//! pub struct GetModName;
//!
//! #[derive(Serialize, Clone)]
//! pub struct Variables {
//!     #[serde(rename = "modReference")]
//!     pub mod_reference: String
//! }
//!
//! #[derive(Serialize, Deserialize, Clone)]
//! pub struct ResponseData {
//!     #[serde(rename = "getModByReference")]
//!     pub get_mod_by_reference: Option<Mod>
//! }
//!
//! #[derive(Serialize, Deserialize, Clone)]
//! pub struct Mod {
//!     pub name: String
//! }
//!
//! impl GraphQLQuery for GetModName {
//!     type Variables = Variables;
//!     type ResponseData = ResponseData;
//!
//!     const QUERY: &'static str =
//!         "query GetModName($modReference: ModReference!) { getModByReference(modReference: $modReference) { name } }";
//!     const OPERATION_NAME: &'static str = "GetModName";
//! }
//! ```
//!
//! A client is then assembled from exchanges:
//!
//! ```
//! use ficsit_graphql::{default_exchanges::FetchExchange, Client};
//!
//! let client = Client::builder("https://api.ficsit.app/v2/query")
//!     .with_exchange(FetchExchange)
//!     .build();
//! ```
//!
//! Without any exchanges, nothing answers the query:
//!
//! ```
//! # use ficsit_graphql::{Client, GraphQLQuery};
//! # struct Ping;
//! # impl GraphQLQuery for Ping {
//! #     type Variables = ();
//! #     type ResponseData = serde_json::Value;
//! #     const QUERY: &'static str = "query Ping { __typename }";
//! #     const OPERATION_NAME: &'static str = "Ping";
//! # }
//! # tokio_test::block_on(async {
//! let client = Client::builder("https://api.ficsit.app/v2/query").build();
//! let error = client.query(Ping, ()).await.unwrap_err();
//! assert_eq!(error.to_string(), "unexpected end of exchange chain");
//! # });
//! ```
//!
//! # Exchanges
//!
//! Exchanges are like a bi-directional middleware.
//! They act on both the incoming and outgoing queries,
//! passing them on if they can't return a result themselves.
//!
//! ## PersistedExchange
//!
//! Replaces the query text with its SHA-256 hash so the server can look up a previously
//! registered document. Falls back to sending the full text when the server doesn't know the
//! hash, and disables itself if the server doesn't support persisted queries at all.
//!
//! ## FetchExchange
//!
//! The fetch exchange will serialize the query, send it over the network and deserialize the response.
//! This should be your last exchange in the chain, as it never forwards a query.
//!
//! The normalized cache lives in the `ficsit-graphcache` crate.
//!
//! # Features
//!
//! * `default-exchanges` **(default)** - Include the fetch and persisted query exchanges.

#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;

use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, fmt, fmt::Display};
use types::*;

pub mod client;
pub mod default_exchanges;
mod error;
pub(crate) mod types;
pub mod utils;

pub use client::{Client, ClientBuilder};
pub use error::QueryError;
pub use types::{
    DebugInfo, FetchMethod, HeaderPair, OperationType, QueryOptions, RequestPolicy, ResultSource
};

/// Types used by custom exchanges. Regular users probably don't need these.
pub mod exchange {
    pub use crate::types::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationMeta, OperationOptions,
        OperationResult, OperationType, PersistedQuery
    };
}

/// The form in which queries are sent over HTTP in most implementations. This will be built using the [GraphQLQuery](./trait.GraphQLQuery.html) trait normally.
#[derive(Debug, Serialize, Clone)]
pub struct QueryBody<Variables: Serialize + Send + Sync + Clone> {
    /// The values for the variables. They must match those declared in the queries.
    pub variables: Variables,
    /// The GraphQL query, as a string.
    pub query: &'static str,
    /// The GraphQL operation name, as a string.
    #[serde(rename = "operationName")]
    pub operation_name: &'static str
}

/// A convenience trait that can be used to build a GraphQL request body.
pub trait GraphQLQuery: Send + Sync + 'static {
    /// The shape of the variables expected by the query.
    type Variables: Serialize + Send + Sync + Clone + 'static;
    /// The top-level shape of the response data (the `data` field in the GraphQL response).
    type ResponseData: Serialize + DeserializeOwned + Send + Sync + Clone + 'static;

    /// The full query document.
    const QUERY: &'static str;
    /// The name of the operation inside `QUERY` to execute.
    const OPERATION_NAME: &'static str;
    const OPERATION_TYPE: OperationType = OperationType::Query;

    /// Produce a GraphQL query struct that can be JSON serialized and sent to a GraphQL API.
    fn build_query(variables: Self::Variables) -> (QueryBody<Self::Variables>, OperationMeta) {
        let meta = OperationMeta {
            query_key: utils::hash_query(Self::QUERY),
            operation_type: Self::OPERATION_TYPE
        };
        let body = QueryBody {
            variables,
            query: Self::QUERY,
            operation_name: Self::OPERATION_NAME
        };
        (body, meta)
    }
}

/// The generic shape taken by the responses of GraphQL APIs.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # use serde::Deserialize;
/// #
/// # #[derive(Debug, Deserialize, PartialEq, Clone)]
/// # struct Mod {
/// #     mod_reference: String,
/// # }
/// #
/// # #[derive(Debug, Deserialize, PartialEq, Clone)]
/// # struct ResponseData {
/// #     mods: Vec<Mod>,
/// # }
/// #
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use ficsit_graphql::Response;
///
/// let body: Response<ResponseData> = serde_json::from_value(json!({
///     "data": {
///         "mods": [{"mod_reference": "SML"}],
///     },
///     "errors": [],
/// }))?;
///
/// let expected: Response<ResponseData> = Response {
///     data: Some(ResponseData {
///         mods: vec![Mod { mod_reference: "SML".to_owned() }],
///     }),
///     errors: Some(vec![]),
///     debug_info: None
/// };
///
/// assert_eq!(body, expected);
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Response<Data: Clone> {
    /// Where the result came from. Never sent by the server.
    #[serde(skip_deserializing, rename = "debugInfo")]
    pub debug_info: Option<DebugInfo>,
    /// The absent, partial or complete response data.
    pub data: Option<Data>,
    /// The top-level errors returned by the server.
    pub errors: Option<Vec<Error>>
}

impl<Data: Clone> Response<Data> {
    /// Whether the server returned any errors. An empty `errors` array counts as none.
    pub fn has_errors(&self) -> bool {
        self.errors
            .as_ref()
            .map(|errors| !errors.is_empty())
            .unwrap_or(false)
    }

    /// Whether any error matches either the given message or the given `extensions.code`.
    pub fn has_error(&self, message: &str, code: &str) -> bool {
        self.errors
            .iter()
            .flatten()
            .any(|error| error.message == message || error.code() == Some(code))
    }
}

/// An element in the top-level `errors` array of a response body.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # use serde::Deserialize;
/// #
/// # #[derive(Debug, Deserialize, PartialEq, Clone)]
/// # struct ResponseData {
/// #     something: i32
/// # }
/// #
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use ficsit_graphql::*;
///
/// let body: Response<ResponseData> = serde_json::from_value(json!({
///     "data": null,
///     "errors": [
///         {
///             "message": "PersistedQueryNotFound",
///             "extensions": { "code": "PERSISTED_QUERY_NOT_FOUND" }
///         },
///         {
///             "message": "mod not found",
///             "path": ["getMod", 0]
///         },
///      ],
/// }))?;
///
/// let errors = body.errors.unwrap();
/// assert_eq!(errors[0].code(), Some("PERSISTED_QUERY_NOT_FOUND"));
/// assert_eq!(
///     errors[1].path,
///     Some(vec![PathFragment::Key("getMod".into()), PathFragment::Index(0)])
/// );
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Error {
    /// The human-readable error message. This is the only required field.
    pub message: String,
    /// Which locations in the query the error applies to.
    pub locations: Option<Vec<Location>>,
    /// Which path in the query the error applies to, e.g. `["mods", 0, "name"]`.
    pub path: Option<Vec<PathFragment>>,
    /// Additional errors. Their exact format is defined by the server.
    pub extensions: Option<HashMap<String, serde_json::Value>>
}

impl Error {
    /// The `extensions.code` of the error, if the server set one.
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(|code| code.as_str())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use `/` as a separator like JSON Pointer.
        let path = self
            .path
            .as_ref()
            .map(|fragments| {
                fragments
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|| "<query>".to_string());

        // Only the first location is shown.
        let loc = self
            .locations
            .as_ref()
            .and_then(|locations| locations.first())
            .cloned()
            .unwrap_or_default();

        write!(f, "{}:{}:{}: {}", path, loc.line, loc.column, self.message)
    }
}

/// Part of a path in a query. It can be an object key or an array index. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathFragment {
    /// A key inside an object
    Key(String),
    /// An index inside an array
    Index(i32)
}

/// Represents a location inside a query string. Used in errors. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// The line number in the query string where the error originated (starting from 1).
    pub line: i32,
    /// The column number in the query string where the error originated (starting from 1).
    pub column: i32
}

impl Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathFragment::Key(ref key) => write!(f, "{}", key),
            PathFragment::Index(ref idx) => write!(f, "{}", idx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_display_joins_path_with_slashes() {
        let error: Error = serde_json::from_value(json!({
            "message": "boom",
            "path": ["getMods", 3, "name"],
            "locations": [{ "line": 2, "column": 5 }]
        }))
        .unwrap();

        assert_eq!(error.to_string(), "getMods/3/name:2:5: boom");
    }

    #[test]
    fn error_display_without_path() {
        let error: Error = serde_json::from_value(json!({ "message": "boom" })).unwrap();
        assert_eq!(error.to_string(), "<query>:0:0: boom");
    }

    #[test]
    fn has_errors_ignores_empty_list() {
        let response: Response<serde_json::Value> =
            serde_json::from_value(json!({ "data": {}, "errors": [] })).unwrap();
        assert!(!response.has_errors());
    }

    #[test]
    fn has_error_matches_code_or_message() {
        let response: Response<serde_json::Value> = serde_json::from_value(json!({
            "errors": [{ "message": "x", "extensions": { "code": "PERSISTED_QUERY_NOT_FOUND" } }]
        }))
        .unwrap();

        assert!(response.has_error("PersistedQueryNotFound", "PERSISTED_QUERY_NOT_FOUND"));
        assert!(!response.has_error("PersistedQueryNotSupported", "PERSISTED_QUERY_NOT_SUPPORTED"));
    }
}
