//! The GraphQL client for the ficsit.app mod repository.
//!
//! [`initialize_graphql_client`](./fn.initialize_graphql_client.html) builds a client with a
//! normalized cache that knows how ficsit.app entities are identified, persisted queries sent
//! as GET requests and an HTTP fetch at the end of the chain.
//!
//! ```
//! use ficsit_api::{initialize_graphql_client, DEFAULT_API_ENDPOINT};
//!
//! let client = initialize_graphql_client(DEFAULT_API_ENDPOINT);
//! assert_eq!(client.url(), "https://api.ficsit.app/v2/query");
//! ```

use ficsit_graphcache::{stringify_key, CacheExchange, CacheExchangeImpl, Keys, Resolvers};
use ficsit_graphql::{
    default_exchanges::{FetchExchange, FetchExchangeImpl, PersistedExchange, PersistedExchangeImpl},
    Client
};
use serde_json::{json, Map, Value};

/// Introspection result of the ficsit.app API.
pub const SCHEMA: &str = include_str!("../schema/graphql.schema.json");

pub const DEFAULT_API_ENDPOINT: &str = "https://api.ficsit.app/v2/query";

/// Types that are never normalized. Their objects are stored inside whatever references them.
pub const NO_IDENTITY_TYPES: [&str; 10] = [
    "GetMods",
    "GetSMLVersions",
    "LatestVersions",
    "UserMod",
    "GetGuides",
    "OAuthOptions",
    "UserRoles",
    "Compatibility",
    "CompatibilityInfo",
    "VersionDependency"
];

pub type FicsitClient = Client<CacheExchangeImpl<PersistedExchangeImpl<FetchExchangeImpl>>>;

/// Mods are identified by their `mod_reference`.
pub fn mod_key(data: &Map<String, Value>) -> Option<String> {
    let key = data.get("mod_reference").and_then(stringify_key);
    if key.is_none() {
        tracing::trace!("mod without a usable mod_reference, embedding it");
    }
    key
}

/// The entity key policy for the ficsit.app schema. Types not listed here are keyed by `id`.
pub fn entity_keys() -> Keys {
    NO_IDENTITY_TYPES
        .iter()
        .fold(Keys::new(), |keys, typename| keys.no_identity(*typename))
        .key("Mod", mod_key)
}

/// `getModByReference` answers from a cached `Mod` with the same reference.
pub fn resolvers() -> Resolvers {
    Resolvers::new().resolver("Query", "getModByReference", |_parent, args| {
        json!({
            "__typename": "Mod",
            "mod_reference": args.get("modReference").cloned().unwrap_or(Value::Null)
        })
    })
}

/// Build a client for the API at `api_endpoint_url`.
///
/// Nothing is sent or validated until the first query. Every client has its own cache and
/// persisted query state.
pub fn initialize_graphql_client<U: Into<String>>(api_endpoint_url: U) -> FicsitClient {
    let url = api_endpoint_url.into();
    tracing::debug!(url = %url, "initializing graphql client");

    Client::builder(url)
        .with_exchange(FetchExchange)
        .with_exchange(PersistedExchange::new().prefer_get_for_persisted_queries(true))
        .with_exchange(
            CacheExchange::from_introspection(SCHEMA)
                .keys(entity_keys())
                .resolvers(resolvers())
        )
        .build()
}
