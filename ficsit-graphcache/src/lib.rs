//! A normalized cache exchange for `ficsit-graphql`.
//!
//! Responses are split into entities and stored by key, so a query can be answered from data
//! fetched by other queries. Which objects count as entities is decided by the
//! [`Keys`](./struct.Keys.html) policy. [`Resolvers`](./struct.Resolvers.html) can point a field
//! at an entity that's already cached without a network round trip.
//!
//! ```
//! use ficsit_graphcache::{stringify_key, CacheExchange, Keys, Resolvers};
//! use ficsit_graphql::{default_exchanges::FetchExchange, Client};
//! use serde_json::json;
//!
//! # let schema = r#"{ "__schema": { "queryType": { "name": "Query" }, "types": [{ "kind": "OBJECT", "name": "Query", "fields": [] }] } }"#;
//! let cache = CacheExchange::from_introspection(schema)
//!     .keys(Keys::new().key("Mod", |data| data.get("mod_reference").and_then(stringify_key)))
//!     .resolvers(Resolvers::new().resolver("Query", "getModByReference", |_, args| {
//!         json!({ "__typename": "Mod", "mod_reference": args.get("modReference") })
//!     }));
//!
//! let client = Client::builder("https://api.ficsit.app/v2/query")
//!     .with_exchange(FetchExchange)
//!     .with_exchange(cache)
//!     .build();
//! ```

#[macro_use]
extern crate async_trait;
#[cfg(test)]
#[macro_use]
extern crate lazy_static;

mod cache_exchange;
mod keys;
mod resolvers;
mod schema;
mod selection;
mod store;

pub use cache_exchange::{CacheExchange, CacheExchangeImpl};
pub use keys::{stringify_key, KeyFn, Keys};
pub use resolvers::{ResolverFn, Resolvers};
pub use schema::{Schema, SchemaError, TypeKind};
pub use selection::DocumentError;
