use std::sync::Arc;

mod builder;
mod r#impl;

use crate::{
    default_exchanges::TerminatorExchange, exchange::Exchange, GraphQLQuery, QueryError,
    QueryOptions, Response
};
pub use builder::ClientBuilder;
pub use r#impl::ClientImpl;

/// A GraphQL client. Cloning it is cheap and clones share the same exchange chain.
#[derive(Clone)]
#[repr(transparent)]
pub struct Client<M: Exchange = TerminatorExchange>(pub Arc<ClientImpl<M>>);

impl Client {
    pub fn builder<U: Into<String>>(url: U) -> ClientBuilder {
        ClientBuilder::new(url)
    }
}

impl<M: Exchange> Client<M> {
    /// The URL operations are sent to unless overridden per query.
    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub async fn query<Q: GraphQLQuery>(
        &self,
        _query: Q,
        variables: Q::Variables
    ) -> Result<Response<Q::ResponseData>, QueryError> {
        self.0.query(_query, variables).await
    }

    pub async fn query_with_options<Q: GraphQLQuery>(
        &self,
        _query: Q,
        variables: Q::Variables,
        options: QueryOptions
    ) -> Result<Response<Q::ResponseData>, QueryError> {
        self.0.query_with_options(_query, variables, options).await
    }
}
