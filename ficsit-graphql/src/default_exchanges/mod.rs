//! This module contains the default exchanges.
//! The fetch and persisted query exchanges require the `default-exchanges` feature.

use crate::{
    exchange::{Exchange, ExchangeResult, Operation},
    GraphQLQuery
};
use thiserror::Error;

#[cfg(feature = "default-exchanges")]
mod fetch;
#[cfg(feature = "default-exchanges")]
mod persisted;

#[cfg(feature = "default-exchanges")]
pub use fetch::{FetchError, FetchExchange, FetchExchangeImpl, MAX_GET_URL_LENGTH};
#[cfg(feature = "default-exchanges")]
pub use persisted::{PersistedExchange, PersistedExchangeImpl};

#[derive(Debug, Error)]
enum ExchangeChainError {
    #[error("unexpected end of exchange chain")]
    UnexpectedEndOfChain
}

/// The terminating exchange.
/// This will always be the last exchange in the chain and will simply return an error if called.
pub struct TerminatorExchange;

#[async_trait]
impl Exchange for TerminatorExchange {
    async fn run<Q: GraphQLQuery>(
        &self,
        _operation: Operation<Q::Variables>
    ) -> ExchangeResult<Q::ResponseData> {
        Err(ExchangeChainError::UnexpectedEndOfChain.into())
    }
}
