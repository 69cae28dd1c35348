use crate::{
    client::ClientImpl,
    default_exchanges::TerminatorExchange,
    exchange::{Exchange, ExchangeFactory},
    types::HeaderFn,
    Client, FetchMethod, HeaderPair, RequestPolicy
};
#[cfg(feature = "default-exchanges")]
use crate::default_exchanges::{FetchExchange, PersistedExchange};
use std::sync::Arc;

pub struct ClientBuilder<M: Exchange = TerminatorExchange> {
    exchange: M,
    url: String,
    extra_headers: Option<HeaderFn>,
    request_policy: RequestPolicy,
    fetch_method: FetchMethod
}

impl ClientBuilder<TerminatorExchange> {
    /// The URL is not validated here. An unusable URL is reported by the fetch exchange when the
    /// first operation is sent.
    pub fn new<U: Into<String>>(url: U) -> Self {
        ClientBuilder {
            exchange: TerminatorExchange,
            url: url.into(),
            extra_headers: None,
            request_policy: RequestPolicy::default(),
            fetch_method: FetchMethod::default()
        }
    }
}

impl<M: Exchange> ClientBuilder<M> {
    /// Add the default exchanges to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    #[cfg(feature = "default-exchanges")]
    pub fn with_default_exchanges(self) -> ClientBuilder<impl Exchange> {
        self.with_exchange(FetchExchange)
            .with_exchange(PersistedExchange::new())
    }

    /// Add an exchange to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    pub fn with_exchange<F>(self, exchange_factory: F) -> ClientBuilder<F::Output>
    where
        F: ExchangeFactory<M>
    {
        let exchange = exchange_factory.build(self.exchange);
        ClientBuilder {
            exchange,
            url: self.url,
            extra_headers: self.extra_headers,
            request_policy: self.request_policy,
            fetch_method: self.fetch_method
        }
    }

    pub fn with_extra_headers<F: Fn() -> Vec<HeaderPair> + Send + Sync + 'static>(
        mut self,
        header_fn: F
    ) -> Self {
        self.extra_headers = Some(Arc::new(header_fn));
        self
    }

    pub fn with_request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = request_policy;
        self
    }

    pub fn with_fetch_method(mut self, fetch_method: FetchMethod) -> Self {
        self.fetch_method = fetch_method;
        self
    }

    pub fn build(self) -> Client<M> {
        let client = ClientImpl {
            url: self.url,
            exchange: self.exchange,
            extra_headers: self.extra_headers,
            request_policy: self.request_policy,
            fetch_method: self.fetch_method
        };

        Client(Arc::new(client))
    }
}
