use crate::{
    exchange::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationType, PersistedQuery
    },
    utils::sha256_hex,
    FetchMethod, GraphQLQuery
};
use std::sync::atomic::{AtomicBool, Ordering};

const NOT_FOUND_MESSAGE: &str = "PersistedQueryNotFound";
const NOT_FOUND_CODE: &str = "PERSISTED_QUERY_NOT_FOUND";
const NOT_SUPPORTED_MESSAGE: &str = "PersistedQueryNotSupported";
const NOT_SUPPORTED_CODE: &str = "PERSISTED_QUERY_NOT_SUPPORTED";

/// The persisted query exchange.
///
/// Sends the SHA-256 hash of the query instead of its text. If the server doesn't know the
/// hash yet, the operation is retried once with the full text so the server can register it.
/// If the server reports that it doesn't support persisted queries, the exchange stops
/// persisting for the rest of its lifetime.
#[derive(Debug, Clone, Default)]
pub struct PersistedExchange {
    prefer_get_for_persisted_queries: bool,
    enforce_persisted_queries: bool,
    enable_for_mutation: bool
}

impl PersistedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send hashed queries as GET requests, which makes them cacheable by HTTP caches.
    pub fn prefer_get_for_persisted_queries(mut self, prefer_get: bool) -> Self {
        self.prefer_get_for_persisted_queries = prefer_get;
        self
    }

    /// Keep persisting even after the server reports that it doesn't support it.
    pub fn enforce_persisted_queries(mut self, enforce: bool) -> Self {
        self.enforce_persisted_queries = enforce;
        self
    }

    /// Also hash mutations. Mutations are always sent as POST.
    pub fn enable_for_mutation(mut self, enable: bool) -> Self {
        self.enable_for_mutation = enable;
        self
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for PersistedExchange {
    type Output = PersistedExchangeImpl<TNext>;

    fn build(self, next: TNext) -> Self::Output {
        PersistedExchangeImpl {
            next,
            options: self,
            supported: AtomicBool::new(true)
        }
    }
}

pub struct PersistedExchangeImpl<TNext: Exchange> {
    next: TNext,
    options: PersistedExchange,
    supported: AtomicBool
}

impl<TNext: Exchange> PersistedExchangeImpl<TNext> {
    /// Whether the server hasn't (yet) reported that persisted queries are unsupported.
    pub fn is_supported(&self) -> bool {
        self.supported.load(Ordering::Acquire)
    }

    fn should_persist(&self, operation_type: OperationType) -> bool {
        let enabled_for_type = match operation_type {
            OperationType::Query => true,
            OperationType::Mutation => self.options.enable_for_mutation,
            OperationType::Subscription => false
        };
        enabled_for_type && (self.options.enforce_persisted_queries || self.is_supported())
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for PersistedExchangeImpl<TNext> {
    async fn run<Q: GraphQLQuery>(
        &self,
        operation: Operation<Q::Variables>
    ) -> ExchangeResult<Q::ResponseData> {
        let operation_type = operation.meta.operation_type;
        if !self.should_persist(operation_type) {
            return self.next.run::<Q>(operation).await;
        }

        let sha256_hash = sha256_hex(operation.query.query);

        let mut persisted = operation.clone();
        persisted.options.persisted_query = Some(PersistedQuery {
            sha256_hash: sha256_hash.clone(),
            include_query: false
        });
        if self.options.prefer_get_for_persisted_queries && operation_type == OperationType::Query
        {
            persisted.options.fetch_method = FetchMethod::Get;
        }

        let result = self.next.run::<Q>(persisted).await?;

        if result
            .response
            .has_error(NOT_SUPPORTED_MESSAGE, NOT_SUPPORTED_CODE)
        {
            if self.options.enforce_persisted_queries {
                return Ok(result);
            }
            tracing::warn!(
                operation = Q::OPERATION_NAME,
                "server does not support persisted queries, disabling them"
            );
            self.supported.store(false, Ordering::Release);
            return self.next.run::<Q>(operation).await;
        }

        if result.response.has_error(NOT_FOUND_MESSAGE, NOT_FOUND_CODE) {
            tracing::debug!(
                operation = Q::OPERATION_NAME,
                hash = %sha256_hash,
                "persisted query not found, retrying with query text"
            );
            let mut retry = operation;
            retry.options.persisted_query = Some(PersistedQuery {
                sha256_hash,
                include_query: true
            });
            retry.options.fetch_method = FetchMethod::Post;
            return self.next.run::<Q>(retry).await;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::PersistedExchange;
    use crate::{
        exchange::{
            Exchange, ExchangeFactory, ExchangeResult, Operation, OperationOptions,
            OperationResult, OperationType, PersistedQuery
        },
        utils::sha256_hex,
        Error, FetchMethod, GraphQLQuery, RequestPolicy, Response
    };
    use serde::{Deserialize, Serialize};
    use std::{
        collections::{HashMap, VecDeque},
        sync::{Arc, Mutex}
    };

    struct GetSmlVersions;
    struct UpdateMod;

    #[derive(Serialize, Clone)]
    struct Variables;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct ResponseData {
        ok: bool
    }

    impl GraphQLQuery for GetSmlVersions {
        type Variables = Variables;
        type ResponseData = ResponseData;

        const QUERY: &'static str = "query GetSMLVersions { getSMLVersions { count } }";
        const OPERATION_NAME: &'static str = "GetSMLVersions";
    }

    impl GraphQLQuery for UpdateMod {
        type Variables = Variables;
        type ResponseData = ResponseData;

        const QUERY: &'static str = "mutation UpdateMod { updateMod { id } }";
        const OPERATION_NAME: &'static str = "UpdateMod";
        const OPERATION_TYPE: OperationType = OperationType::Mutation;
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Sent {
        persisted: Option<PersistedQuery>,
        method: FetchMethod
    }

    /// Answers with the scripted error codes in order, then with data.
    #[derive(Clone, Default)]
    struct Server {
        sent: Arc<Mutex<Vec<Sent>>>,
        script: Arc<Mutex<VecDeque<&'static str>>>
    }

    impl Server {
        fn scripted(codes: &[&'static str]) -> Self {
            Server {
                sent: Arc::default(),
                script: Arc::new(Mutex::new(codes.iter().copied().collect()))
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl<TNext: Exchange> ExchangeFactory<TNext> for Server {
        type Output = Server;

        fn build(self, _next: TNext) -> Server {
            self
        }
    }

    #[async_trait]
    impl Exchange for Server {
        async fn run<Q: GraphQLQuery>(
            &self,
            operation: Operation<Q::Variables>
        ) -> ExchangeResult<Q::ResponseData> {
            self.sent.lock().unwrap().push(Sent {
                persisted: operation.options.persisted_query.clone(),
                method: operation.options.fetch_method
            });
            let code = self.script.lock().unwrap().pop_front();
            let response = match code {
                Some(code) => {
                    let mut extensions = HashMap::new();
                    extensions.insert("code".to_string(), serde_json::json!(code));
                    Response {
                        debug_info: None,
                        data: None,
                        errors: Some(vec![Error {
                            message: "persisted query error".to_string(),
                            locations: None,
                            path: None,
                            extensions: Some(extensions)
                        }])
                    }
                }
                None => Response {
                    debug_info: None,
                    data: Some(serde_json::from_value(serde_json::json!({ "ok": true }))?),
                    errors: None
                }
            };
            Ok(OperationResult {
                key: operation.key,
                meta: operation.meta,
                response
            })
        }
    }

    fn make_op<Q: GraphQLQuery>(variables: Q::Variables) -> Operation<Q::Variables> {
        let (query, meta) = Q::build_query(variables);
        Operation {
            key: meta.query_key as u64,
            meta,
            query,
            options: OperationOptions {
                url: "http://0.0.0.0/graphql".to_string(),
                extra_headers: None,
                request_policy: RequestPolicy::NetworkOnly,
                fetch_method: FetchMethod::Post,
                persisted_query: None
            }
        }
    }

    fn hash() -> String {
        sha256_hex(GetSmlVersions::QUERY)
    }

    #[tokio::test]
    async fn sends_hash_only_with_get() {
        let server = Server::scripted(&[]);
        let exchange = PersistedExchange::new()
            .prefer_get_for_persisted_queries(true)
            .build(server.clone());

        let result = exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();

        assert!(result.response.data.unwrap().ok);
        assert_eq!(
            server.sent(),
            vec![Sent {
                persisted: Some(PersistedQuery {
                    sha256_hash: hash(),
                    include_query: false
                }),
                method: FetchMethod::Get
            }]
        );
    }

    #[tokio::test]
    async fn keeps_post_without_get_preference() {
        let server = Server::scripted(&[]);
        let exchange = PersistedExchange::new().build(server.clone());

        exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();

        assert_eq!(server.sent()[0].method, FetchMethod::Post);
    }

    #[tokio::test]
    async fn retries_with_query_text_when_not_found() {
        let server = Server::scripted(&["PERSISTED_QUERY_NOT_FOUND"]);
        let exchange = PersistedExchange::new()
            .prefer_get_for_persisted_queries(true)
            .build(server.clone());

        let result = exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();

        assert!(result.response.errors.is_none());
        let sent = server.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            Sent {
                persisted: Some(PersistedQuery {
                    sha256_hash: hash(),
                    include_query: true
                }),
                method: FetchMethod::Post
            }
        );
        assert!(exchange.is_supported());
    }

    #[tokio::test]
    async fn disables_itself_when_not_supported() {
        let server = Server::scripted(&["PERSISTED_QUERY_NOT_SUPPORTED"]);
        let exchange = PersistedExchange::new()
            .prefer_get_for_persisted_queries(true)
            .build(server.clone());

        exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();
        exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();

        let sent = server.sent();
        assert!(!exchange.is_supported());
        assert_eq!(sent.len(), 3);
        assert!(sent[0].persisted.is_some());
        assert_eq!(sent[1].persisted, None);
        assert_eq!(sent[2].persisted, None);
    }

    #[tokio::test]
    async fn enforced_persisting_survives_not_supported() {
        let server = Server::scripted(&["PERSISTED_QUERY_NOT_SUPPORTED"]);
        let exchange = PersistedExchange::new()
            .enforce_persisted_queries(true)
            .build(server.clone());

        let result = exchange
            .run::<GetSmlVersions>(make_op::<GetSmlVersions>(Variables))
            .await
            .unwrap();

        assert!(result.response.has_errors());
        assert_eq!(server.sent().len(), 1);
    }

    #[tokio::test]
    async fn mutations_are_not_persisted_by_default() {
        let server = Server::scripted(&[]);
        let exchange = PersistedExchange::new()
            .prefer_get_for_persisted_queries(true)
            .build(server.clone());

        exchange
            .run::<UpdateMod>(make_op::<UpdateMod>(Variables))
            .await
            .unwrap();

        assert_eq!(
            server.sent(),
            vec![Sent {
                persisted: None,
                method: FetchMethod::Post
            }]
        );
    }

    #[tokio::test]
    async fn persisted_mutations_stay_on_post() {
        let server = Server::scripted(&[]);
        let exchange = PersistedExchange::new()
            .prefer_get_for_persisted_queries(true)
            .enable_for_mutation(true)
            .build(server.clone());

        exchange
            .run::<UpdateMod>(make_op::<UpdateMod>(Variables))
            .await
            .unwrap();

        let sent = server.sent();
        assert!(sent[0].persisted.is_some());
        assert_eq!(sent[0].method, FetchMethod::Post);
    }
}
