use crate::{
    exchange::{Exchange, Operation, OperationMeta, OperationOptions},
    types::HeaderFn,
    utils::progressive_hash,
    FetchMethod, GraphQLQuery, QueryBody, QueryError, QueryOptions, RequestPolicy, Response
};

pub struct ClientImpl<M: Exchange> {
    pub(crate) url: String,
    pub(crate) exchange: M,
    pub(crate) extra_headers: Option<HeaderFn>,
    pub(crate) request_policy: RequestPolicy,
    pub(crate) fetch_method: FetchMethod
}

impl<M: Exchange> ClientImpl<M> {
    pub(crate) async fn execute_request_operation<Q: GraphQLQuery>(
        &self,
        operation: Operation<Q::Variables>
    ) -> Result<Response<Q::ResponseData>, QueryError> {
        tracing::debug!(
            operation = Q::OPERATION_NAME,
            key = operation.key,
            policy = ?operation.options.request_policy,
            "executing operation"
        );
        self.exchange
            .run::<Q>(operation)
            .await
            .map(|operation_result| operation_result.response)
    }

    pub async fn query<Q: GraphQLQuery>(
        &self,
        _query: Q,
        variables: Q::Variables
    ) -> Result<Response<Q::ResponseData>, QueryError> {
        self.query_with_options(_query, variables, QueryOptions::default())
            .await
    }

    pub async fn query_with_options<Q: GraphQLQuery>(
        &self,
        _query: Q,
        variables: Q::Variables,
        options: QueryOptions
    ) -> Result<Response<Q::ResponseData>, QueryError> {
        let (query, meta) = Q::build_query(variables);
        let operation = self.create_request_operation::<Q>(query, meta, options);
        self.execute_request_operation::<Q>(operation).await
    }

    pub(crate) fn create_request_operation<Q: GraphQLQuery>(
        &self,
        query: QueryBody<Q::Variables>,
        meta: OperationMeta,
        options: QueryOptions
    ) -> Operation<Q::Variables> {
        let extra_headers = options
            .extra_headers
            .or_else(|| self.extra_headers.clone());

        Operation {
            key: progressive_hash(meta.query_key, &query.variables),
            meta,
            query,
            options: OperationOptions {
                url: options.url.unwrap_or_else(|| self.url.clone()),
                extra_headers,
                request_policy: options.request_policy.unwrap_or(self.request_policy),
                fetch_method: options.fetch_method.unwrap_or(self.fetch_method),
                persisted_query: None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
        ClientBuilder, DebugInfo, FetchMethod, GraphQLQuery, HeaderPair, QueryOptions,
        RequestPolicy, Response, ResultSource
    };
    use serde::{Deserialize, Serialize};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Captured {
        url: String,
        policy: RequestPolicy,
        method: FetchMethod,
        headers: Vec<(String, String)>,
        key: u64
    }

    struct GetVersion;

    #[derive(Serialize, Clone)]
    struct Variables {
        id: String
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct ResponseData {
        version: String
    }

    impl GraphQLQuery for GetVersion {
        type Variables = Variables;
        type ResponseData = ResponseData;

        const QUERY: &'static str = "query GetVersion($id: VersionID!) { version(id: $id) }";
        const OPERATION_NAME: &'static str = "GetVersion";
    }

    struct Recorder(Arc<Mutex<Vec<Captured>>>);

    impl<TNext: Exchange> ExchangeFactory<TNext> for Recorder {
        type Output = Recorder;

        fn build(self, _next: TNext) -> Recorder {
            self
        }
    }

    #[async_trait]
    impl Exchange for Recorder {
        async fn run<Q: GraphQLQuery>(
            &self,
            operation: Operation<Q::Variables>
        ) -> ExchangeResult<Q::ResponseData> {
            let headers = operation
                .options
                .extra_headers
                .as_ref()
                .map(|headers| headers())
                .unwrap_or_default()
                .into_iter()
                .map(|HeaderPair(key, value)| (key, value))
                .collect();
            self.0.lock().unwrap().push(Captured {
                url: operation.options.url.clone(),
                policy: operation.options.request_policy,
                method: operation.options.fetch_method,
                headers,
                key: operation.key
            });
            Ok(OperationResult {
                key: operation.key,
                meta: operation.meta,
                response: Response {
                    debug_info: Some(DebugInfo::from_source(ResultSource::Network)),
                    data: None,
                    errors: None
                }
            })
        }
    }

    fn variables(id: &str) -> Variables {
        Variables { id: id.to_string() }
    }

    #[tokio::test]
    async fn applies_client_defaults() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let client = ClientBuilder::new("http://localhost:4000/graphql")
            .with_exchange(Recorder(sink.clone()))
            .with_request_policy(RequestPolicy::NetworkOnly)
            .with_extra_headers(|| vec![HeaderPair("x-token".into(), "secret".into())])
            .build();

        client.query(GetVersion, variables("1")).await.unwrap();

        let captured = sink.lock().unwrap();
        assert_eq!(captured[0].url, "http://localhost:4000/graphql");
        assert_eq!(captured[0].policy, RequestPolicy::NetworkOnly);
        assert_eq!(captured[0].method, FetchMethod::Post);
        assert_eq!(
            captured[0].headers,
            vec![("x-token".to_string(), "secret".to_string())]
        );
    }

    #[tokio::test]
    async fn query_options_override_defaults() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let client = ClientBuilder::new("http://localhost:4000/graphql")
            .with_exchange(Recorder(sink.clone()))
            .build();

        let options = QueryOptions {
            url: Some("http://localhost:5000/graphql".to_string()),
            request_policy: Some(RequestPolicy::CacheOnly),
            fetch_method: Some(FetchMethod::Get),
            ..QueryOptions::default()
        };
        client
            .query_with_options(GetVersion, variables("1"), options)
            .await
            .unwrap();

        let captured = sink.lock().unwrap();
        assert_eq!(captured[0].url, "http://localhost:5000/graphql");
        assert_eq!(captured[0].policy, RequestPolicy::CacheOnly);
        assert_eq!(captured[0].method, FetchMethod::Get);
        assert!(captured[0].headers.is_empty());
    }

    #[tokio::test]
    async fn operation_key_depends_on_variables() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let client = ClientBuilder::new("http://localhost:4000/graphql")
            .with_exchange(Recorder(sink.clone()))
            .build();

        client.query(GetVersion, variables("1")).await.unwrap();
        client.query(GetVersion, variables("1")).await.unwrap();
        client.query(GetVersion, variables("2")).await.unwrap();

        let captured = sink.lock().unwrap();
        assert_eq!(captured[0].key, captured[1].key);
        assert_ne!(captured[0].key, captured[2].key);
    }

    #[tokio::test]
    async fn empty_chain_is_an_error() {
        let client = ClientBuilder::new("http://localhost:4000/graphql").build();
        let error = client.query(GetVersion, variables("1")).await.unwrap_err();

        assert_eq!(error.to_string(), "unexpected end of exchange chain");
    }
}
