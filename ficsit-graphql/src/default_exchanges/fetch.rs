use crate::{
    exchange::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationOptions, OperationResult,
        PersistedQuery
    },
    DebugInfo, FetchMethod, GraphQLQuery, HeaderPair, QueryBody, Response, ResultSource
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// GET requests whose URL would reach this length are sent as POST instead.
pub const MAX_GET_URL_LENGTH: usize = 2048;

const ACCEPT_GRAPHQL: &str = "application/graphql-response+json, application/json";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),
    #[error("fetch error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("encoding error: {0}")]
    EncodeError(#[source] serde_json::Error),
    #[error("decoding error: {0}")]
    DecodeError(#[source] serde_json::Error),
    #[error("server returned error code: {0}\n{1}")]
    NotOk(u16, String)
}

/// The default fetch exchange
///
/// Uses `reqwest`. The HTTP client is created when the first operation is sent, so building a
/// client never touches the network.
pub struct FetchExchange;

impl<TNext: Exchange> ExchangeFactory<TNext> for FetchExchange {
    type Output = FetchExchangeImpl;

    fn build(self, _next: TNext) -> Self::Output {
        FetchExchangeImpl {
            http: OnceLock::new()
        }
    }
}

pub struct FetchExchangeImpl {
    http: OnceLock<reqwest::Client>
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedQueryExtension<'a> {
    version: u32,
    sha256_hash: &'a str
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestExtensions<'a> {
    persisted_query: PersistedQueryExtension<'a>
}

impl<'a> RequestExtensions<'a> {
    fn from_persisted(persisted: &'a PersistedQuery) -> Self {
        RequestExtensions {
            persisted_query: PersistedQueryExtension {
                version: 1,
                sha256_hash: &persisted.sha256_hash
            }
        }
    }
}

/// The request as it goes over the wire. `query` is left out for persisted queries the server
/// is expected to know.
#[derive(Serialize)]
struct FetchBody<'a, V: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'static str>,
    #[serde(rename = "operationName")]
    operation_name: &'static str,
    variables: &'a V,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<RequestExtensions<'a>>
}

impl<'a, V: Serialize + Send + Sync + Clone> FetchBody<'a, V> {
    fn new(query: &'a QueryBody<V>, persisted: Option<&'a PersistedQuery>) -> Self {
        let include_query = persisted.map(|p| p.include_query).unwrap_or(true);
        FetchBody {
            query: if include_query { Some(query.query) } else { None },
            operation_name: query.operation_name,
            variables: &query.variables,
            extensions: persisted.map(RequestExtensions::from_persisted)
        }
    }

    fn url_params(&self) -> Result<Vec<(&'static str, String)>, FetchError> {
        let mut params = Vec::with_capacity(4);
        if let Some(query) = self.query {
            params.push(("query", query.to_string()));
        }
        params.push(("operationName", self.operation_name.to_string()));

        let variables = serde_json::to_value(self.variables).map_err(FetchError::EncodeError)?;
        if !variables.is_null() {
            params.push(("variables", variables.to_string()));
        }
        if let Some(ref extensions) = self.extensions {
            let extensions =
                serde_json::to_string(extensions).map_err(FetchError::EncodeError)?;
            params.push(("extensions", extensions));
        }
        Ok(params)
    }
}

fn with_headers(
    mut request: reqwest::RequestBuilder,
    extra_headers: Vec<HeaderPair>
) -> reqwest::RequestBuilder {
    for HeaderPair(key, value) in extra_headers {
        request = request.header(key, value);
    }
    request
}

impl FetchExchangeImpl {
    fn http(&self) -> Result<&reqwest::Client, FetchError> {
        if let Some(http) = self.http.get() {
            return Ok(http);
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(FetchError::InvalidRequest)?;
        Ok(self.http.get_or_init(|| http))
    }

    fn get_request<V: Serialize + Send + Sync + Clone>(
        http: &reqwest::Client,
        options: &OperationOptions,
        body: &FetchBody<'_, V>,
        extra_headers: Vec<HeaderPair>
    ) -> Result<Option<reqwest::Request>, FetchError> {
        let request = http
            .get(options.url.as_str())
            .query(&body.url_params()?)
            .header(ACCEPT, ACCEPT_GRAPHQL);
        let request = with_headers(request, extra_headers)
            .build()
            .map_err(FetchError::InvalidRequest)?;

        if request.url().as_str().len() >= MAX_GET_URL_LENGTH {
            tracing::debug!(
                operation = body.operation_name,
                "GET url too long, falling back to POST"
            );
            Ok(None)
        } else {
            Ok(Some(request))
        }
    }

    fn post_request<V: Serialize + Send + Sync + Clone>(
        http: &reqwest::Client,
        options: &OperationOptions,
        body: &FetchBody<'_, V>,
        extra_headers: Vec<HeaderPair>
    ) -> Result<reqwest::Request, FetchError> {
        let request = http
            .post(options.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_GRAPHQL)
            .json(body);
        with_headers(request, extra_headers)
            .build()
            .map_err(FetchError::InvalidRequest)
    }

    async fn fetch<V, R>(&self, operation: &Operation<V>) -> Result<Response<R>, FetchError>
    where
        V: Serialize + Send + Sync + Clone,
        R: DeserializeOwned + Clone
    {
        let http = self.http()?;
        let options = &operation.options;
        let extra_headers = || {
            options
                .extra_headers
                .as_ref()
                .map(|headers| headers())
                .unwrap_or_default()
        };
        let body = FetchBody::new(&operation.query, options.persisted_query.as_ref());

        let get = if options.fetch_method == FetchMethod::Get {
            Self::get_request(http, options, &body, extra_headers())?
        } else {
            None
        };
        let request = match get {
            Some(request) => request,
            None => Self::post_request(http, options, &body, extra_headers())?
        };

        tracing::debug!(
            operation = body.operation_name,
            method = %request.method(),
            persisted = body.extensions.is_some(),
            "sending request"
        );

        let response = http
            .execute(request)
            .await
            .map_err(FetchError::NetworkError)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(FetchError::NetworkError)?;

        match serde_json::from_slice::<Response<R>>(&bytes) {
            Ok(response) if status.is_success() => Ok(response),
            Ok(response) if response.data.is_some() || response.errors.is_some() => Ok(response),
            Err(e) if status.is_success() => Err(FetchError::DecodeError(e)),
            _ => Err(FetchError::NotOk(
                status.as_u16(),
                String::from_utf8_lossy(&bytes).into_owned()
            ))
        }
    }
}

#[async_trait]
impl Exchange for FetchExchangeImpl {
    async fn run<Q: GraphQLQuery>(
        &self,
        operation: Operation<Q::Variables>
    ) -> ExchangeResult<Q::ResponseData> {
        let mut response = self
            .fetch::<Q::Variables, Q::ResponseData>(&operation)
            .await?;
        response.debug_info = Some(DebugInfo::from_source(ResultSource::Network));

        Ok(OperationResult {
            key: operation.key,
            meta: operation.meta,
            response
        })
    }
}
