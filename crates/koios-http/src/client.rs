//! Koios REST client backed by `reqwest`.
//!
//! Features:
//! - Global per-client rate limit (minimum spacing between request starts)
//! - Base URL composed from host, port, schema and API version, changeable at runtime
//! - Optional per-request timing stats
//! - One generic decode path for every endpoint ([`Client::call`])

use std::error::Error as _;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::{form_urlencoded, Url};

use koios_core::config::{ClientConfig, ClientDefaults, ClientOption, Headers, TransportSettings};
use koios_core::error::{KoiosError, RequestFailure, Result};
use koios_core::rate_limiter::RateLimit;
use koios_core::response::{decode, ApiResponse, RawResponse, Response};
use koios_core::state::ClientState;
use koios_core::stats::{mark_current, Phase, StatsCollector};

use crate::connect::ConnectTimingLayer;
use crate::dns::TimedResolver;

pub use reqwest::Method;

/// Query parameters of a single request.
pub type QueryParams = Vec<(String, String)>;

/// One outgoing API call.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    body: Option<Vec<u8>>,
    query: Vec<QueryParams>,
    headers: Headers,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            headers: Headers::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a query parameter set. Only one set is accepted per request;
    /// a second one makes the request fail with `InvalidArgument`.
    pub fn query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.push(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Call-specific header; wins over a common header of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialise `payload` as the JSON body.
    pub fn json<T: Serialize>(self, payload: &T) -> Result<Self> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| KoiosError::InvalidArgument(format!("unserialisable body: {e}")))?;
        Ok(self.body(body).header("Content-Type", "application/json"))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

struct Inner {
    state: ClientState,
    http: reqwest::Client,
    transport: TransportSettings,
}

/// Thread-safe Koios API client.
///
/// Cheap to clone; clones share configuration, rate limiter and connection
/// pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client from [`ClientDefaults::default`] and `options`.
    pub fn new(options: impl IntoIterator<Item = ClientOption>) -> Result<Self> {
        Self::with_defaults(&ClientDefaults::default(), options)
    }

    /// Apply `defaults`, then `options` in order.
    ///
    /// At most one `Transport` option is accepted; without one the defaults'
    /// transport settings are installed.
    pub fn with_defaults(
        defaults: &ClientDefaults,
        options: impl IntoIterator<Item = ClientOption>,
    ) -> Result<Self> {
        let state = ClientState::new(defaults)?;
        let mut transport = None;
        for option in options {
            match option {
                ClientOption::Transport(settings) => {
                    if transport.is_some() {
                        return Err(transport_immutable());
                    }
                    settings.validate()?;
                    transport = Some(settings);
                }
                other => state.apply(other)?,
            }
        }
        let transport = match transport {
            Some(settings) => settings,
            None => {
                defaults.transport.validate()?;
                defaults.transport.clone()
            }
        };
        let http = build_http(&transport)?;

        Ok(Self {
            inner: Arc::new(Inner {
                state,
                http,
                transport,
            }),
        })
    }

    /// Apply an option to a live client.
    pub fn apply(&self, option: ClientOption) -> Result<()> {
        match option {
            ClientOption::Transport(_) => Err(transport_immutable()),
            other => {
                tracing::debug!(option = other.name(), "updating client configuration");
                self.inner.state.apply(other)
            }
        }
    }

    pub fn set_host(&self, host: impl Into<String>) -> Result<()> {
        self.apply(ClientOption::Host(host.into()))
    }

    pub fn set_api_version(&self, version: impl Into<String>) -> Result<()> {
        self.apply(ClientOption::ApiVersion(version.into()))
    }

    pub fn set_port(&self, port: u16) -> Result<()> {
        self.apply(ClientOption::Port(port))
    }

    pub fn set_schema(&self, schema: impl Into<String>) -> Result<()> {
        self.apply(ClientOption::Schema(schema.into()))
    }

    pub fn set_rate_limit(&self, reqps: u8) -> Result<()> {
        self.apply(ClientOption::RateLimit(reqps))
    }

    pub fn set_origin(&self, origin: impl Into<String>) -> Result<()> {
        self.apply(ClientOption::Origin(origin.into()))
    }

    pub fn set_common_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.apply(ClientOption::CommonHeader(name.into(), value.into()))
    }

    pub fn collect_request_stats(&self, enabled: bool) -> Result<()> {
        self.apply(ClientOption::CollectRequestStats(enabled))
    }

    pub fn base_url(&self) -> String {
        self.inner.state.read(|c| c.base_url().to_string())
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.inner.state.snapshot()
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.inner.state.rate_limit()
    }

    pub fn transport(&self) -> &TransportSettings {
        &self.inner.transport
    }

    /// Requests dispatched so far.
    pub fn total_requests(&self) -> u64 {
        self.inner.state.total_requests()
    }

    /// Execute `req` and buffer the response.
    ///
    /// Request identity is written to `envelope` before anything can fail.
    /// Status codes are not interpreted here; see [`decode`].
    pub async fn request(&self, envelope: &mut Response, req: Request) -> Result<RawResponse> {
        let Request {
            method,
            path,
            body,
            query,
            headers: call_headers,
        } = req;

        let (base_url, mut headers, collect_stats, tls) = self.inner.state.read(|c| {
            let mut headers = c.common_headers().clone();
            headers.set("Origin", c.origin());
            (
                c.base_url().to_string(),
                headers,
                c.collect_stats(),
                c.schema() == "https",
            )
        });
        envelope.begin(method.as_str(), &format!("{base_url}{path}"));

        if query.len() > 1 {
            return Err(KoiosError::InvalidArgument(
                "only a single query parameter set may be provided".into(),
            ));
        }
        let url = compose_url(&base_url, &path, query.first())?;
        envelope.begin(method.as_str(), &url);

        for (name, value) in call_headers.iter() {
            headers.set(name, value);
        }
        let header_map = to_header_map(&headers)?;

        self.inner.state.acquire().await;

        let collector = collect_stats.then(|| StatsCollector::start().with_tls(tls));
        if let Some(collector) = &collector {
            envelope.attach_collector(collector.clone());
        }

        tracing::debug!(method = %method, url = %url, "dispatching request");
        let mut builder = self.inner.http.request(method, url).headers(header_map);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let exchange = async move {
            let rsp = builder.send().await.map_err(transport_error)?;
            mark_current(Phase::FirstByte);
            let status = rsp.status();
            let headers = from_header_map(rsp.headers());
            let body = rsp.bytes().await.map_err(transport_error)?;
            Ok::<_, KoiosError>(RawResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body: body.to_vec(),
            })
        };
        let outcome = match collector {
            Some(collector) => collector.scope(exchange).await,
            None => exchange.await,
        };

        match &outcome {
            Ok(raw) => tracing::debug!(status = raw.status, bytes = raw.body.len(), "response received"),
            Err(e) => tracing::debug!(error = %e, "request failed"),
        }
        outcome
    }

    /// Execute `req` and drive the decode sequence into `ApiResponse<T>`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        req: Request,
    ) -> std::result::Result<ApiResponse<T>, RequestFailure> {
        let mut envelope = Response::default();
        let outcome = self.request(&mut envelope, req).await;
        decode(envelope, outcome)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.inner.state)
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}

fn transport_immutable() -> KoiosError {
    KoiosError::ConfigurationImmutable("http transport can only be set once, at construction".into())
}

fn build_http(settings: &TransportSettings) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(settings.timeout)
        .dns_resolver(Arc::new(TimedResolver))
        .connector_layer(ConnectTimingLayer);
    if let Some(connect_timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    builder
        .build()
        .map_err(|e| KoiosError::InvalidConfiguration(format!("failed to build http client: {e}")))
}

/// `base_url + path [+ ?query]`, kept verbatim (no default-port stripping).
fn compose_url(base_url: &str, path: &str, query: Option<&QueryParams>) -> Result<String> {
    let mut url = format!("{base_url}{path}");
    if let Some(params) = query.filter(|p| !p.is_empty()) {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        url.push('?');
        url.push_str(&encoded);
    }
    Url::parse(&url)
        .map_err(|e| KoiosError::InvalidArgument(format!("invalid request url {url:?}: {e}")))?;
    Ok(url)
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| KoiosError::InvalidArgument(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| KoiosError::InvalidArgument(format!("header value for {}: {e}", name.as_str())))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            headers.set(name.as_str(), value);
        }
    }
    headers
}

fn transport_error(e: reqwest::Error) -> KoiosError {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    KoiosError::Transport(msg)
}
