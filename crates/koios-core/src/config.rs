//! Client configuration: defaults, options and the derived base URL.
//!
//! Configuration is plain data here. Locking lives in [`crate::state`];
//! every mutation goes through [`ClientConfig::apply`], which recomputes the
//! base URL on a scratch copy so a failed option never leaves partial state.

use std::time::Duration;

use url::Url;

use crate::error::{KoiosError, Result};

/// Primary and default API host.
pub const MAINNET_HOST: &str = "api.koios.rest";
/// Guild network host.
pub const GUILD_HOST: &str = "guild.koios.rest";
/// Testnet host.
pub const TESTNET_HOST: &str = "testnet.koios.rest";
/// API version path segment, e.g. `/api/v0`.
pub const DEFAULT_API_VERSION: &str = "v0";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_SCHEMA: &str = "https";
/// Outgoing requests per second.
pub const DEFAULT_RATE_LIMIT: u8 = 5;
pub const DEFAULT_ORIGIN: &str = "https://github.com/howijd/koios-rest-go-client";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Library version reported in the `User-Agent` header.
pub const LIBRARY_VERSION: &str = "v0";

const PROJECT_URL: &str = "https://github.com/howijd/koios-rest-rs";

/// Settings for the underlying HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Total request timeout. Zero is rejected.
    pub timeout: Duration,
    /// Optional timeout for establishing the connection.
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
        }
    }
}

impl TransportSettings {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Rejects a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(KoiosError::InvalidConfiguration(
                "transport timeout should never be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Immutable defaults applied before caller options at construction.
#[derive(Debug, Clone)]
pub struct ClientDefaults {
    pub host: String,
    pub api_version: String,
    pub port: u16,
    pub schema: String,
    pub rate_limit: u8,
    pub origin: String,
    pub transport: TransportSettings,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            host: MAINNET_HOST.into(),
            api_version: DEFAULT_API_VERSION.into(),
            port: DEFAULT_PORT,
            schema: DEFAULT_SCHEMA.into(),
            rate_limit: DEFAULT_RATE_LIMIT,
            origin: DEFAULT_ORIGIN.into(),
            transport: TransportSettings::default(),
        }
    }
}

/// A single configuration change.
#[derive(Debug, Clone)]
pub enum ClientOption {
    Host(String),
    ApiVersion(String),
    Port(u16),
    Schema(String),
    /// Requests per second, 1-255.
    RateLimit(u8),
    /// Value of the `Origin` header; must be an absolute URL.
    Origin(String),
    /// Add or replace a header sent with every request.
    CommonHeader(String, String),
    CollectRequestStats(bool),
    /// Only accepted while the client is being constructed.
    Transport(TransportSettings),
}

impl ClientOption {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Host(_) => "host",
            Self::ApiVersion(_) => "api_version",
            Self::Port(_) => "port",
            Self::Schema(_) => "schema",
            Self::RateLimit(_) => "rate_limit",
            Self::Origin(_) => "origin",
            Self::CommonHeader(..) => "common_header",
            Self::CollectRequestStats(_) => "collect_request_stats",
            Self::Transport(_) => "transport",
        }
    }
}

/// Ordered, case-insensitive header list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name`, replacing an existing header of the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    host: String,
    api_version: String,
    port: u16,
    schema: String,
    origin: String,
    common_headers: Headers,
    collect_stats: bool,
    base_url: String,
}

impl ClientConfig {
    /// Build the configuration from `defaults`. Fails only if the defaults
    /// themselves do not form a valid URL or origin.
    pub fn from_defaults(defaults: &ClientDefaults) -> Result<Self> {
        let mut common_headers = Headers::new();
        common_headers.set("Accept", "application/json");
        common_headers.set("Accept-Encoding", "gzip, deflate");
        common_headers.set("User-Agent", user_agent());

        let mut config = Self {
            host: defaults.host.clone(),
            api_version: defaults.api_version.clone(),
            port: defaults.port,
            schema: parse_schema(&defaults.schema)?,
            origin: parse_origin(&defaults.origin)?,
            common_headers,
            collect_stats: false,
            base_url: String::new(),
        };
        config.base_url = config.compose_base_url()?;
        Ok(config)
    }

    /// Apply `option`. On error the configuration is left untouched.
    ///
    /// `RateLimit` and `Transport` are not configuration fields and are
    /// rejected here; the owning state and client handle them.
    pub fn apply(&mut self, option: ClientOption) -> Result<()> {
        let mut next = self.clone();
        match option {
            ClientOption::Host(host) => next.host = host,
            ClientOption::ApiVersion(version) => next.api_version = version,
            ClientOption::Port(port) => next.port = port,
            ClientOption::Schema(schema) => next.schema = parse_schema(&schema)?,
            ClientOption::Origin(origin) => next.origin = parse_origin(&origin)?,
            ClientOption::CommonHeader(name, value) => next.common_headers.set(name, value),
            ClientOption::CollectRequestStats(enabled) => next.collect_stats = enabled,
            other @ (ClientOption::RateLimit(_) | ClientOption::Transport(_)) => {
                return Err(KoiosError::InvalidArgument(format!(
                    "{} is not a configuration field",
                    other.name()
                )));
            }
        }
        next.base_url = next.compose_base_url()?;
        *self = next;
        Ok(())
    }

    fn compose_base_url(&self) -> Result<String> {
        let raw = format!(
            "{}://{}:{}/api/{}",
            self.schema, self.host, self.port, self.api_version
        );
        let parsed = Url::parse(&raw)?;
        if !parsed.has_host() {
            return Err(KoiosError::InvalidConfiguration(format!(
                "base url {raw} has no host"
            )));
        }
        Ok(raw)
    }

    /// `schema://host:port/api/version`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn common_headers(&self) -> &Headers {
        &self.common_headers
    }

    pub fn collect_stats(&self) -> bool {
        self.collect_stats
    }
}

fn parse_schema(schema: &str) -> Result<String> {
    match schema {
        "http" | "https" => Ok(schema.to_string()),
        other => Err(KoiosError::InvalidConfiguration(format!(
            "url schema must be http or https, got {other:?}"
        ))),
    }
}

fn parse_origin(origin: &str) -> Result<String> {
    let url = Url::parse(origin).map_err(|e| {
        KoiosError::InvalidConfiguration(format!("origin {origin:?} is not an absolute url: {e}"))
    })?;
    if !url.has_host() {
        return Err(KoiosError::InvalidConfiguration(format!(
            "origin {origin:?} has no host"
        )));
    }
    Ok(origin.to_string())
}

/// `koios-rs/v0 (Linux x86_64) linux/x86_64 https://...`
pub fn user_agent() -> String {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!(
        "koios-rs/{LIBRARY_VERSION} ({} {arch}) {os}/{arch} {PROJECT_URL}",
        title_case(os)
    )
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
