//! Error types shared by the configuration layer and the request path.

use thiserror::Error;

use crate::response::{Response, ResponseError};

/// Errors produced by the client runtime.
#[derive(Debug, Clone, Error)]
pub enum KoiosError {
    /// An option carried an unusable value (zero rate limit, zero transport
    /// timeout, origin that is not an absolute URL, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Attempt to replace configuration that can only be set once.
    #[error("configuration is immutable: {0}")]
    ConfigurationImmutable(String),

    /// The call itself was malformed (multiple query sets, missing identifier).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network, DNS, TLS, timeout or cancellation failure before a response existed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response content-type does not contain `json`. `body` holds the
    /// raw response bytes.
    #[error("got non json response: {}", String::from_utf8_lossy(.body))]
    NotJson { body: Vec<u8> },

    /// The body was present but did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The service answered with a non-200 status.
    #[error("remote error {status}: {}", .error.as_ref().map(|e| e.message.as_str()).unwrap_or(""))]
    Remote {
        status: u16,
        error: Option<ResponseError>,
    },

    /// A by-key lookup returned no item.
    #[error("not found: {0}")]
    NotFound(String),
}

impl KoiosError {
    /// Returns `true` for errors raised while configuring a client.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::ConfigurationImmutable(_)
        )
    }

    /// Returns `true` if no HTTP response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for KoiosError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<url::ParseError> for KoiosError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}

/// A failed request: the error kind together with the envelope populated
/// up to the point of failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct RequestFailure {
    pub kind: KoiosError,
    pub response: Box<Response>,
}

impl RequestFailure {
    pub fn new(kind: KoiosError, response: Response) -> Self {
        Self {
            kind,
            response: Box::new(response),
        }
    }

    /// A failure detected before any request identity existed, e.g. a
    /// missing identifier.
    pub fn rejected(kind: KoiosError) -> Self {
        let mut response = Response::default();
        response.apply_error(None, Some(&kind));
        Self::new(kind, response)
    }

    /// HTTP status of the failed request, `0` if none was received.
    pub fn status_code(&self) -> u16 {
        self.response.status_code
    }
}

/// Convenience result alias for configuration operations.
pub type Result<T, E = KoiosError> = std::result::Result<T, E>;
