//! Response envelope and the decode contract shared by every endpoint.
//!
//! Every endpoint follows the same sequence, implemented once in [`decode`]:
//!
//! ```text
//! execute ──err──▶ apply_error(None, err)
//!    │
//! apply_response ─▶ read_body ──err──▶ apply_error(body, err)
//!                      │
//!                  json decode ──err──▶ apply_error(body, err)
//!                      │
//!                  status == 200 ──no──▶ apply_error(body, None)
//!                      │
//!                    ready ─▶ Ok(ApiResponse { response, data })
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Headers;
use crate::error::{KoiosError, RequestFailure};
use crate::stats::{RequestStats, StatsCollector};

/// A buffered HTTP response as handed over by the transport.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `Not Found`.
    pub reason: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

/// Error body reported by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub hint: String,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub message: String,
}

// The service sends `"hint": null` for absent fields.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(d).map(Option::unwrap_or_default)
}

// Derived struct visitors also accept JSON arrays; only objects are errors.
fn decode_error_body(body: &[u8]) -> Result<ResponseError, serde_json::Error> {
    match serde_json::from_slice::<serde_json::Value>(body)? {
        value @ serde_json::Value::Object(_) => serde_json::from_value(value),
        other => Err(serde::de::Error::custom(format!(
            "expected an error object, got {other}"
        ))),
    }
}

/// Request metadata attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub request_url: String,
    pub request_method: String,
    pub status_code: u16,
    /// Status line, e.g. `404 Not Found`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RequestStats>,
    #[serde(skip)]
    collector: Option<StatsCollector>,
}

impl Response {
    /// Record request identity before the call is made, so failures still
    /// carry it.
    pub fn begin(&mut self, method: &str, url: &str) {
        self.request_method = method.to_string();
        self.request_url = url.to_string();
    }

    pub fn attach_collector(&mut self, collector: StatsCollector) {
        self.collector = Some(collector);
    }

    pub fn collector(&self) -> Option<&StatsCollector> {
        self.collector.as_ref()
    }

    /// Copy status and selected headers from `raw`.
    pub fn apply_response(&mut self, raw: &RawResponse) {
        self.status_code = raw.status;
        self.status = format!("{} {}", raw.status, raw.reason).trim_end().to_string();
        self.date = raw.header("date").map(str::to_string);
        self.content_location = raw.header("content-location").map(str::to_string);
        self.content_range = raw.header("content-range").map(str::to_string);
    }

    /// Populate the error field from `body` and/or the local `err`.
    ///
    /// The body is decoded best-effort; when it yields no message the local
    /// error text is used, and failing that the raw body text.
    pub fn apply_error(&mut self, body: Option<&[u8]>, err: Option<&KoiosError>) {
        let mut error = ResponseError::default();
        let mut undecodable = None;
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            match decode_error_body(body) {
                Ok(decoded) => error = decoded,
                Err(e) => {
                    tracing::warn!(error = %e, "error body is not a structured error");
                    undecodable = Some(body);
                }
            }
        }
        if error.message.is_empty() {
            if let Some(err) = err {
                error.message = err.to_string();
            } else if let Some(body) = undecodable {
                error.message = String::from_utf8_lossy(body).into_owned();
            }
        }
        self.error = Some(error);
        self.ready();
    }

    /// Finalise stats, if collected.
    pub fn ready(&mut self) {
        if let Some(collector) = &self.collector {
            self.stats = Some(collector.finish());
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A typed result: envelope plus payload.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    #[serde(flatten)]
    pub response: Response,
    #[serde(rename = "response")]
    pub data: T,
}

impl<T> ApiResponse<Vec<T>> {
    /// Narrow a list result of a by-key lookup to its single item.
    ///
    /// Zero items is [`KoiosError::NotFound`]; more than one is
    /// [`KoiosError::Decode`].
    pub fn into_single(self) -> Result<ApiResponse<T>, RequestFailure> {
        let ApiResponse { mut response, data } = self;
        let mut items = data.into_iter();
        let err = match (items.next(), items.next()) {
            (Some(item), None) => {
                return Ok(ApiResponse {
                    response,
                    data: item,
                })
            }
            (None, _) => KoiosError::NotFound("no item found".into()),
            (Some(_), Some(_)) => KoiosError::Decode(format!(
                "expected a single item, got {}",
                2 + items.count()
            )),
        };
        let message = match &err {
            KoiosError::NotFound(msg) | KoiosError::Decode(msg) => msg.clone(),
            other => other.to_string(),
        };
        response.error = Some(ResponseError {
            message,
            ..ResponseError::default()
        });
        response.ready();
        Err(RequestFailure::new(err, response))
    }
}

/// Fail with `NotJson` unless the content type mentions json.
pub fn read_body(raw: &RawResponse) -> Result<&[u8], KoiosError> {
    let content_type = raw.header("content-type").unwrap_or_default();
    if !content_type.contains("json") {
        return Err(KoiosError::NotJson {
            body: raw.body.clone(),
        });
    }
    Ok(&raw.body)
}

/// Drive the fixed decode sequence for one call.
pub fn decode<T: DeserializeOwned>(
    mut response: Response,
    outcome: Result<RawResponse, KoiosError>,
) -> Result<ApiResponse<T>, RequestFailure> {
    let raw = match outcome {
        Ok(raw) => raw,
        Err(err) => {
            response.apply_error(None, Some(&err));
            return Err(RequestFailure::new(err, response));
        }
    };
    response.apply_response(&raw);

    let body = match read_body(&raw) {
        Ok(body) => body,
        Err(err) => {
            response.apply_error(Some(&raw.body), Some(&err));
            return Err(RequestFailure::new(err, response));
        }
    };

    let data = match serde_json::from_slice::<T>(body) {
        Ok(data) => data,
        Err(e) => {
            let err = KoiosError::from(e);
            response.apply_error(Some(body), Some(&err));
            // An error-shaped body on a failed status is a remote error,
            // not a decode problem.
            let kind = if raw.status == 200 {
                err
            } else {
                KoiosError::Remote {
                    status: raw.status,
                    error: response.error.clone(),
                }
            };
            return Err(RequestFailure::new(kind, response));
        }
    };

    if raw.status != 200 {
        response.apply_error(Some(body), None);
        let kind = KoiosError::Remote {
            status: raw.status,
            error: response.error.clone(),
        };
        return Err(RequestFailure::new(kind, response));
    }

    response.ready();
    Ok(ApiResponse { response, data })
}
