//! koios-core: transport-independent runtime of the Koios REST client.
//!
//! # Overview
//!
//! The HTTP client in `koios-http` is a thin shell around the pieces defined
//! here:
//!
//! - [`config`]: defaults, [`ClientOption`]s and the derived base URL
//! - [`state`]: [`ClientState`], the single lock over configuration and the
//!   rate-limit watermark
//! - [`rate_limiter`]: minimum spacing between request start times
//! - [`stats`]: optional per-request phase timing
//! - [`response`]: the [`Response`] envelope and the generic [`decode`]
//!   sequence every endpoint goes through
//! - [`error`]: [`KoiosError`] and [`RequestFailure`]

pub mod config;
pub mod error;
pub mod rate_limiter;
pub mod response;
pub mod state;
pub mod stats;

pub use config::{
    ClientConfig, ClientDefaults, ClientOption, Headers, TransportSettings, DEFAULT_API_VERSION,
    DEFAULT_ORIGIN, DEFAULT_PORT, DEFAULT_RATE_LIMIT, DEFAULT_SCHEMA, DEFAULT_TIMEOUT, GUILD_HOST,
    LIBRARY_VERSION, MAINNET_HOST, TESTNET_HOST,
};
pub use error::{KoiosError, RequestFailure, Result};
pub use rate_limiter::{RateLimit, RateLimitState};
pub use response::{decode, read_body, ApiResponse, RawResponse, Response, ResponseError};
pub use state::ClientState;
pub use stats::{mark_current, Phase, RequestStats, StatsCollector};
