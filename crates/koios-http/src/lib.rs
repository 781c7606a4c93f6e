//! koios-http: Koios REST API client over `reqwest`.
//!
//! # Overview
//!
//! - [`Client`]: configuration, rate limiting and the generic [`Client::call`]
//! - [`Request`]: method, path, a single query set, headers and body
//! - [`endpoints`]: typed wrappers (assets)
//! - [`TimedResolver`], [`ConnectTimingLayer`]: DNS and connect hooks feeding
//!   request stats
//!
//! ```no_run
//! use koios_http::{Client, ClientOption, PolicyId, AssetName};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new([ClientOption::RateLimit(2)])?;
//! let info = client
//!     .asset_info(&PolicyId::from("d3501d9531fcc25e3ca4b6429318c2cc374dbdbcf5e99c1c1e5da1ff"), &AssetName::from("444f4e"))
//!     .await?;
//! println!("{}", info.data.total_supply);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connect;
pub mod dns;
pub mod endpoints;
pub mod types;

pub use client::{Client, Method, QueryParams, Request};
pub use connect::{ConnectTiming, ConnectTimingLayer};
pub use dns::TimedResolver;
pub use endpoints::*;
pub use types::{Address, AssetName, Lovelace, PolicyId, TxHash};

pub use koios_core::{
    ApiResponse, ClientConfig, ClientDefaults, ClientOption, KoiosError, RateLimit, RawResponse,
    RequestFailure, RequestStats, Response, ResponseError, TransportSettings, DEFAULT_API_VERSION,
    DEFAULT_ORIGIN, DEFAULT_PORT, DEFAULT_RATE_LIMIT, DEFAULT_SCHEMA, GUILD_HOST, LIBRARY_VERSION,
    MAINNET_HOST, TESTNET_HOST,
};
