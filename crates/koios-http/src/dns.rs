//! DNS resolver that stamps lookup completion on the active stats collector.

use std::net::SocketAddr;

use koios_core::stats::{mark_current, Phase};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// System resolver (via tokio) with a timing hook.
///
/// The mark only lands when the lookup runs inside the requesting task;
/// connections reqwest establishes in the background are not attributed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedResolver;

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            // Port is replaced by the connector.
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            mark_current(Phase::DnsResolved);
            tracing::trace!(%host, count = addrs.len(), "resolved");
            Ok::<Addrs, BoxError>(Box::new(addrs.into_iter()))
        })
    }
}
