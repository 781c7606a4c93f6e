//! Per-request timing collection.
//!
//! When stats are enabled the client starts a [`StatsCollector`] for each
//! request and runs the request future inside [`StatsCollector::scope`].
//! Instrumentation points anywhere below (the DNS resolver, the transport)
//! stamp phases through [`mark_current`] without holding a reference to the
//! collector. With stats disabled nothing is allocated and `mark_current`
//! is a no-op.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

tokio::task_local! {
    static CURRENT: StatsCollector;
}

/// A request phase that can be stamped relative to the request start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DnsResolved,
    TlsHandshakeDone,
    Connected,
    FirstByte,
}

/// Timing of a single finished request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    pub started_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_lookup: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_handshake: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_establish: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_byte: Option<Duration>,
    pub total: Duration,
    /// Human readable form of `total`.
    pub total_str: String,
}

#[derive(Debug, Default)]
struct Marks {
    dns: Option<Duration>,
    tls: Option<Duration>,
    connect: Option<Duration>,
    ttfb: Option<Duration>,
    finished: Option<RequestStats>,
}

/// Collects phase timestamps for one in-flight request.
///
/// Cheap to clone; clones share the same record.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    started: Instant,
    started_at: SystemTime,
    tls: bool,
    marks: Arc<Mutex<Marks>>,
}

impl StatsCollector {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: SystemTime::now(),
            tls: false,
            marks: Arc::new(Mutex::new(Marks::default())),
        }
    }

    /// Whether the request runs over TLS. Plain requests ignore
    /// [`Phase::TlsHandshakeDone`].
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Marks> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp `phase` with the time elapsed since start.
    ///
    /// The first stamp wins; marks after [`finish`](Self::finish) are ignored.
    pub fn mark(&self, phase: Phase) {
        let elapsed = self.started.elapsed();
        let mut marks = self.lock();
        if marks.finished.is_some() || (phase == Phase::TlsHandshakeDone && !self.tls) {
            return;
        }
        let slot = match phase {
            Phase::DnsResolved => &mut marks.dns,
            Phase::TlsHandshakeDone => &mut marks.tls,
            Phase::Connected => &mut marks.connect,
            Phase::FirstByte => &mut marks.ttfb,
        };
        if slot.is_none() {
            *slot = Some(elapsed);
        }
    }

    /// Finalise the record. Idempotent: later calls return the same record.
    pub fn finish(&self) -> RequestStats {
        let mut marks = self.lock();
        if let Some(done) = &marks.finished {
            return done.clone();
        }
        let total = self.started.elapsed();
        let stats = RequestStats {
            started_at: self.started_at,
            dns_lookup: marks.dns,
            tls_handshake: marks.tls,
            connection_establish: marks.connect,
            time_to_first_byte: marks.ttfb,
            total,
            total_str: format!("{total:?}"),
        };
        tracing::trace!(total_ms = total.as_millis() as u64, "request stats finalised");
        marks.finished = Some(stats.clone());
        stats
    }

    /// Run `fut` with this collector visible to [`mark_current`].
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }
}

/// Stamp `phase` on the collector of the request being driven by the
/// current task, if any. Never fails.
pub fn mark_current(phase: Phase) {
    let _ = CURRENT.try_with(|c| c.mark(phase));
}
