//! Locked client state: configuration plus rate-limit watermark.
//!
//! All lock acquisition is centralised here. Callers only get
//! read snapshots, whole-option mutations and [`ClientState::acquire`];
//! no guard ever escapes this module.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::config::{ClientConfig, ClientDefaults, ClientOption};
use crate::error::Result;
use crate::rate_limiter::{RateLimit, RateLimitState};

struct Inner {
    config: ClientConfig,
    limiter: RateLimitState,
}

/// Shared mutable state of one client.
pub struct ClientState {
    inner: RwLock<Inner>,
    total_requests: AtomicU64,
}

impl ClientState {
    pub fn new(defaults: &ClientDefaults) -> Result<Self> {
        let config = ClientConfig::from_defaults(defaults)?;
        let limiter = RateLimitState::new(RateLimit::new(defaults.rate_limit)?);
        Ok(Self {
            inner: RwLock::new(Inner { config, limiter }),
            total_requests: AtomicU64::new(0),
        })
    }

    // A panic while holding the lock cannot leave the state half-written:
    // every mutation is computed on a copy and swapped in.
    fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the current configuration under a shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&ClientConfig) -> R) -> R {
        f(&self.read_guard().config)
    }

    /// Clone of the current configuration.
    pub fn snapshot(&self) -> ClientConfig {
        self.read(Clone::clone)
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.read_guard().limiter.limit()
    }

    /// Apply one option under the exclusive lock.
    ///
    /// `Transport` is rejected by [`ClientConfig::apply`]; the client decides
    /// whether a transport may still be installed.
    pub fn apply(&self, option: ClientOption) -> Result<()> {
        match option {
            ClientOption::RateLimit(reqps) => {
                let limit = RateLimit::new(reqps)?;
                self.write_guard().limiter.set_limit(limit);
                Ok(())
            }
            other => self.write_guard().config.apply(other),
        }
    }

    /// Wait until this caller may dispatch a request.
    ///
    /// The slot is reserved under the exclusive lock; the sleep happens
    /// after the lock is released.
    pub async fn acquire(&self) -> Duration {
        let wait = {
            let now = tokio::time::Instant::now().into_std();
            let mut inner = self.write_guard();
            let wait = inner.limiter.reserve(now);
            self.total_requests.fetch_add(1, Ordering::Relaxed);
            wait
        };
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limited, delaying request");
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Number of requests that passed the limiter.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read_guard();
        f.debug_struct("ClientState")
            .field("config", &inner.config)
            .field("limiter", &inner.limiter)
            .field("total_requests", &self.total_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::KoiosError;

    fn state() -> ClientState {
        ClientState::new(&ClientDefaults::default()).unwrap()
    }

    #[test]
    fn zero_rate_limit_keeps_previous() {
        let s = state();
        s.apply(ClientOption::RateLimit(20)).unwrap();
        let err = s.apply(ClientOption::RateLimit(0)).unwrap_err();
        assert!(matches!(err, KoiosError::InvalidConfiguration(_)));
        assert_eq!(s.rate_limit().requests_per_second(), 20);
    }

    #[test]
    fn zero_default_rate_limit_fails_construction() {
        let defaults = ClientDefaults {
            rate_limit: 0,
            ..ClientDefaults::default()
        };
        assert!(ClientState::new(&defaults).is_err());
    }

    #[test]
    fn bad_origin_keeps_previous() {
        let s = state();
        s.apply(ClientOption::Origin("https://my.app".into())).unwrap();
        assert!(s.apply(ClientOption::Origin("my.app".into())).is_err());
        assert_eq!(s.read(|c| c.origin().to_string()), "https://my.app");
    }

    #[test]
    fn concurrent_setters_never_expose_stale_base_url() {
        let s = Arc::new(state());
        let writers: Vec<_> = (0..8u16)
            .map(|i| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for j in 0..50u16 {
                        s.apply(ClientOption::Port(1000 + i * 100 + j)).unwrap();
                    }
                })
            })
            .collect();
        let reader = {
            let s = Arc::clone(&s);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    s.read(|c| {
                        let expected = format!(
                            "{}://{}:{}/api/{}",
                            c.schema(),
                            c.host(),
                            c.port(),
                            c.api_version()
                        );
                        assert_eq!(c.base_url(), expected);
                    });
                }
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_spaces_sequential_calls() {
        let s = state();
        s.apply(ClientOption::RateLimit(10)).unwrap();
        let interval = Duration::from_millis(100);

        let mut starts = Vec::new();
        for _ in 0..5 {
            s.acquire().await;
            starts.push(tokio::time::Instant::now());
        }
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
        assert_eq!(s.total_requests(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_spaces_concurrent_callers() {
        let s = Arc::new(state());
        s.apply(ClientOption::RateLimit(50)).unwrap();
        let interval = Duration::from_millis(20);

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let s = Arc::clone(&s);
                tokio::spawn(async move {
                    s.acquire().await;
                    tokio::time::Instant::now()
                })
            })
            .collect();
        let mut starts: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= interval, "{:?}", pair[1] - pair[0]);
        }
    }

    #[tokio::test]
    async fn acquire_real_clock_tolerance() {
        let s = state();
        s.apply(ClientOption::RateLimit(20)).unwrap();
        let begin = std::time::Instant::now();
        for _ in 0..4 {
            s.acquire().await;
        }
        // three enforced gaps of 50ms
        assert!(begin.elapsed() >= Duration::from_millis(145));
    }
}
