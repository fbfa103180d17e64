//! Login rate limiting.
//!
//! Uses the governor crate to limit login attempts per client IP and
//! globally. Per-IP limiters live in an LRU cache so a flood of distinct
//! addresses cannot grow memory without bound.

use axum::http::HeaderMap;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use lru::LruCache;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::{NonZeroU32, NonZeroUsize},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use thiserror::Error;

/// Default per-IP login attempt limit (attempts per window).
pub const DEFAULT_LOGIN_RATE_PER_IP: u32 = 5;

/// Default global login attempt limit (attempts per window).
pub const DEFAULT_LOGIN_RATE_GLOBAL: u32 = 100;

/// Default rate limit window in seconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default maximum entries in the rate limiter LRU cache.
pub const DEFAULT_RATE_LIMIT_MAX_ENTRIES: usize = 10_000;

/// Environment variable name for configuring max entries.
pub const RATE_LIMIT_MAX_ENTRIES_ENV: &str = "RATE_LIMIT_MAX_ENTRIES";

/// Comma-separated proxy addresses whose forwarding headers are believed.
pub const TRUSTED_PROXIES_ENV: &str = "TM_TRUSTED_PROXIES";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

fn get_max_entries() -> usize {
    env::var(RATE_LIMIT_MAX_ENTRIES_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_ENTRIES)
}

/// Reads [`TRUSTED_PROXIES_ENV`], skipping entries that are not IP addresses.
pub fn trusted_proxies_from_env() -> Vec<IpAddr> {
    env::var(TRUSTED_PROXIES_ENV)
        .map(|v| parse_proxy_list(&v))
        .unwrap_or_default()
}

fn parse_proxy_list(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = s, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

fn quota(window: Duration, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window)
        .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
        .allow_burst(burst)
}

/// Registers rate limiter metric descriptions.
pub fn register_rate_limit_metrics() {
    describe_gauge!(
        "temuan_rate_limiter_ip_cache_size",
        "Current number of IP addresses tracked by the login rate limiter"
    );
    describe_counter!(
        "temuan_rate_limiter_evictions_total",
        "Total number of LRU cache evictions in the login rate limiter"
    );
}

/// Errors returned when a login attempt is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Too many login attempts from this address. Please try again later.")]
    PerIpLimitExceeded,
    #[error("Too many login attempts. Please try again later.")]
    GlobalLimitExceeded,
}

struct IpEntry {
    limiter: Arc<DirectRateLimiter>,
    last_seen: Instant,
}

/// Per-IP and global login rate limiter. Both limits must pass.
#[derive(Clone)]
pub struct LoginRateLimiter {
    per_ip: Arc<Mutex<LruCache<IpAddr, IpEntry>>>,
    global: Arc<DirectRateLimiter>,
    per_ip_limit: u32,
    window: Duration,
    max_entries: usize,
    evictions: Arc<AtomicU64>,
    trusted_proxies: Arc<Vec<IpAddr>>,
}

impl LoginRateLimiter {
    /// Creates a limiter with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_LOGIN_RATE_PER_IP,
            DEFAULT_LOGIN_RATE_GLOBAL,
            Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        )
    }

    /// Creates a limiter allowing `per_ip_limit` attempts per address and
    /// `global_limit` attempts overall in each `window`.
    pub fn with_config(per_ip_limit: u32, global_limit: u32, window: Duration) -> Self {
        Self::with_config_and_max_entries(per_ip_limit, global_limit, window, get_max_entries())
    }

    pub fn with_config_and_max_entries(
        per_ip_limit: u32,
        global_limit: u32,
        window: Duration,
        max_entries: usize,
    ) -> Self {
        let max_entries = max_entries.max(1);
        let cache_size = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            per_ip: Arc::new(Mutex::new(LruCache::new(cache_size))),
            global: Arc::new(RateLimiter::direct(quota(window, global_limit))),
            per_ip_limit,
            window,
            max_entries,
            evictions: Arc::new(AtomicU64::new(0)),
            trusted_proxies: Arc::new(Vec::new()),
        }
    }

    /// Sets the proxies allowed to report the client address through
    /// `X-Forwarded-For` or `X-Real-IP`.
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::new(proxies);
        self
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }

    /// Resolves the address a login attempt is counted against.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        client_ip(headers, peer, &self.trusted_proxies)
    }

    /// Checks whether a login attempt from `ip` is allowed.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        if self.global.check().is_err() {
            tracing::warn!(ip = %ip, "Global login rate limit exceeded");
            return Err(RateLimitError::GlobalLimitExceeded);
        }

        if self.limiter_for(ip).check().is_err() {
            tracing::warn!(
                ip = %ip,
                limit = self.per_ip_limit,
                window_secs = self.window.as_secs(),
                "Per-IP login rate limit exceeded"
            );
            return Err(RateLimitError::PerIpLimitExceeded);
        }

        Ok(())
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<IpAddr, IpEntry>> {
        self.per_ip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn limiter_for(&self, ip: IpAddr) -> Arc<DirectRateLimiter> {
        let mut cache = self.cache();

        if let Some(entry) = cache.get_mut(&ip) {
            entry.last_seen = Instant::now();
            return entry.limiter.clone();
        }

        let limiter = Arc::new(RateLimiter::direct(quota(self.window, self.per_ip_limit)));
        let entry = IpEntry {
            limiter: limiter.clone(),
            last_seen: Instant::now(),
        };
        if cache.push(ip, entry).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            counter!("temuan_rate_limiter_evictions_total").increment(1);
            tracing::debug!(
                ip = %ip,
                max_entries = self.max_entries,
                "LRU eviction in login rate limiter"
            );
        }
        gauge!("temuan_rate_limiter_ip_cache_size").set(cache.len() as f64);

        limiter
    }

    /// Forgets the attempts recorded for `ip`.
    pub fn clear_ip(&self, ip: IpAddr) {
        let mut cache = self.cache();
        cache.pop(&ip);
        gauge!("temuan_rate_limiter_ip_cache_size").set(cache.len() as f64);
    }

    /// Returns the number of IPs being tracked.
    pub fn tracked_ips(&self) -> usize {
        self.cache().len()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns the number of LRU evictions so far.
    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Idle time after which an address has its whole burst back, so
    /// forgetting it changes nothing.
    fn idle_after(&self) -> Duration {
        self.window.saturating_mul(self.per_ip_limit.max(1))
    }

    /// Drops addresses idle for at least a full replenish period.
    /// Returns how many were dropped.
    pub fn periodic_cleanup(&self) -> usize {
        self.evict_idle(Instant::now())
    }

    fn evict_idle(&self, now: Instant) -> usize {
        let idle_after = self.idle_after();
        let mut cache = self.cache();

        let stale: Vec<IpAddr> = cache
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) >= idle_after)
            .map(|(ip, _)| *ip)
            .collect();
        for ip in &stale {
            cache.pop(ip);
        }

        gauge!("temuan_rate_limiter_ip_cache_size").set(cache.len() as f64);
        tracing::debug!(
            removed = stale.len(),
            cache_size = cache.len(),
            "Login rate limiter cleanup"
        );
        stale.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a task that periodically runs [`LoginRateLimiter::periodic_cleanup`].
pub fn spawn_cleanup_task(
    limiter: LoginRateLimiter,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        loop {
            timer.tick().await;
            limiter.periodic_cleanup();
        }
    })
}

/// Determines the client address. Proxy headers are only read when the
/// peer is one of `trusted_proxies`; otherwise the peer address is used.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> IpAddr {
    let peer_ip = peer
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    if !trusted_proxies.contains(&peer_ip) {
        return peer_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    peer_ip
}
