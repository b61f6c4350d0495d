//! Per-IP rate limiting with a sliding window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Sliding-window rate limiter.
///
/// Each IP keeps the timestamps of its requests inside the window.
/// [`RateLimiter::too_many`] prunes, appends, and compares against the
/// limit in one pass under a single mutex. A background sweep bounds
/// memory by dropping IPs that have gone idle.
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `ip` and report whether it is over the limit.
    ///
    /// Returns `true` iff the count inside the window, including this
    /// request, exceeds the configured maximum.
    pub fn too_many(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");

        let timestamps = hits.entry(ip.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) <= self.window);
        timestamps.push(now);

        timestamps.len() > self.max
    }

    /// Prune stale timestamps for every IP and drop empty entries.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");

        hits.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) <= self.window);
            !timestamps.is_empty()
        });
    }

    /// Number of IPs currently tracked.
    pub fn tracked_ips(&self) -> usize {
        self.hits.lock().expect("rate limiter mutex poisoned").len()
    }

    /// Spawn the periodic sweep task.
    ///
    /// Runs until the shutdown broadcast fires, so tests and clean
    /// shutdowns stop it deterministically.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sweep an empty map.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.sweep(),
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limiter sweep stopping");
                        break;
                    }
                }
            }
        })
    }
}
