// Per-host advisory rate limiter
//
// Tracks request volume per remote host in a 60-second sliding window and
// flags hosts that answered with a rate-limit condition. Advisory only:
// callers ask for a delay and decide whether to honor it; no call here ever
// blocks. State lives for the process, nothing is persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use url::Url;

use crate::constants::{
    RATE_BUSY_DELAY_RANGE, RATE_FLAGGED_DELAY_RANGE, RATE_LIMIT_COOLDOWN_SECS,
    RATE_WINDOW_MAX_REQUESTS, RATE_WINDOW_SECS,
};

/// Time source, injectable so tests can drive the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Default)]
struct HostState {
    /// Timestamps of recent requests, oldest first.
    requests: VecDeque<Instant>,
    /// Set while the host is flagged; clears once the cool-down elapses.
    limited_until: Option<Instant>,
}

/// Process-wide advisory gate, one logical state per host.
pub struct RateLimiter {
    hosts: Mutex<HashMap<String, HostState>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// True if the caller should pause before hitting this host.
    pub fn should_delay(&self, url: &str) -> bool {
        let host = host_key(url);
        let now = self.clock.now();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host).or_default();

        if Self::is_flagged(state, now) {
            return true;
        }

        Self::prune_window(state, now);
        state.requests.len() > RATE_WINDOW_MAX_REQUESTS
    }

    /// Record an outgoing request to this host.
    pub fn record_request(&self, url: &str) {
        let host = host_key(url);
        let now = self.clock.now();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host).or_default();
        state.requests.push_back(now);
        Self::prune_window(state, now);
    }

    /// Flag a host after a rate-limit response. The flag expires on its own
    /// once the cool-down passes.
    pub fn record_rate_limit(&self, url: &str) {
        let host = host_key(url);
        let now = self.clock.now();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host.clone()).or_default();
        state.limited_until = Some(now + Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS));
        log::warn!(
            "Host {} flagged rate-limited for {}s",
            host,
            RATE_LIMIT_COOLDOWN_SECS
        );
    }

    /// Suggested pause before the next request to this host.
    pub fn delay_for(&self, url: &str) -> Duration {
        let host = host_key(url);
        let now = self.clock.now();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host).or_default();

        if Self::is_flagged(state, now) {
            return random_delay(RATE_FLAGGED_DELAY_RANGE);
        }

        Self::prune_window(state, now);
        if state.requests.len() > RATE_WINDOW_MAX_REQUESTS {
            return random_delay(RATE_BUSY_DELAY_RANGE);
        }

        Duration::ZERO
    }

    fn is_flagged(state: &mut HostState, now: Instant) -> bool {
        match state.limited_until {
            Some(until) if now < until => true,
            Some(_) => {
                state.limited_until = None;
                false
            }
            None => false,
        }
    }

    fn prune_window(state: &mut HostState, now: Instant) {
        let window = Duration::from_secs(RATE_WINDOW_SECS);
        while let Some(front) = state.requests.front() {
            if now.duration_since(*front) > window {
                state.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Reduce a URL (or local path) to the key its state is tracked under.
fn host_key(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "local".to_string())
}

fn random_delay((low, high): (f64, f64)) -> Duration {
    let secs = rand::thread_rng().gen_range(low..=high);
    Duration::from_secs_f64(secs)
}
