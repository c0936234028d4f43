use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { hits: Arc::new(DashMap::new()), enabled }
    }

    /// Records a hit and reports whether it fit in the window.
    pub fn check(&self, key: &str, limit: Limit) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut recent = self.hits.entry(key.to_string()).or_default();
        while recent.front().is_some_and(|t| now.duration_since(*t) >= limit.window) {
            recent.pop_front();
        }
        if recent.len() >= limit.max {
            return false;
        }
        recent.push_back(now);
        true
    }

    /// Drops keys with no hit newer than `idle`. Returns how many were removed.
    pub fn prune(&self, idle: Duration) -> usize {
        let before = self.hits.len();
        let now = Instant::now();
        self.hits.retain(|_, recent| recent.back().is_some_and(|t| now.duration_since(*t) < idle));
        before.saturating_sub(self.hits.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    pub max: usize,
    pub window: Duration,
}

/// Throttled public actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Submission,
    Login,
}

impl Action {
    fn prefix(self) -> &'static str {
        match self {
            Action::Submission => "submission",
            Action::Login => "login",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub submission_limit: usize,
    pub submission_window: Duration,
    pub login_limit: usize,
    pub login_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            submission_limit: 5,
            submission_window: Duration::from_secs(600),
            login_limit: 10,
            login_window: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        fn secs_env(name: &str, default: Duration) -> Duration { std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default) }
        let d = Self::default();
        Self {
            submission_limit: usize_env("RL_SUBMISSION_LIMIT", d.submission_limit),
            submission_window: secs_env("RL_SUBMISSION_WINDOW", d.submission_window),
            login_limit: usize_env("RL_LOGIN_LIMIT", d.login_limit),
            login_window: secs_env("RL_LOGIN_WINDOW", d.login_window),
        }
    }

    pub fn limit(&self, action: Action) -> Limit {
        match action {
            Action::Submission => Limit { max: self.submission_limit, window: self.submission_window },
            Action::Login => Limit { max: self.login_limit, window: self.login_window },
        }
    }

    /// Longest window; keys idle for longer carry no state worth keeping.
    pub fn max_window(&self) -> Duration {
        self.submission_window.max(self.login_window)
    }

    /// Period of the background prune task. Never zero, even when both
    /// windows are configured as `0`.
    pub fn prune_interval(&self) -> Duration {
        self.max_window().max(MIN_PRUNE_INTERVAL)
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }

    pub fn allow(&self, action: Action, client: &str) -> bool {
        let allowed = self.limiter.check(&format!("{}:{client}", action.prefix()), self.cfg.limit(action));
        if !allowed {
            tracing::warn!(action = action.prefix(), client, "rate limited");
        }
        allowed
    }

    pub fn prune_idle(&self) -> usize {
        self.limiter.prune(self.cfg.max_window())
    }
}
