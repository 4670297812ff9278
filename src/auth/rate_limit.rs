//! Fixed-window, in-memory request limiter keyed by client IP.
//!
//! State lives in the process, so limits are per instance.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

/// Requests allowed per key within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max_requests: u32,
    pub window: Duration,
}

impl Limit {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Login, registration and refresh: per IP and path.
pub const AUTH_LIMIT: Limit = Limit::new(5, 60);
/// Security-answer guesses: per IP, shared by both recovery routes.
pub const RECOVERY_LIMIT: Limit = Limit::new(5, 900);

#[derive(Clone, Default)]
pub struct RateLimitState {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

struct Window {
    count: u32,
    started: Instant,
    length: Duration,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) > self.length
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key`. `Ok` carries the requests left in
    /// the window, `Err` the time until the window reopens.
    pub async fn check(&self, key: &str, limit: Limit) -> Result<u32, Duration> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
            length: limit.window,
        });

        if window.expired(now) {
            window.count = 0;
            window.started = now;
            window.length = limit.window;
        }

        if window.count >= limit.max_requests {
            return Err(window.length.saturating_sub(now.duration_since(window.started)));
        }

        window.count += 1;
        Ok(limit.max_requests - window.count)
    }

    /// Forget windows that have run out.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.windows.lock().await.retain(|_, w| !w.expired(now));
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

async fn enforce(state: &AppState, key: &str, limit: Limit, req: Request, next: Next) -> Result<Response, AppError> {
    match state.rate_limiter.check(key, limit).await {
        Ok(remaining) => {
            tracing::debug!(key = %key, remaining, "Rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            tracing::warn!(key = %key, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // /login and /register get separate budgets
    let key = format!("{}:{}", addr.ip(), req.uri().path());
    enforce(&state, &key, AUTH_LIMIT, req, next).await
}

pub async fn rate_limit_recovery(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("recovery:{}", addr.ip());
    enforce(&state, &key, RECOVERY_LIMIT, req, next).await
}

/// Periodically evict expired windows so the map does not grow unbounded.
pub fn spawn_cleanup_worker(limiter: RateLimitState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(AUTH_LIMIT.window);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}
