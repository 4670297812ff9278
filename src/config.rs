use std::env;

use anyhow::Context;

use crate::models::user_state::BASELINE_DAILY_TARGET;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Extra CORS origins, e.g. a LAN address during development
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,
    pub jwt_refresh_ttl_secs: i64,

    // Remote platform sync
    pub remote_platform: String,
    pub remote_stats_url: String,
    pub remote_timeout_secs: u64,

    pub baseline_daily_target: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 20)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_extra_origins: env::var("CORS_EXTRA_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_access_ttl_secs: parse_or("JWT_ACCESS_TTL_SECS", 900)?,
            jwt_refresh_ttl_secs: parse_or("JWT_REFRESH_TTL_SECS", 604_800)?,

            remote_platform: env::var("REMOTE_PLATFORM").unwrap_or_else(|_| "LeetCode".into()),
            remote_stats_url: env::var("REMOTE_STATS_URL")
                .unwrap_or_else(|_| "https://leetcode-stats-api.herokuapp.com".into()),
            remote_timeout_secs: parse_or("REMOTE_TIMEOUT_SECS", 10)?,

            baseline_daily_target: parse_or("BASELINE_DAILY_TARGET", BASELINE_DAILY_TARGET)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/codestrike_test".into(),
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            cors_extra_origins: Vec::new(),
            jwt_secret: "test-secret".into(),
            jwt_access_ttl_secs: 900,
            jwt_refresh_ttl_secs: 604_800,
            remote_platform: "LeetCode".into(),
            remote_stats_url: "http://127.0.0.1:9".into(),
            remote_timeout_secs: 1,
            baseline_daily_target: BASELINE_DAILY_TARGET,
        }
    }
}
