//! Client for the tracked platform's public stats endpoint.
//!
//! The endpoint reports a lifetime solved count and a submission calendar
//! keyed by the unix timestamp (seconds) of each active day. That becomes the
//! exhaustive per-day log set the engine reconciles against.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::Deserialize;

use crate::engine::RemoteSync;
use crate::error::{AppError, AppResult};
use crate::models::daily_log::{day_start, DailyLog};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total_solved: i32,
    #[serde(default)]
    pub submission_calendar: HashMap<String, i32>,
}

#[derive(Debug, Clone)]
pub struct RemoteStatsClient {
    http: reqwest::Client,
    base_url: Url,
    platform: String,
}

impl RemoteStatsClient {
    pub fn new(base_url: &str, platform: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build remote stats HTTP client")?;
        let base_url = Url::parse(base_url).context("REMOTE_STATS_URL is not a valid URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("REMOTE_STATS_URL cannot carry a path: {}", base_url);
        }
        Ok(Self {
            http,
            base_url,
            platform: platform.to_string(),
        })
    }

    /// `{base}/{username}`, with the username as one encoded path segment.
    fn user_url(&self, username: &str) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Upstream("stats base URL cannot carry a path".into()))?
            .pop_if_empty()
            .push(username);
        Ok(url)
    }

    pub async fn fetch(&self, username: &str, now: DateTime<Utc>) -> AppResult<RemoteSync> {
        let url = self.user_url(username)?;
        tracing::debug!(url = %url, "Fetching remote stats");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "stats endpoint returned {}",
                response.status()
            )));
        }

        let body: StatsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("unreadable stats payload: {}", e)))?;

        to_remote_sync(body, &self.platform, now).map_err(AppError::Upstream)
    }
}

/// Turn a stats payload into the engine's sync input, one log per active day.
pub fn to_remote_sync(body: StatsResponse, platform: &str, now: DateTime<Utc>) -> Result<RemoteSync, String> {
    if body.status.as_deref() == Some("error") {
        return Err(body.message.unwrap_or_else(|| "stats endpoint reported an error".into()));
    }

    let mut per_day: BTreeMap<NaiveDate, i32> = BTreeMap::new();
    for (stamp, count) in body.submission_calendar {
        let secs: i64 = stamp
            .parse()
            .map_err(|_| format!("bad calendar key {:?}", stamp))?;
        let day = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| format!("calendar key out of range: {}", secs))?
            .date_naive();
        if count > 0 {
            *per_day.entry(day).or_insert(0) += count;
        }
    }

    let today = now.date_naive();
    let solved_today = per_day.get(&today).copied().unwrap_or(0);
    let logs = per_day
        .into_iter()
        .rev()
        .map(|(day, count)| DailyLog::remote(day_start(day), count, platform))
        .collect();

    Ok(RemoteSync {
        logs,
        total_solved: body.total_solved.max(0),
        solved_today,
    })
}
