//! HTTP client for the hosted leaderboard
//!
//! `POST {base}/api/score` with a [`SubmitRequest`] body and
//! `GET {base}/api/leaderboard?dailyId=..&limit=..` for the ranking.

use reqwest::Client;

use super::RemoteError;
use super::protocol::{
    LeaderboardEntry, SubmitRequest, clamp_limit, parse_submit_response, parse_top_response,
    validate_submission,
};

#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    http: Client,
    base_url: String,
}

impl LeaderboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn submit_url(&self) -> String {
        format!("{}/api/score", self.base_url)
    }

    fn top_url(&self) -> String {
        format!("{}/api/leaderboard", self.base_url)
    }

    /// Submit a signed score
    ///
    /// The request is validated locally first so an obviously bad payload
    /// never leaves the device.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<(), RemoteError> {
        validate_submission(request)?;

        log::info!(
            "Submitting score {} (level {}) for {}",
            request.score,
            request.level,
            request.daily_id
        );
        let response = self.http.post(self.submit_url()).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let result = parse_submit_response(status, &body);
        match &result {
            Ok(()) => log::info!("Score accepted"),
            Err(e) => log::warn!("Score submission failed: {}", e),
        }
        result
    }

    /// Fetch the ranked board for a day
    pub async fn fetch_top(
        &self,
        daily_id: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, RemoteError> {
        let limit = clamp_limit(limit);
        let response = self
            .http
            .get(self.top_url())
            .query(&[("dailyId", daily_id.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            log::warn!("Leaderboard query failed: {} - {}", status, body);
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                error: body,
            });
        }

        let entries = parse_top_response(&body, limit)?;
        log::debug!("Leaderboard for {}: {} entries", daily_id, entries.len());
        Ok(entries)
    }
}
