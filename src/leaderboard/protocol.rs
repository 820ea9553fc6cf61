//! Leaderboard wire format
//!
//! One canonical JSON shape per message. Anything else from the server is a
//! [`RemoteError::Schema`] rather than a best guess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RemoteError, ScoreSigner};
use crate::GAME_NAME;
use crate::ledger::is_day_id;

/// Highest score the service accepts
pub const MAX_SCORE: u64 = 10_000_000;
/// Highest level the service accepts
pub const MAX_LEVEL: u32 = 999;
/// Largest page the query endpoint returns
pub const MAX_LIMIT: usize = 50;

pub const MODE_DAILY: &str = "daily";

/// Text the player signs for a submission
pub fn score_message(daily_id: &str, score: u64, level: u32, nonce: &str) -> String {
    format!("{GAME_NAME} Daily {daily_id} Score {score} Level {level} Nonce {nonce}")
}

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitRequest {
    pub daily_id: String,
    pub address: String,
    pub score: u64,
    pub level: u32,
    pub mode: String,
    pub nonce: String,
    pub message: String,
    pub signature: String,
}

impl SubmitRequest {
    /// Build and sign a daily submission
    pub fn signed(
        daily_id: &str,
        score: u64,
        level: u32,
        nonce: &str,
        signer: &dyn ScoreSigner,
    ) -> Result<Self, RemoteError> {
        let message = score_message(daily_id, score, level, nonce);
        let signature = signer.sign(&message)?;
        let request = Self {
            daily_id: daily_id.to_string(),
            address: signer.address().to_string(),
            score,
            level,
            mode: MODE_DAILY.to_string(),
            nonce: nonce.to_string(),
            message,
            signature,
        };
        validate_submission(&request)?;
        Ok(request)
    }
}

/// Checks the service applies before looking at nonce or signature
pub fn validate_submission(req: &SubmitRequest) -> Result<(), RemoteError> {
    let fail = |reason: &str| Err(RemoteError::Validation(reason.to_string()));

    if !is_day_id(&req.daily_id) {
        return fail("dailyId must be YYYY-MM-DD");
    }
    if req.score > MAX_SCORE {
        return fail("score out of range");
    }
    if !(1..=MAX_LEVEL).contains(&req.level) {
        return fail("level out of range");
    }
    if req.mode != MODE_DAILY {
        return fail("unsupported mode");
    }
    if req.address.trim().is_empty() {
        return fail("missing address");
    }
    if req.nonce.trim().is_empty() {
        return fail("missing nonce");
    }
    if req.signature.trim().is_empty() {
        return fail("missing signature");
    }
    if req.message != score_message(&req.daily_id, req.score, req.level, &req.nonce) {
        return fail("message does not match submission");
    }
    Ok(())
}

/// `{ ok: true }` or `{ ok: false, error }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Interpret a submission reply
pub fn parse_submit_response(status: u16, body: &str) -> Result<(), RemoteError> {
    let response: SubmitResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Schema(e.to_string()))?;

    match (response.ok, response.error) {
        (true, None) if (200..300).contains(&status) => Ok(()),
        (true, _) => Err(RemoteError::Schema(format!(
            "ok response with status {status} or error text"
        ))),
        (false, None) => Err(RemoteError::Schema("error response without error text".into())),
        (false, Some(error)) => Err(RemoteError::from_status(status, error)),
    }
}

/// One ranked row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeaderboardEntry {
    pub address: String,
    pub score: u64,
    pub level: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopResponse {
    pub entries: Vec<LeaderboardEntry>,
}

/// Ranking order: score desc, then newest first
pub fn sort_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// Parse and check a query reply
pub fn parse_top_response(body: &str, limit: usize) -> Result<Vec<LeaderboardEntry>, RemoteError> {
    let response: TopResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Schema(e.to_string()))?;

    let limit = clamp_limit(limit);
    if response.entries.len() > limit {
        return Err(RemoteError::Schema(format!(
            "{} entries for limit {}",
            response.entries.len(),
            limit
        )));
    }
    if let Some(bad) = response
        .entries
        .iter()
        .find(|e| e.score > MAX_SCORE || !(1..=MAX_LEVEL).contains(&e.level) || e.address.is_empty())
    {
        return Err(RemoteError::Schema(format!("invalid entry for {:?}", bad.address)));
    }

    let mut entries = response.entries;
    sort_entries(&mut entries);
    Ok(entries)
}
