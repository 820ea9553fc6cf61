//! In-process leaderboard service
//!
//! Enforces the same acceptance rules as the hosted service so the native
//! demo and the tests can run the full submit/query flow offline.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::protocol::{
    LeaderboardEntry, SubmitRequest, SubmitResponse, TopResponse, clamp_limit, sort_entries,
    validate_submission,
};
use super::{DigestVerifier, RemoteError, SignatureVerifier};

pub struct MemoryLeaderboard {
    verifier: Box<dyn SignatureVerifier>,
    /// Best record per (day, address)
    records: BTreeMap<(String, String), LeaderboardEntry>,
    used_nonces: HashSet<String>,
}

impl Default for MemoryLeaderboard {
    fn default() -> Self {
        Self::new(DigestVerifier)
    }
}

impl MemoryLeaderboard {
    pub fn new(verifier: impl SignatureVerifier + 'static) -> Self {
        Self {
            verifier: Box::new(verifier),
            records: BTreeMap::new(),
            used_nonces: HashSet::new(),
        }
    }

    /// Accept or reject a submission
    pub fn submit(&mut self, req: &SubmitRequest, now: DateTime<Utc>) -> Result<(), RemoteError> {
        validate_submission(req)?;

        if self.used_nonces.contains(&req.nonce) {
            return Err(RemoteError::Replay);
        }

        let signer = self
            .verifier
            .recover(&req.message, &req.signature)
            .ok_or(RemoteError::Signature)?;
        if !signer.eq_ignore_ascii_case(&req.address) {
            return Err(RemoteError::Signature);
        }
        self.used_nonces.insert(req.nonce.clone());

        let key = (req.daily_id.clone(), req.address.to_ascii_lowercase());
        let candidate = LeaderboardEntry {
            address: req.address.clone(),
            score: req.score,
            level: req.level,
            created_at: now,
        };
        match self.records.get_mut(&key) {
            None => {
                self.records.insert(key, candidate);
            }
            Some(existing) => {
                if (req.score, req.level) > (existing.score, existing.level) {
                    *existing = candidate;
                } else {
                    log::debug!("Kept better record for {}", req.address);
                }
            }
        }
        Ok(())
    }

    /// Ranked entries for a day
    pub fn top(&self, daily_id: &str, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<_> = self
            .records
            .iter()
            .filter(|((day, _), _)| day == daily_id)
            .map(|(_, entry)| entry.clone())
            .collect();
        sort_entries(&mut entries);
        entries.truncate(clamp_limit(limit));
        entries
    }

    /// Serve a raw submit body the way the HTTP endpoint does: `(status, body)`
    pub fn handle_submit(&mut self, body: &str, now: DateTime<Utc>) -> (u16, String) {
        let result = serde_json::from_str::<SubmitRequest>(body)
            .map_err(|e| RemoteError::Validation(e.to_string()))
            .and_then(|req| self.submit(&req, now));

        let (status, response) = match result {
            Ok(()) => (200, SubmitResponse::accepted()),
            Err(e) => {
                let status = match e {
                    RemoteError::Validation(_) => 400,
                    RemoteError::Signature => 401,
                    RemoteError::Replay => 409,
                    _ => 500,
                };
                (status, SubmitResponse::rejected(e.to_string()))
            }
        };
        let body = serde_json::to_string(&response).unwrap_or_else(|_| "{\"ok\":false}".into());
        (status, body)
    }

    /// Serve a raw query the way the HTTP endpoint does
    pub fn handle_top(&self, daily_id: &str, limit: usize) -> String {
        let response = TopResponse {
            entries: self.top(daily_id, limit),
        };
        serde_json::to_string(&response).unwrap_or_else(|_| "{\"entries\":[]}".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::protocol::{parse_submit_response, parse_top_response};
    use crate::leaderboard::{DigestSigner, ScoreSigner};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    fn signed(address: &str, score: u64, level: u32, nonce: &str) -> SubmitRequest {
        SubmitRequest::signed("2024-01-02", score, level, nonce, &DigestSigner::new(address)).unwrap()
    }

    #[test]
    fn test_first_submission_inserts() {
        let mut board = MemoryLeaderboard::default();
        board.submit(&signed("0xa", 500, 2, "n1"), at(1)).unwrap();
        let top = board.top("2024-01-02", 10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].score, 500);
        assert!(board.top("2024-01-03", 10).is_empty());
    }

    #[test]
    fn test_only_better_tuple_updates() {
        let mut board = MemoryLeaderboard::default();
        board.submit(&signed("0xa", 500, 2, "n1"), at(1)).unwrap();
        board.submit(&signed("0xa", 400, 5, "n2"), at(2)).unwrap();
        assert_eq!(board.top("2024-01-02", 10)[0].score, 500);

        board.submit(&signed("0xa", 500, 3, "n3"), at(3)).unwrap();
        let top = board.top("2024-01-02", 10);
        assert_eq!((top[0].score, top[0].level), (500, 3));
        assert_eq!(top[0].created_at, at(3));
    }

    #[test]
    fn test_nonce_replay_rejected() {
        let mut board = MemoryLeaderboard::default();
        let req = signed("0xa", 500, 2, "n1");
        board.submit(&req, at(1)).unwrap();
        assert_eq!(board.submit(&req, at(2)), Err(RemoteError::Replay));
    }

    #[test]
    fn test_signature_must_match_address() {
        let mut board = MemoryLeaderboard::default();
        let mut req = signed("0xa", 500, 2, "n1");
        req.signature = DigestSigner::new("0xb").sign(&req.message).unwrap();
        assert_eq!(board.submit(&req, at(1)), Err(RemoteError::Signature));
        // A rejected signature does not burn the nonce
        assert!(board.submit(&signed("0xa", 500, 2, "n1"), at(1)).is_ok());
    }

    #[test]
    fn test_ranking_and_limit() {
        let mut board = MemoryLeaderboard::default();
        board.submit(&signed("0xa", 100, 1, "a"), at(1)).unwrap();
        board.submit(&signed("0xb", 300, 1, "b"), at(2)).unwrap();
        board.submit(&signed("0xc", 100, 1, "c"), at(3)).unwrap();
        let order: Vec<_> = board
            .top("2024-01-02", 10)
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(order, vec!["0xb", "0xc", "0xa"]);
        assert_eq!(board.top("2024-01-02", 2).len(), 2);
    }

    #[test]
    fn test_wire_round_trip() {
        let mut board = MemoryLeaderboard::default();
        let body = serde_json::to_string(&signed("0xa", 700, 4, "n1")).unwrap();

        let (status, reply) = board.handle_submit(&body, at(1));
        assert_eq!(parse_submit_response(status, &reply), Ok(()));

        let (status, reply) = board.handle_submit(&body, at(2));
        assert_eq!(parse_submit_response(status, &reply), Err(RemoteError::Replay));

        let (status, reply) = board.handle_submit("{\"dailyId\":1}", at(3));
        assert_eq!(status, 400);
        assert!(matches!(
            parse_submit_response(status, &reply),
            Err(RemoteError::Validation(_))
        ));

        let entries = parse_top_response(&board.handle_top("2024-01-02", 5), 5).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 700);
    }
}
