//! Local daily leaderboard
//!
//! Top 10 results for one player on one day, kept alongside the remote board
//! so a run still shows up when submission is unavailable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::consts::MAX_HIGH_SCORES;

/// A single local result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub score: u64,
    /// Level reached
    pub level: u32,
    /// Unix timestamp (ms) when recorded
    pub timestamp: f64,
}

impl HighScoreEntry {
    /// Ranking order: score, then level, then newest first
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then(other.level.cmp(&self.level))
            .then(other.timestamp.total_cmp(&self.timestamp))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore ordering and size after loading untrusted data
    pub fn normalize(&mut self) {
        self.entries.sort_by(HighScoreEntry::rank_cmp);
        self.entries.truncate(MAX_HIGH_SCORES);
    }

    /// Rank (1-indexed) a result would take, `None` if it would not make the board
    pub fn potential_rank(&self, score: u64, level: u32, timestamp: f64) -> Option<usize> {
        let candidate = HighScoreEntry {
            score,
            level,
            timestamp,
        };
        let pos = self
            .entries
            .iter()
            .position(|e| candidate.rank_cmp(e) == Ordering::Less)
            .unwrap_or(self.entries.len());
        (pos < MAX_HIGH_SCORES).then_some(pos + 1)
    }

    pub fn qualifies(&self, score: u64, level: u32, timestamp: f64) -> bool {
        self.potential_rank(score, level, timestamp).is_some()
    }

    /// Insert a result; returns its rank or `None` if it fell off the board
    pub fn add_score(&mut self, score: u64, level: u32, timestamp: f64) -> Option<usize> {
        let rank = self.potential_rank(score, level, timestamp)?;
        self.entries.insert(
            rank - 1,
            HighScoreEntry {
                score,
                level,
                timestamp,
            },
        );
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }
}
