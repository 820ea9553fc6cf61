//! Daily attempts and play streaks
//!
//! Dates are `YYYY-MM-DD` keys supplied by the caller; nothing here reads a
//! clock. Attempts reset whenever the stored key is not today's key.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::consts::DAILY_ATTEMPTS;

/// XP granted by the first play of a calendar day
pub const DAILY_REWARD_XP: u64 = 25;
/// Every this-many streak days also grants a bonus attempt
pub const BONUS_ATTEMPT_EVERY: u32 = 7;

/// Calendar day key (`YYYY-MM-DD`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse a strict `YYYY-MM-DD` key
    pub fn parse(s: &str) -> Option<Self> {
        if !is_day_id(s) {
            return None;
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self)
    }

    /// Today in the local timezone
    #[cfg(not(target_arch = "wasm32"))]
    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    /// Today in the browser's timezone
    #[cfg(target_arch = "wasm32")]
    pub fn today() -> Self {
        let now = js_sys::Date::new_0();
        Self::from_clock_parts(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
    }

    /// Calendar parts read from a clock; an impossible date maps to
    /// `NaiveDate::MIN` with a warning
    pub fn from_clock_parts(year: i32, month: u32, day: u32) -> Self {
        Self::from_ymd(year, month, day).unwrap_or_else(|| {
            log::warn!(
                "Clock reported an invalid date {}-{}-{}, using {}",
                year,
                month,
                day,
                NaiveDate::MIN
            );
            Self(NaiveDate::MIN)
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn yesterday(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    /// Whole days from `earlier` to `self`
    pub fn days_since(&self, earlier: DayKey) -> i64 {
        self.0.signed_duration_since(earlier.0).num_days()
    }

    /// Day of the year, for display
    pub fn ordinal(&self) -> u32 {
        self.0.ordinal()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TryFrom<String> for DayKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DayKey::parse(&value).ok_or_else(|| format!("invalid day key: {value:?}"))
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

/// `^\d{4}-\d{2}-\d{2}$`
pub fn is_day_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Streak after playing on `today`
///
/// Yesterday continues the streak, today leaves it alone, anything else
/// (a gap, a first play, a clock that went backwards) starts over at 1.
pub fn next_streak(last_play: Option<DayKey>, streak: u32, today: DayKey) -> u32 {
    match last_play.map(|last| today.days_since(last)) {
        Some(0) => streak.max(1),
        Some(1) => streak + 1,
        _ => 1,
    }
}

/// What the first play of a day earns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyReward {
    pub streak: u32,
    pub xp: u64,
    pub bonus_attempts: u32,
}

impl DailyReward {
    pub fn for_streak(streak: u32) -> Self {
        let bonus_attempts = if streak > 0 && streak % BONUS_ATTEMPT_EVERY == 0 {
            1
        } else {
            0
        };
        Self {
            streak,
            xp: DAILY_REWARD_XP,
            bonus_attempts,
        }
    }
}

/// Remaining plays for one player on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLedger {
    pub date_key: DayKey,
    pub remaining: u32,
    /// Extra attempts granted today on top of the daily maximum
    #[serde(default)]
    pub bonus: u32,
}

impl AttemptLedger {
    /// Full allowance for `today`
    pub fn fresh(today: DayKey) -> Self {
        Self {
            date_key: today,
            remaining: DAILY_ATTEMPTS,
            bonus: 0,
        }
    }

    /// Upper bound for `remaining`
    pub fn cap(&self) -> u32 {
        DAILY_ATTEMPTS + self.bonus
    }

    /// Reconcile a stored ledger with today's date
    ///
    /// Returns the ledger to use and whether it differs from what was stored
    /// (so the caller knows to persist it).
    pub fn reconcile(stored: Option<AttemptLedger>, today: DayKey) -> (Self, bool) {
        match stored {
            Some(ledger) if ledger.date_key == today => {
                let mut clamped = ledger.clone();
                clamped.clamp();
                let changed = clamped != ledger;
                (clamped, changed)
            }
            _ => (Self::fresh(today), true),
        }
    }

    pub fn has_attempts(&self) -> bool {
        self.remaining > 0
    }

    /// Use one attempt; `false` when none were left
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Grant extra attempts for today (daily-reward bonus)
    pub fn grant_bonus(&mut self, attempts: u32) {
        self.bonus += attempts;
        self.remaining += attempts;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.remaining = self.remaining.min(self.cap());
    }
}
