//! Game session state machine
//!
//! Owns one player's match plus everything around it: the attempt ledger,
//! profile, local board and the outbox of signed submissions. The frame
//! loop calls [`GameSession::frame`]; network code drains the outbox and
//! reports back through [`GameSession::apply_submit_result`] and
//! [`GameSession::apply_fetch`].
//!
//! Phases: `Idle -> Running <-> Paused -> {GameOver | Win}`. `Win` can go
//! straight to the next level; both terminal phases return to `Idle` via
//! [`GameSession::reset_game`].

use crate::highscores::HighScores;
use crate::leaderboard::{LeaderboardEntry, RemoteError, ScoreSigner, SubmitRequest};
use crate::ledger::{AttemptLedger, DailyReward, DayKey};
use crate::persistence::Repository;
use crate::profile::{Profile, xp_for_result};
use crate::sim::{self, GameEvent, GamePhase, MatchState, SeedMaterial, StepInput};
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    /// Limited attempts, results recorded and submitted
    #[default]
    Daily,
    /// Unlimited attempts and lives, nothing persisted
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    GameOver,
}

/// Identifies one terminal occurrence; a key commits at most once
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitKey {
    pub daily_id: DayKey,
    pub run: u64,
    pub level: u32,
    pub outcome: Outcome,
}

/// Marks a leaderboard fetch so late replies can be recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub daily_id: DayKey,
    pub generation: u64,
}

/// Things the UI should tell the player about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Toast(String),
    DailyReward(DailyReward),
    SkinUnlocked(&'static str),
    NewBest(u64),
    LocalRank(usize),
    OutOfAttempts,
}

pub struct GameSession {
    repo: Repository,
    tuning: Tuning,
    mode: GameMode,
    player_id: String,
    today: DayKey,

    profile: Profile,
    attempts: AttemptLedger,
    high_scores: HighScores,

    state: MatchState,
    /// Runs started this session; part of every commit key
    run: u64,
    /// Current run has been started (and charged, in daily mode)
    run_active: bool,
    /// Day the current run was charged against
    run_day: DayKey,
    /// Score when the current level began, for XP
    level_start_score: u64,
    last_commit: Option<CommitKey>,

    signer: Option<Box<dyn ScoreSigner>>,
    outbox: Vec<SubmitRequest>,
    notices: Vec<SessionNotice>,

    fetch_generation: u64,
    remote_board: Vec<LeaderboardEntry>,
}

impl GameSession {
    pub fn new(
        mut repo: Repository,
        player_id: impl Into<String>,
        today: DayKey,
        mode: GameMode,
        tuning: Tuning,
    ) -> Self {
        let player_id = player_id.into();
        let profile = repo.load_profile(&player_id);
        let attempts = load_ledger(&mut repo, &player_id, today, mode);
        let high_scores = repo.load_high_scores(&player_id, today);
        let state = build_match(&player_id, today, mode, &tuning);

        log::info!(
            "Session for {} on {} ({:?}): level {}, {} attempts left, streak {}",
            player_id,
            today,
            mode,
            profile.level(),
            attempts.remaining,
            profile.streak
        );

        Self {
            repo,
            tuning,
            mode,
            player_id,
            today,
            profile,
            attempts,
            high_scores,
            state,
            run: 0,
            run_active: false,
            run_day: today,
            level_start_score: 0,
            last_commit: None,
            signer: None,
            outbox: Vec::new(),
            notices: Vec::new(),
            fetch_generation: 0,
            remote_board: Vec::new(),
        }
    }

    pub fn with_signer(mut self, signer: impl ScoreSigner + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    pub fn set_signer(&mut self, signer: Option<Box<dyn ScoreSigner>>) {
        self.signer = signer;
    }

    // ----- accessors -----

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn today(&self) -> DayKey {
        self.today
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn attempts(&self) -> &AttemptLedger {
        &self.attempts
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    pub fn remote_board(&self) -> &[LeaderboardEntry] {
        &self.remote_board
    }

    pub fn last_commit(&self) -> Option<&CommitKey> {
        self.last_commit.as_ref()
    }

    /// Whether a launch from `Idle` would be allowed
    pub fn can_launch(&self) -> bool {
        self.mode == GameMode::Practice || self.run_active || self.attempts.has_attempts()
    }

    pub fn take_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Signed submissions waiting to be sent
    pub fn take_outbox(&mut self) -> Vec<SubmitRequest> {
        std::mem::take(&mut self.outbox)
    }

    // ----- transitions -----

    /// `Idle -> Running`, charging an attempt once per run in daily mode
    pub fn launch(&mut self) -> Vec<GameEvent> {
        if self.state.phase != GamePhase::Idle {
            return Vec::new();
        }
        if !self.run_active && !self.begin_run() {
            return Vec::new();
        }
        sim::start(&mut self.state)
    }

    /// Run one frame: launch from idle if asked, step, then commit any
    /// terminal result the step produced
    pub fn frame(&mut self, input: &StepInput, dt: f32, now_ms: f64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if input.launch && self.state.phase == GamePhase::Idle {
            events.extend(self.launch());
        }
        events.extend(sim::step(&mut self.state, input, dt, now_ms));

        for event in &events {
            match event {
                GameEvent::LevelCleared { .. } => {
                    self.commit_terminal(Outcome::Win, now_ms);
                }
                GameEvent::GameOver { .. } => {
                    self.commit_terminal(Outcome::GameOver, now_ms);
                }
                _ => {}
            }
        }
        events
    }

    pub fn toggle_pause(&mut self, now_ms: f64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        sim::toggle_pause(&mut self.state, now_ms, &mut events);
        events
    }

    /// `Win -> Running` on the next level; the run stays charged
    pub fn next_level(&mut self) -> Vec<GameEvent> {
        if self.state.phase != GamePhase::Win {
            return Vec::new();
        }
        let level = self.state.level + 1;
        let material = SeedMaterial::new(self.run_day.to_string(), self.player_id.clone());
        let seed = sim::level_seed(&material, level);
        let bricks = sim::generate_from_seed(level, seed, &self.tuning);
        self.state.advance_level(level, seed, bricks);
        self.level_start_score = self.state.score;
        log::info!("Run {}: advancing to level {}", self.run, level);
        vec![GameEvent::Notice(format!("Level {level}"))]
    }

    /// Back to `Idle` on level 1 with score 0; the next launch is a new run
    pub fn reset_game(&mut self) {
        if self.run_active && !self.state.phase.is_terminal() {
            log::info!("Run {} abandoned at level {}", self.run, self.state.level);
        }
        self.state = build_match(&self.player_id, self.today, self.mode, &self.tuning);
        self.run_active = false;
        self.level_start_score = 0;
    }

    /// Switch mode between runs; refused while a match is in play
    pub fn set_mode(&mut self, mode: GameMode) -> bool {
        if matches!(self.state.phase, GamePhase::Running | GamePhase::Paused) {
            return false;
        }
        if self.mode != mode {
            self.mode = mode;
            self.attempts = load_ledger(&mut self.repo, &self.player_id, self.today, mode);
            self.reset_game();
            log::info!("Mode set to {:?}", mode);
        }
        true
    }

    /// Move the session to a new calendar day
    ///
    /// Reloads the ledger and local board and invalidates in-flight fetches.
    /// A run already in progress finishes against the day it was charged on.
    pub fn roll_day(&mut self, today: DayKey) -> bool {
        if today == self.today {
            return false;
        }
        log::info!("Day rolled over: {} -> {}", self.today, today);
        self.today = today;
        self.attempts = load_ledger(&mut self.repo, &self.player_id, today, self.mode);
        self.high_scores = self.repo.load_high_scores(&self.player_id, today);
        self.remote_board.clear();
        self.fetch_generation += 1;

        if !self.run_active || self.state.phase.is_terminal() {
            self.reset_game();
        }
        true
    }

    // ----- commits -----

    /// Record a terminal result once
    ///
    /// Returns `false` when this occurrence was already committed or the
    /// session is in practice mode.
    pub fn commit_terminal(&mut self, outcome: Outcome, now_ms: f64) -> bool {
        let key = CommitKey {
            daily_id: self.run_day,
            run: self.run,
            level: self.state.level,
            outcome,
        };
        if self.last_commit.as_ref() == Some(&key) {
            log::debug!("Duplicate commit ignored: {:?}", key);
            return false;
        }
        self.last_commit = Some(key);

        if self.mode == GameMode::Practice {
            log::debug!("Practice result not recorded");
            return false;
        }

        let score = self.state.score;
        let level = self.state.level;
        let gained = score.saturating_sub(self.level_start_score);
        self.level_start_score = score;
        log::info!(
            "Run {} {:?} on level {} with {} points",
            self.run,
            outcome,
            level,
            score
        );

        if self.profile.record_score(score) {
            self.notices.push(SessionNotice::NewBest(score));
        }
        let xp = xp_for_result(gained, level, outcome == Outcome::Win);
        for skin in self.profile.add_xp(xp) {
            self.notices.push(SessionNotice::SkinUnlocked(skin.id));
        }
        if let Err(e) = self.repo.save_profile(&self.profile) {
            log::warn!("Could not save profile: {}", e);
        }

        self.record_local(score, level, now_ms);
        self.queue_submission(score, level);
        true
    }

    fn record_local(&mut self, score: u64, level: u32, now_ms: f64) {
        if self.run_day == self.today {
            if let Some(rank) = self.high_scores.add_score(score, level, now_ms) {
                self.notices.push(SessionNotice::LocalRank(rank));
            }
            if let Err(e) = self
                .repo
                .save_high_scores(&self.player_id, self.today, &self.high_scores)
            {
                log::warn!("Could not save local leaderboard: {}", e);
            }
        } else {
            // Run started before midnight: it belongs on that day's board
            let mut board = self.repo.load_high_scores(&self.player_id, self.run_day);
            board.add_score(score, level, now_ms);
            if let Err(e) = self
                .repo
                .save_high_scores(&self.player_id, self.run_day, &board)
            {
                log::warn!("Could not save local leaderboard: {}", e);
            }
        }
    }

    fn queue_submission(&mut self, score: u64, level: u32) {
        let Some(signer) = self.signer.as_deref() else {
            log::info!("No signer, result kept locally");
            self.notices
                .push(SessionNotice::Toast(RemoteError::NoSigner.toast_message()));
            return;
        };

        let nonce = format!(
            "{}-{}-{:016x}",
            self.run_day,
            self.run,
            rand::random::<u64>()
        );
        match SubmitRequest::signed(&self.run_day.to_string(), score, level, &nonce, signer) {
            Ok(request) => self.outbox.push(request),
            Err(e) => {
                log::warn!("Could not prepare submission: {}", e);
                self.notices.push(SessionNotice::Toast(e.toast_message()));
            }
        }
    }

    /// Report how a submission went; never touches gameplay
    pub fn apply_submit_result(&mut self, result: Result<(), RemoteError>) {
        match result {
            Ok(()) => self
                .notices
                .push(SessionNotice::Toast("Score submitted".to_string())),
            Err(e) => {
                log::warn!("Submission failed: {}", e);
                self.notices.push(SessionNotice::Toast(e.toast_message()));
            }
        }
    }

    /// Start a leaderboard fetch; hand the ticket back with the reply
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.fetch_generation += 1;
        FetchTicket {
            daily_id: self.today,
            generation: self.fetch_generation,
        }
    }

    /// Apply a fetch reply if it is still current; `false` if it was stale
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<LeaderboardEntry>, RemoteError>,
    ) -> bool {
        if ticket.daily_id != self.today || ticket.generation != self.fetch_generation {
            log::debug!("Stale leaderboard reply dropped: {:?}", ticket);
            return false;
        }
        match result {
            Ok(entries) => self.remote_board = entries,
            Err(e) => {
                log::warn!("Leaderboard fetch failed: {}", e);
                self.notices.push(SessionNotice::Toast(e.toast_message()));
            }
        }
        true
    }

    // ----- internals -----

    /// Start a run, charging an attempt in daily mode
    fn begin_run(&mut self) -> bool {
        if self.mode == GameMode::Daily {
            if !self.attempts.has_attempts() {
                log::info!("No attempts left for {}", self.today);
                self.notices.push(SessionNotice::OutOfAttempts);
                return false;
            }
            self.attempts.consume();

            if let Some(reward) = self.profile.check_in(self.today) {
                if reward.bonus_attempts > 0 {
                    self.attempts.grant_bonus(reward.bonus_attempts);
                }
                self.notices.push(SessionNotice::DailyReward(reward));
            }
            self.profile.games_played += 1;

            if let Err(e) = self.repo.save_attempts(&self.player_id, &self.attempts) {
                log::warn!("Could not save attempts: {}", e);
            }
            if let Err(e) = self.repo.save_profile(&self.profile) {
                log::warn!("Could not save profile: {}", e);
            }
            log::info!(
                "Attempt used: {} of {} left",
                self.attempts.remaining,
                self.attempts.cap()
            );
        }

        self.run += 1;
        self.run_active = true;
        self.run_day = self.today;
        self.level_start_score = 0;
        true
    }
}

/// Today's attempt ledger; practice mode never touches the stored one
fn load_ledger(repo: &mut Repository, player_id: &str, today: DayKey, mode: GameMode) -> AttemptLedger {
    match mode {
        GameMode::Daily => repo.load_attempts(player_id, today),
        GameMode::Practice => AttemptLedger::fresh(today),
    }
}

/// Level 1 match for a new run
fn build_match(player_id: &str, day: DayKey, mode: GameMode, tuning: &Tuning) -> MatchState {
    let material = SeedMaterial::new(day.to_string(), player_id);
    let seed = sim::level_seed(&material, 1);
    let bricks = sim::generate_from_seed(1, seed, tuning);
    let lives = match mode {
        GameMode::Daily => Some(tuning.lives),
        GameMode::Practice => None,
    };
    MatchState::new(1, seed, bricks, tuning.clone(), lives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::DigestSigner;
    use crate::persistence::MemoryStore;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn session(store: &MemoryStore, mode: GameMode) -> GameSession {
        GameSession::new(
            Repository::new(store.clone()),
            "0xabc",
            day("2024-01-02"),
            mode,
            Tuning::default(),
        )
    }

    #[test]
    fn test_launch_charges_once_per_run() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        assert_eq!(s.attempts().remaining, 3);

        s.launch();
        assert_eq!(s.phase(), GamePhase::Running);
        assert_eq!(s.attempts().remaining, 2);

        // Launching again mid-run is a no-op
        s.launch();
        assert_eq!(s.attempts().remaining, 2);

        // Persisted immediately
        let raw = store.raw("brickfall:0xabc:attempts:2024-01-02").unwrap();
        let ledger: AttemptLedger = serde_json::from_str(&raw).unwrap();
        assert_eq!(ledger.remaining, 2);
    }

    #[test]
    fn test_out_of_attempts_blocks_launch() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        for _ in 0..3 {
            s.launch();
            s.reset_game();
        }
        assert_eq!(s.attempts().remaining, 0);
        assert!(!s.can_launch());

        s.take_notices();
        s.launch();
        assert_eq!(s.phase(), GamePhase::Idle);
        assert_eq!(s.take_notices(), vec![SessionNotice::OutOfAttempts]);
    }

    #[test]
    fn test_first_run_grants_daily_reward() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        assert_eq!(s.profile().streak, 1);
        assert_eq!(s.profile().xp, 25);
        assert!(
            s.take_notices()
                .iter()
                .any(|n| matches!(n, SessionNotice::DailyReward(_)))
        );

        s.reset_game();
        s.launch();
        assert_eq!(s.profile().xp, 25);
    }

    #[test]
    fn test_commit_guard() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily).with_signer(DigestSigner::new("0xabc"));
        s.launch();
        s.state.score = 400;

        assert!(s.commit_terminal(Outcome::GameOver, 1.0));
        assert!(!s.commit_terminal(Outcome::GameOver, 2.0));
        assert_eq!(s.take_outbox().len(), 1);
        assert_eq!(s.high_scores().entries.len(), 1);
        assert_eq!(s.profile().best_score, 400);
    }

    #[test]
    fn test_commit_without_signer_records_locally() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        s.state.score = 100;
        assert!(s.commit_terminal(Outcome::GameOver, 1.0));
        assert!(s.take_outbox().is_empty());
        assert_eq!(s.high_scores().entries.len(), 1);
        assert!(s.take_notices().contains(&SessionNotice::Toast(
            RemoteError::NoSigner.toast_message()
        )));
    }

    #[test]
    fn test_practice_writes_nothing() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Practice);
        assert!(store.is_empty());

        s.launch();
        assert_eq!(s.phase(), GamePhase::Running);
        assert_eq!(s.state().lives, None);
        s.state.score = 900;
        assert!(!s.commit_terminal(Outcome::GameOver, 1.0));

        s.reset_game();
        s.roll_day(day("2024-01-03"));
        assert!(store.is_empty());
        assert_eq!(s.attempts().remaining, 3);
        assert_eq!(s.profile().best_score, 0);
        assert!(s.take_outbox().is_empty());
    }

    #[test]
    fn test_reset_zeroes_score() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        s.state.score = 700;
        s.reset_game();
        assert_eq!(s.state().score, 0);
        assert_eq!(s.phase(), GamePhase::Idle);
        assert_eq!(s.state().level, 1);
    }

    #[test]
    fn test_next_level_keeps_run_and_score() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        s.state.score = 1000;
        s.state.phase = GamePhase::Win;
        s.commit_terminal(Outcome::Win, 1.0);

        s.next_level();
        assert_eq!(s.phase(), GamePhase::Running);
        assert_eq!(s.state().level, 2);
        assert_eq!(s.state().score, 1000);
        assert_eq!(s.attempts().remaining, 2);

        // A different level is a different occurrence
        s.state.phase = GamePhase::Win;
        assert!(s.commit_terminal(Outcome::Win, 2.0));
    }

    #[test]
    fn test_stale_fetch_ignored() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        let old = s.begin_fetch();
        let current = s.begin_fetch();
        assert!(!s.apply_fetch(old, Ok(Vec::new())));
        assert!(s.apply_fetch(current, Ok(Vec::new())));

        let ticket = s.begin_fetch();
        s.roll_day(day("2024-01-03"));
        assert!(!s.apply_fetch(ticket, Err(RemoteError::Transport("late".into()))));
        assert!(s.take_notices().is_empty());
    }

    #[test]
    fn test_roll_day_restores_attempts() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        s.reset_game();
        assert_eq!(s.attempts().remaining, 2);

        assert!(s.roll_day(day("2024-01-03")));
        assert!(!s.roll_day(day("2024-01-03")));
        assert_eq!(s.attempts().remaining, 3);
        assert_eq!(s.today(), day("2024-01-03"));
    }

    #[test]
    fn test_switch_to_daily_uses_stored_ledger() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        s.reset_game();
        assert!(s.set_mode(GameMode::Practice));
        assert_eq!(s.attempts().remaining, 3);
        assert!(s.set_mode(GameMode::Daily));
        assert_eq!(s.attempts().remaining, 2);
    }

    #[test]
    fn test_mode_switch_refused_mid_run() {
        let store = MemoryStore::new();
        let mut s = session(&store, GameMode::Daily);
        s.launch();
        assert!(!s.set_mode(GameMode::Practice));
        s.reset_game();
        assert!(s.set_mode(GameMode::Practice));
        assert_eq!(s.state().lives, None);
    }
}
