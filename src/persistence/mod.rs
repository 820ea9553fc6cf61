//! Local persistence
//!
//! Everything the game remembers goes through a [`KeyValueStore`] of JSON
//! strings. [`Repository`] layers typed records on top and never lets a
//! corrupt value reach gameplay: it logs, substitutes the default and writes
//! the default back.

pub mod keys;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::highscores::HighScores;
use crate::ledger::{AttemptLedger, DayKey};
use crate::profile::Profile;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage is not available")]
    Unavailable,
    #[error("storage backend failed for '{key}': {message}")]
    Backend { key: String, message: String },
    #[error("could not serialize '{key}'")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// String key-value storage (browser LocalStorage or an in-memory map)
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the game wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.borrow().keys().cloned().collect()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }
}

/// Typed access to every persisted record
pub struct Repository {
    store: Box<dyn KeyValueStore>,
}

impl Repository {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Load a JSON record, falling back to `default` when it is missing or
    /// unreadable. Corrupt values are replaced in storage by the default.
    fn load_or<T, F>(&mut self, key: &str, default: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default(),
            Err(e) => {
                log::warn!("Reading '{}' failed, using default: {}", key, e);
                return default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Corrupt value under '{}' ({}), resetting to default", key, e);
                let value = default();
                if let Err(e) = self.save(key, &value) {
                    log::warn!("Could not write default for '{}': {}", key, e);
                }
                value
            }
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &json)
    }

    pub fn load_profile(&mut self, player_id: &str) -> Profile {
        let mut profile = self.load_or(&keys::profile(player_id), || Profile::new(player_id));
        profile.player_id = player_id.to_string();
        profile.refresh_unlocks();
        profile
    }

    pub fn save_profile(&mut self, profile: &Profile) -> Result<(), StoreError> {
        self.save(&keys::profile(&profile.player_id), profile)
    }

    /// Today's ledger; a stale or missing one is reset and persisted
    pub fn load_attempts(&mut self, player_id: &str, today: DayKey) -> AttemptLedger {
        let key = keys::attempts(player_id, today);
        let stored = self.load_or(&key, || None::<AttemptLedger>);
        let (ledger, changed) = AttemptLedger::reconcile(stored, today);
        if changed {
            log::info!(
                "Attempts for {} on {}: {} remaining",
                player_id,
                today,
                ledger.remaining
            );
            if let Err(e) = self.save(&key, &ledger) {
                log::warn!("Could not persist attempts: {}", e);
            }
        }
        ledger
    }

    pub fn save_attempts(&mut self, player_id: &str, ledger: &AttemptLedger) -> Result<(), StoreError> {
        self.save(&keys::attempts(player_id, ledger.date_key), ledger)
    }

    pub fn load_high_scores(&mut self, player_id: &str, day: DayKey) -> HighScores {
        let mut board = self.load_or(&keys::leaderboard(player_id, day), HighScores::new);
        board.normalize();
        board
    }

    pub fn save_high_scores(
        &mut self,
        player_id: &str,
        day: DayKey,
        board: &HighScores,
    ) -> Result<(), StoreError> {
        self.save(&keys::leaderboard(player_id, day), board)
    }

    pub fn load_settings(&mut self) -> Settings {
        self.load_or(keys::SETTINGS, Settings::default)
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.save(keys::SETTINGS, settings)
    }

    /// Drop the record under `key`
    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.store.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    #[test]
    fn test_profile_round_trip() {
        let store = MemoryStore::new();
        let mut repo = Repository::new(store.clone());

        let mut profile = repo.load_profile("0xabc");
        assert_eq!(profile.xp, 0);
        profile.add_xp(120);
        repo.save_profile(&profile).unwrap();

        assert!(store.raw("brickfall:0xabc:profile").is_some());
        assert_eq!(repo.load_profile("0xabc").xp, 120);
    }

    #[test]
    fn test_corrupt_profile_reset_and_written_back() {
        let mut store = MemoryStore::new();
        store.set("brickfall:p:profile", "{not json").unwrap();
        let mut repo = Repository::new(store.clone());

        let profile = repo.load_profile("p");
        assert_eq!(profile, Profile::new("p"));

        let raw = store.raw("brickfall:p:profile").unwrap();
        let healed: Profile = serde_json::from_str(&raw).unwrap();
        assert_eq!(healed, profile);
    }

    #[test]
    fn test_attempts_reset_and_persisted() {
        let store = MemoryStore::new();
        let mut repo = Repository::new(store.clone());
        let today = day("2024-05-01");

        let mut ledger = repo.load_attempts("p", today);
        assert_eq!(ledger.remaining, 3);
        assert!(store.raw("brickfall:p:attempts:2024-05-01").is_some());

        ledger.consume();
        repo.save_attempts("p", &ledger).unwrap();
        assert_eq!(repo.load_attempts("p", today).remaining, 2);

        // A different day has its own key and a full allowance
        assert_eq!(repo.load_attempts("p", day("2024-05-02")).remaining, 3);
    }

    #[test]
    fn test_attempts_under_wrong_date_reset() {
        let mut store = MemoryStore::new();
        store
            .set(
                "brickfall:p:attempts:2024-05-01",
                r#"{"date_key":"2024-04-01","remaining":0}"#,
            )
            .unwrap();
        let mut repo = Repository::new(store.clone());
        assert_eq!(repo.load_attempts("p", day("2024-05-01")).remaining, 3);
    }

    #[test]
    fn test_corrupt_settings_fall_back() {
        let mut store = MemoryStore::new();
        store.set("brickfall:settings", "[]").unwrap();
        let mut repo = Repository::new(store.clone());
        assert_eq!(repo.load_settings(), Settings::default());
    }
}
