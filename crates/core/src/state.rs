//! Persistent decision state: the cache of prior classifications plus the
//! bounded change and error logs.
//!
//! The on-disk document is always either absent or structurally valid:
//! saves go through a sibling temp file, fsync, and an atomic rename, with
//! a rotating set of five timestamped backups.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::KometaError;

/// Current on-disk format version. A mismatch on load is surfaced as a
/// warning and the document is used as-is; migration is an operator action.
pub const STATE_FORMAT_VERSION: u32 = 1;

const STATE_FILE: &str = "kometa_state.json";
const LOCK_FILE: &str = "kometa_state.lock";
const BACKUP_PREFIX: &str = "kometa_state_";
const MAX_BACKUPS: usize = 5;
const MAX_CHANGES: usize = 100;
const MAX_ERRORS: usize = 50;

/// One classification decision for a (movie, collection) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    #[serde(skip)]
    pub movie_id: i64,
    #[serde(skip)]
    pub collection_name: String,
    pub include: bool,
    pub confidence: f64,
    pub metadata_hash: String,
    pub tag: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detailed_analysis: Option<String>,
}

/// A tag change applied to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: String,
    pub movie_id: i64,
    pub title: String,
    pub collection: String,
    /// `added` or `removed`.
    pub action: String,
    pub tag: String,
}

/// A recoverable error captured for the next report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: String,
    pub context: String,
    pub message: String,
}

/// All decisions for one movie, keyed by collection name, plus the
/// fingerprint those decisions were made against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MovieDecisions {
    #[serde(default)]
    metadata_hash: String,
    #[serde(default)]
    collections: BTreeMap<String, DecisionRecord>,
}

/// The persisted state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateDocument {
    version: String,
    state_format_version: u32,
    last_update: String,
    #[serde(default)]
    decisions: BTreeMap<String, MovieDecisions>,
    #[serde(default)]
    changes: Vec<ChangeRecord>,
    #[serde(default)]
    errors: Vec<ErrorRecord>,
}

impl StateDocument {
    fn empty() -> Self {
        StateDocument {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state_format_version: STATE_FORMAT_VERSION,
            last_update: Utc::now().to_rfc3339(),
            decisions: BTreeMap::new(),
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Manager for the persistent state directory.
///
/// Owns `kometa_state.json`, the backup rotation, and the advisory lock
/// that rejects concurrent runs on the same state directory.
pub struct StateManager {
    state_dir: PathBuf,
    state_file: PathBuf,
    backup_dir: PathBuf,
    state: StateDocument,
    /// Held for the manager's lifetime; dropping it releases the lock.
    _lock: Option<File>,
}

impl StateManager {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let state_file = state_dir.join(STATE_FILE);
        let backup_dir = state_dir.join("backups");
        StateManager {
            state_dir,
            state_file,
            backup_dir,
            state: StateDocument::empty(),
            _lock: None,
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Take the exclusive advisory lock for this state directory.
    ///
    /// Fails fast when another process holds it: concurrent runs on a
    /// shared state directory are unsupported.
    pub fn lock(&mut self) -> Result<(), KometaError> {
        self.ensure_dirs()?;
        let lock_path = self.state_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| KometaError::io(&lock_path, e))?;
        file.try_lock_exclusive()
            .map_err(|_| KometaError::Locked(lock_path.clone()))?;
        self._lock = Some(file);
        debug!(path = %lock_path.display(), "state lock acquired");
        Ok(())
    }

    /// Load state from disk. Absent file means empty state; a corrupt file
    /// falls back to the newest readable backup, else empty with an error
    /// logged to the ring.
    pub fn load(&mut self) {
        if !self.state_file.exists() {
            info!(path = %self.state_file.display(), "no state file, starting empty");
            return;
        }

        match read_document(&self.state_file) {
            Ok(doc) => {
                if doc.state_format_version != STATE_FORMAT_VERSION {
                    warn!(
                        found = doc.state_format_version,
                        expected = STATE_FORMAT_VERSION,
                        "state format version mismatch; operator migration required"
                    );
                }
                info!(decisions = doc.decisions.len(), "state loaded");
                self.state = doc;
            }
            Err(e) => {
                error!(error = %e, "state file unreadable, trying backups");
                if !self.restore_from_backup() {
                    self.state = StateDocument::empty();
                    self.log_error("state:load", &format!("state file unreadable: {}", e));
                }
            }
        }
    }

    /// Write the state atomically and rotate backups.
    pub fn save(&mut self) -> Result<(), KometaError> {
        self.ensure_dirs()?;

        if self.state_file.exists() {
            self.backup_current();
        }

        self.state.last_update = Utc::now().to_rfc3339();
        self.state.version = env!("CARGO_PKG_VERSION").to_string();

        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| KometaError::State(format!("serialize: {}", e)))?;

        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|e| KometaError::io(&tmp, e))?;
        let f = File::open(&tmp).map_err(|e| KometaError::io(&tmp, e))?;
        f.sync_all().map_err(|e| KometaError::io(&tmp, e))?;
        fs::rename(&tmp, &self.state_file).map_err(|e| KometaError::io(&self.state_file, e))?;

        debug!(path = %self.state_file.display(), "state saved");
        Ok(())
    }

    /// Drop everything and persist the empty document.
    pub fn reset(&mut self) -> Result<(), KometaError> {
        self.state = StateDocument::empty();
        info!("state reset to empty");
        self.save()
    }

    /// Pretty JSON rendering of the current state.
    pub fn dump(&self) -> String {
        serde_json::to_string_pretty(&self.state).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    // ── Decisions ────────────────────────────────────────────────────────────

    pub fn get_decision(&self, movie_id: i64, collection_name: &str) -> Option<DecisionRecord> {
        let movie = self.state.decisions.get(&movie_key(movie_id))?;
        let mut decision = movie.collections.get(collection_name)?.clone();
        decision.movie_id = movie_id;
        decision.collection_name = collection_name.to_string();
        Some(decision)
    }

    pub fn set_decision(&mut self, decision: DecisionRecord) {
        let entry = self
            .state
            .decisions
            .entry(movie_key(decision.movie_id))
            .or_default();
        entry.metadata_hash = decision.metadata_hash.clone();
        entry
            .collections
            .insert(decision.collection_name.clone(), decision);
    }

    pub fn get_decisions_for_movie(&self, movie_id: i64) -> Vec<DecisionRecord> {
        match self.state.decisions.get(&movie_key(movie_id)) {
            Some(movie) => movie
                .collections
                .iter()
                .map(|(name, d)| {
                    let mut decision = d.clone();
                    decision.movie_id = movie_id;
                    decision.collection_name = name.clone();
                    decision
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// The fingerprint recorded for a movie, if any decision exists.
    pub fn get_metadata_hash(&self, movie_id: i64) -> Option<String> {
        self.state
            .decisions
            .get(&movie_key(movie_id))
            .map(|m| m.metadata_hash.clone())
            .filter(|h| !h.is_empty())
    }

    /// Attach refinement output to an existing decision.
    pub fn set_detailed_analysis(&mut self, movie_id: i64, collection_name: &str, analysis: &str) {
        if let Some(movie) = self.state.decisions.get_mut(&movie_key(movie_id)) {
            if let Some(decision) = movie.collections.get_mut(collection_name) {
                decision.detailed_analysis = Some(analysis.to_string());
            }
        }
    }

    // ── Change / error rings ─────────────────────────────────────────────────

    pub fn log_change(
        &mut self,
        movie_id: i64,
        title: &str,
        collection: &str,
        action: &str,
        tag: &str,
    ) {
        self.state.changes.push(ChangeRecord {
            timestamp: Utc::now().to_rfc3339(),
            movie_id,
            title: title.to_string(),
            collection: collection.to_string(),
            action: action.to_string(),
            tag: tag.to_string(),
        });
        cap_ring(&mut self.state.changes, MAX_CHANGES);
    }

    pub fn log_error(&mut self, context: &str, message: &str) {
        self.state.errors.push(ErrorRecord {
            timestamp: Utc::now().to_rfc3339(),
            context: context.to_string(),
            message: message.to_string(),
        });
        cap_ring(&mut self.state.errors, MAX_ERRORS);
    }

    pub fn get_changes(&self) -> &[ChangeRecord] {
        &self.state.changes
    }

    pub fn get_errors(&self) -> &[ErrorRecord] {
        &self.state.errors
    }

    pub fn clear_changes(&mut self) {
        self.state.changes.clear();
    }

    pub fn clear_errors(&mut self) {
        self.state.errors.clear();
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn ensure_dirs(&self) -> Result<(), KometaError> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| KometaError::io(&self.backup_dir, e))
    }

    /// Copy the current state file into the backup set, then prune the set
    /// to the newest five. The live file is never part of the pruning.
    fn backup_current(&self) {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
        let backup = self
            .backup_dir
            .join(format!("{}{}.json", BACKUP_PREFIX, stamp));
        if let Err(e) = fs::copy(&self.state_file, &backup) {
            warn!(error = %e, "could not create state backup");
            return;
        }

        let mut backups = self.list_backups();
        if backups.len() > MAX_BACKUPS {
            backups.sort();
            for old in &backups[..backups.len() - MAX_BACKUPS] {
                debug!(path = %old.display(), "pruning old backup");
                let _ = fs::remove_file(old);
            }
        }
    }

    fn list_backups(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.backup_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
                    out.push(entry.path());
                }
            }
        }
        out
    }

    fn restore_from_backup(&mut self) -> bool {
        let mut backups = self.list_backups();
        backups.sort();

        for backup in backups.iter().rev() {
            match read_document(backup) {
                Ok(doc) => {
                    warn!(
                        path = %backup.display(),
                        decisions = doc.decisions.len(),
                        "restored state from backup"
                    );
                    self.state = doc;
                    return true;
                }
                Err(e) => {
                    warn!(path = %backup.display(), error = %e, "backup unreadable");
                }
            }
        }
        warn!("no usable backup found");
        false
    }
}

fn movie_key(movie_id: i64) -> String {
    format!("movie:{}", movie_id)
}

fn cap_ring<T>(ring: &mut Vec<T>, cap: usize) {
    if ring.len() > cap {
        let excess = ring.len() - cap;
        ring.drain(..excess);
    }
}

fn read_document(path: &Path) -> Result<StateDocument, KometaError> {
    let content = fs::read_to_string(path).map_err(|e| KometaError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| KometaError::State(format!("parse: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn decision(movie_id: i64, collection: &str, include: bool, confidence: f64) -> DecisionRecord {
        DecisionRecord {
            movie_id,
            collection_name: collection.to_string(),
            include,
            confidence,
            metadata_hash: format!("hash-{}", movie_id),
            tag: "KAI-test".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            reasoning: None,
            detailed_analysis: None,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "Film Noir", true, 0.92));
        store.set_decision(decision(2, "Film Noir", false, 0.05));
        store.log_change(1, "Chinatown", "Film Noir", "added", "KAI-film-noir");
        store.save().unwrap();

        let mut loaded = StateManager::new(dir.path());
        loaded.load();
        let d = loaded.get_decision(1, "Film Noir").unwrap();
        assert!(d.include);
        assert_eq!(d.confidence, 0.92);
        assert_eq!(d.movie_id, 1);
        assert_eq!(d.collection_name, "Film Noir");
        assert_eq!(loaded.get_changes().len(), 1);
        assert_eq!(loaded.get_metadata_hash(2).as_deref(), Some("hash-2"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.load();
        assert!(store.get_decision(1, "Anything").is_none());
    }

    #[test]
    fn test_upsert_replaces_decision() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "Film Noir", true, 0.74));
        store.set_decision(decision(1, "Film Noir", false, 0.60));
        let d = store.get_decision(1, "Film Noir").unwrap();
        assert!(!d.include);
        assert_eq!(store.get_decisions_for_movie(1).len(), 1);
    }

    #[test]
    fn test_change_ring_caps_at_100() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        for i in 0..130 {
            store.log_change(i, "Movie", "C", "added", "KAI-c");
        }
        let changes = store.get_changes();
        assert_eq!(changes.len(), 100);
        // Oldest entries were discarded.
        assert_eq!(changes[0].movie_id, 30);
    }

    #[test]
    fn test_error_ring_caps_at_50() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        for i in 0..60 {
            store.log_error("ctx", &format!("error {}", i));
        }
        assert_eq!(store.get_errors().len(), 50);
        assert_eq!(store.get_errors()[0].message, "error 10");
    }

    #[test]
    fn test_backups_rotate_to_five() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        for i in 0..8 {
            store.set_decision(decision(i, "C", true, 0.9));
            store.save().unwrap();
        }
        // 8 saves: the first created no backup (no prior file), so 7
        // backups were written and pruned down to 5.
        let backups = store.list_backups();
        assert_eq!(backups.len(), 5);
        assert!(store.state_file().exists());
    }

    #[test]
    fn test_corrupt_state_restores_from_backup() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "C", true, 0.9));
        store.save().unwrap();
        store.set_decision(decision(2, "C", true, 0.9));
        store.save().unwrap();

        // Corrupt the live file.
        fs::write(store.state_file(), "{ not json").unwrap();

        let mut recovered = StateManager::new(dir.path());
        recovered.load();
        // The newest backup holds decision 1 (written before the second save).
        assert!(recovered.get_decision(1, "C").is_some());
    }

    #[test]
    fn test_corrupt_state_without_backup_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path();
        fs::create_dir_all(store_dir.join("backups")).unwrap();
        fs::write(store_dir.join(STATE_FILE), "garbage").unwrap();

        let mut store = StateManager::new(store_dir);
        store.load();
        assert!(store.get_decision(1, "C").is_none());
        assert_eq!(store.get_errors().len(), 1);
        assert!(store.get_errors()[0].context.contains("state:load"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "C", true, 0.9));
        store.log_error("ctx", "boom");
        store.save().unwrap();
        store.reset().unwrap();

        let mut loaded = StateManager::new(dir.path());
        loaded.load();
        assert!(loaded.get_decision(1, "C").is_none());
        assert!(loaded.get_errors().is_empty());
    }

    #[test]
    fn test_lock_excludes_second_manager() {
        let dir = TempDir::new().unwrap();
        let mut first = StateManager::new(dir.path());
        first.lock().unwrap();

        let mut second = StateManager::new(dir.path());
        assert!(matches!(second.lock(), Err(KometaError::Locked(_))));
    }

    #[test]
    fn test_clear_rings() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.log_change(1, "Chinatown", "C", "added", "KAI-c");
        store.log_error("ctx", "boom");
        store.clear_changes();
        store.clear_errors();
        assert!(store.get_changes().is_empty());
        assert!(store.get_errors().is_empty());
        // Decisions survive a ring clear.
        store.set_decision(decision(1, "C", true, 0.9));
        store.clear_changes();
        assert!(store.get_decision(1, "C").is_some());
    }

    #[test]
    fn test_detailed_analysis_attaches() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "C", true, 0.74));
        store.set_detailed_analysis(1, "C", "long analysis text");
        let d = store.get_decision(1, "C").unwrap();
        assert_eq!(d.detailed_analysis.as_deref(), Some("long analysis text"));
    }

    #[test]
    fn test_dump_is_valid_json() {
        let dir = TempDir::new().unwrap();
        let mut store = StateManager::new(dir.path());
        store.set_decision(decision(1, "C", true, 0.9));
        let dump = store.dump();
        let value: serde_json::Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(value["state_format_version"], 1);
    }
}
