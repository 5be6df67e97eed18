//! Tag reconciliation: the minimal diff between the tags a collection's
//! decisions imply and the tags currently on the catalog.
//!
//! Only tags in the owned `KAI-` namespace are ever written. The diff is
//! computed as a pure function over the snapshot; application goes through
//! a label → tag cache so each collection resolves its tag id once.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use kometa_core::{CollectionConfig, DecisionRecord, Movie, StateManager, Tag, TAG_PREFIX};

use crate::radarr::RadarrClient;

/// A single planned tag edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub movie_id: i64,
    pub title: String,
    pub action: TagAction,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Add,
    Remove,
}

impl TagAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TagAction::Add => "added",
            TagAction::Remove => "removed",
        }
    }
}

/// Compute the add/remove diff for one collection.
///
/// A movie participates only when it has a decision for this collection;
/// everything else (including other `KAI-` tags owned by other
/// collections) is left untouched. `tag_labels` maps tag id → label for
/// the snapshot.
pub fn plan_changes(
    collection: &CollectionConfig,
    movies: &[Movie],
    decisions: &HashMap<i64, DecisionRecord>,
    tag_labels: &HashMap<i64, String>,
) -> Vec<PlannedChange> {
    let expected = collection.tag();
    let mut changes = Vec::new();

    for movie in movies {
        let decision = match decisions.get(&movie.id) {
            Some(d) => d,
            None => continue,
        };

        let labels: Vec<&str> = movie
            .tag_ids
            .iter()
            .filter_map(|id| tag_labels.get(id))
            .map(String::as_str)
            .collect();

        let has_exclude = collection
            .exclude_tags
            .iter()
            .any(|t| labels.iter().any(|l| l.eq_ignore_ascii_case(t)));
        let include_gate = collection.include_tags.is_empty()
            || collection
                .include_tags
                .iter()
                .any(|t| labels.iter().any(|l| l.eq_ignore_ascii_case(t)));

        let intended = decision.include
            && decision.confidence >= collection.confidence_threshold
            && !has_exclude
            && include_gate;
        let current = labels.iter().any(|l| l.eq_ignore_ascii_case(&expected));

        if intended && !current {
            changes.push(PlannedChange {
                movie_id: movie.id,
                title: movie.title.clone(),
                action: TagAction::Add,
                tag: expected.clone(),
            });
        } else if current && !intended {
            changes.push(PlannedChange {
                movie_id: movie.id,
                title: movie.title.clone(),
                action: TagAction::Remove,
                tag: expected.clone(),
            });
        }
    }

    changes
}

/// Failure modes of tag application.
///
/// An ownership violation is an assertion failure: the caller aborts the
/// run. Tag resolution is an ordinary API failure and stays scoped to the
/// collection being reconciled.
#[derive(Debug)]
pub enum ReconcileError {
    /// A planned change targeted a tag outside the owned namespace.
    OwnershipViolation(String),
    /// The collection tag could not be looked up or created.
    TagResolution(String),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::OwnershipViolation(message) => {
                write!(f, "ownership violation: {}", message)
            }
            ReconcileError::TagResolution(message) => {
                write!(f, "tag resolution failed: {}", message)
            }
        }
    }
}

/// The result of applying a diff.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    /// The collection tag's id, once resolved. `None` in dry-run mode when
    /// the tag did not already exist.
    pub tag_id: Option<i64>,
}

/// Tag application with a per-run label cache.
pub struct TagManager<'a> {
    radarr: &'a RadarrClient,
    cache: HashMap<String, Tag>,
}

impl<'a> TagManager<'a> {
    /// Prime the cache with the snapshot's tags.
    pub fn new(radarr: &'a RadarrClient, tags: &[Tag]) -> Self {
        let cache = tags
            .iter()
            .map(|t| (t.label.to_lowercase(), t.clone()))
            .collect();
        TagManager { radarr, cache }
    }

    /// Resolve a label to a tag, creating it in Radarr when missing.
    pub fn get_or_create(&mut self, label: &str) -> Result<Tag, String> {
        let key = label.to_lowercase();
        if let Some(tag) = self.cache.get(&key) {
            return Ok(tag.clone());
        }
        let tag = self.radarr.get_or_create_tag(label)?;
        self.cache.insert(key, tag.clone());
        Ok(tag)
    }

    /// Apply a planned diff for one collection.
    ///
    /// Refuses to touch anything outside the owned namespace. In dry-run
    /// mode the intended actions are logged and nothing is written — not
    /// even the change log.
    pub fn apply_changes(
        &mut self,
        collection: &CollectionConfig,
        changes: &[PlannedChange],
        store: &mut StateManager,
        dry_run: bool,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut outcome = ReconcileOutcome::default();

        if changes.is_empty() {
            debug!(collection = %collection.name, "no tag changes needed");
            outcome.tag_id = self
                .cache
                .get(&collection.tag().to_lowercase())
                .map(|t| t.id);
            return Ok(outcome);
        }

        for change in changes {
            if !change.tag.starts_with(TAG_PREFIX) {
                // Assertion: never touch a tag this system does not own.
                return Err(ReconcileError::OwnershipViolation(format!(
                    "refusing to {} non-owned tag '{}' on movie {}",
                    change.action.as_str(),
                    change.tag,
                    change.movie_id
                )));
            }
        }

        if dry_run {
            for change in changes {
                info!(
                    collection = %collection.name,
                    movie_id = change.movie_id,
                    title = %change.title,
                    action = change.action.as_str(),
                    tag = %change.tag,
                    "dry run: would change tag"
                );
            }
            outcome.tag_id = self
                .cache
                .get(&collection.tag().to_lowercase())
                .map(|t| t.id);
            return Ok(outcome);
        }

        let tag = self
            .get_or_create(&collection.tag())
            .map_err(ReconcileError::TagResolution)?;
        outcome.tag_id = Some(tag.id);

        for change in changes {
            let result = match change.action {
                TagAction::Add => self.radarr.add_tag_to_movie(change.movie_id, tag.id),
                TagAction::Remove => self.radarr.remove_tag_from_movie(change.movie_id, tag.id),
            };
            match result {
                Ok(_) => {
                    store.log_change(
                        change.movie_id,
                        &change.title,
                        &collection.name,
                        change.action.as_str(),
                        &change.tag,
                    );
                    match change.action {
                        TagAction::Add => outcome.added.push(change.movie_id),
                        TagAction::Remove => outcome.removed.push(change.movie_id),
                    }
                }
                Err(e) => {
                    warn!(
                        movie_id = change.movie_id,
                        action = change.action.as_str(),
                        error = %e,
                        "tag change failed"
                    );
                    store.log_error(
                        &format!("collection:{},movie:{}", collection.name, change.movie_id),
                        &e,
                    );
                }
            }
        }

        info!(
            collection = %collection.name,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            "reconciliation complete"
        );
        Ok(outcome)
    }
}
