//! Batch planning and classification.
//!
//! For each collection the catalog is partitioned into movies whose cached
//! decision is still valid (reuse) and movies that must go back to the
//! model (reask): new movies, changed fingerprints, borderline confidence,
//! or a forced refresh. Reask movies are classified in deterministic,
//! size-bounded batches with a state checkpoint after every batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use kometa_core::{CollectionConfig, DecisionRecord, Movie, StateManager};

use crate::claude::{ClaudeClient, UsageStats};
use crate::prompts;

/// Why a movie is being re-asked. Used for debug logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaskReason {
    NoPriorDecision,
    FingerprintChanged,
    NearThreshold,
    ForceRefresh,
}

impl ReaskReason {
    fn as_str(self) -> &'static str {
        match self {
            ReaskReason::NoPriorDecision => "no previous decision",
            ReaskReason::FingerprintChanged => "metadata changed",
            ReaskReason::NearThreshold => "near threshold confidence",
            ReaskReason::ForceRefresh => "force refresh",
        }
    }
}

/// The reuse/reask partition for one collection.
pub struct Plan<'a> {
    /// Cached decisions served without an API call.
    pub reuse: Vec<DecisionRecord>,
    /// Movies to classify, sorted by id, with the reason each is here.
    pub reask: Vec<(&'a Movie, ReaskReason)>,
}

/// Partition the catalog for one collection.
pub fn plan_collection<'a>(
    collection: &CollectionConfig,
    movies: &'a [Movie],
    fingerprints: &HashMap<i64, String>,
    store: &StateManager,
    force_refresh: bool,
) -> Plan<'a> {
    let mut reuse = Vec::new();
    let mut reask: Vec<(&Movie, ReaskReason)> = Vec::new();

    for movie in movies {
        if force_refresh {
            reask.push((movie, ReaskReason::ForceRefresh));
            continue;
        }

        let stored_hash = store.get_metadata_hash(movie.id);
        let current_hash = fingerprints.get(&movie.id).map(String::as_str);

        match store.get_decision(movie.id, &collection.name) {
            None => reask.push((movie, ReaskReason::NoPriorDecision)),
            Some(_) if stored_hash.as_deref() != current_hash => {
                reask.push((movie, ReaskReason::FingerprintChanged))
            }
            Some(d) if collection.is_borderline(d.confidence) => {
                reask.push((movie, ReaskReason::NearThreshold))
            }
            Some(d) => reuse.push(d),
        }
    }

    for (movie, reason) in &reask {
        debug!(
            movie_id = movie.id,
            title = %movie.title,
            reason = reason.as_str(),
            "movie needs classification"
        );
    }

    reask.sort_by_key(|(movie, _)| movie.id);
    Plan { reuse, reask }
}

/// Split reask movies into contiguous batches.
pub fn batches<'a>(reask: &'a [(&'a Movie, ReaskReason)], batch_size: usize) -> Vec<Vec<&'a Movie>> {
    reask
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.iter().map(|(movie, _)| *movie).collect())
        .collect()
}

/// Per-collection processing statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub processed: usize,
    pub from_cache: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub usage: UsageStats,
}

/// Classifier for one run: drives batches through the Claude client and
/// folds decisions into the state.
pub struct MovieProcessor {
    batch_size: usize,
    force_refresh: bool,
}

impl MovieProcessor {
    pub fn new(batch_size: usize, force_refresh: bool) -> Self {
        MovieProcessor {
            batch_size,
            force_refresh,
        }
    }

    /// Classify every movie that needs it for `collection`.
    ///
    /// Decisions land in the store (checkpointed after every batch); the
    /// returned stats feed the run summary. A failed batch is logged and
    /// skipped — its movies keep their previous state and are re-asked on
    /// the next run.
    pub fn process_collection(
        &self,
        collection: &CollectionConfig,
        movies: &[Movie],
        fingerprints: &HashMap<i64, String>,
        claude: &mut ClaudeClient,
        store: &mut StateManager,
        shutdown: &AtomicBool,
    ) -> CollectionStats {
        let plan = plan_collection(collection, movies, fingerprints, store, self.force_refresh);
        let mut stats = CollectionStats {
            from_cache: plan.reuse.len(),
            ..CollectionStats::default()
        };

        if plan.reask.is_empty() {
            info!(collection = %collection.name, "no movies need classification");
            return stats;
        }

        info!(
            collection = %collection.name,
            reask = plan.reask.len(),
            cached = plan.reuse.len(),
            "classifying movies"
        );

        let usage_before = claude.usage();
        let batch_list = batches(&plan.reask, self.batch_size);
        let total_batches = batch_list.len();
        let system = prompts::system_prompt();

        for (index, batch) in batch_list.into_iter().enumerate() {
            if shutdown.load(Ordering::SeqCst) {
                warn!("shutdown requested, stopping batch processing");
                break;
            }

            info!(
                collection = %collection.name,
                batch = index + 1,
                total = total_batches,
                movies = batch.len(),
                "processing batch"
            );

            let user = prompts::classification_prompt(collection, &batch);
            match claude.classify_movies(system, &user) {
                Ok(response) => {
                    let applied = self.apply_decisions(
                        collection,
                        &batch,
                        response.decisions,
                        fingerprints,
                        claude,
                        store,
                    );
                    stats.processed += applied;
                    stats.batches += 1;

                    // Checkpoint so a crash cannot lose this batch.
                    if let Err(e) = store.save() {
                        warn!(error = %e, "checkpoint save failed");
                    }
                }
                Err(e) => {
                    warn!(
                        collection = %collection.name,
                        batch = index + 1,
                        error = %e,
                        "batch failed"
                    );
                    store.log_error(
                        &format!("collection:{},batch:{}", collection.name, index + 1),
                        &e,
                    );
                    stats.failed_batches += 1;
                }
            }
        }

        stats.usage = claude.usage().since(&usage_before);
        info!(
            collection = %collection.name,
            processed = stats.processed,
            from_cache = stats.from_cache,
            batches = stats.batches,
            failed_batches = stats.failed_batches,
            "collection classification complete"
        );
        stats
    }

    /// Fold one batch of model decisions into the store, refining
    /// borderline ones first when the collection asks for it. Returns the
    /// number of decisions recorded.
    fn apply_decisions(
        &self,
        collection: &CollectionConfig,
        batch: &[&Movie],
        decisions: Vec<crate::claude::MovieDecision>,
        fingerprints: &HashMap<i64, String>,
        claude: &mut ClaudeClient,
        store: &mut StateManager,
    ) -> usize {
        let movie_map: HashMap<i64, &Movie> = batch.iter().map(|m| (m.id, *m)).collect();
        let mut applied = 0;

        for decision in decisions {
            let movie = match movie_map.get(&decision.movie_id) {
                Some(movie) => *movie,
                None => {
                    warn!(movie_id = decision.movie_id, "decision for unknown movie id, dropping");
                    continue;
                }
            };

            let mut record = DecisionRecord {
                movie_id: movie.id,
                collection_name: collection.name.clone(),
                include: decision.include,
                confidence: decision.confidence,
                metadata_hash: fingerprints
                    .get(&movie.id)
                    .cloned()
                    .unwrap_or_else(|| movie.fingerprint()),
                tag: collection.tag(),
                timestamp: Utc::now().to_rfc3339(),
                reasoning: decision.reasoning,
                detailed_analysis: None,
            };

            if collection.use_iterative_refinement && collection.is_borderline(record.confidence) {
                self.refine(collection, movie, &mut record, claude);
            }

            debug!(
                movie_id = movie.id,
                title = %movie.title,
                include = record.include,
                confidence = record.confidence,
                "recording decision"
            );
            store.set_decision(record);
            applied += 1;
        }

        applied
    }

    /// Second-pass analysis for a borderline decision. Failures keep the
    /// initial decision.
    fn refine(
        &self,
        collection: &CollectionConfig,
        movie: &Movie,
        record: &mut DecisionRecord,
        claude: &mut ClaudeClient,
    ) {
        info!(
            movie_id = movie.id,
            title = %movie.title,
            confidence = record.confidence,
            "refining borderline decision"
        );

        let user = prompts::refinement_prompt(collection, movie);
        match claude.analyze_movie(prompts::refinement_system_prompt(), &user) {
            Ok(refined) => {
                info!(
                    movie_id = movie.id,
                    initial = record.confidence,
                    refined = refined.confidence,
                    "refinement complete"
                );
                record.include = refined.include;
                record.confidence = refined.confidence;
                if refined.reasoning.is_some() {
                    record.reasoning = refined.reasoning;
                }
                record.detailed_analysis = refined.detailed_analysis;
            }
            Err(e) => {
                warn!(movie_id = movie.id, error = %e, "refinement failed, keeping initial decision");
            }
        }
    }
}
