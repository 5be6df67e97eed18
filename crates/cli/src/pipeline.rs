//! The per-run pipeline: extract collection configs, snapshot the catalog,
//! classify, reconcile tags, and checkpoint state.
//!
//! Collections are processed strictly sequentially in priority order.
//! After each collection's reconciliation the in-memory snapshot is
//! patched, so `include_tags`/`exclude_tags` constraints referencing tags
//! applied by a higher-priority collection take effect within the same run.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use chrono::Utc;
use tracing::{error, info, warn};

use kometa_core::{KometaParser, Movie, StateManager};

use crate::claude::{ClaudeClient, UsageStats};
use crate::config::Config;
use crate::processor::MovieProcessor;
use crate::radarr::RadarrClient;
use crate::tags::{plan_changes, ReconcileError, TagManager};

/// Options for one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_dir: PathBuf,
    pub collection_filter: Option<String>,
    pub force_refresh: bool,
    pub dry_run: bool,
    pub batch_size: usize,
}

/// Per-collection results for the summary.
#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    pub reused: usize,
    pub asked: usize,
    pub added: usize,
    pub removed: usize,
    pub failed_batches: usize,
    pub usage: UsageStats,
}

/// Results of one run, consumed by the reporter.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub dry_run: bool,
    pub collections: BTreeMap<String, CollectionOutcome>,
    pub total_changes: usize,
    pub errors: usize,
    pub usage: UsageStats,
}

/// Execute one full run.
///
/// Collection-level failures are logged and the run continues; an
/// ownership violation in tag application aborts the run. The store is
/// saved on every exit path that reaches the snapshot.
pub fn run(
    config: &Config,
    radarr: &RadarrClient,
    claude: &mut ClaudeClient,
    store: &mut StateManager,
    opts: &RunOptions,
    shutdown: &AtomicBool,
) -> Result<RunSummary, String> {
    let mut summary = RunSummary {
        started_at: Utc::now().to_rfc3339(),
        dry_run: opts.dry_run,
        ..RunSummary::default()
    };
    let errors_before = store.get_errors().len();
    let usage_before = claude.usage();

    // Collection configs, highest priority first.
    let parser = KometaParser::new(&opts.config_dir, config.fix_tags);
    let outcome = parser
        .parse_configs()
        .map_err(|e| format!("could not read config directory: {}", e))?;
    for diagnostic in &outcome.diagnostics {
        warn!(diagnostic = %diagnostic, "config diagnostic");
        store.log_error("config", &diagnostic.to_string());
    }

    let mut collections = outcome.configs;
    if let Some(filter) = &opts.collection_filter {
        collections.retain(|c| c.name.eq_ignore_ascii_case(filter));
        if collections.is_empty() {
            return Err(format!("collection '{}' not found or not enabled", filter));
        }
    }
    info!(count = collections.len(), "collections to process");

    // One catalog snapshot per run.
    let mut movies = radarr.get_movies()?;
    let tags = radarr.get_tags()?;
    let mut tag_labels: HashMap<i64, String> =
        tags.iter().map(|t| (t.id, t.label.clone())).collect();
    let mut tag_manager = TagManager::new(radarr, &tags);

    let fingerprints: HashMap<i64, String> =
        movies.iter().map(|m| (m.id, m.fingerprint())).collect();

    let processor = MovieProcessor::new(opts.batch_size, opts.force_refresh);

    for collection in &collections {
        if shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            warn!("shutdown requested, stopping collection processing");
            break;
        }

        info!(collection = %collection.name, priority = collection.priority, "processing collection");

        let stats = processor.process_collection(
            collection,
            &movies,
            &fingerprints,
            claude,
            store,
            shutdown,
        );

        // Decisions for this collection, cached and fresh alike.
        let decisions: HashMap<i64, _> = movies
            .iter()
            .filter_map(|m| store.get_decision(m.id, &collection.name).map(|d| (m.id, d)))
            .collect();

        let changes = plan_changes(collection, &movies, &decisions, &tag_labels);
        let applied = match tag_manager.apply_changes(collection, &changes, store, opts.dry_run) {
            Ok(applied) => applied,
            Err(e @ ReconcileError::OwnershipViolation(_)) => {
                // An assertion failure: never keep running past it.
                error!(collection = %collection.name, error = %e, "aborting run");
                store.log_error(&format!("collection:{}", collection.name), &e.to_string());
                let _ = store.save();
                return Err(e.to_string());
            }
            Err(e) => {
                // Collection-scoped failure: record what classification
                // got done, then move on to the next collection.
                warn!(collection = %collection.name, error = %e, "reconciliation failed, continuing");
                store.log_error(&format!("collection:{}", collection.name), &e.to_string());
                summary.collections.insert(
                    collection.name.clone(),
                    CollectionOutcome {
                        reused: stats.from_cache,
                        asked: stats.processed,
                        added: 0,
                        removed: 0,
                        failed_batches: stats.failed_batches,
                        usage: stats.usage,
                    },
                );
                continue;
            }
        };

        if let Some(tag_id) = applied.tag_id {
            patch_snapshot(&mut movies, tag_id, &applied.added, &applied.removed);
            tag_labels.entry(tag_id).or_insert_with(|| collection.tag());
        }

        summary.collections.insert(
            collection.name.clone(),
            CollectionOutcome {
                reused: stats.from_cache,
                asked: stats.processed,
                added: applied.added.len(),
                removed: applied.removed.len(),
                failed_batches: stats.failed_batches,
                usage: stats.usage,
            },
        );
        summary.total_changes += applied.added.len() + applied.removed.len();
    }

    store.save().map_err(|e| format!("final state save failed: {}", e))?;

    summary.finished_at = Utc::now().to_rfc3339();
    summary.errors = store.get_errors().len().saturating_sub(errors_before);
    summary.usage = claude.usage().since(&usage_before);

    info!(
        collections = summary.collections.len(),
        changes = summary.total_changes,
        errors = summary.errors,
        cost = format!("{:.4}", summary.usage.cost).as_str(),
        "run complete"
    );
    Ok(summary)
}

/// Reflect applied tag changes in the in-memory snapshot so later
/// collections observe them.
fn patch_snapshot(movies: &mut [Movie], tag_id: i64, added: &[i64], removed: &[i64]) {
    for movie in movies.iter_mut() {
        if added.contains(&movie.id) && !movie.tag_ids.contains(&tag_id) {
            movie.tag_ids.push(tag_id);
        }
        if removed.contains(&movie.id) {
            movie.tag_ids.retain(|&id| id != tag_id);
        }
    }
}
