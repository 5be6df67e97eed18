mod claude;
mod config;
mod formatter;
mod health;
mod notify;
mod pipeline;
mod processor;
mod prompts;
mod radarr;
mod tags;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kometa_core::schedule::{next_activation, parse_interval, parse_start_time};
use kometa_core::{KometaParser, StateManager, VERSION};

use crate::claude::ClaudeClient;
use crate::config::Config;
use crate::notify::EmailNotifier;
use crate::pipeline::{RunOptions, RunSummary};
use crate::processor::MovieProcessor;
use crate::radarr::RadarrClient;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_HEALTH: i32 = 2;
const EXIT_RUNTIME: i32 = 3;

/// Claude-driven collection tagging for Radarr.
#[derive(Parser)]
#[command(name = "kometa-ai", version, about = "Claude-driven collection tagging for Radarr")]
struct Cli {
    /// Run immediately instead of waiting for the schedule
    #[arg(long)]
    run_now: bool,

    /// Compute actions without mutating the catalog
    #[arg(long)]
    dry_run: bool,

    /// Process only the named collection
    #[arg(long)]
    collection: Option<String>,

    /// Override the planner's batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Reclassify every movie, ignoring cached decisions
    #[arg(long)]
    force_refresh: bool,

    /// Run connectivity and config checks, then exit
    #[arg(long)]
    health_check: bool,

    /// Print the resolved configuration (secrets masked) and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the state file and exit
    #[arg(long)]
    dump_state: bool,

    /// Clear the state file and exit
    #[arg(long)]
    reset_state: bool,

    /// Sweep batch sizes against the live API and print a recommendation
    #[arg(long)]
    optimize_batch_size: bool,

    /// Send a test email and exit
    #[arg(long)]
    send_test_email: bool,
}

fn config_dir() -> PathBuf {
    PathBuf::from("kometa-config")
}

fn state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    info!(version = VERSION, "starting Kometa-AI");
    process::exit(dispatch(&cli));
}

fn init_logging() {
    let debug = std::env::var("DEBUG_LOGGING")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "1"))
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn dispatch(cli: &Cli) -> i32 {
    // State-only modes work without API credentials.
    if cli.dump_state {
        let mut store = StateManager::new(state_dir());
        store.load();
        println!("{}", store.dump());
        return EXIT_OK;
    }
    if cli.reset_state {
        let mut store = StateManager::new(state_dir());
        return match store.reset() {
            Ok(()) => {
                info!("state reset successfully");
                EXIT_OK
            }
            Err(e) => {
                error!(error = %e, "state reset failed");
                EXIT_RUNTIME
            }
        };
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(missing) => {
            error!(%missing, "configuration invalid");
            return if cli.health_check { EXIT_HEALTH } else { EXIT_CONFIG };
        }
    };

    if cli.health_check {
        let healthy = health::run_health_check(&config, &config_dir(), &state_dir());
        return if healthy { EXIT_OK } else { EXIT_HEALTH };
    }
    if cli.dump_config {
        println!("{}", config.dump());
        return EXIT_OK;
    }
    if cli.send_test_email {
        let notifier = EmailNotifier::new(&config);
        if !notifier.can_send() {
            error!("email configuration incomplete, cannot send test");
            return EXIT_CONFIG;
        }
        return match notifier.send("Kometa-AI Test Email", &notifier.test_message(VERSION)) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                error!(error = %e, "test email failed");
                EXIT_RUNTIME
            }
        };
    }

    run_pipeline(cli, &config)
}

/// The scheduled (or immediate) classification pipeline.
fn run_pipeline(cli: &Cli, config: &Config) -> i32 {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "could not install signal handler");
        }
    }

    // Validate the schedule before doing anything expensive.
    let interval = match parse_interval(&config.schedule_interval) {
        Ok(interval) => interval,
        Err(e) => {
            error!(error = %e, "invalid SCHEDULE_INTERVAL");
            return EXIT_CONFIG;
        }
    };
    let (start_hour, start_minute) = match parse_start_time(&config.schedule_start_time) {
        Ok(time) => time,
        Err(e) => {
            error!(error = %e, "invalid SCHEDULE_START_TIME");
            return EXIT_CONFIG;
        }
    };

    let mut store = StateManager::new(state_dir());
    if let Err(e) = store.lock() {
        error!(error = %e, "cannot start");
        return EXIT_CONFIG;
    }
    store.load();

    let radarr = RadarrClient::new(&config.radarr_url, &config.radarr_api_key);
    if !wait_for_radarr(&radarr, &shutdown) {
        error!("could not reach Radarr, giving up");
        return EXIT_RUNTIME;
    }

    let mut claude = ClaudeClient::new(
        &config.claude_api_key,
        &config.claude_model,
        config.claude_input_cost_per_million,
        config.claude_output_cost_per_million,
        config.debug_logging,
    );

    let opts = RunOptions {
        config_dir: config_dir(),
        collection_filter: cli.collection.clone(),
        force_refresh: cli.force_refresh,
        dry_run: cli.dry_run,
        batch_size: cli.batch_size.unwrap_or(config.batch_size),
    };

    if cli.optimize_batch_size {
        return optimize_batch_size(config, &radarr, &mut claude, &mut store, &opts, &shutdown);
    }

    if !cli.run_now {
        let next = next_activation(interval, start_hour, start_minute, Local::now());
        info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "entering scheduled mode");
        sleep_until(next, &shutdown);
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown requested during schedule wait, exiting");
            return EXIT_OK;
        }
    }

    loop {
        info!("starting processing run");
        match pipeline::run(config, &radarr, &mut claude, &mut store, &opts, &shutdown) {
            Ok(summary) => {
                let next_run = if cli.run_now {
                    None
                } else {
                    Some(next_activation(interval, start_hour, start_minute, Local::now()))
                };
                send_report(config, &store, &summary, next_run);
            }
            Err(e) => {
                error!(error = %e, "run failed");
                send_error_report(config, "main_pipeline", &e);
                if cli.run_now {
                    return EXIT_RUNTIME;
                }
            }
        }

        if cli.run_now || shutdown.load(Ordering::SeqCst) {
            info!("run complete, exiting");
            return EXIT_OK;
        }

        let next = next_activation(interval, start_hour, start_minute, Local::now());
        info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "waiting for next scheduled run");
        sleep_until(next, &shutdown);
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown requested during schedule wait, exiting");
            return EXIT_OK;
        }
    }
}

/// Wait for Radarr to come up, with backoff. Container deployments often
/// start this process before Radarr finishes booting.
fn wait_for_radarr(radarr: &RadarrClient, shutdown: &AtomicBool) -> bool {
    let mut backoff_secs = 1u64;
    for attempt in 1..=10u32 {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        match radarr.test_connection() {
            Ok(_) => return true,
            Err(e) => {
                warn!(attempt, backoff_secs, error = %e, "Radarr not reachable yet");
                thread::sleep(Duration::from_secs(backoff_secs));
                backoff_secs = (backoff_secs * 2).min(60);
            }
        }
    }
    false
}

/// Sleep until `target` in tranches of at most 60 s so a termination
/// signal exits promptly.
fn sleep_until(target: chrono::DateTime<Local>, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let remaining = (target - Local::now()).num_seconds();
        if remaining <= 0 {
            return;
        }
        thread::sleep(Duration::from_secs(remaining.min(60) as u64));
    }
}

/// Compose and send the run report, honoring the notification gates.
fn send_report(
    config: &Config,
    store: &StateManager,
    summary: &RunSummary,
    next_run: Option<chrono::DateTime<Local>>,
) {
    let notifier = EmailNotifier::new(config);
    if !notifier.can_send() {
        info!("email notifications not configured, skipping report");
        return;
    }

    let changes = store.get_changes();
    let errors = store.get_errors();
    if !notifier.should_send(!changes.is_empty(), !errors.is_empty()) {
        info!("nothing to report, skipping notification");
        return;
    }

    let subject = format!(
        "Kometa-AI Processing Report: {} changes, {} errors",
        changes.len(),
        errors.len()
    );
    let body = formatter::format_summary(summary, changes, errors, next_run, VERSION);
    if let Err(e) = notifier.send(&subject, &body) {
        error!(error = %e, "report email failed");
    }
}

/// Best-effort notification for a failed run.
fn send_error_report(config: &Config, context: &str, message: &str) {
    let notifier = EmailNotifier::new(config);
    if !notifier.can_send() {
        return;
    }
    let body = formatter::format_error_notification(context, message, VERSION);
    if let Err(e) = notifier.send("Kometa-AI Critical Error", &body) {
        error!(error = %e, "error email failed");
    }
}

/// Sweep batch sizes over the first enabled collection and print a
/// recommendation. Every sweep step costs real API calls; this mode is
/// only ever run by an explicit flag.
fn optimize_batch_size(
    config: &Config,
    radarr: &RadarrClient,
    claude: &mut ClaudeClient,
    store: &mut StateManager,
    opts: &RunOptions,
    shutdown: &AtomicBool,
) -> i32 {
    const SWEEP_SIZES: [usize; 6] = [50, 100, 150, 200, 250, 300];

    let parser = KometaParser::new(&opts.config_dir, false);
    let collections = match parser.parse_configs() {
        Ok(outcome) => outcome.configs,
        Err(e) => {
            error!(error = %e, "could not read collection configs");
            return EXIT_RUNTIME;
        }
    };
    let collection = match collections.first() {
        Some(collection) => collection.clone(),
        None => {
            error!("no enabled collections found for the sweep");
            return EXIT_CONFIG;
        }
    };

    let movies = match radarr.get_movies() {
        Ok(movies) => movies,
        Err(e) => {
            error!(error = %e, "could not fetch movies");
            return EXIT_RUNTIME;
        }
    };
    let fingerprints: std::collections::HashMap<i64, String> =
        movies.iter().map(|m| (m.id, m.fingerprint())).collect();

    info!(
        collection = %collection.name,
        movies = movies.len(),
        "starting batch size sweep"
    );

    let mut results = serde_json::Map::new();
    let mut best: Option<(usize, f64)> = None;

    for size in SWEEP_SIZES {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        info!(size, "testing batch size");
        let usage_before = claude.usage();
        let started = std::time::Instant::now();

        let processor = MovieProcessor::new(size, true);
        let stats =
            processor.process_collection(&collection, &movies, &fingerprints, claude, store, shutdown);

        let duration = started.elapsed().as_secs_f64();
        let usage = claude.usage().since(&usage_before);
        let cost_per_movie = if stats.processed > 0 {
            usage.cost / stats.processed as f64
        } else {
            0.0
        };
        let efficiency = if duration > 0.0 && usage.cost > 0.0 {
            (stats.processed as f64 / duration) / usage.cost
        } else {
            0.0
        };

        if efficiency > best.map(|(_, e)| e).unwrap_or(0.0) {
            best = Some((size, efficiency));
        }

        results.insert(
            size.to_string(),
            serde_json::json!({
                "duration_secs": duration,
                "processed": stats.processed,
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "cost": usage.cost,
                "cost_per_movie": cost_per_movie,
                "efficiency": efficiency,
            }),
        );

        // Breathe between sweeps to stay clear of rate limits.
        thread::sleep(Duration::from_secs(2));
    }

    let report = serde_json::json!({
        "collection": collection.name,
        "movie_count": movies.len(),
        "batch_results": results,
        "recommended_batch_size": best.map(|(size, _)| size),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    );

    if let Some((size, _)) = best {
        info!(size, "recommended batch size");
    }
    EXIT_OK
}
