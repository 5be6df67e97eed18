//! Startup health probe: connectivity and config loadability.

use std::path::Path;

use tracing::{error, info, warn};

use kometa_core::schedule::{parse_interval, parse_start_time};
use kometa_core::KometaParser;

use crate::claude::ClaudeClient;
use crate::config::Config;
use crate::radarr::RadarrClient;

/// Run every check and report overall health.
///
/// Checks are independent so the log shows everything that is wrong, not
/// just the first failure.
pub fn run_health_check(config: &Config, config_dir: &Path, state_dir: &Path) -> bool {
    let mut healthy = true;

    info!("checking Radarr connectivity...");
    let radarr = RadarrClient::new(&config.radarr_url, &config.radarr_api_key);
    match radarr.test_connection() {
        Ok(status) => info!(version = %status.version, "Radarr reachable"),
        Err(e) => {
            error!(error = %e, "Radarr connection failed");
            healthy = false;
        }
    }

    info!("checking Claude API connectivity...");
    let claude = ClaudeClient::new(
        &config.claude_api_key,
        &config.claude_model,
        config.claude_input_cost_per_million,
        config.claude_output_cost_per_million,
        config.debug_logging,
    );
    match claude.test_connection() {
        Ok(()) => info!("Claude API reachable"),
        Err(e) => {
            error!(error = %e, "Claude API connection failed");
            healthy = false;
        }
    }

    info!("checking collection configuration...");
    if config_dir.is_dir() {
        let parser = KometaParser::new(config_dir, false);
        match parser.parse_configs() {
            Ok(outcome) => {
                info!(
                    collections = outcome.configs.len(),
                    diagnostics = outcome.diagnostics.len(),
                    "configuration parsed"
                );
                for diagnostic in &outcome.diagnostics {
                    warn!(diagnostic = %diagnostic, "config diagnostic");
                }
            }
            Err(e) => {
                error!(error = %e, "configuration unreadable");
                healthy = false;
            }
        }
    } else {
        error!(dir = %config_dir.display(), "configuration directory not found");
        healthy = false;
    }

    info!("checking state directory...");
    match std::fs::create_dir_all(state_dir) {
        Ok(()) => info!(dir = %state_dir.display(), "state directory writable"),
        Err(e) => {
            error!(dir = %state_dir.display(), error = %e, "state directory unusable");
            healthy = false;
        }
    }

    info!("checking schedule configuration...");
    match parse_interval(&config.schedule_interval) {
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "invalid SCHEDULE_INTERVAL");
            healthy = false;
        }
    }
    match parse_start_time(&config.schedule_start_time) {
        Ok(_) => info!(
            interval = %config.schedule_interval,
            start = %config.schedule_start_time,
            "schedule configured"
        ),
        Err(e) => {
            error!(error = %e, "invalid SCHEDULE_START_TIME");
            healthy = false;
        }
    }

    if config.smtp_server.is_none() {
        warn!("SMTP_SERVER not configured, email notifications will be disabled");
    }

    if healthy {
        info!("all health checks passed");
    }
    healthy
}
