//! Radarr v3 API client.
//!
//! Synchronous `ureq` client with retry on transport-level failures and
//! 5xx responses. Validation-style errors (400/401/404/409) surface
//! immediately with the server's message where available.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use kometa_core::{Movie, Tag};

/// Request timeout for every Radarr call.
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Maximum retries for transient failures.
const MAX_RETRIES: u32 = 5;
/// Backoff cap in seconds.
const MAX_BACKOFF_SECS: u64 = 30;

/// Minimal system-status payload, used by the health probe.
#[derive(Debug, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub version: String,
}

/// Client for one Radarr instance.
pub struct RadarrClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl RadarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .build()
            .into();
        RadarrClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            agent,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// All movies in the library.
    pub fn get_movies(&self) -> Result<Vec<Movie>, String> {
        let movies: Vec<Movie> = self.get_json("movie")?;
        info!(count = movies.len(), "fetched movies from Radarr");
        Ok(movies)
    }

    pub fn get_movie(&self, movie_id: i64) -> Result<Movie, String> {
        self.get_json(&format!("movie/{}", movie_id))
    }

    /// All tags, id and label.
    pub fn get_tags(&self) -> Result<Vec<Tag>, String> {
        let tags: Vec<Tag> = self.get_json("tag")?;
        debug!(count = tags.len(), "fetched tags from Radarr");
        Ok(tags)
    }

    /// Look a tag up by label, case-insensitively.
    pub fn get_tag_by_label(&self, label: &str) -> Result<Option<Tag>, String> {
        let tags = self.get_tags()?;
        Ok(tags
            .into_iter()
            .find(|t| t.label.eq_ignore_ascii_case(label)))
    }

    /// Create a tag. Radarr treats tag creation as idempotent on label.
    pub fn create_tag(&self, label: &str) -> Result<Tag, String> {
        info!(label, "creating tag in Radarr");
        let body = serde_json::json!({ "label": label });
        self.send_json("POST", "tag", &body)
    }

    /// Resolve a label to a tag, creating it when missing.
    pub fn get_or_create_tag(&self, label: &str) -> Result<Tag, String> {
        match self.get_tag_by_label(label)? {
            Some(tag) => Ok(tag),
            None => self.create_tag(label),
        }
    }

    /// Push a movie document back, used after editing its tag id set.
    pub fn update_movie(&self, movie: &Movie) -> Result<Movie, String> {
        debug!(movie_id = movie.id, "updating movie in Radarr");
        self.send_json("PUT", &format!("movie/{}", movie.id), movie)
    }

    pub fn add_tag_to_movie(&self, movie_id: i64, tag_id: i64) -> Result<Movie, String> {
        let mut movie = self.get_movie(movie_id)?;
        if !movie.tag_ids.contains(&tag_id) {
            movie.tag_ids.push(tag_id);
            return self.update_movie(&movie);
        }
        Ok(movie)
    }

    pub fn remove_tag_from_movie(&self, movie_id: i64, tag_id: i64) -> Result<Movie, String> {
        let mut movie = self.get_movie(movie_id)?;
        if movie.tag_ids.contains(&tag_id) {
            movie.tag_ids.retain(|&id| id != tag_id);
            return self.update_movie(&movie);
        }
        Ok(movie)
    }

    /// Probe `/system/status`; used at startup and by the health check.
    pub fn test_connection(&self) -> Result<SystemStatus, String> {
        let status: SystemStatus = self.get_json("system/status")?;
        info!(version = %status.version, "connected to Radarr");
        Ok(status)
    }

    // ── Request plumbing ─────────────────────────────────────────────────────

    fn get_json<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, String> {
        let url = self.url(endpoint);
        with_retry(MAX_RETRIES, || {
            let response = self
                .agent
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .header("Accept", "application/json")
                .header("User-Agent", "Kometa-AI")
                .call()
                .map_err(|e| classify_error(&url, e))?;
            response
                .into_body()
                .read_json::<T>()
                .map_err(|e| format!("could not parse response from {}: {}", url, e))
        })
    }

    fn send_json<B: serde::Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        endpoint: &str,
        body: &B,
    ) -> Result<T, String> {
        let url = self.url(endpoint);
        with_retry(MAX_RETRIES, || {
            let request = match method {
                "PUT" => self.agent.put(&url),
                _ => self.agent.post(&url),
            };
            let response = request
                .header("X-Api-Key", &self.api_key)
                .header("Accept", "application/json")
                .header("User-Agent", "Kometa-AI")
                .send_json(body)
                .map_err(|e| classify_error(&url, e))?;
            response
                .into_body()
                .read_json::<T>()
                .map_err(|e| format!("could not parse response from {}: {}", url, e))
        })
    }
}

/// Map a ureq error to a display string that keeps the HTTP status visible
/// for retry classification.
fn classify_error(url: &str, error: ureq::Error) -> String {
    format!("request to {} failed: {}", url, error)
}

/// Extract a 4xx/5xx status code from an error display string.
fn extract_http_status(error: &str) -> Option<u16> {
    for word in error.split_whitespace() {
        let clean = word.trim_matches(|c: char| !c.is_ascii_digit());
        if clean.len() == 3 {
            if let Ok(code) = clean.parse::<u16>() {
                if (400..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }
    None
}

/// Transient failures worth retrying: 429, 5xx, and transport errors.
fn is_retryable(error: &str) -> bool {
    if let Some(status) = extract_http_status(error) {
        return status == 429 || (500..=599).contains(&status);
    }
    let lower = error.to_lowercase();
    lower.contains("connection") || lower.contains("timeout") || lower.contains("timed out")
}

fn with_retry<T, F: FnMut() -> Result<T, String>>(max_retries: u32, mut f: F) -> Result<T, String> {
    let mut backoff_secs = 1u64;
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < max_retries && is_retryable(&e) {
                    warn!(
                        attempt = attempt + 1,
                        max = max_retries + 1,
                        backoff_secs,
                        error = %e,
                        "Radarr request failed, backing off"
                    );
                    thread::sleep(Duration::from_secs(backoff_secs));
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    last_error = e;
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(format!(
        "all {} attempts failed, last error: {}",
        max_retries + 1,
        last_error
    ))
}
