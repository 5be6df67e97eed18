//! Anthropic Messages API client with retry, rate-limit handling, and
//! salvage parsing for imperfect JSON replies.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Anthropic Messages API endpoint.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Model-listing endpoint, used by the health probe.
const ANTHROPIC_MODELS_URL: &str = "https://api.anthropic.com/v1/models";

/// Required API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum attempts per logical call.
const MAX_ATTEMPTS: u32 = 10;

/// Initial backoff in seconds (doubles per retry, capped).
const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;

/// Request timeout. Classification batches can be slow to generate.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Low temperature for consistent classification.
const TEMPERATURE: f64 = 0.1;

/// Output budgets per call kind.
const CLASSIFY_MAX_TOKENS: u32 = 4000;
const REFINE_MAX_TOKENS: u32 = 2000;

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// A batch classification reply.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionsResponse {
    #[serde(default)]
    pub collection_name: String,
    pub decisions: Vec<MovieDecision>,
}

/// One per-movie verdict inside a batch reply.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieDecision {
    /// Defaulting to 0 lets one malformed entry drop (unknown id) instead
    /// of failing the whole batch.
    #[serde(default)]
    pub movie_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A single-movie refinement reply.
#[derive(Debug, Clone, Deserialize)]
pub struct RefinementResponse {
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub detailed_analysis: Option<String>,
}

/// Token and cost accounting, accumulated across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub requests: u64,
}

impl UsageStats {
    pub fn add(&mut self, other: &UsageStats) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
        self.requests += other.requests;
    }

    /// Usage accumulated between two snapshots of the same counter.
    pub fn since(&self, earlier: &UsageStats) -> UsageStats {
        UsageStats {
            input_tokens: self.input_tokens - earlier.input_tokens,
            output_tokens: self.output_tokens - earlier.output_tokens,
            cost: self.cost - earlier.cost,
            requests: self.requests - earlier.requests,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Client for the Claude API.
pub struct ClaudeClient {
    api_key: String,
    model: String,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
    debug_mode: bool,
    agent: ureq::Agent,
    usage: UsageStats,
}

impl ClaudeClient {
    pub fn new(
        api_key: &str,
        model: &str,
        input_cost_per_million: f64,
        output_cost_per_million: f64,
        debug_mode: bool,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .build()
            .into();
        info!(model, "initialized Claude client");
        ClaudeClient {
            api_key: api_key.to_string(),
            model: model.to_string(),
            input_cost_per_million,
            output_cost_per_million,
            debug_mode,
            agent,
            usage: UsageStats::default(),
        }
    }

    /// Usage accumulated so far across all calls.
    pub fn usage(&self) -> UsageStats {
        self.usage
    }

    /// Classify a movie batch against a collection prompt.
    ///
    /// Transient API failures retry with exponential backoff up to
    /// [`MAX_ATTEMPTS`]. A reply that defeats the salvage ladder fails the
    /// batch immediately; the planner re-asks its movies on the next run.
    pub fn classify_movies(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<DecisionsResponse, String> {
        let text = self.request_with_retry(system_prompt, user_prompt, CLASSIFY_MAX_TOKENS)?;
        parse_decisions(&text)
    }

    /// Detailed single-movie analysis for a borderline decision.
    pub fn analyze_movie(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<RefinementResponse, String> {
        let text = self.request_with_retry(system_prompt, user_prompt, REFINE_MAX_TOKENS)?;
        let value = salvage_json(&text)?;
        serde_json::from_value(value)
            .map_err(|e| format!("could not parse refinement reply: {}", e))
    }

    /// Cheap connectivity probe: list models.
    pub fn test_connection(&self) -> Result<(), String> {
        let response = self
            .agent
            .get(ANTHROPIC_MODELS_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .call()
            .map_err(|e| format!("Claude API unreachable: {}", e))?;
        // Any well-formed reply means auth and connectivity are fine.
        let _ = response.into_body().read_to_string();
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn request_with_retry(
        &mut self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, String> {
        let mut backoff_secs = INITIAL_BACKOFF_SECS;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.request_once(system, user, max_tokens) {
                Ok(text) => return Ok(text),
                Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                    warn!(attempt, backoff_secs, error = %e, "Claude call failed, backing off");
                    thread::sleep(Duration::from_secs(backoff_secs));
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                }
                Err(e) => return Err(e),
            }
        }
        Err(format!("call abandoned after {} attempts", MAX_ATTEMPTS))
    }

    /// One HTTP attempt. Token usage is accumulated whenever a reply was
    /// received, even if the caller later rejects its content.
    fn request_once(
        &mut self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, String> {
        if self.debug_mode {
            debug!(system_len = system.len(), user_len = user.len(), "sending prompt");
        }

        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            temperature: TEMPERATURE,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .agent
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| format!("Claude API request failed: {}", e))?;

        let parsed: MessagesResponse = response
            .into_body()
            .read_json()
            .map_err(|e| format!("Claude API response unreadable: {}", e))?;

        let api_usage = parsed.usage.unwrap_or_default();
        let call_cost = self.cost_of(api_usage.input_tokens, api_usage.output_tokens);
        self.usage.add(&UsageStats {
            input_tokens: api_usage.input_tokens,
            output_tokens: api_usage.output_tokens,
            cost: call_cost,
            requests: 1,
        });
        info!(
            input_tokens = api_usage.input_tokens,
            output_tokens = api_usage.output_tokens,
            cost = format!("{:.4}", call_cost).as_str(),
            "Claude API usage"
        );

        let text = parsed
            .content
            .first()
            .and_then(|block| block.text.clone())
            .ok_or_else(|| "Claude reply contained no text content".to_string())?;

        if self.debug_mode {
            debug!(reply_len = text.len(), "received reply");
        }
        Ok(text)
    }

    fn cost_of(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million
    }
}

// ── Reply parsing ────────────────────────────────────────────────────────────

/// Parse a batch reply, salvaging common formatting mistakes.
pub fn parse_decisions(text: &str) -> Result<DecisionsResponse, String> {
    let value = salvage_json(text)?;
    let response: DecisionsResponse = serde_json::from_value(value)
        .map_err(|e| format!("could not parse decisions reply: {}", e))?;
    Ok(response)
}

/// Extract a JSON object from a model reply.
///
/// Ladder: strict parse, then code-fence stripping, then the first
/// balanced `{…}` block (tolerating leading prose). Each rung that fails
/// falls through to the next; total failure reports a truncated preview.
fn salvage_json(text: &str) -> Result<serde_json::Value, String> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(&stripped) {
        debug!("salvaged reply from code fences");
        return Ok(value);
    }

    if let Some(candidate) = balanced_object(text) {
        if let Ok(value) = serde_json::from_str(candidate) {
            debug!("salvaged reply from embedded object");
            return Ok(value);
        }
    }

    error!(preview = %truncate(text, 200), "unsalvageable Claude reply");
    Err(format!(
        "could not parse reply as JSON; preview: {}",
        truncate(text, 200)
    ))
}

/// Strip markdown code fences (```json … ``` or ``` … ```).
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        // Skip an optional language tag on the opening fence line.
        let after_tag = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        if let Some(end) = after_tag.rfind("```") {
            return after_tag[..end].trim().to_string();
        }
        return after_tag.trim().to_string();
    }

    trimmed.to_string()
}

/// The first `{`-to-matching-`}` slice, tracking string literals so braces
/// inside reasoning text do not confuse the scan.
fn balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
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

/// Retryable conditions: rate limits, server errors, and transport faults.
/// Auth and malformed-request errors are immediately fatal for the batch.
fn is_retryable(error: &str) -> bool {
    if let Some(status) = extract_http_status(error) {
        return status == 429 || status == 408 || (500..=599).contains(&status);
    }
    let lower = error.to_lowercase();
    lower.contains("connection") || lower.contains("timeout") || lower.contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "collection_name": "Film Noir",
        "decisions": [
            {"movie_id": 1, "title": "Chinatown", "include": true, "confidence": 0.92},
            {"movie_id": 2, "title": "Toy Story", "include": false, "confidence": 0.05}
        ]
    }"#;

    #[test]
    fn test_parse_strict_json() {
        let response = parse_decisions(VALID).unwrap();
        assert_eq!(response.collection_name, "Film Noir");
        assert_eq!(response.decisions.len(), 2);
        assert!(response.decisions[0].include);
        assert_eq!(response.decisions[1].confidence, 0.05);
    }

    #[test]
    fn test_parse_code_fenced_json() {
        let fenced = format!("```json\n{}\n```", VALID);
        let response = parse_decisions(&fenced).unwrap();
        assert_eq!(response.decisions.len(), 2);
    }

    #[test]
    fn test_parse_with_prose_preamble() {
        let wrapped = format!(
            "Here are my classification decisions for the batch:\n\n{}\n\nLet me know if you need more.",
            VALID
        );
        let response = parse_decisions(&wrapped).unwrap();
        assert_eq!(response.decisions.len(), 2);
        assert_eq!(response.decisions[0].movie_id, 1);
    }

    #[test]
    fn test_parse_braces_inside_reasoning() {
        let tricky = r#"Sure: {
            "collection_name": "Meta",
            "decisions": [
                {"movie_id": 3, "title": "X", "include": true, "confidence": 0.8,
                 "reasoning": "uses {braces} and \"quotes\" heavily"}
            ]
        } done"#;
        let response = parse_decisions(tricky).unwrap();
        assert_eq!(response.decisions.len(), 1);
        assert!(response.decisions[0]
            .reasoning
            .as_deref()
            .unwrap()
            .contains("{braces}"));
    }

    #[test]
    fn test_parse_garbage_fails_with_preview() {
        let err = parse_decisions("I cannot classify these movies.").unwrap_err();
        assert!(err.contains("preview"));
    }

    #[test]
    fn test_parse_refinement_reply() {
        let text = r#"{"movie_title": "Blade Runner", "collection_name": "Film Noir",
            "detailed_analysis": "Neo-noir rather than classic noir…",
            "include": false, "confidence": 0.6, "reasoning": "stylistically adjacent"}"#;
        let value = salvage_json(text).unwrap();
        let refined: RefinementResponse = serde_json::from_value(value).unwrap();
        assert!(!refined.include);
        assert_eq!(refined.confidence, 0.6);
        assert!(refined.detailed_analysis.unwrap().starts_with("Neo-noir"));
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable("http status: 429"));
        assert!(is_retryable("http status: 503"));
        assert!(is_retryable("connection refused"));
        assert!(!is_retryable("http status: 401 unauthorized"));
        assert!(!is_retryable("http status: 400 bad request"));
    }

    #[test]
    fn test_usage_accounting() {
        let mut total = UsageStats::default();
        total.add(&UsageStats {
            input_tokens: 1000,
            output_tokens: 200,
            cost: 0.006,
            requests: 1,
        });
        let before = total;
        total.add(&UsageStats {
            input_tokens: 500,
            output_tokens: 100,
            cost: 0.003,
            requests: 1,
        });
        let delta = total.since(&before);
        assert_eq!(delta.input_tokens, 500);
        assert_eq!(delta.requests, 1);
        assert!((delta.cost - 0.003).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "αβγδε";
        let t = truncate(s, 3);
        assert!(t.ends_with("..."));
    }
}
