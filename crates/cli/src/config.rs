//! Environment-variable configuration.
//!
//! One `Config` is built at process start and threaded through everything;
//! nothing reads the environment after startup.

use std::collections::BTreeMap;
use std::env;

use serde_json::{Map, Value};

/// Default Claude model when `CLAUDE_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default movies per classification batch.
pub const DEFAULT_BATCH_SIZE: usize = 150;

/// Runtime configuration, resolved once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub radarr_url: String,
    pub radarr_api_key: String,
    pub claude_api_key: String,
    pub claude_model: String,
    pub claude_input_cost_per_million: f64,
    pub claude_output_cost_per_million: f64,
    pub debug_logging: bool,

    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_use_tls: bool,
    pub smtp_use_ssl: bool,
    pub notification_recipients: Vec<String>,
    pub notification_from: String,
    pub notification_reply_to: String,
    pub notify_on_no_changes: bool,
    pub notify_on_errors_only: bool,

    pub schedule_interval: String,
    pub schedule_start_time: String,
    pub batch_size: usize,
    pub fix_tags: bool,
}

/// Names of the required variables missing from the environment.
#[derive(Debug)]
pub struct MissingConfig(pub Vec<&'static str>);

impl std::fmt::Display for MissingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "missing required configuration: {}", self.0.join(", "))
    }
}

impl Config {
    /// Read every recognized variable, applying defaults.
    ///
    /// Returns `Err` when a required variable (`RADARR_URL`,
    /// `RADARR_API_KEY`, `CLAUDE_API_KEY`) is absent or empty.
    pub fn from_env() -> Result<Config, MissingConfig> {
        let mut config = Config {
            radarr_url: get("RADARR_URL").unwrap_or_default(),
            radarr_api_key: get("RADARR_API_KEY").unwrap_or_default(),
            claude_api_key: get("CLAUDE_API_KEY").unwrap_or_default(),
            claude_model: get("CLAUDE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            claude_input_cost_per_million: get_f64("CLAUDE_INPUT_COST_PER_MILLION", 3.0),
            claude_output_cost_per_million: get_f64("CLAUDE_OUTPUT_COST_PER_MILLION", 15.0),
            debug_logging: get_bool("DEBUG_LOGGING", false),

            smtp_server: get("SMTP_SERVER"),
            smtp_port: get_u16("SMTP_PORT", 25),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_use_tls: get_bool("SMTP_USE_TLS", false),
            smtp_use_ssl: get_bool("SMTP_USE_SSL", false),
            notification_recipients: get_list("NOTIFICATION_RECIPIENTS"),
            notification_from: get("NOTIFICATION_FROM")
                .unwrap_or_else(|| "kometa-ai@localhost".to_string()),
            notification_reply_to: String::new(),
            notify_on_no_changes: get_bool("NOTIFY_ON_NO_CHANGES", false),
            notify_on_errors_only: get_bool("NOTIFY_ON_ERRORS_ONLY", true),

            schedule_interval: get("SCHEDULE_INTERVAL").unwrap_or_else(|| "1d".to_string()),
            schedule_start_time: get("SCHEDULE_START_TIME").unwrap_or_else(|| "03:00".to_string()),
            batch_size: get_usize("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            fix_tags: get_bool("KOMETA_FIX_TAGS", false),
        };

        config.notification_reply_to =
            get("NOTIFICATION_REPLY_TO").unwrap_or_else(|| config.notification_from.clone());

        let mut missing = Vec::new();
        if config.radarr_url.is_empty() {
            missing.push("RADARR_URL");
        }
        if config.radarr_api_key.is_empty() {
            missing.push("RADARR_API_KEY");
        }
        if config.claude_api_key.is_empty() {
            missing.push("CLAUDE_API_KEY");
        }
        if missing.is_empty() {
            Ok(config)
        } else {
            Err(MissingConfig(missing))
        }
    }

    /// Pretty JSON of the configuration with secrets masked, for
    /// `--dump-config`.
    pub fn dump(&self) -> String {
        let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
        fields.insert("RADARR_URL", Value::String(self.radarr_url.clone()));
        fields.insert("RADARR_API_KEY", mask(&self.radarr_api_key));
        fields.insert("CLAUDE_API_KEY", mask(&self.claude_api_key));
        fields.insert("CLAUDE_MODEL", Value::String(self.claude_model.clone()));
        fields.insert(
            "CLAUDE_INPUT_COST_PER_MILLION",
            Value::from(self.claude_input_cost_per_million),
        );
        fields.insert(
            "CLAUDE_OUTPUT_COST_PER_MILLION",
            Value::from(self.claude_output_cost_per_million),
        );
        fields.insert("DEBUG_LOGGING", Value::Bool(self.debug_logging));
        fields.insert(
            "SMTP_SERVER",
            option_value(self.smtp_server.clone()),
        );
        fields.insert("SMTP_PORT", Value::from(self.smtp_port));
        fields.insert("SMTP_USERNAME", option_value(self.smtp_username.clone()));
        fields.insert(
            "SMTP_PASSWORD",
            match &self.smtp_password {
                Some(p) => mask(p),
                None => Value::Null,
            },
        );
        fields.insert("SMTP_USE_TLS", Value::Bool(self.smtp_use_tls));
        fields.insert("SMTP_USE_SSL", Value::Bool(self.smtp_use_ssl));
        fields.insert(
            "NOTIFICATION_RECIPIENTS",
            Value::Array(
                self.notification_recipients
                    .iter()
                    .map(|r| Value::String(r.clone()))
                    .collect(),
            ),
        );
        fields.insert(
            "NOTIFICATION_FROM",
            Value::String(self.notification_from.clone()),
        );
        fields.insert(
            "NOTIFICATION_REPLY_TO",
            Value::String(self.notification_reply_to.clone()),
        );
        fields.insert(
            "NOTIFY_ON_NO_CHANGES",
            Value::Bool(self.notify_on_no_changes),
        );
        fields.insert(
            "NOTIFY_ON_ERRORS_ONLY",
            Value::Bool(self.notify_on_errors_only),
        );
        fields.insert(
            "SCHEDULE_INTERVAL",
            Value::String(self.schedule_interval.clone()),
        );
        fields.insert(
            "SCHEDULE_START_TIME",
            Value::String(self.schedule_start_time.clone()),
        );
        fields.insert("BATCH_SIZE", Value::from(self.batch_size));
        fields.insert("KOMETA_FIX_TAGS", Value::Bool(self.fix_tags));

        let map: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        serde_json::to_string_pretty(&Value::Object(map))
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

fn mask(secret: &str) -> Value {
    if secret.is_empty() {
        Value::Null
    } else {
        Value::String("********".to_string())
    }
}

fn option_value(v: Option<String>) -> Value {
    v.map(Value::String).unwrap_or(Value::Null)
}

fn get(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_bool(key: &str, default: bool) -> bool {
    match get(key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "yes" | "1" | "t" | "y"),
        None => default,
    }
}

fn get_u16(key: &str, default: u16) -> u16 {
    get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_usize(key: &str, default: usize) -> usize {
    get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_f64(key: &str, default: f64) -> f64 {
    get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_list(key: &str) -> Vec<String> {
    match get(key) {
        Some(v) => v
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        None => Vec::new(),
    }
}
