use std::{env, fs, path::Path, time::Duration};

use crate::{domain::ConversationId, errors::Error, Result};

/// One saved Jira query and how often to run it.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Used as the subject of the digest message.
    pub name: String,
    /// Body of the `search` request (`{"jql": ..., "maxResults": ...}`).
    pub query: serde_json::Value,
    pub interval: Duration,
}

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Jira
    pub jira_domain: String,
    pub jira_internal_domain: String,
    pub jira_username: String,
    pub jira_password: String,
    pub jira_request_timeout: Duration,
    pub jira_accept_invalid_certs: bool,

    // Polls
    pub issues_poll: PollConfig,
    pub report_poll: PollConfig,

    // Circuit
    pub circuit_domain: String,
    pub circuit_email: String,
    pub circuit_password: String,
    pub circuit_client_id: String,
    pub circuit_client_secret: Option<String>,
    pub circuit_conv_id: ConversationId,

    // Logging
    pub log_level: String,
    pub sdk_log_level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };

        let jira_domain = trim_domain(vars.required("JIRA_DOMAIN")?);
        let jira_internal_domain = vars
            .non_empty("JIRA_INTERNAL_DOMAIN")
            .map(trim_domain)
            .unwrap_or_else(|| jira_domain.clone());
        let jira_username = vars.required("JIRA_USERNAME")?;
        let jira_password = vars.required("JIRA_PASSWORD")?;
        let jira_request_timeout =
            Duration::from_millis(vars.u64("JIRA_REQUEST_TIMEOUT_MS")?.unwrap_or(30_000));
        let jira_accept_invalid_certs = vars.bool("JIRA_ACCEPT_INVALID_CERTS").unwrap_or(false);

        let issues_minutes = vars.u64("JIRA_ISSUES_INTERVAL_MINUTES")?.unwrap_or(5);
        let issues_poll = PollConfig {
            name: "New issues".to_string(),
            query: vars.json_object("JIRA_ISSUES_QUERY")?,
            interval: positive_interval("JIRA_ISSUES_INTERVAL_MINUTES", issues_minutes, 60)?,
        };

        let report_hours = vars.u64("JIRA_REPORT_INTERVAL_HOURS")?.unwrap_or(24);
        let report_poll = PollConfig {
            name: vars
                .non_empty("JIRA_REPORT_NAME")
                .unwrap_or_else(|| "Daily P0/P1 report".to_string()),
            query: vars.json_object("JIRA_REPORT_QUERY")?,
            interval: positive_interval("JIRA_REPORT_INTERVAL_HOURS", report_hours, 3600)?,
        };

        let circuit_domain = trim_domain(vars.required("CIRCUIT_DOMAIN")?);
        let circuit_email = vars.required("CIRCUIT_EMAIL")?;
        let circuit_password = vars.required("CIRCUIT_PASSWORD")?;
        let circuit_client_id = vars.required("CIRCUIT_CLIENT_ID")?;
        let circuit_client_secret = vars.non_empty("CIRCUIT_CLIENT_SECRET");
        let circuit_conv_id = ConversationId(vars.required("CIRCUIT_CONV_ID")?);

        let log_level = vars
            .non_empty("LOG_LEVEL")
            .unwrap_or_else(|| "debug".to_string());
        let sdk_log_level = vars
            .non_empty("SDK_LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            jira_domain,
            jira_internal_domain,
            jira_username,
            jira_password,
            jira_request_timeout,
            jira_accept_invalid_certs,
            issues_poll,
            report_poll,
            circuit_domain,
            circuit_email,
            circuit_password,
            circuit_client_id,
            circuit_client_secret,
            circuit_conv_id,
            log_level,
            sdk_log_level,
        })
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.lookup)(key).and_then(non_empty)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.non_empty(key)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    fn u64(&self, key: &str) -> Result<Option<u64>> {
        let Some(raw) = self.non_empty(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer: {raw}")))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.non_empty(key).map(|s| {
            matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn json_object(&self, key: &str) -> Result<serde_json::Value> {
        let raw = self.required(key)?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{key} is not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(Error::Config(format!("{key} must be a JSON object")));
        }
        Ok(value)
    }
}

/// Longest accepted poll interval (one year).
const MAX_INTERVAL_SECS: u64 = 365 * 24 * 3600;

fn positive_interval(key: &str, units: u64, unit_secs: u64) -> Result<Duration> {
    if units == 0 {
        return Err(Error::Config(format!("{key} must be greater than zero")));
    }
    match units.checked_mul(unit_secs) {
        Some(secs) if secs <= MAX_INTERVAL_SECS => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{key} is too large (max {MAX_INTERVAL_SECS} seconds)"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn trim_domain(s: String) -> String {
    s.trim().trim_end_matches('/').to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
