use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Crates that talk to the outside world (Circuit, Jira, HTTP stack) log at the
/// "sdk" level; the bot itself logs at the app level.
const SDK_TARGETS: &[&str] = &["jcb_circuit", "jcb_jira", "reqwest", "hyper"];

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` overrides both levels when set.
pub fn init(app_level: &str, sdk_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(app_level, sdk_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

fn default_directives(app_level: &str, sdk_level: &str) -> String {
    let mut parts = vec![
        sdk_level.to_string(),
        format!("jcb={app_level}"),
        format!("jcb_core={app_level}"),
    ];
    parts.extend(SDK_TARGETS.iter().map(|t| format!("{t}={sdk_level}")));
    parts.join(",")
}
