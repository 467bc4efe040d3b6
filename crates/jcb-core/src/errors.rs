/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the scheduler
/// can apply one escalation policy (fatal vs logged) to every pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("jira login failed: {0}")]
    Auth(#[from] AuthError),

    #[error("jira query failed: {0}")]
    Query(#[from] QueryError),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

/// Tracker login failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("rejected with status {status}")]
    Rejected { status: u16 },

    #[error("malformed session response: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Tracker query failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("{status} {reason}")]
    Status { status: u16, reason: String },

    /// A 401 triggered a successful re-login; the request itself was not retried.
    #[error("session expired and was renewed; request must be re-issued")]
    SessionRenewed,

    #[error("re-authorization failed: {0}")]
    Reauth(AuthError),

    #[error("jira request has expired: {0}")]
    Timeout(String),

    #[error("jira request failed: {0}")]
    Transport(String),

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Failures reported by a [`crate::tracker::transport::TrackerTransport`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Request(String),
}

impl From<TransportError> for QueryError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(m) => QueryError::Timeout(m),
            TransportError::Request(m) => QueryError::Transport(m),
        }
    }
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
