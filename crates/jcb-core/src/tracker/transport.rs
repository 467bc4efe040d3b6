use async_trait::async_trait;

use crate::errors::TransportError;

/// Status line + raw body of a tracker response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TrackerResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: String::new(),
            body: body.into(),
        }
    }
}

/// Port for the Jira HTTP transport.
///
/// Any status code is a successful transport result; only timeouts and
/// connection-level failures are errors.
#[async_trait]
pub trait TrackerTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        cookie: Option<&str>,
    ) -> std::result::Result<TrackerResponse, TransportError>;
}
