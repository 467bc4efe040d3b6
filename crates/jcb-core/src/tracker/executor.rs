use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{
    errors::QueryError,
    issue::{RawIssue, SearchResponse},
    tracker::{session::SessionManager, transport::TrackerTransport},
    Result,
};

/// Runs authenticated queries against `<domain>/rest/api/2/`.
pub struct QueryExecutor {
    transport: Arc<dyn TrackerTransport>,
    session: Arc<SessionManager>,
    domain: String,
}

impl QueryExecutor {
    pub fn new(
        transport: Arc<dyn TrackerTransport>,
        session: Arc<SessionManager>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            domain: domain.into(),
        }
    }

    /// Execute `path` (e.g. `search`) with `params` as the JSON body.
    ///
    /// A 401 triggers one inline re-login. The original request is not
    /// replayed: on a successful re-login this still fails with
    /// [`QueryError::SessionRenewed`] and the caller has to issue it again.
    pub async fn execute(
        &self,
        path: &str,
        params: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, QueryError> {
        let url = format!("{}/rest/api/2/{}", self.domain, path.trim_start_matches('/'));
        let cookie = self.session.cookie().await;

        debug!(%url, %params, "query jira");

        let resp = self
            .transport
            .post_json(&url, params, cookie.as_deref())
            .await
            .map_err(|e| {
                error!(%url, error = %e, "jira request failed");
                QueryError::from(e)
            })?;

        match resp.status {
            200 => serde_json::from_str(&resp.body).map_err(|e| {
                error!(%url, error = %e, "jira returned an undecodable body");
                QueryError::Decode(e.to_string())
            }),
            401 => {
                let age = self.session.session().await.map(|s| s.age().num_minutes());
                info!(?age, "401 Unauthorized. Trying to re-authorize.");
                match self.session.login().await {
                    Ok(_) => {
                        info!("successfully re-authorized");
                        Err(QueryError::SessionRenewed)
                    }
                    Err(e) => {
                        error!(error = %e, "failed to re-authorize. Giving up.");
                        Err(QueryError::Reauth(e))
                    }
                }
            }
            status => {
                error!(status, reason = %resp.reason, %url, "jira query rejected");
                Err(QueryError::Status {
                    status,
                    reason: resp.reason,
                })
            }
        }
    }

    /// Run a `search` query and decode its `issues`. A missing `issues` field
    /// is an empty batch.
    pub async fn search(&self, query: &serde_json::Value) -> Result<Vec<RawIssue>> {
        let data = self.execute("search", query).await?;
        let resp: SearchResponse =
            serde_json::from_value(data).map_err(|e| QueryError::Decode(e.to_string()))?;
        info!(count = resp.issues.len(), "fetched jira issues");
        Ok(resp.issues)
    }
}
