use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::{errors::AuthError, tracker::transport::TrackerTransport};

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An authenticated Jira session (cookie name + value).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub value: String,
    pub obtained_at: DateTime<Utc>,
}

impl Session {
    /// Value for the `cookie` request header.
    pub fn cookie(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.obtained_at
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    session: LoginSession,
}

#[derive(Deserialize)]
struct LoginSession {
    name: String,
    value: String,
}

/// Owns the process-wide Jira session.
///
/// The session is swapped as a whole under a write lock, so readers see either
/// the old session or the new one. Expiry is not tracked here; callers find
/// out through a 401 and call [`SessionManager::login`] again.
pub struct SessionManager {
    transport: Arc<dyn TrackerTransport>,
    domain: String,
    credentials: Credentials,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn TrackerTransport>,
        domain: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            domain: domain.into(),
            credentials,
            current: RwLock::new(None),
        }
    }

    pub async fn login(&self) -> Result<Session, AuthError> {
        let url = format!("{}/rest/auth/1/session", self.domain);
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });

        debug!(
            username = %self.credentials.username,
            %url,
            "login request to jira"
        );

        let resp = match self.transport.post_json(&url, &body, None).await {
            Ok(r) => r,
            Err(e) => {
                error!(%url, error = %e, "jira login request failed");
                return Err(e.into());
            }
        };

        if !(200..300).contains(&resp.status) {
            error!(
                %url,
                username = %self.credentials.username,
                status = resp.status,
                "error logging in to jira"
            );
            *self.current.write().await = None;
            return Err(AuthError::Rejected {
                status: resp.status,
            });
        }

        let parsed: LoginResponse = match serde_json::from_str(&resp.body) {
            Ok(v) => v,
            Err(e) => {
                error!(%url, error = %e, "jira login returned an unexpected body");
                *self.current.write().await = None;
                return Err(AuthError::Malformed(e.to_string()));
            }
        };

        let session = Session {
            name: parsed.session.name,
            value: parsed.session.value,
            obtained_at: Utc::now(),
        };
        *self.current.write().await = Some(session.clone());

        info!(cookie = %session.name, "successfully logged in to jira");
        Ok(session)
    }

    pub async fn session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn cookie(&self) -> Option<String> {
        self.current.read().await.as_ref().map(Session::cookie)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }
}
