//! Jira HTTP adapter.
//!
//! Implements the `jcb-core` `TrackerTransport` port with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use tracing::trace;

use jcb_core::{
    errors::{Error, TransportError},
    tracker::{TrackerResponse, TrackerTransport},
    Result,
};

#[derive(Clone, Debug)]
pub struct JiraHttpTransport {
    http: reqwest::Client,
}

impl JiraHttpTransport {
    /// `accept_invalid_certs` disables TLS verification for self-hosted Jira
    /// instances with private certificates.
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| Error::External(format!("jira http client build failed: {e}")))?;
        Ok(Self { http })
    }

    fn map_err(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl TrackerTransport for JiraHttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        cookie: Option<&str>,
    ) -> std::result::Result<TrackerResponse, TransportError> {
        let mut req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(c) = cookie {
            req = req.header(COOKIE, c);
        }

        let resp = req.send().await.map_err(Self::map_err)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Self::map_err)?;
        trace!(%url, status = status.as_u16(), len = body.len(), "jira response");

        Ok(TrackerResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use httpmock::prelude::*;
    use serde_json::json;

    use jcb_core::{
        errors::{AuthError, QueryError},
        tracker::{Credentials, QueryExecutor, SessionManager},
    };

    use super::*;

    fn transport() -> JiraHttpTransport {
        JiraHttpTransport::new(Duration::from_secs(2), false).expect("transport")
    }

    #[tokio::test]
    async fn posts_json_with_cookie_and_returns_status_and_body() {
        let server = MockServer::start_async().await;
        let search = server.mock_async(|when, then| {
            when.method(POST)
                .path("/rest/api/2/search")
                .header("content-type", "application/json")
                .header("cookie", "JSESSIONID=abc")
                .json_body(json!({ "jql": "priority = P0" }));
            then.status(200).json_body(json!({ "issues": [] }));
        }).await;

        let resp = transport()
            .post_json(
                &server.url("/rest/api/2/search"),
                &json!({ "jql": "priority = P0" }),
                Some("JSESSIONID=abc"),
            )
            .await
            .expect("response");

        assert_eq!(resp.status, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&resp.body).unwrap(),
            json!({ "issues": [] })
        );
        search.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_not_a_transport_error() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/rest/api/2/search");
            then.status(503).body("down");
        }).await;

        let resp = transport()
            .post_json(&server.url("/rest/api/2/search"), &json!({}), None)
            .await
            .expect("response");
        assert_eq!(resp.status, 503);
        assert_eq!(resp.reason, "Service Unavailable");
        assert_eq!(resp.body, "down");
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/rest/api/2/search");
            then.status(200).delay(Duration::from_millis(500));
        }).await;

        let transport = JiraHttpTransport::new(Duration::from_millis(50), false).unwrap();
        let err = transport
            .post_json(&server.url("/rest/api/2/search"), &json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let err = transport()
            .post_json("http://127.0.0.1:9/rest/api/2/search", &json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[tokio::test]
    async fn session_expiry_relogs_against_real_http() {
        let server = MockServer::start_async().await;
        let login = server.mock_async(|when, then| {
            when.method(POST)
                .path("/rest/auth/1/session")
                .json_body(json!({ "username": "bot", "password": "pw" }));
            then.status(200)
                .json_body(json!({ "session": { "name": "JSESSIONID", "value": "fresh" } }));
        }).await;
        let search = server.mock_async(|when, then| {
            when.method(POST).path("/rest/api/2/search");
            then.status(401);
        }).await;

        let transport: Arc<dyn TrackerTransport> = Arc::new(transport());
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            server.base_url(),
            Credentials {
                username: "bot".to_string(),
                password: "pw".to_string(),
            },
        ));
        let exec = QueryExecutor::new(transport, session.clone(), server.base_url());

        let err = exec.execute("search", &json!({})).await.unwrap_err();
        assert_eq!(err, QueryError::SessionRenewed);
        assert_eq!(search.calls_async().await, 1);
        assert_eq!(login.calls_async().await, 1);
        assert_eq!(session.cookie().await.as_deref(), Some("JSESSIONID=fresh"));
    }

    #[tokio::test]
    async fn rejected_login_reports_http_status() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/rest/auth/1/session");
            then.status(403);
        }).await;

        let session = SessionManager::new(
            Arc::new(transport()),
            server.base_url(),
            Credentials {
                username: "bot".to_string(),
                password: "bad".to_string(),
            },
        );
        assert_eq!(
            session.login().await.unwrap_err(),
            AuthError::Rejected { status: 403 }
        );
    }
}
