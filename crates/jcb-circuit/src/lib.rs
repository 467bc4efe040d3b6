//! Circuit adapter (REST API).
//!
//! This crate implements the `jcb-core` ChatPort over the Circuit REST API:
//! OAuth password grant for logon, form posts for conversation items.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use jcb_core::{
    domain::{ConversationId, ItemId, ItemRef},
    errors::Error,
    messaging::{
        port::ChatPort,
        types::{ChatUser, TextItem},
    },
    Result,
};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    user_id: String,
    email_address: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostedItem {
    item_id: String,
}

pub struct CircuitClient {
    domain: String,
    client_id: String,
    client_secret: Option<String>,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl CircuitClient {
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::External(format!("circuit http client build failed: {e}")))?;
        Ok(Self {
            domain: domain.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret,
            http,
            token: RwLock::new(None),
        })
    }

    fn map_err(e: reqwest::Error) -> Error {
        Error::External(format!("circuit request error: {e}"))
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::External(format!(
            "circuit {what} failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )))
    }

    async fn fetch_token(&self, email: &str, password: &str) -> Result<String> {
        let mut form = vec![
            ("grant_type", "password"),
            ("username", email),
            ("password", password),
            ("client_id", self.client_id.as_str()),
            ("scope", "ALL"),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .http
            .post(format!("{}/oauth/token", self.domain))
            .form(&form)
            .send()
            .await
            .map_err(Self::map_err)?;
        let token: TokenResponse = Self::check(resp, "logon")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("circuit token json error: {e}")))?;
        Ok(token.access_token)
    }

    async fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::External("circuit client is not logged on".to_string()))
    }
}

#[async_trait]
impl ChatPort for CircuitClient {
    async fn logon(&self, email: &str, password: &str) -> Result<ChatUser> {
        let token = self.fetch_token(email, password).await?;

        let resp = self
            .http
            .get(format!("{}/rest/v2/users/profile", self.domain))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(Self::map_err)?;
        let profile: Profile = Self::check(resp, "profile")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("circuit profile json error: {e}")))?;

        *self.token.write().await = Some(token);
        info!(user = %profile.email_address, "circuit logon");

        Ok(ChatUser {
            user_id: profile.user_id,
            email_address: profile.email_address,
            display_name: profile.display_name,
        })
    }

    async fn add_text_item(
        &self,
        conversation: &ConversationId,
        item: TextItem,
    ) -> Result<ItemRef> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .post(format!(
                "{}/rest/v2/conversations/{}/messages",
                self.domain, conversation.0
            ))
            .bearer_auth(&token)
            .form(&[
                ("subject", item.subject.as_str()),
                ("content", item.content.as_str()),
                ("contentType", item.content_type.as_str()),
            ])
            .send()
            .await
            .map_err(Self::map_err)?;
        let posted: PostedItem = Self::check(resp, "post")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("circuit item json error: {e}")))?;

        debug!(conv = %conversation.0, item = %posted.item_id, "circuit item posted");
        Ok(ItemRef {
            conversation: conversation.clone(),
            item_id: ItemId(posted.item_id),
        })
    }
}
