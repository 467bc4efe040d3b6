use async_trait::async_trait;

use crate::{
    domain::{ConversationId, ItemRef},
    messaging::types::{ChatUser, TextItem},
    Result,
};

/// Chat-platform port.
///
/// Circuit is the only implementation. The domain is fixed when the adapter is
/// constructed; `logon` must succeed before `add_text_item` is usable.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn logon(&self, email: &str, password: &str) -> Result<ChatUser>;

    async fn add_text_item(&self, conversation: &ConversationId, item: TextItem)
        -> Result<ItemRef>;
}
