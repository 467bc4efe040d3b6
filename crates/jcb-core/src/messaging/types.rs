/// How the chat platform should interpret `TextItem::content`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Plain,
    /// Circuit's HTML subset (`<b>`, `<i>`, `<a>`, `<br>`, `<span class=...>`).
    Rich,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Plain => "PLAIN",
            ContentType::Rich => "RICH",
        }
    }
}

/// Outgoing text item (one chat message).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextItem {
    pub subject: String,
    pub content: String,
    pub content_type: ContentType,
}

impl TextItem {
    pub fn rich(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            content_type: ContentType::Rich,
        }
    }
}

/// The bot's own chat user, as returned by logon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUser {
    pub user_id: String,
    pub email_address: String,
    pub display_name: Option<String>,
}
