use super::{ChatId, User};
use chrono::{DateTime, Utc};

/// Message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    /// Callback token of a reply option the user selected
    CallbackData(String),
}

impl Content {
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw payload, whether typed or selected
    pub fn as_str(&self) -> &str {
        match self {
            Content::Text(s) | Content::CallbackData(s) => s,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, Content::CallbackData(_))
    }
}

/// Represents an incoming message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: ChatId,
    pub sender: User,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
    pub platform: String,
    pub raw: Option<serde_json::Value>,
}

impl Message {
    pub fn new(chat_id: ChatId, sender: User, content: Content) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id,
            sender,
            content,
            timestamp: Utc::now(),
            platform: "unknown".to_string(),
            raw: None,
        }
    }

    pub fn from_text(chat_id: ChatId, sender: User, text: impl Into<String>) -> Self {
        Self::new(chat_id, sender, Content::Text(text.into()))
    }

    pub fn from_callback(chat_id: ChatId, sender: User, data: impl Into<String>) -> Self {
        Self::new(chat_id, sender, Content::CallbackData(data.into()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// Selectable reply option: a label shown to the user and the token sent back on selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOption {
    pub label: String,
    pub callback: String,
}

impl ReplyOption {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
        }
    }
}

/// Options grouped into rows, in display order
pub type ReplyOptions = Vec<Vec<ReplyOption>>;

/// Outgoing reply produced by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub options: Option<ReplyOptions>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: None,
        }
    }

    /// Empty option sets collapse to a plain text reply
    pub fn with_options(mut self, options: ReplyOptions) -> Self {
        let has_any = options.iter().any(|row| !row.is_empty());
        self.options = has_any.then_some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_options_collapse_to_plain_reply() {
        let reply = Reply::text("hi").with_options(vec![vec![]]);
        assert_eq!(reply.options, None);

        let reply = Reply::text("pick").with_options(vec![vec![ReplyOption::new("Yes", "yes")]]);
        assert_eq!(reply.options.map(|rows| rows.len()), Some(1));
    }

    #[test]
    fn test_content_payload() {
        assert_eq!(Content::Text("a".into()).text(), Some("a"));
        assert_eq!(Content::CallbackData("b".into()).text(), None);
        assert_eq!(Content::CallbackData("b".into()).as_str(), "b");
    }
}
