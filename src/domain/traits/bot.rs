use async_trait::async_trait;
use crate::domain::entities::{ChatId, Reply, ReplyOptions};
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot
    async fn start(&self) -> Result<(), BotError>;

    /// Send a plain text message to a chat
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError>;

    /// Send a message with selectable reply options
    async fn send_with_keyboard(&self, chat_id: ChatId, text: &str, options: &ReplyOptions) -> Result<String, BotError>;

    /// Acknowledge an option selection
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;

    /// Send a dispatcher reply, with a keyboard when it carries options
    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError> {
        match &reply.options {
            Some(options) => self.send_with_keyboard(chat_id, &reply.text, options).await,
            None => self.send_message(chat_id, &reply.text).await,
        }
    }
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
