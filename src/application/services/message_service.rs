use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::messaging::Dispatcher;
use crate::domain::entities::{ChatId, Message, Reply};
use crate::domain::traits::Bot;

/// Service joining the dispatcher to a messaging platform
pub struct MessageService<B: Bot> {
    bot: B,
    dispatcher: Arc<Dispatcher>,
}

impl<B: Bot> MessageService<B> {
    pub fn new(bot: B, dispatcher: Arc<Dispatcher>) -> Self {
        Self { bot, dispatcher }
    }

    pub fn bot(&self) -> &B {
        &self.bot
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch an incoming message and deliver the reply, if any
    pub async fn process(&self, message: Message) -> Result<Option<String>, BotError> {
        tracing::info!("Processing message {} from {} in chat {}", message.id, message.sender, message.chat_id);

        // a stale button press still counts as input
        if message.content.is_callback() {
            if let Err(e) = self.bot.answer_callback(&message.id, None).await {
                tracing::warn!("Failed to acknowledge option {}: {}", message.id, e);
            }
        }

        match self.dispatcher.dispatch(&message).await {
            Some(reply) => self.send_reply(message.chat_id, &reply).await.map(Some),
            None => Ok(None),
        }
    }

    /// Send a response message
    pub async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError> {
        self.bot.send_reply(chat_id, reply).await
    }

    /// Send `text` to each chat, defaulting to the admins. Returns how many deliveries succeeded.
    pub async fn broadcast(&self, text: &str, chats: Option<&[ChatId]>) -> usize {
        let chats = chats.unwrap_or_else(|| self.dispatcher.auth().admins());
        tracing::debug!("Broadcasting to {} chats", chats.len());

        let mut delivered = 0;
        for &chat_id in chats {
            match self.bot.send_message(chat_id, text).await {
                Ok(_) => delivered += 1,
                Err(e) => tracing::error!("Broadcast to {} failed: {}", chat_id, e),
            }
        }
        delivered
    }
}
