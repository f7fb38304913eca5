//! Telegram adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::errors::BotError;
use crate::domain::entities::{self, ChatId, CommandRegistry, ReplyOptions};
use crate::domain::traits::{Bot, BotInfo};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, BotError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Network(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

#[derive(Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

impl User {
    fn to_entity(&self) -> entities::User {
        let mut user = entities::User::new(self.id);
        user.username = self.username.clone();
        user.first_name = self.first_name.clone();
        user
    }
}

impl Update {
    /// Convert to a domain message. Updates without text or callback data yield `None`.
    pub fn to_message(&self) -> Option<entities::Message> {
        let message = if let Some(msg) = &self.message {
            let text = msg.text.as_ref()?;
            let sender = msg.from.as_ref()?.to_entity();
            entities::Message::from_text(msg.chat.id, sender, text.clone())
                .with_id(msg.message_id.to_string())
        } else {
            let cb = self.callback_query.as_ref()?;
            let data = cb.data.as_ref()?;
            let chat_id = cb.message.as_ref().map(|m| m.chat.id).unwrap_or(cb.from.id);
            // callback id doubles as message id so the service can answer it
            entities::Message::from_callback(chat_id, cb.from.to_entity(), data.clone())
                .with_id(cb.id.clone())
        };

        let message = message.with_platform("telegram");
        match serde_json::to_value(self) {
            Ok(raw) => Some(message.with_raw(raw)),
            Err(_) => Some(message),
        }
    }
}

/// Telegram bot adapter
#[derive(Clone)]
pub struct TelegramAdapter {
    token: String,
    client: Client,
    info: BotInfo,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            info: BotInfo {
                id: "unknown".to_string(),
                name: "cistbot".to_string(),
                username: "cistbot".to_string(),
            },
        }
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    async fn call<Req: Serialize + ?Sized, Res: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Res, BotError> {
        let mut builder = self.client.post(self.api_url(method)).json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let data: ApiResponse<Res> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        data.into_result()
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        #[derive(Deserialize)]
        struct BotInfoResponse {
            id: i64,
            first_name: String,
            username: String,
        }

        let data: BotInfoResponse = self.call("getMe", &serde_json::json!({}), None).await?;
        self.info = BotInfo {
            id: data.id.to_string(),
            name: data.first_name,
            username: data.username,
        };

        Ok(())
    }

    /// Long-poll for updates
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: u64,
            allowed_updates: Vec<&'static str>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message", "callback_query"],
        };

        // leave the server room to answer before the client gives up
        let deadline = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", &request, Some(deadline)).await
    }

    /// Get the next update offset
    pub fn get_next_offset(updates: &[Update], current: i64) -> i64 {
        updates
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(current)
            .max(current)
    }

    /// Publish the registry's commands in the client's command menu
    pub async fn register_commands(&self, registry: &CommandRegistry, prefix: &str) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Command {
            command: String,
            description: String,
        }

        #[derive(Serialize)]
        struct SetMyCommandsRequest {
            commands: Vec<Command>,
        }

        let commands = registry
            .all()
            .map(|c| c.definition())
            .map(|def| Command {
                command: def.token.trim_start_matches(prefix).to_lowercase(),
                description: def.title.clone(),
            })
            .collect();

        let _: bool = self
            .call("setMyCommands", &SetMyCommandsRequest { commands }, None)
            .await?;

        tracing::info!("Registered {} bot commands with Telegram", registry.len());
        Ok(())
    }
}

#[async_trait]
impl Bot for TelegramAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting Telegram bot (token: {}...)", self.token.chars().take(8).collect::<String>());
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: ChatId,
            text: &'a str,
        }

        tracing::debug!("Sending to {}: {}", chat_id, text);
        let result: MessageResult = self
            .call("sendMessage", &SendMessageRequest { chat_id, text }, None)
            .await?;
        Ok(result.message_id.to_string())
    }

    async fn send_with_keyboard(&self, chat_id: ChatId, text: &str, options: &ReplyOptions) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: ChatId,
            text: &'a str,
            reply_markup: InlineKeyboardMarkup<'a>,
        }

        tracing::debug!("Sending with keyboard to {}: {}", chat_id, text);
        let inline_keyboard = options
            .iter()
            .map(|row| {
                row.iter()
                    .map(|opt| InlineKeyboardButton {
                        text: &opt.label,
                        callback_data: &opt.callback,
                    })
                    .collect()
            })
            .collect();

        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: InlineKeyboardMarkup { inline_keyboard },
        };
        let result: MessageResult = self.call("sendMessage", &request, None).await?;
        Ok(result.message_id.to_string())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct AnswerRequest<'a> {
            callback_query_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
        }

        let _: bool = self
            .call("answerCallbackQuery", &AnswerRequest { callback_query_id: callback_id, text }, None)
            .await?;
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
