//! Console adapter for development/testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::application::errors::BotError;
use crate::domain::entities::{ChatId, ReplyOptions};
use crate::domain::traits::{Bot, BotInfo};

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    sent: AtomicU64,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "cistbot".to_string(),
                username: "console".to_string(),
            },
            sent: AtomicU64::new(0),
        }
    }

    /// Line reader over stdin
    pub fn input() -> Lines<BufReader<Stdin>> {
        BufReader::new(tokio::io::stdin()).lines()
    }

    fn next_id(&self) -> String {
        format!("console_{}", self.sent.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Text rendering of reply options, one line per row
pub fn render_options(options: &ReplyOptions) -> Vec<String> {
    options
        .iter()
        .map(|row| {
            let labels: Vec<String> = row
                .iter()
                .map(|opt| format!("{} ({})", opt.label, opt.callback))
                .collect();
            format!("  [Buttons] {}", labels.join(" | "))
        })
        .collect()
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn send_message(&self, _chat_id: ChatId, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok(self.next_id())
    }

    async fn send_with_keyboard(&self, _chat_id: ChatId, text: &str, options: &ReplyOptions) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        for line in render_options(options) {
            println!("{}", line);
        }
        Ok(self.next_id())
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ReplyOption;

    #[test]
    fn test_render_options() {
        let options = vec![vec![ReplyOption::new("Yes", "introduce:yes"), ReplyOption::new("No", "introduce:no")]];
        assert_eq!(
            render_options(&options),
            vec!["  [Buttons] Yes (introduce:yes) | No (introduce:no)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_message_ids_increase() {
        let bot = ConsoleAdapter::new();
        assert_eq!(bot.send_message(1, "a").await.unwrap(), "console_1");
        assert_eq!(bot.send_message(1, "b").await.unwrap(), "console_2");
    }
}
