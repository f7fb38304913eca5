//! Domain traits - Abstractions for commands and transports

pub mod bot;
pub mod command;

pub use bot::{Bot, BotInfo};
pub use command::{BotCommand, ConversationCommand};
