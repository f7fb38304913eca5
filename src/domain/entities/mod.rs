//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod conversation;

pub use user::{AccessTier, ChatId, User, UserId};
pub use message::{Message, Content, Reply, ReplyOption, ReplyOptions};
pub use command::{refuse_message, CommandDefinition, CommandRegistry, RegisteredCommand};
pub use conversation::{ConversationStart, ConversationStep, Transition};
