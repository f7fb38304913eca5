//! Domain layer - Core business logic with no external dependencies
//! 
//! This layer contains:
//! - Entities: Core business objects (User, AccessTier, Message, Reply, Command)
//! - Traits: Abstractions for commands and transports (BotCommand, ConversationCommand, Bot)

pub mod entities;
pub mod traits;
