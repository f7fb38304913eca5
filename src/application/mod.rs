//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Commands: Built-in bot commands and registry assembly
//! - Errors: Domain-specific errors
//! - Messaging: Parsing, conversations, dispatching, per-chat workers
//! - Services: Authorization, intent lexicon, message delivery

pub mod commands;
pub mod errors;
pub mod services;
pub mod messaging;
