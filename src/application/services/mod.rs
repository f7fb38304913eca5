//! Application services - Business logic orchestration

pub mod auth;
pub mod lexicon;
pub mod message_service;

pub use auth::Authorization;
pub use lexicon::{IntentEntry, IntentLexicon};
pub use message_service::MessageService;
