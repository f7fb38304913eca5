//! Message handling - Event-driven message processing

pub mod conversation;
pub mod dispatcher;
pub mod parser;
pub mod workers;

pub use conversation::{ConversationManager, ConversationSettings, SessionKey};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use parser::MessageParser;
pub use workers::ChatWorkers;
