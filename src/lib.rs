//! cistbot - a chat assistant with intent matching, access tiers and guided conversations

pub mod domain;
pub mod application;
pub mod infrastructure;
