//! Conversation flow values exchanged between commands and the state machine

use super::{Reply, ReplyOptions};

/// Where a conversation goes after a handler ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move to a state declared by the owning command
    Next(String),
    /// Terminal state; the session is discarded
    End,
}

impl Transition {
    pub fn next(state: impl Into<String>) -> Self {
        Transition::Next(state.into())
    }
}

/// Result of invoking a conversation-entry command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStart {
    pub authorized: bool,
    pub response: String,
    pub options: ReplyOptions,
    pub next: Transition,
}

impl ConversationStart {
    pub fn begin(response: impl Into<String>, next: Transition) -> Self {
        Self {
            authorized: true,
            response: response.into(),
            options: Vec::new(),
            next,
        }
    }

    /// Caller may not enter; the response carries the refusal
    pub fn refuse(response: impl Into<String>) -> Self {
        Self {
            authorized: false,
            response: response.into(),
            options: Vec::new(),
            next: Transition::End,
        }
    }

    pub fn with_options(mut self, options: ReplyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reply(&self) -> Reply {
        Reply::text(self.response.clone()).with_options(self.options.clone())
    }
}

/// Result of a per-state handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStep {
    /// `None` advances silently
    pub reply: Option<Reply>,
    pub next: Transition,
}

impl ConversationStep {
    pub fn advance(reply: Reply, state: impl Into<String>) -> Self {
        Self {
            reply: Some(reply),
            next: Transition::Next(state.into()),
        }
    }

    pub fn finish(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            next: Transition::End,
        }
    }
}
