use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::AccessTier;
use crate::domain::traits::{BotCommand, ConversationCommand};

/// Immutable descriptor of a bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    /// Invocation token, including its prefix, e.g. `/help`
    pub token: String,
    pub title: String,
    pub min_tier: AccessTier,
    /// Case-insensitive text prefixes, stored lower-cased
    pub aliases: Vec<String>,
}

impl CommandDefinition {
    pub fn new(token: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            title: title.into(),
            min_tier: AccessTier::AUTHORIZED,
            aliases: Vec::new(),
        }
    }

    pub fn with_min_tier(mut self, tier: AccessTier) -> Self {
        self.min_tier = tier;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into().to_lowercase();
        if !alias.trim().is_empty() {
            self.aliases.push(alias);
        }
        self
    }

    pub fn with_aliases<I, S>(self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        aliases.into_iter().fold(self, |def, alias| def.with_alias(alias))
    }

    pub fn permits(&self, tier: AccessTier) -> bool {
        self.min_tier <= tier
    }

    /// Text after the first alias that prefixes `text`, with leading whitespace removed
    pub fn match_alias<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.aliases
            .iter()
            .find_map(|alias| strip_prefix_ignore_case(text, alias))
            .map(str::trim_start)
    }
}

/// Standard refusal for callers below a command's tier
pub fn refuse_message(tier: AccessTier) -> &'static str {
    if tier > AccessTier::GUEST {
        "This is confidential information. You don't have enough access."
    } else {
        "We can just chat. If you need a helper, you should be authorized."
    }
}

/// Case-insensitive `strip_prefix` that slices the original text on a char boundary
fn strip_prefix_ignore_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let mut expected = prefix.chars().flat_map(char::to_lowercase).peekable();
    for (idx, ch) in text.char_indices() {
        if expected.peek().is_none() {
            return Some(&text[idx..]);
        }
        for lower in ch.to_lowercase() {
            if expected.next() != Some(lower) {
                return None;
            }
        }
    }
    expected.peek().is_none().then_some("")
}

/// A command as held by the registry, tagged by capability
#[derive(Clone)]
pub enum RegisteredCommand {
    Simple(Arc<dyn BotCommand>),
    Conversation(Arc<dyn ConversationCommand>),
}

impl RegisteredCommand {
    pub fn simple(command: impl BotCommand + 'static) -> Self {
        RegisteredCommand::Simple(Arc::new(command))
    }

    pub fn conversation(command: impl ConversationCommand + 'static) -> Self {
        RegisteredCommand::Conversation(Arc::new(command))
    }

    pub fn definition(&self) -> &CommandDefinition {
        match self {
            RegisteredCommand::Simple(cmd) => cmd.definition(),
            RegisteredCommand::Conversation(cmd) => cmd.definition(),
        }
    }

    pub fn token(&self) -> &str {
        &self.definition().token
    }

    pub fn is_conversation(&self) -> bool {
        matches!(self, RegisteredCommand::Conversation(_))
    }

    pub fn as_conversation(&self) -> Option<&dyn ConversationCommand> {
        match self {
            RegisteredCommand::Conversation(cmd) => Some(cmd.as_ref()),
            RegisteredCommand::Simple(_) => None,
        }
    }

    /// Declared states; empty for simple commands
    pub fn states(&self) -> &[&'static str] {
        self.as_conversation().map(|cmd| cmd.states()).unwrap_or(&[])
    }

    pub fn run(&self, tier: AccessTier, args: &[String]) -> String {
        match self {
            RegisteredCommand::Simple(cmd) => cmd.run(tier, args),
            RegisteredCommand::Conversation(cmd) => cmd.run(tier, args),
        }
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let def = self.definition();
        write!(f, "{}: {}", def.title, def.token)
    }
}

/// Command registry, ordered by first registration of each token
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an explicit list of commands
    pub fn from_commands(commands: impl IntoIterator<Item = RegisteredCommand>) -> Self {
        let mut registry = Self::new();
        for command in commands {
            registry.register(command);
        }
        registry
    }

    /// Insert by token. A duplicate token replaces the earlier command in place.
    pub fn register(&mut self, command: RegisteredCommand) {
        let token = command.token().to_string();
        match self.index.get(&token) {
            Some(&slot) => {
                tracing::warn!("Command {} registered twice, replacing {:?}", token, self.commands[slot]);
                self.commands[slot] = command;
            }
            None => {
                tracing::debug!("Registered command {:?}", command);
                self.index.insert(token, self.commands.len());
                self.commands.push(command);
            }
        }
    }

    /// Unfiltered lookup, for resuming a conversation that was already entered
    pub fn get(&self, token: &str) -> Option<&RegisteredCommand> {
        self.index.get(token).map(|&slot| &self.commands[slot])
    }

    pub fn commands_visible_to(&self, tier: AccessTier) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands
            .iter()
            .filter(move |c| c.definition().permits(tier))
    }

    /// Exact token match. Hidden and missing commands are indistinguishable.
    pub fn lookup_by_token(&self, token: &str, tier: AccessTier) -> Option<&RegisteredCommand> {
        self.get(token).filter(|c| c.definition().permits(tier))
    }

    /// First visible command with an alias prefixing `text`, plus the remaining text
    pub fn find_by_alias<'t>(
        &self,
        text: &'t str,
        tier: AccessTier,
    ) -> Option<(&RegisteredCommand, &'t str)> {
        self.commands_visible_to(tier)
            .find_map(|c| c.definition().match_alias(text).map(|rest| (c, rest)))
    }

    pub fn conversation_entry_commands(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.iter().filter(|c| c.is_conversation())
    }

    pub fn all(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
