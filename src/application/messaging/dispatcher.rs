//! Message dispatcher - Routes messages to conversations, commands, aliases or the lexicon

use crate::application::errors::BotError;
use crate::application::services::auth::Authorization;
use crate::application::services::lexicon::{IntentLexicon, UNKNOWN_INTENT};
use crate::domain::entities::{
    AccessTier, ChatId, CommandRegistry, Content, Message, RegisteredCommand, Reply, User, UserId,
};
use super::conversation::{ConversationManager, ConversationSettings, SessionGuard, SessionKey};
use super::parser::MessageParser;

/// Routes each incoming message. Built once at start-up, then shared read-only.
pub struct Dispatcher {
    auth: Authorization,
    lexicon: IntentLexicon,
    registry: CommandRegistry,
    conversations: ConversationManager,
    parser: MessageParser,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn auth(&self) -> &Authorization {
        &self.auth
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn lexicon(&self) -> &IntentLexicon {
        &self.lexicon
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    /// Inbound entry point for a text message
    pub async fn on_message(&self, chat_id: ChatId, user_id: UserId, text: &str) -> Option<Reply> {
        self.dispatch(&Message::from_text(chat_id, User::new(user_id), text)).await
    }

    /// Route one message. Holds the sender's session for the whole call, so
    /// messages of the same chat and user are handled strictly one at a time.
    pub async fn dispatch(&self, message: &Message) -> Option<Reply> {
        let tier = self.auth.access_tier(message.sender.id);
        let key = SessionKey::new(message.chat_id, message.sender.id);

        let mut session = self.conversations.lock(key).await;
        let reply = self.route(&mut session, tier, &message.content);
        self.conversations.release(session);

        tracing::debug!(
            "[{}] {} ({}) -> {}",
            message.chat_id,
            message.sender,
            tier,
            if reply.is_some() { "reply" } else { "no reply" }
        );
        reply
    }

    fn route(&self, session: &mut SessionGuard, tier: AccessTier, content: &Content) -> Option<Reply> {
        // 1. conversation entry
        if let (Content::Text(text), false) = (content, session.is_active()) {
            let token = self.parser.normalize_token(text.trim());
            if let Some(command) = self
                .registry
                .lookup_by_token(token, tier)
                .and_then(RegisteredCommand::as_conversation)
            {
                return Some(self.conversations.enter(session, command, tier));
            }
        }

        // 2. conversation continuation or cancellation
        if session.is_active() {
            if let Content::Text(text) = content {
                if self.conversations.is_cancel(text) {
                    return Some(self.conversations.cancel(session, &self.lexicon));
                }
            }
            return self.conversations.advance(session, &self.registry, tier, content);
        }

        let text = match content {
            Content::Text(text) => text,
            Content::CallbackData(data) => {
                tracing::debug!("Ignoring option '{}' outside a conversation", data);
                return None;
            }
        };

        // 3. command token
        if let Some(invocation) = self.parser.parse_command(text) {
            return match self.registry.lookup_by_token(&invocation.token, tier) {
                Some(command) if command.is_conversation() => {
                    tracing::debug!("Ignoring stale entry {:?}", command);
                    None
                }
                Some(command) => Some(Reply::text(command.run(tier, &invocation.args))),
                None => Some(Reply::text(self.lexicon.get_response_by_intent(UNKNOWN_INTENT))),
            };
        }

        // 4. alias prefix
        if let Some((command, rest)) = self.registry.find_by_alias(text, tier) {
            tracing::debug!("Alias matched {:?}", command);
            let args = if rest.is_empty() { Vec::new() } else { vec![rest.to_string()] };
            return Some(Reply::text(command.run(tier, &args)));
        }

        // 5. free text
        Some(Reply::text(self.lexicon.get_response(text)))
    }
}

/// Collects the start-up pieces of a [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    auth: Option<Authorization>,
    lexicon: Option<IntentLexicon>,
    registry: CommandRegistry,
    settings: ConversationSettings,
    parser: MessageParser,
}

impl DispatcherBuilder {
    pub fn auth(mut self, auth: Authorization) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn lexicon(mut self, lexicon: IntentLexicon) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Replace the registry wholesale
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn command(mut self, command: RegisteredCommand) -> Self {
        self.registry.register(command);
        self
    }

    pub fn conversation_settings(mut self, settings: ConversationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn parser(mut self, parser: MessageParser) -> Self {
        self.parser = parser;
        self
    }

    /// Fails when authorization or the lexicon were never supplied
    pub fn build(self) -> Result<Dispatcher, BotError> {
        let auth = self
            .auth
            .ok_or_else(|| BotError::Configuration("Bot is not configured: authorization is missing".to_string()))?;
        let lexicon = self
            .lexicon
            .ok_or_else(|| BotError::Configuration("Bot is not configured: lexicon is missing".to_string()))?;

        if self.registry.get(&self.settings.cancel_token).is_some() {
            tracing::warn!(
                "Cancel token {} shadows a registered command inside conversations",
                self.settings.cancel_token
            );
        }
        for command in self.registry.conversation_entry_commands() {
            if command.states().is_empty() {
                tracing::warn!("Conversation {:?} declares no states", command);
            }
        }

        tracing::info!(
            "Dispatcher ready: {} commands, {} intents, {} admins",
            self.registry.len(),
            lexicon.len(),
            auth.admins().len()
        );

        Ok(Dispatcher {
            auth,
            lexicon,
            registry: self.registry,
            conversations: ConversationManager::new(self.settings),
            parser: self.parser,
        })
    }
}
