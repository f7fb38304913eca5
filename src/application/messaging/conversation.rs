//! Conversation state machine - per-chat sessions of multi-step commands

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::application::services::lexicon::{IntentLexicon, CANCEL_CONVERSATION};
use crate::domain::entities::{
    AccessTier, ChatId, CommandRegistry, Content, RegisteredCommand, Reply, Transition, UserId,
};
use crate::domain::traits::ConversationCommand;

/// Sessions are tracked per user within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }
}

/// Active conversation: the owning command token and its current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub command: String,
    pub state: String,
    last_active: Instant,
}

impl ConversationSession {
    fn new(command: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            state: state.into(),
            last_active: Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Token that ends any conversation
    pub cancel_token: String,
    /// `None` keeps sessions until cancelled or finished
    pub idle_timeout: Option<Duration>,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            cancel_token: "/cancel".to_string(),
            idle_timeout: None,
        }
    }
}

type Slot = Arc<AsyncMutex<Option<ConversationSession>>>;

/// Exclusive access to one key's session for the duration of a message
pub struct SessionGuard {
    key: SessionKey,
    slot: OwnedMutexGuard<Option<ConversationSession>>,
}

impl SessionGuard {
    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn current(&self) -> Option<&ConversationSession> {
        (*self.slot).as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    /// End the session, returning what was active
    pub fn clear(&mut self) -> Option<ConversationSession> {
        self.slot.take()
    }

    fn set(&mut self, session: ConversationSession) {
        *self.slot = Some(session);
    }
}

/// Owns the session map and applies state transitions
pub struct ConversationManager {
    slots: Mutex<HashMap<SessionKey, Slot>>,
    settings: ConversationSettings,
}

impl ConversationManager {
    pub fn new(settings: ConversationSettings) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    pub fn is_cancel(&self, text: &str) -> bool {
        text.trim() == self.settings.cancel_token
    }

    /// Wait for exclusive access to `key`. Messages for the same key queue here in arrival order.
    pub async fn lock(&self, key: SessionKey) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(slots.entry(key).or_default())
        };
        let mut guard = SessionGuard {
            key,
            slot: slot.lock_owned().await,
        };

        let expired = match (self.settings.idle_timeout, guard.current()) {
            (Some(timeout), Some(session)) if session.idle_for() > timeout => {
                tracing::info!(
                    "Conversation {} in chat {} expired in state '{}'",
                    session.command,
                    key.chat_id,
                    session.state
                );
                true
            }
            _ => false,
        };
        if expired {
            guard.clear();
        }
        guard
    }

    /// Release a guard, dropping the map entry once nobody uses it
    pub fn release(&self, guard: SessionGuard) {
        let SessionGuard { key, slot } = guard;
        let idle = slot.is_none();
        drop(slot);
        if !idle {
            return;
        }

        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = slots.get(&key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().map(|s| s.is_none()).unwrap_or(false)
        });
        if unused {
            slots.remove(&key);
        }
    }

    /// Number of keys currently holding a session or a pending message
    pub fn tracked_keys(&self) -> usize {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Entry transition. A refused caller gets the refusal and no session.
    pub fn enter(
        &self,
        session: &mut SessionGuard,
        command: &dyn ConversationCommand,
        tier: AccessTier,
    ) -> Reply {
        let start = command.start_conversation(tier);
        let reply = start.reply();
        if !start.authorized {
            tracing::debug!("Conversation {} refused for tier {}", command.definition().token, tier);
            return reply;
        }

        tracing::debug!("Conversation {} started in chat {}", command.definition().token, session.key().chat_id);
        self.apply(session, command, start.next);
        reply
    }

    /// Cancellation transition; always allowed
    pub fn cancel(&self, session: &mut SessionGuard, lexicon: &IntentLexicon) -> Reply {
        if let Some(ended) = session.clear() {
            tracing::debug!("Conversation {} cancelled in state '{}'", ended.command, ended.state);
        }
        Reply::text(lexicon.get_response_by_intent(CANCEL_CONVERSATION))
    }

    /// Route input to the handler of the current state
    pub fn advance(
        &self,
        session: &mut SessionGuard,
        registry: &CommandRegistry,
        tier: AccessTier,
        input: &Content,
    ) -> Option<Reply> {
        let (token, state) = match session.current() {
            Some(active) => (active.command.clone(), active.state.clone()),
            None => return None,
        };

        let Some(command) = registry.get(&token).and_then(RegisteredCommand::as_conversation) else {
            tracing::warn!("Conversation command {} is no longer registered", token);
            session.clear();
            return None;
        };

        let step = command.handle_state(&state, tier, input);
        self.apply(session, command, step.next);
        step.reply
    }

    fn apply(&self, session: &mut SessionGuard, command: &dyn ConversationCommand, next: Transition) {
        let token = &command.definition().token;
        match next {
            Transition::End => {
                tracing::debug!("Conversation {} ended", token);
                session.clear();
            }
            Transition::Next(state) if command.states().contains(&state.as_str()) => {
                session.set(ConversationSession::new(token.clone(), state));
            }
            Transition::Next(state) => {
                tracing::warn!("Conversation {} moved to undeclared state '{}', ending it", token, state);
                session.clear();
            }
        }
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new(ConversationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::lexicon::IntentEntry;
    use crate::domain::entities::{
        refuse_message, CommandDefinition, ConversationStart, ConversationStep,
    };
    use crate::domain::traits::BotCommand;

    /// Asks two questions, then finishes; `jump` returns an undeclared state
    struct Survey {
        def: CommandDefinition,
    }

    impl Survey {
        fn new() -> Self {
            Self {
                def: CommandDefinition::new("/survey", "Survey"),
            }
        }
    }

    impl BotCommand for Survey {
        fn definition(&self) -> &CommandDefinition {
            &self.def
        }

        fn run(&self, _tier: AccessTier, _args: &[String]) -> String {
            String::new()
        }
    }

    impl ConversationCommand for Survey {
        fn states(&self) -> &[&'static str] {
            &["first", "second"]
        }

        fn start_conversation(&self, tier: AccessTier) -> ConversationStart {
            if !self.def.permits(tier) {
                return ConversationStart::refuse(refuse_message(tier));
            }
            ConversationStart::begin("first?", Transition::next("first"))
        }

        fn handle_state(&self, state: &str, _tier: AccessTier, input: &Content) -> ConversationStep {
            match (state, input.as_str()) {
                (_, "jump") => ConversationStep::advance(Reply::text("?"), "nowhere"),
                ("first", _) => ConversationStep::advance(Reply::text("second?"), "second"),
                _ => ConversationStep::finish(Reply::text("thanks")),
            }
        }
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::from_commands([RegisteredCommand::conversation(Survey::new())])
    }

    fn text(s: &str) -> Content {
        Content::Text(s.to_string())
    }

    const KEY: SessionKey = SessionKey { chat_id: 10, user_id: 1 };

    #[tokio::test]
    async fn test_full_conversation() {
        let manager = ConversationManager::default();
        let registry = registry();
        let survey = Survey::new();

        let mut session = manager.lock(KEY).await;
        let reply = manager.enter(&mut session, &survey, AccessTier::AUTHORIZED);
        assert_eq!(reply.text, "first?");
        assert_eq!(session.current().map(|s| s.state.as_str()), Some("first"));

        let reply = manager.advance(&mut session, &registry, AccessTier::AUTHORIZED, &text("a"));
        assert_eq!(reply.map(|r| r.text), Some("second?".to_string()));
        assert_eq!(session.current().map(|s| s.command.as_str()), Some("/survey"));

        let reply = manager.advance(&mut session, &registry, AccessTier::AUTHORIZED, &text("b"));
        assert_eq!(reply.map(|r| r.text), Some("thanks".to_string()));
        assert!(!session.is_active());

        manager.release(session);
        assert_eq!(manager.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_refused_entry_creates_no_session() {
        let manager = ConversationManager::default();
        let mut session = manager.lock(KEY).await;
        let reply = manager.enter(&mut session, &Survey::new(), AccessTier::GUEST);
        assert_eq!(reply.text, refuse_message(AccessTier::GUEST));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_cancel_clears_session() {
        let manager = ConversationManager::default();
        let lexicon = IntentLexicon::with_seed(
            vec![IntentEntry::new(CANCEL_CONVERSATION, Vec::<String>::new(), ["Stopped."])],
            0,
        )
        .unwrap();

        let mut session = manager.lock(KEY).await;
        manager.enter(&mut session, &Survey::new(), AccessTier::ADMIN);
        assert!(manager.is_cancel(" /cancel "));
        let reply = manager.cancel(&mut session, &lexicon);
        assert_eq!(reply.text, "Stopped.");
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_undeclared_state_ends_conversation() {
        let manager = ConversationManager::default();
        let registry = registry();
        let mut session = manager.lock(KEY).await;
        manager.enter(&mut session, &Survey::new(), AccessTier::ADMIN);

        let reply = manager.advance(&mut session, &registry, AccessTier::ADMIN, &text("jump"));
        assert!(reply.is_some());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_session_survives_release() {
        let manager = ConversationManager::default();
        let mut session = manager.lock(KEY).await;
        manager.enter(&mut session, &Survey::new(), AccessTier::ADMIN);
        manager.release(session);
        assert_eq!(manager.tracked_keys(), 1);

        let session = manager.lock(KEY).await;
        assert_eq!(session.current().map(|s| s.state.as_str()), Some("first"));

        let other = manager.lock(SessionKey::new(10, 2)).await;
        assert!(!other.is_active());
    }

    #[tokio::test]
    async fn test_idle_session_expires() {
        let manager = ConversationManager::new(ConversationSettings {
            idle_timeout: Some(Duration::from_millis(20)),
            ..ConversationSettings::default()
        });
        let mut session = manager.lock(KEY).await;
        manager.enter(&mut session, &Survey::new(), AccessTier::ADMIN);
        manager.release(session);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let session = manager.lock(KEY).await;
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let manager = Arc::new(ConversationManager::default());
        let first = manager.lock(KEY).await;

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let session = manager.lock(KEY).await;
                session.current().map(|s| s.state.clone())
            })
        };

        let mut first = first;
        manager.enter(&mut first, &Survey::new(), AccessTier::ADMIN);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        manager.release(first);

        assert_eq!(waiter.await.unwrap(), Some("first".to_string()));
    }
}
