use crate::domain::entities::{
    AccessTier, CommandDefinition, Content, ConversationStart, ConversationStep,
};

/// Capability every registered command provides
pub trait BotCommand: Send + Sync {
    /// Static descriptor: token, title, minimum tier, aliases
    fn definition(&self) -> &CommandDefinition;

    /// Execute the command and produce the reply text
    fn run(&self, tier: AccessTier, args: &[String]) -> String;
}

/// Commands that open a multi-message guided interaction
pub trait ConversationCommand: BotCommand {
    /// Ordered state table; keys are only unique within this command
    fn states(&self) -> &[&'static str];

    /// Entry handler, called when the command token is sent outside a conversation
    fn start_conversation(&self, tier: AccessTier) -> ConversationStart;

    /// Handler for one declared state
    fn handle_state(&self, state: &str, tier: AccessTier, input: &Content) -> ConversationStep;
}
