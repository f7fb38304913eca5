//! Built-in commands and registry assembly

pub mod help;
pub mod introduce;

pub use help::HelpCommand;
pub use introduce::IntroduceCommand;

use crate::domain::entities::{CommandRegistry, RegisteredCommand};

/// Commands shipped with the bot, besides `/help`
pub fn builtin_commands() -> Vec<RegisteredCommand> {
    vec![RegisteredCommand::conversation(IntroduceCommand::new())]
}

/// Registry with `/help` first, followed by `commands` in order.
/// The help listing is taken from the finished registry.
pub fn build_registry(commands: impl IntoIterator<Item = RegisteredCommand>) -> CommandRegistry {
    let help = HelpCommand::new();
    let catalog = help.catalog();

    let registry = CommandRegistry::from_commands(
        std::iter::once(RegisteredCommand::simple(help)).chain(commands),
    );
    if catalog
        .set(registry.all().map(|c| c.definition().clone()).collect())
        .is_err()
    {
        tracing::warn!("Help catalog was already filled");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AccessTier;

    #[test]
    fn test_help_lists_registered_commands() {
        let registry = build_registry(builtin_commands());
        let help = registry.lookup_by_token("/help", AccessTier::AUTHORIZED).unwrap();
        assert_eq!(
            help.run(AccessTier::AUTHORIZED, &[]),
            "Commands:\nHelp: /help\nIntroduce yourself: /introduce\n"
        );
    }

    #[test]
    fn test_builtin_conversations() {
        let registry = build_registry(builtin_commands());
        let tokens: Vec<&str> = registry.conversation_entry_commands().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["/introduce"]);
    }
}
