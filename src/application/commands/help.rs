use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::domain::entities::{refuse_message, AccessTier, CommandDefinition};
use crate::domain::traits::BotCommand;

/// Lists the commands visible to the caller, or details one of them
pub struct HelpCommand {
    def: CommandDefinition,
    catalog: Arc<OnceCell<Vec<CommandDefinition>>>,
}

impl HelpCommand {
    pub fn new() -> Self {
        Self {
            def: CommandDefinition::new("/help", "Help")
                .with_min_tier(AccessTier::AUTHORIZED)
                .with_aliases(["help", "what can you do"]),
            catalog: Arc::new(OnceCell::new()),
        }
    }

    /// Filled once the registry holding this command is complete
    pub fn catalog(&self) -> Arc<OnceCell<Vec<CommandDefinition>>> {
        Arc::clone(&self.catalog)
    }

    fn visible(&self, tier: AccessTier) -> impl Iterator<Item = &CommandDefinition> {
        self.catalog
            .get()
            .map(|defs| defs.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(move |def| def.permits(tier))
    }

    fn describe(&self, tier: AccessTier, name: &str) -> String {
        let wanted = name.trim_start_matches('/');
        let Some(def) = self.visible(tier).find(|def| def.token.trim_start_matches('/') == wanted) else {
            return format!("Command {} not found", name);
        };

        let mut text = format!("{}: {}", def.title, def.token);
        if !def.aliases.is_empty() {
            text.push_str(&format!("\nAlso: {}", def.aliases.join(", ")));
        }
        text
    }
}

impl Default for HelpCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl BotCommand for HelpCommand {
    fn definition(&self) -> &CommandDefinition {
        &self.def
    }

    fn run(&self, tier: AccessTier, args: &[String]) -> String {
        if !self.def.permits(tier) {
            return refuse_message(tier).to_string();
        }

        // alias remainder arrives as one argument, e.g. "help weather"
        if let Some(name) = args.first().and_then(|arg| arg.split_whitespace().next()) {
            return self.describe(tier, name);
        }

        let mut response = "Commands:\n".to_string();
        for def in self.visible(tier) {
            response.push_str(&format!("{}: {}\n", def.title, def.token));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn help() -> HelpCommand {
        let help = HelpCommand::new();
        help.catalog()
            .set(vec![
                help.definition().clone(),
                CommandDefinition::new("/introduce", "Introduce yourself").with_alias("let me introduce"),
                CommandDefinition::new("/stats", "Stats").with_min_tier(AccessTier::ADMIN),
            ])
            .unwrap();
        help
    }

    #[test]
    fn test_lists_visible_commands() {
        let help = help();
        assert_eq!(
            help.run(AccessTier::AUTHORIZED, &[]),
            "Commands:\nHelp: /help\nIntroduce yourself: /introduce\n"
        );
        assert!(help.run(AccessTier::ADMIN, &[]).contains("Stats: /stats"));
    }

    #[test]
    fn test_guest_is_refused() {
        assert_eq!(help().run(AccessTier::GUEST, &[]), refuse_message(AccessTier::GUEST));
    }

    #[test]
    fn test_describe_single_command() {
        let help = help();
        assert_eq!(
            help.run(AccessTier::AUTHORIZED, &["introduce".to_string()]),
            "Introduce yourself: /introduce\nAlso: let me introduce"
        );
        assert_eq!(
            help.run(AccessTier::AUTHORIZED, &["/stats".to_string()]),
            "Command /stats not found"
        );
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(HelpCommand::new().run(AccessTier::ADMIN, &[]), "Commands:\n");
    }
}
