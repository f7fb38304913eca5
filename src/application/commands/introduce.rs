use crate::domain::entities::{
    refuse_message, AccessTier, CommandDefinition, Content, ConversationStart, ConversationStep,
    Reply, ReplyOption, Transition,
};
use crate::domain::traits::{BotCommand, ConversationCommand};

const ASK_NAME: &str = "ask_name";
const ASK_AGE: &str = "ask_age";
const CONFIRM: &str = "confirm";

const YES: &str = "introduce:yes";
const NO: &str = "introduce:no";

/// Guided introduction: name, then age, then a yes/no confirmation
pub struct IntroduceCommand {
    def: CommandDefinition,
}

impl IntroduceCommand {
    pub fn new() -> Self {
        Self {
            def: CommandDefinition::new("/introduce", "Introduce yourself")
                .with_min_tier(AccessTier::AUTHORIZED),
        }
    }

    fn confirm_options() -> Vec<Vec<ReplyOption>> {
        vec![vec![ReplyOption::new("Yes", YES), ReplyOption::new("No", NO)]]
    }

    fn on_name(input: &Content) -> ConversationStep {
        let name = input.as_str().trim();
        if name.is_empty() {
            return ConversationStep::advance(Reply::text("Please tell me your name."), ASK_NAME);
        }
        ConversationStep::advance(
            Reply::text(format!("Nice to meet you, {}! How old are you?", name)),
            ASK_AGE,
        )
    }

    fn on_age(input: &Content) -> ConversationStep {
        match input.as_str().trim().parse::<u8>() {
            Ok(age) if age > 0 => ConversationStep::advance(
                Reply::text(format!("So you are {}. Is that right?", age))
                    .with_options(Self::confirm_options()),
                CONFIRM,
            ),
            _ => ConversationStep::advance(Reply::text("Please send your age as a number."), ASK_AGE),
        }
    }

    fn on_confirm(input: &Content) -> ConversationStep {
        let answer = input.as_str().trim();
        if answer == YES || answer.eq_ignore_ascii_case("yes") {
            ConversationStep::finish(Reply::text("Thanks, got it!"))
        } else if answer == NO || answer.eq_ignore_ascii_case("no") {
            ConversationStep::advance(Reply::text("Then how old are you?"), ASK_AGE)
        } else {
            ConversationStep::advance(
                Reply::text("Please choose Yes or No.").with_options(Self::confirm_options()),
                CONFIRM,
            )
        }
    }
}

impl Default for IntroduceCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl BotCommand for IntroduceCommand {
    fn definition(&self) -> &CommandDefinition {
        &self.def
    }

    fn run(&self, tier: AccessTier, _args: &[String]) -> String {
        if !self.def.permits(tier) {
            return refuse_message(tier).to_string();
        }
        format!("Send {} to start, or /cancel to stop at any time.", self.def.token)
    }
}

impl ConversationCommand for IntroduceCommand {
    fn states(&self) -> &[&'static str] {
        &[ASK_NAME, ASK_AGE, CONFIRM]
    }

    fn start_conversation(&self, tier: AccessTier) -> ConversationStart {
        if !self.def.permits(tier) {
            return ConversationStart::refuse(refuse_message(tier));
        }
        ConversationStart::begin("What is your name?", Transition::next(ASK_NAME))
    }

    fn handle_state(&self, state: &str, _tier: AccessTier, input: &Content) -> ConversationStep {
        match state {
            ASK_NAME => Self::on_name(input),
            ASK_AGE => Self::on_age(input),
            CONFIRM => Self::on_confirm(input),
            other => {
                tracing::warn!("Introduce has no state '{}'", other);
                ConversationStep::finish(Reply::text("Let's start over with /introduce."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Content {
        Content::Text(s.to_string())
    }

    #[test]
    fn test_entry_requires_authorization() {
        let cmd = IntroduceCommand::new();
        let start = cmd.start_conversation(AccessTier::GUEST);
        assert!(!start.authorized);
        assert_eq!(start.next, Transition::End);

        let start = cmd.start_conversation(AccessTier::AUTHORIZED);
        assert!(start.authorized);
        assert_eq!(start.next, Transition::next(ASK_NAME));
    }

    #[test]
    fn test_age_must_be_a_number() {
        let step = IntroduceCommand::on_age(&text("old"));
        assert_eq!(step.next, Transition::next(ASK_AGE));

        let step = IntroduceCommand::on_age(&text(" 30 "));
        assert_eq!(step.next, Transition::next(CONFIRM));
        assert!(step.reply.and_then(|r| r.options).is_some());
    }

    #[test]
    fn test_confirm_accepts_buttons_and_text() {
        assert_eq!(
            IntroduceCommand::on_confirm(&Content::CallbackData(YES.to_string())).next,
            Transition::End
        );
        assert_eq!(IntroduceCommand::on_confirm(&text("No")).next, Transition::next(ASK_AGE));
        assert_eq!(IntroduceCommand::on_confirm(&text("maybe")).next, Transition::next(CONFIRM));
    }

    #[test]
    fn test_every_target_state_is_declared() {
        let cmd = IntroduceCommand::new();
        let inputs = [text(""), text("Ann"), text("30"), text("yes"), text("no"), text("x")];
        for state in cmd.states() {
            for input in &inputs {
                if let Transition::Next(next) = cmd.handle_state(state, AccessTier::AUTHORIZED, input).next {
                    assert!(cmd.states().contains(&next.as_str()), "{} -> {}", state, next);
                }
            }
        }
    }
}
