//! Message parser - Splits command invocations into token and arguments

/// A command token with its positional arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Token including the prefix, e.g. `/help`
    pub token: String,
    pub args: Vec<String>,
}

/// Recognises command invocations by their prefix
#[derive(Debug, Clone)]
pub struct MessageParser {
    command_prefix: String,
    bot_username: Option<String>,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
            bot_username: None,
        }
    }

    /// Accept `/cmd@username` addressing, as used in group chats
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn is_command(&self, text: &str) -> bool {
        !self.command_prefix.is_empty() && text.starts_with(&self.command_prefix)
    }

    /// Whitespace-tokenize a command message. `None` for non-command text.
    pub fn parse_command(&self, text: &str) -> Option<CommandInvocation> {
        if !self.is_command(text) {
            return None;
        }

        let mut parts = text.split_whitespace();
        let token = self.strip_mention(parts.next()?).to_string();
        let args = parts.map(str::to_string).collect();

        Some(CommandInvocation { token, args })
    }

    /// Text with an addressed `@username` removed from a bare command token
    pub fn normalize_token<'t>(&self, text: &'t str) -> &'t str {
        if self.is_command(text) {
            self.strip_mention(text)
        } else {
            text
        }
    }

    fn strip_mention<'t>(&self, token: &'t str) -> &'t str {
        match (token.split_once('@'), &self.bot_username) {
            (Some((name, mention)), Some(username)) if mention.eq_ignore_ascii_case(username) => name,
            _ => token,
        }
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_args() {
        let parser = MessageParser::default();
        let parsed = parser.parse_command("/weather  Paris   tomorrow").unwrap();
        assert_eq!(parsed.token, "/weather");
        assert_eq!(parsed.args, vec!["Paris", "tomorrow"]);
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        let parser = MessageParser::default();
        assert!(parser.parse_command("hello /help").is_none());
        assert!(parser.parse_command("").is_none());
    }

    #[test]
    fn test_custom_prefix() {
        let parser = MessageParser::new("!");
        assert_eq!(parser.parse_command("!ping").unwrap().token, "!ping");
        assert!(parser.parse_command("/ping").is_none());
    }

    #[test]
    fn test_mention_is_stripped_for_own_username() {
        let parser = MessageParser::default().with_bot_username("cist_bot");
        assert_eq!(parser.parse_command("/help@Cist_Bot x").unwrap().token, "/help");
        assert_eq!(parser.parse_command("/help@other_bot").unwrap().token, "/help@other_bot");
        assert_eq!(parser.normalize_token("/start@cist_bot"), "/start");
        assert_eq!(parser.normalize_token("mail me@cist_bot"), "mail me@cist_bot");
    }
}
