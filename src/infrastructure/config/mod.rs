//! Configuration management

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::commands::{build_registry, builtin_commands};
use crate::application::errors::{BotError, ConfigError};
use crate::application::messaging::{ConversationSettings, Dispatcher, MessageParser};
use crate::application::services::lexicon::{CANCEL_CONVERSATION, UNKNOWN_INTENT};
use crate::application::services::{Authorization, IntentEntry, IntentLexicon};
use crate::domain::entities::UserId;

/// Admin id written by `init-config`; a real deployment must replace it
pub const DEFAULT_ADMIN: UserId = 123456789;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub intents: IntentTable,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
}

/// Access lists; `admins` must not be empty
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthConfig {
    pub admins: Vec<UserId>,
    #[serde(default)]
    pub authorized_users: Vec<UserId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConversationConfig {
    #[serde(default = "default_cancel_command")]
    pub cancel_command: String,
    /// Unset means sessions never expire
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TelegramConfig {
    pub token: Option<String>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_retry_initial")]
    pub retry_initial_secs: u64,
    #[serde(default = "default_retry_max")]
    pub retry_max_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IntentConfig {
    #[serde(default)]
    pub examples: Vec<String>,
    pub responses: Vec<String>,
}

/// Intent name -> examples and responses, kept in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentTable(pub Vec<(String, IntentConfig)>);

impl IntentTable {
    pub fn to_entries(&self) -> Vec<IntentEntry> {
        self.0
            .iter()
            .map(|(name, intent)| {
                IntentEntry::new(name.clone(), intent.examples.clone(), intent.responses.clone())
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for IntentTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = IntentTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of intent names to examples and responses")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, IntentConfig>()? {
                    entries.push(entry);
                }
                Ok(IntentTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

impl Serialize for IntentTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, intent) in &self.0 {
            map.serialize_entry(name, intent)?;
        }
        map.end()
    }
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_cancel_command() -> String {
    "/cancel".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_retry_initial() -> u64 {
    2
}

fn default_retry_max() -> u64 {
    60
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            cancel_command: default_cancel_command(),
            idle_timeout_secs: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: default_poll_timeout(),
            retry_initial_secs: default_retry_initial(),
            retry_max_secs: default_retry_max(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let intent = |examples: &[&str], responses: &[&str]| IntentConfig {
            examples: examples.iter().map(|s| s.to_string()).collect(),
            responses: responses.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            bot: BotConfig {
                name: "cistbot".to_string(),
                command_prefix: default_prefix(),
            },
            auth: AuthConfig {
                admins: vec![DEFAULT_ADMIN],
                authorized_users: Vec::new(),
            },
            conversation: ConversationConfig::default(),
            telegram: TelegramConfig::default(),
            intents: IntentTable(vec![
                (
                    "greeting".to_string(),
                    intent(&["hello", "hi", "good morning"], &["Hi there!", "Hello!"]),
                ),
                (
                    "farewell".to_string(),
                    intent(&["bye", "goodbye", "see you"], &["Bye!", "See you later!"]),
                ),
                (
                    UNKNOWN_INTENT.to_string(),
                    intent(&[], &["Sorry, I don't understand you.", "Could you rephrase that?"]),
                ),
                (
                    CANCEL_CONVERSATION.to_string(),
                    intent(&[], &["Okay, let's stop here."]),
                ),
            ]),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config {}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.admins.is_empty() {
            return Err(ConfigError::MissingField("auth.admins".to_string()));
        }
        if self.bot.command_prefix.is_empty() {
            return Err(ConfigError::InvalidValue("bot.command-prefix may not be empty".to_string()));
        }
        if let Some((name, _)) = self.intents.0.iter().find(|(_, intent)| intent.responses.is_empty()) {
            return Err(ConfigError::InvalidValue(format!("intent '{}' has no responses", name)));
        }
        Ok(())
    }

    /// Admins were left at the generated default
    pub fn has_placeholder_admins(&self) -> bool {
        self.auth.admins.contains(&DEFAULT_ADMIN)
    }

    /// Environment overrides: `BOT_TOKEN`
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.token = Some(token);
            }
        }
    }

    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings {
            cancel_token: self.conversation.cancel_command.clone(),
            idle_timeout: self.conversation.idle_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Assemble the dispatcher with the built-in commands.
    /// `bot_username` lets `/token@username` address this bot in group chats.
    pub fn build_dispatcher(&self, bot_username: Option<&str>) -> Result<Dispatcher, BotError> {
        let auth = Authorization::new(self.auth.admins.clone(), self.auth.authorized_users.clone())?;
        let lexicon = IntentLexicon::new(self.intents.to_entries())?;
        let mut parser = MessageParser::new(self.bot.command_prefix.clone());
        if let Some(username) = bot_username {
            parser = parser.with_bot_username(username);
        }

        Dispatcher::builder()
            .auth(auth)
            .lexicon(lexicon)
            .registry(build_registry(builtin_commands()))
            .conversation_settings(self.conversation_settings())
            .parser(parser)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
bot:
  name: test-bot
auth:
  admins: [1, 2]
  authorized-users: [3]
conversation:
  idle-timeout-secs: 600
intents:
  zeta:
    examples: ["goodbye now"]
    responses: ["z"]
  alpha:
    examples: ["first letter"]
    responses: ["a"]
"#;

    #[test]
    fn test_load_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.bot.command_prefix, "/");
        assert_eq!(config.auth.admins, vec![1, 2]);
        assert_eq!(config.auth.authorized_users, vec![3]);
        assert_eq!(config.conversation.cancel_command, "/cancel");
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.conversation_settings().idle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_intents_keep_document_order() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let names: Vec<&str> = config.intents.0.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_placeholder_admins_detected() {
        assert!(Config::default().has_placeholder_admins());
        let yaml = Config::default().to_yaml().unwrap();
        assert!(Config::from_yaml(&yaml).unwrap().has_placeholder_admins());
        assert!(!Config::from_yaml(SAMPLE).unwrap().has_placeholder_admins());
    }

    #[test]
    fn test_empty_admins_rejected() {
        let yaml = "bot:\n  name: x\nauth:\n  admins: []\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_intent_without_responses_rejected() {
        let yaml = "bot:\n  name: x\nauth:\n  admins: [1]\nintents:\n  mute:\n    examples: [a]\n    responses: []\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.intents, Config::default().intents);
        assert!(yaml.contains("authorized-users"));
    }

    #[tokio::test]
    async fn test_build_dispatcher_from_config() {
        let dispatcher = Config::from_yaml(SAMPLE).unwrap().build_dispatcher(None).unwrap();
        assert_eq!(dispatcher.on_message(5, 9, "first leter").await.map(|r| r.text).as_deref(), Some("a"));
        assert!(dispatcher.registry().get("/help").is_some());
        assert!(dispatcher.registry().get("/introduce").is_some());
    }
}
