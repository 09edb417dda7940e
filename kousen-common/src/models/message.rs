// File: kousen-common/src/models/message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user who sent an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_system: bool,
}

impl Author {
    pub fn human(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_bot: false,
            is_system: false,
        }
    }

    pub fn bot(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_bot: true,
            is_system: false,
        }
    }
}

/// An inbound message as delivered by the gateway collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: u64,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub author: Author,
    /// `None` when the gateway delivered no text (e.g. missing content intent).
    pub content: Option<String>,
    pub webhook_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    /// Convenience constructor used by adapters and tests.
    pub fn new(channel_id: u64, author: Author, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            channel_id,
            guild_id: None,
            author,
            content: Some(content.into()),
            webhook_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_guild(mut self, guild_id: u64) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// A message is human when it was sent neither by a bot, nor a system
    /// account, nor a webhook.
    pub fn is_human(&self) -> bool {
        !self.author.is_bot && !self.author.is_system && self.webhook_id.is_none()
    }
}

/// Handle to a message the bot sent in response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentMessage {
    pub id: u64,
    pub channel_id: u64,
    pub content: String,
}

/// The bot's own identity, fetched once per connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: u64,
    pub name: String,
}

impl CurrentUser {
    /// The two mention forms that address this user: `<@id>` and `<@!id>`.
    pub fn mention_prefixes(&self) -> Vec<String> {
        vec![format!("<@{}>", self.id), format!("<@!{}>", self.id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_human() {
        let msg = MessageEvent::new(1, Author::human(2, "maow"), "!ping");
        assert!(msg.is_human());

        let from_bot = MessageEvent::new(1, Author::bot(3, "other"), "!ping");
        assert!(!from_bot.is_human());

        let mut from_webhook = MessageEvent::new(1, Author::human(2, "hook"), "!ping");
        from_webhook.webhook_id = Some(99);
        assert!(!from_webhook.is_human());

        let mut system = MessageEvent::new(1, Author::human(0, "system"), "welcome");
        system.author.is_system = true;
        assert!(!system.is_human());
    }

    #[test]
    fn test_mention_prefixes() {
        let me = CurrentUser { id: 42, name: "kousen".into() };
        assert_eq!(me.mention_prefixes(), vec!["<@42>".to_string(), "<@!42>".to_string()]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"id":7,"name":"someone"}"#;
        let author: Author = serde_json::from_str(json).unwrap();
        assert_eq!(author, Author::human(7, "someone"));
    }
}
