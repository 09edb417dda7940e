// File: kousen-common/src/models/twilight.rs
//
// Conversions from twilight's Discord models into the transport-neutral models.

use chrono::{DateTime, Utc};
use twilight_model::channel::Message;
use twilight_model::user::{CurrentUser as TwilightCurrentUser, User};

use super::{Author, CurrentUser, MessageEvent};

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.get(),
            name: user.name.clone(),
            is_bot: user.bot,
            is_system: user.system.unwrap_or(false),
        }
    }
}

impl From<&Message> for MessageEvent {
    fn from(msg: &Message) -> Self {
        let timestamp = DateTime::from_timestamp_micros(msg.timestamp.as_micros())
            .unwrap_or_else(Utc::now);
        Self {
            id: msg.id.get(),
            channel_id: msg.channel_id.get(),
            guild_id: msg.guild_id.map(|g| g.get()),
            author: Author::from(&msg.author),
            // Discord sends an empty string when the content intent is missing
            // or the message is attachment-only.
            content: if msg.content.is_empty() {
                None
            } else {
                Some(msg.content.clone())
            },
            webhook_id: msg.webhook_id.map(|w| w.get()),
            timestamp,
        }
    }
}

impl From<&TwilightCurrentUser> for CurrentUser {
    fn from(user: &TwilightCurrentUser) -> Self {
        Self {
            id: user.id.get(),
            name: user.name.clone(),
        }
    }
}
