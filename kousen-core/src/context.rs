// File: kousen-core/src/context.rs

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::Error;
use crate::bot::Bot;
use crate::commands::Command;
use crate::component::Component;
use crate::parsing::split_arguments;
use kousen_common::models::{Author, MessageEvent, SentMessage};

/// The bot and the raw event, before any command was matched. Getter
/// callbacks receive this.
#[derive(Clone)]
pub struct PartialContext {
    bot: Arc<Bot>,
    event: Arc<MessageEvent>,
}

impl PartialContext {
    pub fn new(bot: Arc<Bot>, event: Arc<MessageEvent>) -> Self {
        Self { bot, event }
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    pub fn event(&self) -> &Arc<MessageEvent> {
        &self.event
    }

    pub fn author(&self) -> &Author {
        &self.event.author
    }

    pub fn channel_id(&self) -> u64 {
        self.event.channel_id
    }

    pub fn guild_id(&self) -> Option<u64> {
        self.event.guild_id
    }

    pub fn is_human(&self) -> bool {
        self.event.is_human()
    }

    /// The author as the gateway cache knows it, if cached.
    pub fn cached_author(&self) -> Option<Author> {
        self.bot.client().cached_user(self.event.author.id)
    }

    /// Send `content` to the channel the event came from.
    pub async fn respond(&self, content: &str) -> Result<SentMessage, Error> {
        self.bot
            .client()
            .send_message(self.event.channel_id, content)
            .await
    }
}

impl fmt::Debug for PartialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialContext")
            .field("event_id", &self.event.id)
            .field("channel_id", &self.event.channel_id)
            .field("author", &self.event.author.name)
            .finish()
    }
}

/// Everything a command callback needs about one invocation.
pub struct MessageContext {
    partial: PartialContext,
    prefix: String,
    invoked_with: String,
    parser: String,
    command: Arc<Command>,
    arguments: String,
}

impl MessageContext {
    pub(crate) fn new(
        partial: PartialContext,
        prefix: String,
        invoked_with: String,
        parser: String,
        command: Arc<Command>,
        arguments: String,
    ) -> Self {
        Self {
            partial,
            prefix,
            invoked_with,
            parser,
            command,
            arguments,
        }
    }

    pub fn partial(&self) -> &PartialContext {
        &self.partial
    }

    /// The prefix the message matched.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The name or alias the author typed for the matched command.
    pub fn invoked_with(&self) -> &str {
        &self.invoked_with
    }

    /// The argument separator resolved for this invocation.
    pub fn parser(&self) -> &str {
        &self.parser
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    pub fn component(&self) -> Option<Arc<Component>> {
        self.command.component()
    }

    /// Unparsed text after the command name, leading whitespace removed.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// The argument text split on the resolved parser.
    pub fn args(&self) -> Vec<&str> {
        split_arguments(&self.arguments, &self.parser)
    }
}

impl Deref for MessageContext {
    type Target = PartialContext;

    fn deref(&self) -> &Self::Target {
        &self.partial
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("event_id", &self.partial.event.id)
            .field("prefix", &self.prefix)
            .field("invoked_with", &self.invoked_with)
            .field("command", &self.command.full_name())
            .field("arguments", &self.arguments)
            .finish()
    }
}
