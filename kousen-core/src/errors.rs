// File: kousen-core/src/errors.rs
//
// Runtime error kinds that travel through the hook cascade. Setup mistakes use
// `kousen_common::Error` instead.

use std::sync::Arc;

use thiserror::Error;

use crate::Error;
use crate::bot::Bot;
use crate::commands::Command;
use crate::context::MessageContext;
use kousen_common::models::{MessageEvent, SentMessage};

/// A precondition of the command rejected the invocation.
#[derive(Debug, Error)]
#[error("check '{check}' failed for command '{}': {reason}", .context.command().full_name())]
pub struct CheckError {
    pub context: Arc<MessageContext>,
    pub check: String,
    pub reason: String,
}

/// The command callback itself failed. `raw_error` is the original cause.
#[derive(Debug, Error)]
#[error("command '{}' raised an error: {raw_error:#}", .context.command().full_name())]
pub struct CommandError {
    pub context: Arc<MessageContext>,
    pub raw_error: anyhow::Error,
}

/// No component yielded a command for the name used.
#[derive(Debug, Error)]
#[error("no command found for '{name}' (prefix '{prefix}')")]
pub struct CommandNotFound {
    pub bot: Arc<Bot>,
    pub event: Arc<MessageEvent>,
    pub prefix: String,
    pub name: String,
}

/// Payload of the `error` and `check_error` hooks.
#[derive(Debug, Error)]
pub enum KousenError {
    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    CommandNotFound(#[from] CommandNotFound),
}

impl KousenError {
    /// The invocation context, when a command was matched.
    pub fn context(&self) -> Option<&Arc<MessageContext>> {
        match self {
            KousenError::Check(e) => Some(&e.context),
            KousenError::Command(e) => Some(&e.context),
            KousenError::CommandNotFound(_) => None,
        }
    }

    pub fn bot(&self) -> &Arc<Bot> {
        match self {
            KousenError::Check(e) => e.context.bot(),
            KousenError::Command(e) => e.context.bot(),
            KousenError::CommandNotFound(e) => &e.bot,
        }
    }

    pub fn event(&self) -> &Arc<MessageEvent> {
        match self {
            KousenError::Check(e) => e.context.event(),
            KousenError::Command(e) => e.context.event(),
            KousenError::CommandNotFound(e) => &e.event,
        }
    }

    pub fn command(&self) -> Option<&Arc<Command>> {
        self.context().map(|ctx| ctx.command())
    }

    /// Reply in the channel the failing message came from.
    pub async fn respond(&self, content: &str) -> Result<SentMessage, Error> {
        let event = self.event();
        self.bot().client().send_message(event.channel_id, content).await
    }
}
