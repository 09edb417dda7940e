// src/lib.rs
//! Command dispatch for chat bots: prefix matching, command trees, and the
//! bot/component/command hook cascade.

pub mod bot;
pub mod checks;
pub mod commands;
pub mod component;
pub mod config;
pub mod context;
pub mod errors;
pub mod gateway;
pub mod getters;
pub mod hooks;
pub mod modules;
pub mod parsing;

#[cfg(test)]
pub(crate) mod test_utils;

pub use bot::{Bot, BotBuilder, DispatchOutcome, IgnoreReason};
pub use checks::Check;
pub use commands::{Command, CommandBuilder};
pub use component::Component;
pub use config::BotConfig;
pub use context::{MessageContext, PartialContext};
pub use errors::{CheckError, CommandError, CommandNotFound, KousenError};
pub use getters::{BoolArg, ParserArg, PrefixArg, PrefixValue};
pub use hooks::{HookCallback, HookManager, HookPayload, HookScope, HookType};
pub use modules::Module;

pub use kousen_common::Error;
pub use kousen_common::models::{Author, CurrentUser, MessageEvent, SentMessage};
pub use kousen_common::traits::GatewayClient;
