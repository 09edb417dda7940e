// File: kousen-core/tests/test_utils/helpers.rs

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;

use kousen_core::{
    Author, Bot, Command, CurrentUser, Error, GatewayClient, HookCallback, MessageEvent,
    SentMessage,
};

mock! {
    pub Gateway {}
    #[async_trait]
    impl GatewayClient for Gateway {
        async fn send_message(&self, channel_id: u64, content: &str) -> Result<SentMessage, Error>;
        async fn fetch_my_user(&self) -> Result<CurrentUser, Error>;
    }
}

pub const CHANNEL: u64 = 5;
pub const AUTHOR: u64 = 7;
pub const BOT_USER: u64 = 99;

/// A gateway that accepts any send and identifies as `BOT_USER`.
pub fn quiet_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_send_message()
        .returning(|channel_id, content| {
            Ok(SentMessage {
                id: 1,
                channel_id,
                content: content.to_string(),
            })
        });
    gateway.expect_fetch_my_user().returning(|| {
        Ok(CurrentUser {
            id: BOT_USER,
            name: "kousen".to_string(),
        })
    });
    gateway
}

pub fn bot_with_prefix(prefix: &str) -> Arc<Bot> {
    Bot::builder(Arc::new(quiet_gateway()))
        .prefix(prefix)
        .build()
        .unwrap()
}

/// A message from a human in `CHANNEL`.
pub fn message(content: &str) -> MessageEvent {
    MessageEvent::new(CHANNEL, Author::human(AUTHOR, "maow"), content)
}

pub fn bot_message(content: &str) -> MessageEvent {
    MessageEvent::new(CHANNEL, Author::bot(3, "otherbot"), content)
}

/// Shared, ordered record of what ran.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Records `"<full name>|<arguments>"` when invoked.
pub fn logging_command(name: &str, log: &Log) -> Arc<Command> {
    let log = log.clone();
    Command::new(name, move |ctx| {
        let log = log.clone();
        async move {
            log.lock()
                .push(format!("{}|{}", ctx.command().full_name(), ctx.arguments()));
            Ok(())
        }
    })
    .unwrap()
}

/// A group that records `"<full name>|<arguments>"` for its own callback.
pub fn logging_group(name: &str, log: &Log) -> Arc<Command> {
    let log = log.clone();
    Command::group(name, move |ctx| {
        let log = log.clone();
        async move {
            log.lock()
                .push(format!("{}|{}", ctx.command().full_name(), ctx.arguments()));
            Ok(())
        }
    })
    .unwrap()
}

pub fn failing_command(name: &str) -> Arc<Command> {
    Command::new(name, |_| async { Err(anyhow::anyhow!("callback failed")) }).unwrap()
}

/// Error hook that records `tag`.
pub fn error_recorder(log: &Log, tag: &str) -> HookCallback {
    let log = log.clone();
    let tag = tag.to_string();
    HookCallback::error(move |_| {
        let log = log.clone();
        let tag = tag.clone();
        async move {
            log.lock().push(tag);
            Ok(())
        }
    })
}

/// Context hook that records `tag`.
pub fn context_recorder(log: &Log, tag: &str) -> HookCallback {
    let log = log.clone();
    let tag = tag.to_string();
    HookCallback::context(move |_| {
        let log = log.clone();
        let tag = tag.clone();
        async move {
            log.lock().push(tag);
            Ok(())
        }
    })
}

/// Component lifecycle hook that records `"<tag>:<component name>"`.
pub fn component_recorder(log: &Log, tag: &str) -> HookCallback {
    let log = log.clone();
    let tag = tag.to_string();
    HookCallback::component(move |_, component| {
        let log = log.clone();
        let tag = tag.clone();
        async move {
            log.lock().push(format!("{}:{}", tag, component.name()));
            Ok(())
        }
    })
}
