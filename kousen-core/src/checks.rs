// File: kousen-core/src/checks.rs
//
// Per-command preconditions. A check passes by returning Ok(true); Ok(false)
// or an error fails it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::context::MessageContext;

#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, ctx: &Arc<MessageContext>) -> anyhow::Result<bool>;
}

type CheckFn = dyn Fn(Arc<MessageContext>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync;

/// A check built from a closure.
pub struct FnCheck {
    name: String,
    f: Box<CheckFn>,
}

#[async_trait]
impl Check for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &Arc<MessageContext>) -> anyhow::Result<bool> {
        (self.f)(ctx.clone()).await
    }
}

pub fn check_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Check>
where
    F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(FnCheck {
        name: name.into(),
        f: Box::new(move |ctx| f(ctx).boxed()),
    })
}

/// Passes when the author is one of the bot's owners.
pub struct OwnerOnly;

#[async_trait]
impl Check for OwnerOnly {
    fn name(&self) -> &str {
        "owner_only"
    }

    async fn check(&self, ctx: &Arc<MessageContext>) -> anyhow::Result<bool> {
        Ok(ctx.bot().is_owner(ctx.author().id))
    }
}

/// Passes for messages sent in a guild, fails in direct messages.
pub struct GuildOnly;

#[async_trait]
impl Check for GuildOnly {
    fn name(&self) -> &str {
        "guild_only"
    }

    async fn check(&self, ctx: &Arc<MessageContext>) -> anyhow::Result<bool> {
        Ok(ctx.guild_id().is_some())
    }
}

/// Passes when the author is neither a bot, a system account nor a webhook.
pub struct HumanOnly;

#[async_trait]
impl Check for HumanOnly {
    fn name(&self) -> &str {
        "human_only"
    }

    async fn check(&self, ctx: &Arc<MessageContext>) -> anyhow::Result<bool> {
        Ok(ctx.is_human())
    }
}

pub fn owner_only() -> Arc<dyn Check> {
    Arc::new(OwnerOnly)
}

pub fn guild_only() -> Arc<dyn Check> {
    Arc::new(GuildOnly)
}

pub fn human_only() -> Arc<dyn Check> {
    Arc::new(HumanOnly)
}
