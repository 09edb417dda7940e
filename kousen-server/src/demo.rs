// File: kousen-server/src/demo.rs
//
// The demo module attached in both modes: `ping`, `echo` and a `user` group
// with `info`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use kousen_core::{
    Bot, CommandBuilder, Component, Error, HookCallback, HookType, KousenError, Module,
};

pub struct DemoModule;

#[async_trait]
impl Module for DemoModule {
    fn name(&self) -> &str {
        "demo"
    }

    async fn load(&self, bot: &Arc<Bot>) -> anyhow::Result<()> {
        bot.add_component(demo_component()?).await?;
        Ok(())
    }

    async fn unload(&self, bot: &Arc<Bot>) -> anyhow::Result<()> {
        bot.remove_component("demo").await;
        Ok(())
    }
}

pub fn demo_component() -> Result<Arc<Component>, Error> {
    let component = Component::new("demo");

    component.add_command(
        CommandBuilder::new("ping")
            .description("Check that the bot is alive")
            .build(|ctx| async move {
                ctx.respond("Pong!").await?;
                Ok(())
            })?,
    )?;

    component.add_command(
        CommandBuilder::new("echo")
            .alias("say")
            .description("Repeat the given text")
            .build(|ctx| async move {
                if ctx.arguments().is_empty() {
                    anyhow::bail!("there is nothing to echo");
                }
                ctx.respond(ctx.arguments()).await?;
                Ok(())
            })?,
    )?;

    let user = CommandBuilder::new("user")
        .description("User lookups")
        .build_group(|ctx| async move {
            ctx.respond(&format!("Usage: {}user info", ctx.prefix())).await?;
            Ok(())
        })?;
    user.add_command(
        CommandBuilder::new("info")
            .alias("whois")
            .description("Show who sent the command")
            .build(|ctx| async move {
                let author = ctx.cached_author().unwrap_or_else(|| ctx.author().clone());
                let place = match ctx.guild_id() {
                    Some(guild) => format!("guild {guild}"),
                    None => "a direct message".to_string(),
                };
                ctx.respond(&format!(
                    "{} (id {}, bot: {}) in {}",
                    author.name, author.id, author.is_bot, place
                ))
                .await?;
                Ok(())
            })?,
    )?;
    component.add_command(user)?;

    component.hooks().add_hook_callback(
        HookType::Error,
        "reply_with_error",
        HookCallback::error(|err| async move {
            err.respond(&format!("That didn't work: {err}")).await?;
            Ok(())
        }),
    );

    Ok(component)
}

/// Bot-wide hooks: unknown command names get a short reply. Any other error
/// reaching the bot is logged, since this hook marks it handled.
pub fn install_bot_hooks(bot: &Bot) {
    bot.hooks().add_hook_callback(
        HookType::Error,
        "unknown_command",
        HookCallback::error(|err| async move {
            match &*err {
                KousenError::CommandNotFound(e) => {
                    err.respond(&format!("Unknown command `{}{}`", e.prefix, e.name))
                        .await?;
                }
                other => error!("Unhandled error reached the bot: {}", other),
            }
            Ok(())
        }),
    );
}
