// tests/hooks_cascade_tests.rs

mod test_utils;

use std::sync::Arc;

use kousen_core::checks::{check_fn, guild_only};
use kousen_core::{
    Bot, CommandBuilder, Component, DispatchOutcome, HookCallback, HookType, KousenError,
};
use test_utils::helpers::*;

/// Bot with one component "misc" holding `fail`, a command whose callback
/// always errors.
async fn failing_setup() -> (Arc<Bot>, Arc<Component>, Arc<kousen_core::Command>) {
    let bot = bot_with_prefix("!");
    let component = Component::new("misc");
    let command = failing_command("fail");
    component.add_command(command.clone()).unwrap();
    bot.add_component(component.clone()).await.unwrap();
    (bot, component, command)
}

#[tokio::test]
async fn test_command_hook_takes_precedence() {
    let log = new_log();
    let (bot, component, command) = failing_setup().await;
    command
        .hooks()
        .add_hook_callback(HookType::Error, "cmd", error_recorder(&log, "command"));
    component
        .hooks()
        .add_hook_callback(HookType::Error, "comp", error_recorder(&log, "component"));
    bot.hooks()
        .add_hook_callback(HookType::Error, "bot", error_recorder(&log, "bot"));

    let outcome = bot.handle_message(message("!fail")).await;
    assert!(matches!(outcome, DispatchOutcome::ErrorHandled { ref command, .. } if command == "fail"));
    assert_eq!(entries(&log), vec!["command"]);
}

#[tokio::test]
async fn test_component_hook_before_bot() {
    let log = new_log();
    let (bot, component, _) = failing_setup().await;
    component
        .hooks()
        .add_hook_callback(HookType::Error, "comp", error_recorder(&log, "component"));
    bot.hooks()
        .add_hook_callback(HookType::Error, "bot", error_recorder(&log, "bot"));

    bot.handle_message(message("!fail")).await;
    assert_eq!(entries(&log), vec!["component"]);
}

#[tokio::test]
async fn test_bot_hook_fallback() {
    let log = new_log();
    let (bot, _, _) = failing_setup().await;
    bot.hooks()
        .add_hook_callback(HookType::Error, "bot", error_recorder(&log, "bot"));

    let outcome = bot.handle_message(message("!fail")).await;
    assert!(matches!(outcome, DispatchOutcome::ErrorHandled { .. }));
    assert_eq!(entries(&log), vec!["bot"]);
}

#[tokio::test]
async fn test_unhandled_error_is_returned_not_raised() {
    let (bot, _, _) = failing_setup().await;

    let outcome = bot.handle_message(message("!fail")).await;
    let DispatchOutcome::Unhandled(err) = outcome else {
        panic!("expected an unhandled command error");
    };
    let KousenError::Command(inner) = &*err else {
        panic!("expected a command error, got {err:?}");
    };
    assert_eq!(inner.raw_error.to_string(), "callback failed");
    assert_eq!(err.command().map(|c| c.full_name()), Some("fail".to_string()));
    assert_eq!(err.event().channel_id, CHANNEL);
}

#[tokio::test]
async fn test_failing_error_hook_still_counts_as_handled() {
    let (bot, _, command) = failing_setup().await;
    command.hooks().add_hook_callback(
        HookType::Error,
        "broken",
        HookCallback::error(|_| async { Err(anyhow::anyhow!("hook failed too")) }),
    );

    let outcome = bot.handle_message(message("!fail")).await;
    assert!(matches!(outcome, DispatchOutcome::ErrorHandled { .. }));
}

#[tokio::test]
async fn test_panicking_command_is_contained() {
    let bot = bot_with_prefix("!");
    let component = Component::new("misc");
    component
        .add_command(kousen_core::Command::new("boom", |_| async { panic!("exploded") }).unwrap())
        .unwrap();
    bot.add_component(component).await.unwrap();

    let outcome = bot.handle_message(message("!boom")).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Unhandled(ref err) if matches!(**err, KousenError::Command(_))
    ));
}

#[tokio::test]
async fn test_check_error_uses_its_own_hook_type() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    let component = Component::new("guild");
    let command = CommandBuilder::new("roles")
        .check(guild_only())
        .build(|_| async { Ok(()) })
        .unwrap();
    component.add_command(command).unwrap();
    component
        .hooks()
        .add_hook_callback(HookType::Error, "error", error_recorder(&log, "error"))
        .add_hook_callback(
            HookType::CheckError,
            "check",
            error_recorder(&log, "check_error"),
        );
    bot.add_component(component).await.unwrap();

    let outcome = bot.handle_message(message("!roles")).await;
    let DispatchOutcome::ErrorHandled { error, .. } = outcome else {
        panic!("expected the check failure to be handled");
    };
    assert!(matches!(&*error, KousenError::Check(e) if e.check == "guild_only"));
    assert_eq!(entries(&log), vec!["check_error"]);

    let outcome = bot.handle_message(message("!roles").with_guild(3)).await;
    assert!(matches!(outcome, DispatchOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_check_errors_and_reasons() {
    let bot = bot_with_prefix("!");
    let component = Component::new("misc");
    let command = CommandBuilder::new("guarded")
        .check(check_fn("always_ok", |_| async { Ok(true) }))
        .check(check_fn("lookup", |_| async {
            Err(anyhow::anyhow!("permission store down"))
        }))
        .build(|_| async { Ok(()) })
        .unwrap();
    component.add_command(command).unwrap();
    bot.add_component(component).await.unwrap();

    let DispatchOutcome::Unhandled(err) = bot.handle_message(message("!guarded")).await else {
        panic!("expected an unhandled check failure");
    };
    let KousenError::Check(check) = &*err else {
        panic!("expected a check error");
    };
    assert_eq!(check.check, "lookup");
    assert!(check.reason.contains("permission store down"));
}

#[tokio::test]
async fn test_invoke_hook_order() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    let component = Component::new("misc");
    let ok = logging_command("ok", &log);
    component.add_command(ok).unwrap();
    component.add_command(failing_command("fail")).unwrap();
    component
        .hooks()
        .add_hook_callback(HookType::PreInvoke, "pre", context_recorder(&log, "pre"))
        .add_hook_callback(
            HookType::CommandSuccess,
            "success",
            context_recorder(&log, "success"),
        )
        .add_hook_callback(HookType::PostInvoke, "post", context_recorder(&log, "post"))
        .add_hook_callback(HookType::Error, "error", error_recorder(&log, "error"));
    bot.add_component(component).await.unwrap();

    bot.handle_message(message("!ok")).await;
    assert_eq!(entries(&log), vec!["pre", "ok|", "success", "post"]);

    log.lock().clear();
    bot.handle_message(message("!fail")).await;
    assert_eq!(entries(&log), vec!["pre", "error", "post"]);
}

#[tokio::test]
async fn test_command_not_found_goes_to_bot_only() {
    let log = new_log();
    let (bot, component, _) = failing_setup().await;
    component
        .hooks()
        .add_hook_callback(HookType::Error, "comp", error_recorder(&log, "component"));

    let outcome = bot.handle_message(message("!nope")).await;
    assert!(matches!(outcome, DispatchOutcome::NotFound { handled: false, .. }));
    assert!(entries(&log).is_empty());

    let names = new_log();
    let seen = names.clone();
    bot.hooks().add_hook_callback(
        HookType::Error,
        "not_found",
        HookCallback::error(move |err| {
            let seen = seen.clone();
            async move {
                if let KousenError::CommandNotFound(e) = &*err {
                    seen.lock().push(format!("{}{}", e.prefix, e.name));
                }
                Ok(())
            }
        }),
    );

    let outcome = bot.handle_message(message("!nope with args")).await;
    assert!(matches!(outcome, DispatchOutcome::NotFound { ref name, handled: true } if name == "nope"));
    assert_eq!(entries(&names), vec!["!nope"]);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_removed_hook_no_longer_fires() {
    let log = new_log();
    let (bot, _, command) = failing_setup().await;
    command
        .hooks()
        .add_hook_callback(HookType::Error, "cmd", error_recorder(&log, "command"));
    command.hooks().remove_hook("cmd");

    assert!(matches!(
        bot.handle_message(message("!fail")).await,
        DispatchOutcome::Unhandled(_)
    ));
    assert!(entries(&log).is_empty());
}
