// tests/component_lifecycle_tests.rs

mod test_utils;

use std::sync::Arc;

use kousen_core::{Command, Component, DispatchOutcome, Error, HookType};
use test_utils::helpers::*;

#[tokio::test]
async fn test_added_and_removed_hooks_fire_once() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    bot.hooks()
        .add_hook_callback(HookType::ComponentAdded, "added", component_recorder(&log, "added"))
        .add_hook_callback(
            HookType::ComponentRemoved,
            "removed",
            component_recorder(&log, "removed"),
        );

    let misc = Component::new("misc");
    bot.add_component(misc.clone()).await.unwrap();
    bot.add_component(misc.clone()).await.unwrap();

    let removed = bot.remove_component("misc").await;
    assert!(removed.is_some_and(|c| Arc::ptr_eq(&c, &misc)));
    assert!(misc.bot().is_none());

    // Second removal is a no-op.
    assert!(bot.remove_component("misc").await.is_none());

    assert_eq!(entries(&log), vec!["added:misc", "removed:misc"]);
}

#[tokio::test]
async fn test_component_lifecycle_hook_precedence() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    bot.hooks()
        .add_hook_callback(HookType::ComponentAdded, "bot", component_recorder(&log, "bot"));

    let quiet = Component::new("quiet");
    let loud = Component::new("loud");
    loud.hooks()
        .add_hook_callback(HookType::ComponentAdded, "own", component_recorder(&log, "own"));

    bot.add_component(quiet).await.unwrap();
    bot.add_component(loud).await.unwrap();

    assert_eq!(entries(&log), vec!["bot:quiet", "own:loud"]);
}

#[tokio::test]
async fn test_commands_stop_resolving_after_removal() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    let misc = Component::new("misc");
    misc.add_command(logging_command("ping", &log)).unwrap();
    bot.add_component(misc.clone()).await.unwrap();

    assert!(matches!(
        bot.handle_message(message("!ping")).await,
        DispatchOutcome::Completed { .. }
    ));

    bot.remove_component("misc").await;
    assert!(matches!(
        bot.handle_message(message("!ping")).await,
        DispatchOutcome::NotFound { .. }
    ));

    // Re-attaching restores dispatch.
    bot.add_component(misc).await.unwrap();
    bot.handle_message(message("!ping")).await;
    assert_eq!(entries(&log), vec!["ping|", "ping|"]);
}

#[tokio::test]
async fn test_component_belongs_to_one_bot() {
    let first = bot_with_prefix("!");
    let second = bot_with_prefix("?");
    let misc = Component::new("misc");

    first.add_component(misc.clone()).await.unwrap();
    assert!(matches!(
        second.add_component(misc.clone()).await,
        Err(Error::Config(_))
    ));

    first.remove_component("misc").await;
    second.add_component(misc.clone()).await.unwrap();
    assert!(Arc::ptr_eq(&misc.bot().unwrap(), &second));
}

#[tokio::test]
async fn test_commands_added_after_attach_resolve() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    let misc = Component::new("misc");
    bot.add_component(misc.clone()).await.unwrap();

    let user = logging_group("user", &log);
    misc.add_command(user.clone()).unwrap();
    let info = logging_command("info", &log);
    user.add_command(info.clone()).unwrap();

    bot.handle_message(message("!user info 42")).await;
    assert_eq!(entries(&log), vec!["user info|42"]);
    assert!(Arc::ptr_eq(&info.component().unwrap(), &misc));

    // Removing the sub-command makes "info" an argument again.
    user.remove_command("info");
    bot.handle_message(message("!user info 42")).await;
    assert_eq!(entries(&log), vec!["user info|42", "user|info 42"]);
}

#[tokio::test]
async fn test_three_level_full_name_dispatch() {
    let log = new_log();
    let bot = bot_with_prefix("!");
    let admin = logging_group("admin", &log);
    let user = logging_group("user", &log);
    let ban = logging_command("ban", &log);
    user.add_command(ban.clone()).unwrap();
    admin.add_command(user).unwrap();
    let misc = Component::new("misc");
    misc.add_command(admin).unwrap();
    bot.add_component(misc).await.unwrap();

    let outcome = bot.handle_message(message("!admin user ban 123 spam")).await;
    assert!(matches!(outcome, DispatchOutcome::Completed { ref command } if command == "admin user ban"));
    assert_eq!(entries(&log), vec!["admin user ban|123 spam"]);
    assert_eq!(ban.full_name(), "admin user ban");
}

#[tokio::test]
async fn test_aliases_dispatch_and_report_invoked_name() {
    let bot = bot_with_prefix("!");
    let seen = new_log();
    let recorder = seen.clone();
    let info = kousen_core::CommandBuilder::new("information")
        .aliases(["info", "i"])
        .build(move |ctx| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().push(ctx.invoked_with().to_string());
                Ok(())
            }
        })
        .unwrap();
    let misc = Component::new("misc");
    misc.add_command(info).unwrap();
    bot.add_component(misc).await.unwrap();

    for content in ["!information", "!info", "!i"] {
        bot.handle_message(message(content)).await;
    }
    assert_eq!(entries(&seen), vec!["information", "info", "i"]);

    let clash = Command::new("i", |_| async { Ok(()) }).unwrap();
    let other = bot.get_component("misc").unwrap();
    assert!(matches!(other.add_command(clash), Err(Error::NameConflict(_))));
}

#[tokio::test]
async fn test_removal_while_command_is_running() {
    let bot = bot_with_prefix("!");
    let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let release = Arc::new(tokio::sync::Notify::new());

    let waiting = {
        let release = release.clone();
        Command::new("slow", move |_| {
            let started_tx = started_tx.clone();
            let release = release.clone();
            async move {
                started_tx.send(())?;
                release.notified().await;
                Ok(())
            }
        })
        .unwrap()
    };
    let misc = Component::new("misc");
    misc.add_command(waiting).unwrap();
    bot.add_component(misc.clone()).await.unwrap();

    let in_flight = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.handle_message(message("!slow")).await })
    };
    started_rx.recv().await.unwrap();

    // Mutate the tree while "slow" is suspended.
    assert!(bot.remove_component("misc").await.is_some());
    misc.add_command(Command::new("fresh", |_| async { Ok(()) }).unwrap())
        .unwrap();
    release.notify_one();

    let outcome = in_flight.await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Completed { ref command } if command == "slow"));
    assert!(matches!(
        bot.handle_message(message("!slow")).await,
        DispatchOutcome::NotFound { .. }
    ));
    assert!(matches!(
        bot.handle_message(message("!fresh")).await,
        DispatchOutcome::NotFound { .. }
    ));
}
