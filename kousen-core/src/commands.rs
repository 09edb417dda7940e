// File: kousen-core/src/commands.rs
//
// Command nodes and groups. A tree, not a DAG: containers hold `Arc`s, a
// child points back at its parent and component through `Weak`s.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, error};

use crate::Error;
use crate::checks::Check;
use crate::component::Component;
use crate::context::MessageContext;
use crate::errors::{CheckError, CommandError, KousenError};
use crate::getters::{ParserArg, ParserGetter, parser_getter};
use crate::hooks::{HookManager, HookPayload, HookScope, HookType, dispatch_hooks};
use crate::parsing::split_first_token;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]{1,32}$").unwrap());

const MAX_DESCRIPTION_LEN: usize = 100;

pub type CommandFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type CommandCallback = Arc<dyn Fn(Arc<MessageContext>) -> CommandFuture + Send + Sync>;

/// Name and alias index shared by groups and components. Both maps always
/// hold the same set of commands.
#[derive(Default)]
pub(crate) struct CommandMap {
    by_name: BTreeMap<String, Arc<Command>>,
    lookup: HashMap<String, Arc<Command>>,
}

impl CommandMap {
    /// Fails if any of the command's names is already taken by another
    /// command in this map.
    pub(crate) fn check_conflicts(&self, command: &Command, owner: &str) -> Result<(), Error> {
        for key in command.keys() {
            if let Some(existing) = self.lookup.get(key) {
                if !std::ptr::eq(existing.as_ref(), command) {
                    return Err(Error::NameConflict(format!(
                        "cannot add command '{}' to {}: '{}' is already used by '{}'",
                        command.name, owner, key, existing.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, command: Arc<Command>) {
        for key in command.keys() {
            self.lookup.insert(key.to_string(), command.clone());
        }
        self.by_name.insert(command.name.clone(), command);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<Command>> {
        let command = self.by_name.remove(name)?;
        self.lookup.retain(|_, c| !Arc::ptr_eq(c, &command));
        Some(command)
    }

    /// Removes `command` only if this map holds that exact node.
    pub(crate) fn remove_node(&mut self, command: &Arc<Command>) -> bool {
        if self.contains(command) {
            self.remove(&command.name);
            true
        } else {
            false
        }
    }

    pub(crate) fn contains(&self, command: &Arc<Command>) -> bool {
        self.by_name
            .get(&command.name)
            .is_some_and(|c| Arc::ptr_eq(c, command))
    }

    /// Exact match first. When case-insensitive, falls back to the first
    /// command in name order with a name or alias equal ignoring case.
    pub(crate) fn get(&self, key: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        if let Some(command) = self.lookup.get(key) {
            return Some(command.clone());
        }
        if !case_insensitive {
            return None;
        }
        let key = key.to_lowercase();
        self.by_name
            .values()
            .find(|c| c.keys().any(|k| k.to_lowercase() == key))
            .cloned()
    }

    pub(crate) fn values(&self) -> Vec<Arc<Command>> {
        self.by_name.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }
}

/// How an invocation that did not raise to the caller ended.
#[derive(Debug, Clone)]
pub enum InvokeOutcome {
    Succeeded,
    /// The command failed and a hook handled the error.
    ErrorHandled(Arc<KousenError>),
}

/// The node the dispatcher settled on after descending through groups.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub command: Arc<Command>,
    pub invoked_with: String,
    pub arguments: String,
}

/// A named, aliasable command. Groups additionally own child commands and
/// run their own callback when no child name follows.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    callback: CommandCallback,
    children: Option<RwLock<CommandMap>>,
    parent: RwLock<Weak<Command>>,
    component: RwLock<Weak<Component>>,
    custom_parser: RwLock<Option<ParserGetter>>,
    inherited_parser: RwLock<Option<ParserGetter>>,
    checks: RwLock<Vec<Arc<dyn Check>>>,
    hooks: HookManager,
}

impl Command {
    /// A leaf command with no aliases.
    pub fn new<F, Fut>(name: impl Into<String>, callback: F) -> Result<Arc<Self>, Error>
    where
        F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        CommandBuilder::new(name).build(callback)
    }

    /// A group with no aliases.
    pub fn group<F, Fut>(name: impl Into<String>, callback: F) -> Result<Arc<Self>, Error>
    where
        F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        CommandBuilder::new(name).build_group(callback)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Name followed by aliases.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_subcommand(&self) -> bool {
        self.parent().is_some()
    }

    pub fn parent(&self) -> Option<Arc<Command>> {
        self.parent.read().upgrade()
    }

    pub fn component(&self) -> Option<Arc<Component>> {
        self.component.read().upgrade()
    }

    /// Names from the root ancestor down to this command, space separated.
    pub fn full_name(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut current = self.parent();
        while let Some(parent) = current {
            names.push(parent.name.clone());
            current = parent.parent();
        }
        names.reverse();
        names.join(" ")
    }

    /// Child commands in name order. Empty for leaf commands.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.children
            .as_ref()
            .map(|c| c.read().values())
            .unwrap_or_default()
    }

    pub fn get_command(&self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        self.children
            .as_ref()
            .and_then(|c| c.read().get(name, case_insensitive))
    }

    pub fn add_check(&self, check: Arc<dyn Check>) -> &Self {
        self.checks.write().push(check);
        self
    }

    pub fn checks(&self) -> Vec<Arc<dyn Check>> {
        self.checks.read().clone()
    }

    /// Attach `child` to this group, moving it out of whatever group or
    /// component held it before. Nothing changes on error.
    pub fn add_command(self: &Arc<Self>, child: Arc<Command>) -> Result<(), Error> {
        let Some(children) = &self.children else {
            return Err(Error::Config(format!(
                "cannot add '{}' to '{}': it is not a group",
                child.name,
                self.full_name()
            )));
        };

        if Arc::ptr_eq(self, &child) || self.has_ancestor(&child) {
            return Err(Error::Config(format!(
                "cannot add '{}' to '{}': a command cannot contain itself",
                child.name,
                self.full_name()
            )));
        }

        {
            let mut map = children.write();
            if map.contains(&child) {
                return Ok(());
            }
            map.check_conflicts(&child, &format!("group '{}'", self.full_name()))?;
            map.insert(child.clone());
        }

        child.detach_from_owner();
        *child.parent.write() = Arc::downgrade(self);
        let component = self.component.read().clone();
        child.attach(&component, self.effective_parser());

        debug!("Added sub-command '{}'", child.full_name());
        Ok(())
    }

    /// Detach the child named `name`. Returns `None` when there is none.
    pub fn remove_command(&self, name: &str) -> Option<Arc<Command>> {
        let removed = self.children.as_ref()?.write().remove(name)?;
        *removed.parent.write() = Weak::new();
        removed.attach(&Weak::new(), None);
        debug!("Removed sub-command '{}' from '{}'", name, self.full_name());
        Some(removed)
    }

    /// Override the argument separator for this command and everything
    /// below it. `None` goes back to the inherited one.
    pub fn set_parser(&self, parser: Option<ParserArg>) -> Result<(), Error> {
        let getter = parser.map(parser_getter).transpose()?;
        *self.custom_parser.write() = getter;
        let effective = self.effective_parser();
        let component = self.component.read().clone();
        for child in self.commands() {
            child.attach(&component, effective.clone());
        }
        Ok(())
    }

    /// The local override, else whatever the owner propagated.
    pub fn effective_parser(&self) -> Option<ParserGetter> {
        self.custom_parser
            .read()
            .clone()
            .or_else(|| self.inherited_parser.read().clone())
    }

    fn has_ancestor(&self, candidate: &Arc<Command>) -> bool {
        let mut current = self.parent();
        while let Some(parent) = current {
            if Arc::ptr_eq(&parent, candidate) {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    /// Remove this node from its current parent group or component.
    pub(crate) fn detach_from_owner(self: &Arc<Self>) {
        if let Some(parent) = self.parent() {
            if let Some(children) = &parent.children {
                children.write().remove_node(self);
            }
            *self.parent.write() = Weak::new();
        } else if let Some(component) = self.component() {
            component.forget_command(self);
        }
    }

    /// Set the component and inherited parser here and on every descendant.
    pub(crate) fn attach(&self, component: &Weak<Component>, parser: Option<ParserGetter>) {
        *self.component.write() = component.clone();
        *self.inherited_parser.write() = parser;
        let effective = self.effective_parser();
        for child in self.commands() {
            child.attach(component, effective.clone());
        }
    }

    /// Walk down from this node, one token at a time, while the next token
    /// names a child.
    pub(crate) fn descend(
        self: &Arc<Self>,
        invoked_with: &str,
        rest: &str,
        case_insensitive: bool,
    ) -> ResolvedCommand {
        let mut command = self.clone();
        let mut invoked_with = invoked_with.to_string();
        let mut rest = rest;

        while command.is_group() {
            let (token, remainder) = split_first_token(rest);
            if token.is_empty() {
                break;
            }
            match command.get_command(token, case_insensitive) {
                Some(child) => {
                    command = child;
                    invoked_with = token.to_string();
                    rest = remainder;
                }
                None => break,
            }
        }

        ResolvedCommand {
            command,
            invoked_with,
            arguments: rest.trim_start().to_string(),
        }
    }

    /// Run hooks, checks and the callback for one invocation.
    ///
    /// `pre_invoke` fires first, `command_success` only on success and
    /// `post_invoke` last in every case. A failure is cascaded under
    /// `check_error` or `error`; it is returned only if no tier handled it.
    pub async fn invoke(
        self: &Arc<Self>,
        ctx: Arc<MessageContext>,
    ) -> Result<InvokeOutcome, Arc<KousenError>> {
        let component = self.component();
        let component_hooks = component.as_ref().map(|c| c.hooks());
        let bot_hooks = ctx.bot().hooks();
        let payload = HookPayload::Context(ctx.clone());

        // 1) pre_invoke
        dispatch_hooks(
            HookType::PreInvoke,
            &payload,
            bot_hooks,
            component_hooks,
            Some(&self.hooks),
        )
        .await;

        // 2) checks, then the callback
        let attempt = match self.run_checks(&ctx).await {
            Ok(()) => self.run_callback(&ctx).await,
            Err(e) => Err(e),
        };

        // 3) success or error hooks
        let result = match attempt {
            Ok(()) => {
                dispatch_hooks(
                    HookType::CommandSuccess,
                    &payload,
                    bot_hooks,
                    component_hooks,
                    Some(&self.hooks),
                )
                .await;
                Ok(InvokeOutcome::Succeeded)
            }
            Err(err) => {
                let hook_type = match &err {
                    KousenError::Check(_) => HookType::CheckError,
                    _ => HookType::Error,
                };
                let err = Arc::new(err);
                let handled = dispatch_hooks(
                    hook_type,
                    &HookPayload::Error(err.clone()),
                    bot_hooks,
                    component_hooks,
                    Some(&self.hooks),
                )
                .await;
                if handled {
                    debug!("'{}' error for '{}' was handled", hook_type, self.full_name());
                    Ok(InvokeOutcome::ErrorHandled(err))
                } else {
                    Err(err)
                }
            }
        };

        // 4) post_invoke
        dispatch_hooks(
            HookType::PostInvoke,
            &payload,
            bot_hooks,
            component_hooks,
            Some(&self.hooks),
        )
        .await;

        result
    }

    async fn run_checks(&self, ctx: &Arc<MessageContext>) -> Result<(), KousenError> {
        let checks = self.checks();
        for check in checks {
            let reason = match AssertUnwindSafe(check.check(ctx)).catch_unwind().await {
                Ok(Ok(true)) => continue,
                Ok(Ok(false)) => "check returned false".to_string(),
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => "check panicked".to_string(),
            };
            debug!(
                "Check '{}' failed for '{}': {}",
                check.name(),
                self.full_name(),
                reason
            );
            return Err(CheckError {
                context: ctx.clone(),
                check: check.name().to_string(),
                reason,
            }
            .into());
        }
        Ok(())
    }

    async fn run_callback(&self, ctx: &Arc<MessageContext>) -> Result<(), KousenError> {
        let fut = (self.callback)(ctx.clone());
        let raw_error = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => {
                error!("Command '{}' panicked", self.full_name());
                anyhow::anyhow!("command '{}' panicked", self.full_name())
            }
        };
        Err(CommandError {
            context: ctx.clone(),
            raw_error,
        }
        .into())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("full_name", &self.full_name())
            .field("aliases", &self.aliases)
            .field("group", &self.is_group())
            .field("children", &self.children.as_ref().map(|c| c.read().len()))
            .finish()
    }
}

/// Validating constructor for commands and groups.
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    parser: Option<ParserArg>,
    checks: Vec<Arc<dyn Check>>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            parser: None,
            checks: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parser(mut self, parser: impl Into<ParserArg>) -> Self {
        self.parser = Some(parser.into());
        self
    }

    pub fn check(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn build<F, Fut>(self, callback: F) -> Result<Arc<Command>, Error>
    where
        F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.finish(Arc::new(move |ctx| callback(ctx).boxed()), false)
    }

    /// Like [`build`](Self::build), but the command can own sub-commands.
    pub fn build_group<F, Fut>(self, callback: F) -> Result<Arc<Command>, Error>
    where
        F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.finish(Arc::new(move |ctx| callback(ctx).boxed()), true)
    }

    fn finish(self, callback: CommandCallback, is_group: bool) -> Result<Arc<Command>, Error> {
        validate_name(&self.name)?;
        for alias in &self.aliases {
            validate_name(alias)?;
        }
        let mut seen = vec![self.name.as_str()];
        for alias in &self.aliases {
            if seen.contains(&alias.as_str()) {
                return Err(Error::NameConflict(format!(
                    "command '{}' lists '{}' more than once",
                    self.name, alias
                )));
            }
            seen.push(alias);
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        let custom_parser = self.parser.map(parser_getter).transpose()?;

        Ok(Arc::new(Command {
            hooks: HookManager::new(HookScope::Command, self.name.clone()),
            name: self.name,
            aliases: self.aliases,
            description: self.description,
            callback,
            children: is_group.then(|| RwLock::new(CommandMap::default())),
            parent: RwLock::new(Weak::new()),
            component: RwLock::new(Weak::new()),
            custom_parser: RwLock::new(custom_parser),
            inherited_parser: RwLock::new(None),
            checks: RwLock::new(self.checks),
        }))
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "'{name}' must be 1 to 32 word characters or dashes"
        )))
    }
}

fn validate_description(description: &str) -> Result<(), Error> {
    let len = description.chars().count();
    if (1..=MAX_DESCRIPTION_LEN).contains(&len) {
        Ok(())
    } else {
        Err(Error::InvalidDescription(format!(
            "description must be 1 to {MAX_DESCRIPTION_LEN} characters, got {len}"
        )))
    }
}
