// File: kousen-core/src/component.rs
//
// A component groups the top-level commands of one plugin together with its
// own hooks. It exists standalone and is attached to a bot later.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::Error;
use crate::bot::Bot;
use crate::commands::{Command, CommandMap, ResolvedCommand};
use crate::getters::{ParserArg, ParserGetter, parser_getter};
use crate::hooks::{HookManager, HookScope};
use crate::parsing::split_first_token;

pub struct Component {
    name: String,
    commands: RwLock<CommandMap>,
    hooks: HookManager,
    bot: RwLock<Weak<Bot>>,
    custom_parser: RwLock<Option<ParserGetter>>,
    global_parser: RwLock<Option<ParserGetter>>,
    weak_self: Weak<Component>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak_self| Component {
            hooks: HookManager::new(HookScope::Component, name.clone()),
            name,
            commands: RwLock::new(CommandMap::default()),
            bot: RwLock::new(Weak::new()),
            custom_parser: RwLock::new(None),
            global_parser: RwLock::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// A component whose commands split arguments on `parser` instead of the
    /// bot's default.
    pub fn with_parser(name: impl Into<String>, parser: impl Into<ParserArg>) -> Result<Arc<Self>, Error> {
        let component = Self::new(name);
        component.set_parser(Some(parser.into()))?;
        Ok(component)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    /// The bot this component is attached to, if any.
    pub fn bot(&self) -> Option<Arc<Bot>> {
        self.bot.read().upgrade()
    }

    pub(crate) fn set_bot(&self, bot: Weak<Bot>) {
        *self.bot.write() = bot;
    }

    /// Top-level commands in name order.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.commands.read().values()
    }

    pub fn get_command(&self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        self.commands.read().get(name, case_insensitive)
    }

    /// Add a top-level command, moving it out of any group or component
    /// that held it. Fails without changes on a name or alias clash.
    pub fn add_command(&self, command: Arc<Command>) -> Result<&Self, Error> {
        {
            let mut map = self.commands.write();
            if map.contains(&command) {
                return Ok(self);
            }
            map.check_conflicts(&command, &format!("component '{}'", self.name))?;
            map.insert(command.clone());
        }

        command.detach_from_owner();
        command.attach(&self.weak_self, self.effective_parser());

        debug!("Added command '{}' to component '{}'", command.name(), self.name);
        Ok(self)
    }

    pub fn remove_command(&self, name: &str) -> Option<Arc<Command>> {
        let removed = self.commands.write().remove(name)?;
        removed.attach(&Weak::new(), None);
        debug!("Removed command '{}' from component '{}'", name, self.name);
        Some(removed)
    }

    /// Drop `command` from the top-level map if it is there. Used when the
    /// command moves elsewhere.
    pub(crate) fn forget_command(&self, command: &Arc<Command>) {
        self.commands.write().remove_node(command);
    }

    /// Override the separator for this component's commands. `None` falls
    /// back to the bot's default.
    pub fn set_parser(&self, parser: Option<ParserArg>) -> Result<(), Error> {
        let getter = parser.map(parser_getter).transpose()?;
        *self.custom_parser.write() = getter;
        self.propagate_parser();
        Ok(())
    }

    /// Called by the bot when it is attached or its default parser changes.
    pub(crate) fn set_global_parser(&self, parser: Option<ParserGetter>) {
        *self.global_parser.write() = parser;
        self.propagate_parser();
    }

    pub fn effective_parser(&self) -> Option<ParserGetter> {
        self.custom_parser
            .read()
            .clone()
            .or_else(|| self.global_parser.read().clone())
    }

    fn propagate_parser(&self) {
        let parser = self.effective_parser();
        for command in self.commands() {
            command.attach(&self.weak_self, parser.clone());
        }
    }

    /// Look up the first token of `content` and descend through groups.
    pub fn resolve(&self, content: &str, case_insensitive: bool) -> Option<ResolvedCommand> {
        let (name, rest) = split_first_token(content);
        if name.is_empty() {
            return None;
        }
        let command = self.get_command(name, case_insensitive)?;
        Some(command.descend(name, rest, case_insensitive))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("commands", &self.commands.read().len())
            .field("attached", &self.bot().is_some())
            .finish()
    }
}
