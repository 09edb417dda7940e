// File: kousen-core/src/bot.rs
//
// The bot: configuration getters, attached components, bot-level hooks and
// the per-message dispatcher.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::component::Component;
use crate::commands::InvokeOutcome;
use crate::context::{MessageContext, PartialContext};
use crate::errors::{CommandNotFound, KousenError};
use crate::getters::{
    BoolArg, BoolGetter, ParserArg, ParserGetter, PrefixArg, PrefixGetter, bool_getter,
    parser_getter, prefix_getter,
};
use crate::hooks::{HookManager, HookPayload, HookScope, HookType, dispatch_hooks};
use crate::modules::ModuleRegistry;
use crate::parsing::{match_prefix, sort_prefixes, split_first_token, strip_prefix};
use kousen_common::models::{CurrentUser, MessageEvent};
use kousen_common::traits::GatewayClient;

/// Why a message was dropped before any command matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NoContent,
    /// Ignore-bots is on and the author is a bot, system account or webhook.
    NotHuman,
    /// Neither static nor mention prefixes are available.
    NoPrefixes,
    NoPrefixMatch,
    /// Nothing but the prefix and whitespace.
    PrefixOnly,
    /// A getter callback failed; the message carries the cause.
    GetterFailed(String),
}

/// What `handle_message` did with one event.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    /// No component had a command for `name`. `handled` tells whether a
    /// bot-level error hook ran.
    NotFound { name: String, handled: bool },
    /// The command ran to completion.
    Completed { command: String },
    /// The command failed and a hook handled the error.
    ErrorHandled {
        command: String,
        error: Arc<KousenError>,
    },
    /// The command failed and no hook handled it. Already logged.
    Unhandled(Arc<KousenError>),
}

#[derive(Clone, Debug)]
struct BotSettings {
    prefix: Option<PrefixGetter>,
    default_parser: ParserGetter,
    case_insensitive_commands: BoolGetter,
    case_insensitive_prefixes: BoolGetter,
    ignore_bots: BoolGetter,
}

pub struct Bot {
    client: Arc<dyn GatewayClient>,
    settings: RwLock<BotSettings>,
    use_mention_prefix: bool,
    mention_prefixes: RwLock<Vec<String>>,
    components: RwLock<Vec<Arc<Component>>>,
    hooks: HookManager,
    owners: RwLock<Vec<u64>>,
    attributes: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    pub(crate) modules: tokio::sync::Mutex<ModuleRegistry>,
    weak_self: Weak<Bot>,
}

/// Builder for [`Bot`]. Defaults: whitespace parser, case-sensitive prefixes
/// and commands, bots ignored, mention prefixes only when no prefix is set.
pub struct BotBuilder {
    client: Arc<dyn GatewayClient>,
    prefix: Option<PrefixArg>,
    mention_prefix: Option<bool>,
    default_parser: ParserArg,
    case_insensitive_commands: BoolArg,
    case_insensitive_prefixes: BoolArg,
    ignore_bots: BoolArg,
    owners: Vec<u64>,
}

impl BotBuilder {
    pub fn new(client: Arc<dyn GatewayClient>) -> Self {
        Self {
            client,
            prefix: None,
            mention_prefix: None,
            default_parser: ParserArg::Literal(" ".to_string()),
            case_insensitive_commands: BoolArg::Literal(false),
            case_insensitive_prefixes: BoolArg::Literal(false),
            ignore_bots: BoolArg::Literal(true),
            owners: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<PrefixArg>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Whether `<@id>` mentions work as prefixes. Defaults to `true` only
    /// when no prefix is configured.
    pub fn mention_prefix(mut self, enabled: bool) -> Self {
        self.mention_prefix = Some(enabled);
        self
    }

    pub fn default_parser(mut self, parser: impl Into<ParserArg>) -> Self {
        self.default_parser = parser.into();
        self
    }

    pub fn case_insensitive_commands(mut self, value: impl Into<BoolArg>) -> Self {
        self.case_insensitive_commands = value.into();
        self
    }

    pub fn case_insensitive_prefixes(mut self, value: impl Into<BoolArg>) -> Self {
        self.case_insensitive_prefixes = value.into();
        self
    }

    pub fn ignore_bots(mut self, value: impl Into<BoolArg>) -> Self {
        self.ignore_bots = value.into();
        self
    }

    pub fn owner(mut self, user_id: u64) -> Self {
        self.owners.push(user_id);
        self
    }

    pub fn owners(mut self, user_ids: impl IntoIterator<Item = u64>) -> Self {
        self.owners.extend(user_ids);
        self
    }

    pub fn build(self) -> Result<Arc<Bot>, Error> {
        if self.prefix.is_none() && self.mention_prefix == Some(false) {
            return Err(Error::Config(
                "no prefix was provided and mention prefixes are disabled".to_string(),
            ));
        }
        let use_mention_prefix = self.mention_prefix.unwrap_or(self.prefix.is_none());

        let settings = BotSettings {
            prefix: self.prefix.map(prefix_getter),
            default_parser: parser_getter(self.default_parser)?,
            case_insensitive_commands: bool_getter(
                self.case_insensitive_commands,
                "case_insensitive_commands",
            ),
            case_insensitive_prefixes: bool_getter(
                self.case_insensitive_prefixes,
                "case_insensitive_prefixes",
            ),
            ignore_bots: bool_getter(self.ignore_bots, "ignore_bots"),
        };
        debug!("Building bot with settings: {:?}", settings);

        Ok(Arc::new_cyclic(|weak_self| Bot {
            client: self.client,
            settings: RwLock::new(settings),
            use_mention_prefix,
            mention_prefixes: RwLock::new(Vec::new()),
            components: RwLock::new(Vec::new()),
            hooks: HookManager::new(HookScope::Bot, "bot"),
            owners: RwLock::new(self.owners),
            attributes: RwLock::new(HashMap::new()),
            modules: tokio::sync::Mutex::new(ModuleRegistry::default()),
            weak_self: weak_self.clone(),
        }))
    }
}

impl Bot {
    pub fn builder(client: Arc<dyn GatewayClient>) -> BotBuilder {
        BotBuilder::new(client)
    }

    pub fn client(&self) -> &Arc<dyn GatewayClient> {
        &self.client
    }

    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    /// Replace the static prefixes. `None` is only allowed while mention
    /// prefixes are enabled.
    pub fn set_prefix(&self, prefix: Option<PrefixArg>) -> Result<(), Error> {
        if prefix.is_none() && !self.use_mention_prefix {
            return Err(Error::Config(
                "cannot remove the prefix while mention prefixes are disabled".to_string(),
            ));
        }
        self.settings.write().prefix = prefix.map(prefix_getter);
        Ok(())
    }

    pub fn set_case_insensitive_commands(&self, value: impl Into<BoolArg>) {
        self.settings.write().case_insensitive_commands =
            bool_getter(value.into(), "case_insensitive_commands");
    }

    pub fn set_case_insensitive_prefixes(&self, value: impl Into<BoolArg>) {
        self.settings.write().case_insensitive_prefixes =
            bool_getter(value.into(), "case_insensitive_prefixes");
    }

    pub fn set_ignore_bots(&self, value: impl Into<BoolArg>) {
        self.settings.write().ignore_bots = bool_getter(value.into(), "ignore_bots");
    }

    /// Replace the default separator and push it to every attached
    /// component. Component and command overrides keep precedence.
    pub fn set_default_parser(&self, parser: impl Into<ParserArg>) -> Result<(), Error> {
        let getter = parser_getter(parser.into())?;
        self.settings.write().default_parser = getter.clone();
        for component in self.components() {
            component.set_global_parser(Some(getter.clone()));
        }
        Ok(())
    }

    pub fn default_parser(&self) -> ParserGetter {
        self.settings.read().default_parser.clone()
    }

    pub fn uses_mention_prefix(&self) -> bool {
        self.use_mention_prefix
    }

    pub fn mention_prefixes(&self) -> Vec<String> {
        self.mention_prefixes.read().clone()
    }

    /// Record the bot's identity. Ignored when mention prefixes are off.
    pub fn set_mention_prefixes(&self, me: &CurrentUser) {
        if !self.use_mention_prefix {
            return;
        }
        let prefixes = me.mention_prefixes();
        info!("Mention prefixes set to {:?}", prefixes);
        *self.mention_prefixes.write() = prefixes;
    }

    /// Fetch the bot's own user from the gateway and derive the mention
    /// prefixes from it.
    pub async fn setup_mention_prefixes(&self) -> Result<(), Error> {
        if !self.use_mention_prefix {
            return Ok(());
        }
        let me = self.client.fetch_my_user().await?;
        self.set_mention_prefixes(&me);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Owners and custom attributes
    // ---------------------------------------------------------------

    pub fn owners(&self) -> Vec<u64> {
        self.owners.read().clone()
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owners.read().contains(&user_id)
    }

    pub fn add_owner(&self, user_id: u64) {
        let mut owners = self.owners.write();
        if !owners.contains(&user_id) {
            owners.push(user_id);
        }
    }

    /// Attach shared state to the bot under `name`.
    pub fn add_custom_attribute<T>(&self, name: impl Into<String>, value: T) -> Result<&Self, Error>
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        let mut attributes = self.attributes.write();
        if attributes.contains_key(&name) {
            return Err(Error::Config(format!(
                "custom attribute '{name}' already exists, use edit_custom_attribute"
            )));
        }
        attributes.insert(name, Arc::new(value));
        Ok(self)
    }

    pub fn edit_custom_attribute<T>(&self, name: &str, value: T) -> Result<&Self, Error>
    where
        T: Any + Send + Sync,
    {
        let mut attributes = self.attributes.write();
        match attributes.get_mut(name) {
            Some(slot) => {
                *slot = Arc::new(value);
                Ok(self)
            }
            None => Err(Error::Config(format!(
                "custom attribute '{name}' does not exist"
            ))),
        }
    }

    pub fn delete_custom_attribute(&self, name: &str) -> Result<&Self, Error> {
        self.attributes
            .write()
            .remove(name)
            .map(|_| self)
            .ok_or_else(|| Error::Config(format!("custom attribute '{name}' does not exist")))
    }

    /// `None` if the attribute is missing or holds a different type.
    pub fn custom_attribute<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.attributes.read().get(name)?.clone();
        value.downcast::<T>().ok()
    }

    // ---------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------

    /// Attached components in registration order.
    pub fn components(&self) -> Vec<Arc<Component>> {
        self.components.read().clone()
    }

    pub fn get_component(&self, name: &str) -> Option<Arc<Component>> {
        self.components
            .read()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Attach `component` and fire `component_added`. Attaching the same
    /// component twice does nothing.
    pub async fn add_component(self: &Arc<Self>, component: Arc<Component>) -> Result<(), Error> {
        {
            let mut components = self.components.write();
            if components.iter().any(|c| Arc::ptr_eq(c, &component)) {
                debug!("Component '{}' is already attached", component.name());
                return Ok(());
            }
            if components.iter().any(|c| c.name() == component.name()) {
                return Err(Error::NameConflict(format!(
                    "a component named '{}' is already attached",
                    component.name()
                )));
            }
            if let Some(other) = component.bot() {
                if !Arc::ptr_eq(&other, self) {
                    return Err(Error::Config(format!(
                        "component '{}' is attached to another bot",
                        component.name()
                    )));
                }
            }
            components.push(component.clone());
        }

        component.set_bot(Arc::downgrade(self));
        component.set_global_parser(Some(self.default_parser()));
        info!("Added component '{}'", component.name());

        let payload = HookPayload::Component {
            bot: self.clone(),
            component: component.clone(),
        };
        dispatch_hooks(
            HookType::ComponentAdded,
            &payload,
            &self.hooks,
            Some(component.hooks()),
            None,
        )
        .await;
        Ok(())
    }

    /// Detach the component named `name` and fire `component_removed`.
    /// Returns `None`, firing nothing, if it is not attached.
    pub async fn remove_component(self: &Arc<Self>, name: &str) -> Option<Arc<Component>> {
        let component = {
            let mut components = self.components.write();
            let idx = components.iter().position(|c| c.name() == name)?;
            components.remove(idx)
        };

        component.set_bot(Weak::new());
        component.set_global_parser(None);
        info!("Removed component '{}'", name);

        let payload = HookPayload::Component {
            bot: self.clone(),
            component: component.clone(),
        };
        dispatch_hooks(
            HookType::ComponentRemoved,
            &payload,
            &self.hooks,
            Some(component.hooks()),
            None,
        )
        .await;
        Some(component)
    }

    /// Put back an exact component list without firing hooks. Used to roll
    /// back failed module transactions.
    pub(crate) fn restore_components(&self, snapshot: Vec<Arc<Component>>) {
        let parser = self.default_parser();
        let previous = std::mem::replace(&mut *self.components.write(), snapshot.clone());
        for component in previous {
            if !snapshot.iter().any(|c| Arc::ptr_eq(c, &component)) {
                component.set_bot(Weak::new());
                component.set_global_parser(None);
            }
        }
        for component in &snapshot {
            component.set_bot(self.weak_self.clone());
            component.set_global_parser(Some(parser.clone()));
        }
    }

    // ---------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------

    /// Consume events until the sender side closes, one task per event.
    pub async fn run(self: Arc<Self>, mut rx: UnboundedReceiver<MessageEvent>) {
        info!("Bot event loop started");
        while let Some(event) = rx.recv().await {
            let bot = self.clone();
            tokio::spawn(async move {
                let outcome = bot.handle_message(event).await;
                debug!("Dispatch outcome: {:?}", outcome);
            });
        }
        info!("Bot event loop ended; the event channel closed");
    }

    /// Resolve and invoke the command addressed by `event`, if any.
    pub async fn handle_message(self: &Arc<Self>, event: MessageEvent) -> DispatchOutcome {
        let event = Arc::new(event);

        // 1) text content
        let Some(content) = event.content.as_deref() else {
            return DispatchOutcome::Ignored(IgnoreReason::NoContent);
        };

        let partial = PartialContext::new(self.clone(), event.clone());
        let settings = self.settings.read().clone();

        // 2) ignore bots
        let ignore_bots = match settings.ignore_bots.resolve(&partial).await {
            Ok(v) => v,
            Err(e) => return getter_failed(e),
        };
        if ignore_bots && !event.is_human() {
            return DispatchOutcome::Ignored(IgnoreReason::NotHuman);
        }

        // 3) static prefixes plus mention prefixes
        let mut prefixes = match &settings.prefix {
            Some(getter) => match getter.resolve(&partial).await {
                Ok(p) => p,
                Err(e) => return getter_failed(e),
            },
            None => Vec::new(),
        };
        prefixes.extend(self.mention_prefixes());
        if prefixes.is_empty() {
            return DispatchOutcome::Ignored(IgnoreReason::NoPrefixes);
        }

        // 4) longest first
        sort_prefixes(&mut prefixes);

        // 5) first match wins
        let case_insensitive_prefixes = match settings.case_insensitive_prefixes.resolve(&partial).await {
            Ok(v) => v,
            Err(e) => return getter_failed(e),
        };
        let content = content.trim_start();
        let Some(prefix) = match_prefix(content, &prefixes, case_insensitive_prefixes) else {
            return DispatchOutcome::Ignored(IgnoreReason::NoPrefixMatch);
        };
        let prefix = prefix.to_string();

        // 6) strip
        let rest = strip_prefix(content, &prefix, case_insensitive_prefixes)
            .unwrap_or_default()
            .trim_start();
        if rest.is_empty() {
            return DispatchOutcome::Ignored(IgnoreReason::PrefixOnly);
        }

        // 7) + 8) name lookup per component, then descent through groups
        let case_insensitive_commands = match settings.case_insensitive_commands.resolve(&partial).await {
            Ok(v) => v,
            Err(e) => return getter_failed(e),
        };
        // An empty prefix leaves the command name as the thing being matched,
        // so the prefix flag folds its case too.
        let fold_names = case_insensitive_commands || (prefix.is_empty() && case_insensitive_prefixes);
        let resolved = self
            .components()
            .iter()
            .find_map(|c| c.resolve(rest, fold_names));

        // 9) not found
        let Some(resolved) = resolved else {
            let (name, _) = split_first_token(rest);
            let name = name.to_string();
            let err = Arc::new(KousenError::from(CommandNotFound {
                bot: self.clone(),
                event: event.clone(),
                prefix,
                name: name.clone(),
            }));
            let handled = self
                .hooks
                .dispatch(HookType::Error, &HookPayload::Error(err.clone()))
                .await;
            if !handled {
                warn!("{}", err);
            }
            return DispatchOutcome::NotFound { name, handled };
        };

        // 10) build the context and invoke
        let parser_getter = resolved
            .command
            .effective_parser()
            .unwrap_or(settings.default_parser);
        let parser = match parser_getter.resolve(&partial).await {
            Ok(p) => p,
            Err(e) => return getter_failed(e),
        };

        let command = resolved.command;
        let full_name = command.full_name();
        debug!(
            "Invoking '{}' (prefix '{}', invoked with '{}')",
            full_name, prefix, resolved.invoked_with
        );
        let ctx = Arc::new(MessageContext::new(
            partial,
            prefix,
            resolved.invoked_with,
            parser,
            command.clone(),
            resolved.arguments,
        ));

        match command.invoke(ctx).await {
            Ok(InvokeOutcome::Succeeded) => DispatchOutcome::Completed { command: full_name },
            Ok(InvokeOutcome::ErrorHandled(error)) => DispatchOutcome::ErrorHandled {
                command: full_name,
                error,
            },
            Err(err) => {
                error!("Unhandled error in command '{}': {}", full_name, err);
                DispatchOutcome::Unhandled(err)
            }
        }
    }
}

fn getter_failed(e: Error) -> DispatchOutcome {
    error!("Dropping message: {}", e);
    DispatchOutcome::Ignored(IgnoreReason::GetterFailed(e.to_string()))
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components: Vec<String> = self
            .components
            .read()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        f.debug_struct("Bot")
            .field("components", &components)
            .field("mention_prefixes", &*self.mention_prefixes.read())
            .field("owners", &*self.owners.read())
            .finish()
    }
}
