// File: kousen-core/src/hooks.rs
//
// Hook registries owned by the bot, each component and each command, plus the
// command -> component -> bot cascade used by the dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::Error;
use crate::bot::Bot;
use crate::component::Component;
use crate::context::MessageContext;
use crate::errors::KousenError;

/// Every hook type the dispatcher fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookType {
    /// Any command handling error other than checks, e.g. a failing callback
    /// or an unknown command name. Payload: the error.
    Error,
    /// A command check rejected the invocation. Payload: the error.
    CheckError,
    /// Before invocation, regardless of checks. Payload: the context.
    PreInvoke,
    /// After invocation, regardless of errors. Payload: the context.
    PostInvoke,
    /// The command callback completed without error. Payload: the context.
    CommandSuccess,
    /// A component was attached to the bot. Payload: bot and component.
    ComponentAdded,
    /// A component was detached from the bot. Payload: bot and component.
    ComponentRemoved,
}

impl HookType {
    pub const ALL: [HookType; 7] = [
        HookType::Error,
        HookType::CheckError,
        HookType::PreInvoke,
        HookType::PostInvoke,
        HookType::CommandSuccess,
        HookType::ComponentAdded,
        HookType::ComponentRemoved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Error => "error",
            HookType::CheckError => "check_error",
            HookType::PreInvoke => "pre_invoke",
            HookType::PostInvoke => "post_invoke",
            HookType::CommandSuccess => "command_success",
            HookType::ComponentAdded => "component_added",
            HookType::ComponentRemoved => "component_removed",
        }
    }

    /// Component lifecycle hooks cannot be registered on a command.
    pub fn is_component_scoped(&self) -> bool {
        matches!(self, HookType::ComponentAdded | HookType::ComponentRemoved)
    }

    /// The payload shape dispatch passes for this type.
    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            HookType::Error | HookType::CheckError => PayloadKind::Error,
            HookType::PreInvoke | HookType::PostInvoke | HookType::CommandSuccess => {
                PayloadKind::Context
            }
            HookType::ComponentAdded | HookType::ComponentRemoved => PayloadKind::Component,
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("'{s}' is not a valid hook type")))
    }
}

/// Which kind of object owns a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookScope {
    Bot,
    Component,
    Command,
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Bot => write!(f, "bot"),
            HookScope::Component => write!(f, "component"),
            HookScope::Command => write!(f, "command"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// One value: the error.
    Error,
    /// One value: the invocation context.
    Context,
    /// Two values: the bot and the component.
    Component,
}

/// The values handed to hook callbacks, one variant per payload shape.
#[derive(Clone)]
pub enum HookPayload {
    Error(Arc<KousenError>),
    Context(Arc<MessageContext>),
    Component {
        bot: Arc<Bot>,
        component: Arc<Component>,
    },
}

impl HookPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            HookPayload::Error(_) => PayloadKind::Error,
            HookPayload::Context(_) => PayloadKind::Context,
            HookPayload::Component { .. } => PayloadKind::Component,
        }
    }
}

pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

type ErrorHookFn = dyn Fn(Arc<KousenError>) -> HookFuture + Send + Sync;
type ContextHookFn = dyn Fn(Arc<MessageContext>) -> HookFuture + Send + Sync;
type ComponentHookFn = dyn Fn(Arc<Bot>, Arc<Component>) -> HookFuture + Send + Sync;

/// A user callback. The variant fixes how many values it takes, which is
/// checked against the hook type at registration.
#[derive(Clone)]
pub enum HookCallback {
    Error(Arc<ErrorHookFn>),
    Context(Arc<ContextHookFn>),
    Component(Arc<ComponentHookFn>),
}

impl HookCallback {
    pub fn error<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<KousenError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        HookCallback::Error(Arc::new(move |err| f(err).boxed()))
    }

    pub fn context<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<MessageContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        HookCallback::Context(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn component<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Bot>, Arc<Component>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        HookCallback::Component(Arc::new(move |bot, component| f(bot, component).boxed()))
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            HookCallback::Error(_) => PayloadKind::Error,
            HookCallback::Context(_) => PayloadKind::Context,
            HookCallback::Component(_) => PayloadKind::Component,
        }
    }

    fn call(&self, payload: &HookPayload) -> Option<HookFuture> {
        match (self, payload) {
            (HookCallback::Error(f), HookPayload::Error(err)) => Some(f(err.clone())),
            (HookCallback::Context(f), HookPayload::Context(ctx)) => Some(f(ctx.clone())),
            (HookCallback::Component(f), HookPayload::Component { bot, component }) => {
                Some(f(bot.clone(), component.clone()))
            }
            _ => None,
        }
    }
}

/// A named callback registered for one hook type.
pub struct Hook {
    pub name: String,
    pub hook_type: HookType,
    callback: HookCallback,
}

#[derive(Default)]
struct HookTable {
    by_type: HashMap<HookType, Vec<Arc<Hook>>>,
    by_name: HashMap<String, Arc<Hook>>,
}

/// Registry of hooks for one bot, component or command.
///
/// Registration mistakes are logged and ignored so that a bad hook never
/// aborts startup.
pub struct HookManager {
    scope: HookScope,
    owner: String,
    table: RwLock<HookTable>,
}

impl HookManager {
    pub fn new(scope: HookScope, owner: impl Into<String>) -> Self {
        Self {
            scope,
            owner: owner.into(),
            table: RwLock::new(HookTable::default()),
        }
    }

    pub fn scope(&self) -> HookScope {
        self.scope
    }

    /// Register `callback` under `name` for `hook_type`. Callbacks of one type
    /// run in registration order.
    pub fn add_hook_callback(
        &self,
        hook_type: HookType,
        name: impl Into<String>,
        callback: HookCallback,
    ) -> &Self {
        let name = name.into();
        let prefix = format!(
            "Failed to add hook callback '{}' to {} '{}' as",
            name, self.scope, self.owner
        );

        if self.scope == HookScope::Command && hook_type.is_component_scoped() {
            error!("{prefix} '{hook_type}' hooks cannot be used on commands.");
            return self;
        }

        if callback.kind() != hook_type.payload_kind() {
            error!(
                "{prefix} '{hook_type}' passes a {:?} payload but the callback takes {:?}.",
                hook_type.payload_kind(),
                callback.kind()
            );
            return self;
        }

        let mut table = self.table.write();
        if table.by_name.contains_key(&name) {
            error!("{prefix} there is already a hook named '{name}'.");
            return self;
        }

        let hook = Arc::new(Hook {
            name: name.clone(),
            hook_type,
            callback,
        });
        table.by_name.insert(name.clone(), hook.clone());
        table.by_type.entry(hook_type).or_default().push(hook);

        debug!(
            "Added '{}' hook callback '{}' to {} '{}'.",
            hook_type, name, self.scope, self.owner
        );
        self
    }

    /// Same as [`add_hook_callback`](Self::add_hook_callback), parsing the type
    /// from its name. Unknown names are logged and ignored.
    pub fn add_hook_callback_named(
        &self,
        hook_type: &str,
        name: impl Into<String>,
        callback: HookCallback,
    ) -> &Self {
        match hook_type.parse::<HookType>() {
            Ok(t) => self.add_hook_callback(t, name, callback),
            Err(e) => {
                error!(
                    "Failed to add hook callback '{}' to {} '{}': {}",
                    name.into(),
                    self.scope,
                    self.owner,
                    e
                );
                self
            }
        }
    }

    pub fn remove_hook(&self, name: &str) -> &Self {
        let mut table = self.table.write();
        let Some(hook) = table.by_name.remove(name) else {
            debug!(
                "Failed to remove the hook '{}' from {} '{}': not registered.",
                name, self.scope, self.owner
            );
            return self;
        };

        if let Some(list) = table.by_type.get_mut(&hook.hook_type) {
            list.retain(|h| !Arc::ptr_eq(h, &hook));
            if list.is_empty() {
                table.by_type.remove(&hook.hook_type);
            }
        }
        debug!("Removed hook '{}' from {} '{}'.", name, self.scope, self.owner);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().by_name.contains_key(name)
    }

    /// Number of callbacks registered for `hook_type`.
    pub fn count(&self, hook_type: HookType) -> usize {
        self.table
            .read()
            .by_type
            .get(&hook_type)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().by_name.is_empty()
    }

    /// Run every callback for `hook_type`, in order.
    ///
    /// Returns `false` when nothing is registered. Otherwise returns `true`,
    /// even if every callback failed; failures are logged and do not stop the
    /// remaining callbacks.
    pub async fn dispatch(&self, hook_type: HookType, payload: &HookPayload) -> bool {
        let hooks = {
            let table = self.table.read();
            match table.by_type.get(&hook_type) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => return false,
            }
        };

        for hook in hooks {
            let Some(fut) = hook.callback.call(payload) else {
                error!(
                    "The {} hook '{}' on {} '{}' was dispatched with a {:?} payload.",
                    hook_type,
                    hook.name,
                    self.scope,
                    self.owner,
                    payload.kind()
                );
                continue;
            };

            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    "The {} hook callable '{}' on {} '{}' raised: {:#}",
                    hook_type, hook.name, self.scope, self.owner, e
                ),
                Err(_) => error!(
                    "The {} hook callable '{}' on {} '{}' panicked.",
                    hook_type, hook.name, self.scope, self.owner
                ),
            }
        }
        true
    }
}

/// Dispatch `hook_type` at command scope, then component scope, then bot
/// scope, stopping at the first registry that handled it.
///
/// Returns `false` when no tier had a callback for the type.
pub async fn dispatch_hooks(
    hook_type: HookType,
    payload: &HookPayload,
    bot_hooks: &HookManager,
    component_hooks: Option<&HookManager>,
    command_hooks: Option<&HookManager>,
) -> bool {
    if let Some(hooks) = command_hooks {
        if hooks.dispatch(hook_type, payload).await {
            return true;
        }
    }
    if let Some(hooks) = component_hooks {
        if hooks.dispatch(hook_type, payload).await {
            return true;
        }
    }
    let handled = bot_hooks.dispatch(hook_type, payload).await;
    debug!("Dispatched '{}' hooks, handled={}", hook_type, handled);
    handled
}
