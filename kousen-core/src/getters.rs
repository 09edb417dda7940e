// File: kousen-core/src/getters.rs
//
// Normalizes raw configuration values (literal, list or callback) into
// resolvers with one async shape: `resolve(&PartialContext) -> T`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::Error;
use crate::context::PartialContext;

pub type GetterFuture<T> = BoxFuture<'static, anyhow::Result<T>>;
pub type GetterCallback<T> = Arc<dyn Fn(PartialContext) -> GetterFuture<T> + Send + Sync>;

fn boxed_callback<T, F, Fut>(f: F) -> GetterCallback<T>
where
    T: 'static,
    F: Fn(PartialContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// What a prefix callback may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixValue {
    One(String),
    Many(Vec<String>),
}

impl PrefixValue {
    fn into_prefixes(self) -> Vec<String> {
        match self {
            PrefixValue::One(p) => vec![p.trim_start().to_string()],
            PrefixValue::Many(ps) => ps.into_iter().map(|p| p.trim_start().to_string()).collect(),
        }
    }
}

/// Raw prefix configuration.
#[derive(Clone)]
pub enum PrefixArg {
    Single(String),
    Many(Vec<String>),
    Callback(GetterCallback<PrefixValue>),
}

impl PrefixArg {
    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn(PartialContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PrefixValue>> + Send + 'static,
    {
        PrefixArg::Callback(boxed_callback(f))
    }
}

impl From<&str> for PrefixArg {
    fn from(p: &str) -> Self {
        PrefixArg::Single(p.to_string())
    }
}

impl From<String> for PrefixArg {
    fn from(p: String) -> Self {
        PrefixArg::Single(p)
    }
}

impl From<Vec<String>> for PrefixArg {
    fn from(ps: Vec<String>) -> Self {
        PrefixArg::Many(ps)
    }
}

impl From<Vec<&str>> for PrefixArg {
    fn from(ps: Vec<&str>) -> Self {
        PrefixArg::Many(ps.into_iter().map(str::to_string).collect())
    }
}

/// Prefixes read from a config file must be a string or a list of strings.
impl TryFrom<Value> for PrefixArg {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(p) => Ok(PrefixArg::Single(p)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(p) => Ok(p),
                    other => Err(Error::Config(format!(
                        "prefix list entries must be strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PrefixArg::Many),
            other => Err(Error::Config(format!(
                "prefix must be a string or a list of strings, got {other}"
            ))),
        }
    }
}

impl fmt::Debug for PrefixArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixArg::Single(p) => f.debug_tuple("Single").field(p).finish(),
            PrefixArg::Many(ps) => f.debug_tuple("Many").field(ps).finish(),
            PrefixArg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Raw boolean configuration (case flags, ignore-bots).
#[derive(Clone)]
pub enum BoolArg {
    Literal(bool),
    Callback(GetterCallback<bool>),
}

impl BoolArg {
    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn(PartialContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        BoolArg::Callback(boxed_callback(f))
    }
}

impl From<bool> for BoolArg {
    fn from(b: bool) -> Self {
        BoolArg::Literal(b)
    }
}

/// Raw argument-separator configuration.
#[derive(Clone)]
pub enum ParserArg {
    Literal(String),
    Callback(GetterCallback<String>),
}

impl ParserArg {
    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn(PartialContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        ParserArg::Callback(boxed_callback(f))
    }
}

impl From<&str> for ParserArg {
    fn from(p: &str) -> Self {
        ParserArg::Literal(p.to_string())
    }
}

impl From<String> for ParserArg {
    fn from(p: String) -> Self {
        ParserArg::Literal(p)
    }
}

#[derive(Clone)]
enum GetterKind<T> {
    Fixed(T),
    Callback(GetterCallback<T>),
}

/// A resolved configuration value.
#[derive(Clone)]
pub struct Getter<T> {
    name: &'static str,
    kind: GetterKind<T>,
}

pub type PrefixGetter = Getter<Vec<String>>;
pub type BoolGetter = Getter<bool>;
pub type ParserGetter = Getter<String>;

impl<T: Clone> Getter<T> {
    pub fn fixed(name: &'static str, value: T) -> Self {
        Self {
            name,
            kind: GetterKind::Fixed(value),
        }
    }

    fn callback(name: &'static str, f: GetterCallback<T>) -> Self {
        Self {
            name,
            kind: GetterKind::Callback(f),
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.kind, GetterKind::Callback(_))
    }

    /// The literal value, when this getter is not backed by a callback.
    pub fn fixed_value(&self) -> Option<&T> {
        match &self.kind {
            GetterKind::Fixed(v) => Some(v),
            GetterKind::Callback(_) => None,
        }
    }

    /// Produce the value for one event. A failing callback is reported as a
    /// getter contract violation.
    pub async fn resolve(&self, ctx: &PartialContext) -> Result<T, Error> {
        match &self.kind {
            GetterKind::Fixed(v) => Ok(v.clone()),
            GetterKind::Callback(f) => f(ctx.clone()).await.map_err(|e| {
                Error::GetterContract(format!("{} getter callback failed: {:#}", self.name, e))
            }),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GetterKind::Fixed(v) => write!(f, "Getter({}: {:?})", self.name, v),
            GetterKind::Callback(_) => write!(f, "Getter({}: <callback>)", self.name),
        }
    }
}

/// Prefixes are left-trimmed, both literal ones and those a callback returns.
pub fn prefix_getter(arg: PrefixArg) -> PrefixGetter {
    match arg {
        PrefixArg::Single(p) => Getter::fixed("prefix", PrefixValue::One(p).into_prefixes()),
        PrefixArg::Many(ps) => Getter::fixed("prefix", PrefixValue::Many(ps).into_prefixes()),
        PrefixArg::Callback(f) => Getter::callback(
            "prefix",
            Arc::new(move |ctx| {
                let fut = f(ctx);
                async move { fut.await.map(PrefixValue::into_prefixes) }.boxed()
            }),
        ),
    }
}

pub fn bool_getter(arg: BoolArg, name: &'static str) -> BoolGetter {
    match arg {
        BoolArg::Literal(b) => Getter::fixed(name, b),
        BoolArg::Callback(f) => Getter::callback(name, f),
    }
}

/// An empty separator is refused here, and a callback that returns one fails
/// at resolution.
pub fn parser_getter(arg: ParserArg) -> Result<ParserGetter, Error> {
    match arg {
        ParserArg::Literal(p) if p.is_empty() => Err(Error::Config(
            "the argument parser separator cannot be empty".to_string(),
        )),
        ParserArg::Literal(p) => Ok(Getter::fixed("parser", p)),
        ParserArg::Callback(f) => Ok(Getter::callback(
            "parser",
            Arc::new(move |ctx| {
                let fut = f(ctx);
                async move {
                    let separator = fut.await?;
                    if separator.is_empty() {
                        anyhow::bail!("returned an empty separator");
                    }
                    Ok(separator)
                }
                .boxed()
            }),
        )),
    }
}
