// File: kousen-core/src/modules.rs
//
// Modules bundle components (and anything else) behind load/unload entry
// points. Loading, unloading and reloading are transactions: the attached
// component list is snapshotted first and put back if the module fails.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{error, info};

use crate::Error;
use crate::bot::Bot;

#[async_trait]
pub trait Module: Send + Sync {
    /// Unique among the bot's loaded modules.
    fn name(&self) -> &str;

    async fn load(&self, bot: &Arc<Bot>) -> anyhow::Result<()>;

    async fn unload(&self, bot: &Arc<Bot>) -> anyhow::Result<()>;
}

#[derive(Default)]
pub(crate) struct ModuleRegistry {
    loaded: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    fn position(&self, name: &str) -> Option<usize> {
        self.loaded.iter().position(|m| m.name() == name)
    }
}

enum Step {
    Load,
    Unload,
}

impl Bot {
    /// Names of loaded modules, in load order.
    pub async fn loaded_modules(&self) -> Vec<String> {
        let registry = self.modules.lock().await;
        registry.loaded.iter().map(|m| m.name().to_string()).collect()
    }

    /// Load `module`. Nothing is left attached if it fails.
    ///
    /// The module must not load or unload other modules from inside its own
    /// entry points; transactions are serialized.
    pub async fn load_module(self: &Arc<Self>, module: Arc<dyn Module>) -> Result<(), Error> {
        let mut registry = self.modules.lock().await;
        if registry.position(module.name()).is_some() {
            return Err(Error::Module(format!(
                "module '{}' is already loaded",
                module.name()
            )));
        }

        let snapshot = self.components();
        if let Err(e) = self.run_step(&module, Step::Load).await {
            self.restore_components(snapshot);
            return Err(e);
        }

        registry.loaded.push(module.clone());
        info!("Loaded module '{}'", module.name());
        Ok(())
    }

    /// Unload the module named `name`. If unloading fails the module stays
    /// loaded with its components attached.
    pub async fn unload_module(self: &Arc<Self>, name: &str) -> Result<(), Error> {
        let mut registry = self.modules.lock().await;
        let Some(idx) = registry.position(name) else {
            return Err(Error::Module(format!("module '{name}' is not loaded")));
        };
        let module = registry.loaded[idx].clone();

        let snapshot = self.components();
        if let Err(e) = self.run_step(&module, Step::Unload).await {
            self.restore_components(snapshot);
            return Err(e);
        }

        registry.loaded.remove(idx);
        info!("Unloaded module '{}'", name);
        Ok(())
    }

    /// Unload then load the module named `name`. On any failure the
    /// components and module list go back to how they were before the call.
    pub async fn reload_module(self: &Arc<Self>, name: &str) -> Result<(), Error> {
        let registry = self.modules.lock().await;
        let Some(idx) = registry.position(name) else {
            return Err(Error::Module(format!("module '{name}' is not loaded")));
        };
        let module = registry.loaded[idx].clone();

        let snapshot = self.components();
        for step in [Step::Unload, Step::Load] {
            if let Err(e) = self.run_step(&module, step).await {
                self.restore_components(snapshot);
                return Err(e);
            }
        }

        info!("Reloaded module '{}'", name);
        Ok(())
    }

    async fn run_step(self: &Arc<Self>, module: &Arc<dyn Module>, step: Step) -> Result<(), Error> {
        let (verb, result) = match step {
            Step::Load => ("load", AssertUnwindSafe(module.load(self)).catch_unwind().await),
            Step::Unload => ("unload", AssertUnwindSafe(module.unload(self)).catch_unwind().await),
        };
        let cause = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => "panicked".to_string(),
        };
        error!("Failed to {} module '{}': {}", verb, module.name(), cause);
        Err(Error::Module(format!(
            "failed to {} module '{}': {}",
            verb,
            module.name(),
            cause
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::test_utils::NullClient;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Attaches one component, then optionally fails.
    struct Fixture {
        name: &'static str,
        fail_load: AtomicBool,
        fail_unload: AtomicBool,
    }

    impl Fixture {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_load: AtomicBool::new(false),
                fail_unload: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Module for Fixture {
        fn name(&self) -> &str {
            self.name
        }

        async fn load(&self, bot: &Arc<Bot>) -> anyhow::Result<()> {
            bot.add_component(Component::new(self.name)).await?;
            if self.fail_load.load(Ordering::SeqCst) {
                anyhow::bail!("load failed after attaching");
            }
            Ok(())
        }

        async fn unload(&self, bot: &Arc<Bot>) -> anyhow::Result<()> {
            bot.remove_component(self.name).await;
            if self.fail_unload.load(Ordering::SeqCst) {
                anyhow::bail!("unload failed after detaching");
            }
            Ok(())
        }
    }

    fn bot() -> Arc<Bot> {
        Bot::builder(Arc::new(NullClient)).prefix("!").build().unwrap()
    }

    fn component_names(bot: &Bot) -> Vec<String> {
        bot.components().iter().map(|c| c.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_load_and_unload() {
        let bot = bot();
        let module = Fixture::new("fun");
        bot.load_module(module.clone()).await.unwrap();
        assert_eq!(bot.loaded_modules().await, vec!["fun"]);
        assert_eq!(component_names(&bot), vec!["fun"]);

        assert!(matches!(bot.load_module(module.clone()).await, Err(Error::Module(_))));

        bot.unload_module("fun").await.unwrap();
        assert!(bot.loaded_modules().await.is_empty());
        assert!(bot.components().is_empty());
        assert!(matches!(bot.unload_module("fun").await, Err(Error::Module(_))));
    }

    #[tokio::test]
    async fn test_failed_load_rolls_back() {
        let bot = bot();
        let module = Fixture::new("broken");
        module.fail_load.store(true, Ordering::SeqCst);

        assert!(bot.load_module(module.clone()).await.is_err());
        assert!(bot.components().is_empty());
        assert!(bot.loaded_modules().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_unload_keeps_module() {
        let bot = bot();
        let module = Fixture::new("sticky");
        bot.load_module(module.clone()).await.unwrap();
        module.fail_unload.store(true, Ordering::SeqCst);

        assert!(bot.unload_module("sticky").await.is_err());
        assert_eq!(bot.loaded_modules().await, vec!["sticky"]);
        assert_eq!(component_names(&bot), vec!["sticky"]);
        let component = bot.get_component("sticky").unwrap();
        assert!(Arc::ptr_eq(&component.bot().unwrap(), &bot));
    }

    #[tokio::test]
    async fn test_reload_rolls_back_on_failure() {
        let bot = bot();
        let module = Fixture::new("fun");
        bot.load_module(module.clone()).await.unwrap();
        let before = bot.get_component("fun").unwrap();

        bot.reload_module("fun").await.unwrap();
        let after = bot.get_component("fun").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));

        module.fail_load.store(true, Ordering::SeqCst);
        assert!(bot.reload_module("fun").await.is_err());
        let restored = bot.get_component("fun").unwrap();
        assert!(Arc::ptr_eq(&restored, &after));
        assert_eq!(bot.loaded_modules().await, vec!["fun"]);
        assert!(matches!(bot.reload_module("missing").await, Err(Error::Module(_))));
    }
}
