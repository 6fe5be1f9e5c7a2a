//! Runtime wiring: configuration in, a ready-to-serve dispatcher out.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_runtime::ParleyRuntime;
//!
//! // Loads parley.toml / PARLEY_* and builds everything from it
//! let mut runtime = ParleyRuntime::load().await?;
//! runtime.dispatcher_mut().command("help", |_ctx| async { "Try /order" });
//!
//! let handle = runtime.into_handle();
//! let outcome = handle.handle(driver).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{ServiceBuilder, ServiceExt};
use tracing::{info, warn};

use parley_core::{BoxedDriver, BoxedStorage};
use parley_framework::{
    BoxError, DispatchError, DispatchOutcome, DispatchService, Dispatcher, RuleSet,
};

use crate::config::{ConfigLoader, ParleyConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::storage::open_storage;

/// A configured dispatcher plus the settings it was built from.
///
/// Register handlers through [`dispatcher_mut`](Self::dispatcher_mut), then
/// call [`into_handle`](Self::into_handle) to start serving.
pub struct ParleyRuntime {
    config: ParleyConfig,
    dispatcher: Dispatcher,
}

impl ParleyRuntime {
    /// Loads configuration from the default locations and builds a runtime.
    pub async fn load() -> RuntimeResult<Self> {
        Self::builder().build().await
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds a runtime from an already loaded configuration.
    ///
    /// This initializes logging (unless a subscriber is already installed),
    /// opens the configured storage and loads the rule file, if any.
    pub async fn from_config(config: &ParleyConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        let storage = open_storage(&config.storage).await?;
        Self::with_storage(config, storage)
    }

    fn with_storage(config: &ParleyConfig, storage: BoxedStorage) -> RuntimeResult<Self> {
        let mut dispatcher =
            Dispatcher::new(storage).with_concurrency(config.dispatch.concurrency());

        if let Some(path) = &config.rules.path {
            let rules = RuleSet::from_path(path)?;
            info!(path = %path.display(), rules = rules.len(), "Loaded rule file");
            dispatcher.load_rules(&rules);
        }

        info!(
            log_level = %config.logging.level,
            storage = ?config.storage.backend,
            concurrency = ?config.dispatch.concurrency(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            dispatcher,
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the dispatcher for registering handlers.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Freezes registration and returns a cloneable handle for serving.
    pub fn into_handle(self) -> RuntimeHandle {
        RuntimeHandle {
            service: DispatchService::new(self.dispatcher),
            timeout: self.config.dispatch.timeout(),
        }
    }
}

/// A cloneable entry point that dispatches one driver at a time.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    service: DispatchService,
    timeout: Option<Duration>,
}

impl RuntimeHandle {
    /// Returns the shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.service.dispatcher()
    }

    /// Dispatches `driver`, enforcing the configured timeout.
    pub async fn handle(&self, driver: BoxedDriver) -> RuntimeResult<DispatchOutcome> {
        // Both branches of the optional layer must share an error type.
        let service = ServiceBuilder::new()
            .option_layer(self.timeout.map(TimeoutLayer::new))
            .map_err(|err: DispatchError| -> BoxError { Box::new(err) })
            .service(self.service.clone());

        service.oneshot(driver).await.map_err(|err| {
            let err = match err.downcast::<DispatchError>() {
                Ok(err) => return RuntimeError::Dispatch(*err),
                Err(err) => err,
            };
            match (err.is::<Elapsed>(), self.timeout) {
                (true, Some(limit)) => {
                    warn!(?limit, "Dispatch timed out");
                    RuntimeError::Timeout(limit)
                }
                _ => RuntimeError::Service(err),
            }
        })
    }
}

/// Builder for [`ParleyRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<ParleyConfig>,
    config_file: Option<PathBuf>,
    profile: Option<String>,
    storage: Option<BoxedStorage>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses this configuration instead of loading one.
    pub fn config(mut self, config: ParleyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads configuration from exactly this file.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Uses this storage instead of the configured backend.
    pub fn storage(mut self, storage: BoxedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn build(self) -> RuntimeResult<ParleyRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let mut loader = ConfigLoader::new();
                if let Some(profile) = &self.profile {
                    loader = loader.profile(profile);
                }
                if let Some(path) = &self.config_file {
                    loader = loader.file(path);
                }
                loader.load()?
            }
        };

        match self.storage {
            Some(storage) => {
                logging::init_from_config(&config.logging);
                ParleyRuntime::with_storage(&config, storage)
            }
            None => ParleyRuntime::from_config(&config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use async_trait::async_trait;
    use parley_core::{Driver, DriverResult, MemoryStore};
    use parking_lot::Mutex;
    use parley_framework::{Context, HandledBy};
    use serde_json::{Value, json};

    use super::*;

    struct StubDriver {
        data: Value,
        sent: Mutex<Vec<String>>,
    }

    impl StubDriver {
        fn new(message: &str, sender_id: &str) -> Arc<Self> {
            Arc::new(Self {
                data: json!({ "message": message, "sender_id": sender_id }),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Driver for StubDriver {
        fn platform(&self) -> &'static str {
            "stub"
        }

        fn message(&self) -> Option<&str> {
            self.data["message"].as_str()
        }

        fn sender_id(&self) -> Option<&str> {
            self.data["sender_id"].as_str()
        }

        fn data(&self) -> &Value {
            &self.data
        }

        async fn send_message(&self, text: &str, _sender_id: Option<&str>) -> DriverResult<()> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rules_from_config_are_served() {
        let mut rules = tempfile::NamedTempFile::new().unwrap();
        write!(
            rules,
            r#"{{"conversations": [{{"pattern": "hello", "response": "Hi there!"}}]}}"#
        )
        .unwrap();

        let mut config = ParleyConfig::default();
        config.rules.path = Some(rules.path().to_path_buf());

        let runtime = ParleyRuntime::from_config(&config).await.unwrap();
        assert_eq!(runtime.dispatcher().route_count(), 1);

        let handle = runtime.into_handle();
        let driver = StubDriver::new("hello", "u1");
        let outcome = handle.handle(driver.clone()).await.unwrap();

        assert!(outcome.is_handled());
        assert_eq!(driver.sent(), vec!["Hi there!"]);
    }

    #[tokio::test]
    async fn test_builder_with_storage_and_handlers() {
        let storage: BoxedStorage = Arc::new(MemoryStore::new());
        let mut runtime = ParleyRuntime::builder()
            .config(ParleyConfig::default())
            .storage(Arc::clone(&storage))
            .build()
            .await
            .unwrap();
        runtime
            .dispatcher_mut()
            .command("ping", |_ctx: Arc<Context>| async { "pong" });

        let handle = runtime.into_handle();
        let driver = StubDriver::new("/ping", "u1");
        let outcome = handle.handle(driver.clone()).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                by: HandledBy::Command("ping".into()),
                replies: 1
            }
        );
        assert_eq!(storage.get_conversation("u1").await.unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_rule_file_fails_startup() {
        let mut config = ParleyConfig::default();
        config.rules.path = Some(PathBuf::from("/nonexistent/parley/rules.json"));

        let result = ParleyRuntime::from_config(&config).await;
        assert!(matches!(result, Err(RuntimeError::Rules(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_dispatch_times_out() {
        let mut config = ParleyConfig::default();
        config.dispatch.timeout_secs = Some(1);

        let mut runtime = ParleyRuntime::from_config(&config).await.unwrap();
        runtime
            .dispatcher_mut()
            .hears("slow", |_ctx: Arc<Context>| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            });

        let handle = runtime.into_handle();
        let result = handle.handle(StubDriver::new("slow", "u1")).await;
        assert!(matches!(result, Err(RuntimeError::Timeout(limit)) if limit == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_handler_error_surfaces_with_and_without_timeout() {
        for timeout_secs in [None, Some(30)] {
            let mut config = ParleyConfig::default();
            config.dispatch.timeout_secs = timeout_secs;

            let mut runtime = ParleyRuntime::from_config(&config).await.unwrap();
            runtime
                .dispatcher_mut()
                .hears("boom", |_ctx: Arc<Context>| async {
                    Err::<&str, BoxError>("kitchen closed".into())
                });

            let handle = runtime.into_handle();
            let result = handle.handle(StubDriver::new("boom", "u1")).await;
            assert!(
                matches!(result, Err(RuntimeError::Dispatch(DispatchError::Handler(_)))),
                "timeout_secs = {timeout_secs:?}"
            );
        }
    }
}
