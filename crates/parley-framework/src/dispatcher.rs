//! Message dispatcher for the Parley framework.
//!
//! The [`Dispatcher`] takes one inbound message from a [`Driver`] and runs it
//! through the registered callbacks:
//!
//! 1. Middleware, in registration order. Any veto ends the dispatch.
//! 2. The command path: `/keyword args...` with a handler registered for
//!    exactly `keyword`.
//! 3. The pattern path: routes in registration order, first match wins.
//! 4. The fallback, if nothing handled the message.
//!
//! Whatever the chosen callback returns is delivered through the driver, one
//! send per message, each recorded in the sender's history.
//!
//! ```rust,ignore
//! use parley_framework::*;
//!
//! let mut dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
//!
//! dispatcher
//!     .hears("hello {name}", |ctx: Arc<Context>| async move {
//!         format!("Hi {}!", ctx.param("name").unwrap_or_default())
//!     })
//!     .command("help", |_ctx: Arc<Context>| async { "Try 'hello <name>'" })
//!     .fallback(|_ctx: Arc<Context>| async { "Sorry, I didn't get that." });
//!
//! dispatcher.listen(driver).await?;
//! ```
//!
//! [`Driver`]: parley_core::Driver

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{Instrument, Level, debug, span, trace};

use parley_core::{BoxedDriver, BoxedStorage, Role};

use crate::command::CommandInvocation;
use crate::context::Context;
use crate::conversation::Conversation;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{
    BoxedHandler, BoxedMiddleware, Flow, Handler, Middleware, into_handler,
};
use crate::matcher::{Params, Pattern};
use crate::reply::Reply;
use crate::routing::Route;
use crate::rules::RuleSet;

// ============================================================================
// Outcome
// ============================================================================

/// Which callback handled a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandledBy {
    /// A command handler, by keyword.
    Command(String),
    /// A pattern route, by registration index and optional name.
    Route { index: usize, name: Option<String> },
    /// The fallback handler.
    Fallback,
}

/// The result of one [`Dispatcher::listen`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The driver had no message or no sender id.
    NoMessage,
    /// A middleware vetoed the dispatch.
    Vetoed,
    /// A callback ran; `replies` messages were handed to the driver.
    Handled { by: HandledBy, replies: usize },
    /// Nothing matched and there is no fallback.
    Unhandled,
}

impl DispatchOutcome {
    /// Returns `true` if a callback handled the message.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

// ============================================================================
// Concurrency
// ============================================================================

/// How concurrent dispatches for the same sender are coordinated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyStrategy {
    /// No coordination. Two dispatches for one sender each load the
    /// conversation independently; the later write wins.
    #[default]
    Unsynchronized,
    /// Dispatches for one sender id run one at a time.
    PerSender,
}

/// Per-sender async locks, created on demand.
#[derive(Debug, Default)]
struct SenderLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SenderLocks {
    async fn acquire(&self, sender_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Locks nobody holds or waits on can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(sender_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes inbound messages to middleware, commands, routes and a fallback.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` to serve many
/// drivers concurrently. Registration needs `&mut self` and happens before
/// serving.
pub struct Dispatcher {
    storage: BoxedStorage,
    middleware: Vec<BoxedMiddleware>,
    commands: HashMap<String, BoxedHandler>,
    routes: Vec<Route>,
    fallback: Option<BoxedHandler>,
    concurrency: ConcurrencyStrategy,
    locks: SenderLocks,
}

impl Dispatcher {
    /// Creates a dispatcher persisting conversations in `storage`.
    pub fn new(storage: BoxedStorage) -> Self {
        Self {
            storage,
            middleware: Vec::new(),
            commands: HashMap::new(),
            routes: Vec::new(),
            fallback: None,
            concurrency: ConcurrencyStrategy::default(),
            locks: SenderLocks::default(),
        }
    }

    /// Sets the concurrency strategy (builder pattern).
    pub fn with_concurrency(mut self, strategy: ConcurrencyStrategy) -> Self {
        self.concurrency = strategy;
        self
    }

    /// Sets the concurrency strategy.
    pub fn set_concurrency(&mut self, strategy: ConcurrencyStrategy) -> &mut Self {
        self.concurrency = strategy;
        self
    }

    /// Registers a handler for messages matching `pattern`.
    ///
    /// Strings are classified with [`Pattern::classify`].
    pub fn hears(&mut self, pattern: impl Into<Pattern>, handler: impl Handler) -> &mut Self {
        self.route(Route::new(pattern, handler))
    }

    /// Registers a route. Routes are tried in registration order.
    pub fn route(&mut self, route: Route) -> &mut Self {
        debug!(
            pattern = ?route.pattern(),
            name = route.get_name().unwrap_or("unnamed"),
            "Registered route"
        );
        self.routes.push(route);
        self
    }

    /// Registers a handler for `/name`. A leading `/` in `name` is ignored.
    ///
    /// Registering the same keyword twice replaces the earlier handler.
    pub fn command(&mut self, name: &str, handler: impl Handler) -> &mut Self {
        let name = name.trim_start_matches('/').to_string();
        if self.commands.insert(name.clone(), into_handler(handler)).is_some() {
            debug!(command = %name, "Replaced command handler");
        }
        self
    }

    /// Registers a middleware. Middleware run in registration order.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Sets the handler used when nothing else matched.
    pub fn fallback(&mut self, handler: impl Handler) -> &mut Self {
        self.fallback = Some(into_handler(handler));
        self
    }

    /// Registers one route per rule, in file order.
    pub fn load_rules(&mut self, rules: &RuleSet) -> &mut Self {
        for route in rules.routes() {
            self.route(route);
        }
        self
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &BoxedStorage {
        &self.storage
    }

    /// Returns the number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Returns the number of registered commands.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Dispatches the driver's message.
    ///
    /// A missing message or sender id, a middleware veto and an unmatched
    /// message without fallback are all reported as outcomes, not errors.
    /// Storage failures and callback errors propagate; conversation changes
    /// made before the failure are kept.
    pub async fn listen(&self, driver: BoxedDriver) -> DispatchResult<DispatchOutcome> {
        if !driver.has_message() {
            trace!(platform = driver.platform(), "Driver has no message");
            return Ok(DispatchOutcome::NoMessage);
        }

        let message = driver.message().filter(|m| !m.is_empty());
        let sender_id = driver.sender_id().filter(|s| !s.is_empty());
        let (Some(message), Some(sender_id)) = (message, sender_id) else {
            debug!(platform = driver.platform(), "Dropping message without text or sender id");
            return Ok(DispatchOutcome::NoMessage);
        };
        let (message, sender_id) = (message.to_string(), sender_id.to_string());

        let span = span!(
            Level::DEBUG,
            "dispatch",
            platform = driver.platform(),
            sender_id = %sender_id
        );
        self.dispatch(message, sender_id, driver)
            .instrument(span)
            .await
    }

    async fn dispatch(
        &self,
        message: String,
        sender_id: String,
        driver: BoxedDriver,
    ) -> DispatchResult<DispatchOutcome> {
        let _serial = match self.concurrency {
            ConcurrencyStrategy::PerSender => Some(self.locks.acquire(&sender_id).await),
            ConcurrencyStrategy::Unsynchronized => None,
        };

        let conversation = Conversation::load(Arc::clone(&self.storage), sender_id.as_str()).await?;
        conversation.add_message(Role::User, message.as_str()).await?;
        let ctx = Arc::new(Context::new(message, sender_id, conversation, driver));

        for middleware in &self.middleware {
            let flow = middleware
                .call(Arc::clone(&ctx))
                .await
                .map_err(DispatchError::Middleware)?;
            if flow == Flow::Abort {
                debug!("Middleware vetoed dispatch");
                return Ok(DispatchOutcome::Vetoed);
            }
        }

        let Some((by, handler)) = self.select(&ctx) else {
            debug!("No handler matched");
            return Ok(DispatchOutcome::Unhandled);
        };

        debug!(handled_by = ?by, "Invoking handler");
        let reply = handler
            .call(Arc::clone(&ctx))
            .await
            .map_err(DispatchError::Handler)?;

        let replies = deliver(&ctx, reply).await?;
        Ok(DispatchOutcome::Handled { by, replies })
    }

    /// Picks the callback for the message and applies its parameters.
    fn select(&self, ctx: &Context) -> Option<(HandledBy, &BoxedHandler)> {
        if let Some(invocation) = CommandInvocation::parse(ctx.message())
            && let Some(handler) = self.commands.get(&invocation.command)
        {
            let command = invocation.command.clone();
            ctx.set_params(invocation.into_params());
            return Some((HandledBy::Command(command), handler));
        }

        for (index, route) in self.routes.iter().enumerate() {
            if !route.pattern().matches(ctx.message()) {
                continue;
            }
            ctx.set_params(route.pattern().extract_params(ctx.message()));
            if !route.accepts(ctx) {
                trace!(index, "Route guard declined");
                continue;
            }
            let by = HandledBy::Route {
                index,
                name: route.get_name().map(str::to_string),
            };
            return Some((by, route.handler()));
        }

        let fallback = self.fallback.as_ref()?;
        ctx.set_params(Params::new());
        Some((HandledBy::Fallback, fallback))
    }
}

/// Sends every message of `reply`, in order.
async fn deliver(ctx: &Context, reply: Reply) -> DispatchResult<usize> {
    let messages = reply.into_messages();
    let count = messages.len();
    for text in messages {
        ctx.reply(text).await?;
    }
    Ok(count)
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middleware_count", &self.middleware.len())
            .field("command_count", &self.commands.len())
            .field("route_count", &self.routes.len())
            .field("has_fallback", &self.fallback.is_some())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
