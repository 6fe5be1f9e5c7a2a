//! Handler and middleware traits.
//!
//! Handlers are plain async functions or closures taking the dispatch
//! [`Context`] and returning anything implementing [`IntoReply`]:
//!
//! ```rust,ignore
//! async fn greet(ctx: Arc<Context>) -> String {
//!     format!("Hello, {}!", ctx.param("name").unwrap_or_default())
//! }
//!
//! dispatcher.hears("my name is {name}", greet);
//! ```
//!
//! Middleware runs before matching and can veto the dispatch by returning
//! `false` or [`Flow::Abort`]:
//!
//! ```rust,ignore
//! dispatcher.middleware(|ctx: Arc<Context>| async move {
//!     ctx.sender_id() != "banned"
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::BoxError;
use crate::reply::{IntoReply, Reply};

// ============================================================================
// Handler
// ============================================================================

/// A callback that produces a [`Reply`] for a dispatch.
///
/// Implemented for every `Fn(Arc<Context>) -> impl Future<Output = impl IntoReply>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, Result<Reply, BoxError>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + 'static,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, Result<Reply, BoxError>> {
        (self)(ctx).map(IntoReply::into_reply).boxed()
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn Handler>;

/// Erases a handler.
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

// ============================================================================
// Middleware
// ============================================================================

/// Whether dispatch continues after a middleware ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    #[default]
    Continue,
    Abort,
}

/// Converts a middleware's return value into a [`Flow`].
pub trait IntoFlow: Send {
    fn into_flow(self) -> Result<Flow, BoxError>;
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Result<Flow, BoxError> {
        Ok(self)
    }
}

impl IntoFlow for () {
    fn into_flow(self) -> Result<Flow, BoxError> {
        Ok(Flow::Continue)
    }
}

impl IntoFlow for bool {
    fn into_flow(self) -> Result<Flow, BoxError> {
        Ok(if self { Flow::Continue } else { Flow::Abort })
    }
}

impl<T, E> IntoFlow for Result<T, E>
where
    T: IntoFlow,
    E: Into<BoxError> + Send,
{
    fn into_flow(self) -> Result<Flow, BoxError> {
        self.map_err(Into::into)?.into_flow()
    }
}

/// A callback run before matching, in registration order.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, Result<Flow, BoxError>>;
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + 'static,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, Result<Flow, BoxError>> {
        (self)(ctx).map(IntoFlow::into_flow).boxed()
    }
}

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

// ============================================================================
// Guard
// ============================================================================

/// An extra synchronous check a route must pass after its pattern matched.
///
/// Guards see the context with the route's parameters already applied.
pub type Guard = Arc<dyn Fn(&Context) -> bool + Send + Sync>;
