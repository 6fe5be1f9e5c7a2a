//! Pattern routes.
//!
//! A [`Route`] couples a [`Pattern`] with a handler and an optional guard.
//! The dispatcher tries routes in registration order; the first route whose
//! pattern matches *and* whose guard accepts handles the message.
//!
//! ```rust,ignore
//! dispatcher.route(
//!     Route::new("yes", confirm)
//!         .when(|ctx| ctx.conversation().is_in_state("confirming"))
//!         .name("confirm"),
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxedHandler, Guard, Handler, into_handler};
use crate::matcher::Pattern;

/// A pattern, an optional guard and the handler to run.
#[derive(Clone)]
pub struct Route {
    pattern: Pattern,
    guard: Option<Guard>,
    handler: BoxedHandler,
    name: Option<String>,
}

impl Route {
    /// Creates a route from anything convertible into a [`Pattern`].
    pub fn new(pattern: impl Into<Pattern>, handler: impl Handler) -> Self {
        Self {
            pattern: pattern.into(),
            guard: None,
            handler: into_handler(handler),
            name: None,
        }
    }

    /// Adds a guard. Repeated calls combine guards with logical AND.
    pub fn when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(match self.guard.take() {
            Some(previous) => Arc::new(move |ctx: &Context| previous(ctx) && guard(ctx)),
            None => Arc::new(guard),
        });
        self
    }

    /// Sets a name for this route (shown in logs and dispatch outcomes).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the route's pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the route's name, if set.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn accepts(&self, ctx: &Context) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard(ctx))
    }

    pub(crate) fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("guarded", &self.guard.is_some())
            .field("name", &self.name)
            .finish()
    }
}
