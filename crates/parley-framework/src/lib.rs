//! # Parley Framework
//!
//! The message-handling layer of the Parley chatbot framework.
//!
//! This layer provides:
//! - Pattern matching with parameter extraction ([`Pattern`], [`Params`])
//! - The [`Dispatcher`]: middleware, slash commands, routes and a fallback
//! - Per-sender conversation state ([`Conversation`])
//! - Declarative JSON rules compiled into routes ([`rules`])
//! - A tower [`Service`](tower::Service) wrapper ([`DispatchService`])
//!
//! Drivers and storage backends are defined in `parley-core`; this crate only
//! consumes them.

pub mod command;
pub mod context;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod reply;
pub mod routing;
pub mod rules;
pub mod service;

#[cfg(test)]
mod testing;

pub use command::CommandInvocation;
pub use context::Context;
pub use conversation::Conversation;
pub use dispatcher::{ConcurrencyStrategy, DispatchOutcome, Dispatcher, HandledBy};
pub use error::{
    BoxError, DispatchError, DispatchResult, PatternError, PatternResult, RuleError, RuleResult,
};
pub use handler::{
    BoxedHandler, BoxedMiddleware, Flow, Guard, Handler, IntoFlow, Middleware, into_handler,
};
pub use matcher::{Params, Pattern, PatternKind};
pub use reply::{IntoReply, Reply};
pub use routing::Route;
pub use rules::{Response, Rule, RuleSet};
pub use service::DispatchService;
