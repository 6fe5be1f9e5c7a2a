//! # Parley
//!
//! A chatbot framework. Incoming messages are routed to handlers by pattern
//! or `/command`, each sender gets a persistent conversation, and routing
//! can be declared in a JSON rule file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌──────────────────────────────────────────────┐     ┌──────────┐
//! │  Driver  │────▶│ Dispatcher                                   │────▶│ Storage  │
//! │ (web, …) │     │ middleware → commands → routes → fallback    │     │ (memory, │
//! │          │◀────│                    replies                   │◀────│  file)   │
//! └──────────┘     └──────────────────────────────────────────────┘     └──────────┘
//! ```
//!
//! - **Core** ([`core`]): the Driver and Storage capabilities
//! - **Framework** ([`framework`]): matcher, conversations, dispatcher, rules
//! - **Runtime** ([`runtime`]): configuration, logging, file storage
//! - **Web** ([`web`], feature `web`): the JSON-webhook driver
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
//!     dispatcher.hears("my name is {name}", |ctx: Arc<Context>| async move {
//!         let name = ctx.param("name").unwrap_or_default();
//!         ctx.conversation().set("name", name.clone()).await?;
//!         Ok::<_, BoxError>(format!("Nice to meet you, {name}!"))
//!     });
//!
//!     let driver = Arc::new(WebDriver::from_json(r#"{"message": "my name is Ada", "sender_id": "u1"}"#)?);
//!     dispatcher.listen(driver.clone()).await?;
//!     println!("{}", driver.to_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `json-log`: JSON log output
//! - `web`: the JSON-webhook driver (default)

pub use parley_core as core;
pub use parley_framework as framework;
pub use parley_runtime as runtime;
#[cfg(feature = "web")]
pub use parley_adapter_web as web;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    // Runtime - configured entry point
    pub use parley_runtime::{ParleyConfig, ParleyRuntime, RuntimeHandle};

    // Dispatch
    pub use parley_framework::{
        BoxError, ConcurrencyStrategy, Context, Conversation, DispatchOutcome, Dispatcher, Flow,
        HandledBy, Reply, Route,
    };

    // Patterns and rules
    pub use parley_framework::{Params, Pattern, RuleSet};

    // Capabilities for custom drivers and backends
    pub use parley_core::{BoxedDriver, BoxedStorage, Driver, MemoryStore, Storage};

    #[cfg(feature = "web")]
    pub use parley_adapter_web::WebDriver;
}
