//! Parley Runtime - configuration, logging and storage wiring for Parley.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `ParleyConfig`)
//! - Logging setup over `tracing-subscriber` (`LoggingBuilder`)
//! - Configurable storage backends, including the JSON-file `FileStore`
//! - Runtime assembly (`ParleyRuntime`) and a timeout-aware `RuntimeHandle`
//!
//! ```ignore
//! use parley_runtime::ParleyRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = ParleyRuntime::load().await?;
//!     runtime.dispatcher_mut().fallback(|_ctx| async { "Sorry?" });
//!
//!     let handle = runtime.into_handle();
//!     handle.handle(driver).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod storage;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{ParleyRuntime, RuntimeBuilder, RuntimeHandle};
pub use storage::{FileStore, open_storage};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
