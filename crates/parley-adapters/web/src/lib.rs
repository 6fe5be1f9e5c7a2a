//! # Parley Web Adapter
//!
//! A driver for generic JSON webhooks. Decode the request body into a
//! [`WebDriver`], dispatch it, then return [`WebDriver::to_json`] as the
//! HTTP response:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley_adapter_web::WebDriver;
//!
//! let driver = Arc::new(WebDriver::from_json(&body)?);
//! dispatcher.listen(driver.clone()).await?;
//! let response = driver.to_json();
//! // {"responses": [{"message": "...", "sender_id": "...", "timestamp": ...}], "status": "success"}
//! ```

mod driver;
mod error;

pub use driver::{WebDriver, WebResponse};
pub use error::{AdapterError, AdapterResult};
