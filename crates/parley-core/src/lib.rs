//! # Parley Core
//!
//! The capability layer of the Parley chatbot framework.
//!
//! This crate defines the two collaborators the dispatcher talks to and the
//! data that flows between them:
//!
//! - **Driver**: a chat-platform adapter that exposes the inbound message and
//!   sender id, and sends replies back ([`Driver`], [`BoxedDriver`])
//! - **Storage**: persistence for per-sender conversation records and a flat
//!   key-value surface ([`Storage`], [`BoxedStorage`], [`MemoryStore`])
//! - **Records**: the persisted conversation layout ([`ConversationRecord`],
//!   [`HistoryEntry`], [`Role`])
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌──────────┐
//! │  Driver  │────▶│ Dispatcher │────▶│ Storage  │
//! │ (web, …) │◀────│ (framework)│◀────│ (memory) │
//! └──────────┘     └────────────┘     └──────────┘
//! ```

pub mod driver;
pub mod error;
pub mod record;
pub mod storage;

pub use driver::{BoxedDriver, Driver};
pub use error::{DriverError, DriverResult, StorageError, StorageResult};
pub use record::{ConversationRecord, HISTORY_LIMIT, HistoryEntry, Role};
pub use storage::{BoxedStorage, MemoryStore, Storage};
