//! Telegram bot process: admin chat commands plus the scheduled publisher.
//!
//! This crate provides:
//! - `Command` parsing and the per-user `ConversationStore`
//! - `CommandHandler`, which turns admin messages into ledger edits and replies
//! - `PollingLoop`, the `getUpdates` long-poll driver
//! - `AppContext`, the wiring built by the `reelay` binary

pub mod commands;
pub mod context;
pub mod conversation;
pub mod handlers;
pub mod polling;
pub mod signal;

pub use commands::Command;
pub use context::AppContext;
pub use conversation::{ConversationState, ConversationStore};
pub use handlers::{CommandHandler, Reply};
pub use polling::PollingLoop;
