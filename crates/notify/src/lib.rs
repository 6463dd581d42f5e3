//! Telegram delivery for the relay.
//!
//! This crate provides:
//! - `TelegramClient` for the Bot API calls the bot makes
//! - `VideoSink` trait, the publish pipeline's transmit boundary
//! - `ChannelSink`, which posts videos into the configured channel

pub mod telegram;
pub mod traits;
pub mod types;

pub use telegram::{ChannelSink, TelegramClient};
pub use traits::{TelegramError, VideoSink};
pub use types::{Message, ReplyKeyboard, Update};
