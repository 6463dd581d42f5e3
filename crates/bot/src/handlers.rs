//! Admin command handling.
//!
//! [`CommandHandler::handle`] turns one inbound text message into the replies
//! to send back. It never talks to Telegram itself, so every flow can be
//! exercised against a ledger alone.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use reelay_ledger::Ledger;
use reelay_notify::ReplyKeyboard;

use crate::commands::Command;
use crate::conversation::{ConversationState, ConversationStore};

pub const ACCESS_DENIED: &str = "❌ You do not have access to this bot";
pub const NOTHING_TO_CANCEL: &str = "❌ Nothing to cancel";
pub const CANCELLED: &str = "❌ Operation cancelled";
pub const NO_POSTED_VIDEOS: &str = "📭 No posted videos";
pub const ADD_PROMPT: &str = "Send the TikTok video URL to add, or /cancel:";
pub const DELETE_PROMPT: &str = "Send the post URL to delete, or /cancel:";
pub const INVALID_URL: &str = "❌ Please send a valid TikTok video URL or /cancel:";
pub const STORAGE_ERROR: &str = "⚠️ Storage is unavailable right now, please try again";

const LIST_HEADER: &str = "📋 Posted videos:\n\n";
const LIST_CHUNK: usize = 10;

const START_TEXT: &str = "🤖 Hi! I publish TikTok videos to the channel.\n\n\
📋 Commands:\n\
/add_post - add a video\n\
/delete_post - delete a post\n\
/list_posts - list posted videos\n\
/help - help";

const HELP_TEXT: &str = "🤖 Bot help:\n\n\
📋 Available commands:\n\
/start - start working with the bot\n\
/add_post - add a video\n\
/delete_post - delete a post\n\
/list_posts - list posted videos\n\
/help - help\n\
The bot automatically publishes trending TikTok videos to the channel.";

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<ReplyKeyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: ReplyKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// The `/start` menu keyboard.
pub fn main_menu() -> ReplyKeyboard {
    ReplyKeyboard::from_rows([
        vec![Command::AddPost.as_str(), Command::ListPosts.as_str()],
        vec![Command::DeletePost.as_str()],
    ])
}

/// Whether `input` looks like a link on `domain` (case-insensitive).
pub fn is_platform_url(input: &str, domain: &str) -> bool {
    input.to_lowercase().contains(&domain.to_lowercase())
}

/// Format ledger entries as sorted messages of at most ten URLs each.
pub fn format_listing(mut urls: Vec<String>) -> Vec<String> {
    if urls.is_empty() {
        return vec![NO_POSTED_VIDEOS.to_string()];
    }
    urls.sort();
    urls.chunks(LIST_CHUNK)
        .map(|chunk| format!("{LIST_HEADER}{}", chunk.join("\n")))
        .collect()
}

/// Dispatches admin messages to ledger edits and prompts.
pub struct CommandHandler {
    ledger: Arc<dyn Ledger>,
    admin_id: i64,
    platform_domain: String,
    conversations: Mutex<ConversationStore>,
}

impl CommandHandler {
    pub fn new(ledger: Arc<dyn Ledger>, admin_id: i64, platform_domain: impl Into<String>) -> Self {
        Self {
            ledger,
            admin_id,
            platform_domain: platform_domain.into(),
            conversations: Mutex::new(ConversationStore::new()),
        }
    }

    /// Current pending prompt for `user_id`, if any.
    pub fn conversation_state(&self, user_id: i64) -> Option<ConversationState> {
        self.with_conversations(|store| store.get(user_id))
    }

    fn with_conversations<T>(&self, f: impl FnOnce(&mut ConversationStore) -> T) -> T {
        let mut store = self.conversations.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    /// Handle one text message from `user_id`.
    pub async fn handle(&self, user_id: i64, text: &str) -> Vec<Reply> {
        if user_id != self.admin_id {
            warn!(user_id, "rejected message from non-admin user");
            return vec![Reply::text(ACCESS_DENIED)];
        }

        if let Some(command) = Command::parse(text) {
            info!(user_id, command = command.as_str(), "admin command");
            return self.run_command(user_id, command).await;
        }

        match self.conversation_state(user_id) {
            Some(ConversationState::AwaitingAddUrl) => self.add_url(user_id, text.trim()).await,
            Some(ConversationState::AwaitingDeleteUrl) => self.delete_url(user_id, text.trim()).await,
            None => Vec::new(),
        }
    }

    async fn run_command(&self, user_id: i64, command: Command) -> Vec<Reply> {
        match command {
            Command::Start => vec![Reply::with_keyboard(START_TEXT, main_menu())],
            Command::Help => vec![Reply::text(HELP_TEXT)],
            Command::AddPost => {
                self.with_conversations(|s| s.set(user_id, ConversationState::AwaitingAddUrl));
                vec![Reply::text(ADD_PROMPT)]
            }
            Command::DeletePost => {
                self.with_conversations(|s| s.set(user_id, ConversationState::AwaitingDeleteUrl));
                vec![Reply::text(DELETE_PROMPT)]
            }
            Command::ListPosts => self.list_posts().await,
            Command::Cancel => match self.with_conversations(|s| s.clear(user_id)) {
                Some(_) => vec![Reply::text(CANCELLED)],
                None => vec![Reply::text(NOTHING_TO_CANCEL)],
            },
        }
    }

    async fn add_url(&self, user_id: i64, url: &str) -> Vec<Reply> {
        if !is_platform_url(url, &self.platform_domain) {
            return vec![Reply::text(INVALID_URL)];
        }

        match self.ledger.add(url).await {
            Ok(()) => {
                self.with_conversations(|s| s.clear(user_id));
                info!(url, "video marked as posted by admin");
                vec![Reply::text(format!("✅ Video added to the posted list:\n{url}"))]
            }
            Err(e) => {
                error!(url, error = %e, "failed to record video");
                vec![Reply::text(STORAGE_ERROR)]
            }
        }
    }

    async fn delete_url(&self, user_id: i64, url: &str) -> Vec<Reply> {
        match self.ledger.remove(url).await {
            Ok(removed) => {
                self.with_conversations(|s| s.clear(user_id));
                info!(url, removed, "admin removed video");
                if removed > 0 {
                    vec![Reply::text(format!("✅ Video removed from the posted list:\n{url}"))]
                } else {
                    vec![Reply::text(format!("❌ Video not found in the posted list:\n{url}"))]
                }
            }
            Err(e) => {
                error!(url, error = %e, "failed to remove video");
                vec![Reply::text(STORAGE_ERROR)]
            }
        }
    }

    async fn list_posts(&self) -> Vec<Reply> {
        match self.ledger.all().await {
            Ok(urls) => format_listing(urls.into_iter().collect())
                .into_iter()
                .map(Reply::text)
                .collect(),
            Err(e) => {
                error!(error = %e, "failed to read ledger");
                vec![Reply::text(STORAGE_ERROR)]
            }
        }
    }
}
