//! Long-polling loop that feeds chat messages to the command handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use reelay_notify::{Message, TelegramClient, TelegramError};

use crate::handlers::CommandHandler;

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct PollingLoop {
    client: TelegramClient,
    handler: Arc<CommandHandler>,
    poll_timeout: Duration,
}

impl PollingLoop {
    pub fn new(client: TelegramClient, handler: Arc<CommandHandler>) -> Self {
        Self {
            client,
            handler,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Updates are handled one at a time, in order.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_timeout_secs = self.poll_timeout.as_secs(), "chat polling started");
        let mut offset: Option<i64> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.client.get_updates(offset, self.poll_timeout) => result,
            };

            let delay = match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some(message) = update.message {
                            self.dispatch(message).await;
                        }
                    }
                    continue;
                }
                Err(TelegramError::RateLimited { retry_after_secs }) => {
                    warn!(retry_after_secs, "polling rate limited, backing off");
                    Duration::from_secs(retry_after_secs)
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("chat polling stopped");
    }

    async fn dispatch(&self, message: Message) {
        let (Some(from), Some(text)) = (message.from.as_ref(), message.text.as_deref()) else {
            debug!(message_id = message.message_id, "ignoring message without sender or text");
            return;
        };

        let replies = self.handler.handle(from.id, text).await;
        for reply in replies {
            if let Err(e) = self
                .client
                .send_message(message.chat.id, &reply.text, reply.keyboard.as_ref())
                .await
            {
                warn!(chat_id = message.chat.id, error = %e, "failed to send reply");
            }
        }
    }
}
