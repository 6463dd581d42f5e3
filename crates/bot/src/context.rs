//! Process-wide wiring, built once in `main` and torn down at shutdown.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use reelay_core::Config;
use reelay_fetch::YtDlpFetcher;
use reelay_ledger::{Ledger, SqliteLedger};
use reelay_notify::{ChannelSink, TelegramClient};
use reelay_pipeline::PublishPipeline;
use reelay_source::{SessionState, TikTokSource, TrendingSource};

use crate::handlers::CommandHandler;

pub struct AppContext {
    pub config: Config,
    pub ledger: Arc<SqliteLedger>,
    pub telegram: TelegramClient,
    pub source: Arc<TikTokSource>,
    pub handler: Arc<CommandHandler>,
}

impl AppContext {
    /// Open the ledger, build the Telegram client and establish the source
    /// session. Any failure here is fatal.
    pub async fn initialize(config: Config) -> anyhow::Result<Self> {
        let ledger = SqliteLedger::open(&config.storage.database_path)
            .await
            .with_context(|| {
                format!("opening ledger at {}", config.storage.database_path.display())
            })?;
        let ledger = Arc::new(ledger);
        info!(posted = ledger.count().await.unwrap_or_default(), "ledger ready");

        let telegram = TelegramClient::new(config.telegram.bot_token.clone())?;

        let snapshot = match SessionState::load(&config.source.session_file) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session snapshot");
                None
            }
        };
        if snapshot.is_none() {
            info!(mode = %config.source.browser_mode, "no saved session, starting fresh");
        }
        let source = TikTokSource::connect(&config.source, snapshot)
            .await
            .context("establishing trending source session")?;

        let handler = Arc::new(CommandHandler::new(
            ledger.clone(),
            config.telegram.admin_id,
            config.storage.platform_domain.clone(),
        ));

        Ok(Self {
            config,
            ledger,
            telegram,
            source: Arc::new(source),
            handler,
        })
    }

    /// The publish pipeline targeting the configured channel.
    pub fn pipeline(&self) -> PublishPipeline {
        PublishPipeline::new(
            self.ledger.clone(),
            self.source.clone(),
            Arc::new(YtDlpFetcher::from_config(&self.config.fetch)),
            Arc::new(ChannelSink::new(self.telegram.clone(), self.config.telegram.channel_id)),
            self.config.source.trending_count,
        )
    }

    /// Persist the current source session. Failures are logged only.
    pub async fn save_session(&self) {
        let Some(snapshot) = self.source.session_snapshot().await else {
            warn!("source has no session to save");
            return;
        };
        if let Err(e) = snapshot.save(&self.config.source.session_file) {
            warn!(error = %e, "failed to save session snapshot");
        }
    }

    pub async fn close(self) {
        self.ledger.close().await;
        info!("ledger closed");
    }
}
