//! One publish cycle: select, fetch, transmit, commit, clean up.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use reelay_fetch::MediaFetcher;
use reelay_ledger::Ledger;
use reelay_notify::VideoSink;
use reelay_source::TrendingSource;

use crate::scheduler::ScheduledJob;
use crate::selection::{gather_fresh, pick, Selection};

/// Why a cycle ended before anything was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCandidates,
    NothingNew,
    LedgerUnavailable,
}

/// Terminal state of a publish cycle.
///
/// Only `Posted` leaves a new ledger entry behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    FetchFailed { url: String, reason: String },
    TransmitFailed { url: String, reason: String },
    /// Delivered, but the ledger write failed: the video may be posted again.
    CommitFailed { url: String, reason: String },
    Posted { url: String },
}

impl CycleOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, CycleOutcome::Posted { .. })
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Skipped(reason) => write!(f, "skipped ({reason:?})"),
            CycleOutcome::FetchFailed { url, reason } => write!(f, "fetch failed for {url}: {reason}"),
            CycleOutcome::TransmitFailed { url, reason } => {
                write!(f, "transmit failed for {url}: {reason}")
            }
            CycleOutcome::CommitFailed { url, reason } => {
                write!(f, "posted {url} but ledger commit failed: {reason}")
            }
            CycleOutcome::Posted { url } => write!(f, "posted {url}"),
        }
    }
}

/// Moves one trending video from the source into the channel per cycle.
pub struct PublishPipeline {
    ledger: Arc<dyn Ledger>,
    source: Arc<dyn TrendingSource>,
    fetcher: Arc<dyn MediaFetcher>,
    sink: Arc<dyn VideoSink>,
    candidate_count: usize,
    rng: Mutex<StdRng>,
}

impl PublishPipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        source: Arc<dyn TrendingSource>,
        fetcher: Arc<dyn MediaFetcher>,
        sink: Arc<dyn VideoSink>,
        candidate_count: usize,
    ) -> Self {
        Self {
            ledger,
            source,
            fetcher,
            sink,
            candidate_count,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source used to pick among fresh candidates.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Run a single cycle. Failures are reported in the outcome, never raised.
    pub async fn run_cycle(&self) -> CycleOutcome {
        info!(stage = "selecting", count = self.candidate_count, "publish cycle started");
        let gathered = gather_fresh(
            self.source.as_ref(),
            self.ledger.as_ref(),
            self.candidate_count,
        )
        .await;
        let selection = gathered.map(|fresh| match fresh {
            Some(fresh) => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                pick(&fresh, &mut *rng)
            }
            None => Selection::NoCandidates,
        });

        let (video, url) = match selection {
            Ok(Selection::Picked { video, url }) => (video, url),
            Ok(Selection::NoCandidates) => {
                info!(stage = "selecting", "no trending videos available, skipping cycle");
                return CycleOutcome::Skipped(SkipReason::NoCandidates);
            }
            Ok(Selection::NothingNew) => {
                info!(stage = "selecting", "all trending videos already posted, skipping cycle");
                return CycleOutcome::Skipped(SkipReason::NothingNew);
            }
            Err(e) => {
                error!(stage = "selecting", error = %e, "ledger unavailable, skipping cycle");
                return CycleOutcome::Skipped(SkipReason::LedgerUnavailable);
            }
        };

        info!(stage = "fetching", %video, url = %url, "downloading selected video");
        let path = match self.fetcher.download(&url).await {
            Ok(path) => path,
            Err(e) => {
                warn!(stage = "fetching", url = %url, error = %e, "download failed");
                return CycleOutcome::FetchFailed {
                    url,
                    reason: e.to_string(),
                };
            }
        };

        info!(stage = "transmitting", url = %url, sink = self.sink.sink_name(), "sending video");
        let outcome = match self.sink.send_video(&path).await {
            Ok(()) => self.commit(url).await,
            Err(e) => {
                warn!(stage = "transmitting", url = %url, error = %e, "send failed, ledger untouched");
                CycleOutcome::TransmitFailed {
                    url,
                    reason: e.to_string(),
                }
            }
        };

        remove_artifact(&path).await;
        outcome
    }

    async fn commit(&self, url: String) -> CycleOutcome {
        info!(stage = "committing", url = %url, "recording posted video");
        match self.ledger.add(&url).await {
            Ok(()) => CycleOutcome::Posted { url },
            Err(e) => {
                error!(stage = "committing", url = %url, error = %e, "video sent but not recorded");
                CycleOutcome::CommitFailed {
                    url,
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(stage = "cleanup", path = %path.display(), "removed local file"),
        Err(e) => warn!(stage = "cleanup", path = %path.display(), error = %e, "could not remove local file"),
    }
}

#[async_trait::async_trait]
impl ScheduledJob for PublishPipeline {
    fn name(&self) -> &str {
        "publish"
    }

    async fn run(&self) {
        let outcome = self.run_cycle().await;
        match &outcome {
            CycleOutcome::Posted { .. } | CycleOutcome::Skipped(_) => {
                info!(%outcome, "publish cycle finished")
            }
            _ => warn!(%outcome, "publish cycle finished without posting"),
        }
    }
}
