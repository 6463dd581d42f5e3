//! Candidate selection: trending feed minus the ledger, one picked at random.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use reelay_core::CandidateVideo;
use reelay_ledger::{Ledger, LedgerError};
use reelay_source::TrendingSource;

/// Result of a selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A never-posted candidate, with its canonical URL.
    Picked { video: CandidateVideo, url: String },
    /// The source returned nothing.
    NoCandidates,
    /// Every candidate is already in the ledger.
    NothingNew,
}

/// Candidates whose canonical URL is not in `posted`.
///
/// Duplicates within the feed collapse to their first occurrence; feed order
/// is otherwise preserved.
pub fn fresh_candidates(
    candidates: Vec<CandidateVideo>,
    posted: &HashSet<String>,
) -> Vec<(CandidateVideo, String)> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|video| {
            let url = video.canonical_url();
            if posted.contains(&url) || !seen.insert(url.clone()) {
                None
            } else {
                Some((video, url))
            }
        })
        .collect()
}

/// Fetch the trending feed and drop everything already in the ledger.
///
/// Returns `None` when the source yielded nothing at all.
pub async fn gather_fresh(
    source: &dyn TrendingSource,
    ledger: &dyn Ledger,
    count: usize,
) -> Result<Option<Vec<(CandidateVideo, String)>>, LedgerError> {
    let candidates = source.fetch_trending(count).await;
    if candidates.is_empty() {
        return Ok(None);
    }
    let total = candidates.len();

    let posted = ledger.all().await?;
    let fresh = fresh_candidates(candidates, &posted);
    debug!(total, fresh = fresh.len(), "filtered trending feed against ledger");
    Ok(Some(fresh))
}

/// Choose uniformly among `fresh`.
pub fn pick<R>(fresh: &[(CandidateVideo, String)], rng: &mut R) -> Selection
where
    R: Rng + ?Sized,
{
    match fresh.choose(rng) {
        Some((video, url)) => Selection::Picked {
            video: video.clone(),
            url: url.clone(),
        },
        None => Selection::NothingNew,
    }
}

/// Pick a trending video that has not been posted yet.
///
/// Only a ledger read failure is an error; an empty or fully-posted feed is a
/// normal [`Selection`] outcome.
pub async fn select_candidate<R>(
    source: &dyn TrendingSource,
    ledger: &dyn Ledger,
    count: usize,
    rng: &mut R,
) -> Result<Selection, LedgerError>
where
    R: Rng + Send + ?Sized,
{
    Ok(match gather_fresh(source, ledger, count).await? {
        Some(fresh) => pick(&fresh, rng),
        None => Selection::NoCandidates,
    })
}
