//! Media download for selected candidates.
//!
//! [`MediaFetcher`] turns a canonical video URL into a local file under a
//! transient working directory. The production implementation shells out to
//! `yt-dlp`.

mod error;
mod ytdlp;

use std::path::PathBuf;

pub use error::FetchError;
pub use ytdlp::YtDlpFetcher;

#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `url` and return the path of the file on disk.
    ///
    /// A success is only reported once the file has been verified to exist.
    async fn download(&self, url: &str) -> Result<PathBuf, FetchError>;
}
