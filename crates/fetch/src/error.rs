use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Could not prepare download directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloader exited with code {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    #[error("Downloader did not report an output file")]
    NoOutputPath,

    #[error("Downloaded file not found on disk: {}", .0.display())]
    MissingFile(PathBuf),
}
