use std::path::PathBuf;

/// Errors raised by the candidate source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {context}")]
    Status {
        status: reqwest::StatusCode,
        context: String,
    },

    #[error("Unexpected upstream payload: {0}")]
    Payload(String),

    #[error("Session file {path}: {source}")]
    SessionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file {path} is not valid JSON: {source}")]
    SessionFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not establish a session after {attempts} attempts: {last_error}")]
    SessionUnavailable { attempts: u32, last_error: String },
}
