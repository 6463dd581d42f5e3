use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use reelay_core::config::FetchConfig;

use crate::{FetchError, MediaFetcher};

/// Output template: files are named after the upstream media id.
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Longest stderr excerpt carried in an error.
const STDERR_TAIL: usize = 2000;

/// [`MediaFetcher`] backed by the `yt-dlp` command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
    base_args: Vec<String>,
    download_dir: PathBuf,
    timeout: Duration,
}

impl YtDlpFetcher {
    /// `command` may carry leading arguments, e.g. `"python3 -m yt_dlp"`.
    pub fn new(command: &str, download_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "yt-dlp".to_string());
        Self {
            program,
            base_args: parts.collect(),
            download_dir: download_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(&config.ytdlp_path, &config.download_dir, config.timeout())
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn args(&self, url: &str) -> Vec<String> {
        let template = self.download_dir.join(OUTPUT_TEMPLATE);
        let mut args = self.base_args.clone();
        args.extend(
            [
                "--format",
                "best",
                "--no-playlist",
                "--no-progress",
                "--no-simulate",
                "--print",
                "after_move:filepath",
                "--output",
            ]
            .map(str::to_string),
        );
        args.push(template.to_string_lossy().into_owned());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn download(&self, url: &str) -> Result<PathBuf, FetchError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|source| FetchError::WorkDir {
                path: self.download_dir.clone(),
                source,
            })?;

        info!(url, program = %self.program, "downloading video");
        let child = Command::new(&self.program)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(FetchError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(url, timeout_secs = self.timeout.as_secs(), "download timed out");
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let start = (start..stderr.len())
                .find(|i| stderr.is_char_boundary(*i))
                .unwrap_or(stderr.len());
            return Err(FetchError::ExitStatus {
                code: output.status.code(),
                stderr: stderr[start..].to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reported = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or(FetchError::NoOutputPath)?;
        let path = PathBuf::from(reported);
        debug!(path = %path.display(), "downloader reported output file");

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                info!(path = %path.display(), "video downloaded");
                Ok(path)
            }
            _ => Err(FetchError::MissingFile(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_with_leading_args_is_split() {
        let fetcher = YtDlpFetcher::new("python3 -m yt_dlp", "downloads", Duration::from_secs(1));
        assert_eq!(fetcher.program, "python3");
        assert_eq!(fetcher.base_args, vec!["-m", "yt_dlp"]);
    }

    #[test]
    fn args_end_with_separator_and_url() {
        let fetcher = YtDlpFetcher::new("yt-dlp", "downloads", Duration::from_secs(1));
        let args = fetcher.args("https://www.tiktok.com/@a/video/1");
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "https://www.tiktok.com/@a/video/1");
        let out = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(
            PathBuf::from(&args[out + 1]),
            PathBuf::from("downloads").join("%(id)s.%(ext)s")
        );
        assert!(args.contains(&"after_move:filepath".to_string()));
    }
}
