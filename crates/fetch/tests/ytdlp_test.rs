//! Drives `YtDlpFetcher` against shell scripts that mimic yt-dlp's
//! `--print after_move:filepath` contract.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use reelay_fetch::{FetchError, MediaFetcher, YtDlpFetcher};

/// Writes the output file named by the `--output` template and prints its path.
const WELL_BEHAVED: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --output) shift; tmpl="$1" ;;
  esac
  shift
done
out=$(printf '%s' "$tmpl" | sed 's/%(id)s/7300000000000000001/; s/%(ext)s/mp4/')
printf 'video-bytes' > "$out"
echo "[download] Destination: $out" >&2
echo "$out"
"#;

/// Reports success but never writes the file.
const LIES_ABOUT_FILE: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --output) shift; tmpl="$1" ;;
  esac
  shift
done
echo "$tmpl" | sed 's/%(id)s/ghost/; s/%(ext)s/mp4/'
"#;

const UNSUPPORTED: &str = r#"
echo "ERROR: Unsupported URL: $*" >&2
exit 1
"#;

const SILENT: &str = "exit 0\n";

const HANGS: &str = "sleep 30\n";

fn fetcher_for(script_dir: &Path, body: &str, download_dir: &Path, timeout: Duration) -> YtDlpFetcher {
    let script = script_dir.join("fake-yt-dlp.sh");
    std::fs::write(&script, body).unwrap();
    YtDlpFetcher::new(&format!("sh {}", script.display()), download_dir, timeout)
}

#[tokio::test]
async fn download_returns_verified_path() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let downloads = work.path().join("downloads");
    let fetcher = fetcher_for(scripts.path(), WELL_BEHAVED, &downloads, Duration::from_secs(10));

    let path = fetcher
        .download("https://www.tiktok.com/@a/video/7300000000000000001")
        .await
        .unwrap();

    assert_eq!(path, downloads.join("7300000000000000001.mp4"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "video-bytes");
}

#[tokio::test]
async fn missing_file_after_reported_success_is_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(scripts.path(), LIES_ABOUT_FILE, work.path(), Duration::from_secs(10));

    let err = fetcher.download("https://www.tiktok.com/@a/video/1").await.unwrap_err();
    match err {
        FetchError::MissingFile(path) => assert_eq!(path, work.path().join("ghost.mp4")),
        other => panic!("expected MissingFile, got {other:?}"),
    }
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(scripts.path(), UNSUPPORTED, work.path(), Duration::from_secs(10));

    let err = fetcher.download("https://www.tiktok.com/@a/video/1").await.unwrap_err();
    match err {
        FetchError::ExitStatus { code, stderr } => {
            assert_eq!(code, Some(1));
            assert!(stderr.contains("Unsupported URL"));
        }
        other => panic!("expected ExitStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn no_reported_path_is_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(scripts.path(), SILENT, work.path(), Duration::from_secs(10));

    let err = fetcher.download("https://www.tiktok.com/@a/video/1").await.unwrap_err();
    assert!(matches!(err, FetchError::NoOutputPath));
}

#[tokio::test]
async fn hung_downloader_times_out() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(scripts.path(), HANGS, work.path(), Duration::from_millis(200));

    let err = fetcher.download("https://www.tiktok.com/@a/video/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

#[tokio::test]
async fn unknown_program_is_spawn_error() {
    let work = tempfile::tempdir().unwrap();
    let fetcher = YtDlpFetcher::new(
        "definitely-not-a-real-yt-dlp-binary",
        PathBuf::from(work.path()),
        Duration::from_secs(1),
    );
    let err = fetcher.download("https://www.tiktok.com/@a/video/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Spawn { .. }));
}
