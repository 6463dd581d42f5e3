//! Session establishment and feed fetching against a local HTTP responder.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reelay_core::config::{BrowserMode, SourceConfig};
use reelay_core::CandidateVideo;
use reelay_source::{Cookie, SessionState, SourceError, TikTokSource, TrendingSource};

type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Minimal HTTP/1.1 responder. Records every request head it sees.
async fn spawn_server(handler: Handler) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_task = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            let seen = seen_in_task.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let path = head
                    .lines()
                    .next()
                    .and_then(|l| l.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                seen.lock().unwrap().push(head);
                let response = handler(&path);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), seen)
}

fn http(status: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n{extra_headers}Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn source_config(attempts: u32) -> SourceConfig {
    SourceConfig {
        browser_mode: BrowserMode::Headless,
        ms_token: Some("seeded-token".to_string()),
        trending_count: 20,
        session_file: PathBuf::from("unused.json"),
        session_attempts: attempts,
        session_retry_delay_seconds: 0,
        request_timeout_seconds: 5,
    }
}

const FEED: &str = r#"{"statusCode":0,"itemList":[
    {"id":"1","author":{"uniqueId":"a"}},
    {"id":"2","author":{"uniqueId":"b"}},
    {"id":"3","author":{"uniqueId":"c"}}
]}"#;

#[tokio::test]
async fn warm_up_refreshes_cookies_and_feed_is_decoded() {
    let handler: Handler = Arc::new(|path: &str| {
        if path.starts_with("/api/recommend/item_list/") {
            http("200 OK", "", FEED)
        } else {
            http("200 OK", "Set-Cookie: ttwid=fresh; Path=/\r\n", "{}")
        }
    });
    let (base, seen) = spawn_server(handler).await;

    let mut snapshot = SessionState::default();
    snapshot.upsert(Cookie::new("sessionid", "restored", "127.0.0.1"));

    let source = TikTokSource::connect_to(&base, &source_config(3), Some(snapshot))
        .await
        .unwrap();

    let jar = source.session_snapshot().await.unwrap();
    assert_eq!(jar.get("ttwid"), Some("fresh"));
    assert_eq!(jar.get("sessionid"), Some("restored"));
    assert_eq!(jar.get("msToken"), Some("seeded-token"));

    let videos = source.fetch_trending(2).await;
    assert_eq!(
        videos,
        vec![CandidateVideo::new("a", "1"), CandidateVideo::new("b", "2")]
    );

    let requests = seen.lock().unwrap().clone();
    let feed_request = requests
        .iter()
        .find(|r| r.contains("/api/recommend/item_list/"))
        .expect("feed was requested");
    assert!(feed_request.contains("count=2"));
    assert!(feed_request.contains("msToken=seeded-token"));
    assert!(feed_request.to_ascii_lowercase().contains("cookie: "));
    assert!(feed_request.contains("ttwid=fresh"));
}

#[tokio::test]
async fn session_unavailable_after_exhausting_attempts() {
    let handler: Handler = Arc::new(|_: &str| http("503 Service Unavailable", "", "{}"));
    let (base, seen) = spawn_server(handler).await;

    let err = TikTokSource::connect_to(&base, &source_config(2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::SessionUnavailable { attempts: 2, .. }));
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn feed_failure_is_reported_as_empty() {
    let handler: Handler = Arc::new(|path: &str| {
        if path.starts_with("/api/") {
            http("500 Internal Server Error", "", "{}")
        } else {
            http("200 OK", "", "{}")
        }
    });
    let (base, _) = spawn_server(handler).await;

    let source = TikTokSource::connect_to(&base, &source_config(1), None)
        .await
        .unwrap();
    assert!(source.fetch_trending(20).await.is_empty());
}

#[tokio::test]
async fn feed_status_error_is_reported_as_empty() {
    let handler: Handler = Arc::new(|path: &str| {
        if path.starts_with("/api/") {
            http("200 OK", "", r#"{"statusCode":10201,"statusMsg":"expired"}"#)
        } else {
            http("200 OK", "", "{}")
        }
    });
    let (base, _) = spawn_server(handler).await;

    let source = TikTokSource::connect_to(&base, &source_config(1), None)
        .await
        .unwrap();
    assert!(source.fetch_trending(20).await.is_empty());
}
