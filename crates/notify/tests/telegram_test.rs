//! Bot API client against a local responder that captures full requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reelay_notify::{ChannelSink, ReplyKeyboard, TelegramClient, TelegramError, VideoSink};

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    head: String,
    body: String,
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Answers every request with `status` / `body` and records what it received.
async fn spawn_api(status: &'static str, body: &'static str) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_task = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let seen = seen_in_task.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let head_end = loop {
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                };
                let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                let wanted = head_end + content_length(&head);
                while buf.len() < wanted {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let path = head
                    .lines()
                    .next()
                    .and_then(|l| l.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                let request_body = String::from_utf8_lossy(&buf[head_end..]).to_string();
                seen.lock().unwrap().push(Captured {
                    path,
                    head,
                    body: request_body,
                });

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), seen)
}

const OK_TRUE: &str = r#"{"ok":true,"result":true}"#;

#[tokio::test]
async fn send_message_posts_text_and_keyboard() {
    let (base, seen) = spawn_api("200 OK", OK_TRUE).await;
    let client = TelegramClient::with_api_base("123:ABC", base).unwrap();
    let keyboard = ReplyKeyboard::from_rows([vec!["/add_post", "/list_posts"], vec!["/delete_post"]]);

    client.send_message(42, "hello", Some(&keyboard)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/bot123:ABC/sendMessage");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["chat_id"], 42);
    assert_eq!(body["text"], "hello");
    assert_eq!(body["reply_markup"]["keyboard"][1][0]["text"], "/delete_post");
}

#[tokio::test]
async fn send_message_without_keyboard_omits_markup() {
    let (base, seen) = spawn_api("200 OK", OK_TRUE).await;
    let client = TelegramClient::with_api_base("t", base).unwrap();

    client.send_message(7, "plain", None).await.unwrap();

    let body: serde_json::Value = serde_json::from_str(&seen.lock().unwrap()[0].body).unwrap();
    assert!(body.get("reply_markup").is_none());
}

#[tokio::test]
async fn channel_sink_uploads_file_as_multipart() {
    let (base, seen) = spawn_api("200 OK", r#"{"ok":true,"result":{"message_id":1}}"#).await;
    let client = TelegramClient::with_api_base("t", base).unwrap();
    let sink = ChannelSink::new(client, -1001234);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("7300000000000000001.mp4");
    std::fs::write(&file, b"fake-video-bytes").unwrap();

    sink.send_video(&file).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].path, "/bott/sendVideo");
    assert!(seen[0].head.to_ascii_lowercase().contains("multipart/form-data"));
    assert!(seen[0].body.contains("-1001234"));
    assert!(seen[0].body.contains("filename=\"7300000000000000001.mp4\""));
    assert!(seen[0].body.contains("fake-video-bytes"));
    assert!(seen[0].body.contains("Content-Type: video/mp4"));
}

#[tokio::test]
async fn upload_streams_file_with_its_own_content_type() {
    let (base, seen) = spawn_api("200 OK", r#"{"ok":true,"result":{"message_id":2}}"#).await;
    let client = TelegramClient::with_api_base("t", base).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.webm");
    let payload = "webm-".repeat(20_000);
    std::fs::write(&file, &payload).unwrap();

    client.send_video(5, &file).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen[0].body.contains("filename=\"clip.webm\""));
    assert!(seen[0].body.contains("Content-Type: video/webm"));
    assert!(seen[0].body.contains(&payload));
}

#[tokio::test]
async fn unreadable_upload_is_io_error() {
    let (base, seen) = spawn_api("200 OK", OK_TRUE).await;
    let client = TelegramClient::with_api_base("t", base).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = client
        .send_video(1, &dir.path().join("missing.mp4"))
        .await
        .unwrap_err();

    assert!(matches!(err, TelegramError::Io { .. }));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_surfaces_retry_after() {
    let (base, _) = spawn_api(
        "429 Too Many Requests",
        r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 12","parameters":{"retry_after":12}}"#,
    )
    .await;
    let client = TelegramClient::with_api_base("t", base).unwrap();

    let err = client.send_message(1, "x", None).await.unwrap_err();
    assert!(matches!(err, TelegramError::RateLimited { retry_after_secs: 12 }));
}

#[tokio::test]
async fn api_rejection_carries_description() {
    let (base, _) = spawn_api(
        "400 Bad Request",
        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
    )
    .await;
    let client = TelegramClient::with_api_base("t", base).unwrap();

    let err = client.send_message(1, "x", None).await.unwrap_err();
    match err {
        TelegramError::Api { description } => assert_eq!(description, "Bad Request: chat not found"),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn get_updates_decodes_messages_and_sends_offset() {
    let (base, seen) = spawn_api(
        "200 OK",
        r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"from":{"id":5},"chat":{"id":5},"text":"/start"}},
            {"update_id":11,"channel_post":{"message_id":2}}
        ]}"#,
    )
    .await;
    let client = TelegramClient::with_api_base("t", base).unwrap();

    let updates = client.get_updates(Some(10), Duration::from_secs(1)).await.unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
    assert!(updates[1].message.is_none());
    let body: serde_json::Value = serde_json::from_str(&seen.lock().unwrap()[0].body).unwrap();
    assert_eq!(body["offset"], 10);
    assert_eq!(body["timeout"], 1);
}
