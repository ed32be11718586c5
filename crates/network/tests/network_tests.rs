// crates/network/tests/network_tests.rs
//! Integration tests against a minimal in-process HTTP server

use std::sync::{Arc, Mutex};
use std::time::Duration;
use syncwatch_core::{ItemStatus, RunSummary};
use syncwatch_network::{
    ApiClient, Client, ClientConfig, EventStreamClient, ItemListing, NetworkError,
    RUN_SUMMARY_STREAM_PATH,
};
use syncwatch_resilience::{ReconnectBackoff, RetryPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned answer per request, chosen by `route(method, path)`
async fn serve<F>(route: F) -> String
where
    F: Fn(&str, &str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let route = Arc::new(route);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let route = Arc::clone(&route);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request).to_string();
                let mut parts = head.split_whitespace();
                let method = parts.next().unwrap_or("").to_string();
                let path = parts.next().unwrap_or("").to_string();
                let answer = route(&method, &path);
                let _ = socket.write_all(answer.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn json(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

fn event_stream(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{}",
        body
    )
}

fn api(base_url: String) -> ApiClient {
    let client = Client::with_config(ClientConfig {
        base_url,
        retry_policy: Some(RetryPolicy::new(2).with_initial_delay(Duration::from_millis(10))),
        ..ClientConfig::default()
    })
    .expect("valid config");
    ApiClient::new(client)
}

#[tokio::test]
async fn test_item_listing() {
    let base = serve(|_, path| match path {
        "/api/watchlist" => json(
            "200 OK",
            r#"{"ok": true, "items": [{"key": "k1", "status": "both", "title": "Heat"}, {"key": "k2", "status": "deleted"}]}"#,
        ),
        _ => json("404 Not Found", "{}"),
    })
    .await;

    let listing = api(base).items().await.expect("listing");
    match listing {
        ItemListing::Available { items, .. } => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].status, ItemStatus::ServerDeleted);
        }
        other => panic!("expected items, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_non_success_is_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let base = serve(move |method, path| {
        log.lock().expect("lock").push(format!("{} {}", method, path));
        json("400 Bad Request", r#"{"ok": false, "error": "not found"}"#)
    })
    .await;

    let err = api(base).delete_item("tmdb:1 2").await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(
        seen.lock().expect("lock").as_slice(),
        ["DELETE /api/watchlist/tmdb:1%202".to_string()]
    );
}

#[tokio::test]
async fn test_start_run_refused() {
    let base = serve(|_, _| json("200 OK", r#"{"ok": false, "error": "Sync already running"}"#)).await;
    let err = api(base).start_run().await.unwrap_err();
    assert!(matches!(err, NetworkError::Rejected(reason) if reason == "Sync already running"));
}

#[tokio::test]
async fn test_malformed_summary_is_payload_error() {
    let base = serve(|_, _| json("200 OK", r#"{"running": true, "finished_at": "2025-01-01T00:00:00Z"}"#)).await;
    let err = api(base).run_summary().await.unwrap_err();
    assert_eq!(err.kind(), syncwatch_core::FailureKind::MalformedPayload);
}

#[tokio::test]
async fn test_stream_survives_malformed_payload() {
    let _ = env_logger::builder().is_test(true).try_init();
    let base = serve(|_, path| {
        if path == RUN_SUMMARY_STREAM_PATH {
            event_stream(
                "data: {not json\n\n: keep-alive\n\ndata: {\"running\":true,\"timeline\":{\"start\":true}}\n\n",
            )
        } else {
            json("404 Not Found", "{}")
        }
    })
    .await;

    let client = Client::with_config(ClientConfig {
        base_url: base,
        ..ClientConfig::default()
    })
    .expect("valid config");
    let streams = EventStreamClient::http(client, ReconnectBackoff::default());

    let received: Arc<Mutex<Vec<RunSummary>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handle = streams
        .open_parsed(
            "summary",
            RUN_SUMMARY_STREAM_PATH,
            RunSummary::from_json,
            move |summary| sink.lock().expect("lock").push(summary),
        )
        .expect("opened");

    for _ in 0..50 {
        if !received.lock().expect("lock").is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(streams.close(&handle).expect("closed"));

    let received = received.lock().expect("lock");
    assert_eq!(received.len(), 1);
    assert!(received[0].running);
    assert!(received[0].timeline.start);
}

#[tokio::test]
async fn test_no_delivery_after_close() {
    let base = serve(|_, _| event_stream("data: x\n\n")).await;
    let client = Client::with_config(ClientConfig {
        base_url: base,
        ..ClientConfig::default()
    })
    .expect("valid config");
    let streams = EventStreamClient::http(client, ReconnectBackoff::default());

    let count = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&count);
    let handle = streams
        .open("logs", "/api/logs/stream?tag=SYNC", move |_| {
            *counter.lock().expect("lock") += 1;
        })
        .expect("opened");

    tokio_test::assert_ok!(streams.close(&handle));
    let after_close = *count.lock().expect("lock");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*count.lock().expect("lock"), after_close);
    assert!(!streams.is_open(&handle));
}

#[tokio::test]
async fn test_reopen_replaces_subscription() {
    let base = serve(|_, _| event_stream("")).await;
    let client = Client::with_config(ClientConfig {
        base_url: base,
        ..ClientConfig::default()
    })
    .expect("valid config");
    let streams = EventStreamClient::http(client, ReconnectBackoff::default());

    let first = streams.open("summary", "/a", |_| {}).expect("opened");
    let second = streams.open("summary", "/b", |_| {}).expect("opened");
    assert!(!streams.is_open(&first));
    assert!(streams.is_open(&second));
    assert!(!streams.close(&first).expect("registry ok"));
    assert!(streams.close(&second).expect("registry ok"));
}
