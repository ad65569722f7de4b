#![allow(dead_code)]

use rfdm::{DownloadId, Outcome, ProgressEvent, TransferEvent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deterministic, non-repeating-per-KiB body.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn serve(server: &MockServer, file: &str, body: Vec<u8>) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/{}", file)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
    format!("{}/{}", server.uri(), file)
}

/// Minimal HTTP/1.1 server that writes `head` and `body` verbatim, then
/// either closes the connection or keeps it open without sending more.
pub async fn raw_server(head: String, body: Vec<u8>, hold_open: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let head = head.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.flush().await;
                if hold_open {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/file.bin", addr)
}

/// Body delimited by connection close, so no size is declared.
pub async fn unsized_server(body: Vec<u8>) -> String {
    raw_server("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string(), body, false).await
}

/// Declares `declared` bytes but sends only `body` before closing.
pub async fn truncating_server(declared: usize, body: Vec<u8>) -> String {
    let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", declared);
    raw_server(head, body, false).await
}

/// Sends the head and a first piece of body, then goes silent.
pub async fn stalling_server(declared: usize, first: Vec<u8>) -> String {
    let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", declared);
    raw_server(head, first, true).await
}

/// Address that refuses connections.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/file.bin", addr)
}

pub fn split(events: &[TransferEvent]) -> (Vec<ProgressEvent>, Vec<Outcome>) {
    let mut progress = Vec::new();
    let mut terminals = Vec::new();
    for event in events {
        match event {
            TransferEvent::Progress(p) => progress.push(p.clone()),
            TransferEvent::Finished(o) => terminals.push(o.clone()),
        }
    }
    (progress, terminals)
}

pub fn assert_monotonic(progress: &[ProgressEvent]) {
    for pair in progress.windows(2) {
        assert!(pair[0].bytes_written <= pair[1].bytes_written);
        assert!(pair[0].percent <= pair[1].percent, "{:?} then {:?}", pair[0].percent, pair[1].percent);
    }
    for event in progress {
        assert!(event.speed_mibps >= 0.0);
        assert!(event.speed_mibps.is_finite());
    }
}

/// Collects observer events until `terminals` downloads have finished.
pub async fn drain(
    rx: &mut mpsc::UnboundedReceiver<(DownloadId, TransferEvent)>,
    terminals: usize,
) -> HashMap<DownloadId, Vec<TransferEvent>> {
    let mut by_id: HashMap<DownloadId, Vec<TransferEvent>> = HashMap::new();
    let mut finished = 0;
    while finished < terminals {
        let (id, event) = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("observer channel closed");
        if matches!(event, TransferEvent::Finished(_)) {
            finished += 1;
        }
        by_id.entry(id).or_default().push(event);
    }
    by_id
}
