#![cfg(feature = "reqwest")]

use std::sync::Mutex;

use parcel_fetch::{
    DownloadRequest, FetchError, Flow, NetworkKind, ReqwestTransport, TransferProgress, Transport, TransportConfig,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

/// One canned response: status line and headers, then the bytes actually
/// written before the connection is closed.
struct Reply {
    head: String,
    body: Vec<u8>,
}

impl Reply {
    fn new(status: &str, headers: &[(&str, String)], body: &[u8]) -> Self {
        let mut head = format!("HTTP/1.1 {status}\r\nConnection: close\r\n");
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        Self {
            head,
            body: body.to_vec(),
        }
    }
}

/// Serves `replies` in order, one connection each, and returns the lowercased
/// request heads it saw.
async fn serve(replies: Vec<Reply>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut heads = Vec::new();
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            heads.push(read_head(&mut socket).await);
            socket.write_all(reply.head.as_bytes()).await.unwrap();
            socket.write_all(&reply.body).await.unwrap();
            let _ = socket.shutdown().await;
        }
        heads
    });
    (Url::parse(&format!("http://{addr}/attachments/7")).unwrap(), handle)
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if socket.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).to_lowercase()
}

fn body() -> Vec<u8> { (0..1000u32).map(|i| (i % 256) as u8).collect() }

fn transport() -> ReqwestTransport { ReqwestTransport::new(TransportConfig::default()).unwrap() }

#[tokio::test]
async fn test_download_streams_body_with_progress() {
    let body = body();
    let (url, server) = serve(vec![Reply::new(
        "200 OK",
        &[("Content-Length", body.len().to_string())],
        &body,
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"))
        .header("Content-Type", "application/octet-stream");

    let seen = Mutex::new(Vec::new());
    let on_progress = |p: TransferProgress| {
        seen.lock().unwrap().push(p);
        Flow::Continue
    };
    let path = transport().download(&request, &on_progress).await.unwrap();

    assert_eq!(path, request.destination);
    assert_eq!(std::fs::read(&path).unwrap(), body);
    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.last(), Some(&TransferProgress::new(1000, Some(1000))));
    let heads = server.await.unwrap();
    assert!(heads[0].starts_with("get /attachments/7 "));
    assert!(heads[0].contains("content-type: application/octet-stream"));
}

#[tokio::test]
async fn test_dropped_connection_resumes_with_range() {
    let body = body();
    let (url, server) = serve(vec![
        Reply::new(
            "200 OK",
            &[
                ("Content-Length", body.len().to_string()),
                ("Accept-Ranges", "bytes".to_string()),
                ("ETag", "\"v1\"".to_string()),
            ],
            &body[..400],
        ),
        Reply::new(
            "206 Partial Content",
            &[
                ("Content-Length", "600".to_string()),
                ("Content-Range", "bytes 400-999/1000".to_string()),
            ],
            &body[400..],
        ),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"));
    let transport = transport();
    let on_progress = |_: TransferProgress| Flow::Continue;

    let failure = transport.download(&request, &on_progress).await.unwrap_err();
    assert!(failure.error.is_retryable(), "{failure}");
    let token = failure.resume.expect("server advertised byte ranges");
    assert_eq!(token.offset(), 400);

    let last = Mutex::new(None);
    let on_progress = |p: TransferProgress| {
        *last.lock().unwrap() = Some(p);
        Flow::Continue
    };
    let path = transport.resume(token, &request.destination, &on_progress).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);
    assert_eq!(last.into_inner().unwrap(), Some(TransferProgress::new(1000, Some(1000))));
    let heads = server.await.unwrap();
    assert!(heads[1].contains("range: bytes=400-"));
    assert!(heads[1].contains("if-range: \"v1\""));
}

#[tokio::test]
async fn test_misaligned_partial_content_restarts_from_zero() {
    let body = body();
    let ranged = [
        ("Content-Length", body.len().to_string()),
        ("Accept-Ranges", "bytes".to_string()),
    ];
    let (url, server) = serve(vec![
        Reply::new("200 OK", &ranged, &body[..400]),
        Reply::new(
            "206 Partial Content",
            &[
                ("Content-Length", "600".to_string()),
                ("Content-Range", "bytes 0-599/1000".to_string()),
            ],
            &body[..600],
        ),
        Reply::new("200 OK", &ranged, &body),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"));
    let transport = transport();
    let on_progress = |_: TransferProgress| Flow::Continue;

    let token = transport
        .download(&request, &on_progress)
        .await
        .unwrap_err()
        .resume
        .expect("server advertised byte ranges");
    let path = transport.resume(token, &request.destination, &on_progress).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);
    let heads = server.await.unwrap();
    assert_eq!(heads.len(), 3);
    assert!(heads[1].contains("range: bytes=400-"));
    assert!(!heads[2].contains("range:"));
}

#[tokio::test]
async fn test_dropped_connection_without_ranges_is_not_resumable() {
    let body = body();
    let (url, _server) = serve(vec![Reply::new(
        "200 OK",
        &[("Content-Length", body.len().to_string())],
        &body[..300],
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"));

    let failure = transport()
        .download(&request, &|_: TransferProgress| Flow::Continue)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, FetchError::Network { kind: NetworkKind::Interrupted, .. }), "{failure}");
    assert!(failure.resume.is_none());
}

#[tokio::test]
async fn test_http_error_status() {
    let (url, _server) = serve(vec![Reply::new("404 Not Found", &[("Content-Length", "0".to_string())], b"")]).await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"));

    let failure = transport()
        .download(&request, &|_: TransferProgress| Flow::Continue)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, FetchError::Http { status: 404, .. }));
    assert!(!failure.error.is_retryable());
}

#[tokio::test]
async fn test_abort_stops_transfer() {
    let body = body();
    let (url, _server) = serve(vec![Reply::new(
        "200 OK",
        &[("Content-Length", body.len().to_string())],
        &body,
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(url, dir.path().join("blob.part"));

    let failure = transport()
        .download(&request, &|_: TransferProgress| Flow::Abort)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, FetchError::Aborted));
}
