// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use spoolman_server::{build_router, AppState, ServerConfig};
use spoolman_store::Store;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: PathBuf::from("/tmp/spoolman-test"),
        db_path: PathBuf::from(":memory:"),
        client_dist: PathBuf::from("does-not-exist"),
        log_json: false,
        max_find_limit: 1000,
        git_commit: "13".to_string(),
        build_date: "08-02-2024".to_string(),
    }
}

async fn spawn_server() -> std::net::SocketAddr {
    let store = Store::open_in_memory().expect("open store");
    let app = build_router(AppState::new(store, Arc::new(test_config())));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = match body {
        Some(body) => format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
        None => format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"),
    };
    stream.write_all(req.as_bytes()).await.expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, head.to_string(), body.to_string())
}

fn json_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("json body")
}

#[tokio::test]
async fn health_and_info_report_service_status() {
    let addr = spawn_server().await;
    let (status, _, body) = send_raw(addr, "GET", "/api/v1/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body)["status"], "healthy");

    let (status, _, body) = send_raw(addr, "GET", "/api/v1/info", None).await;
    assert_eq!(status, 200);
    let info = json_body(&body);
    assert_eq!(info["git_commit"], "13");
    assert_eq!(info["build_date"], "08-02-2024");
    assert_eq!(info["db_type"], "sqlite");
}

#[tokio::test]
async fn vendor_lifecycle_over_the_wire() {
    let addr = spawn_server().await;
    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/api/v1/vendor",
        Some(r#"{"name": "Prusament", "comment": "reliable"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let vendor = json_body(&body);
    assert_eq!(vendor["id"], 1);
    assert_eq!(vendor["name"], "Prusament");

    let (status, head, body) = send_raw(addr, "GET", "/api/v1/vendor", None).await;
    assert_eq!(status, 200);
    assert!(
        head.to_ascii_lowercase().contains("x-total-count: 1"),
        "missing total count header in: {head}"
    );
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(1));

    let (status, _, body) = send_raw(
        addr,
        "PATCH",
        "/api/v1/vendor/1",
        Some(r#"{"comment": null}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert!(json_body(&body).get("comment").is_none());

    let (status, _, body) = send_raw(addr, "DELETE", "/api/v1/vendor/1", None).await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body)["message"], "OK");

    let (status, _, body) = send_raw(addr, "GET", "/api/v1/vendor/1", None).await;
    assert_eq!(status, 404);
    assert_eq!(json_body(&body)["code"], "not_found");
}

#[tokio::test]
async fn spool_use_endpoint_updates_consumption() {
    let addr = spawn_server().await;
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/v1/filament",
        Some(r#"{"name": "Galaxy Black", "density": 1.24, "diameter": 1.75, "weight": 1000, "spool_weight": 200}"#),
    )
    .await;
    assert_eq!(status, 200);
    let (status, _, _) = send_raw(addr, "POST", "/api/v1/spool", Some(r#"{"filament_id": 1}"#)).await;
    assert_eq!(status, 200);

    let (status, _, body) = send_raw(
        addr,
        "PUT",
        "/api/v1/spool/1/use",
        Some(r#"{"use_weight": 250}"#),
    )
    .await;
    assert_eq!(status, 200);
    let spool = json_body(&body);
    assert_eq!(spool["used_weight"], 250.0);
    assert_eq!(spool["remaining_weight"], 750.0);

    let (status, _, body) = send_raw(
        addr,
        "PUT",
        "/api/v1/spool/1/measure",
        Some(r#"{"weight": 900}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body)["used_weight"], 300.0);
}

#[tokio::test]
async fn invalid_query_parameters_are_rejected() {
    let addr = spawn_server().await;
    let (status, _, body) = send_raw(addr, "GET", "/api/v1/spool?limit=0", None).await;
    assert_eq!(status, 400);
    assert_eq!(json_body(&body)["code"], "invalid_query_parameter");

    let (status, _, _) = send_raw(addr, "GET", "/api/v1/vendor?sort=name:sideways", None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn deleting_referenced_vendor_conflicts() {
    let addr = spawn_server().await;
    send_raw(addr, "POST", "/api/v1/vendor", Some(r#"{"name": "Prusament"}"#)).await;
    send_raw(
        addr,
        "POST",
        "/api/v1/filament",
        Some(r#"{"vendor_id": 1, "density": 1.24, "diameter": 1.75}"#),
    )
    .await;
    let (status, _, body) = send_raw(addr, "DELETE", "/api/v1/vendor/1", None).await;
    assert_eq!(status, 409);
    assert_eq!(json_body(&body)["code"], "delete_conflict");
}

async fn ws_handshake(addr: std::net::SocketAddr, path: &str) -> tokio::net::TcpStream {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = format!(
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(req.as_bytes()).await.expect("write upgrade");
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.expect("read upgrade reply");
        assert!(n > 0, "connection closed during upgrade");
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head).to_string();
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected upgrade reply: {head}");
    stream
}

/// Client frames must be masked; an all-zero key keeps the payload bytes
/// readable on the wire.
async fn ws_send_text(stream: &mut tokio::net::TcpStream, text: &str) {
    let payload = text.as_bytes();
    assert!(payload.len() < 126, "test frames stay under the extended-length threshold");
    let mut frame = vec![0x81, 0x80 | payload.len() as u8, 0, 0, 0, 0];
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await.expect("write frame");
}

async fn ws_read_text(stream: &mut tokio::net::TcpStream) -> String {
    loop {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.expect("read frame header");
        assert_eq!(header[1] & 0x80, 0, "server frames are unmasked");
        let mut len = u64::from(header[1] & 0x7f);
        if len == 126 {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).await.expect("read extended length");
            len = u64::from(u16::from_be_bytes(ext));
        } else if len == 127 {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).await.expect("read extended length");
            len = u64::from_be_bytes(ext);
        }
        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).await.expect("read frame payload");
        match header[0] & 0x0f {
            0x1 => return String::from_utf8(payload).expect("text frame utf8"),
            0x8 => panic!("server closed the websocket"),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn spool_websockets_reply_healthy_and_stream_changes() {
    let addr = spawn_server().await;
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/v1/filament",
        Some(r#"{"name": "Galaxy Black", "density": 1.24, "diameter": 1.75, "weight": 1000}"#),
    )
    .await;
    assert_eq!(status, 200);

    let mut collection = ws_handshake(addr, "/api/v1/spool").await;
    ws_send_text(&mut collection, "ping").await;
    assert_eq!(ws_read_text(&mut collection).await, r#"{"status": "healthy"}"#);

    let (status, _, body) =
        send_raw(addr, "POST", "/api/v1/spool", Some(r#"{"filament_id": 1}"#)).await;
    assert_eq!(status, 200);
    let spool_id = json_body(&body)["id"].as_i64().expect("spool id");

    let event = json_body(&ws_read_text(&mut collection).await);
    assert_eq!(event["type"], "added");
    assert_eq!(event["resource"], "spool");
    assert_eq!(event["payload"]["id"], spool_id);

    let mut item = ws_handshake(addr, &format!("/api/v1/spool/{spool_id}")).await;
    ws_send_text(&mut item, "ping").await;
    assert_eq!(ws_read_text(&mut item).await, r#"{"status": "healthy"}"#);

    let (status, _, _) = send_raw(
        addr,
        "PUT",
        &format!("/api/v1/spool/{spool_id}/use"),
        Some(r#"{"use_weight": 250}"#),
    )
    .await;
    assert_eq!(status, 200);

    let event = json_body(&ws_read_text(&mut item).await);
    assert_eq!(event["type"], "updated");
    assert_eq!(event["resource"], "spool");
    assert_eq!(event["payload"]["used_weight"], 250.0);
}
