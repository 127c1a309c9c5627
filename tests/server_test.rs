//! Integration tests for the HTTP transport, over a raw TCP client

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use shellgate::Executor;
use shellgate::server::{self, ServerState};
use shellgate::store::SessionDb;
use tempfile::TempDir;

const TOKEN: &str = "test-secret";

fn start_server(temp: &TempDir) -> SocketAddr {
    let db = SessionDb::open(&temp.path().join("sessions.db")).expect("open db");
    let state = Arc::new(ServerState::new(
        Executor::new(),
        db,
        "operator".to_string(),
        Some(TOKEN.to_string()),
    ));
    let (addr, _handle) = server::start(state, 0).expect("start server");
    addr
}

fn request(addr: SocketAddr, method: &str, path: &str, token: Option<&str>, body: Option<&str>) -> (u16, serde_json::Value) {
    let mut raw = format!("{} {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n", method, path);
    if let Some(token) = token {
        raw.push_str(&format!("X-Shellgate-Token: {}\r\n", token));
    }
    match body {
        Some(body) => {
            raw.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ));
        }
        None => raw.push_str("\r\n"),
    }

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.write_all(raw.as_bytes()).expect("send request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");

    let status: u16 = response
        .split_whitespace()
        .nth(1)
        .expect("status code")
        .parse()
        .expect("numeric status");
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b)
        .unwrap_or("");
    let json = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[test]
fn ping_rejects_missing_token() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, body) = request(addr, "GET", "/ping", None, None);
    assert_eq!(status, 401);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = request(addr, "GET", "/ping", Some(TOKEN), None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[test]
fn run_returns_base64_output_and_prompt_state() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, body) = request(
        addr,
        "POST",
        "/run",
        Some(TOKEN),
        Some("{\"command\":\"echo \\\"123456\\\"\"}"),
    );
    assert_eq!(status, 200);

    let encoded = body["result"].as_str().expect("result field");
    let decoded = general_purpose::STANDARD.decode(encoded).expect("base64");
    assert_eq!(decoded, b"123456");

    assert!(body["user"].as_str().expect("user field").contains('@'));
    assert!(!body["workingdir"].as_str().expect("workingdir field").is_empty());
}

#[test]
fn hint_returns_matches() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, body) = request(
        addr,
        "POST",
        "/hint",
        Some(TOKEN),
        Some("{\"value\":\"whoam\",\"type\":\"binary\"}"),
    );
    assert_eq!(status, 200);
    let matches = body["matches"].as_array().expect("matches array");
    assert!(matches.iter().any(|m| m == "whoami"));
}

#[test]
fn reset_clears_session() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, _) = request(addr, "POST", "/run", Some(TOKEN), Some("{\"command\":\"true\"}"));
    assert_eq!(status, 200);

    let (status, body) = request(addr, "POST", "/reset", Some(TOKEN), None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[test]
fn malformed_json_is_rejected() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, _) = request(addr, "POST", "/run", Some(TOKEN), Some("{not json"));
    assert_eq!(status, 400);
}

#[test]
fn unknown_route_is_not_found() {
    let temp = TempDir::new().expect("temp dir");
    let addr = start_server(&temp);

    let (status, body) = request(addr, "GET", "/nope", Some(TOKEN), None);
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not_found");
}
