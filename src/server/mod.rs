//! HTTP server for the browser shell client
//!
//! Listens on localhost and accepts:
//! - GET /ping - liveness/version check
//! - POST /run - execute a command, output returned base64-encoded
//! - POST /hint - autocomplete matches for a partial token
//! - POST /reset - clear the stored working directory

use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tiny_http::{Response, Server};
use tracing::{error, info};

use crate::executor::Executor;
use crate::hint::HintKind;
use crate::session::Session;
use crate::store::SessionDb;

const AUTH_HEADER: &str = "X-Shellgate-Token";
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state behind the HTTP endpoints.
pub struct ServerState {
    executor: Executor,
    db: SessionDb,
    caller: String,
    auth_token: Option<String>,
    /// The working directory is process-wide state, so calls that touch it
    /// must not interleave.
    exec_lock: Mutex<()>,
}

impl ServerState {
    pub fn new(executor: Executor, db: SessionDb, caller: String, auth_token: Option<String>) -> Self {
        Self {
            executor,
            db,
            caller,
            auth_token,
            exec_lock: Mutex::new(()),
        }
    }

    fn session(&self) -> Session<'_> {
        Session::new(&self.executor, &self.db, &self.db, &self.caller)
    }
}

/// Command execution request from the browser client.
#[derive(Debug, Deserialize)]
struct RunRequest {
    command: String,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    /// Base64-encoded output; it may contain arbitrary bytes and control
    /// characters the JSON layer should not see raw.
    result: String,
    user: String,
    workingdir: String,
}

/// Autocomplete request from the browser client.
#[derive(Debug, Deserialize)]
struct HintRequest {
    value: String,
    #[serde(rename = "type", default = "default_hint_type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct HintResponse {
    matches: Vec<String>,
    user: String,
    workingdir: String,
}

fn default_hint_type() -> String {
    "binary".to_string()
}

/// Bind the server and process requests on a background thread.
/// Returns the bound address and the accept-loop handle.
pub fn start(state: Arc<ServerState>, port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
    let bind_addr = format!("127.0.0.1:{}", port);
    let server =
        Server::http(&bind_addr).map_err(|e| anyhow!("Failed to bind {}: {}", bind_addr, e))?;
    let addr = server
        .server_addr()
        .to_ip()
        .context("server bound to a non-IP address")?;

    let auth_enabled = state.auth_token.is_some();
    info!(
        "[shellgate:http] Server listening on http://{} (auth: {})",
        addr,
        if auth_enabled { "enabled" } else { "disabled" }
    );

    let handle = thread::spawn(move || {
        for request in server.incoming_requests() {
            handle_request(&state, request);
        }
    });
    Ok((addr, handle))
}

fn handle_request(state: &ServerState, mut request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or(url.as_str());

    if !is_authorized(&request, state.auth_token.as_deref()) {
        let response = Response::from_string("{\"error\":\"unauthorized\"}")
            .with_status_code(401)
            .with_header(json_content_type());
        let _ = request.respond(response);
        return;
    }

    match (method.as_str(), path) {
        ("GET", "/ping") => {
            respond_json(
                request,
                200,
                serde_json::json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            );
        }
        ("POST", "/run") => {
            let body = match read_request_body(&mut request) {
                Ok(body) => body,
                Err(response) => {
                    let _ = request.respond(response);
                    return;
                }
            };
            handle_run(state, &body, request);
        }
        ("POST", "/hint") => {
            let body = match read_request_body(&mut request) {
                Ok(body) => body,
                Err(response) => {
                    let _ = request.respond(response);
                    return;
                }
            };
            handle_hint(state, &body, request);
        }
        ("POST", "/reset") => {
            handle_reset(state, request);
        }
        _ => {
            let response = Response::from_string("{\"error\":\"not_found\"}")
                .with_status_code(404)
                .with_header(json_content_type());
            let _ = request.respond(response);
        }
    }
}

fn handle_run(state: &ServerState, body: &str, request: tiny_http::Request) {
    let run: RunRequest = match serde_json::from_str(body) {
        Ok(run) => run,
        Err(e) => {
            error!("[shellgate:http] Invalid run JSON: {}", e);
            respond_json(request, 400, serde_json::json!({"error": e.to_string()}));
            return;
        }
    };

    info!("[shellgate:http] run: {:?}", run.command);
    // A poisoned lock only means an earlier call panicked mid-run.
    let _guard = state
        .exec_lock
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    match state.session().run(&run.command) {
        Ok(result) => {
            let response = RunResponse {
                result: general_purpose::STANDARD.encode(result.output.as_bytes()),
                user: result.user,
                workingdir: result.working_dir,
            };
            respond_json(
                request,
                200,
                serde_json::to_value(response).unwrap_or_default(),
            );
        }
        Err(e) => {
            error!("[shellgate:http] run failed: {:#}", e);
            respond_json(request, 500, serde_json::json!({"error": e.to_string()}));
        }
    }
}

fn handle_hint(state: &ServerState, body: &str, request: tiny_http::Request) {
    let hint: HintRequest = match serde_json::from_str(body) {
        Ok(hint) => hint,
        Err(e) => {
            error!("[shellgate:http] Invalid hint JSON: {}", e);
            respond_json(request, 400, serde_json::json!({"error": e.to_string()}));
            return;
        }
    };

    let _guard = state
        .exec_lock
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    match state.session().hint(&hint.value, HintKind::from(hint.kind.as_str())) {
        Ok(outcome) => {
            let response = HintResponse {
                matches: outcome.matches,
                user: outcome.user,
                workingdir: outcome.working_dir,
            };
            respond_json(
                request,
                200,
                serde_json::to_value(response).unwrap_or_default(),
            );
        }
        Err(e) => {
            error!("[shellgate:http] hint failed: {:#}", e);
            respond_json(request, 500, serde_json::json!({"error": e.to_string()}));
        }
    }
}

fn handle_reset(state: &ServerState, request: tiny_http::Request) {
    match state.session().reset() {
        Ok(()) => respond_json(request, 200, serde_json::json!({"status": "ok"})),
        Err(e) => {
            error!("[shellgate:http] reset failed: {:#}", e);
            respond_json(request, 500, serde_json::json!({"error": e.to_string()}));
        }
    }
}

fn is_authorized(request: &tiny_http::Request, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(AUTH_HEADER))
        .map(|h| h.value.as_str() == expected)
        .unwrap_or(false)
}

fn json_content_type() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid")
}

fn read_request_body(
    request: &mut tiny_http::Request,
) -> Result<String, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    if let Err(e) = reader.read_to_string(&mut body) {
        error!("[shellgate:http] Failed to read body: {}", e);
        let response = Response::from_string("{\"error\":\"bad_request\"}")
            .with_status_code(400)
            .with_header(json_content_type());
        return Err(response);
    }

    if body.len() > MAX_BODY_BYTES {
        let response = Response::from_string("{\"error\":\"payload_too_large\"}")
            .with_status_code(413)
            .with_header(json_content_type());
        return Err(response);
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: serde_json::Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let response = Response::from_string(body)
        .with_status_code(status_code)
        .with_header(json_content_type());
    let _ = request.respond(response);
}
