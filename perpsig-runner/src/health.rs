//! Liveness probe on its own thread.
//!
//! `GET /health` is always 200; `GET /ready` is 200 once the trading loop
//! has started and 503 before. The thread shares only two atomic flags with
//! the rest of the process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Method, Response, Server};
use tracing::{debug, info};

#[derive(Debug, Error)]
#[error("health probe could not bind {bind}: {reason}")]
pub struct HealthError {
    pub bind: String,
    pub reason: String,
}

/// Status and body for a request.
pub fn route(method: &Method, path: &str, ready: bool) -> (u16, &'static str) {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        (Method::Get, "/health") => (200, "ok"),
        (Method::Get, "/ready") if ready => (200, "ready"),
        (Method::Get, "/ready") => (503, "starting"),
        _ => (404, "not found"),
    }
}

pub struct HealthServer {
    addr: Option<SocketAddr>,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `bind` and serve until `stop` is set.
    pub fn spawn(
        bind: &str,
        ready: Arc<AtomicBool>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, HealthError> {
        let server = Server::http(bind).map_err(|e| HealthError {
            bind: bind.to_string(),
            reason: e.to_string(),
        })?;
        let addr = server.server_addr().to_ip();
        info!(bind, "health probe listening");

        let handle = std::thread::Builder::new()
            .name("health".to_string())
            .spawn(move || serve(server, &ready, &stop))
            .map_err(|e| HealthError {
                bind: bind.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { addr, handle })
    }

    /// Bound address, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Wait for the thread; returns once the stop flag has been observed.
    pub fn join(self) {
        if self.handle.join().is_err() {
            debug!("health thread panicked");
        }
    }
}

fn serve(server: Server, ready: &AtomicBool, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        let request = match server.recv_timeout(Duration::from_millis(250)) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                debug!(error = %e, "health probe receive failed");
                continue;
            }
        };
        let (status, body) = route(request.method(), request.url(), ready.load(Ordering::Relaxed));
        if let Err(e) = request.respond(Response::from_string(body).with_status_code(status)) {
            debug!(error = %e, "health probe respond failed");
        }
    }
}
