//! HTTP control surface for the companion device.
//!
//! `GET /state` returns a classifier snapshot; `POST /command` frames a
//! command onto the child's PTY. Any origin may call either endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{Error, Result};
use crate::pty::{CommandDispatcher, StateHandle, StateSnapshot};

#[derive(Clone)]
struct ControlState {
    state: StateHandle,
    dispatcher: CommandDispatcher,
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    status: &'static str,
    command: String,
}

pub fn router(state: StateHandle, dispatcher: CommandDispatcher) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/command", post(post_command))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ControlState { state, dispatcher })
}

async fn get_state(State(ctl): State<ControlState>) -> Json<StateSnapshot> {
    Json(ctl.state.snapshot())
}

async fn post_command(State(ctl): State<ControlState>, body: Bytes) -> Response {
    // Parsed by hand so a missing content-type is still accepted
    let request: CommandRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejected command request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let dispatcher = ctl.dispatcher.clone();
    let command = request.command.clone();
    let sent = tokio::task::spawn_blocking(move || dispatcher.dispatch(&command))
        .await
        .unwrap_or(false);

    Json(CommandResponse {
        status: if sent { "sent" } else { "failed" },
        command: request.command,
    })
    .into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// A running control surface.
pub struct ControlServer {
    addr: SocketAddr,
    runtime: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind `addr` and serve `app` on `runtime` until `stop` is called.
    pub fn start(runtime: &Handle, addr: SocketAddr, app: Router) -> Result<Self> {
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "control surface error");
            }
        });

        tracing::info!(addr = %local_addr, "control surface listening");
        Ok(Self {
            addr: local_addr,
            runtime: runtime.clone(),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Stop accepting connections and wait up to `drain` for in-flight requests.
    pub fn stop(&mut self, drain: Duration) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            match self.runtime.block_on(tokio::time::timeout(drain, task)) {
                Ok(_) => tracing::debug!("control surface stopped"),
                Err(_) => tracing::warn!("control surface did not drain in time"),
            }
        }
    }
}

#[cfg(test)]
impl ControlServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
