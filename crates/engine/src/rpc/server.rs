// EASE Bridge - Scripting Engine Bridge
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! RPC server implementation with async channel proxy pattern
//!
//! The execution service is not `Send`, so it lives on a dedicated executor
//! thread. Axum handlers forward each request over a channel and await the
//! reply; the executor answers requests strictly one at a time.

use std::{net::SocketAddr, rc::Rc, sync::Arc, thread, time::Duration};

use axum::{
    extract::{Json as JsonExtract, State},
    response::Json as JsonResponse,
    routing::{get, post},
    Router,
};
use ease_common::config::BridgeConfig;
use eyre::{eyre, Result, WrapErr};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use super::{
    methods::MethodHandler,
    types::{error_codes, RpcId, RpcRequest, RpcResponse},
    utils::to_rpc_error,
};
use crate::{
    host::{HostGateway, TraceSink},
    service::{ExecutionService, ServiceError},
    shutdown::ShutdownSignal,
};

/// Stack of the executor thread; deep script recursion runs on it until the
/// call depth limit raises a `RecursionError`
pub const EXECUTOR_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Builder for the thread that owns the interpreter
pub fn executor_thread() -> thread::Builder {
    thread::Builder::new().name("ease-executor".to_string()).stack_size(EXECUTOR_STACK_SIZE)
}

/// Handle to the running RPC server
#[derive(Debug)]
pub struct RpcServerHandle {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Shutdown signal
    shutdown_tx: oneshot::Sender<()>,
    /// The serving task
    task: JoinHandle<()>,
}

impl RpcServerHandle {
    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gracefully shutdown the RPC server
    pub fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("RPC server already shut down");
        }
        Ok(())
    }

    /// Shutdown and wait up to `grace` for in-flight responses to be written
    pub async fn shutdown_and_wait(self, grace: Duration) -> Result<()> {
        let Self { shutdown_tx, task, .. } = self;
        if shutdown_tx.send(()).is_err() {
            warn!("RPC server already shut down");
        }
        match tokio::time::timeout(grace, task).await {
            Ok(joined) => joined.wrap_err("RPC server task failed"),
            Err(_) => {
                warn!("RPC server did not stop within {:?}", grace);
                Ok(())
            }
        }
    }
}

/// Thread-safe RPC state for Axum
#[derive(Clone)]
struct RpcState {
    /// Channel to send work to the executor thread
    tx: Arc<Mutex<mpsc::Sender<Work>>>,
}

/// Work item sent to the executor thread
struct Work {
    /// The RPC request to handle
    req: RpcRequest,
    /// Channel to send back the response
    rsp: oneshot::Sender<RpcResponse>,
}

/// Engine RPC server
#[derive(Debug)]
pub struct EngineRpcServer {
    config: BridgeConfig,
    shutdown: Arc<ShutdownSignal>,
}

impl EngineRpcServer {
    /// Server for a session configured by `config`
    pub fn new(config: BridgeConfig, shutdown: Arc<ShutdownSignal>) -> Self {
        Self { config, shutdown }
    }

    /// Start on the configured listen port (0 picks a free one)
    pub async fn start<H>(self, host: H) -> Result<RpcServerHandle>
    where
        H: HostGateway + TraceSink + Send + 'static,
    {
        let port = self.config.server.listen_port;
        self.start_on_port(host, port).await
    }

    /// Bind the execution service to `host` on a new executor thread, then
    /// serve it on `port`
    pub async fn start_on_port<H>(self, host: H, port: u16) -> Result<RpcServerHandle>
    where
        H: HostGateway + TraceSink + Send + 'static,
    {
        // 1) Channel between the Axum handlers and the executor
        let (tx, rx) = mpsc::channel::<Work>(self.config.server.queue_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), ServiceError>>();

        // 2) The executor owns the service for the rest of the session
        let Self { config, shutdown } = self;
        executor_thread()
            .spawn(move || run_executor(config, shutdown, host, rx, ready_tx))
            .wrap_err("Failed to spawn the executor thread")?;

        ready_rx
            .await
            .map_err(|_| eyre!("Executor thread exited during startup"))?
            .wrap_err("Failed to bind the engine to the host")?;

        // 3) Axum app with Send+Sync state
        let app = Router::new()
            .route("/", post(handle_rpc_request))
            .route("/health", get(health_check))
            .layer(CorsLayer::permissive())
            .with_state(RpcState { tx: Arc::new(Mutex::new(tx)) });

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .wrap_err_with(|| format!("Failed to bind RPC server to {addr}"))?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = served {
                error!("RPC server failed: {}", e);
            }
        });

        info!("Engine RPC server started on {}", actual_addr);

        Ok(RpcServerHandle { addr: actual_addr, shutdown_tx, task })
    }
}

fn run_executor<H>(
    config: BridgeConfig,
    shutdown: Arc<ShutdownSignal>,
    host: H,
    mut rx: mpsc::Receiver<Work>,
    ready: oneshot::Sender<Result<(), ServiceError>>,
) where
    H: HostGateway + TraceSink + 'static,
{
    let mut service = ExecutionService::new(config, shutdown);
    if let Err(e) = service.bind_host(Rc::new(host)) {
        error!("Failed to bind the engine: {}", e);
        let _ = ready.send(Err(e));
        return;
    }
    if ready.send(Ok(())).is_err() {
        warn!("Server startup was abandoned");
        return;
    }

    info!("Executor started");
    let mut handler = MethodHandler::new(service);
    while let Some(Work { req, rsp }) = rx.blocking_recv() {
        let response = handler.handle_request(req);

        // Send response back (ignore if receiver dropped)
        if rsp.send(response).is_err() {
            warn!("Client dropped connection before response");
        }
    }

    info!("Executor shutting down");
}

/// Handle RPC requests by forwarding them to the executor
async fn handle_rpc_request(
    State(state): State<RpcState>,
    JsonExtract(request): JsonExtract<RpcRequest>,
) -> JsonResponse<RpcResponse> {
    // Validate JSON-RPC version
    if request.jsonrpc != "2.0" {
        return JsonResponse(RpcResponse::failure(
            request.id,
            to_rpc_error(
                error_codes::INVALID_REQUEST,
                "Invalid Request - JSON-RPC version must be 2.0",
                None,
            ),
        ));
    }

    // Send work to the executor
    let (rsp_tx, rsp_rx) = oneshot::channel();
    let request_id = request.id.clone();
    {
        let tx = state.tx.lock().await;
        if tx.send(Work { req: request, rsp: rsp_tx }).await.is_err() {
            error!("Executor thread is dead");
            return JsonResponse(RpcResponse::failure(
                request_id,
                to_rpc_error(
                    error_codes::INTERNAL_ERROR,
                    "Internal error - executor unavailable",
                    None,
                ),
            ));
        }
    }

    // Wait for response from the executor
    let response = match rsp_rx.await {
        Ok(resp) => resp,
        Err(_) => {
            error!("Executor dropped response channel");
            RpcResponse::failure(
                RpcId::String("unknown".to_string()),
                to_rpc_error(
                    error_codes::INTERNAL_ERROR,
                    "Internal error - executor communication failed",
                    None,
                ),
            )
        }
    };

    JsonResponse(response)
}

/// Health check endpoint
async fn health_check() -> JsonResponse<serde_json::Value> {
    JsonResponse(serde_json::json!({
        "status": "healthy",
        "service": "ease-bridge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RpcState>();
    }

    #[test]
    fn test_work_message_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Work>();
    }

    #[test]
    fn test_executor_thread_survives_runaway_recursion() {
        use crate::script::{parse_program, ErrorKind, ExecMode, Interpreter, RaisedError};

        let handle = executor_thread()
            .spawn(|| {
                let program = parse_program("fn f(n) { return f(n + 1) }\nf(0)").unwrap();
                let mut interp = Interpreter::with_output(Box::new(std::io::sink()));
                interp.exec(&program, "<test>", ExecMode::Block).unwrap_err()
            })
            .unwrap();
        assert_eq!(handle.thread().name(), Some("ease-executor"));
        let RaisedError::Script(exception) = handle.join().unwrap() else {
            panic!("expected a RecursionError");
        };
        assert_eq!(exception.kind, ErrorKind::RecursionError);
    }
}
