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

//! Test utilities for integration tests

use std::sync::atomic::{AtomicU64, Ordering};

use eyre::{eyre, Result};
use serde_json::{json, Value};

/// Initialization utilities for tests
pub mod init {
    /// Initialize logging for an integration test
    pub fn init_test_environment() {
        ease_common::logging::ensure_test_logging(None);
    }
}

/// Minimal JSON-RPC client for the bridge's own server
#[derive(Debug)]
pub struct BridgeClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl BridgeClient {
    /// Client for the bridge listening on `port`
    pub fn new(port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://127.0.0.1:{port}"),
            next_id: AtomicU64::new(1),
        }
    }

    /// Base URL of the bridge
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a request and return the raw response object
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id});
        let response = self.client.post(&self.url).json(&request).send().await?;
        Ok(response.json().await?)
    }

    /// Send a request and return its result, failing on a JSON-RPC error
    pub async fn result(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.call(method, params).await?;
        if let Some(error) = response.get("error") {
            return Err(eyre!("{method} failed: {error}"));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Whether `GET /health` answers
    pub async fn is_healthy(&self) -> bool {
        match self.client.get(format!("{}/health", self.url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// In-process bridge sessions wired to a [`MockHost`](crate::mock_host::MockHost)
pub mod session {
    use std::sync::Arc;

    use ease_common::config::BridgeConfig;
    use ease_engine::{EngineRpcServer, RpcHost, RpcServerHandle, ShutdownSignal};
    use eyre::Result;
    use tokio::runtime::Handle;
    use tracing::info;

    use super::BridgeClient;
    use crate::mock_host::MockHost;

    /// A bridge server bound to a mock host, driven through [`BridgeClient`]
    pub struct Session {
        /// The mock host
        pub host: MockHost,
        /// Client for the bridge server
        pub client: BridgeClient,
        /// Shutdown signal shared with the executor
        pub signal: Arc<ShutdownSignal>,
        server: Option<RpcServerHandle>,
    }

    impl Session {
        /// Start a mock host and a bridge server using `config`, then perform
        /// the startup handshake the way the binary does
        pub async fn start(config: BridgeConfig) -> Result<Self> {
            let host = MockHost::start().await?;
            let rpc_host = RpcHost::new(&host.url(), config.request_timeout(), Handle::current())?
                .with_max_frames(config.trace.max_frame_depth);

            let signal = Arc::new(ShutdownSignal::new());
            let server = EngineRpcServer::new(config, signal.clone()).start(rpc_host.clone()).await?;
            rpc_host.startup_complete(server.port()).await?;
            info!("Session started: bridge {} host {}", server.addr(), host.url());

            Ok(Self { host, client: BridgeClient::new(server.port()), signal, server: Some(server) })
        }

        /// Port of the bridge server
        pub fn port(&self) -> Option<u16> {
            self.server.as_ref().map(RpcServerHandle::port)
        }

        /// Stop the bridge server
        pub fn stop(&mut self) -> Result<()> {
            match self.server.take() {
                Some(server) => server.shutdown(),
                None => Ok(()),
            }
        }
    }

    impl Drop for Session {
        fn drop(&mut self) {
            let _ = self.stop();
        }
    }
}
