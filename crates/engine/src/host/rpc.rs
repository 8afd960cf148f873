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

//! JSON-RPC client for the host process.
//!
//! The interpreter runs on a plain thread, so the blocking [`HostGateway`]
//! and [`TraceSink`] implementations drive the async client on a runtime
//! handle. They must never be called from inside that runtime.

use std::time::Duration;

use ease_common::{HostValue, RemoteHandle, TraceEvent};
use eyre::Result;
use jsonrpsee::{
    core::{client::ClientT, client::Error as ClientError, params::ObjectParams},
    http_client::{HttpClient, HttpClientBuilder},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::{HostError, HostGateway, TraceSink};
use crate::{
    rpc::error_codes::REMOTE_EXCEPTION,
    trace::{FrameView, DEFAULT_MAX_FRAME_DEPTH},
};

/// Bridge to host: notification sent once the bridge is ready
pub const METHOD_STARTUP_COMPLETE: &str = "ease.startupComplete";
/// Bridge to host: one accepted trace step
pub const METHOD_TRACE_DISPATCH: &str = "ease.traceDispatch";
/// Bridge to host: read an attribute
pub const METHOD_GET_ATTRIBUTE: &str = "host.getAttribute";
/// Bridge to host: call a method
pub const METHOD_INVOKE: &str = "host.invoke";
/// Bridge to host: construct an instance
pub const METHOD_CONSTRUCT: &str = "host.construct";

/// JSON-RPC connection to the host
#[derive(Debug, Clone)]
pub struct RpcHost {
    client: HttpClient,
    url: String,
    runtime: Handle,
    max_frames: usize,
}

impl RpcHost {
    /// Client for the host listening at `url`
    pub fn new(url: &str, request_timeout: Duration, runtime: Handle) -> Result<Self> {
        let client = HttpClientBuilder::default().request_timeout(request_timeout).build(url)?;

        debug!("Created host client for: {}", url);
        Ok(Self { client, url: url.to_string(), runtime, max_frames: DEFAULT_MAX_FRAME_DEPTH })
    }

    /// Limit the frames sent with each trace event
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// URL of the host endpoint
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Tell the host that the bridge is serving on `port`
    pub async fn startup_complete(&self, port: u16) -> Result<(), HostError> {
        let mut params = ObjectParams::new();
        params.insert("port", port).map_err(|e| HostError::Transport(e.to_string()))?;
        self.client
            .notification(METHOD_STARTUP_COMPLETE, params)
            .await
            .map_err(map_client_error)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, HostError> {
        debug!("Making host request: {}", method);
        self.client.request(method, params).await.map_err(map_client_error)
    }

    fn call(&self, method: &str, params: Vec<Value>) -> Result<HostValue, HostError> {
        self.runtime.block_on(self.request(method, params))
    }
}

fn to_params<const N: usize>(params: [Result<Value, serde_json::Error>; N]) -> Result<Vec<Value>, HostError> {
    params
        .into_iter()
        .collect::<Result<_, _>>()
        .map_err(|e| HostError::Transport(format!("failed to encode parameters: {e}")))
}

/// Host exceptions arrive as call errors carrying the exception handle
fn map_client_error(err: ClientError) -> HostError {
    match err {
        ClientError::Call(error) if error.code() == REMOTE_EXCEPTION => {
            let handle = error
                .data()
                .and_then(|raw| serde_json::from_str::<Value>(raw.get()).ok())
                .and_then(|data| data.get("handle").and_then(Value::as_str).map(RemoteHandle::new));
            match handle {
                Some(handle) => {
                    HostError::Remote { handle, message: error.message().to_string() }
                }
                None => HostError::Transport(format!(
                    "remote exception without a handle: {}",
                    error.message()
                )),
            }
        }
        other => HostError::Transport(other.to_string()),
    }
}

impl HostGateway for RpcHost {
    fn get_attribute(&self, target: &RemoteHandle, name: &str) -> Result<HostValue, HostError> {
        let params = to_params([serde_json::to_value(target), serde_json::to_value(name)])?;
        self.call(METHOD_GET_ATTRIBUTE, params)
    }

    fn invoke(
        &self,
        target: &RemoteHandle,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        let params = to_params([
            serde_json::to_value(target),
            serde_json::to_value(method),
            serde_json::to_value(args),
        ])?;
        self.call(METHOD_INVOKE, params)
    }

    fn construct(
        &self,
        target: &RemoteHandle,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        let params = to_params([serde_json::to_value(target), serde_json::to_value(args)])?;
        self.call(METHOD_CONSTRUCT, params)
    }
}

impl TraceSink for RpcHost {
    fn dispatch(&self, frame: FrameView<'_>, event: TraceEvent) -> Result<(), HostError> {
        let mut params = ObjectParams::new();
        params
            .insert("frames", frame.snapshot(self.max_frames))
            .and_then(|_| params.insert("event", event))
            .map_err(|e| HostError::Transport(e.to_string()))?;
        self.runtime.block_on(async {
            self.client.notification(METHOD_TRACE_DISPATCH, params).await.map_err(map_client_error)
        })
    }
}
