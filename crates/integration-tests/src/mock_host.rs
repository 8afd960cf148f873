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

//! A scripted stand-in for the host process.
//!
//! The mock host answers the bridge's JSON-RPC calls with a tiny object world:
//! packages resolve to packages or classes, `java.util.ArrayList` instances
//! hold values, `java.lang.Math.max` and `java.lang.Integer.parseInt` are
//! static methods. Failures surface as host exceptions with fresh handles.
//! Notifications (`ease.startupComplete`, `ease.traceDispatch`) are recorded.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Json as JsonExtract, State},
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::post,
    Router,
};
use ease_common::{HostValue, RemoteHandle, TraceNotification, PACKAGE_HANDLE_PREFIX};
use ease_engine::rpc::error_codes::REMOTE_EXCEPTION;
use eyre::{Result, WrapErr};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

const CLASS_PREFIX: &str = "class:";
const OBJECT_PREFIX: &str = "obj:";

/// A host-side exception: the handle passed back to the bridge plus its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostException {
    /// Handle the bridge sees
    pub handle: RemoteHandle,
    /// `<class>: <detail>` message
    pub message: String,
}

#[derive(Default)]
struct World {
    next_object: u64,
    next_exception: u64,
    lists: HashMap<String, Vec<HostValue>>,
    exceptions: Vec<HostException>,
}

impl World {
    fn raise(&mut self, class: &str, detail: impl AsRef<str>) -> HostException {
        self.next_exception += 1;
        let exception = HostException {
            handle: RemoteHandle::new(format!("exc:{}", self.next_exception)),
            message: format!("{class}: {}", detail.as_ref()),
        };
        self.exceptions.push(exception.clone());
        exception
    }

    fn get_attribute(&mut self, target: &str, name: &str) -> Result<HostValue, HostException> {
        if let Some(prefix) = target.strip_prefix(PACKAGE_HANDLE_PREFIX) {
            let path = if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") };
            let handle = if name.starts_with(char::is_uppercase) {
                format!("{CLASS_PREFIX}{path}")
            } else {
                format!("{PACKAGE_HANDLE_PREFIX}{path}")
            };
            return Ok(HostValue::Remote(RemoteHandle::new(handle)));
        }
        match (target, name) {
            ("class:java.lang.Math", "PI") => Ok(HostValue::Float(std::f64::consts::PI)),
            ("class:java.lang.Integer", "MAX_VALUE") => Ok(HostValue::Int(i32::MAX as i64)),
            _ => Err(self.raise("java.lang.NoSuchFieldException", name)),
        }
    }

    fn invoke(
        &mut self,
        target: &str,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostException> {
        if target.starts_with(OBJECT_PREFIX) {
            return self.invoke_list(target, method, args);
        }
        match (target, method, args.as_slice()) {
            ("class:java.lang.Math", "max", [HostValue::Int(a), HostValue::Int(b)]) => {
                Ok(HostValue::Int(*a.max(b)))
            }
            ("class:java.lang.Integer", "parseInt", [HostValue::Str(text)]) => {
                match text.trim().parse::<i32>() {
                    Ok(value) => Ok(HostValue::Int(value as i64)),
                    Err(_) => Err(self.raise(
                        "java.lang.NumberFormatException",
                        format!("For input string: \"{text}\""),
                    )),
                }
            }
            _ => Err(self.raise("java.lang.NoSuchMethodException", format!("{target}.{method}"))),
        }
    }

    fn invoke_list(
        &mut self,
        target: &str,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostException> {
        let Some(list) = self.lists.get_mut(target) else {
            return Err(self.raise("java.lang.IllegalStateException", "stale object"));
        };
        let outcome = match (method, args.as_slice()) {
            ("add", [value]) => {
                list.push(value.clone());
                Ok(HostValue::Bool(true))
            }
            ("size", []) => Ok(HostValue::Int(list.len() as i64)),
            ("get", [HostValue::Int(index)]) => usize::try_from(*index)
                .ok()
                .and_then(|i| list.get(i))
                .cloned()
                .ok_or_else(|| {
                    (
                        "java.lang.IndexOutOfBoundsException",
                        format!("Index {index} out of bounds for length {}", list.len()),
                    )
                }),
            ("toString", []) => Ok(HostValue::Str(format!("{list:?}"))),
            _ => Err(("java.lang.NoSuchMethodException", format!("ArrayList.{method}"))),
        };
        outcome.map_err(|(class, detail)| self.raise(class, detail))
    }

    fn construct(&mut self, target: &str, args: Vec<HostValue>) -> Result<HostValue, HostException> {
        match (target, args.as_slice()) {
            ("class:java.util.ArrayList", []) => {
                self.next_object += 1;
                let handle = format!("{OBJECT_PREFIX}{}", self.next_object);
                self.lists.insert(handle.clone(), Vec::new());
                Ok(HostValue::Remote(RemoteHandle::new(handle)))
            }
            _ => Err(self.raise("java.lang.InstantiationException", target)),
        }
    }
}

struct HostState {
    world: Mutex<World>,
    traces: Mutex<Vec<TraceNotification>>,
    startup: watch::Sender<Option<u16>>,
}

/// Mock host listening on an ephemeral local port
pub struct MockHost {
    addr: SocketAddr,
    state: Arc<HostState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockHost {
    /// Start serving on `127.0.0.1:0`
    pub async fn start() -> Result<Self> {
        let (startup, _) = watch::channel(None);
        let state = Arc::new(HostState {
            world: Mutex::new(World::default()),
            traces: Mutex::new(Vec::new()),
            startup,
        });

        let app = Router::new().route("/", post(handle_request)).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .wrap_err("Failed to bind mock host")?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = served {
                warn!("Mock host failed: {}", e);
            }
        });

        debug!("Mock host listening on {}", addr);
        Ok(Self { addr, state, shutdown_tx: Some(shutdown_tx) })
    }

    /// Port the bridge should be launched with
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// URL of the host endpoint
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait until the bridge reports its own port
    pub async fn wait_for_startup(&self, timeout: Duration) -> Option<u16> {
        let mut rx = self.state.startup.subscribe();
        let reported = tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await;
        match reported {
            Ok(Ok(port)) => *port,
            _ => None,
        }
    }

    /// Trace notifications received so far
    pub fn traces(&self) -> Vec<TraceNotification> {
        self.state.traces.lock().clone()
    }

    /// Forget recorded trace notifications
    pub fn clear_traces(&self) {
        self.state.traces.lock().clear();
    }

    /// Exceptions raised so far, oldest first
    pub fn exceptions(&self) -> Vec<HostException> {
        self.state.world.lock().exceptions.clone()
    }

    /// Stop answering; later bridge calls fail at the transport level
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn handle_call(state: &HostState, method: &str, params: &[Value]) -> Result<Value, Value> {
    let handle = |index: usize| params.get(index).and_then(Value::as_str).unwrap_or_default();
    let args = |index: usize| -> Vec<HostValue> {
        params.get(index).cloned().and_then(|v| serde_json::from_value(v).ok()).unwrap_or_default()
    };

    let mut world = state.world.lock();
    let outcome = match method {
        "host.getAttribute" => world.get_attribute(handle(0), handle(1)),
        "host.invoke" => world.invoke(handle(0), handle(1), args(2)),
        "host.construct" => world.construct(handle(0), args(1)),
        other => {
            return Err(json!({"code": -32601, "message": format!("Method not found: {other}")}))
        }
    };
    outcome.map(|value| json!(value)).map_err(|exception| {
        json!({
            "code": REMOTE_EXCEPTION,
            "message": exception.message,
            "data": {"handle": exception.handle},
        })
    })
}

fn handle_notification(state: &HostState, method: &str, params: Value) {
    match method {
        "ease.startupComplete" => {
            let port = params.get("port").and_then(Value::as_u64).and_then(|p| u16::try_from(p).ok());
            state.startup.send_replace(port);
        }
        "ease.traceDispatch" => match serde_json::from_value::<TraceNotification>(params) {
            Ok(notification) => state.traces.lock().push(notification),
            Err(e) => warn!("Malformed trace notification: {}", e),
        },
        other => warn!("Unexpected notification: {}", other),
    }
}

async fn handle_request(
    State(state): State<Arc<HostState>>,
    JsonExtract(request): JsonExtract<Value>,
) -> Response {
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    let Some(id) = request.get("id").cloned() else {
        handle_notification(&state, &method, params);
        return StatusCode::OK.into_response();
    };

    let params = params.as_array().cloned().unwrap_or_default();
    let body = match handle_call(&state, &method, &params) {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
    };
    JsonResponse(body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_resolution() {
        let mut world = World::default();
        let root = RemoteHandle::package("");
        assert_eq!(
            world.get_attribute(root.id(), "java").unwrap(),
            HostValue::Remote(RemoteHandle::new("package:java"))
        );
        assert_eq!(
            world.get_attribute("package:java.util", "ArrayList").unwrap(),
            HostValue::Remote(RemoteHandle::new("class:java.util.ArrayList"))
        );
    }

    #[test]
    fn test_list_objects() {
        let mut world = World::default();
        let list = world.construct("class:java.util.ArrayList", vec![]).unwrap();
        let id = list.as_remote().unwrap().id().to_string();
        world.invoke(&id, "add", vec![HostValue::Int(7)]).unwrap();
        assert_eq!(world.invoke(&id, "size", vec![]).unwrap(), HostValue::Int(1));

        let err = world.invoke(&id, "get", vec![HostValue::Int(3)]).unwrap_err();
        assert_eq!(err.handle, RemoteHandle::new("exc:1"));
        assert!(err.message.starts_with("java.lang.IndexOutOfBoundsException"));
    }
}
