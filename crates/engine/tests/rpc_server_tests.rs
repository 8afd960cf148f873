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

//! The engine RPC server driven over HTTP, with an in-process host.

use std::sync::Arc;

use ease_common::{config::BridgeConfig, HostValue, RemoteHandle, TraceEvent, TraceFrame};
use ease_engine::{
    rpc::{error_codes, RpcRequest, RpcResponse},
    EngineRpcServer, FrameView, HostError, HostGateway, RpcServerHandle, ShutdownSignal,
    TraceSink,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::info;

type Recorded = Arc<Mutex<Vec<(TraceEvent, Vec<TraceFrame>)>>>;

/// Host answering every call locally and recording trace events
#[derive(Clone, Default)]
struct LocalHost {
    events: Recorded,
}

impl HostGateway for LocalHost {
    fn get_attribute(&self, target: &RemoteHandle, name: &str) -> Result<HostValue, HostError> {
        Ok(HostValue::Remote(RemoteHandle::new(format!("{}.{name}", target.id()))))
    }

    fn invoke(
        &self,
        target: &RemoteHandle,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        match method {
            "fail" => Err(HostError::Remote {
                handle: RemoteHandle::new("exc:42"),
                message: format!("java.lang.IllegalStateException: {target}"),
            }),
            _ => Ok(HostValue::List(args)),
        }
    }

    fn construct(&self, target: &RemoteHandle, _args: Vec<HostValue>) -> Result<HostValue, HostError> {
        Ok(HostValue::Remote(RemoteHandle::new(format!("instance of {target}"))))
    }
}

impl TraceSink for LocalHost {
    fn dispatch(&self, frame: FrameView<'_>, event: TraceEvent) -> Result<(), HostError> {
        self.events.lock().push((event, frame.snapshot(64)));
        Ok(())
    }
}

struct Session {
    handle: RpcServerHandle,
    host: LocalHost,
    shutdown: Arc<ShutdownSignal>,
    client: reqwest::Client,
    next_id: u64,
}

impl Session {
    async fn start(config: BridgeConfig) -> Self {
        ease_common::logging::ensure_test_logging(None);
        let shutdown = Arc::new(ShutdownSignal::new());
        let host = LocalHost::default();
        let handle =
            EngineRpcServer::new(config, shutdown.clone()).start(host.clone()).await.unwrap();
        info!("Test server listening on {}", handle.addr());
        Self { handle, host, shutdown, client: reqwest::Client::new(), next_id: 0 }
    }

    fn url(&self) -> String {
        format!("http://{}", self.handle.addr())
    }

    async fn call(&mut self, method: &str, params: Value) -> RpcResponse {
        self.next_id += 1;
        let request = RpcRequest::new(method, params, self.next_id);
        self.client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .unwrap()
            .json::<RpcResponse>()
            .await
            .unwrap()
    }

    async fn result(&mut self, method: &str, params: Value) -> Value {
        let response = self.call(method, params).await;
        assert!(response.error.is_none(), "{method} failed: {:?}", response.error);
        response.result.unwrap_or(Value::Null)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_endpoint() {
    let session = Session::start(BridgeConfig::default()).await;
    let health: Value = session
        .client
        .get(format!("{}/health", session.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "ease-bridge");
    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interactive_session() {
    let mut session = Session::start(BridgeConfig::default()).await;

    assert_eq!(session.result("ease.executeInteractive", json!(["x = 20"])).await, json!({}));
    assert_eq!(
        session.result("ease.executeInteractive", json!(["x + 2+2"])).await,
        json!({"result": {"type": "int", "value": 24}})
    );
    assert_eq!(session.result("ease.getVariable", json!(["_"])).await, json!("24"));

    // incomplete input is buffered
    assert_eq!(
        session.result("ease.executeInteractive", json!(["fn twice(v) {"])).await,
        json!({"result": {"type": "str", "value": "... - more input required to complete statement"}})
    );
    assert_eq!(session.result("ease.hasVariable", json!(["twice"])).await, json!(false));
    session.result("ease.executeInteractive", json!(["  return v * 2"])).await;
    session.result("ease.executeInteractive", json!(["}"])).await;
    assert_eq!(
        session.result("ease.executeScript", json!(["twice([1])", "ignored.ease"])).await,
        json!({"result": {"type": "list", "value": [
            {"type": "int", "value": 1},
            {"type": "int", "value": 1}
        ]}})
    );

    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_errors_are_results() {
    let mut session = Session::start(BridgeConfig::default()).await;

    let ret = session.result("ease.executeInteractive", json!(["1/0"])).await;
    assert!(ret.get("result").is_none());
    assert_eq!(ret["exception"]["kind"], "text");
    let text = ret["exception"]["message"].as_str().unwrap();
    assert!(text.starts_with("Traceback (most recent call last):"));
    assert!(text.ends_with("ZeroDivisionError: division by zero\n"));

    // host exceptions come back as the host's own handle
    let ret = session.result("ease.executeScript", json!(["java.lang.fail()"])).await;
    assert_eq!(
        ret["exception"],
        json!({
            "kind": "remote",
            "handle": "exc:42",
            "message": "java.lang.IllegalStateException: package:java.lang"
        })
    );

    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_variable_methods() {
    let mut session = Session::start(BridgeConfig::default()).await;

    session.result("ease.executeScript", json!(["__private = 1\nitems = ['a', 2]"])).await;
    let vars = session.result("ease.getVariables", json!([])).await;
    assert_eq!(vars["items"], "['a', 2]");
    assert_eq!(vars["java"], "<remote object package:java>");
    assert!(vars.as_object().unwrap().keys().all(|name| !name.starts_with("__")));

    assert_eq!(session.result("ease.hasVariable", json!(["foo"])).await, json!(false));
    session
        .result("ease.setVariable", json!(["foo", {"type": "remote", "value": "obj:1"}]))
        .await;
    assert_eq!(session.result("ease.hasVariable", json!(["foo"])).await, json!(true));
    assert_eq!(
        session.result("ease.executeScript", json!(["foo.size(1)"])).await,
        json!({"result": {"type": "list", "value": [{"type": "int", "value": 1}]}})
    );

    assert_eq!(
        session.result("ease.removeVariable", json!(["foo"])).await,
        json!("<remote object obj:1>")
    );
    assert_eq!(session.result("ease.removeVariable", json!(["foo"])).await, Value::Null);
    assert_eq!(session.result("ease.saveVariableName", json!(["my var"])).await, json!("my_var"));

    let response = session.call("ease.setVariable", json!(["foo"])).await;
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    let response = session.call("ease.nope", json!([])).await;
    assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trace_events_reach_the_host() {
    let mut session = Session::start(BridgeConfig::default()).await;

    assert_eq!(session.result("ease.setTracing", json!([true])).await, json!(true));
    session
        .result("ease.traceScript", json!(["fn g() {\n  return 1\n}\ng()", "/work/demo.ease"]))
        .await;
    // the "<string>" module frame of executeScript is hidden, g's own steps are not
    session.result("ease.executeScript", json!(["g()"])).await;

    let events = session.host.events.lock().clone();
    assert!(!events.is_empty());
    assert!(events.iter().all(|(_, frames)| frames[0].filename == "/work/demo.ease"));
    assert!(events
        .iter()
        .any(|(_, frames)| frames.iter().any(|frame| frame.filename == "<string>")));
    let (event, frames) = events.iter().find(|(_, frames)| frames.len() == 2).unwrap();
    assert_eq!(*event, TraceEvent::Call);
    assert_eq!(frames[0].line, 1);
    assert_eq!(frames[1].line, 4);

    assert_eq!(session.result("ease.setTracing", json!([false])).await, json!(false));
    let before = session.host.events.lock().len();
    session.result("ease.traceScript", json!(["g()", "/work/demo.ease"])).await;
    assert_eq!(session.host.events.lock().len(), before);

    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_requests_run_one_at_a_time() {
    let mut session = Session::start(BridgeConfig::default()).await;
    session.result("ease.executeScript", json!(["n = 0"])).await;

    let mut tasks = JoinSet::new();
    for id in 0..16u64 {
        let client = session.client.clone();
        let url = session.url();
        tasks.spawn(async move {
            let request = RpcRequest::new("ease.executeScript", json!(["n = n + 1"]), 100 + id);
            client.post(url).json(&request).send().await.unwrap().json::<RpcResponse>().await
        });
    }
    while let Some(response) = tasks.join_next().await {
        assert!(response.unwrap().unwrap().error.is_none());
    }

    assert_eq!(session.result("ease.getVariable", json!(["n"])).await, json!("16"));
    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exit_and_teardown() {
    let mut session = Session::start(BridgeConfig::default()).await;

    let error = session.call("ease.executeScript", json!(["exit(5)"])).await.error.unwrap();
    assert_eq!(error.code, error_codes::SCRIPT_TERMINATED);
    assert_eq!(error.data, Some(json!({"exitCode": 5})));
    assert!(session.shutdown.is_triggered());
    assert_eq!(session.shutdown.exit_code(), Some(5));

    // teardown after the fact is harmless
    assert_eq!(session.result("ease.teardownEngine", json!([])).await, Value::Null);
    assert_eq!(session.result("ease.teardownEngine", json!([])).await, Value::Null);
    assert_eq!(session.shutdown.exit_code(), Some(5));

    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_teardown_engine_triggers_shutdown() {
    let mut session = Session::start(BridgeConfig::default()).await;
    assert!(!session.shutdown.is_triggered());
    session.result("ease.teardownEngine", json!([])).await;
    assert!(session.shutdown.is_triggered());
    assert_eq!(session.shutdown.exit_code(), None);
    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejects_wrong_protocol_version() {
    let session = Session::start(BridgeConfig::default()).await;
    let response: RpcResponse = session
        .client
        .post(session.url())
        .json(&json!({"jsonrpc": "1.0", "method": "ease.getVariables", "id": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);
    session.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trace_enabled_by_config() {
    let mut config = BridgeConfig::default();
    config.trace.enabled = true;
    config.server.queue_capacity = 4;
    let mut session = Session::start(config).await;

    session.result("ease.traceScript", json!(["x = 1", "user.ease"])).await;
    let events: Vec<_> = session.host.events.lock().iter().map(|(e, _)| *e).collect();
    assert_eq!(events, vec![TraceEvent::Call, TraceEvent::Line, TraceEvent::Return]);
    session.handle.shutdown().unwrap();
}
