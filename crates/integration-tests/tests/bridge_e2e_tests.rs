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

//! End-to-end tests of a bridge session against a mock host
//!
//! These tests exercise the complete path a host sees:
//! - The startup handshake reporting the bridge port
//! - Scripts calling into host objects and receiving host exceptions
//! - Trace events flowing back to the host as notifications
//! - Termination requested from a script

use std::time::Duration;

use ease_common::{config::BridgeConfig, TraceEvent};
use ease_integration_tests::test_utils::{init, session::Session};
use futures::future::join_all;
use serde_json::json;
use tracing::info;

async fn start_session() -> Session {
    let mut config = BridgeConfig::default();
    config.host.request_timeout_secs = 5;
    Session::start(config).await.expect("Failed to start bridge session")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_reports_bridge_port() {
    init::init_test_environment();
    info!("Testing the startup handshake");

    let session = start_session().await;
    let reported = session.host.wait_for_startup(Duration::from_secs(5)).await;
    assert_eq!(reported, session.port());
    assert!(session.client.is_healthy().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_uses_host_objects() {
    init::init_test_environment();
    info!("Testing host object access from scripts");

    let session = start_session().await;
    let client = &session.client;

    client
        .result(
            "ease.executeScript",
            json!(["items = java.util.ArrayList()\nitems.add(3)\nitems.add(\"four\")"]),
        )
        .await
        .unwrap();
    let size = client.result("ease.executeInteractive", json!(["items.size()"])).await.unwrap();
    assert_eq!(size, json!({"result": {"type": "int", "value": 2}}));

    let max = client
        .result("ease.executeInteractive", json!(["jvm.java.lang.Math.max(2, 9)"]))
        .await
        .unwrap();
    assert_eq!(max, json!({"result": {"type": "int", "value": 9}}));

    // remote objects come back as handles
    let items = client.result("ease.executeInteractive", json!(["items"])).await.unwrap();
    assert_eq!(items["result"]["type"], "remote");
    assert!(items["result"]["value"].as_str().unwrap().starts_with("obj:"));

    // and handles sent by the host become usable objects
    client.result("ease.setVariable", json!(["alias", items["result"]])).await.unwrap();
    let size = client.result("ease.executeInteractive", json!(["alias.size()"])).await.unwrap();
    assert_eq!(size["result"]["value"], 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_exceptions_pass_through() {
    init::init_test_environment();
    info!("Testing host exception passthrough");

    let session = start_session().await;
    let client = &session.client;

    let ret = client
        .result("ease.executeInteractive", json!(["jvm.java.lang.Integer.parseInt(\"x1\")"]))
        .await
        .unwrap();
    let raised = session.host.exceptions();
    assert_eq!(raised.len(), 1);
    assert_eq!(ret["exception"]["kind"], "remote");
    assert_eq!(ret["exception"]["handle"], raised[0].handle.id());
    assert!(ret.get("result").is_none());

    // a host exception raised again by the script keeps its handle
    client.result("ease.executeScript", json!(["items = java.util.ArrayList()"])).await.unwrap();
    let ret = client
        .result("ease.executeInteractive", json!(["fn first(xs) {\n  return xs.get(0)\n}"]))
        .await
        .unwrap();
    assert_eq!(ret, json!({}));
    let ret = client.result("ease.executeInteractive", json!(["first(items)"])).await.unwrap();
    let raised = session.host.exceptions();
    assert_eq!(ret["exception"]["handle"], raised[1].handle.id());
    assert!(raised[1].message.starts_with("java.lang.IndexOutOfBoundsException"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_host_is_a_local_error() {
    init::init_test_environment();
    info!("Testing transport failures of host calls");

    let mut session = start_session().await;
    session.host.shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let ret = session
        .client
        .result("ease.executeInteractive", json!(["java.util.ArrayList()"]))
        .await
        .unwrap();
    assert_eq!(ret["exception"]["kind"], "text");
    assert!(ret["exception"]["message"].as_str().unwrap().contains("HostError"));

    // the session keeps working without the host
    let ret = session.client.result("ease.executeInteractive", json!(["1 + 1"])).await.unwrap();
    assert_eq!(ret, json!({"result": {"type": "int", "value": 2}}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trace_notifications_reach_host() {
    init::init_test_environment();
    info!("Testing trace dispatch to the host");

    let session = start_session().await;
    let client = &session.client;

    let tracing = client.result("ease.setTracing", json!([true])).await.unwrap();
    assert_eq!(tracing, json!(true));

    client
        .result(
            "ease.traceScript",
            json!(["fn twice(x) {\n  return x * 2\n}\ny = twice(4)", "/work/job.ease"]),
        )
        .await
        .unwrap();
    let traces = session.host.traces();
    assert!(!traces.is_empty());
    assert!(traces.iter().all(|t| t.frames[0].filename == "/work/job.ease"));
    assert!(traces.iter().any(|t| t.event == TraceEvent::Call && t.frames.len() == 2));
    assert!(traces.iter().any(|t| t.event == TraceEvent::Line && t.frames[0].line == 4));

    // interactive input is synthetic and never reported
    session.host.clear_traces();
    client.result("ease.executeInteractive", json!(["z = y + 1"])).await.unwrap();
    assert!(session.host.traces().is_empty());

    client.result("ease.setTracing", json!([false])).await.unwrap();
    client.result("ease.traceScript", json!(["y = twice(5)", "/work/job.ease"])).await.unwrap();
    assert!(session.host.traces().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_serialized() {
    init::init_test_environment();
    info!("Testing concurrent requests");

    let session = start_session().await;
    let client = &session.client;
    client.result("ease.executeScript", json!(["hits = java.util.ArrayList()"])).await.unwrap();

    let calls = (0..12).map(|i| {
        client.result("ease.executeScript", json!([format!("hits.add({i})")]))
    });
    for outcome in join_all(calls).await {
        assert_eq!(outcome.unwrap(), json!({}));
    }

    let size = client.result("ease.executeInteractive", json!(["hits.size()"])).await.unwrap();
    assert_eq!(size["result"]["value"], 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_exit_requests_shutdown() {
    init::init_test_environment();
    info!("Testing script-requested termination");

    let session = start_session().await;
    let response = session.client.call("ease.executeScript", json!(["exit(4)"])).await.unwrap();
    assert_eq!(response["error"]["code"], -33010);
    assert_eq!(response["error"]["data"]["exitCode"], 4);

    assert!(session.signal.is_triggered());
    assert_eq!(session.signal.exit_code(), Some(4));
}
