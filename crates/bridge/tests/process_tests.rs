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

//! The bridge binary launched the way a host launches it

use std::{
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};

use ease_integration_tests::{
    mock_host::MockHost,
    test_utils::{init, BridgeClient},
};
use serde_json::json;
use tracing::info;

fn launch(host: &MockHost, config: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_ease-bridge"))
        .arg(host.port().to_string())
        .arg("--config")
        .arg(config)
        .arg("--shutdown-timeout")
        .arg("5")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to launch the bridge")
}

async fn wait(mut child: Child) -> ExitStatus {
    tokio::task::spawn_blocking(move || child.wait()).await.unwrap().unwrap()
}

fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, "").unwrap();
    path
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stdin_eof_ends_the_session() {
    init::init_test_environment();
    info!("Testing the bridge process lifecycle");

    let dir = tempfile::tempdir().unwrap();
    let host = MockHost::start().await.unwrap();
    let mut child = launch(&host, &empty_config(dir.path()));

    let port = host.wait_for_startup(Duration::from_secs(30)).await.expect("no startup notification");
    let client = BridgeClient::new(port);
    let ret = client.result("ease.executeInteractive", json!(["2 + 2"])).await.unwrap();
    assert_eq!(ret, json!({"result": {"type": "int", "value": 4}}));
    let last = client.result("ease.getVariable", json!(["_"])).await.unwrap();
    assert_eq!(last, json!("4"));

    // closing stdin is the host's way of saying goodbye
    drop(child.stdin.take());
    let status = wait(child).await;
    assert_eq!(status.code(), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_exit_code_becomes_process_status() {
    init::init_test_environment();
    info!("Testing script-requested exit");

    let dir = tempfile::tempdir().unwrap();
    let host = MockHost::start().await.unwrap();
    let child = launch(&host, &empty_config(dir.path()));

    let port = host.wait_for_startup(Duration::from_secs(30)).await.expect("no startup notification");
    let client = BridgeClient::new(port);
    let response = client.call("ease.executeScript", json!(["exit(3)"])).await.unwrap();
    assert_eq!(response["error"]["data"]["exitCode"], 3);

    let status = wait(child).await;
    assert_eq!(status.code(), Some(3));
}
