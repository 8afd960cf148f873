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

//! Configuration files shaping a session.

use std::{cell::RefCell, fs, rc::Rc, sync::Arc};

use ease_common::{config::BridgeConfig, HostValue, RemoteHandle, TraceEvent};
use ease_engine::{
    ExecutionService, FrameFilter, FrameView, HostError, HostGateway, ShutdownSignal, TraceSink,
};
use serial_test::serial;
use tracing::info;

#[derive(Default)]
struct Host {
    steps: RefCell<Vec<String>>,
}

impl HostGateway for Host {
    fn get_attribute(&self, target: &RemoteHandle, name: &str) -> Result<HostValue, HostError> {
        Ok(HostValue::Remote(RemoteHandle::new(format!("{target}/{name}"))))
    }

    fn invoke(&self, _: &RemoteHandle, _: &str, _: Vec<HostValue>) -> Result<HostValue, HostError> {
        Ok(HostValue::None)
    }

    fn construct(&self, _: &RemoteHandle, _: Vec<HostValue>) -> Result<HostValue, HostError> {
        Ok(HostValue::None)
    }
}

impl TraceSink for Host {
    fn dispatch(&self, frame: FrameView<'_>, _event: TraceEvent) -> Result<(), HostError> {
        self.steps.borrow_mut().push(frame.filename().to_string());
        Ok(())
    }
}

fn write_config(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_custom_roots_and_marker() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "namespace_roots = [\"java\", \"jvm\"]\n\n[trace]\nenabled = true\nbridge_marker = \"Vendor/Lib\"\n",
    );
    let config = BridgeConfig::load(Some(&path)).unwrap();

    let mut service =
        ExecutionService::with_output(config, Arc::new(ShutdownSignal::new()), Box::new(std::io::sink()));
    let host = Rc::new(Host::default());
    service.bind_host(host.clone()).unwrap();

    assert!(service.has_variable("java"));
    assert!(service.has_variable("jvm"));
    assert!(!service.has_variable("org"));
    assert!(service.is_tracing());

    // code under the configured marker is hidden, its callers are not
    service.trace_script("fn f() {\n  return 1\n}\nf()", "vendor/lib/helpers.ease").unwrap();
    assert!(host.steps.borrow().is_empty());
    service.trace_script("f()", "main.ease").unwrap();
    assert!(!host.steps.borrow().is_empty());
    assert!(host.steps.borrow().iter().all(|file| file == "main.ease"));
}

#[test]
fn test_filter_from_config() {
    ease_common::logging::ensure_test_logging(None);
    let mut config = BridgeConfig::default();
    config.trace.bridge_marker = "MyBridge".into();
    config.trace.max_frame_depth = 2;
    assert_eq!(FrameFilter::from_config(&config.trace), FrameFilter::new("mybridge", 2));
}

#[test]
#[serial]
fn test_user_config_file_is_picked_up() {
    ease_common::logging::ensure_test_logging(None);
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("ease-bridge")).unwrap();
    write_config(&dir.path().join("ease-bridge"), "[shutdown]\ndeadline_secs = 2\n");

    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", dir.path());
    let config = BridgeConfig::load(None);
    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    let config = config.unwrap();
    assert_eq!(config.shutdown.deadline_secs, 2);
    assert_eq!(config.host.request_timeout_secs, 30);
}
