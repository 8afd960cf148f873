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

use assert_cmd::Command;
use predicates::prelude::*;
use tracing::info;

#[test]
fn test_help_command() {
    ease_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EASE Bridge"))
        .stdout(predicate::str::contains("--shutdown-timeout"));
}

#[test]
fn test_version_command() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("ease-bridge"));
}

#[test]
fn test_missing_port() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_invalid_port() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.arg("not-a-port").assert().failure();
}

#[test]
fn test_unreachable_host_is_fatal() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[host]\nrequest_timeout_secs = 2\n").unwrap();

    // nothing listens on port 1, so the startup notification fails
    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.arg("1")
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to report startup"));
}

#[test]
fn test_malformed_config_is_fatal() {
    ease_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "namespace_roots = 3\n").unwrap();

    let mut cmd = Command::cargo_bin("ease-bridge").unwrap();
    cmd.arg("1").arg("--config").arg(&config).assert().failure();
}
