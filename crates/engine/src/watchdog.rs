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

//! Host liveness watchdog.
//!
//! The host keeps the bridge's control channel (stdin) open for as long as
//! it lives. End of stream or a read error means the host is gone: the
//! watchdog tears the engine down once and arms a timer that kills the
//! process if graceful shutdown has not completed by the deadline.

use std::{
    io::{ErrorKind, Read},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{error, info, warn};

use crate::shutdown::Teardown;

/// Status the process exits with when the deadline fires
pub const FORCED_EXIT_CODE: i32 = 1;

/// Default grace period before a forced exit
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Action terminating the process
pub type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Watches a control channel for host disconnection
pub struct ShutdownWatchdog<R> {
    input: R,
    target: Arc<dyn Teardown>,
    deadline: Duration,
    exit: ExitFn,
}

impl<R> std::fmt::Debug for ShutdownWatchdog<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownWatchdog").field("deadline", &self.deadline).finish_non_exhaustive()
    }
}

impl<R: Read + Send + 'static> ShutdownWatchdog<R> {
    /// Watch `input` and tear `target` down when it closes
    pub fn new(input: R, target: Arc<dyn Teardown>) -> Self {
        Self {
            input,
            target,
            deadline: DEFAULT_SHUTDOWN_DEADLINE,
            exit: Arc::new(|code| std::process::exit(code)),
        }
    }

    /// Grace period between teardown and the forced exit
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Replace the process exit action
    pub fn with_exit(mut self, exit: ExitFn) -> Self {
        self.exit = exit;
        self
    }

    /// Run the watchdog on its own thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new().name("ease-watchdog".to_string()).spawn(move || {
            self.run();
        })
    }

    /// Block until the channel closes, tear down, and arm the deadline timer.
    /// Returns the timer thread.
    pub fn run(mut self) -> Option<JoinHandle<()>> {
        let mut buf = [0u8; 1024];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => {
                    info!("Control channel closed, host is gone");
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Control channel read failed, treating as closed: {}", e);
                    break;
                }
            }
        }

        self.target.teardown();
        self.arm_timer()
    }

    fn arm_timer(self) -> Option<JoinHandle<()>> {
        let Self { target, deadline, exit, .. } = self;
        let spawned = thread::Builder::new().name("ease-shutdown-timer".to_string()).spawn(
            move || {
                thread::sleep(deadline);
                if target.is_shutdown_complete() {
                    return;
                }
                error!("Graceful shutdown did not finish within {:?}, forcing exit", deadline);
                exit(FORCED_EXIT_CODE);
            },
        );
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start the shutdown timer: {}", e);
                None
            }
        }
    }
}
