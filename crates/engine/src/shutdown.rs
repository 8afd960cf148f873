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

//! Process-wide shutdown signal.
//!
//! Shared through an `Arc` by the executor, the watchdog, the RPC server and
//! the binary. Triggering is idempotent and allowed from any thread.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

/// Something that can be torn down by the watchdog
pub trait Teardown: Send + Sync {
    /// Begin graceful shutdown; calling it again has no effect
    fn teardown(&self);

    /// Whether graceful shutdown has finished
    fn is_shutdown_complete(&self) -> bool;
}

#[derive(Debug, Default)]
struct State {
    requested: bool,
    complete: bool,
    exit_code: Option<i32>,
}

/// One-shot shutdown latch
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    state: Mutex<State>,
    changed: Condvar,
}

impl ShutdownSignal {
    /// A signal that has not fired yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns true for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        let mut state = self.state.lock();
        if state.requested {
            debug!("Shutdown already requested");
            return false;
        }
        state.requested = true;
        self.changed.notify_all();
        info!("Shutdown requested");
        true
    }

    /// Request shutdown on behalf of a script calling `exit(code)`
    pub fn request_exit(&self, code: i32) -> bool {
        {
            let mut state = self.state.lock();
            state.exit_code.get_or_insert(code);
        }
        self.trigger()
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        self.state.lock().requested
    }

    /// Exit status requested by a script, if any
    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().exit_code
    }

    /// Block until shutdown is requested
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.requested {
            self.changed.wait(&mut state);
        }
    }

    /// Block until shutdown is requested or `timeout` passes; returns
    /// whether shutdown was requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if !state.requested {
            let _ = self.changed.wait_while_for(&mut state, |state| !state.requested, timeout);
        }
        state.requested
    }

    /// Record that graceful shutdown has finished
    pub fn mark_complete(&self) {
        let mut state = self.state.lock();
        state.complete = true;
        self.changed.notify_all();
    }
}

impl Teardown for ShutdownSignal {
    fn teardown(&self) {
        self.trigger();
    }

    fn is_shutdown_complete(&self) -> bool {
        self.state.lock().complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        signal.teardown();
        assert!(signal.is_triggered());
        assert_eq!(signal.exit_code(), None);
    }

    #[test]
    fn test_wait_wakes_on_trigger_from_other_thread() {
        let signal = Arc::new(ShutdownSignal::new());
        let remote = signal.clone();
        let handle = thread::spawn(move || remote.teardown());
        signal.wait();
        handle.join().unwrap();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_wait_timeout() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_first_exit_code_wins() {
        let signal = ShutdownSignal::new();
        assert!(signal.request_exit(3));
        assert!(!signal.request_exit(5));
        assert_eq!(signal.exit_code(), Some(3));
        assert!(!signal.is_shutdown_complete());
        signal.mark_complete();
        assert!(signal.is_shutdown_complete());
    }
}
