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

//! Step tracing: frame views, the infrastructure frame filter and the relay
//! forwarding accepted steps to the host debugger.
//!
//! # Flow
//!
//! 1. The interpreter calls the installed [`StepObserver`] on every step with
//!    a [`FrameView`] of the innermost frame.
//! 2. [`TraceRelay`] asks [`FrameFilter`] whether the frame, or any of its
//!    callers, belongs to the bridge itself.
//! 3. Surviving steps go to a [`crate::host::TraceSink`].

pub mod filter;
pub mod frame;
pub mod relay;

pub use filter::*;
pub use frame::*;
pub use relay::*;

use ease_common::TraceEvent;

/// What the interpreter should do with the observer after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceControl {
    /// Keep calling the observer
    Continue,
    /// Remove the observer from its slot
    Detach,
}

/// Callback run by the interpreter on every execution step
pub trait StepObserver {
    /// Called with the frame the step happened in
    fn on_step(&mut self, frame: FrameView<'_>, event: TraceEvent) -> TraceControl;
}
