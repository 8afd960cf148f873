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

//! EASE Engine - the scripting side of the bridge.
//!
//! A host process drives a session through JSON-RPC: it submits code, reads
//! back the displayed value or the captured exception, inspects the session
//! namespace, and optionally receives trace events for every step the
//! interpreter takes outside of bridge code.

pub mod console;
pub mod convert;
pub mod host;
pub mod rpc;
pub mod script;
pub mod service;
pub mod shutdown;
pub mod trace;
pub mod watchdog;

pub use console::{CapturedError, CompletionSignal, InteractiveConsole};
pub use convert::{ConverterRegistry, ResultConverter};
pub use host::{HostError, HostGateway, RpcHost, TraceSink};
pub use rpc::{EngineRpcServer, RpcServerHandle};
pub use service::{ExecutionService, ServiceError};
pub use shutdown::{ShutdownSignal, Teardown};
pub use trace::{FrameFilter, FrameView, StepObserver, TraceControl, TraceRelay};
pub use watchdog::ShutdownWatchdog;
