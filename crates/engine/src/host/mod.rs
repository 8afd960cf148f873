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

//! The host process as seen from the interpreter.
//!
//! [`HostGateway`] covers the object protocol (read an attribute, call a
//! method, construct an instance); [`TraceSink`] receives the trace events
//! the relay lets through. [`RpcHost`] implements both over JSON-RPC.

pub mod rpc;

pub use rpc::RpcHost;

use ease_common::{HostValue, RemoteHandle, TraceEvent};
use thiserror::Error;

use crate::trace::FrameView;

/// Failure of a call into the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host threw; the exception object stays on the host
    #[error("remote exception {handle}: {message}")]
    Remote {
        /// Host exception object
        handle: RemoteHandle,
        /// Message reported alongside
        message: String,
    },
    /// The host could not be reached or answered garbage
    #[error("host call failed: {0}")]
    Transport(String),
}

/// Object protocol of the host
pub trait HostGateway {
    /// Read attribute `name` of `target`
    fn get_attribute(&self, target: &RemoteHandle, name: &str) -> Result<HostValue, HostError>;

    /// Call `method` on `target`
    fn invoke(
        &self,
        target: &RemoteHandle,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError>;

    /// Instantiate the class `target`
    fn construct(&self, target: &RemoteHandle, args: Vec<HostValue>)
        -> Result<HostValue, HostError>;
}

/// Receiver of trace events
pub trait TraceSink {
    /// Report one step; the view is only valid during the call
    fn dispatch(&self, frame: FrameView<'_>, event: TraceEvent) -> Result<(), HostError>;
}
