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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of interpreter step reported to a step observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    /// A new frame was entered
    Call,
    /// A statement is about to execute
    Line,
    /// A frame is about to be left
    Return,
    /// An error was raised inside the frame
    Exception,
}

impl TraceEvent {
    /// Lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Line => "line",
            Self::Return => "return",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one frame sent to the host debugger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Source identifier of the frame
    pub filename: String,
    /// Current line, -1 when unknown
    pub line: i64,
}

/// Payload of the `ease.traceDispatch` notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNotification {
    /// Stack, innermost frame first
    pub frames: Vec<TraceFrame>,
    /// What happened
    pub event: TraceEvent,
}

impl TraceNotification {
    /// The frame the event happened in
    pub fn current(&self) -> Option<&TraceFrame> {
        self.frames.first()
    }
}
