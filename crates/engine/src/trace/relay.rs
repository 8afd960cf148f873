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

//! Forwards steps of user code to the host debugger.
//!
//! Frames the [`FrameFilter`] marks as bridge infrastructure are dropped.
//! A failed dispatch is logged and tracing goes on.

use std::rc::Rc;

use ease_common::TraceEvent;
use tracing::warn;

use super::{FrameFilter, FrameView, StepObserver, TraceControl};
use crate::host::TraceSink;

/// Step observer forwarding user-code steps to the host debugger
pub struct TraceRelay {
    filter: FrameFilter,
    sink: Rc<dyn TraceSink>,
}

impl std::fmt::Debug for TraceRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRelay").field("filter", &self.filter).finish_non_exhaustive()
    }
}

impl TraceRelay {
    /// Relay filtering with `filter` and reporting to `sink`
    pub fn new(filter: FrameFilter, sink: Rc<dyn TraceSink>) -> Self {
        Self { filter, sink }
    }
}

impl StepObserver for TraceRelay {
    fn on_step(&mut self, frame: FrameView<'_>, event: TraceEvent) -> TraceControl {
        if !self.filter.should_ignore(Some(frame), true) {
            if let Err(e) = self.sink.dispatch(frame, event) {
                warn!(%event, filename = frame.filename(), "Failed to dispatch trace event: {e}");
            }
        }
        TraceControl::Continue
    }
}
