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

//! Views of live interpreter frames.
//!
//! A [`FrameView`] borrows the call stack for the duration of one step and
//! walks it from the innermost frame outwards. Absent frames report
//! [`NO_FRAME_FILENAME`] and [`NO_FRAME_LINE`], and a view can be copied
//! into owned [`TraceFrame`]s for the host.

use ease_common::TraceFrame;

use crate::script::Frame;

/// Filename reported for an absent frame
pub const NO_FRAME_FILENAME: &str = "__no_frame__";

/// Line reported for an absent frame
pub const NO_FRAME_LINE: i64 = -1;

/// Read-only view of one live frame.
///
/// The view borrows the interpreter's call stack, so it cannot outlive the
/// step it was handed out for. Callers are reached through [`FrameView::parent`].
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    frames: &'a [Frame],
    index: Option<usize>,
}

impl<'a> FrameView<'a> {
    /// View of the innermost frame of `frames` (outermost first)
    pub fn innermost(frames: &'a [Frame]) -> Self {
        Self { frames, index: frames.len().checked_sub(1) }
    }

    /// A view referring to no frame
    pub fn absent() -> Self {
        Self { frames: &[], index: None }
    }

    /// Whether the view refers to a frame
    pub fn is_present(&self) -> bool {
        self.frame().is_some()
    }

    fn frame(&self) -> Option<&'a Frame> {
        self.index.and_then(|index| self.frames.get(index))
    }

    /// Source identifier, [`NO_FRAME_FILENAME`] when absent
    pub fn filename(&self) -> &'a str {
        self.frame().map_or(NO_FRAME_FILENAME, |frame| frame.filename.as_ref())
    }

    /// Line currently executing, [`NO_FRAME_LINE`] when absent
    pub fn line_number(&self) -> i64 {
        self.frame().map_or(NO_FRAME_LINE, |frame| i64::from(frame.line))
    }

    /// Function running in the frame
    pub fn function(&self) -> Option<&'a str> {
        self.frame().map(|frame| frame.function.as_ref())
    }

    /// The calling frame, `None` at the bottom of the stack
    pub fn parent(&self) -> Option<Self> {
        let parent = self.index?.checked_sub(1)?;
        Some(Self { frames: self.frames, index: Some(parent) })
    }

    /// Wire form of this frame and at most `limit - 1` callers, innermost first
    pub fn snapshot(&self, limit: usize) -> Vec<TraceFrame> {
        std::iter::successors(self.is_present().then_some(*self), |view| view.parent())
            .take(limit)
            .map(|view| TraceFrame {
                filename: view.filename().to_string(),
                line: view.line_number(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_program, ExecMode, Interpreter};
    use crate::trace::{StepObserver, TraceControl};
    use ease_common::TraceEvent;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn test_absent_view() {
        let view = FrameView::absent();
        assert!(!view.is_present());
        assert_eq!(view.filename(), "__no_frame__");
        assert_eq!(view.line_number(), -1);
        assert!(view.parent().is_none());
        assert!(view.function().is_none());
        assert!(view.snapshot(10).is_empty());
        assert_eq!(FrameView::innermost(&[]).filename(), NO_FRAME_FILENAME);
    }

    struct Record(Rc<RefCell<Vec<Vec<TraceFrame>>>>);

    impl StepObserver for Record {
        fn on_step(&mut self, frame: FrameView<'_>, event: TraceEvent) -> TraceControl {
            if event == TraceEvent::Line {
                self.0.borrow_mut().push(frame.snapshot(usize::MAX));
            }
            TraceControl::Continue
        }
    }

    #[test]
    fn test_parent_chain_walks_to_the_bottom() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::with_output(Box::new(std::io::sink()));
        interp.set_observer(Some(Box::new(Record(seen.clone()))));

        let program = parse_program("fn inner() {\n  x = 1\n}\ninner()").unwrap();
        interp.exec(&program, "user.ease", ExecMode::Block).unwrap();

        let deepest = seen.borrow().iter().max_by_key(|chain| chain.len()).cloned().unwrap();
        assert_eq!(
            deepest,
            vec![
                TraceFrame { filename: "user.ease".into(), line: 2 },
                TraceFrame { filename: "user.ease".into(), line: 4 },
            ]
        );
    }
}
