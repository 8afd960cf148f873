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

//! Decides which frames are bridge infrastructure.
//!
//! A step is hidden from the host debugger when
//! - the frame it happened in has a synthetic source name such as
//!   `<string>` or `<console>`, or
//! - that frame or any of its callers was loaded from bridge code, i.e. its
//!   source path contains the bridge marker (case-insensitive).
//!
//! A synthetic name only counts for the frame the step happened in. Further
//! up the chain such frames are walked through like any other.

use once_cell::sync::Lazy;
use regex::Regex;

use ease_common::{config::TraceConfig, DEFAULT_BRIDGE_MARKER};

use super::FrameView;

/// Source names of code that was not loaded from a file
static SYNTHETIC_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<.+>$").expect("synthetic source pattern is valid"));

/// Default bound on the caller chain walked per decision
pub const DEFAULT_MAX_FRAME_DEPTH: usize = 4096;

/// Filter deciding whether a step is reported to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilter {
    /// Lowercased bridge marker
    marker: String,
    max_depth: usize,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_MARKER, DEFAULT_MAX_FRAME_DEPTH)
    }
}

impl FrameFilter {
    /// Filter hiding frames whose source contains `marker`
    pub fn new(marker: &str, max_depth: usize) -> Self {
        Self { marker: marker.to_lowercase(), max_depth }
    }

    /// Filter built from the trace settings
    pub fn from_config(config: &TraceConfig) -> Self {
        Self::new(&config.bridge_marker, config.max_frame_depth)
    }

    /// Whether a source name denotes synthetic code
    pub fn is_synthetic(filename: &str) -> bool {
        SYNTHETIC_SOURCE.is_match(filename)
    }

    /// Whether the step in `frame` must not be reported.
    ///
    /// `is_outermost` is true for the frame the step happened in and false
    /// for its callers. A chain longer than the depth bound is reported.
    pub fn should_ignore(&self, frame: Option<FrameView<'_>>, is_outermost: bool) -> bool {
        let mut current = frame;
        let mut outermost = is_outermost;
        let mut depth = 0;

        while let Some(view) = current {
            if depth >= self.max_depth {
                return false;
            }
            let filename = view.filename();
            if outermost && Self::is_synthetic(filename) {
                return true;
            }
            if !self.marker.is_empty() && filename.to_lowercase().contains(&self.marker) {
                return true;
            }
            current = view.parent();
            outermost = false;
            depth += 1;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_program, ExecMode, Interpreter};
    use crate::trace::{StepObserver, TraceControl};
    use ease_common::TraceEvent;
    use std::{cell::RefCell, rc::Rc};

    /// Step record: filename, function, decision as outermost, decision as caller
    type Seen = (String, String, bool, bool);

    struct Probe {
        filter: FrameFilter,
        seen: Rc<RefCell<Vec<Seen>>>,
    }

    impl StepObserver for Probe {
        fn on_step(&mut self, frame: FrameView<'_>, _event: TraceEvent) -> TraceControl {
            self.seen.borrow_mut().push((
                frame.filename().to_string(),
                frame.function().unwrap_or_default().to_string(),
                self.filter.should_ignore(Some(frame), true),
                self.filter.should_ignore(Some(frame), false),
            ));
            TraceControl::Continue
        }
    }

    fn probe(filter: FrameFilter, runs: &[(&str, &str)]) -> Vec<Seen> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::with_output(Box::new(std::io::sink()));
        interp.set_observer(Some(Box::new(Probe { filter, seen: seen.clone() })));
        for (source, filename) in runs {
            let program = parse_program(source).unwrap();
            interp.exec(&program, filename, ExecMode::Block).unwrap();
        }
        let seen = seen.borrow().clone();
        seen
    }

    #[test]
    fn test_absent_frame_is_not_ignored() {
        let filter = FrameFilter::default();
        assert!(!filter.should_ignore(None, true));
        assert!(!filter.should_ignore(None, false));
        assert!(!filter.should_ignore(Some(FrameView::absent()), true));
    }

    #[test]
    fn test_synthetic_top_frame_only_counts_when_outermost() {
        let seen = probe(FrameFilter::default(), &[("x = 1", "<string>")]);
        assert!(!seen.is_empty());
        for (filename, _, outermost, inner) in seen {
            assert_eq!(filename, "<string>");
            assert!(outermost);
            assert!(!inner);
        }
    }

    #[test]
    fn test_bridge_marker_taints_the_whole_chain() {
        // a function from bridge code calling back into user code
        let seen = probe(
            FrameFilter::default(),
            &[
                ("fn helper(f) {\n  return f()\n}", "lib/EASE_Bridge/prelude"),
                ("fn user() {\n  return 1\n}\nhelper(user)", "user.ease"),
            ],
        );
        let user_frames: Vec<_> = seen.iter().filter(|(f, ..)| f == "user.ease").collect();
        assert!(!user_frames.is_empty());
        // top-level user steps are reported, steps inside user() run below helper()
        assert!(user_frames.iter().any(|(_, _, outer, _)| !outer));
        let bridge_frames: Vec<_> =
            seen.iter().filter(|(f, ..)| f.contains("EASE_Bridge")).collect();
        assert!(bridge_frames.iter().all(|(_, _, outer, inner)| *outer && *inner));
    }

    #[test]
    fn test_marker_below_synthetic_frame_is_found() {
        let seen = probe(
            FrameFilter::default(),
            &[
                ("fn run(f) {\n  return f()\n}", "ease_bridge"),
                ("fn snippet() {\n  return 2\n}", "<string>"),
                ("run(snippet)", "driver.ease"),
            ],
        );
        // snippet() executes with run() (bridge code) below it
        let snippet_steps: Vec<_> = seen.iter().filter(|(_, func, ..)| func == "snippet").collect();
        assert!(!snippet_steps.is_empty());
        assert!(snippet_steps.iter().all(|(file, _, outer, inner)| file == "<string>" && *outer && *inner));
    }

    #[test]
    fn test_regular_code_is_reported() {
        let seen = probe(FrameFilter::default(), &[("fn f() {\n  return 1\n}\nf()", "user.ease")]);
        assert!(seen.iter().all(|(_, _, outer, inner)| !outer && !inner));
    }

    #[test]
    fn test_depth_bound_reports_the_frame() {
        let seen = probe(
            FrameFilter::new("ease_bridge", 1),
            &[
                ("fn call(f) {\n  return f()\n}", "ease_bridge"),
                ("fn leaf() {\n  return 0\n}\ncall(leaf)", "user.ease"),
            ],
        );
        // with a bound of one frame the bridge caller of leaf() is never seen
        let leaf_steps: Vec<_> = seen.iter().filter(|(_, func, ..)| func == "leaf").collect();
        assert!(!leaf_steps.is_empty());
        assert!(leaf_steps.iter().all(|(_, _, outer, _)| !outer));
    }

    #[test]
    fn test_is_synthetic() {
        assert!(FrameFilter::is_synthetic("<string>"));
        assert!(FrameFilter::is_synthetic("<console>"));
        assert!(!FrameFilter::is_synthetic("<>"));
        assert!(!FrameFilter::is_synthetic("/tmp/<x>.ease"));
    }
}
