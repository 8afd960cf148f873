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

//! Interactive console on top of the interpreter.
//!
//! The console runs fragments in the interpreter's persistent namespace and
//! captures what the host needs to see afterwards: the displayed value and
//! the error, if any. Errors raised by the host come back as handles and are
//! kept as they are; everything else is rendered as traceback text.

use std::{cell::RefCell, rc::Rc};

use ease_common::{ExceptionPayload, RemoteHandle};
use tracing::debug;

use crate::script::{
    ast::Program, parse_program, DisplayHook, ExecMode, Interpreter, Namespace, ParseError,
    RaisedError, ScriptException, Value,
};

/// Source name of interactive input
pub const CONSOLE_FILENAME: &str = "<console>";

/// Source name of script blocks
pub const SCRIPT_FILENAME: &str = "<string>";

/// Namespace slot holding the last displayed value
pub const LAST_VALUE_NAME: &str = "_";

/// Error captured while running a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedError {
    /// Exception thrown by the host, passed back unchanged
    Remote {
        /// Host exception object
        handle: RemoteHandle,
        /// Message reported by the host
        message: String,
    },
    /// Traceback text, assembled from the fragments written so far
    Text(String),
}

impl From<CapturedError> for ExceptionPayload {
    fn from(error: CapturedError) -> Self {
        match error {
            CapturedError::Remote { handle, message } => Self::Remote { handle, message },
            CapturedError::Text(message) => Self::Text { message },
        }
    }
}

/// How a console call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    /// Ran to completion
    Complete,
    /// Interactive input is incomplete and was buffered
    NeedsMore,
    /// An error was captured
    Failed,
    /// The script asked the process to exit with this status
    Terminated(i32),
}

/// Stores displayed values and publishes them to `_`
struct ConsoleDisplayHook {
    displayed: Rc<RefCell<Option<Value>>>,
}

impl DisplayHook for ConsoleDisplayHook {
    fn display(&mut self, value: Value, globals: &mut Namespace) {
        if value.is_none() {
            *self.displayed.borrow_mut() = None;
            return;
        }
        globals.insert(LAST_VALUE_NAME.to_string(), value.clone());
        *self.displayed.borrow_mut() = Some(value);
    }
}

/// Console running fragments against one interpreter
pub struct InteractiveConsole {
    interp: Interpreter,
    buffer: Vec<String>,
    displayed: Rc<RefCell<Option<Value>>>,
    error: Option<CapturedError>,
}

impl std::fmt::Debug for InteractiveConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveConsole")
            .field("interp", &self.interp)
            .field("buffered_lines", &self.buffer.len())
            .field("error", &self.error)
            .finish()
    }
}

impl InteractiveConsole {
    /// Console driving `interp`; installs the console display hook
    pub fn new(mut interp: Interpreter) -> Self {
        let displayed = Rc::new(RefCell::new(None));
        interp.set_display_hook(Box::new(ConsoleDisplayHook { displayed: displayed.clone() }));
        Self { interp, buffer: Vec::new(), displayed, error: None }
    }

    /// The underlying interpreter
    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// Mutable access to the underlying interpreter
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Number of interactive lines waiting for completion
    pub fn pending_lines(&self) -> usize {
        self.buffer.len()
    }

    /// Forget the displayed value and captured error
    pub fn reset(&mut self) {
        self.displayed.borrow_mut().take();
        self.error = None;
    }

    /// Take the last displayed value
    pub fn take_displayed(&mut self) -> Option<Value> {
        self.displayed.borrow_mut().take()
    }

    /// Take the captured error
    pub fn take_error(&mut self) -> Option<CapturedError> {
        self.error.take()
    }

    /// Compile and run a whole script block
    pub fn run_block(&mut self, code: &str, filename: &str) -> CompletionSignal {
        match parse_program(code) {
            Ok(program) => self.run_program(&program, filename, ExecMode::Block),
            Err(err) => {
                self.show_syntax_error(&err, filename);
                CompletionSignal::Failed
            }
        }
    }

    /// Feed one piece of interactive input
    pub fn run_line(&mut self, line: &str) -> CompletionSignal {
        self.buffer.push(line.to_string());
        let source = self.buffer.join("\n");
        match parse_program(&source) {
            Err(err) if err.is_incomplete() => {
                debug!("Buffered incomplete input ({} lines)", self.buffer.len());
                CompletionSignal::NeedsMore
            }
            Err(err) => {
                self.buffer.clear();
                self.show_syntax_error(&err, CONSOLE_FILENAME);
                CompletionSignal::Failed
            }
            Ok(program) => {
                self.buffer.clear();
                self.run_program(&program, CONSOLE_FILENAME, ExecMode::Interactive)
            }
        }
    }

    fn run_program(&mut self, program: &Program, filename: &str, mode: ExecMode) -> CompletionSignal {
        match self.interp.exec(program, filename, mode) {
            Ok(()) => CompletionSignal::Complete,
            Err(RaisedError::Exit(code)) => CompletionSignal::Terminated(code),
            Err(RaisedError::Remote { handle, message }) => {
                debug!("Captured remote exception {}", handle);
                self.error = Some(CapturedError::Remote { handle, message });
                CompletionSignal::Failed
            }
            Err(RaisedError::Script(exception)) => {
                self.show_traceback(&exception);
                CompletionSignal::Failed
            }
        }
    }

    /// Append a fragment of error output
    fn write(&mut self, fragment: &str) {
        match &mut self.error {
            Some(CapturedError::Text(text)) => text.push_str(fragment),
            _ => self.error = Some(CapturedError::Text(fragment.to_string())),
        }
    }

    fn show_traceback(&mut self, exception: &ScriptException) {
        self.write("Traceback (most recent call last):\n");
        for entry in &exception.traceback {
            self.write(&format!(
                "  File \"{}\", line {}, in {}\n",
                entry.filename, entry.line, entry.function
            ));
        }
        self.write(&format!("{}: {}\n", exception.kind, exception.message));
    }

    fn show_syntax_error(&mut self, err: &ParseError, filename: &str) {
        let message = match err {
            ParseError::Incomplete { message, .. } => format!("unexpected end of input: {message}"),
            ParseError::Syntax { message, .. } => message.clone(),
        };
        self.write(&format!("  File \"{}\", line {}\n", filename, err.line()));
        self.write(&format!("SyntaxError: {message}\n"));
    }
}
