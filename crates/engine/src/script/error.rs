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

//! Errors raised while compiling or running scripts.

use ease_common::RemoteHandle;
use std::fmt;
use thiserror::Error;

/// Failure to compile a fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input ended while a `{`, `(` or `[` was still open
    #[error("unexpected end of input: {message}")]
    Incomplete {
        /// What was expected
        message: String,
        /// Line the input ended on
        line: u32,
    },
    /// Malformed input
    #[error("{message}")]
    Syntax {
        /// Description of the problem
        message: String,
        /// Offending line
        line: u32,
    },
}

impl ParseError {
    /// Construct a [`ParseError::Syntax`]
    pub fn syntax(message: impl Into<String>, line: u32) -> Self {
        Self::Syntax { message: message.into(), line }
    }

    /// Construct a [`ParseError::Incomplete`]
    pub fn incomplete(message: impl Into<String>, line: u32) -> Self {
        Self::Incomplete { message: message.into(), line }
    }

    /// Whether more input could complete the fragment
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }

    /// Line the error was detected on
    pub fn line(&self) -> u32 {
        match self {
            Self::Incomplete { line, .. } | Self::Syntax { line, .. } => *line,
        }
    }
}

/// Category of a locally raised error, printed as the first word of the
/// last traceback line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unbound name
    NameError,
    /// Operation applied to a value of the wrong type
    TypeError,
    /// Right type, wrong value
    ValueError,
    /// Division or modulo by zero
    ZeroDivisionError,
    /// List index out of range
    IndexError,
    /// Missing map key
    KeyError,
    /// Missing attribute or method
    AttributeError,
    /// Call depth limit exceeded
    RecursionError,
    /// Raised by a `raise` statement
    RuntimeError,
    /// Host could not be reached
    HostError,
    /// Malformed source
    SyntaxError,
}

impl ErrorKind {
    /// Name as printed in tracebacks
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::AttributeError => "AttributeError",
            Self::RecursionError => "RecursionError",
            Self::RuntimeError => "RuntimeError",
            Self::HostError => "HostError",
            Self::SyntaxError => "SyntaxError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced by a value operation, before it is attached to a location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct OpError {
    /// Category
    pub kind: ErrorKind,
    /// Description
    pub message: String,
}

impl OpError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Shorthand for a [`ErrorKind::TypeError`]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }
}

/// One line of a traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackEntry {
    /// Source identifier
    pub filename: String,
    /// Line executing in that frame
    pub line: u32,
    /// Function name, `<module>` at top level
    pub function: String,
}

/// A locally raised error with the stack it was raised in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptException {
    /// Category
    pub kind: ErrorKind,
    /// Description
    pub message: String,
    /// Frames at the raise point, outermost first
    pub traceback: Vec<TracebackEntry>,
}

/// Anything that aborts the execution of a fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaisedError {
    /// Error raised by the script or the interpreter
    #[error(transparent)]
    Script(ScriptException),
    /// Exception thrown by the host while serving a call from the script
    #[error("remote exception {handle}: {message}")]
    Remote {
        /// Host exception object
        handle: RemoteHandle,
        /// Message reported by the host
        message: String,
    },
    /// `exit(code)` was called; the process should terminate
    #[error("exit requested with status {0}")]
    Exit(i32),
}
