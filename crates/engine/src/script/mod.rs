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

//! The embedded script language.
//!
//! A small dynamically typed language with Python-flavoured expressions and
//! brace delimited blocks:
//!
//! ```text
//! fn a(x) {
//!     return x + 1
//! }
//! items = [a(20), 'text', {'key': None}]
//! list = java.util.ArrayList()
//! list.add(items[0])
//! ```
//!
//! Names that are not bound locally resolve to builtins (`print`, `len`,
//! `str`, `repr`, `int`, `float`, `type`, `range`, `exit`). Attribute access
//! and calls on remote values are forwarded to the host.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{ErrorKind, OpError, ParseError, RaisedError, ScriptException, TracebackEntry};
pub use interpreter::{DisplayHook, ExecMode, Frame, Interpreter, Namespace, MAX_CALL_DEPTH};
pub use lexer::KEYWORDS;
pub use parser::parse_program;
pub use value::Value;
