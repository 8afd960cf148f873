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

//! Built-in functions and the methods of lists and maps.

use std::io::Write;

use super::{
    error::{ErrorKind, OpError},
    value::Value,
};

/// Largest list `range` will build
const MAX_RANGE_LEN: i64 = 1 << 24;

/// Functions available in every namespace without being bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `print(*values)`
    Print,
    /// `len(x)`
    Len,
    /// `str(x)`
    Str,
    /// `repr(x)`
    Repr,
    /// `int(x)`
    Int,
    /// `float(x)`
    Float,
    /// `type(x)`
    Type,
    /// `range([start,] stop)`
    Range,
    /// `exit([code])`
    Exit,
}

const ALL: &[Builtin] = &[
    Builtin::Print,
    Builtin::Len,
    Builtin::Str,
    Builtin::Repr,
    Builtin::Int,
    Builtin::Float,
    Builtin::Type,
    Builtin::Range,
    Builtin::Exit,
];

impl Builtin {
    /// Resolve a name that is bound nowhere else
    pub fn lookup(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|b| b.name() == name)
    }

    /// Name the builtin is reachable under
    pub fn name(&self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Str => "str",
            Self::Repr => "repr",
            Self::Int => "int",
            Self::Float => "float",
            Self::Type => "type",
            Self::Range => "range",
            Self::Exit => "exit",
        }
    }
}

/// Why a builtin did not produce a value
#[derive(Debug)]
pub enum BuiltinFailure {
    /// Ordinary error
    Op(OpError),
    /// `exit` was called with this status
    Exit(i32),
}

impl From<OpError> for BuiltinFailure {
    fn from(err: OpError) -> Self {
        Self::Op(err)
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), OpError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max { format!("{min}") } else { format!("{min} to {max}") };
    Err(OpError::type_error(format!(
        "{name}() takes {expected} argument(s) but {} were given",
        args.len()
    )))
}

/// Run a builtin; `out` receives whatever `print` writes
pub fn call(builtin: Builtin, args: Vec<Value>, out: &mut dyn Write) -> Result<Value, BuiltinFailure> {
    let name = builtin.name();
    match builtin {
        Builtin::Print => {
            let line = args.iter().map(Value::to_display).collect::<Vec<_>>().join(" ");
            writeln!(out, "{line}")
                .and_then(|_| out.flush())
                .map_err(|e| OpError::new(ErrorKind::RuntimeError, format!("print failed: {e}")))?;
            Ok(Value::None)
        }
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.borrow().len(),
                Value::Map(entries) => entries.borrow().len(),
                other => {
                    return Err(OpError::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    ))
                    .into())
                }
            };
            Ok(Value::Int(len as i64))
        }
        Builtin::Str => {
            arity(name, &args, 0, 1)?;
            Ok(Value::str(args.first().map(Value::to_display).unwrap_or_default()))
        }
        Builtin::Repr => {
            arity(name, &args, 1, 1)?;
            Ok(Value::str(args[0].repr()))
        }
        Builtin::Int => {
            arity(name, &args, 1, 1)?;
            let value = match &args[0] {
                Value::Int(i) => *i,
                Value::Bool(b) => *b as i64,
                Value::Float(f) if f.is_finite() => f.trunc() as i64,
                Value::Str(s) => s.trim().parse().map_err(|_| {
                    OpError::new(
                        ErrorKind::ValueError,
                        format!("invalid literal for int(): {}", args[0].repr()),
                    )
                })?,
                other => {
                    return Err(OpError::type_error(format!(
                        "int() argument must be a string or a number, not '{}'",
                        other.type_name()
                    ))
                    .into())
                }
            };
            Ok(Value::Int(value))
        }
        Builtin::Float => {
            arity(name, &args, 1, 1)?;
            let value = match &args[0] {
                Value::Int(i) => *i as f64,
                Value::Bool(b) => *b as i64 as f64,
                Value::Float(f) => *f,
                Value::Str(s) => s.trim().parse().map_err(|_| {
                    OpError::new(
                        ErrorKind::ValueError,
                        format!("could not convert string to float: {}", args[0].repr()),
                    )
                })?,
                other => {
                    return Err(OpError::type_error(format!(
                        "float() argument must be a string or a number, not '{}'",
                        other.type_name()
                    ))
                    .into())
                }
            };
            Ok(Value::Float(value))
        }
        Builtin::Type => {
            arity(name, &args, 1, 1)?;
            Ok(Value::str(args[0].type_name()))
        }
        Builtin::Range => {
            arity(name, &args, 1, 2)?;
            let bounds: Vec<i64> = args
                .iter()
                .map(|arg| match arg {
                    Value::Int(i) => Ok(*i),
                    other => Err(OpError::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name()
                    ))),
                })
                .collect::<Result<_, _>>()?;
            let (start, stop) = match bounds.as_slice() {
                [stop] => (0, *stop),
                [start, stop] => (*start, *stop),
                _ => unreachable!("arity checked above"),
            };
            if stop.saturating_sub(start) > MAX_RANGE_LEN {
                return Err(OpError::new(ErrorKind::ValueError, "range is too large").into());
            }
            Ok(Value::list((start..stop).map(Value::Int).collect()))
        }
        Builtin::Exit => {
            arity(name, &args, 0, 1)?;
            let code = match args.first() {
                None | Some(Value::None) => 0,
                Some(Value::Int(code)) => i32::try_from(*code).unwrap_or(1),
                Some(Value::Bool(b)) => *b as i32,
                // non-integer statuses are printed and exit with 1
                Some(other) => {
                    let _ = writeln!(out, "{}", other.to_display());
                    1
                }
            };
            Err(BuiltinFailure::Exit(code))
        }
    }
}

/// Call a method of a list, map or string
pub fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value, OpError> {
    match (receiver, method) {
        (Value::List(items), "append") => {
            arity("append", &args, 1, 1)?;
            items.borrow_mut().extend(args);
            Ok(Value::None)
        }
        (Value::List(items), "pop") => {
            arity("pop", &args, 0, 0)?;
            items
                .borrow_mut()
                .pop()
                .ok_or_else(|| OpError::new(ErrorKind::IndexError, "pop from empty list"))
        }
        (Value::Map(entries), "keys") => {
            arity("keys", &args, 0, 0)?;
            Ok(Value::list(entries.borrow().keys().map(Value::str).collect()))
        }
        (Value::Map(entries), "get") => {
            arity("get", &args, 1, 2)?;
            let Value::Str(key) = &args[0] else {
                return Err(OpError::type_error("map keys must be str"));
            };
            let fallback = args.get(1).cloned().unwrap_or_default();
            Ok(entries.borrow().get(key.as_ref()).cloned().unwrap_or(fallback))
        }
        (Value::Str(s), "upper") => {
            arity("upper", &args, 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        (Value::Str(s), "lower") => {
            arity("lower", &args, 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        _ => Err(OpError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{method}'", receiver.type_name()),
        )),
    }
}
