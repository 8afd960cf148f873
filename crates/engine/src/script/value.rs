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

//! Runtime values.
//!
//! Lists and maps are shared, mutable containers: assigning one to a second
//! name aliases it, as in the languages the host users already know.

use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    fmt::{self, Write as _},
    rc::Rc,
};

use ease_common::{HostValue, RemoteHandle};

use super::{
    ast::{BinaryOp, FunctionDef},
    builtins::Builtin,
    error::{ErrorKind, OpError},
};

/// Containers nested deeper than this are printed as `...` and refused by
/// the host conversion
const MAX_VALUE_DEPTH: usize = 64;

/// Representations stop growing past this many bytes
const MAX_REPR_LEN: usize = 1 << 20;

/// Containers with more nodes than this, shared ones counted each time they
/// are reached, are refused by the host conversion
const MAX_HOST_NODES: usize = 1 << 20;

/// A user defined function closed over the file it was defined in
#[derive(Debug)]
pub struct Function {
    /// Definition
    pub def: Rc<FunctionDef>,
    /// Source identifier of the defining fragment
    pub filename: Rc<str>,
}

/// Value of an expression
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `None`
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Shared list
    List(Rc<RefCell<Vec<Value>>>),
    /// Shared string-keyed map
    Map(Rc<RefCell<BTreeMap<String, Value>>>),
    /// User function
    Function(Rc<Function>),
    /// Built-in function
    Builtin(Builtin),
    /// Object living on the host
    Remote(RemoteHandle),
}

impl Value {
    /// Build a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(s.as_ref()))
    }

    /// Build a list value
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Build a map value
    pub fn map(entries: BTreeMap<String, Self>) -> Self {
        Self::Map(Rc::new(RefCell::new(entries)))
    }

    /// Whether this is `None`
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Name of the value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Function(_) => "function",
            Self::Builtin(_) => "builtin_function",
            Self::Remote(_) => "remote",
        }
    }

    /// Truth value used by conditions and logical operators
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Map(entries) => !entries.borrow().is_empty(),
            Self::Function(_) | Self::Builtin(_) | Self::Remote(_) => true,
        }
    }

    /// Printable representation, as shown by the interactive console
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0, &mut Vec::new());
        if out.len() > MAX_REPR_LEN {
            out.push_str("...");
        }
        out
    }

    /// Display form: strings unquoted, everything else as [`Value::repr`]
    pub fn to_display(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// `active` holds the containers currently being printed
    fn write_repr(&self, out: &mut String, depth: usize, active: &mut Vec<usize>) {
        if out.len() > MAX_REPR_LEN {
            return;
        }
        if depth > MAX_VALUE_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&format_float(*f)),
            Self::Str(s) => out.push_str(&quote(s)),
            Self::List(items) => {
                let id = address(items);
                if active.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                active.push(id);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if out.len() > MAX_REPR_LEN {
                        break;
                    }
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, depth + 1, active);
                }
                out.push(']');
                active.pop();
            }
            Self::Map(entries) => {
                let id = address(entries);
                if active.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                active.push(id);
                out.push('{');
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if out.len() > MAX_REPR_LEN {
                        break;
                    }
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&quote(key));
                    out.push_str(": ");
                    value.write_repr(out, depth + 1, active);
                }
                out.push('}');
                active.pop();
            }
            Self::Function(function) => {
                let _ = write!(out, "<function {}>", function.def.name);
            }
            Self::Builtin(builtin) => {
                let _ = write!(out, "<built-in function {}>", builtin.name());
            }
            Self::Remote(handle) => {
                let _ = write!(out, "<remote object {handle}>");
            }
        }
    }

    /// Identity of a list or map, shared by all its aliases
    pub fn container_id(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(address(items)),
            Self::Map(entries) => Some(address(entries)),
            _ => None,
        }
    }

    /// Primitive values and remote handles, which cross to the host unchanged
    pub fn as_transferable(&self) -> Option<HostValue> {
        match self {
            Self::None => Some(HostValue::None),
            Self::Bool(b) => Some(HostValue::Bool(*b)),
            Self::Int(i) => Some(HostValue::Int(*i)),
            Self::Float(f) => Some(HostValue::Float(*f)),
            Self::Str(s) => Some(HostValue::Str(s.to_string())),
            Self::Remote(handle) => Some(HostValue::Remote(handle.clone())),
            _ => None,
        }
    }

    /// Deep conversion for passing the value to the host
    pub fn to_host(&self) -> Result<HostValue, OpError> {
        self.to_host_at(0, &mut Vec::new(), &mut 0)
    }

    fn to_host_at(
        &self,
        depth: usize,
        active: &mut Vec<usize>,
        nodes: &mut usize,
    ) -> Result<HostValue, OpError> {
        if depth > MAX_VALUE_DEPTH {
            return Err(OpError::new(
                ErrorKind::ValueError,
                "value is nested too deeply to send to the host",
            ));
        }
        *nodes += 1;
        if *nodes > MAX_HOST_NODES {
            return Err(OpError::new(ErrorKind::ValueError, "value is too large to send to the host"));
        }
        if let Some(value) = self.as_transferable() {
            return Ok(value);
        }
        let Some(id) = self.container_id() else {
            return Err(OpError::type_error(format!(
                "cannot send a '{}' to the host",
                self.type_name()
            )));
        };
        if active.contains(&id) {
            return Err(OpError::new(
                ErrorKind::ValueError,
                "cannot send a value that contains itself to the host",
            ));
        }
        active.push(id);
        let converted = match self {
            Self::List(items) => items
                .borrow()
                .iter()
                .map(|item| item.to_host_at(depth + 1, active, nodes))
                .collect::<Result<_, _>>()
                .map(HostValue::List),
            Self::Map(entries) => entries
                .borrow()
                .iter()
                .map(|(key, value)| Ok((key.clone(), value.to_host_at(depth + 1, active, nodes)?)))
                .collect::<Result<_, _>>()
                .map(HostValue::Map),
            other => Err(OpError::type_error(format!(
                "cannot send a '{}' to the host",
                other.type_name()
            ))),
        };
        active.pop();
        converted
    }

    /// Value received from the host
    pub fn from_host(value: HostValue) -> Self {
        match value {
            HostValue::None => Self::None,
            HostValue::Bool(b) => Self::Bool(b),
            HostValue::Int(i) => Self::Int(i),
            HostValue::Float(f) => Self::Float(f),
            HostValue::Str(s) => Self::str(s),
            HostValue::List(items) => Self::list(items.into_iter().map(Self::from_host).collect()),
            HostValue::Map(entries) => {
                Self::map(entries.into_iter().map(|(k, v)| (k, Self::from_host(v))).collect())
            }
            HostValue::Remote(handle) => Self::Remote(handle),
        }
    }
}

impl Value {
    /// Equality that fails instead of overflowing on deeply nested or
    /// self-referencing containers
    pub fn try_eq(&self, other: &Self) -> Result<bool, OpError> {
        self.eq_at(other, 0, &mut HashSet::new())
    }

    /// `proven` holds container pairs already found equal
    fn eq_at(
        &self,
        other: &Self,
        depth: usize,
        proven: &mut HashSet<(usize, usize)>,
    ) -> Result<bool, OpError> {
        let (pair, same) = match (self, other) {
            (Self::List(a), Self::List(b)) => ((address(a), address(b)), Rc::ptr_eq(a, b)),
            (Self::Map(a), Self::Map(b)) => ((address(a), address(b)), Rc::ptr_eq(a, b)),
            _ => return Ok(self.eq_flat(other)),
        };
        if same || proven.contains(&pair) {
            return Ok(true);
        }
        if depth >= MAX_VALUE_DEPTH {
            return Err(OpError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded in comparison",
            ));
        }
        let equal = match (self, other) {
            (Self::List(a), Self::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.eq_at(y, depth + 1, proven)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Self::Map(a), Self::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if ka != kb || !va.eq_at(vb, depth + 1, proven)? {
                        return Ok(false);
                    }
                }
                true
            }
            _ => false,
        };
        if equal {
            proven.insert(pair);
        }
        Ok(equal)
    }

    fn eq_flat(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Remote(a), Self::Remote(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }
}

/// Identity of a shared container
fn address<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as usize
}

/// Containers too deep to compare are unequal; use [`Value::try_eq`] to
/// tell that apart
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.try_eq(other).unwrap_or(false)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl Value {
    fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(*b as i64)),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

/// Python style float formatting: integral values keep a `.0`
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Quote a string the way `repr` does
pub fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> OpError {
    OpError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> OpError {
    OpError::new(ErrorKind::ValueError, "integer overflow")
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, OpError> {
    let times = usize::try_from(times.max(0)).map_err(|_| overflow())?;
    if items.len().checked_mul(times).is_none_or(|n| n > 1 << 24) {
        return Err(OpError::new(ErrorKind::ValueError, "repeated sequence is too large"));
    }
    Ok(std::iter::repeat_n(items, times).flat_map(|chunk| chunk.iter().cloned()).collect())
}

/// Apply a binary operator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left.try_eq(right)?)),
        BinaryOp::Ne => return Ok(Value::Bool(!left.try_eq(right)?)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(op, left, right)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::str(format!("{a}{b}"))),
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == BinaryOp::Mul => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::str(repeat(&chars, *n)?.into_iter().collect::<String>()))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items))
            if op == BinaryOp::Mul =>
        {
            let items = items.borrow();
            Ok(Value::list(repeat(&items, *n)?))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => int_arith(op, a, b),
            (Some(a), Some(b)) => float_arith(op, a.as_f64(), b.as_f64()),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, OpError> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => return float_arith(op, a as f64, b as f64),
        BinaryOp::Mod => {
            if b == 0 {
                return Err(OpError::new(ErrorKind::ZeroDivisionError, "integer modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // result takes the sign of the divisor
            if r != 0 && (r < 0) != (b < 0) {
                r + b
            } else {
                r
            }
        }
        _ => unreachable!("comparison operators are handled by binary()"),
    };
    Ok(Value::Int(value))
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, OpError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(OpError::new(ErrorKind::ZeroDivisionError, "division by zero"));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(OpError::new(ErrorKind::ZeroDivisionError, "float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        _ => unreachable!("comparison operators are handled by binary()"),
    };
    Ok(Value::Float(value))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, OpError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => {
                return Err(OpError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                )))
            }
        },
    };
    // NaN compares false in every direction
    Ok(ordering.unwrap_or(match op {
        BinaryOp::Lt | BinaryOp::Le => Ordering::Greater,
        _ => Ordering::Less,
    }))
}

/// Unary minus
pub fn negate(value: &Value) -> Result<Value, OpError> {
    match value.as_number() {
        Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(OpError::type_error(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// `object[index]`
pub fn get_index(object: &Value, index: &Value) -> Result<Value, OpError> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            normalize_index(*i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| OpError::new(ErrorKind::IndexError, "list index out of range"))
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(*i, chars.len())
                .map(|i| Value::str(chars[i].to_string()))
                .ok_or_else(|| OpError::new(ErrorKind::IndexError, "string index out of range"))
        }
        (Value::Map(entries), Value::Str(key)) => entries
            .borrow()
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| OpError::new(ErrorKind::KeyError, quote(key))),
        (Value::List(_) | Value::Str(_), other) => Err(OpError::type_error(format!(
            "{} indices must be integers, not {}",
            object.type_name(),
            other.type_name()
        ))),
        (Value::Map(_), other) => {
            Err(OpError::type_error(format!("map keys must be str, not {}", other.type_name())))
        }
        _ => Err(OpError::type_error(format!(
            "'{}' object is not subscriptable",
            object.type_name()
        ))),
    }
}

/// `object[index] = value`
pub fn set_index(object: &Value, index: &Value, value: Value) -> Result<(), OpError> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = normalize_index(*i, len).ok_or_else(|| {
                OpError::new(ErrorKind::IndexError, "list assignment index out of range")
            })?;
            items[slot] = value;
            Ok(())
        }
        (Value::Map(entries), Value::Str(key)) => {
            entries.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        (Value::List(_), other) => Err(OpError::type_error(format!(
            "list indices must be integers, not {}",
            other.type_name()
        ))),
        (Value::Map(_), other) => {
            Err(OpError::type_error(format!("map keys must be str, not {}", other.type_name())))
        }
        _ => Err(OpError::type_error(format!(
            "'{}' object does not support item assignment",
            object.type_name()
        ))),
    }
}
