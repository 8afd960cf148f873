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

//! Tree-walking interpreter.
//!
//! The interpreter owns the persistent global namespace and the live call
//! stack. Two single-slot extension points hang off it:
//!
//! - a [`StepObserver`] called on every frame entry, statement, raised error
//!   and frame exit (the trace relay lives here), and
//! - a [`DisplayHook`] receiving the values of bare expression statements.
//!
//! Remote objects are resolved through an optional [`HostGateway`].

use std::{collections::BTreeMap, io::Write, rc::Rc};

use ease_common::{HostValue, RemoteHandle, TraceEvent};
use tracing::trace;

use super::{
    ast::{Expr, Literal, LogicalOp, Program, Stmt, StmtKind, Target, UnaryOp},
    builtins::{self, Builtin, BuiltinFailure},
    error::{ErrorKind, OpError, RaisedError, ScriptException, TracebackEntry},
    value::{self, Function, Value},
};
use crate::{
    host::{HostError, HostGateway},
    trace::{FrameView, StepObserver, TraceControl},
};

/// Deepest call stack a script may build
pub const MAX_CALL_DEPTH: usize = 200;

/// Name of the frame running top-level code
pub const MODULE_FUNCTION: &str = "<module>";

/// The global namespace; iteration is in name order
pub type Namespace = BTreeMap<String, Value>;

/// One activation on the call stack
#[derive(Debug)]
pub struct Frame {
    /// Source identifier of the code running in this frame
    pub filename: Rc<str>,
    /// Function name, [`MODULE_FUNCTION`] for top-level code
    pub function: Rc<str>,
    /// Line currently executing
    pub line: u32,
    /// Local variables; `None` for top-level frames, which use the globals
    locals: Option<Namespace>,
}

/// Receives the value of displayed expression statements
pub trait DisplayHook {
    /// Called with every displayed value, `None` included
    fn display(&mut self, value: Value, globals: &mut Namespace);
}

/// How a fragment's expression statements are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Only a trailing bare expression is displayed
    Block,
    /// Every top-level bare expression is displayed, like a shell
    Interactive,
}

/// How a statement finished
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The interpreter
pub struct Interpreter {
    globals: Namespace,
    frames: Vec<Frame>,
    observer: Option<Box<dyn StepObserver>>,
    display_hook: Option<Box<dyn DisplayHook>>,
    host: Option<Rc<dyn HostGateway>>,
    output: Box<dyn Write>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals.len())
            .field("frames", &self.frames.len())
            .field("observer", &self.observer.is_some())
            .field("host", &self.host.is_some())
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter printing to stdout
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Interpreter printing to `output`
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            globals: Namespace::new(),
            frames: Vec::new(),
            observer: None,
            display_hook: None,
            host: None,
            output,
        }
    }

    /// The global namespace
    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// Mutable access to the global namespace
    pub fn globals_mut(&mut self) -> &mut Namespace {
        &mut self.globals
    }

    /// Live call stack, outermost first
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Install a step observer, returning the one it replaces.
    /// `None` empties the slot.
    pub fn set_observer(
        &mut self,
        observer: Option<Box<dyn StepObserver>>,
    ) -> Option<Box<dyn StepObserver>> {
        std::mem::replace(&mut self.observer, observer)
    }

    /// Whether a step observer is installed
    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// Install the display hook
    pub fn set_display_hook(&mut self, hook: Box<dyn DisplayHook>) {
        self.display_hook = Some(hook);
    }

    /// Connect the interpreter to the host
    pub fn set_host(&mut self, host: Rc<dyn HostGateway>) {
        self.host = Some(host);
    }

    /// Run a parsed fragment in a fresh top-level frame
    pub fn exec(
        &mut self,
        program: &Program,
        filename: &str,
        mode: ExecMode,
    ) -> Result<(), RaisedError> {
        let first_line = program.body.first().map_or(1, |stmt| stmt.line);
        self.frames.push(Frame {
            filename: Rc::from(filename),
            function: Rc::from(MODULE_FUNCTION),
            line: first_line,
            locals: None,
        });
        self.emit(TraceEvent::Call);

        let result = self.exec_module(&program.body, mode);

        if result.is_err() {
            self.emit(TraceEvent::Exception);
        }
        self.emit(TraceEvent::Return);
        self.frames.pop();
        result
    }

    fn exec_module(&mut self, body: &[Stmt], mode: ExecMode) -> Result<(), RaisedError> {
        let last = body.len().saturating_sub(1);
        for (i, stmt) in body.iter().enumerate() {
            let display = match mode {
                ExecMode::Interactive => true,
                ExecMode::Block => i == last,
            };
            let flow = match &stmt.kind {
                StmtKind::Expr(expr) if display => {
                    self.enter_statement(stmt);
                    let value = self.eval(expr)?;
                    self.display(value);
                    Flow::Normal
                }
                _ => self.exec_stmt(stmt)?,
            };
            match flow {
                Flow::Normal => {}
                Flow::Return(_) => return Err(self.syntax_error("'return' outside function")),
                Flow::Break => return Err(self.syntax_error("'break' outside loop")),
                Flow::Continue => return Err(self.syntax_error("'continue' not properly in loop")),
            }
        }
        Ok(())
    }

    fn display(&mut self, value: Value) {
        if let Some(hook) = self.display_hook.as_mut() {
            hook.display(value, &mut self.globals);
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        let Some(observer) = self.observer.as_mut() else { return };
        let view = FrameView::innermost(&self.frames);
        if observer.on_step(view, event) == TraceControl::Detach {
            trace!("Step observer detached itself");
            self.observer = None;
        }
    }

    fn enter_statement(&mut self, stmt: &Stmt) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = stmt.line;
        }
        self.emit(TraceEvent::Line);
    }

    fn traceback(&self) -> Vec<TracebackEntry> {
        self.frames
            .iter()
            .map(|frame| TracebackEntry {
                filename: frame.filename.to_string(),
                line: frame.line,
                function: frame.function.to_string(),
            })
            .collect()
    }

    /// Attach the current stack to an operation error
    fn raise(&self, err: OpError) -> RaisedError {
        RaisedError::Script(ScriptException {
            kind: err.kind,
            message: err.message,
            traceback: self.traceback(),
        })
    }

    fn syntax_error(&self, message: &str) -> RaisedError {
        self.raise(OpError::new(ErrorKind::SyntaxError, message))
    }

    fn host_error(&self, err: HostError) -> RaisedError {
        match err {
            HostError::Remote { handle, message } => RaisedError::Remote { handle, message },
            HostError::Transport(message) => self.raise(OpError::new(ErrorKind::HostError, message)),
        }
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Flow, RaisedError> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RaisedError> {
        self.enter_statement(stmt);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { target, value } => match target {
                Target::Name(name) => {
                    let value = self.eval(value)?;
                    self.store(name, value);
                }
                Target::Index { object, index } => {
                    let object = self.eval(object)?;
                    let index = self.eval(index)?;
                    let value = self.eval(value)?;
                    value::set_index(&object, &index, value).map_err(|e| self.raise(e))?;
                }
            },
            StmtKind::FnDef(def) => {
                let filename = self.frames.last().map_or_else(|| Rc::from(""), |f| f.filename.clone());
                let function = Function { def: def.clone(), filename };
                self.store(&def.name, Value::Function(Rc::new(function)));
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = orelse {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond)?.is_truthy() {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Raise(expr) => {
                return Err(match self.eval(expr)? {
                    Value::Str(message) => {
                        self.raise(OpError::new(ErrorKind::RuntimeError, message.as_ref()))
                    }
                    Value::Remote(handle) => {
                        let message = handle.to_string();
                        RaisedError::Remote { handle, message }
                    }
                    other => self.raise(OpError::type_error(format!(
                        "exceptions must be str or remote objects, not '{}'",
                        other.type_name()
                    ))),
                });
            }
        }
        Ok(Flow::Normal)
    }

    fn store(&mut self, name: &str, value: Value) {
        match self.frames.last_mut().and_then(|frame| frame.locals.as_mut()) {
            Some(locals) => locals.insert(name.to_string(), value),
            None => self.globals.insert(name.to_string(), value),
        };
    }

    fn lookup(&self, name: &str) -> Result<Value, RaisedError> {
        let local = self
            .frames
            .last()
            .and_then(|frame| frame.locals.as_ref())
            .and_then(|locals| locals.get(name));
        if let Some(value) = local.or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        Builtin::lookup(name).map(Value::Builtin).ok_or_else(|| {
            self.raise(OpError::new(ErrorKind::NameError, format!("name '{name}' is not defined")))
        })
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RaisedError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RaisedError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::str(s),
            }),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(key) => key.to_string(),
                        other => {
                            return Err(self.raise(OpError::type_error(format!(
                                "map keys must be str, not {}",
                                other.type_name()
                            ))))
                        }
                    };
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => value::negate(&operand).map_err(|e| self.raise(e)),
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                value::binary(*op, &left, &right).map_err(|e| self.raise(e))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Expr::Call { callee, args } => {
                if let Expr::Attr { object, name } = callee.as_ref() {
                    let receiver = self.eval(object)?;
                    let args = self.eval_all(args)?;
                    return self.call_method(receiver, name, args);
                }
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                self.call_value(callee, args)
            }
            Expr::Attr { object, name } => {
                let object = self.eval(object)?;
                match object {
                    Value::Remote(handle) => {
                        let result = self.host()?.get_attribute(&handle, name);
                        result.map(Value::from_host).map_err(|e| self.host_error(e))
                    }
                    other => Err(self.raise(OpError::new(
                        ErrorKind::AttributeError,
                        format!("'{}' object has no attribute '{name}'", other.type_name()),
                    ))),
                }
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                value::get_index(&object, &index).map_err(|e| self.raise(e))
            }
        }
    }

    fn host(&self) -> Result<Rc<dyn HostGateway>, RaisedError> {
        self.host.clone().ok_or_else(|| {
            self.raise(OpError::new(ErrorKind::HostError, "no host is connected"))
        })
    }

    fn host_args(&self, args: &[Value]) -> Result<Vec<HostValue>, RaisedError> {
        args.iter().map(|arg| arg.to_host().map_err(|e| self.raise(e))).collect()
    }

    fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RaisedError> {
        match receiver {
            Value::Remote(handle) => {
                let args = self.host_args(&args)?;
                let result = self.host()?.invoke(&handle, name, args);
                result.map(Value::from_host).map_err(|e| self.host_error(e))
            }
            receiver => builtins::call_method(&receiver, name, args).map_err(|e| self.raise(e)),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RaisedError> {
        match callee {
            Value::Function(function) => self.call_function(&function, args),
            Value::Builtin(builtin) => {
                builtins::call(builtin, args, &mut *self.output).map_err(|failure| match failure {
                    BuiltinFailure::Op(err) => self.raise(err),
                    BuiltinFailure::Exit(code) => RaisedError::Exit(code),
                })
            }
            Value::Remote(handle) => self.construct(&handle, &args),
            other => Err(self.raise(OpError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            )))),
        }
    }

    fn construct(&self, class: &RemoteHandle, args: &[Value]) -> Result<Value, RaisedError> {
        let args = self.host_args(args)?;
        let result = self.host()?.construct(class, args);
        result.map(Value::from_host).map_err(|e| self.host_error(e))
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, RaisedError> {
        let def = &function.def;
        if args.len() != def.params.len() {
            return Err(self.raise(OpError::type_error(format!(
                "{}() takes {} positional argument(s) but {} were given",
                def.name,
                def.params.len(),
                args.len()
            ))));
        }
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.raise(OpError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            )));
        }

        let locals = def.params.iter().cloned().zip(args).collect();
        self.frames.push(Frame {
            filename: function.filename.clone(),
            function: Rc::from(def.name.as_str()),
            line: def.line,
            locals: Some(locals),
        });
        self.emit(TraceEvent::Call);

        let result = match self.exec_block(&def.body) {
            Ok(Flow::Normal) => Ok(Value::None),
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Break) => Err(self.syntax_error("'break' outside loop")),
            Ok(Flow::Continue) => Err(self.syntax_error("'continue' not properly in loop")),
            Err(err) => Err(err),
        };

        if result.is_err() {
            self.emit(TraceEvent::Exception);
        }
        self.emit(TraceEvent::Return);
        self.frames.pop();
        result
    }
}
