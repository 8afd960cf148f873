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

//! Syntax tree of the script language.

use std::rc::Rc;

/// A parsed fragment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
}

impl Program {
    /// Whether the last top-level statement is a bare expression
    pub fn ends_with_expression(&self) -> bool {
        matches!(self.body.last(), Some(Stmt { kind: StmtKind::Expr(_), .. }))
    }
}

/// A statement and the line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What the statement does
    pub kind: StmtKind,
    /// 1-based source line
    pub line: u32,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Bare expression
    Expr(Expr),
    /// `target = value`
    Assign {
        /// Where the value goes
        target: Target,
        /// Assigned expression
        value: Expr,
    },
    /// `fn name(params) { ... }`
    FnDef(Rc<FunctionDef>),
    /// `if c { } else if c { } else { }`
    If {
        /// Conditions and their bodies, tried in order
        branches: Vec<(Expr, Vec<Stmt>)>,
        /// Trailing `else` body
        orelse: Option<Vec<Stmt>>,
    },
    /// `while cond { ... }`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// `return [value]`
    Return(Option<Expr>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `raise value`
    Raise(Expr),
}

/// Assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Plain name
    Name(String),
    /// `object[index]`
    Index {
        /// Container
        object: Expr,
        /// Key or position
        index: Expr,
    },
}

/// A function definition
#[derive(Debug, PartialEq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Parameter names
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Stmt>,
    /// Line of the `fn` keyword
    pub line: u32,
}

/// Literal constants
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `not x`
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    /// Operator as written in source
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Short-circuit operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant
    Literal(Literal),
    /// Variable reference
    Name(String),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `{"k": v}` (only in expression position)
    Map(Vec<(Expr, Expr)>),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `and` / `or`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand, evaluated only when needed
        right: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// Called expression; an [`Expr::Attr`] callee is a method call
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `object.name`
    Attr {
        /// Receiver
        object: Box<Expr>,
        /// Attribute name
        name: String,
    },
    /// `object[index]`
    Index {
        /// Container
        object: Box<Expr>,
        /// Key or position
        index: Box<Expr>,
    },
}
