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

//! Recursive descent parser.
//!
//! Running out of tokens while a `{`, `(` or `[` is open yields
//! [`ParseError::Incomplete`], which the interactive console treats as a
//! request for more input. Every other failure is a [`ParseError::Syntax`].

use std::rc::Rc;

use super::{
    ast::{BinaryOp, Expr, FunctionDef, Literal, LogicalOp, Program, Stmt, StmtKind, Target, UnaryOp},
    error::ParseError,
    lexer::{tokenize, Token, TokenKind},
};

/// Deepest nesting of blocks and sub-expressions accepted
const MAX_NESTING: usize = 64;

/// Parse a complete fragment
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open `{`, `(` and `[` not yet closed
    open: usize,
    nesting: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, open: 0, nesting: 0 }
    }

    fn peek(&self) -> &TokenKind {
        // tokenize always ends with Eof, and advance never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.open += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.open = self.open.saturating_sub(1)
            }
            _ => {}
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        if self.check(&TokenKind::Eof) && self.open > 0 {
            ParseError::incomplete(message, self.line())
        } else {
            ParseError::syntax(message, self.line())
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(ParseError::syntax("too many nested expressions or blocks", self.line()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    /// Leave the levels entered by a left-deep operator chain
    fn unwind(&mut self, links: usize) {
        self.nesting -= links;
    }

    fn program(mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::RBrace) {
                return Err(ParseError::syntax("unmatched '}'", self.line()));
            }
            body.push(self.statement()?);
            self.skip_separators();
        }
        Ok(Program { body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.enter()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("expected '}'"));
            }
            body.push(self.statement()?);
            self.skip_separators();
        }
        self.advance();
        self.leave();
        Ok(body)
    }

    /// Simple statements must be followed by a separator, `}` or the end
    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::Newline | TokenKind::Semi => {
                self.advance();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline | TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        let kind = match self.peek() {
            TokenKind::Fn => return self.function(line),
            TokenKind::If => return self.if_statement(line),
            TokenKind::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                return Ok(Stmt { kind: StmtKind::While { cond, body }, line });
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_statement_end() { None } else { Some(self.expression()?) };
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Raise => {
                self.advance();
                StmtKind::Raise(self.expression()?)
            }
            _ => {
                let expr = self.expression()?;
                if self.eat(&TokenKind::Assign) {
                    let target = self.target(expr, line)?;
                    let value = self.expression()?;
                    StmtKind::Assign { target, value }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };
        self.end_of_statement()?;
        Ok(Stmt { kind, line })
    }

    fn target(&self, expr: Expr, line: u32) -> Result<Target, ParseError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { object, index } => Ok(Target::Index { object: *object, index: *index }),
            Expr::Attr { .. } => Err(ParseError::syntax("cannot assign to attribute", line)),
            _ => Err(ParseError::syntax("cannot assign to expression", line)),
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn function(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.identifier("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params: Vec<String> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let param = self.identifier("parameter name")?;
            if params.contains(&param) {
                return Err(ParseError::syntax(
                    format!("duplicate argument '{param}' in function definition"),
                    self.line(),
                ));
            }
            params.push(param);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.block()?;
        let def = FunctionDef { name, params, body, line };
        Ok(Stmt { kind: StmtKind::FnDef(Rc::new(def)), line })
    }

    fn if_statement(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.advance();
        let mut branches = Vec::new();
        let mut orelse = None;
        let cond = self.expression()?;
        branches.push((cond, self.block()?));
        while self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                let cond = self.expression()?;
                branches.push((cond, self.block()?));
            } else {
                orelse = Some(self.block()?);
                break;
            }
        }
        Ok(Stmt { kind: StmtKind::If { branches, orelse }, line })
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.or_expr()?;
        self.leave();
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        let mut links = 0;
        while self.eat(&TokenKind::Or) {
            self.enter()?;
            links += 1;
            let right = self.and_expr()?;
            left = Expr::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        self.unwind(links);
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        let mut links = 0;
        while self.eat(&TokenKind::And) {
            self.enter()?;
            links += 1;
            let right = self.not_expr()?;
            left =
                Expr::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right) };
        }
        self.unwind(links);
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let operand = self.not_expr()?;
            self.leave();
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.unwind(links);
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.unwind(links);
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Minus) {
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket) {
                self.enter()?;
                links += 1;
            }
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.arguments(TokenKind::RParen, "')'")?;
                    expr = Expr::Call { callee: Box::new(expr), args };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.identifier("attribute name")?;
                    expr = Expr::Attr { object: Box::new(expr), name };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
                }
                _ => {
                    self.unwind(links);
                    return Ok(expr);
                }
            }
        }
    }

    /// Comma separated expressions up to `close`, which is consumed
    fn arguments(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.check(&close) {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.peek().clone() {
            TokenKind::Int(value) => Expr::Literal(Literal::Int(value)),
            TokenKind::Float(value) => Expr::Literal(Literal::Float(value)),
            TokenKind::Str(value) => Expr::Literal(Literal::Str(value)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::None => Expr::Literal(Literal::None),
            TokenKind::Ident(name) => Expr::Name(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.arguments(TokenKind::RBracket, "']'")?;
                return Ok(Expr::List(items));
            }
            TokenKind::LBrace => return self.map_literal(),
            TokenKind::Eof => return Err(self.error("unexpected end of input")),
            _ => return Err(self.error("invalid syntax")),
        };
        self.advance();
        Ok(expr)
    }

    fn map_literal(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        let mut entries = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenKind::RBrace) {
            let key = self.expression()?;
            self.expect(TokenKind::Colon, "':'")?;
            self.skip_newlines();
            let value = self.expression()?;
            entries.push((key, value));
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let program = parse_program("1 + 2 * 3").unwrap();
        let StmtKind::Expr(Expr::Binary { op, right, .. }) = &program.body[0].kind else {
            panic!("expected a binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_function_and_lines() {
        let program = parse_program("x = 1\n\nfn a(n) {\n  return n + 1\n}\na(x)").unwrap();
        assert_eq!(program.body.len(), 3);
        assert_eq!(program.body[1].line, 3);
        let StmtKind::FnDef(def) = &program.body[1].kind else { panic!("expected fn") };
        assert_eq!(def.params, vec!["n"]);
        assert_eq!(def.body[0].line, 4);
        assert!(program.ends_with_expression());
    }

    #[test]
    fn test_open_delimiters_are_incomplete() {
        for source in ["fn f() {", "f(1,", "x = [1,\n2", "if x {\n  y = 1\n"] {
            let err = parse_program(source).unwrap_err();
            assert!(err.is_incomplete(), "{source:?} should be incomplete, got {err:?}");
        }
    }

    #[test]
    fn test_malformed_input_is_a_syntax_error() {
        for source in ["1 +", "x = )", "}", "1 2", "a.b = 3", "fn f(a, a) {}"] {
            let err = parse_program(source).unwrap_err();
            assert!(!err.is_incomplete(), "{source:?} should be a syntax error");
        }
    }

    #[test]
    fn test_else_if_chain_and_map_literal() {
        let program =
            parse_program("if a { 1 } else if b { 2 } else { 3 }\nm = {\n 'k': 1,\n 'j': 2\n}")
                .unwrap();
        let StmtKind::If { branches, orelse } = &program.body[0].kind else { panic!() };
        assert_eq!(branches.len(), 2);
        assert!(orelse.is_some());
        assert!(matches!(
            &program.body[1].kind,
            StmtKind::Assign { value: Expr::Map(entries), .. } if entries.len() == 2
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse_program(&source).unwrap_err();
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_long_operator_chains_are_limited() {
        let limit = |source: String| {
            let err = parse_program(&source).unwrap_err();
            assert_eq!(err.to_string(), "too many nested expressions or blocks", "{source:.20}");
        };
        limit(format!("x = 1{}", "+1".repeat(200_000)));
        limit(format!("x = 2{}", "*2".repeat(500)));
        limit(format!("x = a{}", " or a".repeat(500)));
        limit(format!("x = a{}", ".b".repeat(500)));
        limit(format!("x = f{}", "()".repeat(500)));

        // short chains still parse, and sibling chains do not add up
        parse_program(&format!("x = 1{}", "+1".repeat(40))).unwrap();
        parse_program(&format!("x = a{} + b{}", ".c".repeat(30), ".d".repeat(30))).unwrap();
        parse_program(&format!("x = [{}]", vec!["1 + 1 + 1"; 200].join(", "))).unwrap();
    }
}
