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

//! Tokenizer for the script language.
//!
//! Newlines are statement separators, except inside `(...)` and `[...]`
//! where they are skipped. Braces keep newlines because they delimit blocks.

use super::error::ParseError;

/// Token kinds produced by [`tokenize`]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal, escapes already resolved
    Str(String),
    /// Identifier
    Ident(String),

    // keywords
    /// `fn`
    Fn,
    /// `return`
    Return,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `raise`
    Raise,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,

    // punctuation
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `;`
    Semi,
    /// End of line
    Newline,
    /// `=`
    Assign,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// End of input
    Eof,
}

/// Keywords that can never be used as identifiers
pub const KEYWORDS: &[&str] = &[
    "fn", "return", "if", "else", "while", "break", "continue", "raise", "and", "or", "not",
    "True", "False", "None",
];

/// A token with the line it starts on (1-based)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was read
    pub kind: TokenKind,
    /// Source line
    pub line: u32,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "fn" => TokenKind::Fn,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "raise" => TokenKind::Raise,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "True" => TokenKind::True,
        "False" => TokenKind::False,
        "None" => TokenKind::None,
        _ => return None,
    };
    Some(kind)
}

/// Split `source` into tokens, always terminated by [`TokenKind::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1u32;
    // depth of ( and [; newlines inside them are not separators
    let mut grouping = 0usize;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\n' => {
                if grouping == 0 {
                    tokens.push(Token { kind: TokenKind::Newline, line });
                }
                line += 1;
                pos += 1;
            }
            ' ' | '\t' | '\r' => pos += 1,
            '#' => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '0'..='9' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '_') {
                    pos += 1;
                }
                let is_float = pos + 1 < chars.len()
                    && chars[pos] == '.'
                    && chars[pos + 1].is_ascii_digit();
                if is_float {
                    pos += 1;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
                let text: String = chars[start..pos].iter().filter(|c| **c != '_').collect();
                let kind = if is_float {
                    text.parse()
                        .map(TokenKind::Float)
                        .map_err(|_| ParseError::syntax(format!("invalid number '{text}'"), line))?
                } else {
                    text.parse().map(TokenKind::Int).map_err(|_| {
                        ParseError::syntax(format!("integer literal '{text}' is too large"), line)
                    })?
                };
                tokens.push(Token { kind, line });
            }
            '"' | '\'' => {
                let quote = c;
                let start_line = line;
                pos += 1;
                let mut text = String::new();
                loop {
                    let Some(&ch) = chars.get(pos) else {
                        return Err(ParseError::syntax("unterminated string literal", start_line));
                    };
                    pos += 1;
                    match ch {
                        '\n' => {
                            return Err(ParseError::syntax(
                                "unterminated string literal",
                                start_line,
                            ))
                        }
                        '\\' => {
                            let Some(&escaped) = chars.get(pos) else {
                                return Err(ParseError::syntax(
                                    "unterminated string literal",
                                    start_line,
                                ));
                            };
                            pos += 1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                '0' => '\0',
                                other => other,
                            });
                        }
                        ch if ch == quote => break,
                        ch => text.push(ch),
                    }
                }
                tokens.push(Token { kind: TokenKind::Str(text), line: start_line });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
                tokens.push(Token { kind, line });
            }
            _ => {
                let next = chars.get(pos + 1).copied();
                let (kind, width) = match (c, next) {
                    ('=', Some('=')) => (TokenKind::EqEq, 2),
                    ('!', Some('=')) => (TokenKind::NotEq, 2),
                    ('<', Some('=')) => (TokenKind::Le, 2),
                    ('>', Some('=')) => (TokenKind::Ge, 2),
                    ('=', _) => (TokenKind::Assign, 1),
                    ('<', _) => (TokenKind::Lt, 1),
                    ('>', _) => (TokenKind::Gt, 1),
                    ('+', _) => (TokenKind::Plus, 1),
                    ('-', _) => (TokenKind::Minus, 1),
                    ('*', _) => (TokenKind::Star, 1),
                    ('/', _) => (TokenKind::Slash, 1),
                    ('%', _) => (TokenKind::Percent, 1),
                    (',', _) => (TokenKind::Comma, 1),
                    (':', _) => (TokenKind::Colon, 1),
                    ('.', _) => (TokenKind::Dot, 1),
                    (';', _) => (TokenKind::Semi, 1),
                    ('{', _) => (TokenKind::LBrace, 1),
                    ('}', _) => (TokenKind::RBrace, 1),
                    ('(', _) => {
                        grouping += 1;
                        (TokenKind::LParen, 1)
                    }
                    ('[', _) => {
                        grouping += 1;
                        (TokenKind::LBracket, 1)
                    }
                    (')', _) | (']', _) => {
                        grouping = grouping.saturating_sub(1);
                        (if c == ')' { TokenKind::RParen } else { TokenKind::RBracket }, 1)
                    }
                    _ => {
                        return Err(ParseError::syntax(
                            format!("invalid character '{c}'"),
                            line,
                        ))
                    }
                };
                tokens.push(Token { kind, line });
                pos += width;
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line });
    Ok(tokens)
}
