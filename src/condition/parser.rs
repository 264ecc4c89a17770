//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zingest.
//! The Zingest project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Condition Parser
//!
//! Tokenizer plus recursive descent parser for guard expressions and script
//! bodies. Every syntax problem is reported as a [`ZiError::Validation`]
//! carrying the character offset of the offending token, so a bad pipeline
//! definition is rejected at build time.
//!
//! Operator precedence, lowest first:
//!
//! ```text
//! ?:            (right associative)
//! ||
//! &&
//! == !=
//! < <= > >= instanceof
//! + -
//! * / %
//! ! -           (unary)
//! .method() ?.method()
//! ```

use regex::Regex;
use serde_json::{Map, Value};

use super::{ZiBinaryOp, ZiExpr, ZiFunction, ZiInstanceType, ZiMethod, ZiStatement};
use crate::errors::{Result, ZiError};
use crate::path::{ZiFieldPath, ZiPathRoot, ZiPathSegment};

const PUNCTUATION: [&str; 28] = [
    "?.", "?[", "?:", "==", "!=", "<=", ">=", "&&", "||", ".", "[", "]", "(", ")", "{", "}", ",",
    ";", ":", "!", "<", ">", "+", "-", "*", "/", "%", "=",
];

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Number(Value),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

static EOF: TokenKind = TokenKind::Eof;

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    'outer: while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        if c.is_ascii_digit() {
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            // After a member dot the digits are a list index, so `m.0.1` stays two segments.
            let path_index = matches!(
                tokens.last(),
                Some(Token {
                    kind: TokenKind::Punct("." | "?."),
                    ..
                })
            );
            let mut is_float = false;
            if !path_index
                && pos + 1 < chars.len()
                && chars[pos] == '.'
                && chars[pos + 1].is_ascii_digit()
            {
                is_float = true;
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            if !path_index && pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                let mut cursor = pos + 1;
                if cursor < chars.len() && (chars[cursor] == '+' || chars[cursor] == '-') {
                    cursor += 1;
                }
                if cursor < chars.len() && chars[cursor].is_ascii_digit() {
                    is_float = true;
                    pos = cursor;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let number = if is_float {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            } else {
                text.parse::<i64>().ok().map(Value::from)
            };
            let number = number.ok_or_else(|| {
                ZiError::validation(format!("invalid number '{text}' at position {start}"))
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                pos: start,
            });
            continue;
        }

        if c == '\'' || c == '"' {
            pos += 1;
            let mut text = String::new();
            loop {
                let Some(&next) = chars.get(pos) else {
                    return Err(ZiError::validation(format!(
                        "unterminated string starting at position {start}"
                    )));
                };
                pos += 1;
                if next == c {
                    break;
                }
                if next == '\\' {
                    let escaped = chars.get(pos).copied().ok_or_else(|| {
                        ZiError::validation(format!(
                            "unterminated string starting at position {start}"
                        ))
                    })?;
                    pos += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    continue;
                }
                text.push(next);
            }
            tokens.push(Token {
                kind: TokenKind::Str(text),
                pos: start,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '@' {
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '@')
            {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(chars[start..pos].iter().collect()),
                pos: start,
            });
            continue;
        }

        for punct in PUNCTUATION {
            let width = punct.chars().count();
            if pos + width <= chars.len() && chars[pos..pos + width].iter().copied().eq(punct.chars()) {
                tokens.push(Token {
                    kind: TokenKind::Punct(punct),
                    pos: start,
                });
                pos += width;
                continue 'outer;
            }
        }

        return Err(ZiError::validation(format!(
            "unexpected character '{c}' at position {start}"
        )));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: chars.len(),
    });
    Ok(tokens)
}

/// Recursive descent parser over a token stream.
pub struct ZiParser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl ZiParser {
    /// Tokenizes `source`.
    #[allow(non_snake_case)]
    pub fn new(source: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            cursor: 0,
        })
    }

    /// Parses a single expression spanning the whole input.
    pub fn parse_expression(mut self) -> Result<ZiExpr> {
        if self.at_eof() {
            return Err(ZiError::validation("condition may not be empty"));
        }
        let expr = self.expression()?;
        self.expect_eof()?;
        Ok(expr)
    }

    /// Parses a script body: a sequence of statements.
    pub fn parse_script(mut self) -> Result<Vec<ZiStatement>> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.cursor + offset)
            .map(|token| &token.kind)
            .unwrap_or(&EOF)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|token| token.pos)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), TokenKind::Punct(p) if *p == punct)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(ident) if ident == name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{punct}'")))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn error(&self, message: impl AsRef<str>) -> ZiError {
        let found = match self.peek() {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Str(s) => format!("'{s}'"),
            TokenKind::Ident(ident) => ident.clone(),
            TokenKind::Punct(p) => p.to_string(),
            TokenKind::Eof => "end of input".to_string(),
        };
        ZiError::validation(format!(
            "{} at position {}, found {found}",
            message.as_ref(),
            self.position()
        ))
    }

    fn statement(&mut self) -> Result<ZiStatement> {
        if self.is_ident("if") && matches!(self.peek_at(1), TokenKind::Punct("(")) {
            self.advance();
            self.expect_punct("(")?;
            let condition = self.expression()?;
            self.expect_punct(")")?;
            let then = self.block()?;
            let otherwise = if self.is_ident("else") {
                self.advance();
                if self.is_ident("if") {
                    vec![self.statement()?]
                } else {
                    self.block()?
                }
            } else {
                Vec::new()
            };
            return Ok(ZiStatement::If {
                condition,
                then,
                otherwise,
            });
        }

        let keyword = match self.peek() {
            TokenKind::Ident(name)
                if (name == "remove" || name == "ensure")
                    && matches!(self.peek_at(1), TokenKind::Punct("(")) =>
            {
                Some(name.clone())
            }
            _ => None,
        };
        if let Some(keyword) = keyword {
            self.advance();
            self.expect_punct("(")?;
            let path = self.writable_path()?;
            self.expect_punct(")")?;
            self.end_statement()?;
            return Ok(if keyword == "remove" {
                ZiStatement::Remove(path)
            } else {
                ZiStatement::Ensure(path)
            });
        }

        let target = self.writable_path()?;
        self.expect_punct("=")?;
        let value = self.expression()?;
        self.end_statement()?;
        Ok(ZiStatement::Assign { target, value })
    }

    fn end_statement(&mut self) -> Result<()> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() {
            Ok(())
        } else {
            Err(self.error("expected ';'"))
        }
    }

    fn block(&mut self) -> Result<Vec<ZiStatement>> {
        if !self.eat_punct("{") {
            return Ok(vec![self.statement()?]);
        }
        let mut statements = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.error("expected '}'"));
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn writable_path(&mut self) -> Result<ZiFieldPath> {
        let root = match self.peek() {
            TokenKind::Ident(name) if name == "ctx" => ZiPathRoot::Source,
            TokenKind::Ident(name) if name == "_ingest" => {
                return Err(self.error("ingest metadata is read-only"))
            }
            _ => return Err(self.error("expected a 'ctx' field path")),
        };
        self.advance();
        self.path_segments(root)
    }

    fn expression(&mut self) -> Result<ZiExpr> {
        let value = self.or()?;
        if self.eat_punct("?:") {
            let default = self.expression()?;
            return Ok(ZiExpr::elvis(value, default));
        }
        Ok(value)
    }

    fn or(&mut self) -> Result<ZiExpr> {
        let mut left = self.and()?;
        while self.eat_punct("||") {
            let right = self.and()?;
            left = ZiExpr::or(left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<ZiExpr> {
        let mut left = self.equality()?;
        while self.eat_punct("&&") {
            let right = self.equality()?;
            left = ZiExpr::and(left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<ZiExpr> {
        let mut left = self.relational()?;
        loop {
            let op = if self.eat_punct("==") {
                ZiBinaryOp::Eq
            } else if self.eat_punct("!=") {
                ZiBinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.relational()?;
            left = ZiExpr::binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<ZiExpr> {
        let mut left = self.additive()?;
        loop {
            if self.is_ident("instanceof") {
                self.advance();
                let kind = match self.advance() {
                    TokenKind::Ident(name) => ZiInstanceType::parse(&name),
                    _ => None,
                };
                let kind = kind.ok_or_else(|| self.error("expected a type name after instanceof"))?;
                left = ZiExpr::instance_of(left, kind);
                continue;
            }
            let op = if self.eat_punct("<=") {
                ZiBinaryOp::Le
            } else if self.eat_punct(">=") {
                ZiBinaryOp::Ge
            } else if self.eat_punct("<") {
                ZiBinaryOp::Lt
            } else if self.eat_punct(">") {
                ZiBinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.additive()?;
            left = ZiExpr::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<ZiExpr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                ZiBinaryOp::Add
            } else if self.eat_punct("-") {
                ZiBinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = ZiExpr::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<ZiExpr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_punct("*") {
                ZiBinaryOp::Mul
            } else if self.eat_punct("/") {
                ZiBinaryOp::Div
            } else if self.eat_punct("%") {
                ZiBinaryOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = ZiExpr::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<ZiExpr> {
        if self.eat_punct("!") {
            return Ok(ZiExpr::not(self.unary()?));
        }
        if self.eat_punct("-") {
            return Ok(match self.unary()? {
                ZiExpr::Literal(Value::Number(n)) if n.is_i64() => {
                    ZiExpr::Literal(Value::from(-n.as_i64().unwrap_or_default()))
                }
                other => ZiExpr::Negate(Box::new(other)),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<ZiExpr> {
        let mut expr = self.primary()?;
        loop {
            let null_safe = if self.is_punct("?.") {
                true
            } else if self.is_punct(".") {
                false
            } else {
                return Ok(expr);
            };
            self.advance();
            let name = match self.advance() {
                TokenKind::Ident(name) => name,
                _ => return Err(self.error("expected a method name")),
            };
            self.expect_punct("(")?;
            let args = self.arguments()?;
            let method = self.method(&name, &args)?;
            expr = ZiExpr::method(expr, method, args, null_safe);
        }
    }

    fn arguments(&mut self) -> Result<Vec<ZiExpr>> {
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn method(&self, name: &str, args: &[ZiExpr]) -> Result<ZiMethod> {
        let (method, arity) = match name {
            "contains" => (ZiMethod::Contains, 1),
            "isEmpty" => (ZiMethod::IsEmpty, 0),
            "startsWith" => (ZiMethod::StartsWith, 1),
            "endsWith" => (ZiMethod::EndsWith, 1),
            "toLowerCase" => (ZiMethod::ToLowerCase, 0),
            "toUpperCase" => (ZiMethod::ToUpperCase, 0),
            "trim" => (ZiMethod::Trim, 0),
            "length" | "size" => (ZiMethod::Length, 0),
            "split" => (ZiMethod::Split, 1),
            "matches" => {
                let pattern = match args {
                    [ZiExpr::Literal(Value::String(pattern))] => pattern,
                    _ => {
                        return Err(ZiError::validation(
                            "matches() requires a single string literal pattern",
                        ))
                    }
                };
                let regex = Regex::new(pattern).map_err(|err| {
                    ZiError::validation(format!("invalid pattern '{pattern}': {err}"))
                })?;
                (ZiMethod::Matches(regex), 1)
            }
            other => {
                return Err(ZiError::validation(format!("unknown method '{other}'")));
            }
        };
        if args.len() != arity {
            return Err(ZiError::validation(format!(
                "method '{name}' takes {arity} argument(s), got {}",
                args.len()
            )));
        }
        Ok(method)
    }

    fn primary(&mut self) -> Result<ZiExpr> {
        let position = self.position();
        match self.advance() {
            TokenKind::Number(n) => Ok(ZiExpr::Literal(n)),
            TokenKind::Str(s) => Ok(ZiExpr::Literal(Value::String(s))),
            TokenKind::Punct("(") => {
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("{") => {
                self.expect_punct("}")?;
                Ok(ZiExpr::Literal(Value::Object(Map::new())))
            }
            TokenKind::Punct("[") => {
                if self.eat_punct(":") {
                    self.expect_punct("]")?;
                    return Ok(ZiExpr::Literal(Value::Object(Map::new())));
                }
                let mut items = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        items.push(self.expression()?);
                        if self.eat_punct("]") {
                            break;
                        }
                        self.expect_punct(",")?;
                    }
                }
                Ok(ZiExpr::List(items))
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(ZiExpr::literal(true)),
                "false" => Ok(ZiExpr::literal(false)),
                "null" => Ok(ZiExpr::Literal(Value::Null)),
                "ctx" => Ok(ZiExpr::Field(self.path_segments(ZiPathRoot::Source)?)),
                "_ingest" => Ok(ZiExpr::Field(self.path_segments(ZiPathRoot::Ingest)?)),
                _ if self.is_punct("(") => {
                    let function = ZiFunction::parse(&name).ok_or_else(|| {
                        ZiError::validation(format!(
                            "unknown function '{name}' at position {position}"
                        ))
                    })?;
                    self.advance();
                    let args = self.arguments()?;
                    let (min, max) = function.arity();
                    if args.len() < min || args.len() > max {
                        return Err(ZiError::validation(format!(
                            "function '{name}' takes {min} to {max} argument(s), got {}",
                            args.len()
                        )));
                    }
                    Ok(ZiExpr::Call { function, args })
                }
                _ => Err(ZiError::validation(format!(
                    "unknown identifier '{name}' at position {position}; fields are read through 'ctx'"
                ))),
            },
            _ => {
                self.cursor = self.cursor.saturating_sub(1);
                Err(self.error("expected an expression"))
            }
        }
    }

    /// Consumes `.key`, `?.key`, `['key']` and `[0]` hops following a root.
    fn path_segments(&mut self, root: ZiPathRoot) -> Result<ZiFieldPath> {
        let mut segments = Vec::new();
        loop {
            match (self.peek(), self.peek_at(1), self.peek_at(2)) {
                (TokenKind::Punct(dot @ ("." | "?.")), TokenKind::Ident(name), next)
                    if *next != TokenKind::Punct("(") =>
                {
                    let segment = ZiPathSegment::plain(name.clone(), *dot == "?.");
                    segments.push(segment);
                    self.cursor += 2;
                }
                (TokenKind::Punct(dot @ ("." | "?.")), TokenKind::Number(n), _) if n.is_u64() => {
                    let segment = ZiPathSegment::plain(n.to_string(), *dot == "?.");
                    segments.push(segment);
                    self.cursor += 2;
                }
                (TokenKind::Punct(open @ ("[" | "?[")), TokenKind::Str(key), TokenKind::Punct("]")) => {
                    segments.push(ZiPathSegment {
                        key: key.clone(),
                        literal: true,
                        null_safe: *open == "?[",
                    });
                    self.cursor += 3;
                }
                (TokenKind::Punct(open @ ("[" | "?[")), TokenKind::Number(n), TokenKind::Punct("]"))
                    if n.is_u64() =>
                {
                    let segment = ZiPathSegment::plain(n.to_string(), *open == "?[");
                    segments.push(segment);
                    self.cursor += 3;
                }
                _ => break,
            }
        }
        if segments.is_empty() {
            return Err(self.error("expected a field after path root"));
        }
        ZiFieldPath::from_segments(root, segments)
    }
}
