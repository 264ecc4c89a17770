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

//! # Condition Module
//!
//! This module provides the expression language used for processor guards
//! (`if`) and script bodies. Expressions are compiled once into an immutable
//! [`ZiExpr`] tree and evaluated read-only against a document, so a compiled
//! condition can be shared by any number of concurrent pipeline runs.
//!
//! ## Components
//!
//! - **Tree** (this file): [`ZiExpr`], [`ZiStatement`] and the evaluator
//! - **Parser** ([parser.rs](parser/index.html)): text syntax to tree
//!
//! ## Syntax Overview
//!
//! ```text
//! ctx.user?.name != null && ctx.tags.contains('prod')
//! ctx.message instanceof String && !ctx.message.isEmpty()
//! (ctx.event?.kind ?: 'unknown') == 'alert'
//! seconds_between(ctx['@timestamp'], _ingest.timestamp) > 60
//! ```
//!
//! ## Null Semantics
//!
//! - A strict path hop over a null ancestor raises `NullEncountered`.
//! - `contains` with a null argument is `false`; `instanceof` on null is
//!   `false`. Neither raises.
//! - `a ?: b` yields `b` when `a` is null or raises an evaluation error.
//! - `&&` and `||` short-circuit left to right; a fault on the left operand
//!   is returned without evaluating the right one.

pub mod parser;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Number, Value};

use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiFault};
use crate::path::{ZiFieldPath, ZiLookup};

pub use parser::ZiParser;

/// Tag of the closed value union.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZiValueKind {
    Null,
    Boolean,
    Number,
    String,
    List,
    Map,
}

impl ZiValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ZiValueKind::Null,
            Value::Bool(_) => ZiValueKind::Boolean,
            Value::Number(_) => ZiValueKind::Number,
            Value::String(_) => ZiValueKind::String,
            Value::Array(_) => ZiValueKind::List,
            Value::Object(_) => ZiValueKind::Map,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZiValueKind::Null => "null",
            ZiValueKind::Boolean => "boolean",
            ZiValueKind::Number => "number",
            ZiValueKind::String => "string",
            ZiValueKind::List => "list",
            ZiValueKind::Map => "map",
        }
    }
}

impl fmt::Display for ZiValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type names accepted on the right of `instanceof`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiInstanceType {
    String,
    Number,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    Object,
}

impl ZiInstanceType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "String" => ZiInstanceType::String,
            "Number" => ZiInstanceType::Number,
            "Integer" | "Long" => ZiInstanceType::Integer,
            "Float" | "Double" => ZiInstanceType::Float,
            "Boolean" => ZiInstanceType::Boolean,
            "List" => ZiInstanceType::List,
            "Map" => ZiInstanceType::Map,
            "Object" | "def" => ZiInstanceType::Object,
            _ => return None,
        })
    }

    /// Tag comparison; null never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (ZiInstanceType::String, Value::String(_)) => true,
            (ZiInstanceType::Number, Value::Number(_)) => true,
            (ZiInstanceType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ZiInstanceType::Float, Value::Number(n)) => n.is_f64(),
            (ZiInstanceType::Boolean, Value::Bool(_)) => true,
            (ZiInstanceType::List, Value::Array(_)) => true,
            (ZiInstanceType::Map, Value::Object(_)) => true,
            (ZiInstanceType::Object, _) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiBinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ZiBinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            ZiBinaryOp::Eq => "==",
            ZiBinaryOp::Ne => "!=",
            ZiBinaryOp::Lt => "<",
            ZiBinaryOp::Le => "<=",
            ZiBinaryOp::Gt => ">",
            ZiBinaryOp::Ge => ">=",
            ZiBinaryOp::Add => "+",
            ZiBinaryOp::Sub => "-",
            ZiBinaryOp::Mul => "*",
            ZiBinaryOp::Div => "/",
            ZiBinaryOp::Rem => "%",
        }
    }
}

/// Methods callable on a value with `.name(args)`.
#[derive(Clone, Debug)]
pub enum ZiMethod {
    Contains,
    IsEmpty,
    StartsWith,
    EndsWith,
    ToLowerCase,
    ToUpperCase,
    Trim,
    Length,
    Split,
    Matches(Regex),
}

impl ZiMethod {
    fn name(&self) -> &'static str {
        match self {
            ZiMethod::Contains => "contains",
            ZiMethod::IsEmpty => "isEmpty",
            ZiMethod::StartsWith => "startsWith",
            ZiMethod::EndsWith => "endsWith",
            ZiMethod::ToLowerCase => "toLowerCase",
            ZiMethod::ToUpperCase => "toUpperCase",
            ZiMethod::Trim => "trim",
            ZiMethod::Length => "length",
            ZiMethod::Split => "split",
            ZiMethod::Matches(_) => "matches",
        }
    }
}

/// Free functions callable as `name(args)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiFunction {
    ParseDate,
    SecondsBetween,
    MillisBetween,
    Join,
    ToString,
    ToNumber,
    Json,
}

impl ZiFunction {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "parse_date" => ZiFunction::ParseDate,
            "seconds_between" => ZiFunction::SecondsBetween,
            "millis_between" => ZiFunction::MillisBetween,
            "join" => ZiFunction::Join,
            "to_string" => ZiFunction::ToString,
            "to_number" => ZiFunction::ToNumber,
            "json" => ZiFunction::Json,
            _ => return None,
        })
    }

    /// Accepted argument counts (inclusive).
    pub fn arity(&self) -> (usize, usize) {
        match self {
            ZiFunction::ParseDate => (1, 2),
            ZiFunction::SecondsBetween | ZiFunction::MillisBetween | ZiFunction::Join => (2, 2),
            ZiFunction::ToString | ZiFunction::ToNumber | ZiFunction::Json => (1, 1),
        }
    }
}

/// Compiled expression tree.
#[derive(Clone, Debug)]
pub enum ZiExpr {
    Literal(Value),
    List(Vec<ZiExpr>),
    Field(ZiFieldPath),
    Not(Box<ZiExpr>),
    Negate(Box<ZiExpr>),
    Binary {
        op: ZiBinaryOp,
        left: Box<ZiExpr>,
        right: Box<ZiExpr>,
    },
    And(Box<ZiExpr>, Box<ZiExpr>),
    Or(Box<ZiExpr>, Box<ZiExpr>),
    Elvis {
        value: Box<ZiExpr>,
        default: Box<ZiExpr>,
    },
    InstanceOf {
        value: Box<ZiExpr>,
        kind: ZiInstanceType,
    },
    Method {
        target: Box<ZiExpr>,
        method: ZiMethod,
        args: Vec<ZiExpr>,
        null_safe: bool,
    },
    Call {
        function: ZiFunction,
        args: Vec<ZiExpr>,
    },
}

impl ZiExpr {
    pub fn literal(value: impl Into<Value>) -> Self {
        ZiExpr::Literal(value.into())
    }

    /// Field access parsed from path text (`a?.b`, `ctx.a.b`, ...).
    pub fn field(path: &str) -> Result<Self> {
        Ok(ZiExpr::Field(ZiFieldPath::parse(path)?))
    }

    pub fn binary(op: ZiBinaryOp, left: ZiExpr, right: ZiExpr) -> Self {
        ZiExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: ZiExpr, right: ZiExpr) -> Self {
        Self::binary(ZiBinaryOp::Eq, left, right)
    }

    pub fn ne(left: ZiExpr, right: ZiExpr) -> Self {
        Self::binary(ZiBinaryOp::Ne, left, right)
    }

    pub fn and(left: ZiExpr, right: ZiExpr) -> Self {
        ZiExpr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: ZiExpr, right: ZiExpr) -> Self {
        ZiExpr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(operand: ZiExpr) -> Self {
        ZiExpr::Not(Box::new(operand))
    }

    pub fn contains(collection: ZiExpr, value: ZiExpr) -> Self {
        Self::method(collection, ZiMethod::Contains, vec![value], false)
    }

    pub fn is_empty(value: ZiExpr) -> Self {
        Self::method(value, ZiMethod::IsEmpty, Vec::new(), false)
    }

    pub fn instance_of(value: ZiExpr, kind: ZiInstanceType) -> Self {
        ZiExpr::InstanceOf {
            value: Box::new(value),
            kind,
        }
    }

    pub fn elvis(value: ZiExpr, default: ZiExpr) -> Self {
        ZiExpr::Elvis {
            value: Box::new(value),
            default: Box::new(default),
        }
    }

    pub fn method(target: ZiExpr, method: ZiMethod, args: Vec<ZiExpr>, null_safe: bool) -> Self {
        ZiExpr::Method {
            target: Box::new(target),
            method,
            args,
            null_safe,
        }
    }

    /// Evaluates the expression in boolean context.
    pub fn evaluate(&self, document: &ZiDocument) -> FaultResult<bool> {
        let value = self.evaluate_value(document)?;
        expect_bool(&value, &self.describe())
    }

    /// Evaluates the expression to a value.
    pub fn evaluate_value<'a>(&'a self, document: &'a ZiDocument) -> FaultResult<Cow<'a, Value>> {
        match self {
            ZiExpr::Literal(value) => Ok(Cow::Borrowed(value)),
            ZiExpr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| item.evaluate_value(document).map(Cow::into_owned))
                    .collect::<FaultResult<Vec<_>>>()?;
                Ok(Cow::Owned(Value::Array(values)))
            }
            ZiExpr::Field(path) => Ok(match path.resolve(document)? {
                ZiLookup::Found(value) => Cow::Borrowed(value),
                ZiLookup::NotFound | ZiLookup::Null => Cow::Owned(Value::Null),
            }),
            ZiExpr::Not(operand) => {
                let value = operand.evaluate(document)?;
                Ok(Cow::Owned(Value::Bool(!value)))
            }
            ZiExpr::Negate(operand) => {
                let value = operand.evaluate_value(document)?;
                let negated = match value.as_ref() {
                    Value::Number(n) if n.is_i64() => n
                        .as_i64()
                        .and_then(i64::checked_neg)
                        .map(Value::from)
                        .ok_or_else(|| ZiFault::runtime("integer overflow in negation"))?,
                    Value::Number(n) => float_value(-n.as_f64().unwrap_or_default())?,
                    other => {
                        return Err(ZiFault::wrong_type(
                            "unary '-'",
                            "number",
                            ZiValueKind::of(other).to_string(),
                        ))
                    }
                };
                Ok(Cow::Owned(negated))
            }
            ZiExpr::And(left, right) => {
                let result = left.evaluate(document)? && right.evaluate(document)?;
                Ok(Cow::Owned(Value::Bool(result)))
            }
            ZiExpr::Or(left, right) => {
                let result = left.evaluate(document)? || right.evaluate(document)?;
                Ok(Cow::Owned(Value::Bool(result)))
            }
            ZiExpr::Elvis { value, default } => match value.evaluate_value(document) {
                Ok(found) if !found.is_null() => Ok(found),
                Ok(_) => default.evaluate_value(document),
                Err(fault) if fault.is_evaluation_error() => default.evaluate_value(document),
                Err(fault) => Err(fault),
            },
            ZiExpr::InstanceOf { value, kind } => {
                let value = value.evaluate_value(document)?;
                Ok(Cow::Owned(Value::Bool(kind.matches(&value))))
            }
            ZiExpr::Binary { op, left, right } => {
                let lhs = left.evaluate_value(document)?;
                let rhs = right.evaluate_value(document)?;
                binary(*op, &lhs, &rhs).map(Cow::Owned)
            }
            ZiExpr::Method {
                target,
                method,
                args,
                null_safe,
            } => {
                let receiver = target.evaluate_value(document)?;
                if receiver.is_null() {
                    if *null_safe {
                        return Ok(Cow::Owned(Value::Null));
                    }
                    return Err(ZiFault::null_encountered(format!(
                        "{}.{}()",
                        target.describe(),
                        method.name()
                    )));
                }
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate_value(document))
                    .collect::<FaultResult<Vec<_>>>()?;
                call_method(method, &receiver, &args).map(Cow::Owned)
            }
            ZiExpr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate_value(document))
                    .collect::<FaultResult<Vec<_>>>()?;
                call_function(*function, &args).map(Cow::Owned)
            }
        }
    }

    /// Short human readable rendering used in fault messages.
    pub fn describe(&self) -> String {
        match self {
            ZiExpr::Literal(value) => value.to_string(),
            ZiExpr::List(_) => "[...]".to_string(),
            ZiExpr::Field(path) => match path.root() {
                crate::path::ZiPathRoot::Source => format!("ctx.{path}"),
                crate::path::ZiPathRoot::Ingest => path.to_string(),
            },
            ZiExpr::Not(inner) => format!("!{}", inner.describe()),
            ZiExpr::Negate(inner) => format!("-{}", inner.describe()),
            ZiExpr::Binary { op, left, right } => {
                format!("{} {} {}", left.describe(), op.symbol(), right.describe())
            }
            ZiExpr::And(left, right) => format!("{} && {}", left.describe(), right.describe()),
            ZiExpr::Or(left, right) => format!("{} || {}", left.describe(), right.describe()),
            ZiExpr::Elvis { value, default } => {
                format!("{} ?: {}", value.describe(), default.describe())
            }
            ZiExpr::InstanceOf { value, kind } => format!("{} instanceof {kind:?}", value.describe()),
            ZiExpr::Method { target, method, .. } => {
                format!("{}.{}(...)", target.describe(), method.name())
            }
            ZiExpr::Call { function, .. } => format!("{function:?}(...)"),
        }
    }
}

/// A guard condition: the compiled tree plus the text it came from.
#[derive(Clone, Debug)]
pub struct ZiCondition {
    source: String,
    expr: ZiExpr,
}

impl ZiCondition {
    /// Compiles a condition from its text form.
    pub fn parse(source: &str) -> Result<Self> {
        let expr = ZiParser::new(source)?.parse_expression()?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// Wraps an already built expression tree.
    pub fn from_expr(expr: ZiExpr) -> Self {
        Self {
            source: expr.describe(),
            expr,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &ZiExpr {
        &self.expr
    }

    pub fn evaluate(&self, document: &ZiDocument) -> FaultResult<bool> {
        self.expr.evaluate(document)
    }
}

/// Statement of a script body.
#[derive(Clone, Debug)]
pub enum ZiStatement {
    /// `path = expr;`
    Assign { target: ZiFieldPath, value: ZiExpr },
    /// `remove(path);`
    Remove(ZiFieldPath),
    /// `ensure(path);` creates empty containers along the path if absent.
    Ensure(ZiFieldPath),
    /// `if (cond) { ... } else { ... }`
    If {
        condition: ZiExpr,
        then: Vec<ZiStatement>,
        otherwise: Vec<ZiStatement>,
    },
}

fn expect_bool(value: &Value, context: &str) -> FaultResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        other => Err(ZiFault::wrong_type(
            context,
            "boolean",
            ZiValueKind::of(other).to_string(),
        )),
    }
}

/// Borrows a string value or reports its actual kind.
pub(crate) fn expect_str<'v>(value: &'v Value, context: &str) -> FaultResult<&'v str> {
    value.as_str().ok_or_else(|| {
        ZiFault::wrong_type(context, "string", ZiValueKind::of(value).to_string())
    })
}

fn float_value(value: f64) -> FaultResult<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ZiFault::runtime("arithmetic produced a non-finite number"))
}

/// Renders a value the way string concatenation sees it.
pub(crate) fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality with numeric normalization (`1 == 1.0`).
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value, op: ZiBinaryOp) -> FaultResult<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => a
                .as_f64()
                .zip(b.as_f64())
                .and_then(|(x, y)| x.partial_cmp(&y))
                .ok_or_else(|| ZiFault::runtime("numbers are not comparable")),
        },
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ZiFault::wrong_type(
            format!("operator '{}'", op.symbol()),
            "two numbers or two strings",
            format!("{} and {}", ZiValueKind::of(left), ZiValueKind::of(right)),
        )),
    }
}

fn arithmetic(op: ZiBinaryOp, left: &Value, right: &Value) -> FaultResult<Value> {
    if op == ZiBinaryOp::Add && (left.is_string() || right.is_string()) {
        return Ok(Value::String(display_string(left) + &display_string(right)));
    }

    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(ZiFault::wrong_type(
            format!("operator '{}'", op.symbol()),
            "numbers",
            format!("{} and {}", ZiValueKind::of(left), ZiValueKind::of(right)),
        ));
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            ZiBinaryOp::Add => x.checked_add(y),
            ZiBinaryOp::Sub => x.checked_sub(y),
            ZiBinaryOp::Mul => x.checked_mul(y),
            ZiBinaryOp::Div | ZiBinaryOp::Rem if y == 0 => {
                return Err(ZiFault::runtime("division by zero"))
            }
            ZiBinaryOp::Div => x.checked_div(y),
            ZiBinaryOp::Rem => x.checked_rem(y),
            _ => None,
        };
        return result
            .map(Value::from)
            .ok_or_else(|| ZiFault::runtime("integer overflow"));
    }

    let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    let result = match op {
        ZiBinaryOp::Add => x + y,
        ZiBinaryOp::Sub => x - y,
        ZiBinaryOp::Mul => x * y,
        ZiBinaryOp::Div => x / y,
        ZiBinaryOp::Rem => x % y,
        _ => return Err(ZiFault::runtime("unsupported arithmetic operator")),
    };
    float_value(result)
}

fn binary(op: ZiBinaryOp, left: &Value, right: &Value) -> FaultResult<Value> {
    Ok(match op {
        ZiBinaryOp::Eq => Value::Bool(values_equal(left, right)),
        ZiBinaryOp::Ne => Value::Bool(!values_equal(left, right)),
        ZiBinaryOp::Lt => Value::Bool(compare(left, right, op)? == Ordering::Less),
        ZiBinaryOp::Le => Value::Bool(compare(left, right, op)? != Ordering::Greater),
        ZiBinaryOp::Gt => Value::Bool(compare(left, right, op)? == Ordering::Greater),
        ZiBinaryOp::Ge => Value::Bool(compare(left, right, op)? != Ordering::Less),
        ZiBinaryOp::Add | ZiBinaryOp::Sub | ZiBinaryOp::Mul | ZiBinaryOp::Div | ZiBinaryOp::Rem => {
            arithmetic(op, left, right)?
        }
    })
}

fn call_method(method: &ZiMethod, receiver: &Value, args: &[Cow<'_, Value>]) -> FaultResult<Value> {
    let context = method.name();
    match method {
        ZiMethod::Contains => {
            let Some(needle) = args.first() else {
                return Ok(Value::Bool(false));
            };
            if needle.is_null() {
                return Ok(Value::Bool(false));
            }
            let found = match receiver {
                Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
                Value::String(haystack) => haystack.contains(expect_str(needle, context)?),
                Value::Object(map) => map.contains_key(expect_str(needle, context)?),
                other => {
                    return Err(ZiFault::wrong_type(
                        context,
                        "list, string or map",
                        ZiValueKind::of(other).to_string(),
                    ))
                }
            };
            Ok(Value::Bool(found))
        }
        ZiMethod::IsEmpty => Ok(Value::Bool(expect_str(receiver, context)?.is_empty())),
        ZiMethod::StartsWith | ZiMethod::EndsWith => {
            let text = expect_str(receiver, context)?;
            let affix = match args.first() {
                Some(arg) => expect_str(arg, context)?,
                None => "",
            };
            Ok(Value::Bool(if matches!(method, ZiMethod::StartsWith) {
                text.starts_with(affix)
            } else {
                text.ends_with(affix)
            }))
        }
        ZiMethod::ToLowerCase => Ok(Value::String(expect_str(receiver, context)?.to_lowercase())),
        ZiMethod::ToUpperCase => Ok(Value::String(expect_str(receiver, context)?.to_uppercase())),
        ZiMethod::Trim => Ok(Value::String(expect_str(receiver, context)?.trim().to_string())),
        ZiMethod::Length => Ok(Value::from(match receiver {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => {
                return Err(ZiFault::wrong_type(
                    context,
                    "string, list or map",
                    ZiValueKind::of(other).to_string(),
                ))
            }
        })),
        ZiMethod::Split => {
            let text = expect_str(receiver, context)?;
            let separator = match args.first() {
                Some(arg) => expect_str(arg, context)?,
                None => ",",
            };
            if separator.is_empty() {
                return Err(ZiFault::runtime("split separator may not be empty"));
            }
            Ok(Value::Array(
                text.split(separator)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        ZiMethod::Matches(regex) => Ok(Value::Bool(regex.is_match(expect_str(receiver, context)?))),
    }
}

static NULL: Value = Value::Null;

fn nth<'v>(args: &'v [Cow<'_, Value>], idx: usize) -> &'v Value {
    args.get(idx).map(|value| &**value).unwrap_or(&NULL)
}

fn call_function(function: ZiFunction, args: &[Cow<'_, Value>]) -> FaultResult<Value> {
    let arg = |idx: usize| nth(args, idx);

    match function {
        ZiFunction::ParseDate => {
            let format = match arg(1) {
                Value::Null => None,
                other => Some(expect_str(other, "parse_date format")?),
            };
            let instant = parse_instant(arg(0), format)?;
            Ok(Value::String(
                instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ))
        }
        ZiFunction::SecondsBetween | ZiFunction::MillisBetween => {
            let start = parse_instant(arg(0), None)?;
            let end = parse_instant(arg(1), None)?;
            let elapsed = end.signed_duration_since(start);
            Ok(Value::from(if function == ZiFunction::SecondsBetween {
                elapsed.num_seconds()
            } else {
                elapsed.num_milliseconds()
            }))
        }
        ZiFunction::Join => {
            let Value::Array(items) = arg(0) else {
                return Err(ZiFault::wrong_type(
                    "join",
                    "list",
                    ZiValueKind::of(arg(0)).to_string(),
                ));
            };
            let separator = expect_str(arg(1), "join separator")?;
            Ok(Value::String(
                items.iter().map(display_string).collect::<Vec<_>>().join(separator),
            ))
        }
        ZiFunction::ToString => Ok(match arg(0) {
            Value::Null => Value::Null,
            other => Value::String(display_string(other)),
        }),
        ZiFunction::ToNumber => match arg(0) {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => parse_number(s.trim()).ok_or_else(|| {
                ZiFault::wrong_type("to_number", "numeric string", format!("'{s}'"))
            }),
            other => Err(ZiFault::wrong_type(
                "to_number",
                "number or string",
                ZiValueKind::of(other).to_string(),
            )),
        },
        ZiFunction::Json => Ok(Value::String(crate::template::to_canonical_json(arg(0)))),
    }
}

/// Parses integer text first, then floating point text.
pub(crate) fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Interprets a value as an instant.
///
/// Numbers are epoch milliseconds. Strings are tried as RFC 3339, then as
/// zone-less date-times and dates (taken as UTC), unless an explicit chrono
/// format is supplied.
pub(crate) fn parse_instant(value: &Value, format: Option<&str>) -> FaultResult<DateTime<Utc>> {
    let raw = match value {
        Value::Number(n) => {
            return n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| ZiFault::runtime(format!("invalid epoch millis {n}")))
        }
        Value::String(s) => s.trim(),
        other => {
            return Err(ZiFault::wrong_type(
                "date",
                "string or epoch millis",
                ZiValueKind::of(other).to_string(),
            ))
        }
    };

    let parsed = match format {
        Some(format) => DateTime::parse_from_str(raw, format)
            .map(|instant| instant.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, format)
                    .ok()
                    .map(|naive| naive.and_utc())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(raw, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            }),
        None => DateTime::parse_from_rfc3339(raw)
            .map(|instant| instant.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                    .iter()
                    .find_map(|candidate| NaiveDateTime::parse_from_str(raw, candidate).ok())
                    .map(|naive| naive.and_utc())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            }),
    };

    parsed.ok_or_else(|| ZiFault::runtime(format!("unable to parse date [{raw}]")))
}
