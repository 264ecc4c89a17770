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

//! # Zingest Field Path Module
//!
//! Field paths address values inside a document. A path is parsed once from
//! its textual form into an ordered list of segments, each remembering
//! whether the hop that reaches it is null-safe.
//!
//! ## Syntax
//!
//! | Form                | Meaning                                           |
//! |---------------------|---------------------------------------------------|
//! | `a.b.c`             | nested keys                                       |
//! | `ctx.a.b`           | same as `a.b`, the `ctx` prefix is optional       |
//! | `a?.b`              | if `a` is null or missing, yield null             |
//! | `a['x.y']`          | literal key, matched verbatim on one level        |
//! | `tags.0`, `tags[0]` | list element by index                             |
//! | `_ingest.timestamp` | read-only ingest metadata                         |
//!
//! ## Resolution
//!
//! Resolution walks the segments left to right. Reaching a null or missing
//! container on a hop marked null-safe short-circuits to a logical null;
//! on any other hop it raises [`ZiFault::NullEncountered`]. A missing final
//! key is not an error and resolves to [`ZiLookup::NotFound`].

use std::fmt;

use serde_json::{Map, Value};

use crate::condition::ZiValueKind;
use crate::document::{ZiDocument, ZiSource};
use crate::errors::{FaultResult, Result, ZiError, ZiFault};

/// Top-level map a path is rooted at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiPathRoot {
    /// The document source.
    Source,
    /// The ingest metadata map (`_ingest.*`).
    Ingest,
}

/// One hop of a field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiPathSegment {
    /// Key (or decimal index) addressed by this hop.
    pub key: String,
    /// Written as a quoted bracket key; never treated as a list index.
    pub literal: bool,
    /// Short-circuit to null when the container reached so far is absent.
    pub null_safe: bool,
}

impl ZiPathSegment {
    pub(crate) fn plain(key: impl Into<String>, null_safe: bool) -> Self {
        Self {
            key: key.into(),
            literal: false,
            null_safe,
        }
    }

    /// List index addressed by this segment, if it is one.
    pub fn index(&self) -> Option<usize> {
        if self.literal {
            None
        } else {
            self.key.parse().ok()
        }
    }
}

/// Outcome of a successful lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZiLookup<'a> {
    /// The path resolved to a value, which may itself be null.
    Found(&'a Value),
    /// Every container existed but the final key is absent.
    NotFound,
    /// A null-safe hop met an absent container.
    Null,
}

impl<'a> ZiLookup<'a> {
    /// The resolved value, if any.
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            ZiLookup::Found(value) => Some(value),
            _ => None,
        }
    }

    /// The resolved value, with absence collapsed to null.
    pub fn to_value(&self) -> Value {
        self.value().cloned().unwrap_or(Value::Null)
    }

    /// Whether a non-null value was found.
    pub fn is_present(&self) -> bool {
        matches!(self, ZiLookup::Found(value) if !value.is_null())
    }
}

/// Parsed, immutable field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiFieldPath {
    root: ZiPathRoot,
    segments: Vec<ZiPathSegment>,
}

impl ZiFieldPath {
    /// Parses a path from its textual form.
    #[allow(non_snake_case)]
    pub fn parse(path: &str) -> Result<Self> {
        let text = path.trim();
        if text.is_empty() {
            return Err(ZiError::validation("field path may not be empty"));
        }

        let mut segments = PathScanner::new(text).scan()?;

        let mut root = ZiPathRoot::Source;
        if let Some(first) = segments.first() {
            if !first.literal && (first.key == "ctx" || first.key == "_ingest") {
                if segments.len() == 1 {
                    return Err(ZiError::validation(format!(
                        "field path '{text}' must name a field below '{}'",
                        first.key
                    )));
                }
                if first.key == "_ingest" {
                    root = ZiPathRoot::Ingest;
                }
                segments.remove(0);
            }
        }

        // The first hop indexes the root map, which is never null.
        if let Some(first) = segments.first_mut() {
            first.null_safe = false;
        }

        Ok(Self { root, segments })
    }

    /// Builds a path from segments produced by the condition parser.
    pub(crate) fn from_segments(root: ZiPathRoot, mut segments: Vec<ZiPathSegment>) -> Result<Self> {
        match segments.first_mut() {
            Some(first) => first.null_safe = false,
            None => return Err(ZiError::validation("field path may not be empty")),
        }
        Ok(Self { root, segments })
    }

    /// Parses a path that must be writable (not rooted at `_ingest`).
    pub fn parse_writable(path: &str) -> Result<Self> {
        let parsed = Self::parse(path)?;
        if parsed.root == ZiPathRoot::Ingest {
            return Err(ZiError::validation(format!(
                "field path '{path}' is read-only ingest metadata"
            )));
        }
        Ok(parsed)
    }

    /// Returns a copy of this path with every hop marked null-safe.
    pub fn null_safe(&self) -> Self {
        let mut copy = self.clone();
        for (idx, segment) in copy.segments.iter_mut().enumerate() {
            segment.null_safe = idx > 0;
        }
        copy
    }

    pub fn root(&self) -> ZiPathRoot {
        self.root
    }

    pub fn segments(&self) -> &[ZiPathSegment] {
        &self.segments
    }

    /// Resolves the path against a document.
    pub fn resolve<'a>(&self, document: &'a ZiDocument) -> FaultResult<ZiLookup<'a>> {
        match self.root {
            ZiPathRoot::Source => self.resolve_in(&document.source),
            ZiPathRoot::Ingest => self.resolve_in(&document.ingest),
        }
    }

    /// Resolves the path against a bare map, ignoring the root marker.
    pub fn resolve_in<'a>(&self, root: &'a ZiSource) -> FaultResult<ZiLookup<'a>> {
        let Some(first) = self.segments.first() else {
            return Ok(ZiLookup::NotFound);
        };

        let mut current = root.get(&first.key);
        for segment in &self.segments[1..] {
            current = match current {
                None | Some(Value::Null) => {
                    if segment.null_safe {
                        return Ok(ZiLookup::Null);
                    }
                    return Err(ZiFault::null_encountered(self.to_string()));
                }
                Some(node) => self.child(node, segment)?,
            };
        }

        Ok(match current {
            Some(value) => ZiLookup::Found(value),
            None => ZiLookup::NotFound,
        })
    }

    /// Whether the path resolves to a value (null counts as present).
    pub fn exists(&self, document: &ZiDocument) -> bool {
        matches!(self.null_safe().resolve(document), Ok(ZiLookup::Found(_)))
    }

    /// Writes `value` at this path.
    ///
    /// Absent (or null) intermediate containers are created as empty maps
    /// when `create_parents` is set; otherwise the write fails with
    /// [`ZiFault::MissingIntermediate`].
    pub fn set(&self, document: &mut ZiDocument, value: Value, create_parents: bool) -> FaultResult<()> {
        let source = self.writable_root(document)?;
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(self.missing());
        };
        self.probe_write(source, parents, last, create_parents)?;
        let Some((first, rest)) = parents.split_first() else {
            source.insert(last.key.clone(), value);
            return Ok(());
        };

        let mut node = self.map_entry(source, first, create_parents)?;
        for segment in rest {
            node = self.descend(node, segment, create_parents)?;
        }
        self.assign(node, last, value)
    }

    /// Creates empty map containers along the whole path where absent.
    ///
    /// Existing values are left untouched; a scalar in the way is a type
    /// fault.
    pub fn ensure_container(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let source = self.writable_root(document)?;
        let Some((first, rest)) = self.segments.split_first() else {
            return Err(self.missing());
        };

        let mut node = self.map_entry(source, first, true)?;
        for segment in rest {
            node = self.descend(node, segment, true)?;
        }
        match node {
            Value::Object(_) | Value::Array(_) => Ok(()),
            other => Err(ZiFault::wrong_type(
                format!("ensure '{self}'"),
                "map",
                ZiValueKind::of(other).to_string(),
            )),
        }
    }

    /// Removes the value at this path, returning it when it was present.
    pub fn remove(&self, document: &mut ZiDocument) -> FaultResult<Option<Value>> {
        let source = self.writable_root(document)?;
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(None);
        };
        let Some((first, rest)) = parents.split_first() else {
            return Ok(source.shift_remove(&last.key));
        };

        let Some(mut node) = source.get_mut(&first.key) else {
            return Ok(None);
        };
        for segment in rest {
            node = match node {
                Value::Object(map) => match map.get_mut(&segment.key) {
                    Some(child) => child,
                    None => return Ok(None),
                },
                Value::Array(items) => match segment.index().and_then(|idx| items.get_mut(idx)) {
                    Some(child) => child,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        Ok(match node {
            Value::Object(map) => map.shift_remove(&last.key),
            Value::Array(items) => match last.index() {
                Some(idx) if idx < items.len() => Some(items.remove(idx)),
                _ => None,
            },
            _ => None,
        })
    }

    /// Read-only walk that reports the fault `set` would raise, so a failing
    /// write never leaves freshly created parents behind.
    fn probe_write(
        &self,
        source: &ZiSource,
        parents: &[ZiPathSegment],
        last: &ZiPathSegment,
        create_parents: bool,
    ) -> FaultResult<()> {
        let mut node: Option<&Value> = None;
        for (idx, segment) in parents.iter().enumerate() {
            let child = if idx == 0 {
                source.get(&segment.key)
            } else {
                match node {
                    // Parent will be created; everything below it is new too.
                    None => return Ok(()),
                    Some(Value::Object(map)) => map.get(&segment.key),
                    Some(Value::Array(items)) => {
                        let position = segment.index().ok_or_else(|| {
                            ZiFault::wrong_type(format!("set '{self}'"), "list index", "key")
                        })?;
                        match items.get(position) {
                            Some(child) if !child.is_null() => Some(child),
                            _ => return Err(self.missing()),
                        }
                    }
                    Some(other) => {
                        return Err(ZiFault::wrong_type(
                            format!("set '{self}'"),
                            "map or list",
                            ZiValueKind::of(other).to_string(),
                        ))
                    }
                }
            };
            node = match child {
                Some(value) if !value.is_null() => Some(value),
                _ if create_parents => None,
                _ => return Err(self.missing()),
            };
            if node.is_none() {
                return Ok(());
            }
        }

        match node {
            None | Some(Value::Object(_)) => Ok(()),
            Some(Value::Array(items)) => match last.index() {
                Some(position) if position < items.len() => Ok(()),
                Some(_) => Err(self.missing()),
                None => Err(ZiFault::wrong_type(format!("set '{self}'"), "list index", "key")),
            },
            Some(other) => Err(ZiFault::wrong_type(
                format!("set '{self}'"),
                "map or list",
                ZiValueKind::of(other).to_string(),
            )),
        }
    }

    fn writable_root<'a>(&self, document: &'a mut ZiDocument) -> FaultResult<&'a mut ZiSource> {
        match self.root {
            ZiPathRoot::Source => Ok(&mut document.source),
            ZiPathRoot::Ingest => Err(ZiFault::runtime(format!(
                "cannot modify read-only ingest metadata '{self}'"
            ))),
        }
    }

    fn child<'a>(&self, node: &'a Value, segment: &ZiPathSegment) -> FaultResult<Option<&'a Value>> {
        match node {
            Value::Object(map) => Ok(map.get(&segment.key)),
            Value::Array(items) => match segment.index() {
                Some(idx) => Ok(items.get(idx)),
                None => Err(ZiFault::wrong_type(
                    format!("access '{}' in '{self}'", segment.key),
                    "list index",
                    "key",
                )),
            },
            other => Err(ZiFault::wrong_type(
                format!("access '{}' in '{self}'", segment.key),
                "map or list",
                ZiValueKind::of(other).to_string(),
            )),
        }
    }

    fn map_entry<'a>(
        &self,
        map: &'a mut Map<String, Value>,
        segment: &ZiPathSegment,
        create: bool,
    ) -> FaultResult<&'a mut Value> {
        let present = matches!(map.get(&segment.key), Some(value) if !value.is_null());
        if !present {
            if !create {
                return Err(self.missing());
            }
            map.insert(segment.key.clone(), Value::Object(Map::new()));
        }
        map.get_mut(&segment.key).ok_or_else(|| self.missing())
    }

    fn descend<'a>(
        &self,
        node: &'a mut Value,
        segment: &ZiPathSegment,
        create: bool,
    ) -> FaultResult<&'a mut Value> {
        match node {
            Value::Object(map) => self.map_entry(map, segment, create),
            Value::Array(items) => {
                let idx = segment.index().ok_or_else(|| {
                    ZiFault::wrong_type(format!("set '{self}'"), "list index", "key")
                })?;
                match items.get_mut(idx) {
                    Some(child) if !child.is_null() => Ok(child),
                    _ => Err(self.missing()),
                }
            }
            other => Err(ZiFault::wrong_type(
                format!("set '{self}'"),
                "map or list",
                ZiValueKind::of(other).to_string(),
            )),
        }
    }

    fn assign(&self, node: &mut Value, last: &ZiPathSegment, value: Value) -> FaultResult<()> {
        match node {
            Value::Object(map) => {
                map.insert(last.key.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                let idx = last.index().ok_or_else(|| {
                    ZiFault::wrong_type(format!("set '{self}'"), "list index", "key")
                })?;
                match items.get_mut(idx) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(self.missing()),
                }
            }
            Value::Null => Err(self.missing()),
            other => Err(ZiFault::wrong_type(
                format!("set '{self}'"),
                "map or list",
                ZiValueKind::of(other).to_string(),
            )),
        }
    }

    fn missing(&self) -> ZiFault {
        ZiFault::MissingIntermediate {
            path: self.to_string(),
        }
    }
}

impl fmt::Display for ZiFieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.root == ZiPathRoot::Ingest {
            f.write_str("_ingest")?;
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            let needs_quotes = segment.literal
                || segment.key.is_empty()
                || segment.key.contains(['.', '?', '[', ']', '\'']);
            if needs_quotes {
                if segment.null_safe {
                    f.write_str("?")?;
                }
                write!(f, "['{}']", segment.key.replace('\'', "\\'"))?;
                continue;
            }
            if idx > 0 || self.root == ZiPathRoot::Ingest {
                f.write_str(if segment.null_safe { "?." } else { "." })?;
            }
            f.write_str(&segment.key)?;
        }
        Ok(())
    }
}

/// Character scanner turning path text into segments.
struct PathScanner<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> PathScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> ZiError {
        ZiError::validation(format!("invalid field path '{}': {reason}", self.text))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn scan(mut self) -> Result<Vec<ZiPathSegment>> {
        let mut segments = Vec::new();
        let mut null_safe = false;

        loop {
            let segment = match self.peek() {
                Some('[') => self.bracket(null_safe)?,
                Some(_) => self.plain(null_safe)?,
                None => return Err(self.error("dangling separator")),
            };
            segments.push(segment);

            match self.peek() {
                None => break,
                Some('.') => {
                    self.pos += 1;
                    null_safe = false;
                }
                Some('[') => null_safe = false,
                Some('?') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('.') => self.pos += 1,
                        Some('[') => {}
                        _ => return Err(self.error("expected '.' or '[' after '?'")),
                    }
                    null_safe = true;
                }
                Some(other) => return Err(self.error(&format!("unexpected '{other}'"))),
            }
        }

        Ok(segments)
    }

    fn plain(&mut self, null_safe: bool) -> Result<ZiPathSegment> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '.' | '?' | '[' | ']') {
                break;
            }
            self.pos += 1;
        }
        let key: String = self.chars[start..self.pos].iter().collect();
        let key = key.trim();
        if key.is_empty() {
            return Err(self.error("empty segment"));
        }
        Ok(ZiPathSegment::plain(key, null_safe))
    }

    fn bracket(&mut self, null_safe: bool) -> Result<ZiPathSegment> {
        self.pos += 1;
        let segment = match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let mut key = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated quoted key")),
                        Some('\\') => {
                            self.pos += 1;
                            let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                            key.push(escaped);
                            self.pos += 1;
                        }
                        Some(c) if c == quote => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            key.push(c);
                            self.pos += 1;
                        }
                    }
                }
                ZiPathSegment {
                    key,
                    literal: true,
                    null_safe,
                }
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("brackets must hold a quoted key or an index"));
                }
                let key: String = self.chars[start..self.pos].iter().collect();
                ZiPathSegment::plain(key, null_safe)
            }
        };

        if self.peek() != Some(']') {
            return Err(self.error("missing ']'"));
        }
        self.pos += 1;
        Ok(segment)
    }
}
