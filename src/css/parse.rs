//! Stylesheet text to node tree.
//!
//! Produces the rework-style tree: a `stylesheet` root whose `rules` hold
//! `rule`, `comment`, `media`, `keyframes` and friends. Every node carries a
//! `position` object with its start and end location.

use serde_json::{json, Map, Value};

use crate::error::{Result, SpriteError};

use super::span::{Location, Span};

/// At-rules whose block holds nested rules.
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "document", "host", "container", "layer"];

/// Parse stylesheet text into a node tree.
pub fn parse_stylesheet(source: &str) -> Result<Value> {
    let mut parser = Parser { source, pos: 0 };
    let rules = parser.rules(false)?;
    Ok(json!({
        "type": "stylesheet",
        "stylesheet": { "rules": rules }
    }))
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error_at(&self, offset: usize, message: &str, help: Option<&str>) -> SpriteError {
        SpriteError::Parse {
            message: format!("{} at {}", message, Location::at(self.source, offset)),
            help: help.map(str::to_string),
        }
    }

    fn error(&self, message: &str, help: Option<&str>) -> SpriteError {
        self.error_at(self.pos, message, help)
    }

    fn position(&self, start: usize) -> Value {
        Span::from_offsets(self.source, start, self.pos).to_json()
    }

    fn expect_open_brace(&mut self, what: &str) -> Result<()> {
        if self.peek() == Some('{') {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("missing '{{' after {}", what), None))
        }
    }

    /// Parse rules until end of input, or until the closing brace of the
    /// enclosing block when `nested`.
    fn rules(&mut self, nested: bool) -> Result<Vec<Value>> {
        let mut rules = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None if nested => {
                    return Err(self.error("unclosed block", Some("Add a closing '}'")));
                }
                None => return Ok(rules),
                Some('}') if nested => {
                    self.bump();
                    return Ok(rules);
                }
                Some('}') => return Err(self.error("unexpected '}'", None)),
                Some('/') if self.starts_with("/*") => rules.push(self.comment()?),
                Some('<') if self.starts_with("<!--") => self.pos += 4,
                Some('-') if self.starts_with("-->") => self.pos += 3,
                Some('@') => rules.push(self.at_rule()?),
                Some(_) => rules.push(self.rule()?),
            }
        }
    }

    fn comment(&mut self) -> Result<Value> {
        let start = self.pos;
        self.pos += 2;
        let Some(end) = self.rest().find("*/") else {
            return Err(self.error_at(start, "unclosed comment", Some("Add a closing '*/'")));
        };
        let text = self.rest()[..end].to_string();
        self.pos += end + 2;
        Ok(json!({
            "type": "comment",
            "comment": text,
            "position": self.position(start),
        }))
    }

    fn rule(&mut self) -> Result<Value> {
        let start = self.pos;
        let prelude = self.scan_until(&['{', '}', ';'])?;
        let selectors = split_list(&prelude);
        if selectors.is_empty() {
            return Err(self.error_at(start, "selector missing", None));
        }
        self.expect_open_brace("selector")?;
        let declarations = self.declarations()?;

        Ok(json!({
            "type": "rule",
            "selectors": selectors,
            "declarations": declarations,
            "position": self.position(start),
        }))
    }

    /// Parse a declaration block body; the opening brace is already consumed.
    fn declarations(&mut self) -> Result<Vec<Value>> {
        let mut declarations = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unclosed block", Some("Add a closing '}'"))),
                Some('}') => {
                    self.bump();
                    return Ok(declarations);
                }
                Some(';') => {
                    self.bump();
                }
                Some('/') if self.starts_with("/*") => declarations.push(self.comment()?),
                Some(_) => declarations.push(self.declaration()?),
            }
        }
    }

    fn declaration(&mut self) -> Result<Value> {
        let start = self.pos;
        let property = self.scan_until(&[':', ';', '}'])?;
        let property = property.trim();
        if property.is_empty() {
            return Err(self.error_at(start, "property missing", None));
        }
        if self.peek() != Some(':') {
            return Err(self.error(&format!("missing ':' after property '{}'", property), None));
        }
        self.bump();

        let value = self.scan_until(&[';', '}'])?;
        if self.peek() == Some(';') {
            self.bump();
        }

        Ok(json!({
            "type": "declaration",
            "property": property,
            "value": value.trim(),
            "position": self.position(start),
        }))
    }

    fn at_rule(&mut self) -> Result<Value> {
        let start = self.pos;
        self.bump();
        let name = self.identifier();
        if name.is_empty() {
            return Err(self.error_at(start, "at-rule name missing", None));
        }
        let (vendor, base) = split_vendor(&name);
        let prelude = self.scan_until(&['{', ';', '}'])?;
        let prelude = prelude.trim().to_string();

        let mut node = Map::new();
        node.insert("type".to_string(), json!(base));

        match base {
            "keyframes" => {
                self.expect_open_brace("@keyframes")?;
                node.insert("name".to_string(), json!(prelude));
                if !vendor.is_empty() {
                    node.insert("vendor".to_string(), json!(vendor));
                }
                node.insert("keyframes".to_string(), Value::Array(self.keyframes()?));
            }
            "font-face" => {
                self.expect_open_brace("@font-face")?;
                node.insert("declarations".to_string(), Value::Array(self.declarations()?));
            }
            "page" => {
                self.expect_open_brace("@page")?;
                node.insert("selectors".to_string(), json!(split_list(&prelude)));
                node.insert("declarations".to_string(), Value::Array(self.declarations()?));
            }
            _ if self.peek() == Some('{') => {
                if !GROUPING_AT_RULES.contains(&base) {
                    log::debug!("treating @{} block as nested rules", name);
                }
                self.bump();
                node.insert(base.to_string(), json!(prelude));
                if !vendor.is_empty() {
                    node.insert("vendor".to_string(), json!(vendor));
                }
                node.insert("rules".to_string(), Value::Array(self.rules(true)?));
            }
            _ => {
                if self.peek() == Some(';') {
                    self.bump();
                }
                node.insert(name.clone(), json!(prelude));
                node.insert("type".to_string(), json!(name));
            }
        }

        node.insert("position".to_string(), self.position(start));
        Ok(Value::Object(node))
    }

    fn keyframes(&mut self) -> Result<Vec<Value>> {
        let mut frames = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(self.error("unclosed @keyframes block", Some("Add a closing '}'")))
                }
                Some('}') => {
                    self.bump();
                    return Ok(frames);
                }
                Some('/') if self.starts_with("/*") => frames.push(self.comment()?),
                Some(_) => {
                    let start = self.pos;
                    let values = split_list(&self.scan_until(&['{', '}', ';'])?);
                    self.expect_open_brace("keyframe selector")?;
                    let declarations = self.declarations()?;
                    frames.push(json!({
                        "type": "keyframe",
                        "values": values,
                        "declarations": declarations,
                        "position": self.position(start),
                    }));
                }
            }
        }
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                name.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    /// Collect text up to (not including) the first stop character found
    /// outside quotes, parentheses and brackets. Comments are dropped.
    fn scan_until(&mut self, stops: &[char]) -> Result<String> {
        let mut text = String::new();
        let mut quote: Option<char> = None;
        let mut depth = 0usize;

        while let Some(ch) = self.peek() {
            if let Some(q) = quote {
                text.push(ch);
                self.bump();
                if ch == '\\' {
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                } else if ch == q {
                    quote = None;
                }
                continue;
            }

            if depth == 0 && stops.contains(&ch) {
                break;
            }

            match ch {
                '/' if self.starts_with("/*") => {
                    let start = self.pos;
                    match self.rest()[2..].find("*/") {
                        Some(end) => self.pos += end + 4,
                        None => {
                            return Err(self.error_at(
                                start,
                                "unclosed comment",
                                Some("Add a closing '*/'"),
                            ));
                        }
                    }
                    continue;
                }
                '\\' => {
                    text.push(ch);
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                    continue;
                }
                '"' | '\'' => quote = Some(ch),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ => {}
            }
            text.push(ch);
            self.bump();
        }

        Ok(text)
    }
}

/// Split a comma-separated selector list, ignoring commas inside
/// parentheses, brackets and quotes.
fn split_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for ch in text.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(collapse_whitespace(&current));
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    items.push(collapse_whitespace(&current));
    items.retain(|s| !s.is_empty());
    items
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `-webkit-keyframes` into (`-webkit-`, `keyframes`).
fn split_vendor(name: &str) -> (&str, &str) {
    if let Some(rest) = name.strip_prefix('-') {
        if let Some(dash) = rest.find('-') {
            let split = dash + 2;
            return (&name[..split], &name[split..]);
        }
    }
    ("", name)
}
