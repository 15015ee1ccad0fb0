//! Node tree back to stylesheet text.
//!
//! Output follows the rework identity format: two-space indentation, one
//! declaration per line, a blank line between top-level rules.

use serde_json::Value;

const INDENT: &str = "  ";

/// Serialize a stylesheet tree.
pub fn stringify(tree: &Value) -> String {
    let rules = tree
        .pointer("/stylesheet/rules")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Compiler { level: 0 }.join(rules, "\n\n")
}

struct Compiler {
    level: usize,
}

impl Compiler {
    fn indent(&self) -> String {
        INDENT.repeat(self.level)
    }

    fn join(&mut self, nodes: &[Value], separator: &str) -> String {
        nodes
            .iter()
            .map(|node| self.node(node))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn nested(&mut self, nodes: &[Value], separator: &str) -> String {
        self.level += 1;
        let body = self.join(nodes, separator);
        self.level -= 1;
        body
    }

    fn node(&mut self, node: &Value) -> String {
        let kind = text(node, "type");
        match kind {
            "comment" => format!("{}/*{}*/", self.indent(), text(node, "comment")),
            "declaration" => format!(
                "{}{}: {};",
                self.indent(),
                text(node, "property"),
                text(node, "value")
            ),
            "rule" => self.rule(node),
            "keyframes" => {
                let frames = self.nested(list(node, "keyframes"), "\n");
                format!(
                    "{}@{}keyframes {} {{\n{}\n{}}}",
                    self.indent(),
                    text(node, "vendor"),
                    text(node, "name"),
                    frames,
                    self.indent()
                )
            }
            "keyframe" => {
                let values: Vec<&str> =
                    list(node, "values").iter().filter_map(Value::as_str).collect();
                let body = self.nested(list(node, "declarations"), "\n");
                format!("{}{} {{\n{}\n{}}}", self.indent(), values.join(", "), body, self.indent())
            }
            "font-face" => {
                let body = self.nested(list(node, "declarations"), "\n");
                format!("{}@font-face {{\n{}\n{}}}", self.indent(), body, self.indent())
            }
            "page" => {
                let selectors: Vec<&str> =
                    list(node, "selectors").iter().filter_map(Value::as_str).collect();
                let body = self.nested(list(node, "declarations"), "\n");
                let head = if selectors.is_empty() {
                    "@page".to_string()
                } else {
                    format!("@page {}", selectors.join(", "))
                };
                format!("{}{} {{\n{}\n{}}}", self.indent(), head, body, self.indent())
            }
            _ if node.get("rules").is_some() => {
                let body = self.nested(list(node, "rules"), "\n\n");
                format!(
                    "{}@{}{} {} {{\n{}\n{}}}",
                    self.indent(),
                    text(node, "vendor"),
                    kind,
                    text(node, kind),
                    body,
                    self.indent()
                )
            }
            "" => String::new(),
            _ => format!("{}@{} {};", self.indent(), kind, text(node, kind)),
        }
    }

    fn rule(&mut self, node: &Value) -> String {
        let declarations = list(node, "declarations");
        if declarations.is_empty() {
            return String::new();
        }
        let indent = self.indent();
        let selectors: Vec<String> = list(node, "selectors")
            .iter()
            .filter_map(Value::as_str)
            .map(|s| format!("{}{}", indent, s))
            .collect();
        let body = self.nested(declarations, "\n");
        format!("{} {{\n{}\n{}}}", selectors.join(",\n"), body, indent)
    }
}

fn text<'a>(node: &'a Value, key: &str) -> &'a str {
    node.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn list<'a>(node: &'a Value, key: &str) -> &'a [Value] {
    node.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
