//! Logic-less HTML templates
//!
//! A small mustache subset: `{{name}}` (HTML-escaped), `{{{name}}}` and
//! `{{& name}}` (verbatim), `{{#name}}...{{/name}}` (loop over an array or
//! render once when truthy), `{{^name}}...{{/name}}` (render when falsy) and
//! `{{! comment}}`. Names may be dotted (`store.name`); `.` is the current item.
//! Lookups walk outward through enclosing sections.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed tag at byte {0}")]
    UnclosedTag(usize),

    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("section '{0}' is never closed")]
    UnclosedSection(String),

    #[error("closing '{found}' does not match open section '{expected}'")]
    MismatchedClose { expected: String, found: String },

    #[error("closing '{0}' without an open section")]
    UnexpectedClose(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Escaped(String),
    Verbatim(String),
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

enum Tag<'a> {
    Escaped(&'a str),
    Verbatim(&'a str),
    Open(&'a str, bool),
    Close(&'a str),
    Comment,
}

/// A parsed template, reusable across renders
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stack: Vec<(String, bool, Vec<Node>)> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut offset = 0;

        while let Some(relative) = source[offset..].find("{{") {
            let open = offset + relative;
            if open > offset {
                current.push(Node::Text(source[offset..open].to_string()));
            }

            let body = open + 2;
            let (tag, next) = if source[body..].starts_with('{') {
                let close = source[body..]
                    .find("}}}")
                    .ok_or(TemplateError::UnclosedTag(open))?
                    + body;
                (Tag::Verbatim(source[body + 1..close].trim()), close + 3)
            } else {
                let close = source[body..]
                    .find("}}")
                    .ok_or(TemplateError::UnclosedTag(open))?
                    + body;
                (classify(source[body..close].trim()), close + 2)
            };
            offset = next;

            match tag {
                Tag::Comment => {}
                Tag::Escaped(name) | Tag::Verbatim(name) | Tag::Open(name, _) | Tag::Close(name)
                    if name.is_empty() =>
                {
                    return Err(TemplateError::EmptyTag(open));
                }
                Tag::Escaped(name) => current.push(Node::Escaped(name.to_string())),
                Tag::Verbatim(name) => current.push(Node::Verbatim(name.to_string())),
                Tag::Open(name, inverted) => {
                    stack.push((name.to_string(), inverted, std::mem::take(&mut current)));
                }
                Tag::Close(name) => {
                    let (expected, inverted, parent) = stack
                        .pop()
                        .ok_or_else(|| TemplateError::UnexpectedClose(name.to_string()))?;
                    if expected != name {
                        return Err(TemplateError::MismatchedClose {
                            expected,
                            found: name.to_string(),
                        });
                    }
                    let children = std::mem::replace(&mut current, parent);
                    current.push(Node::Section {
                        name: expected,
                        inverted,
                        children,
                    });
                }
            }
        }

        if offset < source.len() {
            current.push(Node::Text(source[offset..].to_string()));
        }

        if let Some((name, _, _)) = stack.pop() {
            return Err(TemplateError::UnclosedSection(name));
        }

        Ok(Self { nodes: current })
    }

    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        let mut scopes = vec![data];
        render_nodes(&self.nodes, &mut scopes, &mut out);
        out
    }
}

fn classify(inner: &str) -> Tag<'_> {
    match inner.chars().next() {
        Some('#') => Tag::Open(inner[1..].trim(), false),
        Some('^') => Tag::Open(inner[1..].trim(), true),
        Some('/') => Tag::Close(inner[1..].trim()),
        Some('&') => Tag::Verbatim(inner[1..].trim()),
        Some('!') => Tag::Comment,
        _ => Tag::Escaped(inner),
    }
}

fn render_nodes<'a>(nodes: &[Node], scopes: &mut Vec<&'a Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Escaped(name) => {
                if let Some(value) = lookup(name, scopes) {
                    escape_into(&to_text(value), out);
                }
            }
            Node::Verbatim(name) => {
                if let Some(value) = lookup(name, scopes) {
                    out.push_str(&to_text(value));
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(name, scopes);
                let truthy = value.map(is_truthy).unwrap_or(false);

                if *inverted {
                    if !truthy {
                        render_nodes(children, scopes, out);
                    }
                    continue;
                }

                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            scopes.push(item);
                            render_nodes(children, scopes, out);
                            scopes.pop();
                        }
                    }
                    Some(value) if truthy => {
                        scopes.push(value);
                        render_nodes(children, scopes, out);
                        scopes.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'a>(name: &str, scopes: &[&'a Value]) -> Option<&'a Value> {
    if name == "." {
        return scopes.last().copied();
    }

    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = scopes.iter().rev().find_map(|scope| scope.get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}
