//! Prompt templates.
//!
//! Prompt templates stored in configuration use a small subset of Go
//! `text/template` syntax:
//!
//! - `{{.Field}}` prints a field of the current value
//! - `{{range .List}}...{{end}}` repeats its body for each element of a list,
//!   with the element as the current value
//! - `{{- ` and ` -}}` trim whitespace on that side of the action
//!
//! Data is supplied as a JSON value. Strings print verbatim, numbers and
//! booleans print in their JSON form, and `null` prints nothing.

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    Range { field: String, body: Vec<Node> },
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    nodes: Vec<Node>,
}

enum Action {
    Field(String),
    Range(String),
    End,
}

impl PromptTemplate {
    /// Parse template source.
    pub fn parse(source: &str) -> Result<Self> {
        // Each stack frame is (range field, nodes collected so far).
        let mut stack: Vec<(Option<String>, Vec<Node>)> = vec![(None, Vec::new())];
        let mut rest = source;
        let mut trim_next_text = false;

        while !rest.is_empty() {
            let (text, after_text) = match rest.find("{{") {
                Some(pos) => (&rest[..pos], Some(&rest[pos + 2..])),
                None => (rest, None),
            };

            let Some(after_open) = after_text else {
                push_text(&mut stack, text, trim_next_text, false);
                break;
            };

            let close = after_open
                .find("}}")
                .ok_or_else(|| Error::Template("unclosed action".to_string()))?;
            let raw = &after_open[..close];
            rest = &after_open[close + 2..];

            let trim_left = raw.starts_with('-');
            let trim_right = raw.ends_with('-') && raw.len() > 1;
            push_text(&mut stack, text, trim_next_text, trim_left);
            trim_next_text = trim_right;

            let inner = raw
                .strip_prefix('-')
                .unwrap_or(raw)
                .trim_end_matches('-')
                .trim();

            match parse_action(inner)? {
                Action::Field(name) => current(&mut stack).push(Node::Field(name)),
                Action::Range(field) => stack.push((Some(field), Vec::new())),
                Action::End => {
                    if stack.len() < 2 {
                        return Err(Error::Template("unexpected {{end}}".to_string()));
                    }
                    if let Some((Some(field), body)) = stack.pop() {
                        current(&mut stack).push(Node::Range { field, body });
                    }
                }
            }
        }

        if stack.len() != 1 {
            return Err(Error::Template("unclosed range".to_string()));
        }
        let nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();
        Ok(Self { nodes })
    }

    /// Render against `data`.
    pub fn render(&self, data: &JsonValue) -> Result<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, data, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render_template(source: &str, data: &JsonValue) -> Result<String> {
    PromptTemplate::parse(source)?.render(data)
}

fn current(stack: &mut [(Option<String>, Vec<Node>)]) -> &mut Vec<Node> {
    // The stack always holds the root frame.
    &mut stack[stack.len() - 1].1
}

fn push_text(
    stack: &mut [(Option<String>, Vec<Node>)],
    text: &str,
    trim_start: bool,
    trim_end: bool,
) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        current(stack).push(Node::Text(text.to_string()));
    }
}

fn parse_action(inner: &str) -> Result<Action> {
    if inner == "end" {
        return Ok(Action::End);
    }
    if let Some(arg) = inner.strip_prefix("range") {
        let arg = arg.trim();
        return field_name(arg)
            .map(Action::Range)
            .ok_or_else(|| Error::Template(format!("unsupported range argument: {}", arg)));
    }
    field_name(inner)
        .map(Action::Field)
        .ok_or_else(|| Error::Template(format!("unsupported action: {{{{{}}}}}", inner)))
}

fn field_name(arg: &str) -> Option<String> {
    let name = arg.strip_prefix('.')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| name.to_string())
}

fn lookup<'a>(data: &'a JsonValue, field: &str) -> Result<&'a JsonValue> {
    data.get(field)
        .ok_or_else(|| Error::Template(format!("can't evaluate field {}", field)))
}

fn render_nodes(nodes: &[Node], data: &JsonValue, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => match lookup(data, field)? {
                JsonValue::String(s) => out.push_str(s),
                JsonValue::Null => {}
                other => out.push_str(&other.to_string()),
            },
            Node::Range { field, body } => match lookup(data, field)? {
                JsonValue::Array(items) => {
                    for item in items {
                        render_nodes(body, item, out)?;
                    }
                }
                JsonValue::Null => {}
                _ => {
                    return Err(Error::Template(format!("range over non-list field {}", field)))
                }
            },
        }
    }
    Ok(())
}
