//! Minimal logic-enabled text templates for SQL generation.
//!
//! Supported actions:
//!
//! | Action | Meaning |
//! |--------|---------|
//! | `{{name}}` / `{{.name}}` | Interpolate a parameter |
//! | `{{escape name}}` / `{{name \| escape}}` | Interpolate with `'` doubled |
//! | `{{if name}}` / `{{if not name}}` | Conditional block |
//! | `{{else}}` / `{{end}}` | Close or switch a conditional branch |
//!
//! Interpolation is never escaped implicitly. Template authors must call
//! `escape` on any value that lands inside a quoted SQL literal.

use serde_json::{Map, Value};
use thiserror::Error;

/// Template parse and render failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("invalid SQL template at byte {position}: {reason}")]
    Syntax { position: usize, reason: String },

    #[error("template references missing parameter '{name}'")]
    MissingField { name: String },

    #[error("generated SQL is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field { name: String, escape: bool },
    If {
        name: String,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

struct OpenIf {
    position: usize,
    name: String,
    negate: bool,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl OpenIf {
    fn branch(&mut self) -> &mut Vec<Node> {
        match self.otherwise.as_mut() {
            Some(otherwise) => otherwise,
            None => &mut self.then,
        }
    }
}

impl Template {
    /// Parse template source.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut root: Vec<Node> = Vec::new();
        let mut open: Vec<OpenIf> = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        fn target<'a>(root: &'a mut Vec<Node>, open: &'a mut [OpenIf]) -> &'a mut Vec<Node> {
            match open.last_mut() {
                Some(block) => block.branch(),
                None => root,
            }
        }

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                target(&mut root, &mut open).push(Node::Text(rest[..start].to_string()));
            }
            let position = offset + start;
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(syntax(position, "unterminated action, expected '}}'"));
            };
            let action = after[..end].trim();

            match Action::parse(action, position)? {
                Action::Emit { name, escape } => {
                    target(&mut root, &mut open).push(Node::Field { name, escape });
                }
                Action::If { name, negate } => open.push(OpenIf {
                    position,
                    name,
                    negate,
                    then: Vec::new(),
                    otherwise: None,
                }),
                Action::Else => match open.last_mut() {
                    Some(block) if block.otherwise.is_none() => block.otherwise = Some(Vec::new()),
                    Some(_) => return Err(syntax(position, "duplicate {{else}} in one {{if}}")),
                    None => return Err(syntax(position, "{{else}} without matching {{if}}")),
                },
                Action::End => {
                    let Some(block) = open.pop() else {
                        return Err(syntax(position, "{{end}} without matching {{if}}"));
                    };
                    target(&mut root, &mut open).push(Node::If {
                        name: block.name,
                        negate: block.negate,
                        then: block.then,
                        otherwise: block.otherwise.unwrap_or_default(),
                    });
                }
            }

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            target(&mut root, &mut open).push(Node::Text(rest.to_string()));
        }
        if let Some(block) = open.last() {
            return Err(syntax(block.position, "{{if}} is never closed with {{end}}"));
        }

        Ok(Self { nodes: root })
    }

    /// Render against a parameter map.
    pub fn render(&self, params: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut out = String::new();
        render_nodes(&self.nodes, params, &mut out)?;
        Ok(out)
    }
}

enum Action {
    Emit { name: String, escape: bool },
    If { name: String, negate: bool },
    Else,
    End,
}

impl Action {
    fn parse(action: &str, position: usize) -> Result<Self, TemplateError> {
        if action.is_empty() {
            return Err(syntax(position, "empty action"));
        }

        let mut stages = action.split('|').map(str::trim);
        let head: Vec<&str> = stages.next().unwrap_or_default().split_whitespace().collect();
        let mut escape = false;
        for stage in stages {
            match stage {
                "escape" => escape = true,
                "" => return Err(syntax(position, "empty pipeline stage")),
                other => return Err(syntax(position, format!("unknown function '{}'", other))),
            }
        }

        let keyword_action = |action: Self| {
            if escape {
                Err(syntax(position, "keywords cannot be piped"))
            } else {
                Ok(action)
            }
        };

        match head.as_slice() {
            ["if", "not", name] => keyword_action(Self::If {
                name: field_name(name, position)?,
                negate: true,
            }),
            ["if", name] => keyword_action(Self::If {
                name: field_name(name, position)?,
                negate: false,
            }),
            ["if", ..] => Err(syntax(position, "{{if}} takes exactly one parameter")),
            ["else"] => keyword_action(Self::Else),
            ["end"] => keyword_action(Self::End),
            ["escape", name] => Ok(Self::Emit {
                name: field_name(name, position)?,
                escape: true,
            }),
            [name] => Ok(Self::Emit {
                name: field_name(name, position)?,
                escape,
            }),
            [function, ..] if *function != "escape" && head.len() > 1 => Err(syntax(
                position,
                format!("unknown function '{}'", function),
            )),
            _ => Err(syntax(position, format!("cannot parse action '{}'", action))),
        }
    }
}

fn field_name(raw: &str, position: usize) -> Result<String, TemplateError> {
    let name = raw.strip_prefix('.').unwrap_or(raw);
    if name.is_empty() {
        return Err(syntax(position, "empty parameter name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(syntax(position, format!("invalid parameter name '{}'", raw)));
    }
    Ok(name.to_string())
}

fn syntax(position: usize, reason: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        position,
        reason: reason.into(),
    }
}

fn render_nodes(
    nodes: &[Node],
    params: &Map<String, Value>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field { name, escape } => {
                let value = params
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingField { name: name.clone() })?;
                let text = format_value(value);
                if *escape {
                    out.push_str(&escape_sql(&text));
                } else {
                    out.push_str(&text);
                }
            }
            Node::If {
                name,
                negate,
                then,
                otherwise,
            } => {
                let truthy = params.get(name).map(is_truthy).unwrap_or(false);
                let branch = if truthy != *negate { then } else { otherwise };
                render_nodes(branch, params, out)?;
            }
        }
    }
    Ok(())
}

/// Text form of a value when interpolated.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truthiness of a condition value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Double embedded single quotes.
pub fn escape_sql(s: &str) -> String {
    s.replace('\'', "''")
}
