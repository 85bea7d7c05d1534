//! Template execution.

use serde_json::Value as Json;

use super::ast::{Command, Node, Operand, Pipeline, Tree};
use super::escape::{
    escape_html, escape_js_string, escape_js_value, escape_unquoted_attr, filter_css_value,
    is_safe_url, AttrKind, Context, MarkupTracker, FILTERED_URL,
};
use super::funcs::{FuncMap, AND, OR};
use super::value::Value;
use super::ExecError;

/// How printed values are written into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Values are written raw.
    Text,
    /// Values are escaped for where they land in the markup.
    Html,
}

/// Execute `tree` with `data` as the initial dot and `$`.
pub fn execute(tree: &Tree, funcs: &FuncMap, mode: Mode, data: &Value) -> Result<String, ExecError> {
    let mut state = State {
        funcs,
        mode,
        vars: vec![("$".to_string(), data.clone())],
        out: String::new(),
        markup: MarkupTracker::new(),
    };
    state.walk(&tree.nodes, data)?;
    Ok(state.out)
}

struct State<'a> {
    funcs: &'a FuncMap,
    mode: Mode,
    /// Variable stack, innermost last.
    vars: Vec<(String, Value)>,
    out: String,
    markup: MarkupTracker,
}

impl State<'_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.write_raw(text),
                Node::Action { pipe, line } => {
                    let value = self.pipeline(pipe, dot).map_err(|m| ExecError::at(*line, m))?;
                    match pipe.decl.first() {
                        Some(name) => self.vars.push((name.clone(), value)),
                        None => self.emit(value),
                    }
                }
                Node::If {
                    pipe,
                    then,
                    otherwise,
                    line,
                } => {
                    let mark = self.vars.len();
                    let value = self.pipeline(pipe, dot).map_err(|m| ExecError::at(*line, m))?;
                    let truthy = value.is_truthy();
                    self.declare(pipe, value);
                    let result = if truthy {
                        self.block(then, dot)
                    } else {
                        self.block(otherwise, dot)
                    };
                    self.vars.truncate(mark);
                    result?;
                }
                Node::With {
                    pipe,
                    body,
                    otherwise,
                    line,
                } => {
                    let mark = self.vars.len();
                    let value = self.pipeline(pipe, dot).map_err(|m| ExecError::at(*line, m))?;
                    let result = if value.is_truthy() {
                        self.declare(pipe, value.clone());
                        self.block(body, &value)
                    } else {
                        self.block(otherwise, dot)
                    };
                    self.vars.truncate(mark);
                    result?;
                }
                Node::Range {
                    pipe,
                    body,
                    otherwise,
                    line,
                } => self.range(pipe, body, otherwise, *line, dot)?,
            }
        }
        Ok(())
    }

    fn block(&mut self, nodes: &[Node], dot: &Value) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let result = self.walk(nodes, dot);
        self.vars.truncate(mark);
        result
    }

    fn declare(&mut self, pipe: &Pipeline, value: Value) {
        if let Some(name) = pipe.decl.first() {
            self.vars.push((name.clone(), value));
        }
    }

    fn range(
        &mut self,
        pipe: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        line: usize,
        dot: &Value,
    ) -> Result<(), ExecError> {
        let value = self.pipeline(pipe, dot).map_err(|m| ExecError::at(line, m))?;

        let entries: Vec<(Value, Value)> = match value {
            Value::Data(Json::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), Value::Data(item)))
                .collect(),
            Value::Data(Json::Object(map)) => {
                let mut entries: Vec<(String, Json)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
                    .into_iter()
                    .map(|(key, item)| (Value::from(key), Value::Data(item)))
                    .collect()
            }
            Value::Data(Json::Null) => Vec::new(),
            other => {
                return Err(ExecError::at(
                    line,
                    format!("range can't iterate over {}", other.kind()),
                ))
            }
        };

        if entries.is_empty() {
            return self.block(otherwise, dot);
        }

        for (key, item) in entries {
            let mark = self.vars.len();
            match pipe.decl.as_slice() {
                [elem] => self.vars.push((elem.clone(), item.clone())),
                [key_name, elem, ..] => {
                    self.vars.push((key_name.clone(), key));
                    self.vars.push((elem.clone(), item.clone()));
                }
                [] => {}
            }
            let result = self.walk(body, &item);
            self.vars.truncate(mark);
            result?;
        }
        Ok(())
    }

    fn pipeline(&self, pipe: &Pipeline, dot: &Value) -> Result<Value, String> {
        let mut piped = None;
        for command in &pipe.commands {
            piped = Some(self.command(command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or_else(Value::nil))
    }

    fn command(&self, command: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, String> {
        let (head, rest) = command
            .args
            .split_first()
            .ok_or_else(|| "empty command".to_string())?;

        match head {
            Operand::Function(name) if name == AND || name == OR => {
                self.logical(name, rest, dot, piped)
            }
            Operand::Function(name) => {
                let mut args = Vec::with_capacity(rest.len() + 1);
                for arg in rest {
                    args.push(self.operand(arg, dot)?);
                }
                args.extend(piped);
                self.funcs.call(name, &args)
            }
            other => {
                if piped.is_some() || !rest.is_empty() {
                    return Err("can't give argument to non-function".to_string());
                }
                self.operand(other, dot)
            }
        }
    }

    /// `and` stops at the first falsy operand, `or` at the first truthy one;
    /// either returns the last operand when none decides.
    fn logical(
        &self,
        name: &str,
        rest: &[Operand],
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, String> {
        if rest.is_empty() && piped.is_none() {
            return Err(format!(
                "wrong number of args for {}: want at least 1 got 0",
                name
            ));
        }

        let stop_when = name == OR;
        let mut last = Value::nil();
        for arg in rest {
            let value = self.operand(arg, dot)?;
            if value.is_truthy() == stop_when {
                return Ok(value);
            }
            last = value;
        }
        Ok(piped.unwrap_or(last))
    }

    fn operand(&self, operand: &Operand, dot: &Value) -> Result<Value, String> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(path) => dot.field_path(path),
            Operand::Variable { name, fields } => {
                let (_, value) = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| format!("undefined variable: {}", name))?;
                value.field_path(fields)
            }
            Operand::Function(name) if name == AND || name == OR => Err(format!(
                "wrong number of args for {}: want at least 1 got 0",
                name
            )),
            Operand::Function(name) => self.funcs.call(name, &[]),
            Operand::Literal(json) => Ok(Value::Data(json.clone())),
            Operand::Nested(pipe) => self.pipeline(pipe, dot),
        }
    }

    fn emit(&mut self, value: Value) {
        let rendered = match self.mode {
            Mode::Text => value.to_display(),
            Mode::Html => escape_in_context(self.markup.context(), &value),
        };
        self.write_raw(&rendered);
    }

    fn write_raw(&mut self, text: &str) {
        if self.mode == Mode::Html {
            self.markup.feed(text);
        }
        self.out.push_str(text);
    }
}

/// Escape `value` for the position `context` in the HTML output.
fn escape_in_context(context: Context, value: &Value) -> String {
    match context {
        Context::Text => match value {
            Value::Html(raw) => raw.clone(),
            _ => escape_html(&value.to_display()),
        },
        Context::Attribute {
            kind,
            quoted,
            at_start,
        } => {
            if quoted && kind == AttrKind::Plain {
                if let Value::Html(raw) = value {
                    return raw.clone();
                }
            }
            let text = match kind {
                AttrKind::Plain => value.to_display(),
                AttrKind::Url => {
                    let text = value.to_display();
                    let trusted = matches!(value, Value::Url(_));
                    if at_start && !trusted && !is_safe_url(&text) {
                        FILTERED_URL.to_string()
                    } else {
                        text
                    }
                }
                AttrKind::Script => escape_js_value(&value.to_json()),
                AttrKind::Style => filter_css_value(&value.to_display()),
            };
            if quoted {
                escape_html(&text)
            } else {
                escape_unquoted_attr(&text)
            }
        }
        Context::Script { in_string: false } => escape_js_value(&value.to_json()),
        Context::Script { in_string: true } => escape_js_string(&value.to_display()),
        Context::Style => filter_css_value(&value.to_display()),
    }
}
