//! Runtime values flowing through template pipelines.

use std::borrow::Cow;

use serde_json::Value as Json;

static NIL: Json = Json::Null;

/// A value produced while executing a template.
///
/// Variable data is plain JSON. `Html` and `Url` are the markers returned by
/// `safeHTML` and `safeURL`; they carry content the escaper must trust.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Data(Json),
    Html(String),
    Url(String),
}

impl Value {
    pub fn nil() -> Self {
        Value::Data(Json::Null)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Data(Json::Null))
    }

    /// Truthiness used by `if`, `with`, `and`, `or` and `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Data(Json::Null) => false,
            Value::Data(Json::Bool(b)) => *b,
            Value::Data(Json::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::Data(Json::String(s)) => !s.is_empty(),
            Value::Data(Json::Array(items)) => !items.is_empty(),
            Value::Data(Json::Object(map)) => !map.is_empty(),
            Value::Html(s) | Value::Url(s) => !s.is_empty(),
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Data(json) => json_kind(json),
            Value::Html(_) => "html",
            Value::Url(_) => "url",
        }
    }

    /// Textual view for string parameters: strings and safe markers as-is,
    /// nil as the empty string, anything else is rejected.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Data(Json::String(s)) | Value::Html(s) | Value::Url(s) => {
                Some(Cow::Borrowed(s.as_str()))
            }
            Value::Data(Json::Null) => Some(Cow::Borrowed("")),
            Value::Data(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Value::Data(Json::String(_)) | Value::Html(_) | Value::Url(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Data(Json::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// Follow a chain of field names. Missing keys and fields of nil resolve
    /// to nil; fields of any other non-object kind are an error.
    pub fn field_path(&self, path: &[String]) -> Result<Value, String> {
        if path.is_empty() {
            return Ok(self.clone());
        }

        let mut current: &Json = match self {
            Value::Data(json) => json,
            other => {
                return Err(format!(
                    "can't evaluate field {} in type {}",
                    path[0],
                    other.kind()
                ))
            }
        };

        for name in path {
            current = match current {
                Json::Object(map) => map.get(name).unwrap_or(&NIL),
                Json::Null => return Ok(Value::nil()),
                other => {
                    return Err(format!(
                        "can't evaluate field {} in type {}",
                        name,
                        json_kind(other)
                    ))
                }
            };
        }

        Ok(Value::Data(current.clone()))
    }

    /// JSON view; safe markers become plain strings.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Data(json) => json.clone(),
            Value::Html(s) | Value::Url(s) => Json::String(s.clone()),
        }
    }

    /// Printed form of the value, without any escaping.
    pub fn to_display(&self) -> String {
        match self {
            Value::Data(json) => display_json(json),
            Value::Html(s) | Value::Url(s) => s.clone(),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Data(json)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(Json::String(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(Json::String(s.to_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Data(Json::Bool(b))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Data(Json::from(n))
    }
}

pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "nil",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "map",
    }
}

fn display_json(json: &Json) -> String {
    match json {
        Json::Null => String::new(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.clone(),
        Json::Array(items) => {
            let parts: Vec<String> = items.iter().map(display_json).collect();
            format!("[{}]", parts.join(" "))
        }
        Json::Object(map) => {
            let parts: Vec<String> = sorted_entries(map)
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, display_json(v)))
                .collect();
            format!("map[{}]", parts.join(" "))
        }
    }
}

/// Object entries in key order, independent of the map's own ordering.
pub(crate) fn sorted_entries(map: &serde_json::Map<String, Json>) -> Vec<(&String, &Json)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}
