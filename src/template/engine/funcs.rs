//! Function table available to template pipelines.
//!
//! The table is built once by its owner (normally the renderer) and shared
//! read-only by every parse and execution.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use super::value::Value;

/// A callable template function. Errors are plain messages; the executor
/// attaches the template position.
pub type Func = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// `and` and `or` evaluate their operands lazily, so the executor implements
/// them directly instead of calling through the table.
pub(crate) const AND: &str = "and";
pub(crate) const OR: &str = "or";

/// Named functions callable from template actions.
#[derive(Clone)]
pub struct FuncMap {
    funcs: HashMap<String, Func>,
}

impl FuncMap {
    /// Only the language built-ins (`eq`, `len`, `index`, ...).
    pub fn builtins() -> Self {
        let mut map = Self {
            funcs: HashMap::new(),
        };

        map.insert("not", |args| {
            arity("not", args, 1)?;
            Ok(Value::from(!args[0].is_truthy()))
        });
        map.insert("eq", |args| {
            if args.len() < 2 {
                return Err(format!(
                    "wrong number of args for eq: want at least 2 got {}",
                    args.len()
                ));
            }
            for other in &args[1..] {
                if equal("eq", &args[0], other)? {
                    return Ok(Value::from(true));
                }
            }
            Ok(Value::from(false))
        });
        map.insert("ne", |args| {
            arity("ne", args, 2)?;
            Ok(Value::from(!equal("ne", &args[0], &args[1])?))
        });
        map.insert("lt", |args| ordered("lt", args, |o| o == Ordering::Less));
        map.insert("le", |args| ordered("le", args, |o| o != Ordering::Greater));
        map.insert("gt", |args| ordered("gt", args, |o| o == Ordering::Greater));
        map.insert("ge", |args| ordered("ge", args, |o| o != Ordering::Less));
        map.insert("len", |args| {
            arity("len", args, 1)?;
            let len = match &args[0] {
                Value::Data(Json::Null) => 0,
                Value::Data(Json::String(s)) | Value::Html(s) | Value::Url(s) => {
                    s.chars().count()
                }
                Value::Data(Json::Array(items)) => items.len(),
                Value::Data(Json::Object(map)) => map.len(),
                other => return Err(format!("len of type {}", other.kind())),
            };
            Ok(Value::from(len))
        });
        map.insert("index", index);
        map.insert("print", |args| Ok(Value::from(print(args))));

        map
    }

    /// Built-ins plus the text helpers used by notification templates.
    pub fn with_helpers() -> Self {
        let mut map = Self::builtins();

        map.insert("upper", |args| {
            arity("upper", args, 1)?;
            Ok(Value::from(text("upper", &args[0])?.to_uppercase()))
        });
        map.insert("lower", |args| {
            arity("lower", args, 1)?;
            Ok(Value::from(text("lower", &args[0])?.to_lowercase()))
        });
        map.insert("title", |args| {
            arity("title", args, 1)?;
            Ok(Value::from(title_case(&text("title", &args[0])?)))
        });
        map.insert("trim", |args| {
            arity("trim", args, 1)?;
            Ok(Value::from(text("trim", &args[0])?.trim()))
        });
        map.insert("contains", |args| {
            arity("contains", args, 2)?;
            let haystack = text("contains", &args[0])?;
            let needle = text("contains", &args[1])?;
            Ok(Value::from(haystack.contains(needle.as_ref())))
        });
        map.insert("replace", |args| {
            arity("replace", args, 3)?;
            let source = text("replace", &args[0])?;
            let old = text("replace", &args[1])?;
            let new = text("replace", &args[2])?;
            Ok(Value::from(source.replace(old.as_ref(), new.as_ref())))
        });
        map.insert("default", |args| {
            arity("default", args, 2)?;
            let value = &args[1];
            let empty = matches!(value, Value::Data(Json::Null))
                || matches!(value, Value::Data(Json::String(s)) if s.is_empty());
            Ok(if empty { args[0].clone() } else { value.clone() })
        });
        map.insert("safeHTML", |args| {
            arity("safeHTML", args, 1)?;
            Ok(Value::Html(text("safeHTML", &args[0])?.into_owned()))
        });
        map.insert("safeURL", |args| {
            arity("safeURL", args, 1)?;
            Ok(Value::Url(text("safeURL", &args[0])?.into_owned()))
        });

        map
    }

    /// Register or replace a function.
    pub fn insert<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(func));
    }

    /// Whether `name` can be used in a template.
    pub fn contains(&self, name: &str) -> bool {
        name == AND || name == OR || self.funcs.contains_key(name)
    }

    pub(crate) fn call(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        match self.funcs.get(name) {
            Some(func) => func(args),
            None => Err(format!("function {:?} not defined", name)),
        }
    }

    /// Registered function names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.push(AND);
        names.push(OR);
        names.sort_unstable();
        names
    }
}

impl Default for FuncMap {
    fn default() -> Self {
        Self::with_helpers()
    }
}

impl fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncMap")
            .field("funcs", &self.names())
            .finish()
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn text<'a>(name: &str, value: &'a Value) -> Result<Cow<'a, str>, String> {
    value.as_text().ok_or_else(|| {
        format!(
            "wrong type for value in {}; expected string; got {}",
            name,
            value.kind()
        )
    })
}

/// Upper-case the first letter of every word. Word boundaries are any
/// character that is not alphanumeric or an underscore.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_boundary = true;
    for c in s.chars() {
        if at_boundary {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = !(c.is_alphanumeric() || c == '_');
    }
    out
}

fn equal(name: &str, a: &Value, b: &Value) -> Result<bool, String> {
    if a.is_nil() || b.is_nil() {
        return Ok(a.is_nil() && b.is_nil());
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return Ok(x == y);
    }
    if a.is_text() && b.is_text() {
        return Ok(a.as_text() == b.as_text());
    }
    match (a, b) {
        (Value::Data(Json::Bool(x)), Value::Data(Json::Bool(y))) => Ok(x == y),
        _ => Err(format!(
            "incompatible types for comparison in {}: {} and {}",
            name,
            a.kind(),
            b.kind()
        )),
    }
}

fn ordered(name: &str, args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value, String> {
    arity(name, args, 2)?;
    let (a, b) = (&args[0], &args[1]);

    let ordering = if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        x.partial_cmp(&y)
            .ok_or_else(|| format!("invalid number for comparison in {}", name))?
    } else if a.is_text() && b.is_text() {
        a.as_text().cmp(&b.as_text())
    } else {
        return Err(format!(
            "incompatible types for comparison in {}: {} and {}",
            name,
            a.kind(),
            b.kind()
        ));
    };

    Ok(Value::from(accept(ordering)))
}

fn index(args: &[Value]) -> Result<Value, String> {
    let Some((item, keys)) = args.split_first() else {
        return Err("wrong number of args for index: want at least 1 got 0".to_string());
    };

    let mut current = item.clone();
    for key in keys {
        current = match current {
            Value::Data(Json::Null) => return Ok(Value::nil()),
            Value::Data(Json::Array(mut items)) => {
                let position = key
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .ok_or_else(|| format!("cannot index array with {}", key.kind()))?;
                let position = position as usize;
                if position >= items.len() {
                    return Err(format!("index out of range: {}", position));
                }
                Value::Data(items.swap_remove(position))
            }
            Value::Data(Json::Object(mut map)) => {
                let name = key
                    .as_text()
                    .ok_or_else(|| format!("cannot index map with {}", key.kind()))?;
                Value::Data(map.remove(name.as_ref()).unwrap_or(Json::Null))
            }
            other => return Err(format!("can't index item of type {}", other.kind())),
        };
    }

    Ok(current)
}

/// Operands printed back to back, with a space between two operands when
/// neither is a string.
fn print(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !arg.is_text() && !args[i - 1].is_text() {
            out.push(' ');
        }
        out.push_str(&arg.to_display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        FuncMap::with_helpers().call(name, args)
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(call("upper", &["abc".into()]).unwrap(), Value::from("ABC"));
        assert_eq!(call("lower", &["ABC".into()]).unwrap(), Value::from("abc"));
        assert_eq!(
            call("title", &["john doe-smith".into()]).unwrap(),
            Value::from("John Doe-Smith")
        );
        assert_eq!(call("trim", &["  hi \n".into()]).unwrap(), Value::from("hi"));
    }

    #[test]
    fn test_helpers_are_idempotent() {
        for input in ["MiXeD case", "  padded  ", "", "ünïcødé"] {
            let once = call("upper", &[input.into()]).unwrap();
            let twice = call("upper", &[once.clone()]).unwrap();
            assert_eq!(once, twice);

            let once = call("trim", &[input.into()]).unwrap();
            let twice = call("trim", &[once.clone()]).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_contains_and_replace() {
        assert_eq!(
            call("contains", &["tixgo rocks".into(), "rock".into()]).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            call("replace", &["a-b-c".into(), "-".into(), "+".into()]).unwrap(),
            Value::from("a+b+c")
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(
            call("default", &["User".into(), Value::nil()]).unwrap(),
            Value::from("User")
        );
        assert_eq!(
            call("default", &["User".into(), "".into()]).unwrap(),
            Value::from("User")
        );
        assert_eq!(
            call("default", &["User".into(), "Ann".into()]).unwrap(),
            Value::from("Ann")
        );
        assert_eq!(
            call("default", &["x".into(), Value::from(json!(0))]).unwrap(),
            Value::from(json!(0))
        );
    }

    #[test]
    fn test_safe_markers() {
        assert_eq!(
            call("safeHTML", &["<b>".into()]).unwrap(),
            Value::Html("<b>".to_string())
        );
        assert_eq!(
            call("safeURL", &["javascript:void(0)".into()]).unwrap(),
            Value::Url("javascript:void(0)".to_string())
        );
    }

    #[test]
    fn test_wrong_arity_and_type() {
        let err = call("upper", &["a".into(), "b".into()]).unwrap_err();
        assert!(err.contains("wrong number of args for upper"));

        let err = call("upper", &[Value::from(json!(5))]).unwrap_err();
        assert!(err.contains("expected string"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            call("eq", &["a".into(), "b".into(), "a".into()]).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            call("lt", &[Value::from(json!(1)), Value::from(json!(2.5))]).unwrap(),
            Value::from(true)
        );
        assert_eq!(call("eq", &[Value::nil(), "a".into()]).unwrap(), Value::from(false));
        assert!(call("lt", &["a".into(), Value::from(json!(1))]).is_err());
    }

    #[test]
    fn test_len_index_print() {
        assert_eq!(call("len", &["héllo".into()]).unwrap(), Value::from(5usize));
        assert_eq!(
            call("index", &[Value::from(json!(["a", "b"])), Value::from(json!(1))]).unwrap(),
            Value::from("b")
        );
        assert_eq!(
            call("index", &[Value::from(json!({"k": {"n": 3}})), "k".into(), "n".into()])
                .unwrap(),
            Value::from(json!(3))
        );
        assert!(call("index", &[Value::from(json!([1])), Value::from(json!(4))]).is_err());
        assert_eq!(
            call("print", &[Value::from(json!(1)), Value::from(json!(2)), "x".into()]).unwrap(),
            Value::from("1 2x")
        );
    }

    #[test]
    fn test_contains_lazy_builtins() {
        let map = FuncMap::builtins();
        assert!(map.contains("and"));
        assert!(map.contains("or"));
        assert!(!map.contains("upper"));
        assert!(FuncMap::with_helpers().contains("upper"));
    }
}
