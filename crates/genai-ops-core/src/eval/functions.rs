//! The closed built-in function library.
//!
//! Functions are strict: the evaluator only calls them with wholly-known
//! arguments and returns `Unknown` itself otherwise.

use std::collections::HashMap;

use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, DynamicValue, ValueMap};

/// Signature of every built-in.
pub type BuiltinFn = fn(&[DynamicValue]) -> EvalResult<DynamicValue>;

/// Fixed set of functions callable from configuration expressions.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, BuiltinFn>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FunctionRegistry {
    /// The standard library available to every resolution.
    pub fn builtin() -> Self {
        let entries: [(&'static str, BuiltinFn); 23] = [
            ("format", format),
            ("lookup", lookup),
            ("merge", merge),
            ("join", join),
            ("contains", contains),
            ("keys", keys),
            ("values", values),
            ("flatten", flatten),
            ("distinct", distinct),
            ("length", length),
            ("concat", concat),
            ("lower", lower),
            ("upper", upper),
            ("replace", replace),
            ("split", split),
            ("coalesce", coalesce),
            ("element", element),
            ("zipmap", zipmap),
            ("tostring", tostring),
            ("tonumber", tonumber),
            ("tolist", tolist),
            ("toset", distinct),
            ("tomap", tomap),
        ];
        Self {
            functions: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call `name` with already-evaluated arguments.
    pub fn call(&self, name: &str, args: &[DynamicValue]) -> EvalResult<DynamicValue> {
        let function = self
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        function(args)
    }

    /// Names of all registered functions, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn arity(
    function: &'static str,
    args: &[DynamicValue],
    expected: &'static str,
    ok: bool,
) -> EvalResult<()> {
    if ok {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function,
            expected,
            actual: args.len(),
        })
    }
}

fn expect_str<'a>(value: &'a DynamicValue) -> EvalResult<&'a str> {
    value.as_str().ok_or(EvalError::TypeMismatch {
        expected: "string",
        found: value.type_name(),
    })
}

fn expect_list(value: &DynamicValue) -> EvalResult<&[DynamicValue]> {
    value.as_list().ok_or(EvalError::TypeMismatch {
        expected: "list",
        found: value.type_name(),
    })
}

fn expect_object(value: &DynamicValue) -> EvalResult<&ValueMap> {
    value.as_object().ok_or(EvalError::TypeMismatch {
        expected: "object",
        found: value.type_name(),
    })
}

fn expect_number(value: &DynamicValue) -> EvalResult<f64> {
    value.as_f64().ok_or(EvalError::TypeMismatch {
        expected: "number",
        found: value.type_name(),
    })
}

fn primitive_string(value: &DynamicValue) -> EvalResult<String> {
    value.to_template_string().ok_or(EvalError::TypeMismatch {
        expected: "string",
        found: value.type_name(),
    })
}

/// `format(template, args...)` with the `%s %d %f %v %q %%` verbs.
fn format(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("format", args, "at least 1", !args.is_empty())?;
    let template = expect_str(&args[0])?;
    let mut rest = args[1..].iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars.next().ok_or_else(|| EvalError::InvalidArgument {
            function: "format",
            reason: "format string ends with a bare %".to_string(),
        })?;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = rest.next().ok_or_else(|| EvalError::InvalidArgument {
            function: "format",
            reason: format!("not enough arguments for verb %{verb}"),
        })?;
        match verb {
            's' => out.push_str(&primitive_string(arg)?),
            'd' => {
                let n = expect_number(arg)?;
                if n.fract() != 0.0 {
                    return Err(EvalError::InvalidArgument {
                        function: "format",
                        reason: format!("%d requires a whole number, got {n}"),
                    });
                }
                out.push_str(&format_number(n));
            }
            'f' => out.push_str(&format!("{:.6}", expect_number(arg)?)),
            'v' => match arg.to_template_string() {
                Some(s) => out.push_str(&s),
                None => out.push_str(&arg.to_json().to_string()),
            },
            'q' => out.push_str(&serde_json::Value::String(primitive_string(arg)?).to_string()),
            other => {
                return Err(EvalError::InvalidArgument {
                    function: "format",
                    reason: format!("unsupported verb %{other}"),
                })
            }
        }
    }

    Ok(DynamicValue::String(out))
}

/// `lookup(map, key[, default])`.
fn lookup(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("lookup", args, "2 or 3", args.len() == 2 || args.len() == 3)?;
    let map = expect_object(&args[0])?;
    let key = primitive_string(&args[1])?;
    match map.get(&key) {
        Some(value) => Ok(value.clone()),
        None => args.get(2).cloned().ok_or(EvalError::MissingKey(key)),
    }
}

/// `merge(maps...)`: later arguments win; null arguments are skipped.
fn merge(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    let mut merged = ValueMap::new();
    for arg in args {
        if arg.is_null() {
            continue;
        }
        for (key, value) in expect_object(arg)? {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(DynamicValue::Object(merged))
}

/// `join(separator, lists...)`.
fn join(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("join", args, "at least 2", args.len() >= 2)?;
    let separator = expect_str(&args[0])?;
    let mut parts = Vec::new();
    for list in &args[1..] {
        for item in expect_list(list)? {
            parts.push(primitive_string(item)?);
        }
    }
    Ok(DynamicValue::String(parts.join(separator)))
}

fn contains(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("contains", args, "2", args.len() == 2)?;
    let list = expect_list(&args[0])?;
    Ok(DynamicValue::Bool(list.contains(&args[1])))
}

fn keys(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("keys", args, "1", args.len() == 1)?;
    let map = expect_object(&args[0])?;
    Ok(DynamicValue::List(
        map.keys().map(|k| DynamicValue::string(k.as_str())).collect(),
    ))
}

fn values(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("values", args, "1", args.len() == 1)?;
    let map = expect_object(&args[0])?;
    Ok(DynamicValue::List(map.values().cloned().collect()))
}

fn flatten(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("flatten", args, "1", args.len() == 1)?;
    fn flatten_into(items: &[DynamicValue], out: &mut Vec<DynamicValue>) {
        for item in items {
            match item {
                DynamicValue::List(inner) => flatten_into(inner, out),
                other => out.push(other.clone()),
            }
        }
    }
    let mut out = Vec::new();
    flatten_into(expect_list(&args[0])?, &mut out);
    Ok(DynamicValue::List(out))
}

/// `distinct(list)` keeps the first occurrence of each element.
fn distinct(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("distinct", args, "1", args.len() == 1)?;
    let mut out: Vec<DynamicValue> = Vec::new();
    for item in expect_list(&args[0])? {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Ok(DynamicValue::List(out))
}

fn length(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("length", args, "1", args.len() == 1)?;
    let len = match &args[0] {
        DynamicValue::List(items) => items.len(),
        DynamicValue::Object(members) => members.len(),
        DynamicValue::String(s) => s.chars().count(),
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "list, object or string",
                found: other.type_name(),
            })
        }
    };
    Ok(DynamicValue::Number(len as f64))
}

fn concat(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    let mut out = Vec::new();
    for list in args {
        out.extend(expect_list(list)?.iter().cloned());
    }
    Ok(DynamicValue::List(out))
}

fn lower(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("lower", args, "1", args.len() == 1)?;
    Ok(DynamicValue::String(expect_str(&args[0])?.to_lowercase()))
}

fn upper(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("upper", args, "1", args.len() == 1)?;
    Ok(DynamicValue::String(expect_str(&args[0])?.to_uppercase()))
}

fn replace(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("replace", args, "3", args.len() == 3)?;
    let subject = expect_str(&args[0])?;
    let search = expect_str(&args[1])?;
    let replacement = expect_str(&args[2])?;
    if search.is_empty() {
        return Ok(DynamicValue::string(subject));
    }
    Ok(DynamicValue::String(subject.replace(search, replacement)))
}

fn split(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("split", args, "2", args.len() == 2)?;
    let separator = expect_str(&args[0])?;
    let subject = expect_str(&args[1])?;
    if subject.is_empty() {
        return Ok(DynamicValue::List(vec![DynamicValue::string("")]));
    }
    // an empty separator splits into characters
    if separator.is_empty() {
        return Ok(DynamicValue::List(
            subject.chars().map(DynamicValue::string).collect(),
        ));
    }
    Ok(DynamicValue::List(
        subject.split(separator).map(DynamicValue::from).collect(),
    ))
}

/// `coalesce(args...)`: first argument that is neither null nor `""`.
fn coalesce(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    args.iter()
        .find(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
        .ok_or_else(|| EvalError::InvalidArgument {
            function: "coalesce",
            reason: "no non-null, non-empty argument".to_string(),
        })
}

/// `element(list, index)` wraps around the list length.
fn element(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("element", args, "2", args.len() == 2)?;
    let list = expect_list(&args[0])?;
    let index = expect_number(&args[1])?;
    if list.is_empty() {
        return Err(EvalError::IndexOutOfRange {
            index: index as i64,
            len: 0,
        });
    }
    if index < 0.0 {
        return Err(EvalError::IndexOutOfRange {
            index: index as i64,
            len: list.len(),
        });
    }
    Ok(list[(index as usize) % list.len()].clone())
}

fn zipmap(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("zipmap", args, "2", args.len() == 2)?;
    let keys = expect_list(&args[0])?;
    let values = expect_list(&args[1])?;
    if keys.len() != values.len() {
        return Err(EvalError::InvalidArgument {
            function: "zipmap",
            reason: format!("{} keys but {} values", keys.len(), values.len()),
        });
    }
    let mut out = ValueMap::new();
    for (key, value) in keys.iter().zip(values) {
        out.insert(primitive_string(key)?, value.clone());
    }
    Ok(DynamicValue::Object(out))
}

fn tostring(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("tostring", args, "1", args.len() == 1)?;
    if args[0].is_null() {
        return Ok(DynamicValue::Null);
    }
    Ok(DynamicValue::String(primitive_string(&args[0])?))
}

fn tonumber(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("tonumber", args, "1", args.len() == 1)?;
    match &args[0] {
        DynamicValue::Null => Ok(DynamicValue::Null),
        DynamicValue::Number(n) => Ok(DynamicValue::Number(*n)),
        DynamicValue::String(s) => {
            s.trim()
                .parse::<f64>()
                .map(DynamicValue::Number)
                .map_err(|_| EvalError::InvalidArgument {
                    function: "tonumber",
                    reason: format!("cannot convert {s:?} to number"),
                })
        }
        other => Err(EvalError::TypeMismatch {
            expected: "number or string",
            found: other.type_name(),
        }),
    }
}

fn tolist(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("tolist", args, "1", args.len() == 1)?;
    Ok(DynamicValue::List(expect_list(&args[0])?.to_vec()))
}

fn tomap(args: &[DynamicValue]) -> EvalResult<DynamicValue> {
    arity("tomap", args, "1", args.len() == 1)?;
    Ok(DynamicValue::Object(expect_object(&args[0])?.clone()))
}
