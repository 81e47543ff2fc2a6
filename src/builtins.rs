//! Standard globals and primitive methods available to snippet code
//!
//! Globals are resolved after the evaluation scope, so a component library
//! can shadow any of them.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::error::EvalError;
use crate::value::{format_number, Function, NativeFunction, Props, Value};

lazy_static! {
    static ref GLOBALS: HashMap<&'static str, Value> = standard_globals();
    static ref FLOAT_PREFIX_RE: Regex =
        Regex::new(r"^[+-]?(Infinity|\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)").unwrap();
}

/// Longest string `repeat` will build, in bytes
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// Largest array `Array.from` will materialize from an array-like
const MAX_ARRAY_LENGTH: usize = 1 << 24;

pub(crate) fn global(name: &str) -> Option<Value> {
    GLOBALS.get(name).cloned()
}

fn native<F>(name: &str, f: F) -> Value
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Value::from(NativeFunction::new(name, f))
}

fn object(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn standard_globals() -> HashMap<&'static str, Value> {
    let mut globals = HashMap::new();

    globals.insert(
        "Math",
        object(vec![
            ("PI", Value::Number(std::f64::consts::PI)),
            ("max", native("max", |args| Ok(Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max))))),
            ("min", native("min", |args| Ok(Value::Number(fold_numbers(args, f64::INFINITY, f64::min))))),
            ("round", native("round", |args| Ok(Value::Number((arg(args, 0).to_number() + 0.5).floor())))),
            ("floor", native("floor", |args| Ok(Value::Number(arg(args, 0).to_number().floor())))),
            ("ceil", native("ceil", |args| Ok(Value::Number(arg(args, 0).to_number().ceil())))),
            ("abs", native("abs", |args| Ok(Value::Number(arg(args, 0).to_number().abs())))),
            ("sqrt", native("sqrt", |args| Ok(Value::Number(arg(args, 0).to_number().sqrt())))),
            (
                "pow",
                native("pow", |args| {
                    Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
                }),
            ),
        ]),
    );

    globals.insert(
        "String",
        native("String", |args| {
            Ok(Value::String(match args.first() {
                Some(v) => v.to_js_string(),
                None => String::new(),
            }))
        }),
    );
    globals.insert(
        "Number",
        native("Number", |args| {
            Ok(Value::Number(args.first().map(Value::to_number).unwrap_or(0.0)))
        }),
    );
    globals.insert(
        "Boolean",
        native("Boolean", |args| Ok(Value::Bool(arg(args, 0).is_truthy()))),
    );
    globals.insert("parseInt", native("parseInt", |args| Ok(Value::Number(parse_int(&arg(args, 0).to_js_string(), &arg(args, 1))))));
    globals.insert("parseFloat", native("parseFloat", |args| Ok(Value::Number(parse_float(&arg(args, 0).to_js_string())))));

    globals.insert(
        "Array",
        object(vec![
            ("isArray", native("isArray", |args| Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_))))))),
            ("from", native("from", array_from)),
        ]),
    );

    globals.insert(
        "Object",
        object(vec![
            (
                "keys",
                native("keys", |args| {
                    Ok(Value::Array(own_entries(&arg(args, 0)).into_iter().map(|(k, _)| Value::String(k)).collect()))
                }),
            ),
            (
                "values",
                native("values", |args| {
                    Ok(Value::Array(own_entries(&arg(args, 0)).into_iter().map(|(_, v)| v).collect()))
                }),
            ),
            (
                "entries",
                native("entries", |args| {
                    Ok(Value::Array(
                        own_entries(&arg(args, 0))
                            .into_iter()
                            .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                            .collect(),
                    ))
                }),
            ),
            (
                "assign",
                native("assign", |args| {
                    let mut merged = Props::new();
                    for source in args {
                        merged.extend(own_entries(source));
                    }
                    Ok(Value::Object(merged))
                }),
            ),
        ]),
    );

    globals.insert(
        "JSON",
        object(vec![(
            "stringify",
            native("stringify", |args| {
                let Some(json) = args.first().and_then(to_json) else {
                    return Ok(Value::Undefined);
                };
                let pretty = arg(args, 2).to_number() > 0.0;
                let text = if pretty {
                    serde_json::to_string_pretty(&json)
                } else {
                    serde_json::to_string(&json)
                };
                text.map(Value::String)
                    .map_err(|e| EvalError::type_error(e.to_string()))
            }),
        )]),
    );

    globals.insert(
        "console",
        object(vec![
            ("log", native("log", |args| {
                info!(target: "playroom::console", "{}", console_line(args));
                Ok(Value::Undefined)
            })),
            ("warn", native("warn", |args| {
                warn!(target: "playroom::console", "{}", console_line(args));
                Ok(Value::Undefined)
            })),
            ("error", native("error", |args| {
                error!(target: "playroom::console", "{}", console_line(args));
                Ok(Value::Undefined)
            })),
        ]),
    );

    globals
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn parse_int(text: &str, radix_arg: &Value) -> f64 {
    let mut s = text.trim();
    let negative = s.starts_with('-');
    if s.starts_with('-') || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = match radix_arg {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    let hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    if hex_prefix && (radix == 16 || matches!(radix_arg, Value::Undefined) || radix == 0) {
        s = &s[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    match FLOAT_PREFIX_RE.find(text.trim_start()) {
        Some(m) => {
            let matched = m.as_str();
            match matched.trim_start_matches(['+', '-']) {
                "Infinity" if matched.starts_with('-') => f64::NEG_INFINITY,
                "Infinity" => f64::INFINITY,
                _ => matched.parse().unwrap_or(f64::NAN),
            }
        }
        None => f64::NAN,
    }
}

fn array_from(args: &[Value]) -> Result<Value, EvalError> {
    let items: Vec<Value> = match arg(args, 0) {
        Value::Array(items) => items,
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Value::Object(map) => {
            let len = map.get("length").map(Value::to_number).unwrap_or(0.0);
            if len.is_infinite() || len > MAX_ARRAY_LENGTH as f64 {
                return Err(EvalError::range_error("Invalid array length"));
            }
            let len = if len > 0.0 { len as usize } else { 0 };
            (0..len)
                .map(|i| map.get(&i.to_string()).cloned().unwrap_or(Value::Undefined))
                .collect()
        }
        _ => Vec::new(),
    };
    match args.get(1) {
        Some(Value::Function(f)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| f.call(&[item, Value::Number(i as f64)]))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Ok(Value::Array(items)),
    }
}

fn own_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn to_json(value: &Value) -> Option<serde_json::Value> {
    Some(match value {
        Value::Undefined | Value::Function(_) | Value::Component(_) => return None,
        Value::Null | Value::Fragment => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|item| to_json(item).unwrap_or(serde_json::Value::Null))
                .collect(),
        ),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .filter_map(|(k, v)| to_json(v).map(|json| (k.clone(), json)))
                .collect(),
        ),
        Value::Element(el) => serde_json::Value::Object(
            el.props
                .iter()
                .filter_map(|(k, v)| to_json(v).map(|json| (k.clone(), json)))
                .collect(),
        ),
    })
}

fn console_line(args: &[Value]) -> String {
    args.iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => format!("{:?}", other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHODS
// ═══════════════════════════════════════════════════════════════════════════════

/// Call a built-in method on a primitive. `None` means the base has no such
/// method and normal property lookup applies.
pub(crate) fn call_method(base: &Value, key: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    match base {
        Value::Array(items) => array_method(items, key, args),
        Value::String(s) => string_method(s, key, args),
        Value::Number(n) => number_method(*n, key, args),
        _ => None,
    }
}

fn callback(args: &[Value]) -> Result<&Function, EvalError> {
    match args.first() {
        Some(Value::Function(f)) => Ok(f),
        Some(other) => Err(EvalError::type_error(format!(
            "{} is not a function",
            other.to_js_string()
        ))),
        None => Err(EvalError::type_error("undefined is not a function")),
    }
}

/// Resolve a possibly negative `slice` bound against `len`
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number().trunc();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

fn array_method(items: &[Value], key: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let call = |f: &Function, i: usize, item: &Value| {
        f.call(&[item.clone(), Value::Number(i as f64), Value::Array(items.to_vec())])
    };

    let result = match key {
        "map" => callback(args).and_then(|f| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| call(f, i, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }),
        "filter" => callback(args).and_then(|f| {
            let mut kept = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if call(f, i, item)?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::Array(kept))
        }),
        "forEach" => callback(args).and_then(|f| {
            for (i, item) in items.iter().enumerate() {
                call(f, i, item)?;
            }
            Ok(Value::Undefined)
        }),
        "some" => callback(args).and_then(|f| {
            for (i, item) in items.iter().enumerate() {
                if call(f, i, item)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
        "every" => callback(args).and_then(|f| {
            for (i, item) in items.iter().enumerate() {
                if !call(f, i, item)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
        "find" => callback(args).and_then(|f| {
            for (i, item) in items.iter().enumerate() {
                if call(f, i, item)?.is_truthy() {
                    return Ok(item.clone());
                }
            }
            Ok(Value::Undefined)
        }),
        "findIndex" => callback(args).and_then(|f| {
            for (i, item) in items.iter().enumerate() {
                if call(f, i, item)?.is_truthy() {
                    return Ok(Value::Number(i as f64));
                }
            }
            Ok(Value::Number(-1.0))
        }),
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(v) => v.to_js_string(),
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "slice" => {
            let start = relative_index(args.first(), items.len(), 0);
            let end = relative_index(args.get(1), items.len(), items.len());
            Ok(Value::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "includes" => {
            let needle = arg(args, 0);
            Ok(Value::Bool(items.iter().any(|v| v == &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Ok(Value::Number(
                items
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            ))
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(out))
        }
        "reverse" => Ok(Value::Array(items.iter().rev().cloned().collect())),
        "toString" => Ok(Value::String(Value::Array(items.to_vec()).to_js_string())),
        _ => return None,
    };
    Some(result)
}

fn string_method(s: &str, key: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let text = |i: usize| arg(args, i).to_js_string();
    let value = match key {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "includes" => Value::Bool(s.contains(&text(0))),
        "startsWith" => Value::Bool(s.starts_with(&text(0))),
        "endsWith" => Value::Bool(s.ends_with(&text(0))),
        "indexOf" => Value::Number(
            s.find(&text(0))
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ),
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0 } else { i as usize };
            Value::String(s.chars().nth(i).map(String::from).unwrap_or_default())
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::Array(vec![Value::String(s.to_string())]),
            Some(sep) => {
                let sep = sep.to_js_string();
                if sep.is_empty() {
                    Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect())
                } else {
                    Value::Array(s.split(sep.as_str()).map(Value::from).collect())
                }
            }
        },
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(args.first(), chars.len(), 0);
            let end = relative_index(args.get(1), chars.len(), chars.len());
            Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "repeat" => {
            let n = arg(args, 0).to_number();
            if n < 0.0 || n.is_infinite() {
                return Some(Err(EvalError::range_error(format!(
                    "Invalid count value: {}",
                    format_number(n)
                ))));
            }
            let n = if n.is_nan() { 0 } else { n as usize };
            if n > 0 && s.len() > MAX_STRING_LENGTH / n {
                return Some(Err(EvalError::range_error("Invalid string length")));
            }
            Value::String(s.repeat(n))
        }
        "replace" | "replaceAll" => {
            let pattern = text(0);
            let replacement = arg(args, 1);
            let replace_one = |matched: &str| -> Result<String, EvalError> {
                match &replacement {
                    Value::Function(f) => Ok(f.call(&[Value::from(matched)])?.to_js_string()),
                    other => Ok(other.to_js_string()),
                }
            };
            let mut out = String::new();
            let mut rest = s;
            while let Some(pos) = rest.find(pattern.as_str()) {
                out.push_str(&rest[..pos]);
                match replace_one(&pattern) {
                    Ok(r) => out.push_str(&r),
                    Err(e) => return Some(Err(e)),
                }
                rest = &rest[pos + pattern.len()..];
                if key == "replace" || pattern.is_empty() {
                    break;
                }
            }
            out.push_str(rest);
            Value::String(out)
        }
        "toString" => Value::String(s.to_string()),
        _ => return None,
    };
    Some(Ok(value))
}

fn number_method(n: f64, key: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    match key {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            if digits > 100 {
                return Some(Err(EvalError::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                )));
            }
            Some(Ok(Value::String(format!("{:.*}", digits, n))))
        }
        "toString" => Some(Ok(Value::String(format_number(n)))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", &Value::Undefined), 42.0);
        assert_eq!(parse_int("  -7", &Value::Undefined), -7.0);
        assert_eq!(parse_int("ff", &Value::Number(16.0)), 255.0);
        assert_eq!(parse_int("0x1A", &Value::Undefined), 26.0);
        assert!(parse_int("abc", &Value::Undefined).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.5rem"), 3.5);
        assert_eq!(parse_float(".25"), 0.25);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("em").is_nan());
    }

    #[test]
    fn test_math_max_of_nothing() {
        let Some(Value::Object(math)) = global("Math") else {
            panic!("Math missing");
        };
        let Some(Value::Function(max)) = math.get("max") else {
            panic!("Math.max missing");
        };
        assert_eq!(max.call(&[]).unwrap(), Value::Number(f64::NEG_INFINITY));
    }

    #[test]
    fn test_string_split_and_slice() {
        let parts = string_method("a,b,c", "split", &[",".into()]).unwrap().unwrap();
        assert_eq!(parts, Value::Array(vec!["a".into(), "b".into(), "c".into()]));
        let sliced = string_method("hello", "slice", &[Value::Number(-3.0)]).unwrap().unwrap();
        assert_eq!(sliced, Value::from("llo"));
    }

    #[test]
    fn test_replace_first_and_all() {
        let one = string_method("a-b-c", "replace", &["-".into(), "+".into()]).unwrap().unwrap();
        assert_eq!(one, Value::from("a+b-c"));
        let all = string_method("a-b-c", "replaceAll", &["-".into(), "+".into()]).unwrap().unwrap();
        assert_eq!(all, Value::from("a+b+c"));
    }

    #[test]
    fn test_to_fixed() {
        let fixed = number_method(3.14159, "toFixed", &[Value::Number(2.0)]).unwrap().unwrap();
        assert_eq!(fixed, Value::from("3.14"));
    }

    #[test]
    fn test_oversized_results_are_range_errors() {
        for count in [f64::INFINITY, 1e15, -1.0] {
            let result = string_method("ab", "repeat", &[Value::Number(count)]).unwrap();
            assert!(matches!(result, Err(EvalError::Range(_))), "repeat({})", count);
        }
        let repeated = string_method("ab", "repeat", &[Value::Number(3.0)]).unwrap().unwrap();
        assert_eq!(repeated, Value::from("ababab"));

        let huge: Props = [("length".to_string(), Value::Number(1e12))].into_iter().collect();
        assert_eq!(
            array_from(&[Value::Object(huge)]),
            Err(EvalError::range_error("Invalid array length"))
        );
        let infinite: Props = [("length".to_string(), Value::Number(f64::INFINITY))]
            .into_iter()
            .collect();
        assert!(matches!(
            array_from(&[Value::Object(infinite)]),
            Err(EvalError::Range(_))
        ));
        let small: Props = [("length".to_string(), Value::Number(2.0))].into_iter().collect();
        assert_eq!(
            array_from(&[Value::Object(small)]).unwrap(),
            Value::Array(vec![Value::Undefined, Value::Undefined])
        );
    }

    #[test]
    fn test_unknown_method_falls_through() {
        assert!(call_method(&Value::Array(vec![]), "frobnicate", &[]).is_none());
        assert!(call_method(&Value::Null, "map", &[]).is_none());
    }
}
