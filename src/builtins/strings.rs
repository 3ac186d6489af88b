//! String built-ins.

use std::fmt::Write;

use super::{arg, index_value, int_arg, string_arg, usize_arg, Builtin};
use crate::render::Environment;
use crate::value::{Number, Value};
use crate::{Error, Result};

pub(super) static BUILTINS: &[Builtin] = &[
    Builtin::pure("upper_case", (0, 0), upper_case),
    Builtin::pure("lower_case", (0, 0), lower_case),
    Builtin::pure("cap_first", (0, 0), cap_first),
    Builtin::pure("uncap_first", (0, 0), uncap_first),
    Builtin::pure("capitalize", (0, 0), capitalize),
    Builtin::pure("trim", (0, 0), trim),
    Builtin::pure("length", (0, 0), length),
    Builtin::pure("html", (0, 0), html),
    Builtin::pure("xml", (0, 0), xml),
    Builtin::pure("url", (0, 0), url),
    Builtin::pure("j_string", (0, 0), j_string),
    Builtin::pure("js_string", (0, 0), js_string),
    Builtin::pure("json_string", (0, 0), json_string),
    Builtin::pure("contains", (1, 1), contains),
    Builtin::pure("starts_with", (1, 1), starts_with),
    Builtin::pure("ends_with", (1, 1), ends_with),
    Builtin::pure("index_of", (1, 2), index_of),
    Builtin::pure("last_index_of", (1, 1), last_index_of),
    Builtin::pure("replace", (2, 2), replace),
    Builtin::pure("split", (1, 1), split),
    Builtin::pure("substring", (1, 2), substring),
    Builtin::pure("left_pad", (1, 2), left_pad),
    Builtin::pure("right_pad", (1, 2), right_pad),
    Builtin::pure("keep_before", (1, 1), keep_before),
    Builtin::pure("keep_after", (1, 1), keep_after),
    Builtin::pure("remove_beginning", (1, 1), remove_beginning),
    Builtin::pure("remove_ending", (1, 1), remove_ending),
    Builtin::pure("ensure_starts_with", (1, 1), ensure_starts_with),
    Builtin::pure("ensure_ends_with", (1, 1), ensure_ends_with),
    Builtin::pure("word_list", (0, 0), word_list),
    Builtin::pure("number", (0, 0), number),
    Builtin::pure("boolean", (0, 0), boolean),
    Builtin::pure("string", (0, 2), string),
    Builtin::pure("c", (0, 0), c),
];

fn upper_case(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(env.to_scalar(&v)?.to_uppercase()))
}

fn lower_case(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(env.to_scalar(&v)?.to_lowercase()))
}

fn map_first(s: &str, f: impl FnOnce(char) -> String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => f(c) + chars.as_str(),
        None => String::new(),
    }
}

fn cap_first(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::String(map_first(&s, |c| c.to_uppercase().collect())))
}

fn uncap_first(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::String(map_first(&s, |c| c.to_lowercase().collect())))
}

/// Upper cases the first letter of every word and lower cases the rest.
fn capitalize(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let mut out = String::with_capacity(s.len());
    let mut start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            start = true;
            out.push(c);
        } else if start {
            start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    Ok(Value::String(out))
}

fn trim(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::from(env.to_scalar(&v)?.trim()))
}

fn length(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::from(env.to_scalar(&v)?.chars().count()))
}

fn html(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::String(escape_markup(&s, "&#39;")))
}

fn xml(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::String(escape_markup(&s, "&apos;")))
}

fn escape_markup(s: &str, apos: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str(apos),
            c => out.push(c),
        }
    }
    out
}

/// Percent encodes everything except the unreserved characters.
fn url(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    Ok(Value::String(out))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Java,
    JavaScript,
    Json,
}

fn escape_string(s: &str, quoting: Quoting) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = None;
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\'' if quoting == Quoting::JavaScript => out.push_str("\\'"),
            '/' if quoting != Quoting::Java && prev == Some('<') => out.push_str("\\/"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
        prev = Some(c);
    }
    out
}

fn j_string(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(escape_string(&env.to_scalar(&v)?, Quoting::Java)))
}

fn js_string(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(escape_string(&env.to_scalar(&v)?, Quoting::JavaScript)))
}

fn json_string(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(escape_string(&env.to_scalar(&v)?, Quoting::Json)))
}

fn contains(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::Bool(s.contains(&string_arg(env, &args, 0)?)))
}

fn starts_with(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::Bool(s.starts_with(&string_arg(env, &args, 0)?)))
}

fn ends_with(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(Value::Bool(s.ends_with(&string_arg(env, &args, 0)?)))
}

fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// The character index of the first occurrence, searching from an optional
/// start index, or -1.
fn index_of(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let needle = string_arg(env, &args, 0)?;
    let from = match args.len() {
        2 => byte_index(&s, usize::try_from(int_arg(env, &args, 1)?).unwrap_or(0)),
        _ => 0,
    };
    let found = s[from..].find(&needle).map(|i| char_index(&s, from + i));
    Ok(index_value(found))
}

fn last_index_of(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let needle = string_arg(env, &args, 0)?;
    Ok(index_value(s.rfind(&needle).map(|i| char_index(&s, i))))
}

fn replace(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let from = string_arg(env, &args, 0)?;
    let to = string_arg(env, &args, 1)?;
    if from.is_empty() {
        return Err(Error::invalid("`?replace` needs a non-empty string to replace"));
    }
    Ok(Value::String(s.replace(&from, &to)))
}

fn split(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let sep = string_arg(env, &args, 0)?;
    if sep.is_empty() {
        return Ok(s.chars().map(|c| Value::String(c.to_string())).collect());
    }
    Ok(s.split(sep.as_str()).map(Value::from).collect())
}

/// `s?substring(from, to)`, by character index; `to` is exclusive.
fn substring(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let len = s.chars().count();
    let from = usize_arg(env, &args, 0)?;
    let to = match args.len() {
        2 => usize_arg(env, &args, 1)?,
        _ => len,
    };
    if from > to || to > len {
        return Err(Error::invalid(format!(
            "substring indexes {from}..{to} are out of bounds for length {len}"
        )));
    }
    Ok(Value::String(s.chars().skip(from).take(to - from).collect()))
}

fn padding(env: &Environment<'_>, s: &str, args: &[Value]) -> Result<String> {
    let width = usize_arg(env, args, 0)?;
    let pad = match args.len() {
        2 => string_arg(env, args, 1)?,
        _ => String::from(" "),
    };
    if pad.is_empty() {
        return Err(Error::invalid("padding string must not be empty"));
    }
    let missing = width.saturating_sub(s.chars().count());
    Ok(pad.chars().cycle().take(missing).collect())
}

fn left_pad(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let pad = padding(env, &s, &args)?;
    Ok(Value::String(pad + &s))
}

fn right_pad(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let pad = padding(env, &s, &args)?;
    Ok(Value::String(s + &pad))
}

fn keep_before(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let sep = string_arg(env, &args, 0)?;
    let before = s.split_once(sep.as_str()).map_or(s.as_str(), |(b, _)| b);
    Ok(Value::from(before))
}

fn keep_after(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let sep = string_arg(env, &args, 0)?;
    Ok(Value::from(s.split_once(sep.as_str()).map_or("", |(_, after)| after)))
}

fn remove_beginning(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let prefix = string_arg(env, &args, 0)?;
    Ok(Value::from(s.strip_prefix(prefix.as_str()).unwrap_or(&s)))
}

fn remove_ending(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let suffix = string_arg(env, &args, 0)?;
    Ok(Value::from(s.strip_suffix(suffix.as_str()).unwrap_or(&s)))
}

fn ensure_starts_with(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let prefix = string_arg(env, &args, 0)?;
    if s.starts_with(&prefix) {
        return Ok(Value::String(s));
    }
    Ok(Value::String(prefix + &s))
}

fn ensure_ends_with(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    let suffix = string_arg(env, &args, 0)?;
    if s.ends_with(&suffix) {
        return Ok(Value::String(s));
    }
    Ok(Value::String(s + &suffix))
}

fn word_list(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let s = env.to_scalar(&v)?;
    Ok(s.split_whitespace().map(Value::from).collect())
}

/// Parses a string as a number; numbers pass through.
fn number(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    if let Ok(n) = env.to_number(&v) {
        return Ok(Value::Number(n));
    }
    let s = env.to_scalar(&v)?;
    let t = s.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Ok(Value::Number(Number::Int(i)));
    }
    match t.parse::<f64>() {
        Ok(f) if !t.is_empty() => Ok(Value::Number(Number::Float(f))),
        _ => Err(Error::invalid(format!("cannot convert \"{s}\" to a number"))),
    }
}

fn boolean(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    if let Ok(b) = env.to_bool(&v) {
        return Ok(Value::Bool(b));
    }
    match env.to_scalar(&v)?.as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        s => Err(Error::invalid(format!("cannot convert \"{s}\" to a boolean"))),
    }
}

/// Converts to a string with the current settings.
///
/// `b?string("yes", "no")` picks a word for a boolean; `n?string("0.00")` and
/// `d?string("yyyy-MM-dd")` format with an explicit pattern.
fn string(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    match (args.len(), &v) {
        (0, _) => Ok(Value::String(env.to_scalar(&v)?)),
        (2, _) => {
            let b = env.to_bool(&v)?;
            Ok(arg(&args, if b { 0 } else { 1 })?.clone())
        }
        (_, Value::Date(d)) => {
            let pattern = string_arg(env, &args, 0)?;
            Ok(Value::String(env.format_date_with(*d, &pattern)?))
        }
        (_, _) => {
            let n = env.to_number(&v)?;
            let pattern = string_arg(env, &args, 0)?;
            Ok(Value::String(env.format_number_with(n, &pattern)?))
        }
    }
}

/// Formats for computer consumption, independent of the settings.
fn c(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    match v {
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::String(s) => Ok(Value::String(s)),
        other => {
            if let Ok(n) = env.to_number(&other) {
                return Ok(Value::String(n.to_string()));
            }
            Err(Error::expected("string, number or boolean", other.kind_name()))
        }
    }
}
