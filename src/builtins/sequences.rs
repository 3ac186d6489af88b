//! Sequence built-ins.

use std::cmp::Ordering;

use super::{arg, index_value, string_arg, usize_arg, Builtin};
use crate::render::Environment;
use crate::types::expr::CompareOp;
use crate::value::{Capabilities, Value};
use crate::{Error, Result};

pub(super) static BUILTINS: &[Builtin] = &[
    Builtin::pure("size", (0, 0), size),
    Builtin::pure("first", (0, 0), first),
    Builtin::pure("last", (0, 0), last),
    Builtin::pure("reverse", (0, 0), reverse),
    Builtin::pure("join", (1, 3), join),
    Builtin::pure("sort", (0, 0), sort),
    Builtin::pure("sort_by", (1, 1), sort_by),
    Builtin::pure("seq_contains", (1, 1), seq_contains),
    Builtin::pure("seq_index_of", (1, 1), seq_index_of),
    Builtin::pure("chunk", (1, 2), chunk),
    Builtin::pure("min", (0, 0), min),
    Builtin::pure("max", (0, 0), max),
];

/// The number of elements of a sequence or entries of a hash.
fn size(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    if v.is(Capabilities::SEQUENCE) {
        return Ok(Value::from(env.to_sequence(&v)?.len()));
    }
    if v.is(Capabilities::ENUMERABLE_HASH) {
        return Ok(Value::from(env.to_entries(&v)?.len()));
    }
    Err(Error::expected("sequence or hash", v.kind_name()))
}

fn first(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    env.to_sequence(&v)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::undefined("`?first` of an empty sequence"))
}

fn last(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    env.to_sequence(&v)?
        .pop()
        .ok_or_else(|| Error::undefined("`?last` of an empty sequence"))
}

fn reverse(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let mut list = env.to_sequence(&v)?;
    list.reverse();
    Ok(Value::List(list))
}

/// `seq?join(sep, empty, suffix)`: `empty` is written for an empty sequence
/// and `suffix` after a non-empty one.
fn join(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let list = env.to_sequence(&v)?;
    let sep = string_arg(env, &args, 0)?;
    if list.is_empty() {
        return match args.len() {
            1 => Ok(Value::String(String::new())),
            _ => Ok(Value::String(string_arg(env, &args, 1)?)),
        };
    }
    let mut out = String::new();
    for (i, item) in list.iter().filter(|item| !item.is_null()).enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&env.to_scalar(item)?);
    }
    if args.len() == 3 {
        out.push_str(&string_arg(env, &args, 2)?);
    }
    Ok(Value::String(out))
}

fn ordering(env: &Environment<'_>, a: &Value, b: &Value) -> Result<Ordering> {
    if env.compare(a, b, CompareOp::Lt)? {
        Ok(Ordering::Less)
    } else if env.compare(a, b, CompareOp::Gt)? {
        Ok(Ordering::Greater)
    } else {
        Ok(Ordering::Equal)
    }
}

/// Sorts by a fallible key comparison, reporting the first failure.
fn sort_values(
    env: &Environment<'_>,
    list: &mut [(Value, Value)],
) -> Result<()> {
    let mut err = None;
    list.sort_by(|(a, _), (b, _)| match ordering(env, a, b) {
        Ok(ord) => ord,
        Err(e) => {
            err.get_or_insert(e);
            Ordering::Equal
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn sort(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let mut keyed: Vec<_> = env
        .to_sequence(&v)?
        .into_iter()
        .map(|item| (item.clone(), item))
        .collect();
    sort_values(env, &mut keyed)?;
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// Sorts hashes by a key, or by a path of keys given as a sequence.
fn sort_by(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let path = match arg(&args, 0)? {
        Value::List(keys) => keys
            .iter()
            .map(|k| env.to_scalar(k))
            .collect::<Result<Vec<_>>>()?,
        key => vec![env.to_scalar(key)?],
    };
    let mut keyed = Vec::new();
    for item in env.to_sequence(&v)? {
        let mut key = item.clone();
        for name in &path {
            key = env.member(&key, name)?.ok_or_else(|| {
                Error::undefined(format!("`?sort_by` key `{name}` is missing from an item"))
            })?;
        }
        keyed.push((key, item));
    }
    sort_values(env, &mut keyed)?;
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// Values of incomparable types are simply not equal.
fn position(env: &Environment<'_>, list: &[Value], needle: &Value) -> Option<usize> {
    list.iter()
        .position(|item| env.compare(item, needle, CompareOp::Eq).unwrap_or(false))
}

fn seq_contains(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let list = env.to_sequence(&v)?;
    Ok(Value::Bool(position(env, &list, arg(&args, 0)?).is_some()))
}

fn seq_index_of(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let list = env.to_sequence(&v)?;
    Ok(index_value(position(env, &list, arg(&args, 0)?)))
}

/// Splits a sequence into sequences of `size`; the last one is padded with
/// the optional filler.
fn chunk(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let list = env.to_sequence(&v)?;
    let size = usize_arg(env, &args, 0)?;
    if size == 0 {
        return Err(Error::invalid("`?chunk` size must be at least 1"));
    }
    let filler = args.get(1);
    Ok(list
        .chunks(size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            if let Some(filler) = filler {
                chunk.resize(size, filler.clone());
            }
            Value::List(chunk)
        })
        .collect())
}

fn extreme(env: &Environment<'_>, v: &Value, want: Ordering, name: &str) -> Result<Value> {
    let mut best: Option<Value> = None;
    for item in env.to_sequence(v)? {
        if item.is_null() {
            continue;
        }
        best = match best {
            Some(b) if ordering(env, &item, &b)? != want => Some(b),
            _ => Some(item),
        };
    }
    best.ok_or_else(|| Error::undefined(format!("`?{name}` of an empty sequence")))
}

fn min(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    extreme(env, &v, Ordering::Less, "min")
}

fn max(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    extreme(env, &v, Ordering::Greater, "max")
}
