//! Number, boolean and date built-ins.

use super::{arg, Builtin};
use crate::render::Environment;
use crate::value::{Date, DateKind, Number, Value};
use crate::{Error, Result};

pub(super) static BUILTINS: &[Builtin] = &[
    Builtin::pure("abs", (0, 0), abs),
    Builtin::pure("round", (0, 0), round),
    Builtin::pure("floor", (0, 0), floor),
    Builtin::pure("ceiling", (0, 0), ceiling),
    Builtin::pure("int", (0, 0), int),
    Builtin::pure("is_infinite", (0, 0), is_infinite),
    Builtin::pure("is_nan", (0, 0), is_nan),
    Builtin::pure("then", (2, 2), then),
    Builtin::pure("date", (0, 0), date),
    Builtin::pure("time", (0, 0), time),
    Builtin::pure("datetime", (0, 0), datetime),
    Builtin::pure("long", (0, 0), long),
];

fn abs(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let n = match env.to_number(&v)? {
        Number::Int(i) => i
            .checked_abs()
            .map_or(Number::Float((i as f64).abs()), Number::Int),
        Number::Float(f) => Number::Float(f.abs()),
    };
    Ok(Value::Number(n))
}

/// Converts a float that was already rounded to an integral value.
fn integral(f: f64) -> Result<Number> {
    if !f.is_finite() {
        return Err(Error::invalid(format!("cannot convert {f} to a whole number")));
    }
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(Number::Int(f as i64))
    } else {
        Ok(Number::Float(f))
    }
}

fn rounded(env: &Environment<'_>, v: &Value, f: fn(f64) -> f64) -> Result<Value> {
    match env.to_number(v)? {
        Number::Int(i) => Ok(Value::int(i)),
        Number::Float(x) => Ok(Value::Number(integral(f(x))?)),
    }
}

/// Rounds half up, so `-1.5` becomes `-1`.
fn round(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    rounded(env, &v, |x| (x + 0.5).floor())
}

fn floor(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    rounded(env, &v, f64::floor)
}

fn ceiling(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    rounded(env, &v, f64::ceil)
}

/// Drops the fraction, rounding toward zero.
fn int(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    rounded(env, &v, f64::trunc)
}

fn is_infinite(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(env.to_number(&v)?.as_f64().is_infinite()))
}

fn is_nan(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(env.to_number(&v)?.as_f64().is_nan()))
}

/// `cond?then(a, b)`
fn then(env: &mut Environment<'_>, v: Value, args: Vec<Value>) -> Result<Value> {
    let b = env.to_bool(&v)?;
    Ok(arg(&args, if b { 0 } else { 1 })?.clone())
}

fn with_kind(env: &Environment<'_>, v: &Value, kind: DateKind) -> Result<Value> {
    Ok(Value::Date(env.to_date(v)?.with_kind(kind)))
}

fn date(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    with_kind(env, &v, DateKind::Date)
}

fn time(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    with_kind(env, &v, DateKind::Time)
}

fn datetime(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    with_kind(env, &v, DateKind::DateTime)
}

/// Milliseconds since the epoch.
fn long(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let Date { millis, .. } = env.to_date(&v)?;
    Ok(Value::int(millis))
}
