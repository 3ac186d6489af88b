//! Built-ins that observe their target unevaluated: the existence tests and
//! the loop-variable built-ins.

use super::Builtin;
use crate::render::{Environment, Exec};
use crate::types::expr::{Expr, ExprKind};
use crate::value::{Capabilities, Value};
use crate::Error;

pub(super) static BUILTINS: &[Builtin] = &[
    Builtin::unevaluated("exists", (0, 0), exists),
    Builtin::unevaluated("has_content", (0, 0), has_content),
    Builtin::unevaluated("if_exists", (0, 0), if_exists),
    Builtin::unevaluated("default", (1, usize::MAX), default),
    Builtin::unevaluated("index", (0, 0), index),
    Builtin::unevaluated("counter", (0, 0), counter),
    Builtin::unevaluated("has_next", (0, 0), has_next),
    Builtin::unevaluated("is_first", (0, 0), is_first),
    Builtin::unevaluated("is_last", (0, 0), is_last),
    Builtin::unevaluated("item_parity", (0, 0), item_parity),
    Builtin::unevaluated("item_cycle", (1, usize::MAX), item_cycle),
    Builtin::unevaluated("is_even_item", (0, 0), is_even_item),
    Builtin::unevaluated("is_odd_item", (0, 0), is_odd_item),
];

fn exists(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(env.evaluate_optional(target)?.is_some()))
}

/// Present and not an empty string, sequence or hash.
fn has_content(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    let Some(value) = env.evaluate_optional(target)? else {
        return Ok(Value::Bool(false));
    };
    let empty = match &value {
        Value::String(s) => s.is_empty(),
        v if v.is(Capabilities::SEQUENCE) => env.to_sequence(v)?.is_empty(),
        v if v.is(Capabilities::ENUMERABLE_HASH) => env.to_entries(v)?.is_empty(),
        _ => false,
    };
    Ok(Value::Bool(!empty))
}

fn if_exists(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(env
        .evaluate_optional(target)?
        .unwrap_or_else(|| Value::String(String::new())))
}

/// `x?default(a, b, ...)` yields the first present value.
fn default(env: &mut Environment<'_>, target: &Expr, args: &[Expr]) -> Exec<Value> {
    for expr in std::iter::once(target).chain(args) {
        if let Some(value) = env.evaluate_optional(expr)? {
            return Ok(value);
        }
    }
    Err(Error::undefined(format!("`{target}` and all of its defaults are missing")).into())
}

/// Where the loop bound to the target variable currently is.
struct Position {
    index: usize,
    has_next: bool,
}

fn position(env: &Environment<'_>, target: &Expr, name: &str) -> Exec<Position> {
    let ExprKind::Variable(var) = &target.kind else {
        return Err(Error::invalid(format!(
            "`?{name}` must be applied to a loop variable, not `{target}`"
        ))
        .into());
    };
    let state = env.stack.loop_state(var).ok_or_else(|| {
        Error::invalid(format!("`?{name}`: `{var}` is not a loop variable here"))
    })?;
    Ok(Position {
        index: state.index(),
        has_next: state.has_next(),
    })
}

fn index(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::from(position(env, target, "index")?.index))
}

fn counter(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::from(position(env, target, "counter")?.index + 1))
}

fn has_next(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(position(env, target, "has_next")?.has_next))
}

fn is_first(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(position(env, target, "is_first")?.index == 0))
}

fn is_last(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(!position(env, target, "is_last")?.has_next))
}

/// Parity of the one-based counter, so the first item is `"odd"`.
fn item_parity(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    let odd = position(env, target, "item_parity")?.index % 2 == 0;
    Ok(Value::from(if odd { "odd" } else { "even" }))
}

fn is_odd_item(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(position(env, target, "is_odd_item")?.index % 2 == 0))
}

fn is_even_item(env: &mut Environment<'_>, target: &Expr, _: &[Expr]) -> Exec<Value> {
    Ok(Value::Bool(position(env, target, "is_even_item")?.index % 2 == 1))
}

/// Only the selected argument is evaluated.
fn item_cycle(env: &mut Environment<'_>, target: &Expr, args: &[Expr]) -> Exec<Value> {
    let index = position(env, target, "item_cycle")?.index;
    env.eval(&args[index % args.len()])
}
