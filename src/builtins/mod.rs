//! The built-in dispatch table, consulted for `value?name(args)`.
//!
//! Built-ins are resolved once, when the expression is constructed, and the
//! resolved entry is stored on the expression. Most built-ins receive their
//! evaluated target. The [`Input::Unevaluated`] ones receive the target
//! expression instead because they must observe a missing value or the loop
//! a variable belongs to.

mod existence;
mod numbers;
mod sequences;
mod strings;
mod types;

use std::fmt;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::render::{Environment, Exec};
use crate::types::expr::Expr;
use crate::{Error, Result, Value};

/// A built-in taking its evaluated target and arguments.
pub(crate) type ValueFn = fn(&mut Environment<'_>, Value, Vec<Value>) -> Result<Value>;

/// A built-in taking its target and arguments unevaluated.
pub(crate) type UnevaluatedFn = fn(&mut Environment<'_>, &Expr, &[Expr]) -> Exec<Value>;

/// What a built-in receives as its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Value,
    Unevaluated,
}

#[derive(Clone, Copy)]
pub(crate) enum BuiltinFn {
    Value(ValueFn),
    Unevaluated(UnevaluatedFn),
}

/// An entry in the built-in table.
pub struct Builtin {
    name: &'static str,
    input: Input,
    /// Whether the result depends only on the target and arguments, which
    /// makes the built-in eligible for constant folding.
    pure: bool,
    arity: (usize, usize),
    pub(crate) call: BuiltinFn,
}

impl Builtin {
    const fn pure(name: &'static str, arity: (usize, usize), f: ValueFn) -> Self {
        Self {
            name,
            input: Input::Value,
            pure: true,
            arity,
            call: BuiltinFn::Value(f),
        }
    }

    const fn impure(name: &'static str, arity: (usize, usize), f: ValueFn) -> Self {
        Self {
            name,
            input: Input::Value,
            pure: false,
            arity,
            call: BuiltinFn::Value(f),
        }
    }

    const fn unevaluated(name: &'static str, arity: (usize, usize), f: UnevaluatedFn) -> Self {
        Self {
            name,
            input: Input::Unevaluated,
            pure: false,
            arity,
            call: BuiltinFn::Unevaluated(f),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn input(&self) -> Input {
        self.input
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    /// Validates the number of arguments given at the call site.
    pub(crate) fn check_arity(&self, given: usize) -> Result<()> {
        let (min, max) = self.arity;
        if (min..=max).contains(&given) {
            return Ok(());
        }
        let expected = if min == max {
            format!("{min}")
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        Err(Error::invalid(format!(
            "`?{}` takes {expected} argument(s) but {given} were given",
            self.name
        )))
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("pure", &self.pure)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

static TABLE: LazyLock<FxHashMap<&'static str, &'static Builtin>> = LazyLock::new(|| {
    [
        strings::BUILTINS,
        sequences::BUILTINS,
        numbers::BUILTINS,
        types::BUILTINS,
        existence::BUILTINS,
    ]
    .into_iter()
    .flatten()
    .map(|builtin| (builtin.name, builtin))
    .collect()
});

/// Looks up a built-in by name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    TABLE.get(name).copied()
}

/// Fails unless `args` has an argument at `i`.
fn arg(args: &[Value], i: usize) -> Result<&Value> {
    args.get(i)
        .ok_or_else(|| Error::internal(format!("missing built-in argument {i}")))
}

fn string_arg(env: &Environment<'_>, args: &[Value], i: usize) -> Result<String> {
    env.to_scalar(arg(args, i)?)
}

fn int_arg(env: &Environment<'_>, args: &[Value], i: usize) -> Result<i64> {
    let n = env.to_number(arg(args, i)?)?;
    n.as_i64()
        .ok_or_else(|| Error::invalid(format!("expected a whole number argument, found {n}")))
}

fn usize_arg(env: &Environment<'_>, args: &[Value], i: usize) -> Result<usize> {
    let n = int_arg(env, args, i)?;
    usize::try_from(n)
        .map_err(|_| Error::invalid(format!("argument must not be negative, found {n}")))
}

fn index_value(i: Option<usize>) -> Value {
    match i {
        Some(i) => Value::from(i),
        None => Value::int(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let total: usize = [
            strings::BUILTINS,
            sequences::BUILTINS,
            numbers::BUILTINS,
            types::BUILTINS,
            existence::BUILTINS,
        ]
        .iter()
        .map(|b| b.len())
        .sum();
        assert_eq!(TABLE.len(), total);
    }

    #[test]
    fn unevaluated_set_is_explicit() {
        let mut names: Vec<_> = TABLE
            .values()
            .filter(|b| b.input() == Input::Unevaluated)
            .map(|b| b.name())
            .collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "counter",
                "default",
                "exists",
                "has_content",
                "has_next",
                "if_exists",
                "index",
                "is_even_item",
                "is_first",
                "is_last",
                "is_odd_item",
                "item_cycle",
                "item_parity",
            ]
        );
    }

    #[test]
    fn arity_is_checked() {
        let b = lookup("replace").unwrap();
        assert!(b.check_arity(2).is_ok());
        let err = b.check_arity(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`?replace` takes 2 argument(s) but 0 were given"
        );
        assert!(lookup("no_such_builtin").is_none());
    }
}
