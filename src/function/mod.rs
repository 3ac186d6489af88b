mod args;

use std::sync::Arc;

use crate::value::Method;
use crate::{Error, Result, Value};

/// Wraps a typed host function so that templates can call it.
pub(crate) fn new<F, R, A>(name: &str, f: F) -> Arc<dyn Method>
where
    F: Function<R, A> + Send + Sync + 'static,
    R: FunctionReturn,
    A: FunctionArgs,
{
    let name: Arc<str> = Arc::from(name);
    Arc::new(move |values: Vec<Value>| -> Result<Value> {
        let args = A::from_args(&name, values)?;
        FunctionReturn::to_value(f.call(args))
    })
}

/// Represents any host function callable from a template.
///
/// This trait is used by the [`Engine::add_function`][crate::Engine::add_function]
/// method to abstract over a variety of function and closure types. This
/// includes functions with variable argument types, return types and arity
/// up to four. The renderer checks the number and the types of arguments when
/// the function is called.
///
/// [`Function`] is implemented for functions that return any of the
/// following types.
///
/// - `R` where `R` implements `Into<Value>`, which includes `Option<R>`
/// - `Result<R>` where `R` implements `Into<Value>`
///
/// [`Function`] is implemented for functions that take any of the following
/// owned types as arguments.
/// - [`bool`]
/// - integer types and [`f64`]
/// - [`Number`][crate::Number]
/// - [`String`]
/// - [`Vec<Value>`]
/// - [`BTreeMap<String, Value>`][std::collections::BTreeMap]
/// - [`Value`]
/// - `Option<T>` of any of the above, where `null` becomes `None`
///
/// ## Examples
///
/// ```rust
/// use scribe::Engine;
///
/// let mut engine = Engine::new();
/// engine.add_function("repeat", repeat);
///
/// fn repeat(s: String, n: usize) -> String {
///     s.repeat(n)
/// }
/// ```
pub trait Function<R, A>
where
    A: FunctionArgs,
{
    #[doc(hidden)]
    fn call(&self, args: A) -> R;
}

pub trait FunctionArgs: Sized {
    fn from_args(name: &str, values: Vec<Value>) -> Result<Self>;
}

pub trait FunctionArg: Sized {
    fn from_value(v: Value) -> args::Result<Self>;
}

pub trait FunctionReturn {
    fn to_value(self) -> Result<Value>;
}

////////////////////////////////////////////////////////////////////////////////
// Function
////////////////////////////////////////////////////////////////////////////////

macro_rules! one {
    ($x:ident) => {
        1
    };
}

macro_rules! impl_function {
    ($($arg:ident)*) => {
        impl<Func, R, $($arg,)*> Function<R, ($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> R,
            R: FunctionReturn,
            $($arg: FunctionArg,)*
        {
            #[doc(hidden)]
            #[allow(non_snake_case)]
            fn call(&self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }
        }

        impl<$($arg,)*> FunctionArgs for ($($arg,)*)
        where
            $($arg: FunctionArg,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn from_args(name: &str, values: Vec<Value>) -> Result<Self> {
                const ARITY: usize = 0 $(+ one!($arg))*;
                check_args(name, values.len(), ARITY)?;
                let mut values = values.into_iter().enumerate();
                Ok(($(
                    {
                        let (i, v) = values
                            .next()
                            .ok_or_else(|| Error::internal("argument count changed"))?;
                        $arg::from_value(v).map_err(|e| err_expected_arg(e, name, i))?
                    },
                )*))
            }
        }
    };
}

impl_function! {}
impl_function! { A }
impl_function! { A B }
impl_function! { A B C }
impl_function! { A B C D }

fn check_args(name: &str, given: usize, exp: usize) -> Result<()> {
    if given == exp {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "function `{name}` expected {exp} argument(s), but {given} were given"
        )))
    }
}

fn err_expected_arg(err: args::Error, name: &str, i: usize) -> Error {
    let msg = match err {
        args::Error::Type(exp, got) => {
            format!(
                "function `{name}` expected {exp} for argument {}, found {got}",
                i + 1
            )
        }
        args::Error::TryFromInt(ty, n) => {
            format!(
                "function `{name}` argument {}: cannot convert {n} to {ty}",
                i + 1
            )
        }
    };
    Error::type_mismatch(msg)
}

////////////////////////////////////////////////////////////////////////////////
// FunctionReturn
////////////////////////////////////////////////////////////////////////////////

impl<T> FunctionReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FunctionReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &Arc<dyn Method>, args: Vec<Value>) -> Result<Value> {
        method.call(args)
    }

    #[test]
    fn typed_arguments() {
        let f = new("repeat", |s: String, n: usize| s.repeat(n));
        let v = call(&f, vec![Value::from("ab"), Value::from(3)]).unwrap();
        assert_eq!(v, Value::from("ababab"));
    }

    #[test]
    fn wrong_arity() {
        let f = new("one", |x: i64| x + 1);
        let err = call(&f, vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "function `one` expected 1 argument(s), but 0 were given"
        );
    }

    #[test]
    fn wrong_type() {
        let f = new("upper", |s: String| s.to_uppercase());
        let err = call(&f, vec![Value::from(1)]).unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(
            err.to_string(),
            "function `upper` expected string for argument 1, found number"
        );
    }

    #[test]
    fn optional_and_fallible() {
        let f = new("half", |n: Option<i64>| -> Result<Option<i64>> {
            match n {
                Some(n) if n % 2 == 1 => Err(Error::invalid("odd")),
                n => Ok(n.map(|n| n / 2)),
            }
        });
        assert_eq!(call(&f, vec![Value::Null]).unwrap(), Value::Null);
        assert_eq!(call(&f, vec![Value::from(4)]).unwrap(), Value::from(2));
        assert!(call(&f, vec![Value::from(3)]).is_err());
    }

    #[test]
    fn nullary() {
        let f = new("answer", || 42);
        assert_eq!(call(&f, vec![]).unwrap(), Value::from(42));
    }
}
