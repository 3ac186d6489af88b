//! Structured non-local control flow.
//!
//! Instructions and expressions return [`Exec`]. A [`Signal`] travels up the
//! call stack like an error until the construct that consumes it is reached:
//! a loop or switch for `#break`, the macro frame for `#return`, the visit
//! frame for `#fallback` and the top-level renderer for `#stop`.

use crate::types::program::Program;
use crate::types::span::Span;
use crate::{Error, Value};

/// The outcome of executing an instruction or evaluating an expression.
pub type Exec<T = ()> = std::result::Result<T, Unwind>;

/// Why execution stopped early.
#[derive(Debug)]
pub enum Unwind {
    Signal(Signal),
    Error(Error),
}

/// A control-flow signal.
#[derive(Debug)]
pub enum Signal {
    Break,
    Return(Option<Value>),
    Stop(Option<String>),
    Fallback,
}

impl Signal {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Signal::Break => "#break",
            Signal::Return(_) => "#return",
            Signal::Stop(_) => "#stop",
            Signal::Fallback => "#fallback",
        }
    }
}

impl Unwind {
    /// Attaches a location to an error; signals are returned unchanged.
    pub(crate) fn located(self, program: &Program, span: Span) -> Self {
        match self {
            Unwind::Error(err) => Unwind::Error(err.located(&program.name, program.source(), span)),
            signal => signal,
        }
    }
}

impl From<Error> for Unwind {
    fn from(err: Error) -> Self {
        Unwind::Error(err)
    }
}

impl From<Signal> for Unwind {
    fn from(signal: Signal) -> Self {
        Unwind::Signal(signal)
    }
}
