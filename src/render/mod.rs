#![allow(clippy::wrong_self_convention)]

mod call;
mod env;
mod eval;
mod exec;
pub(crate) mod fmt;
mod grow;
mod iter;
mod range;
mod signal;
mod stack;

use std::io;
use std::sync::Arc;

pub use crate::render::call::{Body, Macro};
pub use crate::render::env::Environment;
pub use crate::render::signal::{Exec, Signal, Unwind};
pub use crate::render::stack::NamespaceId;

use crate::render::fmt::{Output, Sink, Writer};
use crate::types::program::Program;
use crate::{Cancellation, Engine, Error, Result, Settings, Value};

/// A renderer that interprets a compiled [`Template`][crate::Template].
///
/// This struct is created by one of the following functions:
/// - [`Template{,Ref}::render`][crate::Template::render]
/// - [`Template{,Ref}::render_from`][crate::Template::render_from]
#[must_use = "must call `.to_string()` or `.to_writer(..)` on the renderer"]
pub struct Renderer<'render> {
    engine: &'render Engine,
    program: Arc<Program>,
    data: Data<'render>,
    locale: Option<String>,
    cancel: Option<Cancellation>,
    max_call_depth: Option<usize>,
}

enum Data<'render> {
    Owned(Result<Value>),
    Borrowed(&'render Value),
}

impl<'render> Renderer<'render> {
    fn new(engine: &'render Engine, program: Arc<Program>, data: Data<'render>) -> Self {
        Self {
            engine,
            program,
            data,
            locale: None,
            cancel: None,
            max_call_depth: None,
        }
    }

    #[cfg(feature = "serde")]
    pub(crate) fn with_serde<S>(engine: &'render Engine, program: Arc<Program>, data: S) -> Self
    where
        S: ::serde::Serialize,
    {
        Self::new(engine, program, Data::Owned(crate::to_value(data)))
    }

    pub(crate) fn with_value(
        engine: &'render Engine,
        program: Arc<Program>,
        data: &'render Value,
    ) -> Self {
        Self::new(engine, program, Data::Borrowed(data))
    }

    /// Set the locale for this render.
    ///
    /// Defaults to the template setting.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Render with a cancellation token. Once the token is cancelled the
    /// render stops at the next loop iteration, call, include or import.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the maximum number of nested macro calls, function calls,
    /// includes and imports.
    ///
    /// Defaults to the template setting.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    /// Render the template to a string.
    pub fn to_string(self) -> Result<String> {
        let mut s = String::new();
        self.render(&mut s)?;
        Ok(s)
    }

    /// Render the template to the given writer.
    pub fn to_writer<W>(self, w: W) -> Result<()>
    where
        W: io::Write,
    {
        let mut w = Writer::new(w);
        self.render(&mut w)
            .map_err(|err| w.take_err().map(Error::from).unwrap_or(err))
    }

    fn settings(&self) -> Settings {
        let mut settings = self.program.settings.clone();
        if let Some(locale) = &self.locale {
            settings.locale = locale.clone();
        }
        if let Some(depth) = self.max_call_depth {
            settings.max_call_depth = depth;
        }
        settings
    }

    fn render(self, sink: &mut dyn Sink) -> Result<()> {
        let settings = self.settings();
        let owned;
        let data = match self.data {
            Data::Owned(result) => {
                owned = result?;
                &owned
            }
            Data::Borrowed(value) => value,
        };
        let mut env = Environment::new(
            self.engine,
            self.program,
            data,
            settings,
            self.cancel,
            Output::new(sink),
        );
        env.render_root()
    }
}
