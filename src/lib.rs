//! An evaluation engine for a small, macro-capable template language.
//!
//! # Features
//!
//! ### Language
//!
//! - Interpolations with escaping regions: `${user.name}` inside
//!   `#escape x as x?html`
//! - Conditionals, loops with `#sep` and `#else`, `#switch` with `#case`
//!   fall-through and `#on`
//! - Macros and functions with default and catch-all parameters, `#nested`
//!   content and call-site loop variables
//! - Namespaces: `#import`, `#include`, `#assign`, `#global` and `#local`
//! - Error recovery with `#attempt`/`#recover`, and `#stop`
//! - Node tree traversal with `#visit`, `#recurse` and `#fallback`
//! - Over a hundred `?built_ins` for strings, sequences, hashes, numbers,
//!   dates and loop variables
//!
//! ### Engine
//!
//! - Templates are built from an [`Ast`], usually by a parser driving the
//!   [`Builder`]
//! - Escape regions are applied, misplaced control flow is rejected and
//!   literal expressions are folded once, when a template is compiled
//! - Host values: [`Object`]s with any combination of capabilities,
//!   [`Method`]s, [`Directive`]s and [`Node`]s
//! - Typed host functions via [`Engine::add_function`]
//! - Pluggable number and date formatting and collation via [`Formats`]
//! - Render to a [`String`] or any [`std::io::Write`] implementor
//! - Render using any [`serde`] serializable values
//! - Cooperative cancellation and a call depth limit
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the settings,
//! shared variables, host functions and compiled templates. Generally, you
//! only need to construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = scribe::Engine::new();
//! ```
//!
//! Next, build a template and use [`.add_template`][Engine::add_template] to
//! compile and store it in the engine.
//!
//! ```
//! use scribe::expr::{dot, var};
//! use scribe::Builder;
//!
//! # let mut engine = scribe::Engine::new();
//! let mut b = Builder::new();
//! b.text("Hello ").interpolate(dot(var("user"), "name")).text("!");
//! engine.add_template("hello", b.finish())?;
//! # Ok::<(), scribe::Error>(())
//! ```
//!
//! Finally, the template is rendered by fetching it using
//! [`.get_template`][Engine::get_template] and calling
//! [`.render`][TemplateRef::render].
//!
//! ```
//! # use scribe::expr::{dot, var};
//! # let mut engine = scribe::Engine::new();
//! # let mut b = scribe::Builder::new();
//! # b.text("Hello ").interpolate(dot(var("user"), "name")).text("!");
//! # engine.add_template("hello", b.finish())?;
//! let template = engine.get_template("hello").unwrap();
//! let result = template
//!     .render(scribe::value! { user: { name: "John Smith" } })
//!     .to_string()?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), scribe::Error>(())
//! ```
//!
//! If you don't need to store the compiled template then you can also use
//! the [`.compile`][Engine::compile] function to return the template
//! directly.
//!
//! # Examples
//!
//! ### Macros
//!
//! ```
//! use scribe::expr::{string, var};
//! use scribe::{Builder, CallArgs, Param};
//!
//! let mut b = Builder::new();
//! b.macro_def("greet", vec![Param::new("name")], |b| {
//!     b.text("Hi, ").interpolate(var("name"));
//! });
//! b.call(var("greet"), CallArgs::Positional(vec![string("Ann")]));
//!
//! let result = scribe::Engine::new()
//!     .compile("greet", b.finish())?
//!     .render(scribe::value! {})
//!     .to_string()?;
//! assert_eq!(result, "Hi, Ann");
//! # Ok::<(), scribe::Error>(())
//! ```
//!
//! ### Host functions
//!
//! ```
//! use scribe::expr::{call, string, var};
//! use scribe::Builder;
//!
//! let mut engine = scribe::Engine::new();
//! engine.add_function("shout", |s: String| format!("{}!", s.to_uppercase()));
//!
//! let mut b = Builder::new();
//! b.interpolate(call(var("shout"), vec![string("hey")]));
//!
//! let result = engine
//!     .compile("shout", b.finish())?
//!     .render(scribe::value! {})
//!     .to_string()?;
//! assert_eq!(result, "HEY!");
//! # Ok::<(), scribe::Error>(())
//! ```
//!
//! See the [`Function`] trait documentation for more information on host
//! functions.
//!
//! ### Render a template to an `impl io::Write`
//!
//! ```
//! use std::io;
//!
//! let mut b = scribe::Builder::new();
//! b.text("Hello");
//!
//! let stdout = io::BufWriter::new(io::stdout());
//! scribe::Engine::new()
//!     .compile("hello", b.finish())?
//!     .render(scribe::value! {})
//!     .to_writer(stdout)?;
//! # Ok::<(), scribe::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod builtins;
mod cancel;
mod compile;
mod error;
mod format;
mod function;
mod macros;
mod render;
mod types;
mod value;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

pub use crate::builtins::{lookup as lookup_builtin, Builtin, Input};
pub use crate::cancel::Cancellation;
pub use crate::error::{Error, ErrorKind, Location};
pub use crate::format::{DefaultFormats, Formats, Settings};
pub use crate::function::{Function, FunctionArg, FunctionArgs, FunctionReturn};
pub use crate::render::{
    Body, Environment, Exec, Macro, NamespaceId, Renderer, Signal, Unwind,
};
pub use crate::types::ast::{
    AssignOp, AssignScope, Ast, CallArgs, CaseTest, Instr, InstrId, LoopVars, MacroDef,
    MacroKind, Param,
};
pub use crate::types::builder::{case, Block, Builder};
pub use crate::types::expr;
pub use crate::types::span::Span;
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{
    Capabilities, Date, DateKind, Directive, List, Map, Method, Node, Number, Object, Value,
};

use crate::types::program::Program;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The compilation and rendering engine.
pub struct Engine {
    settings: Settings,
    pub(crate) shared: FxHashMap<String, Value>,
    pub(crate) templates: FxHashMap<String, Arc<Program>>,
    pub(crate) formats: Arc<dyn Formats>,
}

/// A compiled template.
pub struct Template<'engine> {
    engine: &'engine Engine,
    program: Arc<Program>,
}

/// A reference to a compiled template in an [`Engine`].
#[derive(Clone, Copy)]
pub struct TemplateRef<'engine> {
    engine: &'engine Engine,
    program: &'engine Arc<Program>,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine.
    #[inline]
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Construct a new engine with custom settings.
    ///
    /// The settings are the baseline for every template compiled with
    /// [`.compile(..)`][Engine::compile] and
    /// [`.add_template(..)`][Engine::add_template].
    ///
    /// # Examples
    ///
    /// ```
    /// use scribe::{Engine, Settings};
    ///
    /// let settings = Settings {
    ///     locale: String::from("de_DE"),
    ///     ..Settings::default()
    /// };
    /// let engine = Engine::with_settings(settings);
    /// ```
    #[inline]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            shared: FxHashMap::default(),
            templates: FxHashMap::default(),
            formats: Arc::new(DefaultFormats),
        }
    }

    /// The baseline settings.
    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Add a variable visible to every template, after the data model.
    #[inline]
    pub fn add_shared(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.shared.insert(name.into(), value.into());
    }

    /// Add a typed host function to the engine.
    ///
    /// The function is a shared variable that templates call like any
    /// method, `${name(args)}`.
    #[inline]
    pub fn add_function<F, R, A>(&mut self, name: &str, f: F)
    where
        F: Function<R, A> + Send + Sync + 'static,
        R: FunctionReturn,
        A: FunctionArgs,
    {
        let method = function::new(name, f);
        self.shared.insert(name.to_owned(), Value::Method(method));
    }

    /// Add an untyped host method, which receives its arguments as values.
    #[inline]
    pub fn add_method<M>(&mut self, name: impl Into<String>, method: M)
    where
        M: Method + 'static,
    {
        self.shared
            .insert(name.into(), Value::Method(Arc::new(method)));
    }

    /// Add a host directive, invoked with `<@name ...>`.
    #[inline]
    pub fn add_directive<D>(&mut self, name: impl Into<String>, directive: D)
    where
        D: Directive + 'static,
    {
        self.shared
            .insert(name.into(), Value::Directive(Arc::new(directive)));
    }

    /// Set the number and date formatting and collation service.
    #[inline]
    pub fn set_formats<F>(&mut self, formats: F)
    where
        F: Formats + 'static,
    {
        self.formats = Arc::new(formats);
    }

    /// Add a template to the engine.
    ///
    /// The template will be compiled with the engine settings and stored
    /// under the given name, where `#import` and `#include` can find it.
    #[inline]
    pub fn add_template(&mut self, name: impl Into<String>, ast: Ast) -> Result<()> {
        let name = name.into();
        let program = compile::program(self, &name, ast, self.settings.clone())?;
        self.templates.insert(name, program);
        Ok(())
    }

    /// Add a template that overrides some of the engine settings.
    #[inline]
    pub fn add_template_with(
        &mut self,
        name: impl Into<String>,
        ast: Ast,
        settings: Settings,
    ) -> Result<()> {
        let name = name.into();
        let program = compile::program(self, &name, ast, settings)?;
        self.templates.insert(name, program);
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<TemplateRef<'_>> {
        self.templates.get(name).map(|program| TemplateRef {
            engine: self,
            program,
        })
    }

    /// Remove a template from the engine.
    #[inline]
    pub fn remove_template(&mut self, name: &str) -> bool {
        self.templates.remove(name).is_some()
    }

    /// Compile a template.
    ///
    /// The template will not be stored in the engine, but it can still
    /// import and include the stored ones.
    #[inline]
    pub fn compile(&self, name: &str, ast: Ast) -> Result<Template<'_>> {
        self.compile_with(name, ast, self.settings.clone())
    }

    /// Compile a template that overrides some of the engine settings.
    #[inline]
    pub fn compile_with(&self, name: &str, ast: Ast, settings: Settings) -> Result<Template<'_>> {
        let program = compile::program(self, name, ast, settings)?;
        Ok(Template {
            engine: self,
            program,
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("shared", &self.shared.keys())
            .field("templates", &self.templates.keys())
            .finish_non_exhaustive()
    }
}

impl<'engine> Template<'engine> {
    /// Render the template using the provided serializable value.
    #[cfg(feature = "serde")]
    #[inline]
    pub fn render<S>(&self, ctx: S) -> Renderer<'_>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self.engine, self.program.clone(), ctx)
    }

    /// Render the template using the provided value.
    #[inline]
    pub fn render_from<'render>(&'render self, value: &'render Value) -> Renderer<'render> {
        Renderer::with_value(self.engine, self.program.clone(), value)
    }

    /// Returns the template name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.program.name
    }

    #[cfg(test)]
    pub(crate) fn program(&self) -> &Arc<Program> {
        &self.program
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.program.name)
            .finish_non_exhaustive()
    }
}

impl<'engine> TemplateRef<'engine> {
    /// Render the template using the provided serializable value.
    #[cfg(feature = "serde")]
    #[inline]
    pub fn render<S>(&self, ctx: S) -> Renderer<'engine>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self.engine, self.program.clone(), ctx)
    }

    /// Render the template using the provided value.
    #[inline]
    pub fn render_from<'render>(&self, value: &'render Value) -> Renderer<'render>
    where
        'engine: 'render,
    {
        Renderer::with_value(self.engine, self.program.clone(), value)
    }

    /// Returns the template name.
    #[inline]
    pub fn name(&self) -> &'engine str {
        &self.program.name
    }
}

impl fmt::Debug for TemplateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("name", &self.program.name)
            .finish_non_exhaustive()
    }
}
