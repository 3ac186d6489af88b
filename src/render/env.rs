use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::render::fmt::Output;
use crate::render::signal::{Exec, Signal};
use crate::render::stack::{NamespaceId, Stack, Vars};
use crate::render::Macro;
use crate::types::program::Program;
use crate::value::compare::{self, CompareOp};
use crate::value::{Capabilities, Date, Map, Node, Number, Value};
use crate::{Cancellation, Engine, Error, Result, Settings};

/// The state of a single render.
///
/// Host [`Directive`][crate::Directive]s receive the environment to read and
/// declare variables, convert values and write output.
pub struct Environment<'render> {
    pub(crate) engine: &'render Engine,
    /// The template whose instructions are executing.
    pub(crate) program: Arc<Program>,
    pub(crate) data: &'render Value,
    pub(crate) stack: Stack,
    pub(crate) namespaces: Vec<Namespace>,
    /// Namespaces created by `#import`, by template name.
    pub(crate) imports: FxHashMap<Arc<str>, NamespaceId>,
    pub(crate) globals: Vars,
    pub(crate) out: Output<'render>,
    /// Mirrors the escape regions being executed; `None` for `#noescape`.
    pub(crate) escapes: Vec<Option<String>>,
    pub(crate) settings: Settings,
    cancel: Option<Cancellation>,
    pub(crate) depth: usize,
    /// Messages of the errors being recovered from, for `.error`.
    pub(crate) errors: Vec<String>,
    /// The nodes being visited, for `.node`.
    pub(crate) nodes: Vec<Arc<dyn Node>>,
    /// The handler namespaces of the enclosing `#visit`, for `#recurse`.
    pub(crate) handlers: Vec<Vec<NamespaceId>>,
    /// Set while folding constants; a conversion that depends on the render
    /// settings marks the expression as not foldable.
    folding: Option<Cell<bool>>,
}

#[derive(Debug)]
pub(crate) struct Namespace {
    pub vars: Vars,
}

impl<'render> Environment<'render> {
    pub(crate) fn new(
        engine: &'render Engine,
        program: Arc<Program>,
        data: &'render Value,
        settings: Settings,
        cancel: Option<Cancellation>,
        out: Output<'render>,
    ) -> Self {
        let mut env = Self {
            engine,
            program: program.clone(),
            data,
            stack: Stack::new(NamespaceId::MAIN),
            namespaces: Vec::new(),
            imports: FxHashMap::default(),
            globals: Vars::default(),
            out,
            escapes: Vec::new(),
            settings,
            cancel,
            depth: 0,
            errors: Vec::new(),
            nodes: Vec::new(),
            handlers: Vec::new(),
            folding: None,
        };
        let main = env.new_namespace(program);
        debug_assert_eq!(main, NamespaceId::MAIN);
        env
    }

    /// An environment for evaluating literal expressions at compile time.
    pub(crate) fn folding(
        engine: &'render Engine,
        program: Arc<Program>,
        data: &'render Value,
    ) -> Self {
        let settings = program.settings.clone();
        let mut env = Self::new(engine, program, data, settings, None, Output::discard());
        env.folding = Some(Cell::new(false));
        env
    }

    /// Whether a conversion during folding depended on the render settings.
    /// Resets the flag.
    pub(crate) fn take_fold_blocked(&mut self) -> bool {
        self.folding.as_ref().is_some_and(|f| f.replace(false))
    }

    fn block_folding(&self) {
        if let Some(f) = &self.folding {
            f.set(true);
        }
    }

    /// Creates a namespace for a template, binding the macros it defines.
    pub(crate) fn new_namespace(&mut self, program: Arc<Program>) -> NamespaceId {
        let id = NamespaceId(self.namespaces.len());
        self.namespaces.push(Namespace {
            vars: Vars::default(),
        });
        self.bind_macros(&program, id);
        id
    }

    /// Binds the macros a template defines into a namespace.
    pub(crate) fn bind_macros(&mut self, program: &Arc<Program>, id: NamespaceId) {
        for def in &program.macros {
            let value = Value::Macro(Arc::new(Macro {
                def: def.clone(),
                program: program.clone(),
                namespace: id,
            }));
            self.namespaces[id.0].vars.insert(def.name.clone(), value);
        }
    }

    pub(crate) fn check_cancelled(&self) -> Exec {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                Err(Signal::Stop(Some(String::from("render cancelled"))).into())
            }
            _ => Ok(()),
        }
    }

    /// Counts a macro call, function call, include or import.
    pub(crate) fn enter_call(&mut self) -> Result<()> {
        if self.depth >= self.settings.max_call_depth {
            return Err(Error::invalid(format!(
                "maximum call depth of {} exceeded",
                self.settings.max_call_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.depth -= 1;
    }

    ////////////////////////////////////////////////////////////////////////////
    // Scopes
    ////////////////////////////////////////////////////////////////////////////

    /// Resolves a variable through the scope chain: the locals of the current
    /// call, the current namespace, the globals, the data model and finally
    /// the engine's shared variables.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.stack.resolve(name) {
            return Some(v);
        }
        if let Some(v) = self.namespaces[self.current_namespace().0].vars.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.globals.get(name) {
            return Some(v.clone());
        }
        if let Ok(Some(v)) = self.member(self.data, name) {
            return Some(v);
        }
        self.engine.shared.get(name).cloned()
    }

    /// Sets a variable in the innermost block or macro scope, as `#local`
    /// does.
    pub fn declare_local(&mut self, name: &str, value: Value) -> Result<()> {
        self.stack.declare_local(name, value)
    }

    /// Sets a variable in the current namespace, as `#assign` does.
    pub fn declare_namespace(&mut self, name: &str, value: Value) {
        let id = self.current_namespace();
        self.namespaces[id.0].vars.insert(name.to_owned(), value);
    }

    /// Sets a variable for the rest of the render, as `#global` does.
    pub fn declare_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_owned(), value);
    }

    pub(crate) fn current_namespace(&self) -> NamespaceId {
        self.stack.current().namespace
    }

    pub(crate) fn namespace_vars(&self, id: NamespaceId) -> &Vars {
        &self.namespaces[id.0].vars
    }

    pub(crate) fn namespace_vars_mut(&mut self, id: NamespaceId) -> &mut Vars {
        &mut self.namespaces[id.0].vars
    }

    /// A snapshot of every variable visible from here, inner scopes winning.
    pub(crate) fn visible_vars(&self) -> Map<String, Value> {
        let mut out = Map::new();
        let shared = &self.engine.shared;
        out.extend(shared.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Value::Map(data) = self.data {
            out.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out.extend(self.globals.iter().map(|(k, v)| (k.clone(), v.clone())));
        let ns = self.namespace_vars(self.current_namespace());
        out.extend(ns.iter().map(|(k, v)| (k.clone(), v.clone())));
        out.extend(self.stack.visible());
        out
    }

    ////////////////////////////////////////////////////////////////////////////
    // Output and settings
    ////////////////////////////////////////////////////////////////////////////

    /// Writes text to the current output.
    pub fn write(&mut self, s: &str) -> Result<()> {
        self.out.write_str(s)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn locale(&self) -> &str {
        &self.settings.locale
    }

    /// Whether an `#escape` region is in effect at this point.
    pub fn escaping(&self) -> bool {
        matches!(self.escapes.last(), Some(Some(_)))
    }

    /// The node being visited, if any.
    pub fn current_node(&self) -> Option<&Arc<dyn Node>> {
        self.nodes.last()
    }

    ////////////////////////////////////////////////////////////////////////////
    // Conversions
    ////////////////////////////////////////////////////////////////////////////

    /// Converts a value to a string, formatting numbers, dates and booleans
    /// with the current settings.
    pub fn to_scalar(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => self.format_number(*n),
            Value::Bool(b) => Ok(self.format_bool(*b)),
            Value::Date(d) => self.format_date(*d),
            Value::Node(node) => node
                .text()
                .ok_or_else(|| Error::expected("string", "node without text")),
            Value::Object(obj) => {
                let caps = obj.capabilities();
                if caps.contains(Capabilities::SCALAR) {
                    if let Some(s) = obj.to_scalar() {
                        return Ok(s);
                    }
                }
                let number = caps.contains(Capabilities::NUMBER);
                if let Some(n) = obj.to_number().filter(|_| number) {
                    return self.format_number(n);
                }
                if let Some(d) = obj.to_date().filter(|_| caps.contains(Capabilities::DATE)) {
                    return self.format_date(d);
                }
                let boolean = caps.contains(Capabilities::BOOLEAN);
                if let Some(b) = obj.to_bool().filter(|_| boolean) {
                    return Ok(self.format_bool(b));
                }
                Err(Error::expected("string, number, date or boolean", value.kind_name()))
            }
            Value::Null => Err(Error::undefined("expression evaluated to null")),
            _ => Err(Error::expected("string, number, date or boolean", value.kind_name())),
        }
    }

    pub fn to_number(&self, value: &Value) -> Result<Number> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Object(obj) if obj.capabilities().contains(Capabilities::NUMBER) => obj
                .to_number()
                .ok_or_else(|| Error::expected("number", value.kind_name())),
            _ => Err(Error::expected("number", value.kind_name())),
        }
    }

    pub fn to_bool(&self, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Object(obj) if obj.capabilities().contains(Capabilities::BOOLEAN) => obj
                .to_bool()
                .ok_or_else(|| Error::expected("boolean", value.kind_name())),
            _ => Err(Error::expected("boolean", value.kind_name())),
        }
    }

    pub fn to_date(&self, value: &Value) -> Result<Date> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Object(obj) if obj.capabilities().contains(Capabilities::DATE) => obj
                .to_date()
                .ok_or_else(|| Error::expected("date", value.kind_name())),
            _ => Err(Error::expected("date", value.kind_name())),
        }
    }

    /// Collects the elements of a sequence or collection.
    pub fn to_sequence(&self, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::List(list) => Ok(list.clone()),
            Value::Object(obj) => {
                let caps = obj.capabilities();
                if caps.contains(Capabilities::SEQUENCE) {
                    let len = obj.len().unwrap_or(0);
                    return (0..len)
                        .map(|i| obj.get_index(i).map(|v| v.unwrap_or(Value::Null)))
                        .collect();
                }
                if caps.contains(Capabilities::COLLECTION) {
                    return obj
                        .clone()
                        .iter()
                        .map(Iterator::collect)
                        .ok_or_else(|| Error::invalid("the collection has already been listed"));
                }
                Err(Error::expected("sequence", value.kind_name()))
            }
            _ => Err(Error::expected("sequence", value.kind_name())),
        }
    }

    /// The keys and values of an enumerable hash.
    pub(crate) fn to_entries(&self, value: &Value) -> Result<Vec<(Value, Value)>> {
        match value {
            Value::Map(map) => Ok(map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect()),
            Value::Namespace(id) => {
                let mut entries: Vec<_> = self
                    .namespace_vars(*id)
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                    .collect();
                entries.sort_by(|a, b| match (&a.0, &b.0) {
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    _ => Ordering::Equal,
                });
                Ok(entries)
            }
            Value::Object(obj) if obj.capabilities().contains(Capabilities::ENUMERABLE_HASH) => {
                let keys = obj.keys().unwrap_or_default();
                let values = obj.values().unwrap_or_default();
                Ok(keys.into_iter().zip(values).collect())
            }
            _ => Err(Error::expected("enumerable hash", value.kind_name())),
        }
    }

    pub(crate) fn format_number(&self, n: Number) -> Result<String> {
        // `#setting` may change the format later in the render.
        self.block_folding();
        let format = &self.settings.number_format;
        self.engine
            .formats
            .format_number(n, format, &self.settings.locale)
    }

    pub(crate) fn format_date(&self, d: Date) -> Result<String> {
        self.block_folding();
        let format = self.settings.date_format_for(d.kind)?;
        self.engine
            .formats
            .format_date(d, format, &self.settings.locale)
    }

    /// Formats a number with an explicit pattern, as `?string("0.00")` does.
    pub(crate) fn format_number_with(&self, n: Number, pattern: &str) -> Result<String> {
        self.block_folding();
        self.engine
            .formats
            .format_number(n, pattern, &self.settings.locale)
    }

    pub(crate) fn format_date_with(&self, d: Date, pattern: &str) -> Result<String> {
        self.block_folding();
        self.engine
            .formats
            .format_date(d, pattern, &self.settings.locale)
    }

    pub(crate) fn format_bool(&self, b: bool) -> String {
        self.block_folding();
        let (t, f) = self.settings.boolean_words();
        String::from(if b { t } else { f })
    }

    pub(crate) fn collate(&self, a: &str, b: &str) -> Ordering {
        self.block_folding();
        self.engine.formats.collate(a, b, &self.settings.locale)
    }

    pub(crate) fn compare(&self, lhs: &Value, rhs: &Value, op: CompareOp) -> Result<bool> {
        compare::compare(lhs, rhs, op, &|a, b| self.collate(a, b))
    }

    ////////////////////////////////////////////////////////////////////////////
    // Lookups
    ////////////////////////////////////////////////////////////////////////////

    /// Looks up `key` on a hash-like value. `Ok(None)` means absent.
    pub(crate) fn member(&self, target: &Value, key: &str) -> Result<Option<Value>> {
        match target {
            Value::Map(map) => Ok(map.get(key).cloned()),
            Value::Namespace(id) => Ok(self.namespace_vars(*id).get(key).cloned()),
            Value::Node(node) => Ok(node.get(key)),
            Value::Object(obj) if obj.capabilities().contains(Capabilities::HASH) => obj.get(key),
            Value::Null => Err(Error::undefined(format!(
                "cannot look up `{key}` on a null value"
            ))),
            _ => Err(Error::type_mismatch(format!(
                "cannot look up `{key}` on {}",
                target.kind_name()
            ))),
        }
    }

    /// Indexes a sequence by position, or a hash by a string key.
    pub(crate) fn index(&self, target: &Value, index: &Value) -> Result<Option<Value>> {
        if let Value::String(key) = index {
            return self.member(target, key);
        }
        let i = self.to_number(index)?;
        let i = i
            .as_i64()
            .ok_or_else(|| Error::invalid(format!("index must be a whole number, found {i}")))?;
        let Ok(i) = usize::try_from(i) else {
            return Ok(None);
        };
        match target {
            Value::List(list) => Ok(list.get(i).cloned()),
            Value::String(s) => Ok(s.chars().nth(i).map(|c| Value::String(c.to_string()))),
            Value::Object(obj) if obj.capabilities().contains(Capabilities::SEQUENCE) => {
                obj.get_index(i)
            }
            Value::Null => Err(Error::undefined("cannot index into a null value")),
            _ => Err(Error::type_mismatch(format!(
                "cannot index into {}",
                target.kind_name()
            ))),
        }
    }
}
