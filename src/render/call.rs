//! Macro, function and directive invocation, `#nested` re-entry, imports,
//! includes and node visiting.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::render::env::Environment;
use crate::render::signal::{Exec, Signal, Unwind};
use crate::render::stack::{Caller, Frame, NamespaceId, Scope, Vars};
use crate::types::ast::{Call, CallArgs, Import, Include, InstrId, MacroDef, MacroKind, Visit};
use crate::types::expr::Expr;
use crate::types::program::Program;
use crate::value::{Capabilities, List, Map, Node, Value};
use crate::{Error, Result};

/// A macro or function defined by a template, together with the namespace it
/// was defined in.
pub struct Macro {
    pub(crate) def: Arc<MacroDef>,
    pub(crate) program: Arc<Program>,
    pub(crate) namespace: NamespaceId,
}

impl Macro {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Whether this is a `#function`, which returns a value, rather than a
    /// `#macro`, which writes output.
    pub fn is_function(&self) -> bool {
        self.def.kind == MacroKind::Function
    }
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Macro")
            .field("name", &self.def.name)
            .field("kind", &self.def.kind)
            .field("template", &self.program.name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// The nested content of a directive call.
///
/// Rendering the body re-enters the scope of the call site, with the call
/// site's loop variables bound to the given values.
#[derive(Debug, Clone)]
pub struct Body {
    frame: usize,
    program: Arc<Program>,
    body: InstrId,
    loop_vars: Vec<String>,
}

impl Body {
    /// The loop variable names declared at the call site.
    pub fn loop_vars(&self) -> &[String] {
        &self.loop_vars
    }

    pub fn render(&self, env: &mut Environment<'_>) -> Exec {
        self.render_with(env, Vec::new())
    }

    /// Renders the body with the call site's loop variables bound to
    /// `values`.
    pub fn render_with(&self, env: &mut Environment<'_>, values: Vec<Value>) -> Exec {
        env.run_body(
            self.frame,
            self.program.clone(),
            self.body,
            &self.loop_vars,
            values,
        )
    }

    /// Renders the body to a string instead of the output.
    pub fn capture(&self, env: &mut Environment<'_>) -> Exec<String> {
        env.out.push_capture();
        let result = self.render(env);
        let captured = env.out.pop();
        result.map(|()| captured)
    }
}

pub(crate) enum Args {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

/// How a macro is being invoked, which decides what a `#fallback` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    Call,
    Function,
    Visit,
}

impl Environment<'_> {
    /// Invokes a user macro or function in a new call frame.
    ///
    /// Returns the value of a function's `#return`; macros return `None`.
    pub(crate) fn invoke(
        &mut self,
        m: &Macro,
        args: Args,
        body: Option<InstrId>,
        loop_vars: Vec<String>,
        how: Invocation,
    ) -> Exec<Option<Value>> {
        self.check_cancelled()?;
        self.enter_call()?;
        trace!(name = %m.def.name, depth = self.depth, "invoking macro");

        let caller = Caller {
            frame: self.stack.current_index(),
            program: self.program.clone(),
            body,
            loop_vars,
        };
        let prev_frame = self.stack.push_frame(Frame::new(m.namespace, Some(caller)));
        let prev_program = self.swap_program(m.program.clone());
        let function = m.is_function();
        if function {
            self.out.push_discard();
        }

        let result = self
            .bind_args(&m.def, args)
            .and_then(|()| self.execute(m.def.body));

        if function {
            self.out.pop();
        }
        self.swap_program(prev_program);
        self.stack.pop_frame(prev_frame);
        self.leave_call();

        let name = &m.def.name;
        match (result, function) {
            (Ok(()), false) => Ok(None),
            (Ok(()), true) => {
                Err(Error::invalid(format!("function `{name}` ended without #return")).into())
            }
            (Err(Unwind::Signal(Signal::Return(Some(value)))), true) => Ok(Some(value)),
            (Err(Unwind::Signal(Signal::Return(None))), true) => Err(Error::invalid(format!(
                "#return in function `{name}` must have a value"
            ))
            .into()),
            (Err(Unwind::Signal(Signal::Return(Some(_)))), false) => Err(Error::invalid(format!(
                "#return in macro `{name}` cannot have a value"
            ))
            .into()),
            (Err(Unwind::Signal(Signal::Return(None))), false) => Ok(None),
            (Err(Unwind::Signal(Signal::Fallback)), true) => Err(Error::invalid(format!(
                "#fallback cannot be used in function `{name}`"
            ))
            .into()),
            (Err(Unwind::Signal(Signal::Fallback)), _) if how != Invocation::Visit => Ok(None),
            (Err(unwind), _) => Err(unwind),
        }
    }

    /// Binds arguments to parameters in the current (new) frame.
    fn bind_args(&mut self, def: &MacroDef, args: Args) -> Exec {
        let name = &def.name;
        let rest = match args {
            Args::Positional(values) => {
                let given = values.len();
                let mut rest = List::new();
                for (i, value) in values.into_iter().enumerate() {
                    match def.params.get(i) {
                        Some(param) => self.stack.declare_local(&param.name, value)?,
                        None => rest.push(value),
                    }
                }
                if !rest.is_empty() && def.catch_all.is_none() {
                    return Err(Error::invalid(format!(
                        "`{name}` takes {} argument(s) but {given} were given",
                        def.params.len()
                    ))
                    .into());
                }
                Value::List(rest)
            }
            Args::Named(pairs) => {
                let mut rest = Map::new();
                for (key, value) in pairs {
                    if def.params.iter().any(|p| p.name == key) {
                        self.stack.declare_local(&key, value)?;
                    } else if def.catch_all.is_some() {
                        rest.insert(key, value);
                    } else {
                        return Err(Error::invalid(format!(
                            "`{name}` has no parameter named `{key}`"
                        ))
                        .into());
                    }
                }
                Value::Map(rest)
            }
        };

        // Defaults see the parameters declared before them.
        for param in &def.params {
            if self.stack.is_bound_in_macro(&param.name) {
                continue;
            }
            let value = match &param.default {
                Some(default) => self.eval(default)?,
                None => {
                    return Err(Error::invalid(format!(
                        "missing required parameter `{}` of `{name}`",
                        param.name
                    ))
                    .into())
                }
            };
            self.stack.declare_local(&param.name, value)?;
        }

        if let Some(catch_all) = &def.catch_all {
            self.stack.declare_local(catch_all, rest)?;
        }
        Ok(())
    }

    /// Calls a value from an expression: a function, a host method or a
    /// callable host object.
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Exec<Value> {
        match callee {
            Value::Macro(m) if m.is_function() => {
                let value = self.invoke(
                    &m,
                    Args::Positional(args),
                    None,
                    Vec::new(),
                    Invocation::Function,
                )?;
                value.ok_or_else(|| Error::internal("function returned without a value").into())
            }
            Value::Macro(m) => Err(Error::type_mismatch(format!(
                "macro `{}` writes output and cannot be called as a function; use <@{}>",
                m.name(),
                m.name()
            ))
            .into()),
            Value::Method(method) => {
                self.check_cancelled()?;
                Ok(method.call(args)?)
            }
            Value::Object(obj) if obj.capabilities().contains(Capabilities::METHOD) => {
                self.check_cancelled()?;
                Ok(obj.call(args)?)
            }
            other => Err(Error::expected("method or function", other.kind_name()).into()),
        }
    }

    fn eval_call_args(&mut self, args: &CallArgs) -> Exec<Args> {
        let args = match args {
            CallArgs::Positional(exprs) => Args::Positional(
                exprs
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Exec<Vec<_>>>()?,
            ),
            CallArgs::Named(pairs) => Args::Named(
                pairs
                    .iter()
                    .map(|(name, e)| Ok((name.clone(), self.eval(e)?)))
                    .collect::<Exec<Vec<_>>>()?,
            ),
        };
        Ok(args)
    }

    /// `<@callee args ; loop_vars>body</@callee>`
    pub(crate) fn exec_call(&mut self, call: &Call) -> Exec {
        let callee = self.eval(&call.callee)?;
        match callee {
            Value::Macro(m) if !m.is_function() => {
                let args = self.eval_call_args(&call.args)?;
                let loop_vars = call.loop_vars.clone();
                self.invoke(&m, args, call.body, loop_vars, Invocation::Call)?;
                Ok(())
            }
            Value::Macro(m) => Err(Error::type_mismatch(format!(
                "function `{}` returns a value and cannot be called as a directive",
                m.name()
            ))
            .into()),
            Value::Directive(directive) => {
                let params = match self.eval_call_args(&call.args)? {
                    Args::Named(pairs) => pairs.into_iter().collect(),
                    Args::Positional(values) if values.is_empty() => Map::new(),
                    Args::Positional(_) => {
                        return Err(
                            Error::invalid("directives only take named parameters").into()
                        )
                    }
                };
                self.check_cancelled()?;
                self.enter_call()?;
                let body = call.body.map(|body| Body {
                    frame: self.stack.current_index(),
                    program: self.program.clone(),
                    body,
                    loop_vars: call.loop_vars.clone(),
                });
                let result = directive.execute(self, params, body);
                self.leave_call();
                result
            }
            other => Err(Error::expected("macro or directive", other.kind_name()).into()),
        }
    }

    /// `#nested`: renders the body of the current macro call in the scope
    /// of its call site.
    pub(crate) fn exec_nested(&mut self, exprs: &[Expr]) -> Exec {
        let values = exprs
            .iter()
            .map(|e| self.eval(e))
            .collect::<Exec<Vec<_>>>()?;
        let Some(caller) = self.stack.current().caller.clone() else {
            return Err(Error::internal("#nested outside of a macro call").into());
        };
        match caller.body {
            Some(body) => self.run_body(
                caller.frame,
                caller.program,
                body,
                &caller.loop_vars,
                values,
            ),
            None => Ok(()),
        }
    }

    /// Executes a call site body in the call site's frame and template.
    pub(crate) fn run_body(
        &mut self,
        frame: usize,
        program: Arc<Program>,
        body: InstrId,
        names: &[String],
        values: Vec<Value>,
    ) -> Exec {
        if values.len() < names.len() {
            return Err(Error::invalid(format!(
                "#nested passed {} value(s) but the call site declares {} loop variable(s)",
                values.len(),
                names.len()
            ))
            .into());
        }
        let vars: Vars = names.iter().cloned().zip(values).collect();

        let prev_frame = self.stack.enter(frame);
        let prev_program = self.swap_program(program);
        self.stack.push_scope(Scope::Nested(vars));
        let result = self.execute(body);
        self.stack.pop_scope();
        self.swap_program(prev_program);
        self.stack.leave(prev_frame);
        result
    }

    fn template_name(&mut self, expr: &Expr) -> Exec<String> {
        let value = self.eval(expr)?;
        Ok(self.to_scalar(&value)?)
    }

    fn lookup_template(&self, name: &str) -> Result<Arc<Program>> {
        self.engine
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::invalid(format!("template `{name}` is not registered")))
    }

    /// `#import`: runs a template once per render in a namespace of its own
    /// and binds that namespace in the current one.
    pub(crate) fn exec_import(&mut self, import: &Import) -> Exec {
        let name = self.template_name(&import.template)?;
        let id = match self.imports.get(name.as_str()) {
            Some(id) => *id,
            None => {
                let program = self.lookup_template(&name)?;
                self.check_cancelled()?;
                self.enter_call()?;
                trace!(template = %name, "importing template");

                let id = self.new_namespace(program.clone());
                self.imports.insert(Arc::from(name.as_str()), id);
                let prev_frame = self.stack.push_frame(Frame::new(id, None));
                let prev_program = self.swap_program(program.clone());
                self.out.push_discard();
                let result = self.execute(program.root());
                self.out.pop();
                self.swap_program(prev_program);
                self.stack.pop_frame(prev_frame);
                self.leave_call();
                result?;
                id
            }
        };
        self.declare_namespace(&import.namespace, Value::Namespace(id));
        Ok(())
    }

    /// `#include`: runs a template in the current frame and namespace.
    pub(crate) fn exec_include(&mut self, include: &Include) -> Exec {
        let name = self.template_name(&include.template)?;
        let program = self.lookup_template(&name)?;
        self.check_cancelled()?;
        self.enter_call()?;
        trace!(template = %name, "including template");

        let ns = self.current_namespace();
        self.bind_macros(&program, ns);
        let prev_program = self.swap_program(program.clone());
        let result = self.execute(program.root());
        self.swap_program(prev_program);
        self.leave_call();
        result
    }

    /// `#visit` and `#recurse`.
    pub(crate) fn exec_visit(&mut self, visit: &Visit, recurse: bool) -> Exec {
        let node = match &visit.node {
            Some(expr) => self.eval(expr)?,
            None => match self.nodes.last() {
                Some(node) => Value::Node(node.clone()),
                None => {
                    return Err(Error::undefined("there is no node being visited").into());
                }
            },
        };
        let Value::Node(node) = node else {
            return Err(Error::expected("node", node.kind_name()).into());
        };

        let handlers = if visit.using.is_empty() {
            match self.handlers.last() {
                Some(handlers) => handlers.clone(),
                None => vec![self.current_namespace()],
            }
        } else {
            self.eval_handlers(&visit.using)?
        };

        if recurse {
            for child in node.children() {
                self.visit_node(child, &handlers)?;
            }
            Ok(())
        } else {
            self.visit_node(node, &handlers)
        }
    }

    fn eval_handlers(&mut self, using: &[Expr]) -> Exec<Vec<NamespaceId>> {
        let mut handlers = Vec::new();
        for expr in using {
            match self.eval(expr)? {
                Value::Namespace(id) => handlers.push(id),
                Value::List(list) => {
                    for value in list {
                        match value {
                            Value::Namespace(id) => handlers.push(id),
                            other => {
                                return Err(Error::expected("namespace", other.kind_name()).into())
                            }
                        }
                    }
                }
                other => return Err(Error::expected("namespace", other.kind_name()).into()),
            }
        }
        Ok(handlers)
    }

    fn visit_node(&mut self, node: Arc<dyn Node>, handlers: &[NamespaceId]) -> Exec {
        self.check_cancelled()?;
        self.nodes.push(node.clone());
        self.handlers.push(handlers.to_vec());
        let result = self.dispatch_node(&node, handlers);
        self.handlers.pop();
        self.nodes.pop();
        result
    }

    /// Looks for a handler macro named after the node, then after its kind,
    /// in each namespace in turn. `#fallback` moves on to the next namespace.
    fn dispatch_node(&mut self, node: &Arc<dyn Node>, handlers: &[NamespaceId]) -> Exec {
        let candidates = [node.name(), format!("@{}", node.kind())];
        'namespaces: for &ns in handlers {
            for name in &candidates {
                let Some(Value::Macro(m)) = self.namespace_vars(ns).get(name).cloned() else {
                    continue;
                };
                if m.is_function() {
                    continue;
                }
                let args = Args::Positional(Vec::new());
                match self.invoke(&m, args, None, Vec::new(), Invocation::Visit) {
                    Err(Unwind::Signal(Signal::Fallback)) => continue 'namespaces,
                    result => return result.map(|_| ()),
                }
            }
        }

        match node.text() {
            Some(text) => Ok(self.write(&text)?),
            None => Err(Error::invalid(format!(
                "no handler for node `{}` of kind `{}`",
                node.name(),
                node.kind()
            ))
            .into()),
        }
    }
}
