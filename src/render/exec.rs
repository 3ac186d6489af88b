use std::mem;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::render::env::Environment;
use crate::render::grow::ensure_sufficient_stack;
use crate::render::iter::{self, LoopState};
use crate::render::signal::{Exec, Signal, Unwind};
use crate::render::stack::{NamespaceId, Scope, Vars};
use crate::types::ast::{
    Assign, AssignOp, AssignScope, Attempt, Capture, CaseTest, Instr, InstrId, ListLoop, Switch,
};
use crate::types::expr::{ArithOp, CompareOp, Expr};
use crate::types::program::Program;
use crate::value::Value;
use crate::{Error, Result};

impl Environment<'_> {
    /// Executes the main template, mapping escaped signals to errors.
    #[tracing::instrument(level = "debug", skip_all, fields(template = %self.program.name))]
    pub(crate) fn render_root(&mut self) -> Result<()> {
        debug!(locale = %self.settings.locale, "render started");
        let root = self.program.root();
        let result = match self.execute(root) {
            Ok(()) => Ok(()),
            Err(Unwind::Error(err)) => Err(err),
            Err(Unwind::Signal(Signal::Stop(message))) => Err(Error::stopped(message)),
            Err(Unwind::Signal(signal)) => Err(Error::internal(format!(
                "{} escaped the template",
                signal.describe()
            ))),
        };
        let flushed = self.out.flush();
        debug!(ok = result.is_ok(), "render finished");
        result.and(flushed)
    }

    /// Executes a single instruction.
    ///
    /// Errors are located at the innermost instruction they pass through.
    pub fn execute(&mut self, id: InstrId) -> Exec {
        ensure_sufficient_stack(|| {
            let program = Arc::clone(&self.program);
            let scoped = program.block_scopes.contains(&id);
            if scoped {
                self.stack.push_scope(Scope::Block(Vars::default()));
            }
            let result = self.execute_instr(&program, id);
            if scoped {
                self.stack.pop_scope();
            }
            result.map_err(|unwind| unwind.located(&program, program.span(id)))
        })
    }

    fn execute_instr(&mut self, program: &Program, id: InstrId) -> Exec {
        match program.instr(id) {
            Instr::Text(text) => self.write(text)?,

            Instr::Interpolation(expr) => {
                let value = self.eval(expr)?;
                let s = self.to_scalar(&value)?;
                self.write(&s)?;
            }

            Instr::Mixed(children) => {
                for &child in children {
                    self.execute(child)?;
                }
            }

            Instr::If(i) => {
                for (cond, body) in &i.branches {
                    let value = self.eval(cond)?;
                    if self.to_bool(&value)? {
                        return self.execute(*body);
                    }
                }
                if let Some(otherwise) = i.otherwise {
                    self.execute(otherwise)?;
                }
            }

            Instr::List(list) => self.exec_list(list)?,

            Instr::Sep(body) => {
                if self.stack.innermost_loop().is_some_and(|l| l.has_next()) {
                    self.execute(*body)?;
                }
            }

            Instr::Switch(switch) => self.exec_switch(switch)?,

            Instr::Break => return Err(Signal::Break.into()),

            Instr::Return(expr) => {
                let value = match expr {
                    Some(expr) => Some(self.eval(expr)?),
                    None => None,
                };
                return Err(Signal::Return(value).into());
            }

            Instr::Stop(expr) => {
                let message = match expr {
                    Some(expr) => {
                        let value = self.eval(expr)?;
                        Some(self.to_scalar(&value)?)
                    }
                    None => None,
                };
                return Err(Signal::Stop(message).into());
            }

            Instr::Fallback => return Err(Signal::Fallback.into()),

            Instr::Assign(assign) => self.exec_assign(assign)?,

            Instr::Capture(capture) => self.exec_capture(capture)?,

            // Macros are bound when their namespace is created.
            Instr::MacroDef(_) => {}

            Instr::Call(call) => self.exec_call(call)?,

            Instr::Nested(exprs) => self.exec_nested(exprs)?,

            Instr::Escape(escape) => {
                self.escapes.push(Some(escape.placeholder.clone()));
                let result = self.execute(escape.body);
                self.escapes.pop();
                result?;
            }

            Instr::NoEscape(body) => {
                self.escapes.push(None);
                let result = self.execute(*body);
                self.escapes.pop();
                result?;
            }

            Instr::Attempt(attempt) => self.exec_attempt(attempt)?,

            Instr::Import(import) => self.exec_import(import)?,

            Instr::Include(include) => self.exec_include(include)?,

            Instr::Visit(visit) => self.exec_visit(visit, false)?,

            Instr::Recurse(visit) => self.exec_visit(visit, true)?,

            Instr::Setting(setting) => {
                let value = self.eval(&setting.value)?;
                let value = match value {
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => self.to_scalar(&other)?,
                };
                self.settings.set(&setting.name, &value)?;
            }

            Instr::Flush => self.out.flush()?,
        }
        Ok(())
    }

    fn exec_list(&mut self, list: &ListLoop) -> Exec {
        let value = self.eval(&list.iterable)?;
        let entries = match &value {
            Value::Namespace(id) => Some(self.namespace_entries(*id)),
            _ => None,
        };
        let items = iter::items(value, &list.vars, entries)?;
        let state = LoopState::new(list.vars.clone(), items)?;
        if state.is_empty() {
            if let Some(otherwise) = list.otherwise {
                self.execute(otherwise)?;
            }
            return Ok(());
        }

        self.stack.push_scope(Scope::Loop(state));
        let result = self.run_loop(list.body);
        self.stack.pop_scope();
        match result {
            Err(Unwind::Signal(Signal::Break)) => Ok(()),
            result => result,
        }
    }

    fn run_loop(&mut self, body: InstrId) -> Exec {
        while self.stack.advance_loop()? {
            self.check_cancelled()?;
            self.execute(body)?;
        }
        Ok(())
    }

    fn namespace_entries(&self, id: NamespaceId) -> Vec<(String, Value)> {
        let mut entries: Vec<_> = self
            .namespace_vars(id)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn exec_switch(&mut self, switch: &Switch) -> Exec {
        let value = self.eval(&switch.value)?;
        match self.run_switch(switch, &value) {
            Err(Unwind::Signal(Signal::Break)) => Ok(()),
            result => result,
        }
    }

    fn run_switch(&mut self, switch: &Switch, value: &Value) -> Exec {
        let mut start = None;
        for (i, case) in switch.cases.iter().enumerate() {
            if let CaseTest::Case(tests) | CaseTest::On(tests) = &case.test {
                if self.switch_matches(value, tests)? {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| {
            switch
                .cases
                .iter()
                .position(|case| matches!(case.test, CaseTest::Default))
        });
        let Some(start) = start else {
            return Ok(());
        };

        let fall_through = !switch
            .cases
            .iter()
            .any(|case| matches!(case.test, CaseTest::On(_)));
        if !fall_through {
            return self.execute(switch.cases[start].body);
        }
        for case in &switch.cases[start..] {
            self.execute(case.body)?;
        }
        Ok(())
    }

    fn switch_matches(&mut self, value: &Value, tests: &[Expr]) -> Exec<bool> {
        for test in tests {
            let candidate = self.eval(test)?;
            if self.compare(value, &candidate, CompareOp::Eq)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn exec_assign(&mut self, assign: &Assign) -> Exec {
        let value = match (assign.op, &assign.value) {
            (AssignOp::Set, Some(expr)) => self.eval(expr)?,
            (op, expr) => {
                let current = self.read_target(assign)?;
                let (op, rhs) = match (op, expr) {
                    (AssignOp::Increment, _) => (ArithOp::Add, Value::int(1)),
                    (AssignOp::Decrement, _) => (ArithOp::Sub, Value::int(1)),
                    (AssignOp::Add, Some(expr)) => (ArithOp::Add, self.eval(expr)?),
                    (AssignOp::Sub, Some(expr)) => (ArithOp::Sub, self.eval(expr)?),
                    (AssignOp::Mul, Some(expr)) => (ArithOp::Mul, self.eval(expr)?),
                    (AssignOp::Div, Some(expr)) => (ArithOp::Div, self.eval(expr)?),
                    (AssignOp::Rem, Some(expr)) => (ArithOp::Rem, self.eval(expr)?),
                    (AssignOp::Set, _) | (_, None) => {
                        return Err(Error::internal(format!(
                            "{} `{}` is missing its value",
                            assign.scope.directive(),
                            assign.name
                        ))
                        .into())
                    }
                };
                self.arith(op, current, rhs)?
            }
        };
        self.store(assign.scope, &assign.name, assign.namespace.as_ref(), value)
    }

    /// The current value of an assignment target, for compound operators.
    fn read_target(&mut self, assign: &Assign) -> Exec<Value> {
        let current = match assign.scope {
            AssignScope::Local => self.stack.local(&assign.name).cloned(),
            AssignScope::Namespace => {
                let id = self.target_namespace(assign.namespace.as_ref())?;
                self.namespace_vars(id).get(&assign.name).cloned()
            }
            AssignScope::Global => self.globals.get(&assign.name).cloned(),
        };
        current
            .or_else(|| self.resolve(&assign.name))
            .ok_or_else(|| Error::undefined(format!("`{}` is undefined", assign.name)).into())
    }

    fn target_namespace(&mut self, namespace: Option<&Expr>) -> Exec<NamespaceId> {
        match namespace {
            None => Ok(self.current_namespace()),
            Some(expr) => match self.eval(expr)? {
                Value::Namespace(id) => Ok(id),
                other => Err(Error::expected("namespace", other.kind_name()).into()),
            },
        }
    }

    fn store(
        &mut self,
        scope: AssignScope,
        name: &str,
        namespace: Option<&Expr>,
        value: Value,
    ) -> Exec {
        match scope {
            AssignScope::Local => self.declare_local(name, value)?,
            AssignScope::Namespace => {
                let id = self.target_namespace(namespace)?;
                self.namespace_vars_mut(id).insert(name.to_owned(), value);
            }
            AssignScope::Global => self.declare_global(name, value),
        }
        Ok(())
    }

    fn exec_capture(&mut self, capture: &Capture) -> Exec {
        self.out.push_capture();
        let result = self.execute(capture.body);
        let captured = self.out.pop();
        result?;
        self.store(
            capture.scope,
            &capture.name,
            capture.namespace.as_ref(),
            Value::String(captured),
        )
    }

    /// Output of the attempt block is only written when it succeeds; on an
    /// error the recover block runs instead with `.error` set.
    fn exec_attempt(&mut self, attempt: &Attempt) -> Exec {
        self.out.push_capture();
        let result = self.execute(attempt.attempt);
        let captured = self.out.pop();
        match result {
            Ok(()) => self.write(&captured)?,
            Err(Unwind::Error(err)) => {
                warn!(template = %self.program.name, error = %err, "recovering from error");
                self.errors.push(err.message());
                let result = self.execute(attempt.recover);
                self.errors.pop();
                result?;
            }
            Err(signal) => {
                self.write(&captured)?;
                return Err(signal);
            }
        }
        Ok(())
    }

    /// Swaps the executing program, returning the previous one.
    pub(crate) fn swap_program(&mut self, program: Arc<Program>) -> Arc<Program> {
        mem::replace(&mut self.program, program)
    }
}
