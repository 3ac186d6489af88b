//! Programmatic construction of an [`Ast`].
//!
//! A parser is expected to drive the builder while walking its own syntax
//! tree. Blocks are built with closures, the builder links children to their
//! parents as each block closes.
//!
//! ```
//! use scribe::expr::{add, int, var};
//! use scribe::Builder;
//!
//! let mut b = Builder::new();
//! b.text("1 + 2 = ").interpolate(add(int(1), int(2)));
//! b.list(var("users"), "user", |b| {
//!     b.interpolate(var("user"));
//! });
//! let ast = b.finish();
//! ```

use std::sync::Arc;

use crate::types::ast::{
    Assign, AssignOp, AssignScope, Ast, Attempt, Call, CallArgs, Capture, Case, CaseTest, Escape,
    If, Import, Include, Instr, InstrId, ListLoop, LoopVars, MacroDef, MacroKind, Node, Param,
    Setting, Switch, Visit,
};
use crate::types::expr::Expr;
use crate::types::span::Span;

/// A block of instructions built by a closure.
pub type Block<'a> = Box<dyn FnOnce(&mut Builder) + 'a>;

/// Pairs a `#switch` test with its body, for [`Builder::switch`].
pub fn case<'a>(test: CaseTest, body: impl FnOnce(&mut Builder) + 'a) -> (CaseTest, Block<'a>) {
    (test, Box::new(body))
}

/// Incrementally builds an [`Ast`].
#[derive(Debug)]
pub struct Builder {
    nodes: Vec<Node>,
    /// Children of each block that is still open, innermost last.
    open: Vec<Vec<InstrId>>,
    span: Option<Span>,
    source: Option<Arc<str>>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            open: vec![Vec::new()],
            span: None,
            source: None,
        }
    }

    /// Keeps the template source so that errors can print an excerpt.
    pub fn with_source(source: impl Into<Arc<str>>) -> Self {
        let mut b = Self::new();
        b.source = Some(source.into());
        b
    }

    /// Sets the span of the next instruction added.
    pub fn at(&mut self, span: impl Into<Span>) -> &mut Self {
        self.span = Some(span.into());
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.add(Instr::Text(text.into()));
        self
    }

    /// `${expr}`
    pub fn interpolate(&mut self, expr: Expr) -> &mut Self {
        self.add(Instr::Interpolation(expr));
        self
    }

    /// `#if cond`
    pub fn if_(&mut self, cond: Expr, then: impl FnOnce(&mut Builder)) -> &mut Self {
        let span = self.span.take();
        let body = self.block(then);
        self.span = span;
        self.add(Instr::If(If {
            branches: vec![(cond, body)],
            otherwise: None,
        }));
        self
    }

    /// `#if cond ... #else ...`
    pub fn if_else(
        &mut self,
        cond: Expr,
        then: impl FnOnce(&mut Builder),
        otherwise: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let span = self.span.take();
        let body = self.block(then);
        let otherwise = self.block(otherwise);
        self.span = span;
        self.add(Instr::If(If {
            branches: vec![(cond, body)],
            otherwise: Some(otherwise),
        }));
        self
    }

    /// `#if ... #elseif ... #else`
    pub fn choose(
        &mut self,
        branches: Vec<(Expr, Block<'_>)>,
        otherwise: Option<Block<'_>>,
    ) -> &mut Self {
        let span = self.span.take();
        let branches = branches
            .into_iter()
            .map(|(cond, f)| (cond, self.block(f)))
            .collect();
        let otherwise = otherwise.map(|f| self.block(f));
        self.span = span;
        self.add(Instr::If(If {
            branches,
            otherwise,
        }));
        self
    }

    /// `#list iterable as var`
    pub fn list(
        &mut self,
        iterable: Expr,
        var: impl Into<String>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        self.list_else(iterable, LoopVars::Item(var.into()), body, None)
    }

    /// `#list hash as key, value`
    pub fn list_pairs(
        &mut self,
        iterable: Expr,
        key: impl Into<String>,
        value: impl Into<String>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let vars = LoopVars::KeyValue(key.into(), value.into());
        self.list_else(iterable, vars, body, None)
    }

    /// `#list ... #else ...`
    pub fn list_else(
        &mut self,
        iterable: Expr,
        vars: LoopVars,
        body: impl FnOnce(&mut Builder),
        otherwise: Option<Block<'_>>,
    ) -> &mut Self {
        let span = self.span.take();
        let body = self.block(body);
        let otherwise = otherwise.map(|f| self.block(f));
        self.span = span;
        self.add(Instr::List(ListLoop {
            iterable,
            vars,
            body,
            otherwise,
        }));
        self
    }

    /// `#sep`
    pub fn sep(&mut self, body: impl FnOnce(&mut Builder)) -> &mut Self {
        self.wrap(body, Instr::Sep)
    }

    /// `#switch value` with `#case`, `#on` and `#default` bodies in order.
    pub fn switch(&mut self, value: Expr, cases: Vec<(CaseTest, Block<'_>)>) -> &mut Self {
        let span = self.span.take();
        let cases = cases
            .into_iter()
            .map(|(test, f)| Case {
                test,
                body: self.block(f),
            })
            .collect();
        self.span = span;
        self.add(Instr::Switch(Switch { value, cases }));
        self
    }

    pub fn break_(&mut self) -> &mut Self {
        self.add(Instr::Break);
        self
    }

    pub fn return_(&mut self, value: Option<Expr>) -> &mut Self {
        self.add(Instr::Return(value));
        self
    }

    pub fn stop(&mut self, message: Option<Expr>) -> &mut Self {
        self.add(Instr::Stop(message));
        self
    }

    pub fn fallback(&mut self) -> &mut Self {
        self.add(Instr::Fallback);
        self
    }

    /// `#assign name = value`
    pub fn assign(&mut self, name: impl Into<String>, value: Expr) -> &mut Self {
        self.assign_with(AssignScope::Namespace, name, AssignOp::Set, Some(value))
    }

    /// `#local name = value`
    pub fn local(&mut self, name: impl Into<String>, value: Expr) -> &mut Self {
        self.assign_with(AssignScope::Local, name, AssignOp::Set, Some(value))
    }

    /// `#global name = value`
    pub fn global(&mut self, name: impl Into<String>, value: Expr) -> &mut Self {
        self.assign_with(AssignScope::Global, name, AssignOp::Set, Some(value))
    }

    /// Any assignment form, for example `#assign x += 1` or `#local i++`.
    pub fn assign_with(
        &mut self,
        scope: AssignScope,
        name: impl Into<String>,
        op: AssignOp,
        value: Option<Expr>,
    ) -> &mut Self {
        self.add(Instr::Assign(Assign {
            scope,
            name: name.into(),
            op,
            value,
            namespace: None,
        }));
        self
    }

    /// `#assign name = value in namespace`
    pub fn assign_in(
        &mut self,
        namespace: Expr,
        name: impl Into<String>,
        value: Expr,
    ) -> &mut Self {
        self.add(Instr::Assign(Assign {
            scope: AssignScope::Namespace,
            name: name.into(),
            op: AssignOp::Set,
            value: Some(value),
            namespace: Some(namespace),
        }));
        self
    }

    /// `#assign name>body</#assign>` and its `#local` and `#global` forms.
    pub fn capture(
        &mut self,
        scope: AssignScope,
        name: impl Into<String>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let name = name.into();
        self.wrap(body, |body| {
            Instr::Capture(Capture {
                scope,
                name,
                body,
                namespace: None,
            })
        })
    }

    /// `#macro name params`
    pub fn macro_def(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        self.define(name, MacroKind::Macro, params, None, body)
    }

    /// `#function name params`
    pub fn function_def(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        self.define(name, MacroKind::Function, params, None, body)
    }

    /// A macro or function definition with a catch-all parameter
    /// (`others...`).
    pub fn define(
        &mut self,
        name: impl Into<String>,
        kind: MacroKind,
        params: Vec<Param>,
        catch_all: Option<String>,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let name = name.into();
        self.wrap(body, |body| {
            Instr::MacroDef(Arc::new(MacroDef {
                name,
                kind,
                params,
                catch_all,
                body,
            }))
        })
    }

    /// `<@callee args/>`
    pub fn call(&mut self, callee: Expr, args: CallArgs) -> &mut Self {
        self.add(Instr::Call(Call {
            callee,
            args,
            loop_vars: Vec::new(),
            body: None,
        }));
        self
    }

    /// `<@callee args ; loop_vars>body</@callee>`
    pub fn call_with_body(
        &mut self,
        callee: Expr,
        args: CallArgs,
        loop_vars: &[&str],
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let loop_vars = loop_vars.iter().map(|v| String::from(*v)).collect();
        self.wrap(body, |body| {
            Instr::Call(Call {
                callee,
                args,
                loop_vars,
                body: Some(body),
            })
        })
    }

    /// `#nested values`
    pub fn nested(&mut self, values: Vec<Expr>) -> &mut Self {
        self.add(Instr::Nested(values));
        self
    }

    /// `#escape placeholder as template`
    pub fn escape(
        &mut self,
        placeholder: impl Into<String>,
        template: Expr,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let placeholder = placeholder.into();
        self.wrap(body, |body| {
            Instr::Escape(Escape {
                placeholder,
                template,
                body,
            })
        })
    }

    /// `#noescape`
    pub fn noescape(&mut self, body: impl FnOnce(&mut Builder)) -> &mut Self {
        self.wrap(body, Instr::NoEscape)
    }

    /// `#attempt ... #recover ...`
    pub fn attempt(
        &mut self,
        attempt: impl FnOnce(&mut Builder),
        recover: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let span = self.span.take();
        let attempt = self.block(attempt);
        let recover = self.block(recover);
        self.span = span;
        self.add(Instr::Attempt(Attempt { attempt, recover }));
        self
    }

    /// `#import template as namespace`
    pub fn import(&mut self, template: Expr, namespace: impl Into<String>) -> &mut Self {
        self.add(Instr::Import(Import {
            template,
            namespace: namespace.into(),
        }));
        self
    }

    /// `#include template`
    pub fn include(&mut self, template: Expr) -> &mut Self {
        self.add(Instr::Include(Include { template }));
        self
    }

    /// `#visit node using namespaces`
    pub fn visit(&mut self, node: Expr, using: Vec<Expr>) -> &mut Self {
        self.add(Instr::Visit(Visit {
            node: Some(node),
            using,
        }));
        self
    }

    /// `#recurse node using namespaces`; the node defaults to `.node`.
    pub fn recurse(&mut self, node: Option<Expr>, using: Vec<Expr>) -> &mut Self {
        self.add(Instr::Recurse(Visit { node, using }));
        self
    }

    /// `#setting name = value`
    pub fn setting(&mut self, name: impl Into<String>, value: Expr) -> &mut Self {
        self.add(Instr::Setting(Setting {
            name: name.into(),
            value,
        }));
        self
    }

    pub fn flush(&mut self) -> &mut Self {
        self.add(Instr::Flush);
        self
    }

    /// Closes the root block and returns the tree.
    pub fn finish(mut self) -> Ast {
        let children = self.open.pop().unwrap_or_default();
        let root = self.push(Instr::Mixed(children), None);
        Ast {
            nodes: self.nodes,
            root,
            source: self.source,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    ////////////////////////////////////////////////////////////////////////////
    // Internals
    ////////////////////////////////////////////////////////////////////////////

    /// Builds a block, returning the id of the [`Instr::Mixed`] holding it.
    fn block(&mut self, f: impl FnOnce(&mut Builder)) -> InstrId {
        self.open.push(Vec::new());
        f(self);
        let children = self.open.pop().unwrap_or_default();
        self.push(Instr::Mixed(children), None)
    }

    fn wrap(
        &mut self,
        body: impl FnOnce(&mut Builder),
        f: impl FnOnce(InstrId) -> Instr,
    ) -> &mut Self {
        let span = self.span.take();
        let body = self.block(body);
        self.span = span;
        let instr = f(body);
        self.add(instr);
        self
    }

    /// Adds an instruction to the innermost open block.
    fn add(&mut self, instr: Instr) -> InstrId {
        let span = self.span.take();
        let id = self.push(instr, span);
        if let Some(children) = self.open.last_mut() {
            children.push(id);
        }
        id
    }

    fn push(&mut self, instr: Instr, span: Option<Span>) -> InstrId {
        let id = InstrId(self.nodes.len() as u32);
        let span = span.unwrap_or_else(|| {
            instr
                .children()
                .iter()
                .map(|c| self.nodes[c.index()].span)
                .fold(Span::EMPTY, Span::combine)
        });
        for child in instr.children() {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(Node {
            instr,
            span,
            parent: None,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::expr::{boolean, int, var};

    #[test]
    fn parents_are_linked() {
        let mut b = Builder::new();
        b.if_(boolean(true), |b| {
            b.text("yes");
        });
        let ast = b.finish();

        let root = ast.root();
        let Instr::Mixed(children) = ast.get(root) else {
            panic!("root is not a block")
        };
        let cond = children[0];
        assert_eq!(ast.parent(cond), Some(root));

        let Instr::If(i) = ast.get(cond) else {
            panic!("expected #if")
        };
        let body = i.branches[0].1;
        assert_eq!(ast.parent(body), Some(cond));
        let Instr::Mixed(inner) = ast.get(body) else {
            panic!("body is not a block")
        };
        assert!(matches!(ast.get(inner[0]), Instr::Text(t) if t == "yes"));
        assert_eq!(ast.parent(inner[0]), Some(body));
    }

    #[test]
    fn spans_apply_to_next_instruction() {
        let mut b = Builder::with_source("${x}");
        b.at(0..4).interpolate(var("x"));
        b.text("tail");
        let ast = b.finish();
        let Instr::Mixed(children) = ast.get(ast.root()) else {
            panic!("root is not a block")
        };
        assert_eq!(ast.span(children[0]), Span::from(0..4));
        assert!(ast.span(children[1]).is_empty());
        assert_eq!(ast.span(ast.root()), Span::from(0..4));
    }

    #[test]
    fn container_keeps_its_span_across_the_body() {
        let mut b = Builder::new();
        b.at(0..10).list(var("xs"), "x", |b| {
            b.at(3..7).interpolate(int(1));
        });
        let ast = b.finish();
        let Instr::Mixed(children) = ast.get(ast.root()) else {
            panic!("root is not a block")
        };
        assert_eq!(ast.span(children[0]), Span::from(0..10));
    }
}
