//! The instruction tree.
//!
//! Instructions live in an arena owned by [`Ast`] and refer to each other by
//! [`InstrId`]. Every instruction owns either a single nested body or, for
//! [`Instr::Mixed`], an ordered list of children. Parent indices are filled
//! in when the tree is built and are only used to search for the target of
//! `#break`, `#return` and similar statically checked instructions.

use std::sync::Arc;

use crate::types::expr::Expr;
use crate::types::span::Span;

/// A handle to an instruction in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A template before compilation.
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: InstrId,
    pub(crate) source: Option<Arc<str>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub instr: Instr,
    pub span: Span,
    pub parent: Option<InstrId>,
}

impl Ast {
    pub fn root(&self) -> InstrId {
        self.root
    }

    /// The template source, used to print error excerpts.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn get(&self, id: InstrId) -> &Instr {
        &self.nodes[id.index()].instr
    }

    pub fn span(&self, id: InstrId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: InstrId) -> Option<InstrId> {
        self.nodes[id.index()].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn get_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.nodes[id.index()].instr
    }

    /// Iterates over every instruction in the arena.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (InstrId, &Instr)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (InstrId(i as u32), &node.instr))
    }
}

/// A single instruction.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Instr {
    /// Literal text, written as is.
    Text(String),
    /// `${expr}`
    Interpolation(Expr),
    /// A sequence of instructions.
    Mixed(Vec<InstrId>),
    If(If),
    List(ListLoop),
    /// `#sep`; its body is written unless the innermost loop is on its last
    /// item.
    Sep(InstrId),
    Switch(Switch),
    Break,
    Return(Option<Expr>),
    Stop(Option<Expr>),
    Fallback,
    Assign(Assign),
    Capture(Capture),
    MacroDef(Arc<MacroDef>),
    Call(Call),
    /// `#nested` with the values bound to the call site's loop variables.
    Nested(Vec<Expr>),
    Escape(Escape),
    NoEscape(InstrId),
    Attempt(Attempt),
    Import(Import),
    Include(Include),
    Visit(Visit),
    Recurse(Visit),
    Setting(Setting),
    Flush,
}

#[derive(Debug, Clone)]
pub struct If {
    pub branches: Vec<(Expr, InstrId)>,
    pub otherwise: Option<InstrId>,
}

#[derive(Debug, Clone)]
pub struct ListLoop {
    pub iterable: Expr,
    pub vars: LoopVars,
    pub body: InstrId,
    /// Written instead of the body when there is nothing to list.
    pub otherwise: Option<InstrId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopVars {
    Item(String),
    KeyValue(String, String),
}

impl LoopVars {
    pub fn names(&self) -> Vec<&str> {
        match self {
            LoopVars::Item(name) => vec![name.as_str()],
            LoopVars::KeyValue(k, v) => vec![k.as_str(), v.as_str()],
        }
    }

    /// The variable the loop built-ins (`?index`, `?has_next`, ...) apply to.
    pub(crate) fn item(&self) -> &str {
        match self {
            LoopVars::Item(name) => name,
            LoopVars::KeyValue(_, v) => v,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub value: Expr,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub test: CaseTest,
    pub body: InstrId,
}

#[derive(Debug, Clone)]
pub enum CaseTest {
    /// `#case`; execution falls through into the following cases until a
    /// `#break`.
    Case(Vec<Expr>),
    /// `#on`; only this body executes.
    On(Vec<Expr>),
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignScope {
    /// `#local`: the innermost block or macro scope.
    Local,
    /// `#assign`: the current namespace, or the one given with `in`.
    Namespace,
    /// `#global`
    Global,
}

impl AssignScope {
    pub fn directive(self) -> &'static str {
        match self {
            AssignScope::Local => "#local",
            AssignScope::Namespace => "#assign",
            AssignScope::Global => "#global",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Increment,
    Decrement,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub scope: AssignScope,
    pub name: String,
    pub op: AssignOp,
    /// Absent for `++` and `--`.
    pub value: Option<Expr>,
    /// `#assign x = 1 in ns`
    pub namespace: Option<Expr>,
}

/// Assigns the output of the body instead of writing it.
#[derive(Debug, Clone)]
pub struct Capture {
    pub scope: AssignScope,
    pub name: String,
    pub body: InstrId,
    pub namespace: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// Writes output; invoked with `<@name>`.
    Macro,
    /// Returns a value; invoked from expressions.
    Function,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub kind: MacroKind,
    pub params: Vec<Param>,
    /// Collects arguments not matched by a declared parameter.
    pub catch_all: Option<String>,
    pub body: InstrId,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: Expr) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// `<@callee args ; loop_vars>body</@callee>`
#[derive(Debug, Clone)]
pub struct Call {
    pub callee: Expr,
    pub args: CallArgs,
    pub loop_vars: Vec<String>,
    pub body: Option<InstrId>,
}

#[derive(Debug, Clone)]
pub enum CallArgs {
    Positional(Vec<Expr>),
    Named(Vec<(String, Expr)>),
}

impl CallArgs {
    pub fn none() -> Self {
        CallArgs::Positional(Vec::new())
    }

    pub(crate) fn exprs(&self) -> Vec<&Expr> {
        match self {
            CallArgs::Positional(args) => args.iter().collect(),
            CallArgs::Named(args) => args.iter().map(|(_, e)| e).collect(),
        }
    }
}

/// `#escape placeholder as template`
#[derive(Debug, Clone)]
pub struct Escape {
    pub placeholder: String,
    pub template: Expr,
    pub body: InstrId,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub attempt: InstrId,
    pub recover: InstrId,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub template: Expr,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct Include {
    pub template: Expr,
}

/// `#visit node using namespaces` and `#recurse node using namespaces`.
#[derive(Debug, Clone)]
pub struct Visit {
    /// Defaults to `.node` for `#recurse`.
    pub node: Option<Expr>,
    pub using: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct Setting {
    pub name: String,
    pub value: Expr,
}

impl Instr {
    /// A short description of the instruction, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Instr::Text(_) => "text",
            Instr::Interpolation(_) => "${...}",
            Instr::Mixed(_) => "block",
            Instr::If(_) => "#if",
            Instr::List(_) => "#list",
            Instr::Sep(_) => "#sep",
            Instr::Switch(_) => "#switch",
            Instr::Break => "#break",
            Instr::Return(_) => "#return",
            Instr::Stop(_) => "#stop",
            Instr::Fallback => "#fallback",
            Instr::Assign(a) => a.scope.directive(),
            Instr::Capture(c) => c.scope.directive(),
            Instr::MacroDef(def) => match def.kind {
                MacroKind::Macro => "#macro",
                MacroKind::Function => "#function",
            },
            Instr::Call(_) => "<@...>",
            Instr::Nested(_) => "#nested",
            Instr::Escape(_) => "#escape",
            Instr::NoEscape(_) => "#noescape",
            Instr::Attempt(_) => "#attempt",
            Instr::Import(_) => "#import",
            Instr::Include(_) => "#include",
            Instr::Visit(_) => "#visit",
            Instr::Recurse(_) => "#recurse",
            Instr::Setting(_) => "#setting",
            Instr::Flush => "#flush",
        }
    }

    /// The variable names this instruction introduces into its enclosing
    /// scope.
    pub fn declared_names(&self) -> Vec<&str> {
        match self {
            Instr::Assign(a) => vec![a.name.as_str()],
            Instr::Capture(c) => vec![c.name.as_str()],
            Instr::MacroDef(def) => vec![def.name.as_str()],
            Instr::Import(i) => vec![i.namespace.as_str()],
            _ => Vec::new(),
        }
    }

    /// Declares a `#local` variable, for duplicate detection.
    pub(crate) fn local_name(&self) -> Option<&str> {
        match self {
            Instr::Assign(a) if a.scope == AssignScope::Local && a.op == AssignOp::Set => {
                Some(&a.name)
            }
            Instr::Capture(c) if c.scope == AssignScope::Local => Some(&c.name),
            _ => None,
        }
    }

    /// Whether this instruction writes to the innermost local scope.
    pub(crate) fn is_local(&self) -> bool {
        matches!(self, Instr::Assign(a) if a.scope == AssignScope::Local)
            || matches!(self, Instr::Capture(c) if c.scope == AssignScope::Local)
    }

    /// The instructions this one owns, in execution order.
    pub fn children(&self) -> Vec<InstrId> {
        match self {
            Instr::Text(_)
            | Instr::Interpolation(_)
            | Instr::Break
            | Instr::Return(_)
            | Instr::Stop(_)
            | Instr::Fallback
            | Instr::Assign(_)
            | Instr::Nested(_)
            | Instr::Import(_)
            | Instr::Include(_)
            | Instr::Visit(_)
            | Instr::Recurse(_)
            | Instr::Setting(_)
            | Instr::Flush => Vec::new(),
            Instr::Mixed(children) => children.clone(),
            Instr::If(i) => i
                .branches
                .iter()
                .map(|(_, body)| *body)
                .chain(i.otherwise)
                .collect(),
            Instr::List(l) => std::iter::once(l.body).chain(l.otherwise).collect(),
            Instr::Switch(s) => s.cases.iter().map(|c| c.body).collect(),
            Instr::Sep(body) | Instr::NoEscape(body) => vec![*body],
            Instr::Capture(c) => vec![c.body],
            Instr::MacroDef(def) => vec![def.body],
            Instr::Call(c) => c.body.into_iter().collect(),
            Instr::Escape(e) => vec![e.body],
            Instr::Attempt(a) => vec![a.attempt, a.recover],
        }
    }

    /// The expressions this instruction evaluates directly.
    pub(crate) fn exprs(&self) -> Vec<&Expr> {
        match self {
            Instr::Interpolation(e) => vec![e],
            Instr::If(i) => i.branches.iter().map(|(cond, _)| cond).collect(),
            Instr::List(l) => vec![&l.iterable],
            Instr::Switch(s) => {
                let mut out = vec![&s.value];
                for case in &s.cases {
                    if let CaseTest::Case(exprs) | CaseTest::On(exprs) = &case.test {
                        out.extend(exprs);
                    }
                }
                out
            }
            Instr::Return(e) | Instr::Stop(e) => e.iter().collect(),
            Instr::Assign(a) => a.value.iter().chain(a.namespace.as_ref()).collect(),
            Instr::Capture(c) => c.namespace.iter().collect(),
            Instr::MacroDef(def) => def
                .params
                .iter()
                .filter_map(|p| p.default.as_ref())
                .collect(),
            Instr::Call(c) => {
                let mut out = vec![&c.callee];
                out.extend(c.args.exprs());
                out
            }
            Instr::Nested(exprs) => exprs.iter().collect(),
            Instr::Escape(e) => vec![&e.template],
            Instr::Import(i) => vec![&i.template],
            Instr::Include(i) => vec![&i.template],
            Instr::Visit(v) | Instr::Recurse(v) => v.node.iter().chain(&v.using).collect(),
            Instr::Setting(s) => vec![&s.value],
            Instr::Text(_)
            | Instr::Mixed(_)
            | Instr::Sep(_)
            | Instr::Break
            | Instr::Fallback
            | Instr::NoEscape(_)
            | Instr::Attempt(_)
            | Instr::Flush => Vec::new(),
        }
    }
}
