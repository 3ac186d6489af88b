//! Expression nodes and the functions used to construct them.
//!
//! A parser (or a host building templates programmatically) constructs
//! expressions with the free functions in this module:
//!
//! ```
//! use scribe::expr::{add, int, builtin, var};
//!
//! let sum = add(int(1), int(2));
//! let shout = builtin(var("name"), "upper_case", vec![])?;
//! # Ok::<(), scribe::Error>(())
//! ```

use std::fmt;
use std::sync::OnceLock;

use crate::builtins::{self, Builtin};
pub use crate::value::compare::CompareOp;
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// An expression node.
///
/// Immutable once constructed except for the folded-constant slot, which the
/// compiler fills at most once when the expression is proven literal.
#[derive(Clone)]
pub struct Expr {
    pub(crate) kind: ExprKind,
    pub(crate) span: Span,
    pub(crate) constant: OnceLock<Constant>,
}

/// The result of folding a literal expression.
#[derive(Debug, Clone)]
pub(crate) enum Constant {
    Value(Value),
    /// Folding failed; the error is reported when the expression is
    /// evaluated, not when the template is compiled.
    Invalid(Error),
}

/// The different kinds of expression.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ExprKind {
    Literal(Value),
    Variable(String),
    Special(Special),
    /// `target.key`
    Dot { target: Box<Expr>, key: String },
    /// `target[index]`, where the index is a number, a string or a range.
    Index { target: Box<Expr>, index: Box<Expr> },
    Range {
        start: Box<Expr>,
        end: Option<Box<Expr>>,
        kind: RangeKind,
    },
    ListLiteral(Vec<Expr>),
    HashLiteral(Vec<(Expr, Expr)>),
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `target?name(args)`, resolved against the built-in table when
    /// constructed.
    Builtin {
        target: Box<Expr>,
        builtin: &'static Builtin,
        args: Vec<Expr>,
    },
    /// `target!default`
    Default {
        target: Box<Expr>,
        default: Option<Box<Expr>>,
    },
    /// `target??`
    Exists(Box<Expr>),
    /// `target(args)`
    Call { target: Box<Expr>, args: Vec<Expr> },
    /// `(inner)`; makes `!` and `??` tolerate a missing value anywhere in
    /// the inner chain.
    Paren(Box<Expr>),
}

/// Arithmetic operators. `+` also concatenates strings and sequences and
/// merges hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    /// `a..b`
    Inclusive,
    /// `a..<b`
    Exclusive,
    /// `a..`
    Unbounded,
}

/// Variables provided by the engine, written `.name` in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    Locale,
    Lang,
    Now,
    TemplateName,
    Main,
    Namespace,
    Globals,
    DataModel,
    Vars,
    Error,
    Node,
}

impl Special {
    pub fn from_name(name: &str) -> Option<Self> {
        let special = match name {
            "locale" => Self::Locale,
            "lang" => Self::Lang,
            "now" => Self::Now,
            "template_name" | "current_template_name" => Self::TemplateName,
            "main" => Self::Main,
            "namespace" => Self::Namespace,
            "globals" => Self::Globals,
            "data_model" => Self::DataModel,
            "vars" => Self::Vars,
            "error" => Self::Error,
            "node" => Self::Node,
            _ => return None,
        };
        Some(special)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Locale => "locale",
            Self::Lang => "lang",
            Self::Now => "now",
            Self::TemplateName => "template_name",
            Self::Main => "main",
            Self::Namespace => "namespace",
            Self::Globals => "globals",
            Self::DataModel => "data_model",
            Self::Vars => "vars",
            Self::Error => "error",
            Self::Node => "node",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::EMPTY,
            constant: OnceLock::new(),
        }
    }

    /// Sets the source span this expression was parsed from.
    pub fn at(mut self, span: impl Into<Span>) -> Self {
        self.span = span.into();
        self
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The folded value, if the compiler proved this expression literal and
    /// folding succeeded.
    pub fn constant(&self) -> Option<&Value> {
        match self.constant.get() {
            Some(Constant::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Whether every operand is literal and every operator side-effect free,
    /// so that evaluating the expression always yields the same value.
    pub fn is_literal(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Variable(_)
            | ExprKind::Special(_)
            | ExprKind::Default { .. }
            | ExprKind::Exists(_)
            | ExprKind::Call { .. } => false,
            ExprKind::Builtin { builtin, .. } if !builtin.is_pure() => false,
            _ => self.children().all(Expr::is_literal),
        }
    }

    /// Iterates over the direct operands.
    pub fn children(&self) -> impl Iterator<Item = &Expr> + '_ {
        let mut out: Vec<&Expr> = Vec::new();
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Special(_) => {}
            ExprKind::Dot { target, .. } => out.push(target),
            ExprKind::Index { target, index } => {
                out.push(target);
                out.push(index);
            }
            ExprKind::Range { start, end, .. } => {
                out.push(start);
                out.extend(end.as_deref());
            }
            ExprKind::ListLiteral(items) => out.extend(items),
            ExprKind::HashLiteral(pairs) => {
                for (k, v) in pairs {
                    out.push(k);
                    out.push(v);
                }
            }
            ExprKind::Arithmetic { lhs, rhs, .. }
            | ExprKind::Compare { lhs, rhs, .. }
            | ExprKind::And(lhs, rhs)
            | ExprKind::Or(lhs, rhs) => {
                out.push(lhs);
                out.push(rhs);
            }
            ExprKind::Negate(e) | ExprKind::Not(e) | ExprKind::Exists(e) | ExprKind::Paren(e) => {
                out.push(e)
            }
            ExprKind::Builtin { target, args, .. } | ExprKind::Call { target, args } => {
                out.push(target);
                out.extend(args);
            }
            ExprKind::Default { target, default } => {
                out.push(target);
                out.extend(default.as_deref());
            }
        }
        out.into_iter()
    }

    /// Applies `f` to each direct operand.
    pub(crate) fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Special(_) => {}
            ExprKind::Dot { target, .. } => f(target),
            ExprKind::Index { target, index } => {
                f(target);
                f(index);
            }
            ExprKind::Range { start, end, .. } => {
                f(start);
                if let Some(end) = end {
                    f(end);
                }
            }
            ExprKind::ListLiteral(items) => items.iter_mut().for_each(|e| f(e)),
            ExprKind::HashLiteral(pairs) => {
                for (k, v) in pairs {
                    f(k);
                    f(v);
                }
            }
            ExprKind::Arithmetic { lhs, rhs, .. }
            | ExprKind::Compare { lhs, rhs, .. }
            | ExprKind::And(lhs, rhs)
            | ExprKind::Or(lhs, rhs) => {
                f(lhs);
                f(rhs);
            }
            ExprKind::Negate(e) | ExprKind::Not(e) | ExprKind::Exists(e) | ExprKind::Paren(e) => {
                f(e)
            }
            ExprKind::Builtin { target, args, .. } | ExprKind::Call { target, args } => {
                f(target);
                args.iter_mut().for_each(|e| f(e));
            }
            ExprKind::Default { target, default } => {
                f(target);
                if let Some(default) = default {
                    f(default);
                }
            }
        }
    }

    /// Returns a copy of this expression with every reference to the
    /// variable `placeholder` replaced by `replacement`.
    pub(crate) fn substitute(&self, placeholder: &str, replacement: &Expr) -> Expr {
        let mut out = self.clone();
        out.substitute_in_place(placeholder, replacement);
        out
    }

    fn substitute_in_place(&mut self, placeholder: &str, replacement: &Expr) {
        if matches!(&self.kind, ExprKind::Variable(name) if name == placeholder) {
            *self = replacement.clone();
            return;
        }
        self.for_each_child_mut(&mut |child| child.substitute_in_place(placeholder, replacement));
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind, f)
    }
}

/// Renders an expression back to template syntax, for diagnostics.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(Value::String(s)) => write!(f, "{s:?}"),
            ExprKind::Literal(Value::Number(n)) => write!(f, "{n}"),
            ExprKind::Literal(Value::Bool(b)) => write!(f, "{b}"),
            ExprKind::Literal(v) => write!(f, "<{}>", v.kind_name()),
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Special(s) => write!(f, ".{}", s.name()),
            ExprKind::Dot { target, key } => write!(f, "{target}.{key}"),
            ExprKind::Index { target, index } => write!(f, "{target}[{index}]"),
            ExprKind::Range { start, end, kind } => match (kind, end) {
                (RangeKind::Exclusive, Some(end)) => write!(f, "{start}..<{end}"),
                (_, Some(end)) => write!(f, "{start}..{end}"),
                (_, None) => write!(f, "{start}.."),
            },
            ExprKind::ListLiteral(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            ExprKind::HashLiteral(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            ExprKind::Arithmetic { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            ExprKind::Negate(e) => write!(f, "-{e}"),
            ExprKind::Not(e) => write!(f, "!{e}"),
            ExprKind::Compare { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            ExprKind::And(lhs, rhs) => write!(f, "{lhs} && {rhs}"),
            ExprKind::Or(lhs, rhs) => write!(f, "{lhs} || {rhs}"),
            ExprKind::Builtin {
                target,
                builtin,
                args,
            } => {
                write!(f, "{target}?{}", builtin.name())?;
                if !args.is_empty() {
                    f.write_str("(")?;
                    write_list(f, args)?;
                    f.write_str(")")?;
                }
                Ok(())
            }
            ExprKind::Default { target, default } => match default {
                Some(d) => write!(f, "{target}!{d}"),
                None => write!(f, "{target}!"),
            },
            ExprKind::Exists(e) => write!(f, "{e}??"),
            ExprKind::Call { target, args } => {
                write!(f, "{target}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Paren(e) => write!(f, "({e})"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Constructors
////////////////////////////////////////////////////////////////////////////////

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::new(ExprKind::Literal(value.into()))
}

/// A string literal.
pub fn string(s: impl Into<String>) -> Expr {
    lit(s.into())
}

/// An integer literal.
pub fn int(i: i64) -> Expr {
    lit(i)
}

/// A floating point literal.
pub fn float(f: f64) -> Expr {
    lit(f)
}

/// A boolean literal.
pub fn boolean(b: bool) -> Expr {
    lit(b)
}

/// A reference to a variable, resolved through the scope chain.
pub fn var(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Variable(name.into()))
}

/// A special variable such as `.now` or `.locale`, given without the dot.
pub fn special(name: &str) -> Result<Expr> {
    Special::from_name(name)
        .map(|s| Expr::new(ExprKind::Special(s)))
        .ok_or_else(|| Error::invalid(format!("unknown special variable `.{name}`")))
}

pub fn dot(target: Expr, key: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Dot {
        target: Box::new(target),
        key: key.into(),
    })
}

pub fn index(target: Expr, index: Expr) -> Expr {
    Expr::new(ExprKind::Index {
        target: Box::new(target),
        index: Box::new(index),
    })
}

/// `start..end`
pub fn range(start: Expr, end: Expr) -> Expr {
    Expr::new(ExprKind::Range {
        start: Box::new(start),
        end: Some(Box::new(end)),
        kind: RangeKind::Inclusive,
    })
}

/// `start..<end`
pub fn range_exclusive(start: Expr, end: Expr) -> Expr {
    Expr::new(ExprKind::Range {
        start: Box::new(start),
        end: Some(Box::new(end)),
        kind: RangeKind::Exclusive,
    })
}

/// `start..`
pub fn range_from(start: Expr) -> Expr {
    Expr::new(ExprKind::Range {
        start: Box::new(start),
        end: None,
        kind: RangeKind::Unbounded,
    })
}

pub fn list(items: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::ListLiteral(items))
}

pub fn hash(pairs: Vec<(Expr, Expr)>) -> Expr {
    Expr::new(ExprKind::HashLiteral(pairs))
}

pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Arithmetic {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    arith(ArithOp::Add, lhs, rhs)
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    arith(ArithOp::Sub, lhs, rhs)
}

pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
    arith(ArithOp::Mul, lhs, rhs)
}

pub fn div(lhs: Expr, rhs: Expr) -> Expr {
    arith(ArithOp::Div, lhs, rhs)
}

pub fn rem(lhs: Expr, rhs: Expr) -> Expr {
    arith(ArithOp::Rem, lhs, rhs)
}

pub fn neg(e: Expr) -> Expr {
    Expr::new(ExprKind::Negate(Box::new(e)))
}

pub fn not(e: Expr) -> Expr {
    Expr::new(ExprKind::Not(Box::new(e)))
}

pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Compare {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Eq, lhs, rhs)
}

pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Ne, lhs, rhs)
}

pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Lt, lhs, rhs)
}

pub fn le(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Le, lhs, rhs)
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Gt, lhs, rhs)
}

pub fn ge(lhs: Expr, rhs: Expr) -> Expr {
    compare(CompareOp::Ge, lhs, rhs)
}

pub fn and(lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ExprKind::And(Box::new(lhs), Box::new(rhs)))
}

pub fn or(lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Or(Box::new(lhs), Box::new(rhs)))
}

/// `target?name(args)`.
///
/// Fails if `name` is not a known built-in or the argument count does not
/// fit it.
pub fn builtin(target: Expr, name: &str, args: Vec<Expr>) -> Result<Expr> {
    let builtin = builtins::lookup(name)
        .ok_or_else(|| Error::invalid(format!("unknown built-in `?{name}`")))?;
    builtin.check_arity(args.len())?;
    Ok(Expr::new(ExprKind::Builtin {
        target: Box::new(target),
        builtin,
        args,
    }))
}

/// `target!default`, or `target!` when `default` is `None`.
pub fn default(target: Expr, default: Option<Expr>) -> Expr {
    Expr::new(ExprKind::Default {
        target: Box::new(target),
        default: default.map(Box::new),
    })
}

/// `target??`
pub fn exists(target: Expr) -> Expr {
    Expr::new(ExprKind::Exists(Box::new(target)))
}

/// `target(args)`
pub fn call(target: Expr, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        target: Box::new(target),
        args,
    })
}

pub fn paren(inner: Expr) -> Expr {
    Expr::new(ExprKind::Paren(Box::new(inner)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_detection() {
        assert!(add(int(1), int(2)).is_literal());
        assert!(list(vec![string("a"), int(1)]).is_literal());
        assert!(!add(int(1), var("x")).is_literal());
        let upper = builtin(string("ab"), "upper_case", vec![]).unwrap();
        assert!(upper.is_literal());
        let has_content = builtin(var("x"), "has_content", vec![]).unwrap();
        assert!(!has_content.is_literal());
        assert!(!default(string("a"), None).is_literal());
    }

    #[test]
    fn unknown_builtin_fails_at_construction() {
        let err = builtin(var("x"), "no_such_thing", vec![]).unwrap_err();
        assert!(err.is_invalid_operation());
        assert_eq!(err.to_string(), "unknown built-in `?no_such_thing`");
    }

    #[test]
    fn builtin_arity_checked_at_construction() {
        let err = builtin(var("x"), "upper_case", vec![int(1)]).unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn substitute_replaces_every_placeholder() {
        let template = add(var("x"), var("x"));
        let out = template.substitute("x", &string("a"));
        assert_eq!(out.to_string(), r#""a" + "a""#);
        assert_eq!(template.to_string(), "x + x");
    }

    #[test]
    fn display_round_trips_syntax() {
        let e = default(dot(var("user"), "name"), Some(string("anon")));
        assert_eq!(e.to_string(), r#"user.name!"anon""#);
        let e = builtin(var("xs"), "join", vec![string(", ")]).unwrap();
        assert_eq!(e.to_string(), r#"xs?join(", ")"#);
    }
}
