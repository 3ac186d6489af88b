use std::sync::Arc;

use crate::builtins::{Builtin, BuiltinFn};
use crate::render::env::Environment;
use crate::render::grow::ensure_sufficient_stack;
use crate::render::range::RangeSeq;
use crate::render::signal::{Exec, Unwind};
use crate::render::stack::NamespaceId;
use crate::types::expr::{ArithOp, Constant, Expr, ExprKind, RangeKind, Special};
use crate::value::{Capabilities, Date, List, Map, Value};
use crate::{Error, Result};

impl Expr {
    /// Evaluates this expression in the given environment.
    pub fn evaluate(&self, env: &mut Environment<'_>) -> Exec<Value> {
        env.eval(self)
    }
}

impl Environment<'_> {
    /// Evaluates an expression to exactly one value.
    pub fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr.constant.get() {
            Some(Constant::Value(value)) => return Ok(value.clone()),
            Some(Constant::Invalid(err)) => return Err(self.locate(err.clone(), expr).into()),
            None => {}
        }
        ensure_sufficient_stack(|| self.eval_kind(expr)).map_err(|u| self.locate_unwind(u, expr))
    }

    /// Evaluates an expression that may be missing, as the operand of `!`,
    /// `??` and the existence built-ins do.
    ///
    /// Only the expression itself may be absent; a missing intermediate in
    /// `a.b.c` is still an error unless the chain is parenthesized.
    /// [`Value::Null`] counts as absent.
    pub fn evaluate_optional(&mut self, expr: &Expr) -> Exec<Option<Value>> {
        self.optional(expr, false)
    }

    fn locate(&self, err: Error, expr: &Expr) -> Error {
        if expr.span.is_empty() {
            return err;
        }
        err.located(&self.program.name, self.program.source(), expr.span)
    }

    fn locate_unwind(&self, unwind: Unwind, expr: &Expr) -> Unwind {
        match unwind {
            Unwind::Error(err) => Unwind::Error(self.locate(err, expr)),
            signal => signal,
        }
    }

    fn eval_kind(&mut self, expr: &Expr) -> Exec<Value> {
        let value = match &expr.kind {
            ExprKind::Literal(value) => value.clone(),

            ExprKind::Variable(name) => self
                .resolve(name)
                .ok_or_else(|| Error::undefined(format!("`{name}` is undefined")))?,

            ExprKind::Special(special) => self.special(*special)?,

            ExprKind::Dot { target, key } => {
                let target = self.eval(target)?;
                self.member(&target, key)?
                    .ok_or_else(|| Error::undefined(format!("`{expr}` is undefined")))?
            }

            ExprKind::Index { target, index } => {
                let target = self.eval(target)?;
                self.index_expr(target, index)?
                    .ok_or_else(|| Error::undefined(format!("`{expr}` is undefined")))?
            }

            ExprKind::Range { start, end, kind } => {
                let start = self.eval_int(start)?;
                let range = match end {
                    Some(end) => RangeSeq::new(start, self.eval_int(end)?, *kind),
                    None => RangeSeq::unbounded(start),
                };
                Value::Object(Arc::new(range))
            }

            ExprKind::ListLiteral(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Exec<List<_>>>()?,
            ),

            ExprKind::HashLiteral(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    let key = match self.eval(key)? {
                        Value::String(s) => s,
                        other => {
                            return Err(Error::expected("string key", other.kind_name()).into())
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                Value::Map(map)
            }

            ExprKind::Arithmetic { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.arith(*op, lhs, rhs)?
            }

            ExprKind::Negate(inner) => {
                let value = self.eval(inner)?;
                Value::Number(self.to_number(&value)?.neg())
            }

            ExprKind::Not(inner) => {
                let value = self.eval(inner)?;
                Value::Bool(!self.to_bool(&value)?)
            }

            ExprKind::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Value::Bool(self.compare(&lhs, &rhs, *op)?)
            }

            ExprKind::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if !self.to_bool(&lhs)? {
                    return Ok(Value::Bool(false));
                }
                let rhs = self.eval(rhs)?;
                Value::Bool(self.to_bool(&rhs)?)
            }

            ExprKind::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if self.to_bool(&lhs)? {
                    return Ok(Value::Bool(true));
                }
                let rhs = self.eval(rhs)?;
                Value::Bool(self.to_bool(&rhs)?)
            }

            ExprKind::Builtin {
                target,
                builtin,
                args,
            } => match builtin.call {
                BuiltinFn::Value(_) => {
                    let target = self.eval(target)?;
                    self.apply_builtin(builtin, target, args)?
                }
                BuiltinFn::Unevaluated(f) => f(self, target, args)?,
            },

            ExprKind::Default { target, default } => match self.evaluate_optional(target)? {
                Some(value) => value,
                None => match default {
                    Some(default) => self.eval(default)?,
                    None => Value::String(String::new()),
                },
            },

            ExprKind::Exists(target) => Value::Bool(self.evaluate_optional(target)?.is_some()),

            ExprKind::Call { target, args } => {
                let callee = self.eval(target)?;
                self.call_exprs(callee, args)?
            }

            ExprKind::Paren(inner) => self.eval(inner)?,
        };
        Ok(value)
    }

    fn optional(&mut self, expr: &Expr, deep: bool) -> Exec<Option<Value>> {
        if expr.constant.get().is_some() {
            let value = self.eval(expr)?;
            return Ok(Some(value).filter(|v| !v.is_null()));
        }
        let result = self.optional_kind(expr, deep);
        let value = result.map_err(|u| self.locate_unwind(u, expr))?;
        Ok(value.filter(|v| !v.is_null()))
    }

    fn optional_kind(&mut self, expr: &Expr, deep: bool) -> Exec<Option<Value>> {
        let value = match &expr.kind {
            ExprKind::Variable(name) => self.resolve(name),
            ExprKind::Paren(inner) => self.optional(inner, true)?,
            ExprKind::Dot { target, key } => {
                let Some(target) = self.operand(target, deep)? else {
                    return Ok(None);
                };
                self.member(&target, key)?
            }
            ExprKind::Index { target, index } => {
                let Some(target) = self.operand(target, deep)? else {
                    return Ok(None);
                };
                self.index_expr(target, index)?
            }
            ExprKind::Builtin {
                target,
                builtin,
                args,
            } if deep && matches!(builtin.call, BuiltinFn::Value(_)) => {
                let Some(target) = self.operand(target, true)? else {
                    return Ok(None);
                };
                Some(self.apply_builtin(builtin, target, args)?)
            }
            ExprKind::Call { target, args } if deep => {
                let Some(callee) = self.operand(target, true)? else {
                    return Ok(None);
                };
                Some(self.call_exprs(callee, args)?)
            }
            _ => Some(self.eval(expr)?),
        };
        Ok(value)
    }

    /// In deep mode a missing or null operand makes the whole chain absent;
    /// otherwise the operand must exist.
    fn operand(&mut self, target: &Expr, deep: bool) -> Exec<Option<Value>> {
        if deep {
            self.optional(target, true)
        } else {
            self.eval(target).map(Some)
        }
    }

    fn apply_builtin(&mut self, builtin: &Builtin, target: Value, args: &[Expr]) -> Exec<Value> {
        let BuiltinFn::Value(f) = builtin.call else {
            return Err(Error::internal(format!(
                "built-in `?{}` does not take an evaluated target",
                builtin.name()
            ))
            .into());
        };
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Exec<Vec<_>>>()?;
        Ok(f(self, target, args)?)
    }

    fn call_exprs(&mut self, callee: Value, args: &[Expr]) -> Exec<Value> {
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Exec<Vec<_>>>()?;
        self.call_value(callee, args)
    }

    fn eval_int(&mut self, expr: &Expr) -> Exec<i64> {
        let value = self.eval(expr)?;
        let n = self.to_number(&value)?;
        n.as_i64()
            .ok_or_else(|| Error::invalid(format!("expected a whole number, found {n}")).into())
    }

    /// `target[index]`; a range index slices the target.
    fn index_expr(&mut self, target: Value, index: &Expr) -> Exec<Option<Value>> {
        if let ExprKind::Range { start, end, kind } = &index.kind {
            let start = self.eval_int(start)?;
            let end = match end {
                Some(end) => Some(self.eval_int(end)?),
                None => None,
            };
            return Ok(Some(self.slice(&target, start, end, *kind)?));
        }
        let index = self.eval(index)?;
        Ok(self.index(&target, &index)?)
    }

    fn slice(
        &self,
        target: &Value,
        start: i64,
        end: Option<i64>,
        kind: RangeKind,
    ) -> Result<Value> {
        let len = match target {
            Value::String(s) => s.chars().count(),
            _ => self.to_sequence(target)?.len(),
        };
        let bound = |i: i64| {
            usize::try_from(i)
                .ok()
                .filter(|&i| i <= len)
                .ok_or_else(|| {
                    Error::invalid(format!("range bound {i} is out of bounds for length {len}"))
                })
        };
        let from = bound(start)?;
        let to = match (end, kind) {
            (None, _) | (_, RangeKind::Unbounded) => len,
            (Some(end), RangeKind::Exclusive) => bound(end)?,
            (Some(end), RangeKind::Inclusive) => bound(end.saturating_add(1))?,
        };
        if to < from {
            return Err(Error::invalid(format!(
                "cannot slice with a decreasing range {start}..{}",
                end.unwrap_or_default()
            )));
        }
        match target {
            Value::String(s) => Ok(Value::String(s.chars().skip(from).take(to - from).collect())),
            _ => Ok(Value::List(self.to_sequence(target)?[from..to].to_vec())),
        }
    }

    /// Applies an arithmetic operator. `+` also concatenates strings and
    /// sequences and merges hashes.
    pub(crate) fn arith(&self, op: ArithOp, lhs: Value, rhs: Value) -> Result<Value> {
        let (lcaps, rcaps) = (lhs.capabilities(), rhs.capabilities());
        if lcaps.contains(Capabilities::NUMBER) && rcaps.contains(Capabilities::NUMBER) {
            let (a, b) = (self.to_number(&lhs)?, self.to_number(&rhs)?);
            let n = match op {
                ArithOp::Add => a.add(b),
                ArithOp::Sub => a.sub(b),
                ArithOp::Mul => a.mul(b),
                ArithOp::Div => a.div(b)?,
                ArithOp::Rem => a.rem(b)?,
            };
            return Ok(Value::Number(n));
        }

        let mismatch = || {
            Error::type_mismatch(format!(
                "cannot apply `{}` to {} and {}",
                op.symbol(),
                lhs.kind_name(),
                rhs.kind_name()
            ))
        };
        if op != ArithOp::Add {
            return Err(mismatch());
        }

        let scalar = |caps: Capabilities| {
            caps.intersects(Capabilities::SCALAR | Capabilities::NUMBER | Capabilities::DATE)
        };
        if (lcaps.contains(Capabilities::SCALAR) || rcaps.contains(Capabilities::SCALAR))
            && scalar(lcaps)
            && scalar(rcaps)
        {
            let mut s = self.to_scalar(&lhs)?;
            s.push_str(&self.to_scalar(&rhs)?);
            return Ok(Value::String(s));
        }
        if lcaps.contains(Capabilities::SEQUENCE) && rcaps.contains(Capabilities::SEQUENCE) {
            let mut list = self.to_sequence(&lhs)?;
            list.extend(self.to_sequence(&rhs)?);
            return Ok(Value::List(list));
        }
        if lcaps.contains(Capabilities::ENUMERABLE_HASH)
            && rcaps.contains(Capabilities::ENUMERABLE_HASH)
        {
            let mut map = Map::new();
            let mut entries = self.to_entries(&lhs)?;
            entries.extend(self.to_entries(&rhs)?);
            for (key, value) in entries {
                map.insert(self.to_scalar(&key)?, value);
            }
            return Ok(Value::Map(map));
        }
        Err(mismatch())
    }

    fn special(&self, special: Special) -> Result<Value> {
        let value = match special {
            Special::Locale => Value::String(self.settings.locale.clone()),
            Special::Lang => Value::from(self.settings.lang()),
            Special::Now => Value::Date(Date::now()),
            Special::TemplateName => Value::from(&*self.program.name),
            Special::Main => Value::Namespace(NamespaceId::MAIN),
            Special::Namespace => Value::Namespace(self.current_namespace()),
            Special::Globals => Value::Map(
                self.globals
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Special::DataModel => self.data.clone(),
            Special::Vars => Value::Map(self.visible_vars()),
            Special::Error => match self.errors.last() {
                Some(message) => Value::String(message.clone()),
                None => {
                    return Err(Error::invalid(
                        "`.error` can only be used inside a #recover block",
                    ))
                }
            },
            Special::Node => match self.nodes.last() {
                Some(node) => Value::Node(node.clone()),
                None => return Err(Error::undefined("there is no node being visited")),
            },
        };
        Ok(value)
    }
}
