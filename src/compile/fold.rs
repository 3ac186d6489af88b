//! Constant folding.
//!
//! Every outermost literal expression is evaluated once against an empty
//! data model and the result is stored on the expression. A failure is
//! stored too and reported when the expression is reached at render time,
//! so that a template with a bad branch that never runs still renders.

use std::sync::Arc;

use crate::render::{Environment, Unwind};
use crate::types::expr::{Constant, Expr, ExprKind};
use crate::types::program::Program;
use crate::{Engine, Error, Value};

pub(crate) fn fold(engine: &Engine, program: &Arc<Program>) {
    let data = Value::Null;
    let mut env = Environment::folding(engine, program.clone(), &data);
    let mut folded = 0usize;
    for (_, instr) in program.ast.iter() {
        for expr in instr.exprs() {
            fold_expr(&mut env, expr, &mut folded);
        }
    }
    tracing::trace!(template = %program.name, folded, "folded constants");
}

fn fold_expr(env: &mut Environment<'_>, expr: &Expr, folded: &mut usize) {
    if matches!(expr.kind, ExprKind::Literal(_)) {
        return;
    }
    if !expr.is_literal() {
        for child in expr.children() {
            fold_expr(env, child, folded);
        }
        return;
    }
    let constant = match env.eval(expr) {
        Ok(value) => Constant::Value(value),
        Err(Unwind::Error(err)) => Constant::Invalid(err),
        Err(Unwind::Signal(sig)) => {
            Constant::Invalid(Error::internal(format!(
                "{} escaped a constant expression",
                sig.describe()
            )))
        }
    };
    if env.take_fold_blocked() {
        // depends on the render settings; evaluate the operands at least
        for child in expr.children() {
            fold_expr(env, child, folded);
        }
        return;
    }
    if expr.constant.set(constant).is_ok() {
        *folded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ast::Instr;
    use crate::types::builder::Builder;
    use crate::types::expr::{add, builtin, div, int, string};

    fn interpolated(program: &Program) -> Vec<&Expr> {
        program
            .ast
            .iter()
            .filter_map(|(_, instr)| match instr {
                Instr::Interpolation(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn compile(b: Builder) -> Arc<Program> {
        Engine::new()
            .compile("test", b.finish())
            .unwrap()
            .program()
            .clone()
    }

    #[test]
    fn folds_literal_expressions() {
        let mut b = Builder::new();
        b.interpolate(add(int(1), int(2)));
        b.interpolate(builtin(string("ab"), "upper_case", vec![]).unwrap());
        let program = compile(b);
        let exprs = interpolated(&program);
        assert_eq!(exprs[0].constant(), Some(&Value::from(3)));
        assert_eq!(exprs[1].constant(), Some(&Value::from("AB")));
    }

    #[test]
    fn failures_are_deferred() {
        let mut b = Builder::new();
        b.interpolate(div(int(1), int(0)));
        let program = compile(b);
        let expr = interpolated(&program)[0];
        assert!(matches!(expr.constant.get(), Some(Constant::Invalid(_))));
        assert_eq!(expr.constant(), None);
    }

    #[test]
    fn locale_dependent_results_are_not_folded() {
        let mut b = Builder::new();
        b.interpolate(builtin(int(1), "string", vec![string("0.00")]).unwrap());
        let program = compile(b);
        let expr = interpolated(&program)[0];
        assert!(expr.constant.get().is_none());
    }
}
