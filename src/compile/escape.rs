//! Rewrites the interpolations inside `#escape` regions.
//!
//! `${x}` inside `#escape v as v?html` becomes `${x?html}`, once, before the
//! program runs. Nested regions compose: the template of an inner region is
//! itself rewritten by the outer one.

use std::sync::Arc;

use crate::types::ast::{Ast, Instr, InstrId};
use crate::types::expr::Expr;
use crate::{Error, Result};

struct Record {
    placeholder: String,
    template: Expr,
}

impl Record {
    fn apply(&self, expr: &Expr) -> Expr {
        self.template
            .substitute(&self.placeholder, expr)
            .at(expr.span())
    }
}

/// Applies every escape region of the tree to the interpolations it
/// contains, including those in macro bodies defined inside it.
pub(crate) fn substitute(name: &Arc<str>, ast: &mut Ast) -> Result<()> {
    let mut records = Vec::new();
    let root = ast.root();
    visit(ast, root, &mut records).map_err(|id| {
        Error::compile("#noescape is not inside an #escape region").located(
            name,
            ast.source.as_ref(),
            ast.span(id),
        )
    })
}

/// Fails with the id of a `#noescape` that has no region to suspend.
fn visit(
    ast: &mut Ast,
    id: InstrId,
    records: &mut Vec<Record>,
) -> std::result::Result<(), InstrId> {
    match ast.get(id) {
        Instr::Interpolation(expr) => {
            if let Some(record) = records.last() {
                let escaped = record.apply(expr);
                *ast.get_mut(id) = Instr::Interpolation(escaped);
            }
            Ok(())
        }

        Instr::Escape(escape) => {
            let template = match records.last() {
                Some(outer) => outer.apply(&escape.template),
                None => escape.template.clone(),
            };
            let body = escape.body;
            records.push(Record {
                placeholder: escape.placeholder.clone(),
                template,
            });
            let result = visit(ast, body, records);
            records.pop();
            result
        }

        Instr::NoEscape(body) => {
            let body = *body;
            let Some(record) = records.pop() else {
                return Err(id);
            };
            let result = visit(ast, body, records);
            records.push(record);
            result
        }

        instr => {
            for child in instr.children() {
                visit(ast, child, records)?;
            }
            Ok(())
        }
    }
}
