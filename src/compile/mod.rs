//! Compiles an [`Ast`] into a [`Program`] the renderer can execute.
//!
//! This process has three stages:
//! - Escape substitution rewrites the interpolations in `#escape` regions.
//! - Static checks reject misplaced control flow and collect the block
//!   scopes and macros.
//! - Constant folding evaluates literal expressions once.

mod check;
mod escape;
mod fold;

use std::sync::Arc;

use crate::types::ast::Ast;
use crate::types::program::Program;
use crate::{Engine, Result, Settings};

/// Compile a template into a program.
pub(crate) fn program(
    engine: &Engine,
    name: &str,
    mut ast: Ast,
    settings: Settings,
) -> Result<Arc<Program>> {
    let name: Arc<str> = Arc::from(name);
    escape::substitute(&name, &mut ast)?;
    let checked = check::check(&name, &ast)?;
    let program = Arc::new(Program {
        name,
        ast,
        settings,
        block_scopes: checked.block_scopes,
        macros: checked.macros,
    });
    fold::fold(engine, &program);
    tracing::debug!(template = %program.name, instrs = program.ast.len(), "compiled template");
    Ok(program)
}
