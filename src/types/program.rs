//! Defines a compiled [`Program`], the executable form of a template.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::types::ast::{Ast, Instr, InstrId, MacroDef};
use crate::types::span::Span;
use crate::Settings;

/// A template after escape substitution, static checks and constant
/// folding. Shared between renders.
#[derive(Debug)]
pub struct Program {
    pub name: Arc<str>,
    pub ast: Ast,
    pub settings: Settings,
    /// Blocks that get their own local scope because they directly contain
    /// a `#local`.
    pub block_scopes: FxHashSet<InstrId>,
    /// Every macro and function defined in the template, bound into the
    /// namespace the template runs in before it executes.
    pub macros: Vec<Arc<MacroDef>>,
}

impl Program {
    pub fn root(&self) -> InstrId {
        self.ast.root
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        self.ast.get(id)
    }

    pub fn span(&self, id: InstrId) -> Span {
        self.ast.span(id)
    }

    pub fn source(&self) -> Option<&Arc<str>> {
        self.ast.source.as_ref()
    }
}
