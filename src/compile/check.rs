//! Static checks over the instruction tree.
//!
//! Rejects control flow in places it cannot unwind to, duplicate
//! declarations and malformed switches, and collects what the renderer needs
//! up front: the blocks that get their own local scope and the macros a
//! template defines.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::types::ast::{Ast, CaseTest, Instr, InstrId, LoopVars, MacroDef, MacroKind};
use crate::{Error, Result, Settings};

/// What the checks learn about a template.
#[derive(Debug, Default)]
pub(crate) struct Checked {
    pub block_scopes: FxHashSet<InstrId>,
    pub macros: Vec<Arc<MacroDef>>,
}

pub(crate) fn check(name: &Arc<str>, ast: &Ast) -> Result<Checked> {
    let mut checked = Checked::default();
    for (id, instr) in ast.iter() {
        check_instr(ast, id, instr, &mut checked)
            .map_err(|err| err.located(name, ast.source.as_ref(), ast.span(id)))?;
    }
    Ok(checked)
}

fn check_instr(ast: &Ast, id: InstrId, instr: &Instr, checked: &mut Checked) -> Result<()> {
    match instr {
        Instr::Break => {
            if !ancestors(ast, id).any(|a| matches!(a, Ancestor::Loop | Ancestor::Switch)) {
                return Err(Error::compile("#break must be inside a #list or #switch"));
            }
        }

        Instr::Sep(_) => {
            if !ancestors(ast, id).any(|a| matches!(a, Ancestor::Loop)) {
                return Err(Error::compile("#sep must be inside a #list"));
            }
        }

        Instr::Return(_) | Instr::Fallback | Instr::Nested(_) => match enclosing_macro(ast, id) {
            None => {
                return Err(Error::compile(format!(
                    "{} must be inside a macro or function body",
                    instr.describe()
                )));
            }
            Some(def) if def.kind == MacroKind::Function && matches!(instr, Instr::Fallback) => {
                return Err(Error::compile(format!(
                    "#fallback cannot be used in function `{}`",
                    def.name
                )));
            }
            Some(_) => {}
        },

        Instr::MacroDef(def) => {
            if enclosing_macro(ast, id).is_some() {
                return Err(Error::compile(format!(
                    "macro `{}` cannot be defined inside another macro",
                    def.name
                )));
            }
            check_macro_name(&def.name)?;
            let mut seen = FxHashSet::default();
            let names = def.params.iter().map(|p| p.name.as_str());
            for name in names.chain(def.catch_all.as_deref()) {
                check_ident(name)?;
                if !seen.insert(name) {
                    return Err(Error::compile(format!(
                        "duplicate parameter `{name}` in macro `{}`",
                        def.name
                    )));
                }
            }
            checked.macros.push(def.clone());
        }

        Instr::Mixed(children) => check_block(ast, id, children, checked)?,

        Instr::List(l) => {
            if let LoopVars::KeyValue(k, v) = &l.vars {
                if k == v {
                    return Err(Error::compile(format!("duplicate loop variable `{k}`")));
                }
            }
            for name in l.vars.names() {
                check_ident(name)?;
            }
        }

        Instr::Call(call) => {
            let mut seen = FxHashSet::default();
            for name in &call.loop_vars {
                check_ident(name)?;
                if !seen.insert(name) {
                    return Err(Error::compile(format!("duplicate loop variable `{name}`")));
                }
            }
        }

        Instr::Switch(switch) => {
            let cases = &switch.cases;
            let on = cases.iter().any(|c| matches!(c.test, CaseTest::On(_)));
            let case = cases.iter().any(|c| matches!(c.test, CaseTest::Case(_)));
            if on && case {
                return Err(Error::compile("#switch cannot mix #case and #on"));
            }
            let defaults = switch
                .cases
                .iter()
                .filter(|c| matches!(c.test, CaseTest::Default))
                .count();
            if defaults > 1 {
                return Err(Error::compile("#switch can only have one #default"));
            }
        }

        Instr::Assign(_) | Instr::Capture(_) | Instr::Import(_) => {
            for name in instr.declared_names() {
                check_ident(name)?;
            }
        }

        Instr::Escape(escape) => check_ident(&escape.placeholder)?,

        Instr::Setting(setting) => {
            if !Settings::is_known(&setting.name) {
                return Err(Error::compile(format!("unknown setting `{}`", setting.name)));
            }
        }

        _ => {}
    }
    Ok(())
}

/// Checks the `#local` declarations made directly in a block and decides
/// whether the block needs its own scope.
fn check_block(ast: &Ast, id: InstrId, children: &[InstrId], checked: &mut Checked) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut declares = false;
    for &child in children {
        let instr = ast.get(child);
        declares |= instr.is_local();
        if let Some(name) = instr.local_name() {
            if !seen.insert(name) {
                return Err(Error::compile(format!(
                    "`{name}` is declared twice with #local in the same block"
                )));
            }
        }
    }
    if !declares {
        return Ok(());
    }
    match ast.parent(id) {
        None => Err(Error::compile(
            "#local must be inside a macro, a function or a nested block",
        )),
        Some(parent) if is_macro_body(ast, parent, id) => Ok(()),
        _ => {
            checked.block_scopes.insert(id);
            Ok(())
        }
    }
}

fn is_macro_body(ast: &Ast, parent: InstrId, id: InstrId) -> bool {
    matches!(ast.get(parent), Instr::MacroDef(def) if def.body == id)
}

#[derive(Debug, Clone, Copy)]
enum Ancestor {
    Loop,
    Switch,
    Other,
}

/// Walks outward from `id` up to, but not across, the enclosing macro body.
fn ancestors(ast: &Ast, id: InstrId) -> impl Iterator<Item = Ancestor> + '_ {
    let mut child = id;
    std::iter::from_fn(move || {
        let parent = ast.parent(child)?;
        let ancestor = match ast.get(parent) {
            Instr::MacroDef(_) => return None,
            Instr::List(l) if l.body == child => Ancestor::Loop,
            Instr::Switch(_) => Ancestor::Switch,
            _ => Ancestor::Other,
        };
        child = parent;
        Some(ancestor)
    })
}

fn enclosing_macro(ast: &Ast, id: InstrId) -> Option<&MacroDef> {
    let mut current = ast.parent(id);
    while let Some(parent) = current {
        if let Instr::MacroDef(def) = ast.get(parent) {
            return Some(def.as_ref());
        }
        current = ast.parent(parent);
    }
    None
}

/// Macros that handle `#visit`ed nodes are named after the node kind, as in
/// `@text`.
fn check_macro_name(name: &str) -> Result<()> {
    check_ident(name.strip_prefix('@').unwrap_or(name))
}

fn check_ident(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_ident_start) && chars.all(is_ident);
    if valid {
        Ok(())
    } else {
        Err(Error::compile(format!("`{name}` is not a valid identifier")))
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}
