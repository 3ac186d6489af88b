//! Call frames and the local scopes inside them.
//!
//! Every macro invocation pushes a [`Frame`]. Name resolution only looks at
//! the scopes of the *current* frame before moving on to the frame's
//! namespace, so a macro body cannot see the locals of its caller. `#nested`
//! temporarily makes the caller's frame current again.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::render::iter::LoopState;
use crate::types::ast::InstrId;
use crate::types::program::Program;
use crate::{Error, Result, Value};

pub(crate) type Vars = FxHashMap<String, Value>;

/// A handle to a namespace created by the main template or an `#import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub(crate) usize);

impl NamespaceId {
    pub(crate) const MAIN: NamespaceId = NamespaceId(0);
}

#[derive(Debug)]
pub(crate) struct Stack {
    frames: Vec<Frame>,
    current: usize,
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub namespace: NamespaceId,
    pub scopes: Vec<Scope>,
    pub caller: Option<Caller>,
}

/// A local scope, innermost last.
#[derive(Debug)]
pub(crate) enum Scope {
    /// Parameters and `#local` variables of a macro call.
    Macro(Vars),
    /// `#local` variables of a nested block.
    Block(Vars),
    /// The loop variables of a `#list`.
    Loop(LoopState),
    /// The call-site loop variables bound by `#nested`.
    Nested(Vars),
}

/// Where a macro was called from, for `#nested`.
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub frame: usize,
    pub program: Arc<Program>,
    pub body: Option<InstrId>,
    pub loop_vars: Vec<String>,
}

impl Frame {
    pub fn new(namespace: NamespaceId, caller: Option<Caller>) -> Self {
        let scopes = match caller {
            Some(_) => vec![Scope::Macro(Vars::default())],
            None => Vec::new(),
        };
        Self {
            namespace,
            scopes,
            caller,
        }
    }
}

impl Stack {
    pub fn new(namespace: NamespaceId) -> Self {
        Self {
            frames: vec![Frame::new(namespace, None)],
            current: 0,
        }
    }

    pub fn current(&self) -> &Frame {
        &self.frames[self.current]
    }

    fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Pushes a frame and makes it current, returning the previous current
    /// frame for [`Stack::pop_frame`].
    pub fn push_frame(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        std::mem::replace(&mut self.current, self.frames.len() - 1)
    }

    pub fn pop_frame(&mut self, previous: usize) {
        self.frames.pop();
        self.current = previous;
    }

    /// Makes an existing frame current, returning the previous one for
    /// [`Stack::leave`].
    pub fn enter(&mut self, frame: usize) -> usize {
        std::mem::replace(&mut self.current, frame)
    }

    pub fn leave(&mut self, previous: usize) {
        self.current = previous;
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.current_mut().scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.current_mut().scopes.pop()
    }

    /// Resolves a name in the local scopes of the current frame.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.current().scopes.iter().rev().find_map(|scope| match scope {
            Scope::Macro(vars) | Scope::Block(vars) | Scope::Nested(vars) => {
                vars.get(name).cloned()
            }
            Scope::Loop(state) => state.resolve(name),
        })
    }

    /// Sets a variable in the nearest block or macro scope.
    pub fn declare_local(&mut self, name: &str, value: Value) -> Result<()> {
        let vars = self
            .current_mut()
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| match scope {
                Scope::Macro(vars) | Scope::Block(vars) => Some(vars),
                _ => None,
            })
            .ok_or_else(|| {
                Error::invalid(format!(
                    "cannot declare local `{name}` outside of a macro or nested block"
                ))
            })?;
        vars.insert(name.to_owned(), value);
        Ok(())
    }

    /// Reads a variable from the block or macro scopes only.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.current().scopes.iter().rev().find_map(|scope| match scope {
            Scope::Macro(vars) | Scope::Block(vars) => vars.get(name),
            _ => None,
        })
    }

    /// Whether the innermost macro scope binds `name`.
    pub fn is_bound_in_macro(&self, name: &str) -> bool {
        self.current().scopes.iter().rev().any(|scope| match scope {
            Scope::Macro(vars) => vars.contains_key(name),
            _ => false,
        })
    }

    /// Advances the loop whose scope is innermost.
    pub fn advance_loop(&mut self) -> Result<bool> {
        match self.current_mut().scopes.last_mut() {
            Some(Scope::Loop(state)) => state.advance(),
            _ => Err(Error::internal("loop scope is not innermost")),
        }
    }

    /// The innermost loop of the current frame.
    pub fn innermost_loop(&self) -> Option<&LoopState> {
        self.current().scopes.iter().rev().find_map(|scope| match scope {
            Scope::Loop(state) => Some(state),
            _ => None,
        })
    }

    /// The innermost loop whose item variable is `name`.
    pub fn loop_state(&self, name: &str) -> Option<&LoopState> {
        self.current().scopes.iter().rev().find_map(|scope| match scope {
            Scope::Loop(state) if state.item_name() == name => Some(state),
            _ => None,
        })
    }

    /// All local variables visible in the current frame, outermost first.
    pub fn visible(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for scope in &self.current().scopes {
            match scope {
                Scope::Macro(vars) | Scope::Block(vars) | Scope::Nested(vars) => {
                    out.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
                Scope::Loop(_) => {}
            }
        }
        out
    }
}
