//! Compile-time scope bookkeeping: one [`Frame`] per function being
//! compiled, each with a stack of blocks mapping names to stack slots.

use crate::bytecode::Instructions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Local,
    Global,
    Free,
}

/// A resolved variable: where it lives and which slot (or free-list index)
/// addresses it.
#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub index: usize,
    pub kind: VarKind,
}

/// Per-function compile state. `locals` grows one slot per declaration and
/// never shrinks, so every `let` in the function body gets a distinct slot
/// even when blocks end; `blocks` scopes which names are visible where.
#[derive(Debug)]
pub struct Frame {
    pub instructions: Instructions,
    pub locals: Vec<Var>,
    pub free_vars: Vec<Var>,
    blocks: Vec<Vec<Var>>,
    is_global: bool,
}

impl Frame {
    pub fn new(is_global: bool) -> Self {
        Self {
            instructions: Instructions::new(),
            locals: Vec::new(),
            free_vars: Vec::new(),
            blocks: vec![Vec::new()],
            is_global,
        }
    }

    pub fn begin_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    pub fn end_block(&mut self) {
        self.blocks.pop();
    }

    /// Declare a name in the current block and return its frame slot.
    pub fn define(&mut self, name: &str) -> usize {
        let kind = if self.is_global {
            VarKind::Global
        } else {
            VarKind::Local
        };

        let var = Var {
            name: name.to_string(),
            index: self.locals.len(),
            kind,
        };
        let index = var.index;

        self.locals.push(var.clone());
        self.blocks
            .last_mut()
            .expect("a frame always has at least one block")
            .push(var);

        index
    }

    /// Find a name in this frame's visible blocks, innermost first.
    pub fn find_local(&self, name: &str) -> Option<Var> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.iter().find(|var| var.name == name))
            .cloned()
    }

    /// Record a capture of a parent-frame variable and return the `Free`
    /// descriptor the referrer should use.
    pub fn define_free(&mut self, parent_var: Var) -> Var {
        self.free_vars.push(parent_var.clone());

        Var {
            name: parent_var.name,
            index: self.free_vars.len() - 1,
            kind: VarKind::Free,
        }
    }
}
