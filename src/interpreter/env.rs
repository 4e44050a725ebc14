//! Lexical environments for the tree-walking evaluator.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

/// What happened when assigning through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    Constant,
    Unbound,
}

/// One scope frame: mutable and constant bindings, a parent link, plus the
/// environments this scope included (and their aliases).
///
/// Lookup order: local constants, local store, the parent chain, aliases,
/// then unaliased includes.
#[derive(Default)]
pub struct Environment {
    store: FxHashMap<String, Value>,
    constants: FxHashMap<String, Value>,
    outer: Option<EnvRef>,
    includes: Vec<EnvRef>,
    aliases: FxHashMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn enclosed(outer: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer),
            ..Environment::default()
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.constants.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.store.get(name) {
            return Some(value.clone());
        }
        if let Some(outer) = &self.outer {
            if let Some(value) = outer.borrow().get(name) {
                return Some(value);
            }
        }
        if let Some(value) = self.aliases.get(name) {
            return Some(value.clone());
        }
        for include in &self.includes {
            // try_borrow: a file that includes itself links its own
            // environment here, which is already borrowed by this lookup.
            if let Ok(include) = include.try_borrow() {
                if let Some(value) = include.get_local(name) {
                    return Some(value);
                }
            }
        }

        None
    }

    /// Look up a binding in this environment only; this is how includes export
    /// their names.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.constants
            .get(name)
            .or_else(|| self.store.get(name))
            .cloned()
    }

    /// Assign to an existing binding, walking the parent chain.
    pub fn set(&mut self, name: &str, value: Value) -> AssignOutcome {
        if self.constants.contains_key(name) {
            return AssignOutcome::Constant;
        }
        if let Some(slot) = self.store.get_mut(name) {
            *slot = value;
            return AssignOutcome::Assigned;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().set(name, value),
            None => AssignOutcome::Unbound,
        }
    }

    /// Bind a new name in this scope (`let` / `const`).
    pub fn declare(&mut self, name: &str, value: Value, constant: bool) {
        if constant {
            self.constants.insert(name.to_string(), value);
        } else {
            self.store.insert(name.to_string(), value);
        }
    }

    pub fn add_include(&mut self, env: EnvRef) {
        self.includes.push(env);
    }

    pub fn add_alias(&mut self, name: &str, value: Value) {
        self.aliases.insert(name.to_string(), value);
    }

    /// Drop every binding declared in this scope. Loop bodies reuse one
    /// environment across iterations and clear it here instead of
    /// reallocating.
    pub fn clear_store(&mut self) {
        self.store.clear();
        self.constants.clear();
    }
}
