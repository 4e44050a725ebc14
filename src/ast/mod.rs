//! The Wind abstract syntax tree.
//!
//! Two sum types, [`Statement`] and [`Expression`], cover every node the
//! parser produces. Every node keeps the token that introduced it so later
//! stages can report source lines. `Display` on any node prints re-parseable
//! source (expressions are fully parenthesized).

pub mod expression;
pub mod statement;

use std::fmt;

pub use expression::*;
pub use statement::*;

/// An ordered sequence of top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}
