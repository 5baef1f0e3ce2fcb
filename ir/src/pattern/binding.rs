//! Match results.

use std::sync::Arc;

use smallvec::SmallVec;

use super::matcher::{BindingConflictSnafu, Mismatch};
use super::model::{BindingKey, Pattern};
use crate::expr::Expr;

/// Single binding entry.
pub type BindingEntry = (BindingKey, Arc<Expr>);

/// Assignment of pattern variables and wildcard nodes to the sub-expressions
/// they matched.
///
/// Stack-allocated for typical patterns (up to four keys). Entries keep
/// insertion order, which follows the matcher's left-to-right traversal.
/// Equality ignores that order: two bindings are equal when they hold the
/// same keys mapped to equal expressions.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    entries: SmallVec<[BindingEntry; 4]>,
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        // Keys are unique within a binding, so equal lengths plus inclusion suffice.
        self.len() == other.len() && self.entries.iter().all(|(key, expr)| other.get_key(*key) == Some(expr))
    }
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key -> target`, or check it against the existing entry.
    ///
    /// A re-bound key must map to an equal expression (vars by identity).
    pub(crate) fn bind(&mut self, key: BindingKey, target: &Arc<Expr>) -> Result<(), Mismatch> {
        match self.get_key(key) {
            Some(existing) if Arc::ptr_eq(existing, target) || **existing == **target => Ok(()),
            Some(existing) => BindingConflictSnafu { key, existing: existing.clone(), target: target.clone() }.fail(),
            None => {
                self.entries.push((key, target.clone()));
                Ok(())
            }
        }
    }

    pub fn get_key(&self, key: BindingKey) -> Option<&Arc<Expr>> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, expr)| expr)
    }

    /// Expression bound to a pattern node (a var pattern resolves through its variable).
    pub fn get(&self, pattern: &Pattern) -> Option<&Arc<Expr>> {
        self.get_key(pattern.binding_key())
    }

    /// Expression bound to a pattern variable.
    pub fn var(&self, var: &Expr) -> Option<&Arc<Expr>> {
        self.get_key(BindingKey::Var(var.id()))
    }

    pub fn contains(&self, key: BindingKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindingEntry> {
        self.entries.iter()
    }
}
