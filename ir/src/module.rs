//! Modules: named collections of functions.

use std::collections::BTreeMap;
use std::sync::Arc;

use snafu::ensure;

use crate::error::{DuplicateFunctionSnafu, Result};
use crate::func::{FuncKind, Function};

/// Immutable set of functions keyed by name.
///
/// Functions are held behind `Arc` so that a transformed module can share
/// every function a pass left alone with its input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IRModule {
    functions: BTreeMap<String, Arc<Function>>,
}

impl IRModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a module, rejecting two functions with the same name.
    pub fn from_functions<I>(functions: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Arc<Function>>,
    {
        let mut map = BTreeMap::new();
        for func in functions {
            let func: Arc<Function> = func.into();
            ensure!(!map.contains_key(func.name()), DuplicateFunctionSnafu { name: func.name() });
            map.insert(func.name().to_string(), func);
        }
        Ok(Self { functions: map })
    }

    /// Copy of this module with `func` added, replacing any function of the same name.
    pub fn with_function(&self, func: impl Into<Arc<Function>>) -> Self {
        let func = func.into();
        let mut functions = self.functions.clone();
        functions.insert(func.name().to_string(), func);
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Functions in name order.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn of_kind(&self, kind: FuncKind) -> impl Iterator<Item = &Arc<Function>> {
        self.functions().filter(move |f| f.kind() == kind)
    }

    pub fn kernels(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.of_kind(FuncKind::Kernel)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Apply `f` to every function and reassemble the module.
    ///
    /// Functions for which `f` returns `None`, or a value equal to the input,
    /// keep their original `Arc`.
    pub fn map_functions<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&Function) -> Option<Function>,
    {
        let functions = self
            .functions
            .iter()
            .map(|(name, func)| {
                let mapped = match f(func) {
                    Some(new) if new != **func => Arc::new(new),
                    _ => func.clone(),
                };
                (name.clone(), mapped)
            })
            .collect();
        Self { functions }
    }

    /// Fallible version of [`IRModule::map_functions`].
    pub fn try_map_functions<F, E>(&self, mut f: F) -> std::result::Result<Self, E>
    where
        F: FnMut(&Function) -> std::result::Result<Option<Function>, E>,
    {
        let mut functions = BTreeMap::new();
        for (name, func) in &self.functions {
            let mapped = match f(func)? {
                Some(new) if new != **func => Arc::new(new),
                _ => func.clone(),
            };
            functions.insert(name.clone(), mapped);
        }
        Ok(Self { functions })
    }
}

impl<'a> IntoIterator for &'a IRModule {
    type Item = &'a Arc<Function>;
    type IntoIter = std::collections::btree_map::Values<'a, String, Arc<Function>>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.values()
    }
}
