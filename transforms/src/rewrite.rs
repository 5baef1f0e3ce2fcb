//! Pattern-driven expression rewriting.
//!
//! # Algorithm
//!
//! [`rewrite_bottom_up`] walks the tree on an explicit stack in two stages:
//!
//! - `Visit`: schedule the node's children, then the node's own rebuild.
//! - `Rebuild`: reconstruct the node over its rewritten children, then try the
//!   rules on it. When a rule fires, the replacement goes back through both
//!   stages, so its new sub-expressions are rewritten too.
//!
//! Results are memoised by node id, so shared sub-expressions are rewritten
//! once and stay shared. A node left unchanged keeps its original `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use kiln_ir::{Binding, Expr, Pattern, match_pattern};
use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{Result, RewriteLimitSnafu};

/// Maximum number of rule applications to a single node before giving up.
pub const MAX_REWRITES_PER_NODE: usize = 64;

/// Rewrite callback: receives the match binding and the matched node.
///
/// Returning `None` declines the rewrite even though the pattern matched.
pub type RewriteFn = dyn Fn(&Binding, &Arc<Expr>) -> Option<Arc<Expr>> + Send + Sync;

/// A named pattern with its replacement.
pub struct RewriteRule {
    name: &'static str,
    pattern: Arc<Pattern>,
    rewrite: Box<RewriteFn>,
}

impl std::fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteRule").field("name", &self.name).field("pattern", &self.pattern.id()).finish()
    }
}

impl RewriteRule {
    pub fn new<F>(name: &'static str, pattern: Arc<Pattern>, rewrite: F) -> Self
    where
        F: Fn(&Binding, &Arc<Expr>) -> Option<Arc<Expr>> + Send + Sync + 'static,
    {
        Self { name, pattern, rewrite: Box::new(rewrite) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    /// Rewrite `node` if the pattern matches and the callback produces a different node.
    pub fn apply(&self, node: &Arc<Expr>) -> Option<Arc<Expr>> {
        let binding = match_pattern(&self.pattern, node)?;
        let replacement = (self.rewrite)(&binding, node)?;
        (!Arc::ptr_eq(&replacement, node)).then_some(replacement)
    }
}

/// Ordered rules; the first one that fires wins.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    pub fn with(mut self, rule: RewriteRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply the first rule that rewrites `node`, returning its name and the replacement.
    pub fn apply(&self, node: &Arc<Expr>) -> Option<(&'static str, Arc<Expr>)> {
        self.rules.iter().find_map(|rule| rule.apply(node).map(|out| (rule.name, out)))
    }
}

enum Stage {
    Visit,
    Rebuild {
        /// Node whose result this rebuild produces.
        original: Arc<Expr>,
        fired: usize,
    },
}

struct RewriteEngine<'a> {
    rules: &'a RuleSet,
    /// Node id → rewritten node. Results also map to themselves.
    results: HashMap<u64, Arc<Expr>>,
}

impl<'a> RewriteEngine<'a> {
    fn new(rules: &'a RuleSet) -> Self {
        Self { rules, results: HashMap::new() }
    }

    fn resolved(&self, node: &Arc<Expr>) -> Arc<Expr> {
        self.results.get(&node.id()).cloned().unwrap_or_else(|| node.clone())
    }

    fn schedule_children(&self, stack: &mut Vec<(Arc<Expr>, Stage)>, node: &Arc<Expr>) {
        for child in node.children().into_iter().rev() {
            if !self.results.contains_key(&child.id()) {
                stack.push((child.clone(), Stage::Visit));
            }
        }
    }

    fn finish(&mut self, original: &Arc<Expr>, result: Arc<Expr>) {
        self.results.insert(result.id(), result.clone());
        self.results.insert(original.id(), result);
    }

    fn rewrite(&mut self, root: &Arc<Expr>) -> Result<Arc<Expr>> {
        let mut stack: Vec<(Arc<Expr>, Stage)> = vec![(root.clone(), Stage::Visit)];

        while let Some((node, stage)) = stack.pop() {
            match stage {
                Stage::Visit => {
                    if self.results.contains_key(&node.id()) {
                        continue;
                    }
                    stack.push((node.clone(), Stage::Rebuild { original: node.clone(), fired: 0 }));
                    self.schedule_children(&mut stack, &node);
                }
                Stage::Rebuild { original, fired } => {
                    if fired == 0 && self.results.contains_key(&original.id()) {
                        continue;
                    }
                    let children: SmallVec<[Arc<Expr>; 4]> =
                        node.children().into_iter().map(|c| self.resolved(c)).collect();
                    let rebuilt = node.with_children(&children);

                    let Some((rule, replacement)) = self.rules.apply(&rebuilt) else {
                        self.finish(&original, rebuilt);
                        continue;
                    };
                    ensure!(
                        fired < MAX_REWRITES_PER_NODE,
                        RewriteLimitSnafu { limit: MAX_REWRITES_PER_NODE, node: original.to_string() }
                    );
                    tracing::trace!(rule, from = %rebuilt, to = %replacement, "rewrite");

                    if let Some(done) = self.results.get(&replacement.id()).cloned() {
                        self.finish(&original, done);
                        continue;
                    }
                    stack.push((replacement.clone(), Stage::Rebuild { original, fired: fired + 1 }));
                    self.schedule_children(&mut stack, &replacement);
                }
            }
        }

        Ok(self.resolved(root))
    }
}

/// Rewrite `root` with `rules` until no rule fires anywhere in the tree.
///
/// Children are rewritten before their parents. Returns the original `Arc`
/// when nothing changed.
pub fn rewrite_bottom_up(rules: &RuleSet, root: &Arc<Expr>) -> Result<Arc<Expr>> {
    if rules.is_empty() {
        return Ok(root.clone());
    }
    RewriteEngine::new(rules).rewrite(root)
}
