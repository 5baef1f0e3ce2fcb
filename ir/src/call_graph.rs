//! Call graph of a module.

use std::collections::BTreeMap;

use crate::error::{CallGraphCycleSnafu, Result};
use crate::module::IRModule;

/// Caller → callee edges between functions of one module.
///
/// Calls to names the module does not define are external and are not edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl CallGraph {
    pub fn build(module: &IRModule) -> Self {
        let edges = module
            .functions()
            .map(|func| {
                let callees = func.callees().into_iter().filter(|name| module.contains(name)).collect();
                (func.name().to_string(), callees)
            })
            .collect();
        Self { edges }
    }

    /// Functions called directly by `name`, in first-occurrence order.
    pub fn callees(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Functions calling `name` directly, in name order.
    pub fn callers(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, callees)| callees.iter().any(|c| c == name))
            .map(|(caller, _)| caller.as_str())
            .collect()
    }

    /// Fail with [`Error::CallGraphCycle`](crate::Error::CallGraphCycle) if any
    /// function can reach itself.
    ///
    /// The reported cycle lists the functions in call order and repeats the
    /// first one at the end, e.g. `["a", "b", "a"]`.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut marks: BTreeMap<&str, Mark> = self.edges.keys().map(|k| (k.as_str(), Mark::Unvisited)).collect();

        for root in self.edges.keys() {
            if marks[root.as_str()] != Mark::Unvisited {
                continue;
            }
            // (function, index of the next callee to visit)
            let mut path: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            marks.insert(root.as_str(), Mark::OnPath);

            while let Some(top) = path.last_mut() {
                let node: &str = top.0;
                let Some(callee) = self.callees(node).get(top.1) else {
                    marks.insert(node, Mark::Done);
                    path.pop();
                    continue;
                };
                top.1 += 1;
                match marks.get(callee.as_str()).copied() {
                    Some(Mark::Unvisited) => {
                        marks.insert(callee.as_str(), Mark::OnPath);
                        path.push((callee.as_str(), 0));
                    }
                    Some(Mark::OnPath) => {
                        let start = path.iter().position(|(n, _)| *n == callee.as_str()).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..].iter().map(|(n, _)| n.to_string()).collect();
                        cycle.push(callee.clone());
                        return CallGraphCycleSnafu { cycle }.fail();
                    }
                    Some(Mark::Done) | None => {}
                }
            }
        }
        Ok(())
    }
}
