//! Dependency graph walks over the rule set.

use std::collections::{BTreeSet, VecDeque};

use buildwright_domain::AttrId;

use super::SheetEvaluator;

impl SheetEvaluator {
    /// Kahn's algorithm over `dependency -> target` edges.
    ///
    /// Rules are checked for cycles when defined, but a slot interned later can
    /// join a prefix aggregate and close a loop. Such slots are logged and
    /// appended in slot order.
    pub(super) fn topological_order(&self) -> Vec<AttrId> {
        let n = self.names.len();
        let mut in_degree = vec![0usize; n];
        let mut edges: Vec<Vec<AttrId>> = vec![Vec::new(); n];

        for rule in self.rules.iter().flatten() {
            for dep in self.dependencies(rule) {
                edges[dep.index()].push(rule.target);
                in_degree[rule.target.index()] += 1;
            }
        }

        let mut queue: VecDeque<AttrId> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(|i| AttrId::new(i as u32))
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(attr) = queue.pop_front() {
            order.push(attr);
            for target in &edges[attr.index()] {
                let degree = &mut in_degree[target.index()];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*target);
                }
            }
        }

        if order.len() < n {
            let leftover: Vec<AttrId> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| AttrId::new(i as u32))
                .collect();
            tracing::error!(
                count = leftover.len(),
                first = %self.slot_name(leftover[0]),
                "Dependency cycle detected during evaluation"
            );
            order.extend(leftover);
        }
        order
    }

    /// First member of `goals` reachable from `start` along rule edges
    /// (including `start` itself).
    pub(super) fn first_reachable(
        &self,
        start: AttrId,
        goals: &BTreeSet<AttrId>,
    ) -> Option<AttrId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(attr) = stack.pop() {
            if goals.contains(&attr) {
                return Some(attr);
            }
            if !seen.insert(attr) {
                continue;
            }
            stack.extend(self.dependents(attr));
        }
        None
    }
}
