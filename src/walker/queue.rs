//! Work list of pending container scopes
//!
//! The walker keeps pending expansions on an explicit stack instead of
//! the call stack. Children are pushed in reverse so they pop in the
//! order the service returned them, which keeps the walk pre-order.

use crate::service::ResourceLocator;
use crate::walker::tree::NodeId;

/// A scope waiting to be enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTask {
    /// Tree node being expanded (None for the scope root)
    pub node: Option<NodeId>,

    /// Container to enumerate under (None for the scope root)
    pub locator: Option<ResourceLocator>,

    /// Depth of the node being expanded (0 = scope root)
    pub depth: usize,
}

impl ScopeTask {
    /// Create the root task
    pub fn root() -> Self {
        Self {
            node: None,
            locator: None,
            depth: 0,
        }
    }

    /// Create a task expanding a container node
    pub fn container(node: NodeId, locator: ResourceLocator, depth: usize) -> Self {
        Self {
            node: Some(node),
            locator: Some(locator),
            depth,
        }
    }
}

/// Statistics for the work list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkListStats {
    /// Total tasks pushed
    pub pushed: u64,

    /// Total tasks popped
    pub popped: u64,

    /// Largest number of tasks pending at once
    pub peak: usize,
}

/// Stack of pending scopes
#[derive(Debug, Default)]
pub struct WorkList {
    stack: Vec<ScopeTask>,
    stats: WorkListStats,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ScopeTask) {
        self.stack.push(task);
        self.stats.pushed += 1;
        self.stats.peak = self.stats.peak.max(self.stack.len());
    }

    /// Push sibling tasks so the first one pops first
    pub fn push_siblings(&mut self, tasks: Vec<ScopeTask>) {
        for task in tasks.into_iter().rev() {
            self.push(task);
        }
    }

    pub fn pop(&mut self) -> Option<ScopeTask> {
        let task = self.stack.pop();
        if task.is_some() {
            self.stats.popped += 1;
        }
        task
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn stats(&self) -> WorkListStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::tree::ResourceTree;
    use crate::service::{ResourceNode, ResourceUsage};

    fn locator(name: &str) -> ResourceLocator {
        ResourceLocator {
            remote_name: name.into(),
            provider: None,
        }
    }

    #[test]
    fn test_siblings_pop_in_order() {
        let mut tree = ResourceTree::new();
        let ids: Vec<NodeId> = ["A", "B", "C"]
            .iter()
            .map(|n| {
                tree.add(
                    None,
                    ResourceNode {
                        scope: Default::default(),
                        resource_type: Default::default(),
                        display_type: Default::default(),
                        usage: ResourceUsage(ResourceUsage::CONTAINER),
                        local_name: None,
                        remote_name: n.to_string(),
                        comment: None,
                        provider: None,
                    },
                )
            })
            .collect();

        let mut work = WorkList::new();
        work.push_siblings(
            ids.iter()
                .zip(["A", "B", "C"])
                .map(|(id, n)| ScopeTask::container(*id, locator(n), 1))
                .collect(),
        );

        let order: Vec<_> = std::iter::from_fn(|| work.pop())
            .map(|t| t.locator.unwrap().remote_name)
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_stats() {
        let mut work = WorkList::new();
        work.push(ScopeTask::root());
        work.push(ScopeTask::root());
        work.pop();

        let stats = work.stats();
        assert_eq!(stats.pushed, 2);
        assert_eq!(stats.popped, 1);
        assert_eq!(stats.peak, 2);
        assert_eq!(work.len(), 1);
    }
}
