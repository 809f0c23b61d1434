//! Network resource tree walker
//!
//! Walks a resource scope depth-first, pre-order. Each container is
//! enumerated with its own paged query over a fixed-size page; a container
//! whose enumeration fails is recorded and left without children while
//! the rest of the walk carries on.

use crate::error::ServiceError;
use crate::query::{EnumerationRequest, PagedQuery, ResourceDecoder};
use crate::service::{
    Capacity, DirectoryService, Filter, RecordKind, ResourceLocator, ResourceNode, ResourceScope,
    ResourceType, Target,
};
use crate::walker::queue::{ScopeTask, WorkList, WorkListStats};
use crate::walker::tree::{Expansion, NodeId, ResourceTree};
use regex::Regex;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default cap on tree depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Walk options
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Containers at this depth are not expanded (roots are depth 1)
    pub max_depth: usize,

    /// Page capacity used for every container
    pub capacity: Capacity,

    /// Only resources of this type are returned (containers always are)
    pub resource_type: ResourceType,

    /// Containers whose remote name matches are not expanded
    pub exclude: Vec<Regex>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            capacity: Capacity::RESOURCE_PAGE,
            resource_type: ResourceType::Any,
            exclude: Vec::new(),
        }
    }
}

impl WalkOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Check if a container should be left unexpanded
    pub fn is_excluded(&self, remote_name: &str) -> bool {
        self.exclude.iter().any(|re| re.is_match(remote_name))
    }
}

/// Counters for one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Nodes attached to the tree
    pub nodes: u64,

    /// Containers whose children were enumerated
    pub containers_expanded: u64,

    /// Pages fetched across all containers
    pub pages: u64,

    /// Deepest node depth reached
    pub max_depth: usize,

    /// Containers left unexpanded at the depth cap
    pub truncated: u64,

    /// Containers left unexpanded by an exclude pattern
    pub excluded: u64,

    /// Containers seen again after being expanded
    pub revisited: u64,

    /// Failed enumerations
    pub failures: u64,

    pub elapsed: Duration,
}

/// A failed enumeration under one node (or the scope root)
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    /// Node whose children are missing; None for the scope root
    pub node: Option<NodeId>,
    pub resource: Option<ResourceNode>,
    pub error: ServiceError,
}

/// Tree built by a walk, with the failures met along the way
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub scope: ResourceScope,
    pub tree: ResourceTree,
    pub failures: Vec<NodeFailure>,
    pub stats: WalkStats,
    pub work: WorkListStats,
}

impl WalkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&WalkStats) + 'a>;

/// Depth-first walker over a resource scope
pub struct ResourceWalker<'s, S: DirectoryService + ?Sized> {
    service: &'s S,
    options: WalkOptions,
    progress: Option<ProgressFn<'s>>,
}

impl<'s, S: DirectoryService + ?Sized> ResourceWalker<'s, S> {
    pub fn new(service: &'s S, options: WalkOptions) -> Self {
        Self {
            service,
            options,
            progress: None,
        }
    }

    /// Call `f` after every container expansion
    pub fn with_progress(mut self, f: impl FnMut(&WalkStats) + 's) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Walk `scope` from its root
    pub fn walk(&mut self, scope: ResourceScope) -> WalkOutcome {
        let start = Instant::now();
        let query = PagedQuery::new(self.service);

        let mut tree = ResourceTree::new();
        let mut failures = Vec::new();
        let mut stats = WalkStats::default();
        let mut visited: HashSet<ResourceLocator> = HashSet::new();
        let mut work = WorkList::new();
        work.push(ScopeTask::root());

        info!("Walking {} network (max depth {})", scope, self.options.max_depth);

        while let Some(task) = work.pop() {
            let request = EnumerationRequest::new(
                RecordKind::NetResource,
                Target::Network {
                    scope,
                    container: task.locator.clone(),
                },
            )
            .with_filter(Filter::Resources(self.options.resource_type))
            .with_capacity(self.options.capacity);

            let outcome = query.run(&request, &ResourceDecoder);
            stats.pages += outcome.stats.pages;

            if let Some(error) = outcome.error {
                // Partial children of a failed container are dropped
                warn!(
                    "Cannot enumerate {}: {} ({} partial entries dropped)",
                    request.target(),
                    error,
                    outcome.entries.len()
                );
                if let Some(id) = task.node {
                    tree.set_expansion(id, Expansion::Failed);
                }
                failures.push(NodeFailure {
                    node: task.node,
                    resource: task.node.and_then(|id| tree.get(id)).map(|n| n.resource.clone()),
                    error,
                });
                stats.failures += 1;
                self.report(&stats);
                continue;
            }

            if let Some(id) = task.node {
                tree.set_expansion(id, Expansion::Expanded);
                stats.containers_expanded += 1;
            }
            debug!(
                "{}: {} children at depth {}",
                request.target(),
                outcome.entries.len(),
                task.depth + 1
            );

            let mut pending = Vec::new();
            for resource in outcome.entries {
                let id = tree.add(task.node, resource);
                stats.nodes += 1;

                let Some(node) = tree.get(id) else { continue };
                let depth = node.depth;
                stats.max_depth = stats.max_depth.max(depth);
                if !node.resource.is_container() {
                    continue;
                }

                let locator = node.resource.locator();
                let marker = if self.options.is_excluded(&locator.remote_name) {
                    stats.excluded += 1;
                    Expansion::Excluded
                } else if depth >= self.options.max_depth {
                    stats.truncated += 1;
                    Expansion::Truncated
                } else if !visited.insert(locator.folded()) {
                    stats.revisited += 1;
                    Expansion::Revisited
                } else {
                    pending.push(ScopeTask::container(id, locator, depth));
                    continue;
                };
                debug!("Not expanding {}: {:?}", node.resource.remote_name, marker);
                tree.set_expansion(id, marker);
            }
            work.push_siblings(pending);

            self.report(&stats);
        }

        stats.elapsed = start.elapsed();
        info!(
            "Walked {} network: {} nodes, {} containers expanded, {} failures",
            scope, stats.nodes, stats.containers_expanded, stats.failures
        );

        WalkOutcome {
            scope,
            tree,
            failures,
            stats,
            work: work.stats(),
        }
    }

    fn report(&mut self, stats: &WalkStats) {
        if let Some(progress) = self.progress.as_mut() {
            progress(stats);
        }
    }
}

/// Walk `scope` with default options and the given depth cap
pub fn walk<S: DirectoryService + ?Sized>(
    service: &S,
    scope: ResourceScope,
    max_depth: usize,
) -> WalkOutcome {
    ResourceWalker::new(service, WalkOptions::default().with_max_depth(max_depth)).walk(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MemoryDirectory;

    const NETWORK: &str = r#"{"network": {"global": [
        {"remote_name": "A", "usage": 1},
        {"remote_name": "B", "usage": 2, "children": [
            {"remote_name": "C", "usage": 1},
            {"remote_name": "D", "usage": 1},
            {"remote_name": "E", "usage": 1}
        ]}
    ]}}"#;

    #[test]
    fn test_scenario_tree() {
        let service = MemoryDirectory::from_json_str(NETWORK).unwrap();
        let outcome = walk(&service, ResourceScope::GlobalNet, DEFAULT_MAX_DEPTH);

        let tree = &outcome.tree;
        assert!(outcome.is_complete());
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(outcome.stats.max_depth, 2);

        let b = tree.find("B").unwrap();
        let names: Vec<_> = tree
            .children(b)
            .iter()
            .map(|id| tree.get(*id).unwrap().resource.remote_name.as_str())
            .collect();
        assert_eq!(names, vec!["C", "D", "E"]);
        assert_eq!(tree.get(b).unwrap().expansion, Expansion::Expanded);

        // root scope and B only
        assert_eq!(service.counters().opens, 2);
    }

    #[test]
    fn test_depth_cap_truncates() {
        let service = MemoryDirectory::from_json_str(NETWORK).unwrap();
        let outcome = walk(&service, ResourceScope::GlobalNet, 1);

        let b = outcome.tree.find("B").unwrap();
        assert!(outcome.tree.children(b).is_empty());
        assert_eq!(outcome.tree.get(b).unwrap().expansion, Expansion::Truncated);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.stats.truncated, 1);
        assert_eq!(outcome.tree.len(), 2);
    }

    #[test]
    fn test_exclude_pattern() {
        let service = MemoryDirectory::from_json_str(NETWORK).unwrap();
        let options = WalkOptions {
            exclude: vec![Regex::new("^B$").unwrap()],
            ..Default::default()
        };
        let outcome = ResourceWalker::new(&service, options).walk(ResourceScope::GlobalNet);

        let b = outcome.tree.find("B").unwrap();
        assert_eq!(outcome.tree.get(b).unwrap().expansion, Expansion::Excluded);
        assert_eq!(service.counters().opens, 1);
    }

    #[test]
    fn test_cycle_not_revisited() {
        // LOOP lists itself as a child
        let service = MemoryDirectory::from_json_str(
            r#"{"network": {"global": [
                {"remote_name": "LOOP", "usage": 2, "children": [
                    {"remote_name": "LOOP", "usage": 2}
                ]}
            ]}}"#,
        )
        .unwrap();

        let outcome = walk(&service, ResourceScope::GlobalNet, DEFAULT_MAX_DEPTH);
        assert_eq!(outcome.tree.len(), 2);
        assert_eq!(outcome.stats.revisited, 1);
        assert_eq!(service.counters().opens, 2);
    }

    #[test]
    fn test_cycle_ignores_case() {
        // the service resolves remote names without case
        let service = MemoryDirectory::from_json_str(
            r#"{"network": {"global": [
                {"remote_name": "\\\\LOOP", "usage": 2, "children": [
                    {"remote_name": "\\\\loop", "usage": 2}
                ]}
            ]}}"#,
        )
        .unwrap();

        let outcome = walk(&service, ResourceScope::GlobalNet, DEFAULT_MAX_DEPTH);
        assert_eq!(outcome.tree.len(), 2);
        assert_eq!(outcome.stats.revisited, 1);
        assert_eq!(outcome.stats.containers_expanded, 1);
        assert_eq!(service.counters().opens, 2);

        let root = outcome.tree.roots()[0];
        assert_eq!(outcome.tree.get(root).unwrap().expansion, Expansion::Expanded);
        let child = outcome.tree.children(root)[0];
        assert_eq!(outcome.tree.get(child).unwrap().expansion, Expansion::Revisited);
    }

    #[test]
    fn test_fetch_failure_isolated() {
        let service = MemoryDirectory::from_json_str(
            r#"{"network": {"global": [
                {"remote_name": "B", "usage": 2, "children": [
                    {"remote_name": "C", "usage": 1},
                    {"remote_name": "D", "usage": 1},
                    {"remote_name": "E", "usage": 1}
                ]},
                {"remote_name": "F", "usage": 2, "children": [
                    {"remote_name": "G", "usage": 1}
                ]}
            ]}}"#,
        )
        .unwrap();
        service.fail_fetch(
            "B",
            2,
            ServiceError::PermissionDenied {
                target: "B".into(),
            },
        );

        let options = WalkOptions {
            capacity: Capacity::Entries(1),
            ..Default::default()
        };
        let outcome = ResourceWalker::new(&service, options).walk(ResourceScope::GlobalNet);
        let tree = &outcome.tree;

        // C arrived on the first page but is dropped with the rest of B
        let b = tree.find("B").unwrap();
        assert!(tree.children(b).is_empty());
        assert_eq!(tree.get(b).unwrap().expansion, Expansion::Failed);
        assert!(tree.find("C").is_none());

        let f = tree.find("F").unwrap();
        assert_eq!(tree.children(f).len(), 1);
        assert!(tree.find("G").is_some());
        assert_eq!(tree.len(), 3);

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].node, Some(b));
        assert!(matches!(
            outcome.failures[0].error,
            ServiceError::PermissionDenied { .. }
        ));

        let counters = service.counters();
        assert_eq!(counters.opens, 3);
        assert_eq!(counters.closes, 3);
        assert_eq!(counters.acquired, 4);
        assert_eq!(counters.released, 4);
        assert_eq!(service.open_handles(), 0);
        assert_eq!(service.outstanding_buffers(), 0);
    }

    #[test]
    fn test_shared_name_resolved_by_provider() {
        let service = MemoryDirectory::from_json_str(
            r#"{"network": {"global": [
                {"remote_name": "X", "usage": 2, "children": [
                    {"remote_name": "DUP", "usage": 2, "children": [
                        {"remote_name": "X1", "usage": 1}
                    ]}
                ]},
                {"remote_name": "Y", "provider": "Other Network", "usage": 2, "children": [
                    {"remote_name": "DUP", "provider": "Other Network", "usage": 2, "children": [
                        {"remote_name": "Y1", "usage": 1}
                    ]}
                ]}
            ]}}"#,
        )
        .unwrap();

        let outcome = walk(&service, ResourceScope::GlobalNet, DEFAULT_MAX_DEPTH);
        let tree = &outcome.tree;
        assert!(outcome.is_complete());
        assert_eq!(tree.len(), 6);

        let only_grandchild = |root: &str| {
            let parent = tree.find(root).unwrap();
            let dup = tree.children(parent)[0];
            let leaves = tree.children(dup);
            assert_eq!(leaves.len(), 1);
            tree.get(leaves[0]).unwrap().resource.remote_name.clone()
        };
        assert_eq!(only_grandchild("X"), "X1");
        assert_eq!(only_grandchild("Y"), "Y1");
    }

    #[test]
    fn test_root_failure_recorded() {
        let service = MemoryDirectory::from_json_str(NETWORK).unwrap();
        service.fail_open(
            "global network",
            ServiceError::Unavailable {
                code: crate::error::codes::ERROR_NO_NETWORK,
            },
        );

        let outcome = walk(&service, ResourceScope::GlobalNet, DEFAULT_MAX_DEPTH);
        assert!(outcome.tree.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].node.is_none());
    }

    #[test]
    fn test_progress_callback() {
        let service = MemoryDirectory::from_json_str(NETWORK).unwrap();
        let mut calls = 0;
        {
            let mut walker = ResourceWalker::new(&service, WalkOptions::default())
                .with_progress(|_| calls += 1);
            walker.walk(ResourceScope::GlobalNet);
        }
        assert_eq!(calls, 2);
    }
}
