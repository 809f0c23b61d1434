//! Arena-backed resource tree
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Edges
//! only run from a container to the nodes enumerated under it.

use crate::service::ResourceNode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What happened when the walker reached a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expansion {
    /// Not a container; never enumerated
    Leaf,
    /// Container queued for expansion
    Pending,
    /// Children enumerated
    Expanded,
    /// Container at the depth cap
    Truncated,
    /// Container matched an exclude pattern
    Excluded,
    /// Container already expanded elsewhere in this walk
    Revisited,
    /// Enumerating under the container failed
    Failed,
}

impl Expansion {
    pub fn as_str(self) -> &'static str {
        match self {
            Expansion::Leaf => "leaf",
            Expansion::Pending => "pending",
            Expansion::Expanded => "expanded",
            Expansion::Truncated => "truncated",
            Expansion::Excluded => "excluded",
            Expansion::Revisited => "revisited",
            Expansion::Failed => "failed",
        }
    }

    /// Short marker for tree rendering
    pub fn marker(self) -> &'static str {
        match self {
            Expansion::Leaf | Expansion::Expanded => "",
            Expansion::Pending => "[pending]",
            Expansion::Truncated => "[truncated]",
            Expansion::Excluded => "[excluded]",
            Expansion::Revisited => "[revisited]",
            Expansion::Failed => "[failed]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub resource: ResourceNode,
    pub children: Vec<NodeId>,
    /// Roots are at depth 1
    pub depth: usize,
    pub expansion: Expansion,
}

/// Rooted forest of network resources
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `resource` under `parent` (or as a root)
    pub fn add(&mut self, parent: Option<NodeId>, resource: ResourceNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = parent.map_or(1, |p| self.nodes[p.0].depth + 1);
        let expansion = if resource.is_container() {
            Expansion::Pending
        } else {
            Expansion::Leaf
        };

        self.nodes.push(TreeNode {
            id,
            parent,
            resource,
            children: Vec::new(),
            depth,
            expansion,
        });

        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn set_expansion(&mut self, id: NodeId, expansion: Expansion) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.expansion = expansion;
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[][..], |n| &n.children)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Deepest node depth, 0 for an empty tree
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn count(&self, expansion: Expansion) -> usize {
        self.nodes.iter().filter(|n| n.expansion == expansion).count()
    }

    /// First node with this remote name, in pre-order
    pub fn find(&self, remote_name: &str) -> Option<NodeId> {
        self.preorder()
            .find(|n| n.resource.remote_name.eq_ignore_ascii_case(remote_name))
            .map(|n| n.id)
    }

    /// Ancestors of `id`, root first, ending with `id`
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.get(id).map(|n| n.id);
        while let Some(node) = current.and_then(|c| self.get(c)) {
            path.push(node.id);
            current = node.parent;
        }
        path.reverse();
        path
    }

    /// Depth-first pre-order traversal, siblings in service order
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }
}

pub struct Preorder<'a> {
    tree: &'a ResourceTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ResourceUsage;

    fn resource(name: &str, container: bool) -> ResourceNode {
        ResourceNode {
            scope: Default::default(),
            resource_type: Default::default(),
            display_type: Default::default(),
            usage: ResourceUsage(if container {
                ResourceUsage::CONTAINER
            } else {
                ResourceUsage::CONNECTABLE
            }),
            local_name: None,
            remote_name: name.into(),
            comment: None,
            provider: None,
        }
    }

    #[test]
    fn test_add_links_parent_and_depth() {
        let mut tree = ResourceTree::new();
        let a = tree.add(None, resource("A", false));
        let b = tree.add(None, resource("B", true));
        let c = tree.add(Some(b), resource("C", false));

        assert_eq!(tree.roots(), &[a, b]);
        assert_eq!(tree.children(b), &[c]);
        assert_eq!(tree.get(c).unwrap().depth, 2);
        assert_eq!(tree.get(a).unwrap().expansion, Expansion::Leaf);
        assert_eq!(tree.get(b).unwrap().expansion, Expansion::Pending);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn test_preorder_and_path() {
        let mut tree = ResourceTree::new();
        let net = tree.add(None, resource("Network", true));
        let corp = tree.add(Some(net), resource("CORP", true));
        let srv = tree.add(Some(corp), resource("\\\\FILESRV", true));
        tree.add(Some(net), resource("LAB", true));
        tree.add(None, resource("Other", false));

        let order: Vec<_> = tree
            .preorder()
            .map(|n| n.resource.remote_name.as_str())
            .collect();
        assert_eq!(order, vec!["Network", "CORP", "\\\\FILESRV", "LAB", "Other"]);

        assert_eq!(tree.path(srv), vec![net, corp, srv]);
        assert_eq!(tree.find("\\\\filesrv"), Some(srv));
    }

    #[test]
    fn test_expansion_counts() {
        let mut tree = ResourceTree::new();
        let b = tree.add(None, resource("B", true));
        tree.set_expansion(b, Expansion::Truncated);
        assert_eq!(tree.count(Expansion::Truncated), 1);
        assert_eq!(tree.count(Expansion::Pending), 0);
    }
}
