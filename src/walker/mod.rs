//! Network resource tree walking
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │      ResourceWalker      │
//!                 │  - pops a ScopeTask      │
//!                 │  - runs a PagedQuery     │
//!                 └────────────┬─────────────┘
//!                              │ children
//!            ┌─────────────────┼──────────────────┐
//!            ▼                 ▼                  ▼
//!      ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//!      │   leaf    │   │  container   │   │  container   │
//!      │ (attach)  │   │ push task    │   │ depth cap /  │
//!      └───────────┘   └──────────────┘   │ exclude /    │
//!                                         │ revisit mark │
//!                                         └──────────────┘
//! ```
//!
//! The tree is an arena ([`ResourceTree`]); the pending scopes are an
//! explicit stack ([`WorkList`]).

pub mod queue;
pub mod resource;
pub mod tree;

pub use queue::{ScopeTask, WorkList, WorkListStats};
pub use resource::{
    walk, NodeFailure, ResourceWalker, WalkOptions, WalkOutcome, WalkStats, DEFAULT_MAX_DEPTH,
};
pub use tree::{Expansion, NodeId, ResourceTree, TreeNode};
