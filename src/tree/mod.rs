//! Call tree aggregation.
//!
//! This module transforms stack samples into:
//! - A merged call tree with inclusive/exclusive metrics per node
//! - Sum-by-name rollups (flat profile)
//! - Caller/callee views of a single name

pub mod call_tree;
pub mod caller_callee;
pub mod node;
pub mod rollup;

// Re-export main types
pub use call_tree::{compare_inclusive_descending, CallTree, CallTreeConfig, ROOT};
pub use caller_callee::CallerCalleeNode;
pub use node::{CallTreeNode, CallTreeNodeBase, NodeId};
