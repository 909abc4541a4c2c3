//! Review gate: status state machine and tree filtering.
//!
//! The review loop is modeled as a pure filter over an immutable tree
//! snapshot plus explicit status transitions, so regenerating output from
//! a review artifact is always reproducible.

use crate::error::{LegisError, Result};
use crate::types::{find_node_mut, HierarchyNode, NodeStatus};

/// Apply a status transition to a node, enforcing the state machine:
///
/// ```text
/// pending  -> approved | rejected | modified
/// modified -> approved | rejected | modified
/// approved, rejected: terminal
/// ```
pub fn transition(node: &mut HierarchyNode, to: NodeStatus) -> Result<()> {
    let from = node.status;
    let allowed = match from {
        NodeStatus::Pending => matches!(
            to,
            NodeStatus::Approved | NodeStatus::Rejected | NodeStatus::Modified
        ),
        // Re-edits stay modified; re-approval or rejection closes the loop.
        NodeStatus::Modified => matches!(
            to,
            NodeStatus::Approved | NodeStatus::Rejected | NodeStatus::Modified
        ),
        NodeStatus::Approved | NodeStatus::Rejected => false,
    };
    if !allowed {
        return Err(LegisError::InvalidTransition { from, to });
    }
    node.status = to;
    Ok(())
}

/// Transition the node with the given id anywhere in the forest.
pub fn set_status(nodes: &mut [HierarchyNode], id: &str, to: NodeStatus) -> Result<()> {
    let node = find_node_mut(nodes, id).ok_or_else(|| LegisError::UnknownNode(id.to_string()))?;
    transition(node, to)
}

/// Prune a forest to the nodes whose status is in `include`.
///
/// Pure: operates on a snapshot and returns a new forest. A node outside
/// the included set is removed together with its entire subtree; retained
/// nodes keep their parent linkage unchanged.
#[must_use]
pub fn filter(nodes: &[HierarchyNode], include: &[NodeStatus]) -> Vec<HierarchyNode> {
    nodes
        .iter()
        .filter(|node| include.contains(&node.status))
        .map(|node| {
            let mut kept = node.clone();
            kept.children = filter(&node.children, include);
            kept
        })
        .collect()
}
