//! Segments, citations, hierarchy nodes and document structure.
//!
//! Hierarchy trees are built by the segmenter and mutated only through the
//! review gate afterwards; serializers only read. Children are directly
//! owned by their parent (exactly one owner); `parent_id` is a lookup key,
//! never an owning pointer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate hierarchy unit discovered by the oracle at one level.
///
/// Transient: consumed immediately to build a [`HierarchyNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Discovered element type, e.g. "chapter", "section", "rule".
    #[serde(rename = "type")]
    pub kind: String,
    /// Identifier as printed in the document, e.g. "I", "1", "(a)".
    pub number: String,
    /// Heading text if present.
    pub title: Option<String>,
    /// First line of the segment (inclusive).
    pub start_line: u32,
    /// Last line of the segment (inclusive).
    pub end_line: u32,
    /// Oracle confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Page/line provenance binding a node back to its source location.
///
/// Derived, never hand-edited; `snippet` is a bounded excerpt for human
/// review only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub snippet: String,
}

/// Review status of a hierarchy node.
///
/// `Pending` is the initial state of every freshly segmented node;
/// `Approved` and `Rejected` are terminal; `Modified` carries edited fields
/// and is non-terminal until re-approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl NodeStatus {
    /// True for states that permit no further transition.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Modified => "modified",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "modified" => Ok(Self::Modified),
            _ => Err(format!(
                "unknown status '{s}'. Valid options: pending, approved, rejected, modified"
            )),
        }
    }
}

/// A validated, citation-bearing node of the structural tree.
///
/// Invariants maintained by the segmenter:
///
/// 1. Every child's line range is fully contained in this node's range.
/// 2. Children are ordered by `start_line` ascending and never overlap.
/// 3. `content` is non-null iff `children` is empty.
/// 4. Ids are globally unique and stable for the lifetime of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    /// Depth in the hierarchy; 1 = top level.
    pub level: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Leaf text content; always `None` for nodes with children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub citation: Citation,
    pub confidence: f32,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
    pub children: Vec<HierarchyNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl HierarchyNode {
    /// True if the node has no children (and therefore carries content).
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in this subtree, including self.
    #[must_use]
    pub fn count(&self) -> u32 {
        1 + self.children.iter().map(HierarchyNode::count).sum::<u32>()
    }

    /// Depth-first pre-order visit of this subtree.
    pub fn visit(&self, f: &mut dyn FnMut(&HierarchyNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

/// Mint a fresh globally unique node id. Ids are never reused after
/// deletion.
#[must_use]
pub fn new_node_id() -> String {
    Uuid::new_v4().to_string()
}

/// Total node count over a forest.
#[must_use]
pub fn count_nodes(nodes: &[HierarchyNode]) -> u32 {
    nodes.iter().map(HierarchyNode::count).sum()
}

/// Find a node anywhere in a forest by id.
#[must_use]
pub fn find_node<'a>(nodes: &'a [HierarchyNode], id: &str) -> Option<&'a HierarchyNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Find a node anywhere in a forest by id, mutably.
pub fn find_node_mut<'a>(nodes: &'a mut [HierarchyNode], id: &str) -> Option<&'a mut HierarchyNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Depth-first pre-order visit of a forest.
pub fn visit_nodes(nodes: &[HierarchyNode], f: &mut dyn FnMut(&HierarchyNode)) {
    for node in nodes {
        node.visit(f);
    }
}

/// Check the structural invariants of a forest: child containment, sibling
/// order and non-overlap, and leaf/content exclusivity. Returns the first
/// violation found.
pub fn check_tree(nodes: &[HierarchyNode]) -> std::result::Result<(), String> {
    for node in nodes {
        if node.is_leaf() != node.content.is_some() {
            return Err(format!(
                "node {} ({} {}): leaf/content exclusivity violated",
                node.id, node.kind, node.number
            ));
        }
        let mut cursor: Option<u32> = None;
        for child in &node.children {
            if child.citation.start_line < node.citation.start_line
                || child.citation.end_line > node.citation.end_line
            {
                return Err(format!(
                    "node {}: child {} range {}..={} escapes parent {}..={}",
                    node.id,
                    child.id,
                    child.citation.start_line,
                    child.citation.end_line,
                    node.citation.start_line,
                    node.citation.end_line
                ));
            }
            if let Some(prev_end) = cursor {
                if child.citation.start_line <= prev_end {
                    return Err(format!(
                        "node {}: children overlap at line {}",
                        node.id, child.citation.start_line
                    ));
                }
            }
            cursor = Some(child.citation.end_line);
        }
        check_tree(&node.children)?;
    }
    Ok(())
}

/// Analyzed document structure; fixes the depth and per-level expected
/// type before segmentation begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    /// "act", "rules", "regulation", "bill", ...
    pub document_type: String,
    /// "India", "Ireland", "UK", ...
    pub jurisdiction: String,
    /// Hierarchical levels, outermost first, e.g.
    /// `["chapter", "section", "subsection"]`.
    pub hierarchy_types: Vec<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enactment_date: Option<String>,
    /// Document number, e.g. "Act No. 22 of 2023", "S.I. 607 of 2024".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
}
