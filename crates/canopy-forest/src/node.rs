use std::fmt;

use crate::histogram::HistogramStatistics;

/// Index into a tree's node arena.
///
/// The root is index 0; the children of node `i` are `2i + 1` and `2i + 2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// The root of every tree.
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// Create a node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Index of the left child.
    #[must_use]
    pub fn left_child(self) -> Self {
        Self(2 * self.0 + 1)
    }

    /// Index of the right child.
    #[must_use]
    pub fn right_child(self) -> Self {
        Self(2 * self.0 + 2)
    }

    /// Depth of this position, counting the root as depth 1.
    #[must_use]
    pub fn depth(self) -> usize {
        ((self.0 + 1).ilog2() + 1) as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One slot of the tree arena.
///
/// A slot starts unvisited (no statistics). Training attaches statistics
/// exactly once and then either marks the node a leaf or attaches a split
/// point; a leaf never carries a split point.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node<P> {
    pub(crate) statistics: Option<HistogramStatistics>,
    pub(crate) split_point: Option<P>,
    pub(crate) leaf: bool,
}

impl<P> Node<P> {
    pub(crate) fn new(leaf: bool) -> Self {
        Self {
            statistics: None,
            split_point: None,
            leaf,
        }
    }

    /// Return the class histogram of the samples that reached this node.
    #[must_use]
    pub fn statistics(&self) -> Option<&HistogramStatistics> {
        self.statistics.as_ref()
    }

    /// Return the split point of an interior node.
    #[must_use]
    pub fn split_point(&self) -> Option<&P> {
        self.split_point.as_ref()
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Return `true` if training reached this node.
    #[must_use]
    pub fn is_visited(&self) -> bool {
        self.statistics.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, NodeIndex};

    #[test]
    fn node_index_roundtrip() {
        let ni = NodeIndex::new(42);
        assert_eq!(ni.index(), 42);
    }

    #[test]
    fn node_index_display() {
        assert_eq!(format!("{}", NodeIndex::ROOT), "0");
    }

    #[test]
    fn children_follow_heap_layout() {
        let root = NodeIndex::ROOT;
        assert_eq!(root.left_child().index(), 1);
        assert_eq!(root.right_child().index(), 2);
        assert_eq!(root.right_child().left_child().index(), 5);
    }

    #[test]
    fn depth_counts_root_as_one() {
        assert_eq!(NodeIndex::new(0).depth(), 1);
        assert_eq!(NodeIndex::new(1).depth(), 2);
        assert_eq!(NodeIndex::new(2).depth(), 2);
        assert_eq!(NodeIndex::new(3).depth(), 3);
        assert_eq!(NodeIndex::new(6).depth(), 3);
        assert_eq!(NodeIndex::new(7).depth(), 4);
    }

    #[test]
    fn fresh_node_is_unvisited() {
        let node: Node<()> = Node::new(false);
        assert!(!node.is_visited());
        assert!(!node.is_leaf());
        assert!(node.split_point().is_none());
    }
}
