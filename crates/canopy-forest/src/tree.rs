//! Array-backed binary tree with index-arithmetic navigation.

use crate::error::ForestError;
use crate::histogram::HistogramStatistics;
use crate::node::{Node, NodeIndex};
use crate::weak_learner::{Direction, SplitPoint};

/// Largest depth whose arena size fits in a `usize`.
pub const MAX_TREE_DEPTH: usize = (usize::BITS - 1) as usize;

/// A fixed-capacity binary tree of depth `max_depth`.
///
/// The arena holds `2^max_depth - 1` slots in heap order. Slots on the
/// deepest level are pre-marked leaves, so no node can ever be split below
/// the configured depth. Slots under a leaf stay unvisited.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tree<P> {
    nodes: Vec<Node<P>>,
    max_depth: usize,
}

impl<P> Tree<P> {
    /// Allocate an empty tree for the given maximum depth (root is depth 1).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::InvalidTreeDepth`] | `max_depth` is 0 or exceeds [`MAX_TREE_DEPTH`] |
    /// | [`ForestError::TreeAllocation`] | the node arena cannot be allocated |
    pub fn new(max_depth: usize) -> Result<Self, ForestError> {
        if max_depth == 0 || max_depth > MAX_TREE_DEPTH {
            return Err(ForestError::InvalidTreeDepth {
                tree_depth: max_depth,
                max: MAX_TREE_DEPTH,
            });
        }
        let capacity = (1usize << max_depth) - 1;
        let first_leaf = (1usize << (max_depth - 1)) - 1;
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(capacity)
            .map_err(|source| ForestError::TreeAllocation {
                tree_depth: max_depth,
                capacity,
                source,
            })?;
        nodes.extend((0..capacity).map(|i| Node::new(i >= first_leaf)));
        Ok(Self { nodes, max_depth })
    }

    /// Return the configured maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the number of arena slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Return the root index.
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        NodeIndex::ROOT
    }

    /// Return the node at `index`, or `None` outside the arena.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node<P>> {
        self.nodes.get(index.index())
    }

    /// Return the left child of `index`, or `None` on the deepest level.
    #[must_use]
    pub fn left_child(&self, index: NodeIndex) -> Option<NodeIndex> {
        let child = index.left_child();
        (child.index() < self.nodes.len()).then_some(child)
    }

    /// Return the right child of `index`, or `None` on the deepest level.
    #[must_use]
    pub fn right_child(&self, index: NodeIndex) -> Option<NodeIndex> {
        let child = index.right_child();
        (child.index() < self.nodes.len()).then_some(child)
    }

    /// Depth of `index`, counting the root as depth 1.
    #[must_use]
    pub fn depth_of(&self, index: NodeIndex) -> usize {
        index.depth()
    }

    /// Return `true` if the node at `index` is a leaf. Slots outside the
    /// arena count as leaves.
    #[must_use]
    pub fn is_leaf(&self, index: NodeIndex) -> bool {
        self.nodes.get(index.index()).is_none_or(|node| node.leaf)
    }

    /// `true` if the arena holds exactly `2^max_depth - 1` slots for a
    /// supported depth. Only decoded trees can fail this.
    pub(crate) fn has_consistent_arena(&self) -> bool {
        (1..=MAX_TREE_DEPTH).contains(&self.max_depth)
            && self.nodes.len() == (1usize << self.max_depth) - 1
    }

    /// Attach the statistics of the samples that reached `index`.
    pub fn set_statistics(&mut self, index: NodeIndex, statistics: HistogramStatistics) {
        self.nodes[index.index()].statistics = Some(statistics);
    }

    /// Mark `index` as a leaf.
    pub fn set_leaf(&mut self, index: NodeIndex) {
        let node = &mut self.nodes[index.index()];
        node.leaf = true;
        node.split_point = None;
    }

    /// Attach the chosen split point to the interior node `index`.
    pub fn set_split_point(&mut self, index: NodeIndex, split_point: P) {
        let node = &mut self.nodes[index.index()];
        debug_assert!(!node.leaf, "leaf nodes never carry a split point");
        node.split_point = Some(split_point);
    }

    /// Iterate over visited nodes in pre-order (node, left subtree, right subtree).
    pub fn visited_nodes(&self) -> PreOrder<'_, P> {
        PreOrder {
            tree: self,
            stack: vec![0],
        }
    }

    /// Iterate over leaves from left to right.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeIndex, &Node<P>)> {
        self.visited_nodes().filter(|(_, node)| node.is_leaf())
    }

    /// Return the number of nodes training reached.
    #[must_use]
    pub fn n_visited_nodes(&self) -> usize {
        self.visited_nodes().count()
    }

    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.leaves().count()
    }

    /// Return the depth of the deepest visited node (0 for an untrained tree).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.visited_nodes()
            .map(|(index, _)| index.depth())
            .max()
            .unwrap_or(0)
    }

    /// Route `sample` from the root to a leaf and return the leaf index.
    pub fn evaluate<S: ?Sized>(&self, sample: &S) -> NodeIndex
    where
        P: SplitPoint<S>,
    {
        let mut index = NodeIndex::ROOT;
        loop {
            let Some(node) = self.nodes.get(index.index()) else {
                return index;
            };
            let Some(split_point) = node.split_point.as_ref().filter(|_| !node.leaf) else {
                return index;
            };
            let child = match split_point.evaluate(sample) {
                Direction::Left => index.left_child(),
                Direction::Right => index.right_child(),
            };
            if child.index() >= self.nodes.len() {
                return index;
            }
            index = child;
        }
    }

    /// Return the statistics of the leaf `sample` is routed to.
    pub fn leaf_statistics<S: ?Sized>(&self, sample: &S) -> Option<&HistogramStatistics>
    where
        P: SplitPoint<S>,
    {
        self.nodes.get(self.evaluate(sample).index())?.statistics()
    }
}

#[cfg(test)]
impl<P> Tree<P> {
    pub(crate) fn truncate_arena(&mut self, len: usize) {
        self.nodes.truncate(len);
    }
}

/// Pre-order iterator over the visited nodes of a [`Tree`].
#[derive(Debug)]
pub struct PreOrder<'a, P> {
    tree: &'a Tree<P>,
    stack: Vec<usize>,
}

impl<'a, P> Iterator for PreOrder<'a, P> {
    type Item = (NodeIndex, &'a Node<P>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(i) = self.stack.pop() {
            let Some(node) = self.tree.nodes.get(i) else {
                continue;
            };
            if !node.is_visited() {
                continue;
            }
            if !node.leaf && node.split_point.is_some() {
                self.stack.push(2 * i + 2);
                self.stack.push(2 * i + 1);
            }
            return Some((NodeIndex::new(i), node));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parity;

    impl SplitPoint<usize> for Parity {
        fn evaluate(&self, sample: &usize) -> Direction {
            if sample % 2 == 0 {
                Direction::Left
            } else {
                Direction::Right
            }
        }
    }

    #[test]
    fn truncated_arena_reads_do_not_panic() {
        let mut tree = Tree::<Parity>::new(3).unwrap();
        tree.set_statistics(NodeIndex::ROOT, HistogramStatistics::new(2));
        tree.set_split_point(NodeIndex::ROOT, Parity);
        tree.truncate_arena(1);
        assert!(!tree.has_consistent_arena());
        assert_eq!(tree.evaluate(&3usize), NodeIndex::ROOT);
        assert!(tree.is_leaf(NodeIndex::ROOT.left_child()));

        tree.truncate_arena(0);
        assert_eq!(tree.evaluate(&3usize), NodeIndex::ROOT);
        assert!(tree.leaf_statistics(&3usize).is_none());
        assert!(tree.is_leaf(NodeIndex::ROOT));
    }

    #[test]
    fn zero_depth_error() {
        let err = Tree::<()>::new(0).unwrap_err();
        assert!(matches!(err, ForestError::InvalidTreeDepth { tree_depth: 0, .. }));
    }

    #[test]
    fn capacity_and_prelabelled_leaves() {
        let tree = Tree::<()>::new(3).unwrap();
        assert_eq!(tree.capacity(), 7);
        for i in 0..3 {
            assert!(!tree.is_leaf(NodeIndex::new(i)));
        }
        for i in 3..7 {
            assert!(tree.is_leaf(NodeIndex::new(i)));
        }
        assert_eq!(tree.left_child(NodeIndex::new(3)), None);
        assert_eq!(tree.right_child(NodeIndex::new(2)), Some(NodeIndex::new(6)));
    }

    #[test]
    fn single_level_tree_root_is_leaf() {
        let tree = Tree::<()>::new(1).unwrap();
        assert!(tree.is_leaf(tree.root()));
    }

    #[test]
    fn evaluate_follows_split_points() {
        let mut tree = Tree::<Parity>::new(2).unwrap();
        let root = tree.root();
        tree.set_statistics(root, HistogramStatistics::from_counts(vec![2, 2]));
        tree.set_split_point(root, Parity);
        let left = tree.left_child(root).unwrap();
        let right = tree.right_child(root).unwrap();
        tree.set_statistics(left, HistogramStatistics::from_counts(vec![2, 0]));
        tree.set_statistics(right, HistogramStatistics::from_counts(vec![0, 2]));

        assert_eq!(tree.evaluate(&4usize), left);
        assert_eq!(tree.evaluate(&7usize), right);
        assert_eq!(tree.leaf_statistics(&7usize).unwrap().get_max_bin(), 1);
        assert_eq!(tree.n_visited_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn pre_order_visits_left_before_right() {
        let mut tree = Tree::<Parity>::new(3).unwrap();
        for i in [0usize, 1] {
            tree.set_statistics(NodeIndex::new(i), HistogramStatistics::new(1));
            tree.set_split_point(NodeIndex::new(i), Parity);
        }
        for i in [3usize, 4, 2] {
            tree.set_statistics(NodeIndex::new(i), HistogramStatistics::new(1));
        }
        tree.set_leaf(NodeIndex::new(2));
        let order: Vec<usize> = tree.visited_nodes().map(|(i, _)| i.index()).collect();
        assert_eq!(order, vec![0, 1, 3, 4, 2]);
        let leaves: Vec<usize> = tree.leaves().map(|(i, _)| i.index()).collect();
        assert_eq!(leaves, vec![3, 4, 2]);
    }
}
