//! An ordered ensemble of trained trees.

use crate::histogram::HistogramStatistics;
use crate::node::NodeIndex;
use crate::tree::Tree;
use crate::weak_learner::SplitPoint;

/// A trained forest. Trees are kept in training order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Forest<P> {
    pub(crate) trees: Vec<Tree<P>>,
    pub(crate) num_of_classes: usize,
}

impl<P> Forest<P> {
    /// Create an empty forest over `num_of_classes` labels.
    #[must_use]
    pub fn new(num_of_classes: usize) -> Self {
        Self {
            trees: Vec::new(),
            num_of_classes,
        }
    }

    /// Append a fully grown tree.
    pub fn add_tree(&mut self, tree: Tree<P>) {
        self.trees.push(tree);
    }

    /// Return the number of trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Return `true` if the forest has no trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Return the number of class labels.
    #[must_use]
    pub fn num_of_classes(&self) -> usize {
        self.num_of_classes
    }

    /// Return the trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[Tree<P>] {
        &self.trees
    }

    /// Iterate over the trees in training order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tree<P>> {
        self.trees.iter()
    }

    /// Route `sample` through every tree; one leaf index per tree.
    pub fn evaluate<S: ?Sized>(&self, sample: &S) -> Vec<NodeIndex>
    where
        P: SplitPoint<S>,
    {
        self.trees.iter().map(|tree| tree.evaluate(sample)).collect()
    }

    /// Leaf statistics reached by `sample` in every tree.
    pub fn leaf_statistics<S: ?Sized>(&self, sample: &S) -> Vec<&HistogramStatistics>
    where
        P: SplitPoint<S>,
    {
        self.trees
            .iter()
            .filter_map(|tree| tree.leaf_statistics(sample))
            .collect()
    }

    /// Average of the per-tree normalized leaf histograms.
    ///
    /// Returns all zeros for an empty forest.
    pub fn predict_proba<S: ?Sized>(&self, sample: &S) -> Vec<f64>
    where
        P: SplitPoint<S>,
    {
        let mut proba = vec![0.0; self.num_of_classes];
        let leaves = self.leaf_statistics(sample);
        if leaves.is_empty() {
            return proba;
        }
        for statistics in &leaves {
            for (acc, p) in proba.iter_mut().zip(statistics.probabilities()) {
                *acc += p;
            }
        }
        let n = leaves.len() as f64;
        for p in &mut proba {
            *p /= n;
        }
        proba
    }

    /// Most probable class; ties go to the lowest label.
    pub fn predict<S: ?Sized>(&self, sample: &S) -> usize
    where
        P: SplitPoint<S>,
    {
        let mut best = 0;
        let mut best_p = f64::NEG_INFINITY;
        for (label, p) in self.predict_proba(sample).into_iter().enumerate() {
            if p > best_p {
                best = label;
                best_p = p;
            }
        }
        best
    }
}

impl<'a, P> IntoIterator for &'a Forest<P> {
    type Item = &'a Tree<P>;
    type IntoIter = std::slice::Iter<'a, Tree<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.iter()
    }
}
