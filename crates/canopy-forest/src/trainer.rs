//! Depth-first recursive tree induction.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::TrainingParameters;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::node::NodeIndex;
use crate::sample::LabeledSample;
use crate::tree::Tree;
use crate::weak_learner::{SplitCandidates, WeakLearner};

/// Grows trees depth first over a caller-owned sample range.
///
/// Each node computes its class histogram, asks the weak learner for random
/// candidate splits, keeps the one with the highest information gain, and
/// partitions the range in place before recursing left then right. The
/// only side effect on the input is the reordering of its elements.
#[derive(Debug, Clone)]
pub struct DepthForestTrainer<W> {
    weak_learner: W,
    parameters: TrainingParameters,
}

impl<W> DepthForestTrainer<W> {
    /// Create a trainer.
    ///
    /// # Errors
    ///
    /// Returns the error of [`TrainingParameters::validate`].
    pub fn new(weak_learner: W, parameters: TrainingParameters) -> Result<Self, ForestError> {
        parameters.validate()?;
        Ok(Self {
            weak_learner,
            parameters,
        })
    }

    /// Return the weak learner.
    #[must_use]
    pub fn weak_learner(&self) -> &W {
        &self.weak_learner
    }

    /// Return the training parameters.
    #[must_use]
    pub fn parameters(&self) -> &TrainingParameters {
        &self.parameters
    }

    /// Train one tree with a generator seeded from the configured seed.
    ///
    /// # Errors
    ///
    /// See [`train_tree_with_rng`](Self::train_tree_with_rng).
    pub fn train_tree<S>(&self, samples: &mut [S]) -> Result<Tree<W::SplitPoint>, ForestError>
    where
        S: LabeledSample + Sync,
        W: WeakLearner<S>,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.parameters.seed);
        self.train_tree_with_rng(samples, &mut rng)
    }

    /// Train one tree, drawing every candidate from `rng`.
    ///
    /// # Errors
    ///
    /// Any error from the weak learner, histogram accumulation, or partition
    /// verification aborts training.
    #[instrument(skip_all, fields(num_of_samples = samples.len(), tree_depth = self.parameters.tree_depth))]
    pub fn train_tree_with_rng<S, R>(
        &self,
        samples: &mut [S],
        rng: &mut R,
    ) -> Result<Tree<W::SplitPoint>, ForestError>
    where
        S: LabeledSample + Sync,
        W: WeakLearner<S>,
        R: Rng + ?Sized,
    {
        let mut tree = Tree::new(self.parameters.tree_depth)?;
        self.train_tree_recursive(&mut tree, NodeIndex::ROOT, samples, rng)?;
        info!(
            n_visited_nodes = tree.n_visited_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "tree trained"
        );
        Ok(tree)
    }

    /// Train `num_of_trees` trees with a generator seeded from the configured seed.
    ///
    /// # Errors
    ///
    /// See [`train_forest_with_rng`](Self::train_forest_with_rng).
    pub fn train_forest<S>(&self, samples: &mut [S]) -> Result<Forest<W::SplitPoint>, ForestError>
    where
        S: LabeledSample + Sync,
        W: WeakLearner<S>,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.parameters.seed);
        self.train_forest_with_rng(samples, &mut rng)
    }

    /// Train `num_of_trees` trees one after another over the same range.
    ///
    /// Trees share `rng`, so tree `t + 1` starts from the generator state
    /// tree `t` left behind. The range is not resampled between trees.
    ///
    /// # Errors
    ///
    /// The first failing tree aborts the whole forest.
    #[instrument(skip_all, fields(num_of_samples = samples.len(), num_of_trees = self.parameters.num_of_trees))]
    pub fn train_forest_with_rng<S, R>(
        &self,
        samples: &mut [S],
        rng: &mut R,
    ) -> Result<Forest<W::SplitPoint>, ForestError>
    where
        S: LabeledSample + Sync,
        W: WeakLearner<S>,
        R: Rng + ?Sized,
    {
        let mut forest = Forest::new(self.weak_learner.num_of_classes());
        for t in 0..self.parameters.num_of_trees {
            debug!(tree = t, "training tree");
            let tree = self.train_tree_with_rng(samples, rng)?;
            forest.add_tree(tree);
        }
        info!(num_of_trees = forest.len(), "forest trained");
        Ok(forest)
    }

    fn train_tree_recursive<S, R>(
        &self,
        tree: &mut Tree<W::SplitPoint>,
        node: NodeIndex,
        samples: &mut [S],
        rng: &mut R,
    ) -> Result<(), ForestError>
    where
        S: LabeledSample + Sync,
        W: WeakLearner<S>,
        R: Rng + ?Sized,
    {
        let depth = node.depth();
        let num_of_samples = samples.len();
        let statistics = self.weak_learner.compute_statistics(samples)?;
        debug!(%node, depth, num_of_samples, "training node");
        tree.set_statistics(node, statistics.clone());

        if num_of_samples < self.parameters.minimum_num_of_samples {
            debug!(%node, num_of_samples, "leaf: too few samples");
            tree.set_leaf(node);
            return Ok(());
        }
        if tree.is_leaf(node) {
            debug!(%node, depth, "leaf: depth bound");
            return Ok(());
        }

        let candidates = self.weak_learner.sample_split_points(samples, rng)?;
        let split_statistics = if self.parameters.num_of_threads == 1 {
            self.weak_learner
                .compute_split_statistics(samples, &candidates)?
        } else {
            self.weak_learner.compute_split_statistics_parallel(
                samples,
                &candidates,
                self.parameters.num_of_threads,
            )?
        };
        let (best_index, best_gain) = self
            .weak_learner
            .find_best_split_point_tuple(&statistics, &split_statistics)?;

        if best_gain < self.parameters.minimum_information_gain {
            debug!(%node, best_gain, "leaf: gain below floor");
            tree.set_leaf(node);
            return Ok(());
        }

        let split_point = candidates.split_point(best_index)?;
        let boundary = self.weak_learner.partition(samples, &split_point)?;
        tree.set_split_point(node, split_point);
        debug!(
            %node,
            best_index,
            best_gain,
            num_left = boundary,
            num_right = num_of_samples - boundary,
            "split chosen"
        );

        let (left, right) = samples.split_at_mut(boundary);
        self.train_tree_recursive(tree, node.left_child(), left, rng)?;
        self.train_tree_recursive(tree, node.right_child(), right, rng)
    }
}
