//! Configuration builder for depth-first forest training.

use crate::error::ForestError;
use crate::tree::MAX_TREE_DEPTH;

/// Configuration for [`DepthForestTrainer`](crate::DepthForestTrainer).
///
/// Construct via [`TrainingParameters::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                  | Default |
/// |----------------------------|---------|
/// | `tree_depth`               | 12      |
/// | `num_of_trees`             | 3       |
/// | `minimum_num_of_samples`   | 100     |
/// | `minimum_information_gain` | 0.001   |
/// | `num_of_threads`           | 0       |
/// | `seed`                     | 42      |
///
/// With a positive gain floor a pure node always becomes a leaf.
///
/// `num_of_threads == 1` evaluates split candidates sequentially; any other
/// value uses fork-join evaluation, with 0 meaning the size of the rayon pool.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingParameters {
    pub(crate) tree_depth: usize,
    pub(crate) num_of_trees: usize,
    pub(crate) minimum_num_of_samples: usize,
    pub(crate) minimum_information_gain: f64,
    pub(crate) num_of_threads: usize,
    pub(crate) seed: u64,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingParameters {
    /// Create parameters with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree_depth: 12,
            num_of_trees: 3,
            minimum_num_of_samples: 100,
            minimum_information_gain: 0.001,
            num_of_threads: 0,
            seed: 42,
        }
    }

    // --- Setters ---

    /// Set the maximum tree depth (the root is depth 1).
    #[must_use]
    pub fn with_tree_depth(mut self, tree_depth: usize) -> Self {
        self.tree_depth = tree_depth;
        self
    }

    /// Set the number of trees grown by `train_forest`.
    #[must_use]
    pub fn with_num_of_trees(mut self, num_of_trees: usize) -> Self {
        self.num_of_trees = num_of_trees;
        self
    }

    /// Set the sample count below which a node becomes a leaf.
    #[must_use]
    pub fn with_minimum_num_of_samples(mut self, minimum_num_of_samples: usize) -> Self {
        self.minimum_num_of_samples = minimum_num_of_samples;
        self
    }

    /// Set the information gain below which a node becomes a leaf.
    #[must_use]
    pub fn with_minimum_information_gain(mut self, minimum_information_gain: f64) -> Self {
        self.minimum_information_gain = minimum_information_gain;
        self
    }

    /// Set the number of split-evaluation workers.
    #[must_use]
    pub fn with_num_of_threads(mut self, num_of_threads: usize) -> Self {
        self.num_of_threads = num_of_threads;
        self
    }

    /// Set the seed of the generator owned by `train_tree` / `train_forest`.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the maximum tree depth.
    #[must_use]
    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    /// Return the number of trees.
    #[must_use]
    pub fn num_of_trees(&self) -> usize {
        self.num_of_trees
    }

    /// Return the minimum sample count for a split.
    #[must_use]
    pub fn minimum_num_of_samples(&self) -> usize {
        self.minimum_num_of_samples
    }

    /// Return the minimum information gain for a split.
    #[must_use]
    pub fn minimum_information_gain(&self) -> f64 {
        self.minimum_information_gain
    }

    /// Return the number of split-evaluation workers.
    #[must_use]
    pub fn num_of_threads(&self) -> usize {
        self.num_of_threads
    }

    /// Return the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Check the parameters before any tree is allocated.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                    |
    /// |--------------------------------------|-----------------------------------------|
    /// | [`ForestError::InvalidTreeDepth`]    | `tree_depth` is 0 or too large to index |
    /// | [`ForestError::InvalidTreeCount`]    | `num_of_trees` is 0                     |
    /// | [`ForestError::InvalidMinimumGain`]  | the gain floor is NaN or infinite       |
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.tree_depth == 0 || self.tree_depth > MAX_TREE_DEPTH {
            return Err(ForestError::InvalidTreeDepth {
                tree_depth: self.tree_depth,
                max: MAX_TREE_DEPTH,
            });
        }
        if self.num_of_trees == 0 {
            return Err(ForestError::InvalidTreeCount {
                num_of_trees: self.num_of_trees,
            });
        }
        if !self.minimum_information_gain.is_finite() {
            return Err(ForestError::InvalidMinimumGain {
                value: self.minimum_information_gain,
            });
        }
        Ok(())
    }
}
