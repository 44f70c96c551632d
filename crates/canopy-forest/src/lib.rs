//! Depth-first random forest induction over a pluggable weak learner.
//!
//! [`DepthForestTrainer`] grows array-backed trees by recursive in-place
//! partitioning of a caller-owned sample slice. Candidate splits come from a
//! [`WeakLearner`] and are scored by entropy-based information gain, either
//! sequentially or with fork-join evaluation over candidate shards.

mod axis_aligned;
mod config;
mod confusion;
mod error;
mod forest;
mod histogram;
mod node;
mod sample;
mod serialize;
mod split_statistics;
mod trainer;
mod tree;
mod weak_learner;

pub use axis_aligned::{AxisAlignedCandidates, AxisAlignedSplitPoint, AxisAlignedWeakLearner};
pub use config::TrainingParameters;
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::ForestError;
pub use forest::Forest;
pub use histogram::HistogramStatistics;
pub use node::{Node, NodeIndex};
pub use sample::{FeatureSample, LabeledSample};
pub use split_statistics::{SplitStatistics, SplitStatisticsShard};
pub use trainer::DepthForestTrainer;
pub use tree::{MAX_TREE_DEPTH, PreOrder, Tree};
pub use weak_learner::{
    Direction, SplitCandidates, SplitPoint, WeakLearner, information_gain, partition,
};
