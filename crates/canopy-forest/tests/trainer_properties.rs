//! Structural properties of trained trees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use canopy_forest::{
    AxisAlignedSplitPoint, AxisAlignedWeakLearner, DepthForestTrainer, FeatureSample,
    ForestError, HistogramStatistics, LabeledSample, SplitCandidates, SplitPoint,
    SplitStatisticsShard, TrainingParameters, WeakLearner,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 1-D samples with noisy labels; feature 1 carries the sample id.
fn noisy_line(n: usize, seed: u64) -> Vec<FeatureSample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let x: f64 = rng.r#gen();
            let p = if x < 0.5 { 0.2 } else { 0.8 };
            let label = usize::from(rng.gen_bool(p));
            FeatureSample::new(vec![x, id as f64], label)
        })
        .collect()
}

fn id_of(sample: &FeatureSample) -> usize {
    sample.features()[1] as usize
}

/// Proposes every midpoint between consecutive distinct x values and ignores the rng.
struct ExhaustiveLearner;

struct Midpoints(Vec<AxisAlignedSplitPoint>);

impl SplitCandidates<AxisAlignedSplitPoint> for Midpoints {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn split_point(&self, index: usize) -> Result<AxisAlignedSplitPoint, ForestError> {
        self.0
            .get(index)
            .copied()
            .ok_or(ForestError::CandidateIndexOutOfRange {
                index,
                len: self.0.len(),
            })
    }
}

impl WeakLearner<FeatureSample> for ExhaustiveLearner {
    type SplitPoint = AxisAlignedSplitPoint;
    type Candidates = Midpoints;

    fn num_of_classes(&self) -> usize {
        2
    }

    fn sample_split_points<R: Rng + ?Sized>(
        &self,
        samples: &[FeatureSample],
        _rng: &mut R,
    ) -> Result<Midpoints, ForestError> {
        let mut xs: Vec<f64> = samples.iter().map(|s| s.features()[0]).collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        Ok(Midpoints(
            xs.windows(2)
                .map(|w| AxisAlignedSplitPoint::new(0, (w[0] + w[1]) / 2.0))
                .collect(),
        ))
    }

    fn accumulate_split_statistics(
        &self,
        samples: &[FeatureSample],
        candidates: &Midpoints,
        shard: &mut SplitStatisticsShard<'_>,
    ) -> Result<(), ForestError> {
        for sample in samples {
            for index in shard.candidates() {
                let direction = candidates.0[index].evaluate(sample);
                shard.lazy_accumulate(index, direction, sample)?;
            }
        }
        Ok(())
    }
}

fn best_gain(samples: &[FeatureSample]) -> f64 {
    let learner = ExhaustiveLearner;
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let candidates = learner.sample_split_points(samples, &mut rng).unwrap();
    let stats = learner.compute_split_statistics(samples, &candidates).unwrap();
    let current = learner.compute_statistics(samples).unwrap();
    learner.find_best_split_point_tuple(&current, &stats).unwrap().1
}

// ---------------------------------------------------------------------------
// Leaf floors and permutation reconstruction
// ---------------------------------------------------------------------------

#[test]
fn leaves_respect_floors_and_reconstruct_permutation() {
    let params = TrainingParameters::new()
        .with_tree_depth(10)
        .with_minimum_num_of_samples(2)
        .with_minimum_information_gain(0.001)
        .with_num_of_threads(1);
    let trainer = DepthForestTrainer::new(ExhaustiveLearner, params).unwrap();
    let mut samples = noisy_line(100, 11);
    let tree = trainer.train_tree(&mut samples).unwrap();

    let mut ids: Vec<usize> = samples.iter().map(id_of).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..100).collect::<Vec<_>>());

    let mut offset = 0;
    for (leaf, node) in tree.leaves() {
        let n = node.statistics().unwrap().num_of_samples();
        let range = &samples[offset..offset + n];
        offset += n;

        for sample in range {
            assert_eq!(tree.evaluate(sample), leaf);
        }
        let at_depth_bound = tree.depth_of(leaf) == 10;
        assert!(
            n < 2 || at_depth_bound || best_gain(range) < 0.001,
            "leaf {leaf} with {n} samples could still be split"
        );
    }
    assert_eq!(offset, 100);
}

#[test]
fn child_statistics_sum_to_parent() {
    let params = TrainingParameters::new()
        .with_tree_depth(8)
        .with_minimum_num_of_samples(2);
    let trainer = DepthForestTrainer::new(ExhaustiveLearner, params).unwrap();
    let mut samples = noisy_line(80, 3);
    let tree = trainer.train_tree(&mut samples).unwrap();

    for (index, node) in tree.visited_nodes() {
        if node.is_leaf() {
            assert!(node.split_point().is_none());
            continue;
        }
        let parent = node.statistics().unwrap();
        let left = tree.node(index.left_child()).unwrap().statistics().unwrap();
        let right = tree.node(index.right_child()).unwrap().statistics().unwrap();
        let mut merged = left.clone();
        merged.merge(right).unwrap();
        assert_eq!(&merged, parent);
    }
}

// ---------------------------------------------------------------------------
// Depth bound
// ---------------------------------------------------------------------------

#[test]
fn no_node_deeper_than_tree_depth() {
    let params = TrainingParameters::new()
        .with_tree_depth(4)
        .with_minimum_num_of_samples(1)
        .with_minimum_information_gain(-1.0);
    let trainer = DepthForestTrainer::new(ExhaustiveLearner, params).unwrap();
    let mut samples = noisy_line(60, 5);
    let tree = trainer.train_tree(&mut samples).unwrap();

    assert_eq!(tree.depth(), 4);
    for (index, node) in tree.visited_nodes() {
        assert!(tree.depth_of(index) <= 4);
        if tree.depth_of(index) == 4 {
            assert!(node.is_leaf());
        }
    }
}

// ---------------------------------------------------------------------------
// Single label
// ---------------------------------------------------------------------------

#[test]
fn single_label_yields_single_node() {
    let learner = AxisAlignedWeakLearner::new(3, 1, 4, 4).unwrap();
    let params = TrainingParameters::new().with_minimum_num_of_samples(1);
    let trainer = DepthForestTrainer::new(learner, params).unwrap();
    let mut samples: Vec<FeatureSample> = (0..50)
        .map(|i| FeatureSample::new(vec![f64::from(i)], 2))
        .collect();
    let tree = trainer.train_tree(&mut samples).unwrap();

    assert_eq!(tree.n_visited_nodes(), 1);
    let root = tree.node(tree.root()).unwrap();
    assert!(root.is_leaf());
    assert_eq!(root.statistics().unwrap(), &HistogramStatistics::from_counts(vec![0, 0, 50]));
}

// ---------------------------------------------------------------------------
// Sequential vs parallel
// ---------------------------------------------------------------------------

#[test]
fn parallel_split_statistics_match_sequential() {
    let learner = AxisAlignedWeakLearner::new(2, 2, 7, 9).unwrap();
    let samples = noisy_line(200, 17);
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let candidates = learner.sample_split_points(&samples, &mut rng).unwrap();

    let sequential = learner.compute_split_statistics(&samples, &candidates).unwrap();
    for workers in [1, 2, 0, 64, 1000] {
        let parallel = learner
            .compute_split_statistics_parallel(&samples, &candidates, workers)
            .unwrap();
        assert_eq!(parallel, sequential, "workers = {workers}");
    }
}

#[test]
fn thread_count_does_not_change_forest() {
    let learner = AxisAlignedWeakLearner::new(2, 2, 5, 5).unwrap();
    let base = TrainingParameters::new()
        .with_tree_depth(6)
        .with_num_of_trees(3)
        .with_minimum_num_of_samples(4)
        .with_seed(9);

    let forests: Vec<_> = [1, 2, 0]
        .into_iter()
        .map(|threads| {
            let trainer =
                DepthForestTrainer::new(learner.clone(), base.clone().with_num_of_threads(threads))
                    .unwrap();
            let mut samples = noisy_line(150, 1);
            trainer.train_forest(&mut samples).unwrap()
        })
        .collect();

    assert_eq!(forests[0], forests[1]);
    assert_eq!(forests[0], forests[2]);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn best_split_ties_go_to_lowest_index() {
    let learner = AxisAlignedWeakLearner::new(2, 1, 1, 1).unwrap();
    let current = HistogramStatistics::from_counts(vec![2, 2]);
    let mut stats = canopy_forest::SplitStatistics::new(3, &learner.create_statistics());
    for i in 0..3 {
        *stats.left_mut(i).unwrap() = HistogramStatistics::from_counts(vec![2, 0]);
        *stats.right_mut(i).unwrap() = HistogramStatistics::from_counts(vec![0, 2]);
    }
    let (index, gain) = learner.find_best_split_point_tuple(&current, &stats).unwrap();
    assert_eq!(index, 0);
    assert!((gain - 2.0_f64.ln()).abs() < 1e-12);

    let empty = canopy_forest::SplitStatistics::new(0, &learner.create_statistics());
    let (index, gain) = learner.find_best_split_point_tuple(&current, &empty).unwrap();
    assert_eq!(index, 0);
    assert_eq!(gain, f64::NEG_INFINITY);
}

#[test]
fn same_seed_same_forest() {
    let learner = AxisAlignedWeakLearner::new(2, 2, 4, 6).unwrap();
    let params = TrainingParameters::new()
        .with_tree_depth(7)
        .with_num_of_trees(2)
        .with_minimum_num_of_samples(3)
        .with_seed(123);
    let trainer = DepthForestTrainer::new(learner, params).unwrap();

    let mut a = noisy_line(120, 8);
    let mut b = noisy_line(120, 8);
    let forest_a = trainer.train_forest(&mut a).unwrap();
    let forest_b = trainer.train_forest(&mut b).unwrap();
    assert_eq!(forest_a, forest_b);
    assert_eq!(a, b);
}

#[test]
fn training_only_reorders_samples() {
    let learner = AxisAlignedWeakLearner::new(2, 2, 4, 4).unwrap();
    let params = TrainingParameters::new().with_minimum_num_of_samples(2);
    let trainer = DepthForestTrainer::new(learner, params).unwrap();
    let original = noisy_line(90, 4);
    let mut samples = original.clone();
    trainer.train_tree(&mut samples).unwrap();

    samples.sort_by_key(id_of);
    assert_eq!(samples, original);
    assert!(samples.iter().all(|s| s.label() < 2));
}
