//! End-to-end: CSV images -> sample provider -> forest -> predictions.

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

use canopy_forest::{
    ConfusionMatrix, DepthForestTrainer, Forest, LabeledSample, TrainingParameters,
};
use canopy_image::{
    ImageError, ImageParameters, ImageSample, ImageSampleProvider, ImageSplitPoint,
    ImageWeakLearner, ImageWeakLearnerParameters,
};

const SIZE: usize = 16;

/// Binary image of alternating columns starting at `phase`; the label equals
/// the pixel, so only a difference across neighbouring columns separates the
/// classes.
fn write_image(dir: &Path, name: &str, phase: usize) {
    let row: Vec<String> = (0..SIZE).map(|x| ((x + phase) % 2).to_string()).collect();
    let matrix = vec![row.join(","); SIZE].join("\n") + "\n";
    fs::write(dir.join(format!("{name}_data.csv")), &matrix).unwrap();
    fs::write(dir.join(format!("{name}_labels.csv")), &matrix).unwrap();
}

/// Three images plus a list file referencing them by relative path.
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut list = String::new();
    for (name, phase) in [("a", 0), ("b", 1), ("c", 0)] {
        write_image(dir.path(), name, phase);
        list.push_str(&format!("{name}_data.csv,{name}_labels.csv\n"));
    }
    fs::write(dir.path().join("images.csv"), list).unwrap();
    dir
}

fn provider(dir: &TempDir) -> ImageSampleProvider {
    let params = ImageParameters::new().with_samples_per_image_fraction(1.0);
    ImageSampleProvider::from_image_list(&dir.path().join("images.csv"), params).unwrap()
}

fn trainer(num_of_threads: usize) -> DepthForestTrainer<ImageWeakLearner> {
    let learner_params = ImageWeakLearnerParameters::new()
        .with_num_of_features(40)
        .with_offset_x_range(0, 2)
        .with_offset_y_range(0, 2);
    let learner = ImageWeakLearner::new(learner_params, 2).unwrap();
    let params = TrainingParameters::new()
        .with_tree_depth(10)
        .with_num_of_trees(3)
        .with_minimum_num_of_samples(2)
        .with_num_of_threads(num_of_threads)
        .with_seed(11);
    DepthForestTrainer::new(learner, params).unwrap()
}

fn accuracy(forest: &Forest<ImageSplitPoint>, samples: &[ImageSample<'_>]) -> f64 {
    let truth: Vec<usize> = samples.iter().map(|s| s.label()).collect();
    let predicted: Vec<usize> = samples.iter().map(|s| forest.predict(s)).collect();
    ConfusionMatrix::from_labels(&truth, &predicted, 2)
        .unwrap()
        .accuracy()
}

#[test]
fn image_list_loads_relative_paths() {
    let dir = fixture();
    let p = provider(&dir);
    assert_eq!(p.images().len(), 3);
    assert_eq!(p.num_of_classes(), 2);
    assert_eq!(p.all_samples().len(), 3 * SIZE * SIZE);
}

#[test]
fn missing_image_file_is_reported() {
    let dir = fixture();
    fs::remove_file(dir.path().join("b_labels.csv")).unwrap();
    let err = ImageSampleProvider::from_image_list(
        &dir.path().join("images.csv"),
        ImageParameters::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ImageError::FileNotFound { .. }));
}

#[test]
fn forest_labels_images_accurately() {
    let dir = fixture();
    let p = provider(&dir);
    let mut samples = p.load_samples(&[0, 1, 2], &mut ChaCha8Rng::seed_from_u64(0));
    let forest = trainer(0).train_forest(&mut samples).unwrap();

    let all = p.all_samples();
    let ones = all.iter().filter(|s| s.label() == 1).count();
    assert_eq!(2 * ones, all.len());

    let acc = accuracy(&forest, &all);
    assert!(acc > 0.9, "accuracy {acc} <= 0.9");
}

#[test]
fn saved_image_forest_predicts_identically() {
    let dir = fixture();
    let p = provider(&dir);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut samples = p.load_sample_bag(&mut rng);
    let forest = trainer(0).train_forest(&mut samples).unwrap();

    let path = dir.path().join("forest.bin");
    forest.save(&path).unwrap();
    let loaded: Forest<ImageSplitPoint> = Forest::load(&path).unwrap();
    assert_eq!(loaded, forest);
    for sample in p.all_samples() {
        assert_eq!(loaded.predict(&sample), forest.predict(&sample));
    }
}

#[test]
fn thread_count_does_not_change_forest() {
    let dir = fixture();
    let p = provider(&dir);
    let forests: Vec<Forest<ImageSplitPoint>> = [1, 4]
        .into_iter()
        .map(|threads| {
            let mut samples = p.load_sample_bag(&mut ChaCha8Rng::seed_from_u64(5));
            trainer(threads).train_forest(&mut samples).unwrap()
        })
        .collect();
    assert_eq!(forests[0], forests[1]);
}
