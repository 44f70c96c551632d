use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use canopy_forest::{
    ClassMetrics, ConfusionMatrix, DepthForestTrainer, Forest, LabeledSample, TrainingParameters,
};
use canopy_image::{
    ImageParameters, ImageSampleProvider, ImageSplitPoint, ImageWeakLearner,
    ImageWeakLearnerParameters,
};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Depth-first random forest training for per-pixel image labelling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Tree-growth parameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Maximum tree depth (root has depth 1)
    #[arg(long, default_value_t = 12)]
    tree_depth: usize,

    /// Number of trees in the forest
    #[arg(long, default_value_t = 3)]
    num_trees: usize,

    /// Nodes with fewer samples become leaves
    #[arg(long, default_value_t = 100)]
    min_samples: usize,

    /// Splits with lower information gain are rejected
    #[arg(long, default_value_t = 0.001)]
    min_gain: f64,
}

impl ForestArgs {
    /// `--threads 1` selects the sequential split-statistics path; no flag
    /// uses the whole rayon pool.
    fn training_parameters(&self, seed: u64, threads: Option<usize>) -> TrainingParameters {
        TrainingParameters::new()
            .with_tree_depth(self.tree_depth)
            .with_num_of_trees(self.num_trees)
            .with_minimum_num_of_samples(self.min_samples)
            .with_minimum_information_gain(self.min_gain)
            .with_num_of_threads(threads.unwrap_or(0))
            .with_seed(seed)
    }
}

/// Candidate generation and sampling parameters.
#[derive(Args, Debug, Clone)]
struct ImageArgs {
    /// Pixel-difference features sampled per node
    #[arg(long, default_value_t = 200)]
    features: usize,

    /// Thresholds sampled per feature (ignored with binary images)
    #[arg(long, default_value_t = 200)]
    thresholds: usize,

    /// Treat images as grey-level instead of binary
    #[arg(long, default_value_t = false)]
    grey_level: bool,

    /// Draw thresholds from the fixed range instead of the response range
    #[arg(long, default_value_t = false)]
    fixed_threshold_range: bool,

    /// Number of bagged images as a fraction of the image list
    #[arg(long, default_value_t = 1.0)]
    bagging_fraction: f64,

    /// Fraction of pixels sampled per bagged image
    #[arg(long, default_value_t = 0.1)]
    samples_per_image: f64,

    /// Labels at or above this value are background
    #[arg(long, default_value_t = i16::MAX)]
    background_label: i16,
}

impl ImageArgs {
    fn learner_parameters(&self) -> ImageWeakLearnerParameters {
        ImageWeakLearnerParameters::new()
            .with_num_of_features(self.features)
            .with_num_of_thresholds(self.thresholds)
            .with_binary_images(!self.grey_level)
            .with_adaptive_threshold_range(!self.fixed_threshold_range)
    }

    fn sampling_parameters(&self) -> ImageParameters {
        ImageParameters::new()
            .with_bagging_fraction(self.bagging_fraction)
            .with_samples_per_image_fraction(self.samples_per_image)
            .with_background_label(self.background_label)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Train a forest on an image list and save it
    Train {
        /// CSV list of data_path,label_path rows
        #[arg(long)]
        images: PathBuf,

        /// Output path for the trained model
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        forest: ForestArgs,

        #[command(flatten)]
        image: ImageArgs,
    },

    /// Per-pixel accuracy of a saved model on an image list
    Evaluate {
        /// Path to a saved model
        #[arg(long)]
        model: PathBuf,

        /// CSV list of data_path,label_path rows
        #[arg(long)]
        images: PathBuf,

        /// Labels at or above this value are background
        #[arg(long, default_value_t = i16::MAX)]
        background_label: i16,
    },

    /// Print per-tree structure of a saved model
    Inspect {
        /// Path to a saved model
        #[arg(long)]
        model: PathBuf,
    },
}

// --- Stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    model: PathBuf,
    n_images: usize,
    num_of_classes: usize,
    parameters: TrainingParameters,
    learner: ImageWeakLearnerParameters,
    sampling: ImageParameters,
    trees: Vec<TreeSummary>,
}

#[derive(Serialize)]
struct TreeSummary {
    n_samples: usize,
    n_visited_nodes: usize,
    n_leaves: usize,
    depth: usize,
}

#[derive(Serialize)]
struct EvaluateOutput {
    model: PathBuf,
    n_images: usize,
    n_pixels: usize,
    accuracy: f64,
    confusion_matrix: Vec<Vec<usize>>,
    class_metrics: Vec<ClassMetrics>,
}

#[derive(Serialize)]
struct InspectOutput {
    model: PathBuf,
    num_of_trees: usize,
    num_of_classes: usize,
    trees: Vec<TreeShape>,
}

#[derive(Serialize)]
struct TreeShape {
    max_depth: usize,
    n_visited_nodes: usize,
    n_leaves: usize,
    depth: usize,
}

fn load_model(path: &Path) -> Result<Forest<ImageSplitPoint>> {
    let forest: Forest<ImageSplitPoint> = Forest::load(path)
        .with_context(|| format!("failed to load model {}", path.display()))?;
    info!(
        num_of_trees = forest.len(),
        num_of_classes = forest.num_of_classes(),
        "model loaded"
    );
    Ok(forest)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            images,
            output,
            forest: forest_args,
            image: image_args,
        } => {
            let provider =
                ImageSampleProvider::from_image_list(&images, image_args.sampling_parameters())
                    .context("failed to load image list")?;
            let num_of_classes = provider.num_of_classes();
            info!(n_images = provider.images().len(), num_of_classes, "images loaded");

            let learner = ImageWeakLearner::new(image_args.learner_parameters(), num_of_classes)
                .context("invalid weak learner parameters")?;
            let parameters = forest_args.training_parameters(cli.seed, cli.threads);
            let trainer = DepthForestTrainer::new(learner, parameters)
                .context("invalid training parameters")?;

            // One generator drives bagging and candidate sampling for every tree.
            let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
            let mut forest = Forest::new(num_of_classes);
            let mut trees = Vec::with_capacity(forest_args.num_trees);
            for t in 0..forest_args.num_trees {
                let mut samples = provider.load_sample_bag(&mut rng);
                info!(tree = t, n_samples = samples.len(), "sample bag loaded");
                let tree = trainer
                    .train_tree_with_rng(&mut samples, &mut rng)
                    .with_context(|| format!("training tree {t} failed"))?;
                trees.push(TreeSummary {
                    n_samples: samples.len(),
                    n_visited_nodes: tree.n_visited_nodes(),
                    n_leaves: tree.n_leaves(),
                    depth: tree.depth(),
                });
                forest.add_tree(tree);
            }

            forest.save(&output).context("failed to save model")?;

            let output = TrainOutput {
                model: output,
                n_images: provider.images().len(),
                num_of_classes,
                parameters: trainer.parameters().clone(),
                learner: trainer.weak_learner().parameters().clone(),
                sampling: provider.parameters().clone(),
                trees,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            model,
            images,
            background_label,
        } => {
            let forest = load_model(&model)?;
            let sampling = ImageParameters::new().with_background_label(background_label);
            let provider = ImageSampleProvider::from_image_list(&images, sampling)
                .context("failed to load image list")?;

            let samples = provider.all_samples();
            let truth: Vec<usize> = samples.iter().map(|s| s.label()).collect();
            let predicted: Vec<usize> = samples.iter().map(|s| forest.predict(s)).collect();
            let confusion = ConfusionMatrix::from_labels(&truth, &predicted, forest.num_of_classes())
                .context("failed to score predictions")?;
            info!(accuracy = confusion.accuracy(), n_pixels = samples.len(), "evaluation complete");

            let output = EvaluateOutput {
                model,
                n_images: provider.images().len(),
                n_pixels: samples.len(),
                accuracy: confusion.accuracy(),
                confusion_matrix: confusion.rows().map(<[usize]>::to_vec).collect(),
                class_metrics: confusion.class_metrics(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { model } => {
            let forest = load_model(&model)?;
            let output = InspectOutput {
                num_of_trees: forest.len(),
                num_of_classes: forest.num_of_classes(),
                trees: forest
                    .iter()
                    .map(|tree| TreeShape {
                        max_depth: tree.max_depth(),
                        n_visited_nodes: tree.n_visited_nodes(),
                        n_leaves: tree.n_leaves(),
                        depth: tree.depth(),
                    })
                    .collect(),
                model,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn train_parameters(cli: &Cli) -> TrainingParameters {
        let Command::Train { forest, .. } = &cli.command else {
            panic!("expected the train subcommand");
        };
        forest.training_parameters(cli.seed, cli.threads)
    }

    #[test]
    fn threads_flag_reaches_training_parameters() {
        let cli = parse(&[
            "canopy", "--threads", "1", "train", "--images", "l.csv", "--output", "m.bin",
        ]);
        assert_eq!(train_parameters(&cli).num_of_threads(), 1);
    }

    #[test]
    fn missing_threads_flag_uses_pool_size() {
        let cli = parse(&["canopy", "train", "--images", "l.csv", "--output", "m.bin", "--seed", "9"]);
        let params = train_parameters(&cli);
        assert_eq!(params.num_of_threads(), 0);
        assert_eq!(params.seed(), 9);
        assert_eq!(params.minimum_information_gain(), 0.001);
    }
}
