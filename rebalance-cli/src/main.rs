mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use rebalance_core::Dataset;
use rebalance_datasets::{make_imbalanced, ImbalancedSpec};
use rebalance_io::{load_json, read_dataset, save_json, write_dataset, write_dataset_to, CsvOptions};
use rebalance_pipeline::{Benchmark, BenchmarkResult};
use rebalance_sampling::{Rate, Smote, SmoteConfig};

use crate::config::BenchmarkFile;

#[derive(Parser)]
#[command(name = "rebalance")]
#[command(about = "SMOTE oversampling and threshold-tuned benchmarks for imbalanced binary data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed; overrides the seed in a benchmark config file
    #[arg(long, global = true)]
    seed: Option<u64>,

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

/// Where the labelled input comes from and how to read it.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the input CSV file (with header)
    #[arg(long)]
    data: PathBuf,

    /// Name of the class column
    #[arg(long)]
    target: String,

    /// Target value marking the positive (minority) class
    #[arg(long)]
    positive: String,

    /// Target value marking the negative class (any other value if unset)
    #[arg(long)]
    negative: Option<String>,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Column to treat as categorical even if it looks numeric (repeatable)
    #[arg(long = "categorical")]
    categorical: Vec<String>,
}

impl DataArgs {
    fn options(&self) -> Result<CsvOptions> {
        if !self.delimiter.is_ascii() {
            anyhow::bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        let mut options = CsvOptions::new(&self.target, &self.positive).with_delimiter(self.delimiter as u8);
        if let Some(negative) = &self.negative {
            options = options.with_negative(negative);
        }
        for column in &self.categorical {
            options = options.with_categorical(column);
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Cross-validate the learners of a config file on a CSV dataset
    Benchmark {
        #[command(flatten)]
        data: DataArgs,

        /// Benchmark config JSON (learners, cv, thresholds, tuning_metric)
        #[arg(long)]
        config: PathBuf,

        /// Write the full result (every fold) as JSON here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Oversample the positive class of a CSV dataset with SMOTE
    Oversample {
        #[command(flatten)]
        data: DataArgs,

        /// Synthetic samples as a percentage of the positive count
        #[arg(long, default_value_t = 100.0)]
        rate: f64,

        /// Oversample until both classes are the same size (ignores --rate)
        #[arg(long, default_value_t = false)]
        balance: bool,

        /// Number of nearest minority neighbors
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Output CSV (stdout if not set)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a benchmark on generated imbalanced data
    Demo {
        /// Benchmark config JSON (built-in learner set if not set)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of generated rows
        #[arg(long, default_value_t = 1000)]
        samples: usize,

        /// Share of positive rows
        #[arg(long, default_value_t = 0.05)]
        positive_fraction: f64,

        /// Number of categorical columns besides the two numeric ones
        #[arg(long, default_value_t = 1)]
        categorical: usize,

        /// Write the full result (every fold) as JSON here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct BenchmarkOutput {
    n_samples: usize,
    n_splits: usize,
    seed: u64,
    learners: Vec<LearnerOutput>,
}

#[derive(Serialize)]
struct LearnerOutput {
    id: String,
    auc_mean: f64,
    auc_std: f64,
    pooled_auc: f64,
    tuning_metric: String,
    tuned_threshold: f64,
    tuned_score: f64,
    thresholds: Vec<ThresholdOutput>,
}

#[derive(Serialize)]
struct ThresholdOutput {
    threshold: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    balanced_accuracy: f64,
}

#[derive(Serialize)]
struct OversampleOutput {
    n_original: usize,
    n_synthetic: usize,
    n_negative: usize,
    n_positive: usize,
}

impl From<&BenchmarkResult> for BenchmarkOutput {
    fn from(result: &BenchmarkResult) -> Self {
        BenchmarkOutput {
            n_samples: result.n_samples,
            n_splits: result.n_splits,
            seed: result.seed,
            learners: result
                .learners
                .iter()
                .map(|l| LearnerOutput {
                    id: l.id.clone(),
                    auc_mean: l.auc.mean,
                    auc_std: l.auc.std,
                    pooled_auc: l.pooled_auc,
                    tuning_metric: l.tuning_metric.clone(),
                    tuned_threshold: l.tuned.threshold,
                    tuned_score: l.tuned.score,
                    thresholds: l
                        .thresholds
                        .iter()
                        .map(|t| ThresholdOutput {
                            threshold: t.threshold,
                            precision: t.precision.mean,
                            recall: t.recall.mean,
                            f1: t.f1.mean,
                            balanced_accuracy: t.balanced_accuracy.mean,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn load_benchmark_file(path: &Path, seed: Option<u64>) -> Result<BenchmarkFile> {
    let mut file: BenchmarkFile =
        load_json(path).with_context(|| format!("failed to load benchmark config {}", path.display()))?;
    if let Some(seed) = seed {
        file.benchmark.seed = seed;
    }
    Ok(file)
}

fn run_benchmark(file: &BenchmarkFile, data: &Dataset<f64>, output: Option<&Path>) -> Result<()> {
    let mut benchmark = Benchmark::<f64>::new(file.benchmark.clone()).context("invalid benchmark settings")?;
    for learner in file.build_learners()? {
        benchmark.push(learner);
    }

    let counts = data.class_counts();
    info!(
        n_samples = data.len(),
        n_positive = counts.positive,
        n_negative = counts.negative,
        learners = ?benchmark.learner_ids(),
        "starting benchmark"
    );
    if counts.positive == 0 || counts.negative == 0 {
        warn!("dataset contains a single class; AUC and thresholds will be degenerate");
    }

    let result = benchmark.run(data).context("benchmark failed")?;

    for learner in &result.learners {
        for summary in &learner.thresholds {
            info!(
                learner = %learner.id,
                threshold = summary.threshold,
                "confusion matrix over all folds\n{}",
                summary.confusion
            );
        }
        info!(
            learner = %learner.id,
            threshold = learner.tuned.threshold,
            score = learner.tuned.score,
            metric = %learner.tuning_metric,
            "tuned threshold on pooled predictions\n{}",
            learner.tuned.confusion
        );
    }

    if let Some(path) = output {
        save_json(path, &result).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "full result written");
    }

    print_json(&BenchmarkOutput::from(&result))
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
        Command::Benchmark { data, config, output } => {
            let options = data.options()?;
            let dataset = read_dataset(&data.data, &options)
                .with_context(|| format!("failed to read {}", data.data.display()))?;
            let file = load_benchmark_file(&config, cli.seed)?;
            run_benchmark(&file, &dataset, output.as_deref())?;
        }

        Command::Oversample {
            data,
            rate,
            balance,
            k,
            output,
        } => {
            let options = data.options()?;
            let dataset = read_dataset(&data.data, &options)
                .with_context(|| format!("failed to read {}", data.data.display()))?;

            let rate = if balance { Rate::Balance } else { Rate::Percent(rate) };
            let config = SmoteConfig::new(rate, k).with_seed(cli.seed.unwrap_or(42));
            let smote = Smote::new(config).context("invalid oversampling configuration")?;
            let augmented = smote.oversample(&dataset).context("oversampling failed")?;

            let counts = augmented.dataset.class_counts();
            let summary = OversampleOutput {
                n_original: augmented.n_original(),
                n_synthetic: augmented.n_synthetic(),
                n_negative: counts.negative,
                n_positive: counts.positive,
            };
            info!(
                n_original = summary.n_original,
                n_synthetic = summary.n_synthetic,
                n_positive = summary.n_positive,
                "oversampling complete"
            );

            match output {
                Some(path) => {
                    write_dataset(&path, &augmented.dataset, &options)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    print_json(&summary)?;
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    write_dataset_to(&mut lock, &augmented.dataset, &options)
                        .context("failed to write dataset to stdout")?;
                    lock.flush()?;
                }
            }
        }

        Command::Demo {
            config,
            samples,
            positive_fraction,
            categorical,
            output,
        } => {
            let file = match &config {
                Some(path) => load_benchmark_file(path, cli.seed)?,
                None => {
                    let mut file = BenchmarkFile::default();
                    if let Some(seed) = cli.seed {
                        file.benchmark.seed = seed;
                    }
                    file
                }
            };
            let spec = ImbalancedSpec::new(samples, positive_fraction)
                .with_categorical(categorical, 3)
                .with_seed(file.benchmark.seed);
            let dataset = make_imbalanced(&spec).context("failed to generate demo data")?;
            info!(
                samples,
                n_positive = spec.n_positive(),
                "generated imbalanced demo data"
            );
            run_benchmark(&file, &dataset, output.as_deref())?;
        }
    }

    Ok(())
}
