//! Crop Advisor training CLI
//!
//! Prepares the training data, fits a new model, persists it and prints the
//! evaluation report.

#[cfg(not(any(all(target_os = "macos", target_arch = "aarch64"), target_os = "ios")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use crop_advisor_ml::{
    DEFAULT_RANDOM_SEED, DEFAULT_TEST_SIZE, ModelConfig, ModelManager, TrainingReport,
    sample_input,
};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const TOP_FEATURES: usize = 5;

/// Crop Advisor model training
#[derive(Parser)]
#[command(name = "retrain")]
#[command(about = "Train the crop recommendation model", long_about = None)]
struct Cli {
    /// Holdout fraction for evaluation
    #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
    test_size: f64,

    /// Seed for splitting and fitting
    #[arg(long, default_value_t = DEFAULT_RANDOM_SEED)]
    random_state: u64,

    /// Overwrite an existing model artifact
    #[arg(long)]
    force: bool,

    /// Directory holding the CSV sources, overrides DATA_PATH
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Artifact location, overrides MODEL_PATH
    #[arg(long)]
    model_path: Option<PathBuf>,
}

impl Cli {
    fn model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::from_env();
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.model_path {
            config.model_path = path.clone();
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.model_config();

    if config.model_path.exists() && !cli.force {
        tracing::warn!(
            path = %config.model_path.display(),
            "Model already exists, pass --force to retrain"
        );
        return Ok(());
    }

    tracing::info!(
        data_dir = %config.data_dir.display(),
        model_path = %config.model_path.display(),
        test_size = cli.test_size,
        seed = cli.random_state,
        "Training model"
    );

    let manager = ModelManager::new(config);
    let report = manager.train(cli.test_size, cli.random_state)?;
    print_report(&report);

    let prediction = manager.predict(&sample_input())?;
    println!();
    println!("Sample prediction");
    println!("  crop:       {}", prediction.label);
    println!("  confidence: {:.4}", prediction.confidence);

    tracing::info!(path = %manager.model_path().display(), "Model saved");
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!("Training results");
    println!("  train accuracy: {:.4}", report.train_accuracy);
    println!("  test accuracy:  {:.4}", report.test_accuracy);
    println!(
        "  cv accuracy:    {:.4} (+/- {:.4})",
        report.cv_mean,
        report.cv_std * 2.0
    );
    println!("  rows:           {} train, {} test", report.n_train, report.n_test);
    println!("  classes:        {}", report.classes.len());

    println!();
    println!("Top {} features", TOP_FEATURES);
    for entry in report.feature_importance.iter().take(TOP_FEATURES) {
        println!("  {:<12} {:.4}", entry.feature, entry.importance);
    }
}
