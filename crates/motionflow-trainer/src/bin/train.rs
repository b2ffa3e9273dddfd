use std::path::PathBuf;

use clap::Parser;
use motionflow_trainer::{run_training, FitOptions, TrainingOptions, TrainingReport};

/// Train the dynamic gesture classifier on recorded landmark sequences.
#[derive(Parser)]
#[command(name = "train")]
#[command(version)]
struct Cli {
    /// Glob pattern of dataset JSON files
    #[arg(long, env = "MOTIONFLOW_DATA", default_value = "data/raw/*.json")]
    data: String,

    /// Number of training epochs
    #[arg(long, env = "MOTIONFLOW_EPOCHS", default_value_t = 50)]
    epochs: usize,

    /// Samples per gradient step
    #[arg(long, env = "MOTIONFLOW_BATCH_SIZE", default_value_t = 16)]
    batch_size: usize,

    /// Fraction of samples held out for validation
    #[arg(long, env = "MOTIONFLOW_VALIDATION_SPLIT", default_value_t = 0.2)]
    validation_split: f64,

    /// Model output directory
    #[arg(long, env = "MOTIONFLOW_OUTPUT", default_value = "models/saved_model")]
    output: PathBuf,

    /// Seed for the split and batch order
    #[arg(long, env = "MOTIONFLOW_SEED", default_value_t = 42)]
    seed: u64,

    /// Keep recording order: validate on the trailing samples and never reshuffle
    #[arg(long)]
    no_shuffle: bool,
}

impl From<Cli> for TrainingOptions {
    fn from(cli: Cli) -> Self {
        Self {
            data: cli.data,
            output: cli.output,
            fit: FitOptions {
                epochs: cli.epochs,
                batch_size: cli.batch_size,
                validation_split: cli.validation_split,
                shuffle: !cli.no_shuffle,
                seed: cli.seed,
            },
        }
    }
}

fn print_summary(report: &TrainingReport) {
    println!();
    println!("Trained on {} samples, labels: {:?}", report.sample_count, report.labels);
    if let Some(stop) = &report.history.stopped_early {
        println!(
            "Stopped early at epoch {} ({}){}",
            stop.epoch,
            stop.callback,
            if stop.restored_best { ", best weights restored" } else { "" }
        );
    }
    if let Some(m) = report.final_metrics() {
        println!("Final training loss: {:.4}, accuracy: {:.4}", m.loss, m.accuracy);
        if let (Some(l), Some(a)) = (m.val_loss, m.val_accuracy) {
            println!("Final validation loss: {l:.4}, accuracy: {a:.4}");
        }
    }
    println!("Model saved to {}", report.output.display());
    println!();
    println!("Next step: export for the browser:");
    println!("  export --input {}", report.output.display());
}

fn main() {
    motionflow_core::logging::init();

    let options = TrainingOptions::from(Cli::parse());
    match run_training(&options) {
        Ok(report) => print_summary(&report),
        Err(e) => {
            tracing::error!("training failed: {e:#}");
            eprintln!("Training failed: {e:#}");
            std::process::exit(1);
        }
    }
}
