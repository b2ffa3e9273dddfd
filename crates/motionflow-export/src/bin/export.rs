use std::path::PathBuf;

use clap::Parser;
use motionflow_export::{export_model, ExportOptions, ExportReport, DEFAULT_SHARD_SIZE_BYTES};

/// Convert a trained gesture model into a browser layers model.
#[derive(Parser)]
#[command(name = "export")]
#[command(version)]
struct Cli {
    /// Trained model directory
    #[arg(long, env = "MOTIONFLOW_MODEL", default_value = "models/saved_model")]
    input: PathBuf,

    /// Output directory for model.json, weight shards and labels.json
    #[arg(
        long,
        env = "MOTIONFLOW_EXPORT_DIR",
        default_value = "../frontend/public/models/dynamic_gesture"
    )]
    output: PathBuf,

    /// Keep training-only layers (dropout) in the exported graph
    #[arg(long)]
    keep_debug_ops: bool,

    /// Skip the browser op compatibility check
    #[arg(long)]
    skip_op_check: bool,

    /// Maximum size of one weight shard in bytes
    #[arg(long, env = "MOTIONFLOW_SHARD_SIZE", default_value_t = DEFAULT_SHARD_SIZE_BYTES)]
    shard_size_bytes: usize,
}

impl Cli {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            strip_debug_ops: !self.keep_debug_ops,
            skip_op_check: self.skip_op_check,
            shard_size_bytes: self.shard_size_bytes,
        }
    }
}

fn print_summary(report: &ExportReport) {
    println!();
    println!("Model converted: {}", report.model_json.display());
    for shard in &report.shards {
        println!("  {}", shard.display());
    }
    if !report.stripped_layers.is_empty() {
        println!("Stripped layers: {}", report.stripped_layers.join(", "));
    }
    match &report.labels {
        Some(labels) => println!("Labels: {labels:?}"),
        None => println!("No labels.json next to the model, labels not copied"),
    }
    println!();
    println!("Load it in the browser with:");
    println!("  tf.loadLayersModel('/models/dynamic_gesture/model.json')");
}

fn main() {
    motionflow_core::logging::init();

    let cli = Cli::parse();
    match export_model(&cli.input, &cli.output, &cli.options()) {
        Ok(report) => print_summary(&report),
        Err(e) => {
            tracing::error!("export failed: {e}");
            eprintln!("Export failed: {e}");
            std::process::exit(1);
        }
    }
}
