use deidrev::{compute_dataset_agreement_conf, AgreementConfigBuilder, FileAnnotations};
use serde_jsonlines::json_lines;
use std::error::Error;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;

/// One JSON object per line, each holding the documents of every annotator for one file.
fn load_files<P: AsRef<Path>>(path: P) -> Result<Vec<FileAnnotations>, Box<dyn Error>> {
    let files = json_lines::<FileAnnotations, P>(path)?.collect::<Result<Vec<_>, _>>()?;
    Ok(files)
}

#[derive(Debug, Parser)]
#[command(about = "Times the dataset agreement computation", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 1)]
    n_samples: u32,
    #[arg(short, long, default_value = "./data/datasets/sample_dataset.jsonl")]
    dataset: PathBuf,
    /// Minimum IoU for two spans to match. Defaults to 0.5.
    #[arg(short, long)]
    threshold: Option<f64>,
    /// Property keys that must agree, e.g. `-p TYPE`.
    #[arg(short, long)]
    properties: Vec<String>,
    /// Print the agreement report of the last run.
    #[arg(short, long)]
    report: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut builder = AgreementConfigBuilder::new();
    if let Some(threshold) = args.threshold {
        builder = builder.threshold(threshold);
    }
    if !args.properties.is_empty() {
        builder = builder.require_properties(args.properties.iter().cloned());
    }
    if !builder.has_explicit_threshold() {
        log::info!("no threshold given, using the default");
    }
    let config = builder.build()?;
    log::info!("{}", config);

    let files = load_files(&args.dataset)?;
    log::info!("{} files loaded from {}", files.len(), args.dataset.display());

    let n_samples = args.n_samples;
    let iter = Range {
        start: 0,
        end: n_samples,
    };
    let mut total_duration = Duration::ZERO;
    let mut last = None;
    for _ in iter {
        let now = Instant::now();
        let agreement = compute_dataset_agreement_conf(&files, &config);
        total_duration += now.elapsed();
        last = Some(agreement);
    }
    println!(
        "Total duration: {} with {n_samples} samples",
        total_duration.as_secs_f64()
    );
    if let (true, Some(agreement)) = (args.report, last) {
        println!(
            "{} files compared, {} skipped",
            agreement.files_compared, agreement.files_skipped
        );
        print!("{}", agreement.matrix);
        print!("{}", agreement.report);
    }
    Ok(())
}
