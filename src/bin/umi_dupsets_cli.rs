use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use umi_dupsets::config::{DEFAULT_INFERRED_UMI_TAG, DEFAULT_UMI_TAG};
use umi_dupsets::tsv::TsvDuplicateSetReader;
use umi_dupsets::{refine_duplicate_sets, UmiConfig};

/// Split duplicate sets by UMI and report UMI quality metrics.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Duplicate sets as `set_id<TAB>read_name[<TAB>umi]` lines (.gz accepted)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Where to write the grouped reads
    #[arg(short = 'o', long = "output", default_value = "grouped_reads.txt")]
    output: PathBuf,

    /// Where to write the UMI metrics
    #[arg(short = 'm', long = "metrics", default_value = "umi_metrics.txt")]
    metrics: PathBuf,

    /// Largest edit distance at which UMIs are joined into one molecule
    #[arg(long, default_value = "1")]
    max_edit_distance_to_join: u32,

    /// Tag holding the observed UMI
    #[arg(long, default_value = DEFAULT_UMI_TAG)]
    umi_tag: String,

    /// Tag receiving the inferred UMI
    #[arg(long, default_value = DEFAULT_INFERRED_UMI_TAG)]
    assigned_umi_tag: String,

    /// Keep reads without a UMI instead of failing
    #[arg(long)]
    allow_missing_umis: bool,
}

fn spinner(color: &str, message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = UmiConfig {
        max_edit_distance_to_join: args.max_edit_distance_to_join,
        umi_tag: args.umi_tag,
        inferred_umi_tag: args.assigned_umi_tag,
        allow_missing_umis: args.allow_missing_umis,
    };

    // 1. Split duplicate sets by UMI
    let spinner_split = spinner("green", "Splitting duplicate sets by UMI...");
    let source = TsvDuplicateSetReader::from_path(&args.input, &config.umi_tag)?;
    let results = refine_duplicate_sets(source, config)?;
    spinner_split.finish_with_message(format!(
        "Produced {} duplicate set(s).",
        results.duplicate_sets.len()
    ));

    // 2. Write outputs
    let spinner_write = spinner("yellow", "Writing output files...");
    fs::write(&args.output, results.get_grouped_reads_text())?;
    match results.get_metrics_report() {
        Some(report) => fs::write(&args.metrics, report)?,
        None => log::warn!("No read carried a UMI; metrics not written"),
    }
    spinner_write.finish_with_message("Output files created.");

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
