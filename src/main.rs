//! RfmForge: Customer segmentation CLI using RFM quantile scoring
//!
//! This is the main entrypoint that orchestrates loading, scoring,
//! segmentation and output.

use anyhow::{Context, Result};
use clap::Parser;
use rfmforge::{classify, logging, report, run_pipeline, Args, OutputFormat};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init(args.verbose);

    // Check if in classification mode
    if let Some((recency, frequency)) = args.parse_score_pair()? {
        run_classify_mode(recency, frequency)
    } else {
        run_full_pipeline(&args)
    }
}

/// Print the segment of a single score pair
fn run_classify_mode(recency: u8, frequency: u8) -> Result<()> {
    let segment = classify(recency, frequency)?;
    println!("{}", segment);
    Ok(())
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    let start_time = Instant::now();
    let config = args.to_config()?;

    let rfm = run_pipeline(&args.input, &config)
        .with_context(|| format!("failed to segment {}", args.input.display()))?;

    // Nothing is written until the whole run has succeeded.
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_table(args.format, &rfm, BufWriter::new(file))?;
            info!(path = %path.display(), "wrote segmented table");
        }
        None => write_table(args.format, &rfm, io::stdout().lock())?,
    }

    if let Some(path) = &args.counts {
        let file =
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        report::write_counts_csv(&rfm.segment_counts, BufWriter::new(file))?;
        info!(path = %path.display(), "wrote segment counts");
    }

    eprintln!("\n=== Segment Statistics ===");
    eprint!("{}", report::render_summary(&rfm.summary));

    info!(
        customers = rfm.customers.len(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "pipeline complete"
    );
    Ok(())
}

fn write_table<W: Write>(format: OutputFormat, rfm: &report::RfmReport, writer: W) -> Result<()> {
    match format {
        OutputFormat::Csv => report::write_customers_csv(&rfm.customers, writer)?,
        OutputFormat::Json => report::write_json(rfm, writer)?,
    }
    Ok(())
}
