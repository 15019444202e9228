//! fpgen - Postings file generator
//!
//! Usage: fpgen <input.wav> <output_dir> [--json] [--compress]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tunetrace_cli::output::{print_json, FingerprintOutput};
use tunetrace_core::{audio::decode_audio, fingerprint_samples, TuneTraceConfig};
use tunetrace_fp::{FpFile, FpJsonFile, FpMetadata, FpWriter};

#[derive(Parser, Debug)]
#[command(name = "fpgen")]
#[command(about = "Fingerprint a WAV file into a postings file", long_about = None)]
struct Args {
    /// Input WAV file
    input_audio_path: String,

    /// Output directory for postings files
    output_dir: String,

    /// Write JSON instead of binary .tfp
    #[arg(long)]
    json: bool,

    /// Compress the .tfp payload with zstd
    #[arg(short, long)]
    compress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default: no logs (clean JSON output for parsing)
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    let output = run_fpgen(&args)?;
    print_json(&output);
    Ok(())
}

fn run_fpgen(args: &Args) -> Result<FingerprintOutput> {
    let input_path = Path::new(&args.input_audio_path);
    let output_dir = Path::new(&args.output_dir);

    if !input_path.exists() {
        anyhow::bail!("Input file not found: {}", input_path.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let config = TuneTraceConfig::default();
    config.validate()?;

    log::info!("Processing: {}", input_path.display());
    let start = std::time::Instant::now();

    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))?;
    let audio = decode_audio(&bytes, config.target_sample_rate)
        .with_context(|| format!("Failed to decode {}", input_path.display()))?;
    log::info!(
        "Decoded audio: {:.1}s duration, {} samples @ {}Hz (source {}Hz)",
        audio.duration_ms as f64 / 1000.0,
        audio.samples.len(),
        audio.sample_rate,
        audio.source_rate
    );

    let postings = fingerprint_samples(&audio.samples, &config);
    log::info!(
        "Generated {} postings in {:.2}s",
        postings.len(),
        start.elapsed().as_secs_f64()
    );

    let identifier = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Input path has no usable file name")?
        .to_string();
    let original_filename = input_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&identifier)
        .to_string();

    let mut fp_file = FpFile::new(
        FpMetadata {
            identifier: identifier.clone(),
            original_filename,
        },
        config.analysis_params(),
        audio.duration_ms,
        postings.iter().map(|p| (p.hash, p.offset_ms)).collect(),
    );

    let output_path = if args.json {
        let path = output_dir.join(format!("{}.json", identifier));
        FpJsonFile::from_fp_file(&fp_file).save(&path)?;
        path
    } else {
        fp_file.header.set_compressed(args.compress);
        let path = output_dir.join(format!("{}.tfp", identifier));
        FpWriter::new().write(&path, &fp_file)?;
        path
    };
    log::info!("Wrote {}", output_path.display());

    Ok(FingerprintOutput {
        input_path: input_path.display().to_string(),
        output_path: output_path.display().to_string(),
        identifier,
        duration_ms: audio.duration_ms,
        postings: postings.len(),
    })
}
