//! fpmatch - Identify a WAV clip against a directory of postings files
//!
//! Usage: fpmatch <db_dir> <query.wav> [--tie-break first_seen|smallest_track_id]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tunetrace_cli::database::load_database;
use tunetrace_cli::output::{print_json, MatchOutput};
use tunetrace_core::{fingerprint_audio, Matcher, MatchingConfig, TieBreak, TuneTraceConfig};

#[derive(Parser, Debug)]
#[command(name = "fpmatch")]
#[command(about = "Match a WAV clip against a postings database", long_about = None)]
struct Args {
    /// Directory of .tfp / .json postings files
    db_dir: String,

    /// Query WAV file
    query_path: String,

    /// How to pick between tracks with equal votes
    #[arg(long, default_value = "first_seen")]
    tie_break: TieBreak,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    let output = run_fpmatch(&args).await?;
    print_json(&output);
    Ok(())
}

async fn run_fpmatch(args: &Args) -> Result<MatchOutput> {
    let query_path = Path::new(&args.query_path);
    if !query_path.exists() {
        anyhow::bail!("Query file not found: {}", query_path.display());
    }

    let config = TuneTraceConfig::default();
    let db = load_database(Path::new(&args.db_dir), &config).await?;
    log::info!("Database: {} tracks, {} postings", db.tracks, db.postings);

    let bytes = std::fs::read(query_path)
        .with_context(|| format!("Failed to read {}", query_path.display()))?;
    let query_config = config.clone();
    let postings = tokio::task::spawn_blocking(move || fingerprint_audio(&bytes, &query_config))
        .await??;
    log::info!("Query has {} postings", postings.len());

    let matcher = Matcher::new(
        db.index,
        db.metadata,
        MatchingConfig {
            tie_break: args.tie_break,
            ..MatchingConfig::default()
        },
    );

    let match_start = std::time::Instant::now();
    let result = matcher.query(&postings).await?;
    log::info!("Matched in {:.3}s", match_start.elapsed().as_secs_f64());

    Ok(MatchOutput {
        query_path: query_path.display().to_string(),
        query_postings: postings.len(),
        result,
    })
}
