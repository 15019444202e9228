//! fpstream - Replay a recording through a streaming session
//!
//! Cuts the input into client-sized WAV chunks and prints the session's
//! reply to each one, one JSON object per line.
//!
//! Usage: fpstream <db_dir> <input.wav> [--chunk-seconds 1.5] [--carry-tail-ms N]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tunetrace_cli::database::load_database;
use tunetrace_cli::output::{print_json_line, ChunkOutput};
use tunetrace_core::audio::decode_audio;
use tunetrace_core::chunking::{split_chunks, DEFAULT_CHUNK_SECONDS};
use tunetrace_core::service_config::SessionConfig;
use tunetrace_core::{ClientMessage, Matcher, MatchingConfig, StreamingSession, TuneTraceConfig};

#[derive(Parser, Debug)]
#[command(name = "fpstream")]
#[command(about = "Stream a WAV file chunk by chunk against a postings database")]
#[command(long_about = None)]
struct Args {
    /// Directory of .tfp / .json postings files
    db_dir: String,

    /// Recording to stream
    input_path: String,

    /// Chunk length in seconds
    #[arg(long, default_value_t = DEFAULT_CHUNK_SECONDS)]
    chunk_seconds: f64,

    /// Audio carried over from one chunk into the next
    #[arg(long, default_value_t = 0)]
    carry_tail_ms: u32,

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

    run_fpstream(&args).await
}

async fn run_fpstream(args: &Args) -> Result<()> {
    if args.chunk_seconds <= 0.0 {
        anyhow::bail!("--chunk-seconds must be positive");
    }
    let input_path = Path::new(&args.input_path);
    let config = TuneTraceConfig::default();
    let db = load_database(Path::new(&args.db_dir), &config).await?;

    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))?;
    let audio = decode_audio(&bytes, config.target_sample_rate)
        .with_context(|| format!("Failed to decode {}", input_path.display()))?;

    let chunks = split_chunks(&audio.samples, audio.sample_rate, args.chunk_seconds);
    log::info!(
        "Streaming {} chunks of {:.2}s from {}",
        chunks.len(),
        args.chunk_seconds,
        input_path.display()
    );

    let matcher = Arc::new(Matcher::new(db.index, db.metadata, MatchingConfig::default()));
    let mut session = StreamingSession::new(
        matcher,
        config,
        &SessionConfig {
            carry_tail_ms: args.carry_tail_ms,
        },
    );

    for chunk in &chunks {
        let wav = chunk.to_wav()?;
        let Some(reply) = session.handle(ClientMessage::Chunk(wav)).await else {
            continue;
        };
        print_json_line(&ChunkOutput {
            chunk: chunk.index,
            start_ms: chunk.start_ms(),
            reply: serde_json::to_value(&reply)?,
        });
    }

    log::info!("{} chunks matched", session.chunks_processed());
    Ok(())
}
