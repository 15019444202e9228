//! Offline postings database
//!
//! Loads a directory of postings files (as written by `fpgen`) into
//! in-memory stores so the matcher can run without a server.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tunetrace_core::{
    FingerprintIndex, MemoryIndex, MemoryMetadataStore, Posting, Track, TrackStatus,
    TuneTraceConfig,
};
use tunetrace_fp::{AnalysisParams, FpFile};

/// Stores filled from a postings directory
pub struct LoadedDatabase {
    pub index: Arc<MemoryIndex>,
    pub metadata: Arc<MemoryMetadataStore>,
    pub tracks: usize,
    pub postings: usize,
}

/// Postings files directly inside `dir`, sorted by path
pub fn find_postings_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read database directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && tunetrace_fp::is_postings_file(path))
        .collect();
    files.sort();
    Ok(files)
}

fn load_compatible(path: &Path, params: &AnalysisParams) -> Result<FpFile> {
    let fp_file = tunetrace_fp::load_auto(path)?;
    fp_file.header.params().ensure_compatible(params)?;
    Ok(fp_file)
}

/// Postings of a file, in the engine's representation
pub fn file_postings(fp_file: &FpFile) -> Vec<Posting> {
    fp_file
        .postings
        .iter()
        .map(|&(hash, offset_ms)| Posting::new(hash, offset_ms))
        .collect()
}

/// Load every postings file of `dir`
///
/// Files are parsed in parallel. Unreadable files and files produced with
/// other analysis parameters are skipped with a warning.
pub async fn load_database(dir: &Path, config: &TuneTraceConfig) -> Result<LoadedDatabase> {
    if !dir.is_dir() {
        anyhow::bail!("Database directory not found: {}", dir.display());
    }

    let files = find_postings_files(dir)?;
    log::info!("Found {} postings files, loading in parallel...", files.len());

    let params = config.analysis_params();
    let load_start = Instant::now();
    let loaded: Vec<FpFile> = files
        .par_iter()
        .filter_map(|path| match load_compatible(path, &params) {
            Ok(fp_file) => Some(fp_file),
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();

    log::info!(
        "Loaded {} files in {:.2}s",
        loaded.len(),
        load_start.elapsed().as_secs_f64()
    );

    let index = Arc::new(MemoryIndex::new());
    let metadata = Arc::new(MemoryMetadataStore::new());
    let mut postings = 0;

    for fp_file in &loaded {
        let identifier = fp_file.metadata.identifier.clone();
        let track_postings = file_postings(fp_file);
        index.insert(&identifier, &track_postings).await?;
        postings += track_postings.len();

        metadata
            .insert(Track {
                id: identifier.clone(),
                title: identifier,
                artist: String::new(),
                storage_key: fp_file.metadata.original_filename.clone(),
                status: TrackStatus::Ready,
                created_at: chrono::Utc::now(),
            })
            .await;
    }

    Ok(LoadedDatabase {
        index,
        metadata,
        tracks: loaded.len(),
        postings,
    })
}
