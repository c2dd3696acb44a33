use crate::index::bulk::{MultiIndexBuilder, DEFAULT_MAX_SEGMENT_BYTES};
use crate::index::multi::MultiIndex;
use crate::index::state::PathAndStamp;
use crate::index::types::Trigram;
use crate::scan::{collect_files, FileScanner};
use crate::utils::{extract_trigrams, is_binary, progress, AppConfig};
use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Knobs for one indexing run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_file_size: u64,
    pub max_segment_bytes: u64,
    /// Append to an interrupted index instead of starting over
    pub resume: bool,
    /// No progress output
    pub silent: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl BuildOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_segment_bytes: if config.max_segment_bytes == 0 {
                DEFAULT_MAX_SEGMENT_BYTES
            } else {
                config.max_segment_bytes
            },
            resume: false,
            silent: false,
        }
    }
}

/// What an indexing run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub indexed: usize,
    /// Already present in a resumed index
    pub unchanged: usize,
    pub too_large: usize,
    /// Files that could not be read
    pub errors: usize,
    pub segments: usize,
}

/// Index keys of a file. Binary files get an empty set.
pub fn read_file_trigrams(path: &Path) -> io::Result<Vec<Trigram>> {
    let content = fs::read(path)?;
    if is_binary(&content) {
        return Ok(Vec::new());
    }
    Ok(extract_trigrams(&String::from_utf8_lossy(&content)))
}

/// Index every file `scanner` reports into `index_path`.
///
/// Unreadable files are logged, counted and skipped.
pub fn build_index(scanner: &dyn FileScanner, index_path: &Path, opts: &BuildOptions) -> Result<BuildSummary> {
    let discovering = progress::spinner("Discovering files...", opts.silent);
    let files = collect_files(scanner)?;
    discovering.finish_with_message(format!("Found {} files", files.len()));

    if let Some(parent) = index_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let (builder, known) = if opts.resume && index_path.is_file() {
        let known: FxHashSet<PathAndStamp> = MultiIndex::open(index_path)
            .context("Failed to read the index to resume")?
            .read_all_doc_nodes()?
            .iter()
            .map(PathAndStamp::from)
            .collect();
        let builder = MultiIndexBuilder::open_append_only(index_path, opts.max_segment_bytes)
            .context("Failed to reopen index for appending")?;
        (builder, known)
    } else {
        let file = File::create(index_path)
            .with_context(|| format!("Failed to create index {}", index_path.display()))?;
        (MultiIndexBuilder::new(file, opts.max_segment_bytes)?, FxHashSet::default())
    };

    let indexed = AtomicUsize::new(0);
    let unchanged = AtomicUsize::new(0);
    let too_large = AtomicUsize::new(0);
    let errors = AtomicUsize::new(0);

    let pb = progress::bar(files.len() as u64, opts.silent);
    pb.set_message("Indexing files...");
    files.par_iter().try_for_each(|item| -> crate::error::Result<()> {
        pb.inc(1);
        let path = item.index_path();
        if known.contains(&PathAndStamp::new(path.as_str(), item.last_modified)) {
            unchanged.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if item.size > opts.max_file_size {
            tracing::debug!(path = %path, size = item.size, "too large to index");
            too_large.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        let trigrams = match read_file_trigrams(&item.path) {
            Ok(trigrams) => trigrams,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "cannot read file");
                errors.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };
        builder.add_document(path, item.last_modified, &trigrams)?;
        indexed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;
    pb.finish_and_clear();

    let finalizing = progress::spinner("Writing index...", opts.silent);
    let mut file = builder.complete().context("Failed to write index")?;
    let segments = MultiIndex::read_structure(&mut file)?.len();
    finalizing.finish_and_clear();

    let summary = BuildSummary {
        indexed: indexed.into_inner(),
        unchanged: unchanged.into_inner(),
        too_large: too_large.into_inner(),
        errors: errors.into_inner(),
        segments,
    };
    tracing::info!(
        indexed = summary.indexed,
        unchanged = summary.unchanged,
        too_large = summary.too_large,
        errors = summary.errors,
        segments = summary.segments,
        "index built"
    );
    Ok(summary)
}
