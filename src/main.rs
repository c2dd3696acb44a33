use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trigrep::index::build::{build_index, BuildOptions};
use trigrep::index::{MultiIndex, SearchDecision};
use trigrep::logging;
use trigrep::output::Printer;
use trigrep::scan::{collect_files, IgnoreMatcher, WalkScanner};
use trigrep::search::{LineMatch, LiteralMatcher};
use trigrep::utils::{self, AppConfig};

/// Files this small may hold fewer than three characters and so no keys
const TINY_FILE_BYTES: u64 = 12;

#[derive(Parser)]
#[command(name = "trigrep", version)]
#[command(about = "Literal text search narrowed by a persistent trigram index")]
struct Cli {
    /// Literal text to search for
    query: Option<String>,

    /// Path to search in
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Case insensitive search
    #[arg(short = 'i', long, overrides_with_all = ["case_sensitive", "smart_case"])]
    ignore_case: bool,

    /// Case sensitive search
    #[arg(short = 's', long, overrides_with_all = ["ignore_case", "smart_case"])]
    case_sensitive: bool,

    /// Ignore case unless the query has an uppercase letter (default)
    #[arg(short = 'S', long, overrides_with_all = ["ignore_case", "case_sensitive"])]
    smart_case: bool,

    /// Only print the names of matching files
    #[arg(short = 'f', long)]
    files: bool,

    /// Do not honour .gitignore and .ignore files
    #[arg(short = 'a', long)]
    all: bool,

    /// Trust the index instead of walking the tree
    #[arg(long)]
    index_only: bool,

    /// Index file to use
    #[arg(long, value_name = "PATH")]
    index: Option<PathBuf>,

    /// Drop the index and build it again
    #[arg(long)]
    reindex: bool,

    /// Continue an interrupted index build
    #[arg(long)]
    resume: bool,

    /// Print index statistics
    #[arg(long)]
    dump: bool,

    /// Exclude paths matching this glob (repeatable)
    #[arg(short = 'g', long = "glob", value_name = "PATTERN")]
    globs: Vec<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn is_case_sensitive(&self, query: &str) -> bool {
        if self.case_sensitive {
            true
        } else if self.ignore_case {
            false
        } else {
            query.chars().any(char::is_uppercase)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_subscriber(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("trigrep: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Returns whether anything matched
fn run(cli: Cli) -> Result<bool> {
    let config = AppConfig::load()?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .build_global()
        .context("Failed to start worker threads")?;

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Cannot open {}", cli.path.display()))?;
    let index_path = utils::resolve_index_path(&root, cli.index.as_deref())?.index_path;
    tracing::debug!(index = %index_path.display(), root = %root.display(), "resolved index");

    let scanner = WalkScanner::new(&root)
        .git_ignore(!cli.all)
        .matcher(IgnoreMatcher::new(&cli.globs)?)
        .skip_path(&index_path);
    let options = BuildOptions {
        resume: cli.resume,
        silent: !std::io::stderr().is_terminal(),
        ..BuildOptions::from_config(&config)
    };

    if cli.reindex {
        utils::remove_index(&index_path)?;
    }
    if cli.resume || !index_path.is_file() {
        build_index(&scanner, &index_path, &options)?;
    }

    let index = match MultiIndex::open(&index_path) {
        Ok(index) => index,
        Err(err) if err.is_corruption() => {
            tracing::warn!(index = %index_path.display(), error = %err, "index is corrupted, rebuilding");
            utils::remove_index(&index_path)?;
            let fresh = BuildOptions {
                resume: false,
                ..options.clone()
            };
            build_index(&scanner, &index_path, &fresh)?;
            MultiIndex::open(&index_path).context("Failed to open rebuilt index")?
        }
        Err(err) => return Err(err).context("Failed to open index"),
    };

    if cli.dump {
        println!("{}", index.stats());
    }

    let Some(query) = cli.query.as_deref() else {
        if cli.dump || cli.reindex || cli.resume {
            return Ok(true);
        }
        bail!("No query given");
    };
    if query.is_empty() && !cli.files {
        bail!("An empty query only makes sense with --files");
    }
    let case_sensitive = cli.is_case_sensitive(query);
    let short_query = query.chars().count() < 3;

    let candidates: Vec<PathBuf> = if cli.index_only {
        let hits = index.containing_str(query, case_sensitive)?;
        hits.into_iter()
            .map(|doc| PathBuf::from(doc.path))
            .filter(|path| path.starts_with(&root))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        let state = index.create_index_state_for_query(query, case_sensitive)?;
        let files = collect_files(&scanner)?;
        let total = files.len();
        let kept: Vec<PathBuf> = files
            .into_iter()
            .filter(|item| {
                (short_query && item.size < TINY_FILE_BYTES)
                    || state.does_it_make_any_sense_to_search_in_file(&item.index_path(), item.last_modified)
                        != SearchDecision::No
            })
            .map(|item| item.path)
            .collect();
        tracing::debug!(total, candidates = kept.len(), indexed = state.indexed_count(), "narrowed");
        kept
    };

    let mut printer = Printer::stdout(true);
    if query.is_empty() {
        for path in &candidates {
            printer.print_file(&display_path(path, &root))?;
        }
        printer.flush()?;
        return Ok(!candidates.is_empty());
    }

    let matcher = LiteralMatcher::new(query, case_sensitive);
    let results: Vec<(&PathBuf, Vec<LineMatch>)> = candidates
        .par_iter()
        .filter_map(|path| match matcher.search_file(path) {
            Ok(Some(matches)) if !matches.is_empty() => Some((path, matches)),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot search file");
                None
            }
        })
        .collect();

    for (path, matches) in &results {
        let shown = display_path(path, &root);
        if cli.files {
            printer.print_file(&shown)?;
            continue;
        }
        for m in matches {
            printer.print_match(&shown, m)?;
        }
    }
    printer.flush()?;
    Ok(!results.is_empty())
}

/// Path relative to the search root when possible
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
