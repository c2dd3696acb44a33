//! File-tree scanning and path exclusion.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// One entry produced by a [`FileScanner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    /// Absolute path
    pub path: PathBuf,
    /// Path below the scan root, `/`-separated
    pub relative: String,
    pub is_directory: bool,
    /// Modification stamp, nanoseconds since the Unix epoch
    pub last_modified: i64,
    pub size: u64,
}

impl ScanItem {
    /// Path as stored in the index
    pub fn index_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Push-style tree traversal.
pub trait FileScanner {
    /// Call `visitor` for every directory and regular file below the root,
    /// depth first. Returning `false` for a directory skips its subtree.
    fn visit(&self, visitor: &mut dyn FnMut(&ScanItem) -> bool) -> Result<()>;
}

/// Modification stamp of a file
pub fn file_stamp(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Glob-based exclusion predicate over relative paths.
///
/// A pattern without a leading `/` matches at any depth; `/pattern` only
/// matches from the root.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    set: GlobSet,
}

impl IgnoreMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim_end_matches('/');
            if let Some(anchored) = pattern.strip_prefix('/') {
                builder.add(Glob::new(anchored).with_context(|| format!("Invalid glob {:?}", pattern))?);
            } else {
                builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob {:?}", pattern))?);
                builder.add(
                    Glob::new(&format!("**/{}", pattern))
                        .with_context(|| format!("Invalid glob {:?}", pattern))?,
                );
            }
        }
        Ok(Self {
            set: builder.build().context("Failed to compile glob patterns")?,
        })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn denies(&self, relative: &str) -> bool {
        !self.set.is_empty() && self.set.is_match(relative)
    }
}

/// [`FileScanner`] over a directory tree using the `ignore` walker
pub struct WalkScanner {
    root: PathBuf,
    git_ignore: bool,
    matcher: IgnoreMatcher,
    skip: Option<PathBuf>,
}

impl WalkScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git_ignore: true,
            matcher: IgnoreMatcher::empty(),
            skip: None,
        }
    }

    /// Honour `.gitignore` and `.ignore` files (default on)
    pub fn git_ignore(mut self, yes: bool) -> Self {
        self.git_ignore = yes;
        self
    }

    pub fn matcher(mut self, matcher: IgnoreMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Never report this path, typically the index file itself
    pub fn skip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileScanner for WalkScanner {
    fn visit(&self, visitor: &mut dyn FnMut(&ScanItem) -> bool) -> Result<()> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(self.git_ignore)
            .git_global(self.git_ignore)
            .git_exclude(self.git_ignore)
            .ignore(self.git_ignore)
            .parents(self.git_ignore)
            .require_git(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut pruned: Option<PathBuf> = None;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            // entries come depth first, so a pruned subtree is contiguous
            if let Some(prefix) = &pruned {
                if path.starts_with(prefix) {
                    continue;
                }
                pruned = None;
            }
            if self.skip.as_deref() == Some(path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "cannot stat");
                    continue;
                }
            };
            if !meta.is_dir() && !meta.is_file() {
                continue;
            }

            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if self.matcher.denies(&relative) {
                if meta.is_dir() {
                    pruned = Some(path.to_path_buf());
                }
                continue;
            }

            let item = ScanItem {
                path: path.to_path_buf(),
                relative,
                is_directory: meta.is_dir(),
                last_modified: file_stamp(&meta),
                size: meta.len(),
            };
            if !visitor(&item) && item.is_directory {
                pruned = Some(item.path);
            }
        }
        Ok(())
    }
}

/// All regular files a scanner reports
pub fn collect_files(scanner: &dyn FileScanner) -> Result<Vec<ScanItem>> {
    let mut files = Vec::new();
    scanner.visit(&mut |item| {
        if !item.is_directory {
            files.push(item.clone());
        }
        true
    })?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("src/nested/lib.rs"), "pub fn lib() {}").unwrap();
        fs::write(dir.path().join("build/out.log"), "log").unwrap();
        fs::write(dir.path().join("README"), "readme").unwrap();
        dir
    }

    fn relatives(scanner: &WalkScanner) -> Vec<String> {
        collect_files(scanner)
            .unwrap()
            .into_iter()
            .map(|i| i.relative)
            .collect()
    }

    #[test]
    fn test_walk_all_files() {
        let dir = tree();
        let files = relatives(&WalkScanner::new(dir.path()));
        assert_eq!(files, ["README", "build/out.log", "src/main.rs", "src/nested/lib.rs"]);
    }

    #[test]
    fn test_visitor_prunes_directories() {
        let dir = tree();
        let scanner = WalkScanner::new(dir.path());
        let mut seen = Vec::new();
        scanner
            .visit(&mut |item| {
                seen.push(item.relative.clone());
                item.relative != "src"
            })
            .unwrap();
        assert!(seen.contains(&"src".to_string()));
        assert!(!seen.iter().any(|p| p.starts_with("src/")));
        assert!(seen.contains(&"build/out.log".to_string()));
    }

    #[test]
    fn test_matcher_excludes() {
        let dir = tree();
        let matcher = IgnoreMatcher::new(&["*.log", "nested"]).unwrap();
        let files = relatives(&WalkScanner::new(dir.path()).matcher(matcher));
        assert_eq!(files, ["README", "src/main.rs"]);
    }

    #[test]
    fn test_matcher_anchored() {
        let matcher = IgnoreMatcher::new(&["/build"]).unwrap();
        assert!(matcher.denies("build"));
        assert!(!matcher.denies("src/build"));
        assert!(!IgnoreMatcher::empty().denies("anything"));
    }

    #[test]
    fn test_skip_path() {
        let dir = tree();
        let scanner = WalkScanner::new(dir.path()).skip_path(dir.path().join("README"));
        assert!(!relatives(&scanner).contains(&"README".to_string()));
    }

    #[test]
    fn test_stamps_are_set() {
        let dir = tree();
        for item in collect_files(&WalkScanner::new(dir.path())).unwrap() {
            assert!(item.last_modified > 0);
            assert!(item.path.is_absolute());
        }
    }
}
