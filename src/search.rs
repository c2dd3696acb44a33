//! Literal search inside file contents.

use crate::query::fold_char;
use memchr::memmem::Finder;
use std::fs;
use std::io;
use std::path::Path;

/// One occurrence of the query on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    /// The line without its terminator
    pub text: String,
    /// Byte range of the match within `text`
    pub start: usize,
    pub end: usize,
}

/// Finds a literal string, optionally ignoring case
pub struct LiteralMatcher {
    finder: Finder<'static>,
    case_sensitive: bool,
}

impl LiteralMatcher {
    pub fn new(query: &str, case_sensitive: bool) -> Self {
        let needle = if case_sensitive {
            query.to_string()
        } else {
            fold(query)
        };
        Self {
            finder: Finder::new(needle.as_bytes()).into_owned(),
            case_sensitive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.finder.needle().is_empty()
    }

    /// Every non-overlapping match, line by line
    pub fn find_in(&self, content: &str) -> Vec<LineMatch> {
        let mut matches = Vec::new();
        for (i, raw) in content.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if self.case_sensitive {
                self.collect_line(i, line, line, &mut matches);
            } else {
                // folding maps every char to one char, so char positions agree
                let folded = fold(line);
                self.collect_line(i, line, &folded, &mut matches);
            }
        }
        matches
    }

    fn collect_line(&self, index: usize, line: &str, haystack: &str, out: &mut Vec<LineMatch>) {
        let needle_len = self.finder.needle().len();
        if needle_len == 0 {
            return;
        }
        let mut from = 0;
        while let Some(pos) = self.finder.find(&haystack.as_bytes()[from..]) {
            let at = from + pos;
            let column = haystack[..at].chars().count();
            let length = haystack[at..at + needle_len].chars().count();
            let start = byte_offset(line, column);
            let end = byte_offset(line, column + length);
            out.push(LineMatch {
                line: index + 1,
                column: column + 1,
                text: line.to_string(),
                start,
                end,
            });
            from = at + needle_len;
        }
    }

    /// Search a file on disk. `Ok(None)` for binary files.
    pub fn search_file(&self, path: &Path) -> io::Result<Option<Vec<LineMatch>>> {
        let content = fs::read(path)?;
        if memchr::memchr(0, &content).is_some() {
            return Ok(None);
        }
        Ok(Some(self.find_in(&String::from_utf8_lossy(&content))))
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

fn fold(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let m = LiteralMatcher::new("foo", true);
        let found = m.find_in("bar\nxx foo foo\r\nfoo");
        let pos: Vec<_> = found.iter().map(|f| (f.line, f.column)).collect();
        assert_eq!(pos, [(2, 4), (2, 8), (3, 1)]);
        assert_eq!(found[0].text, "xx foo foo");
        assert_eq!(&found[0].text[found[0].start..found[0].end], "foo");
    }

    #[test]
    fn test_ignore_case() {
        let m = LiteralMatcher::new("FOO", false);
        let found = m.find_in("a Foo\nfOo");
        assert_eq!(found.len(), 2);
        assert!(LiteralMatcher::new("FOO", true).find_in("a Foo").is_empty());
    }

    #[test]
    fn test_columns_count_chars() {
        let m = LiteralMatcher::new("ok", false);
        let found = m.find_in("ÄÖ ok");
        assert_eq!(found[0].column, 4);
        assert_eq!(&found[0].text[found[0].start..found[0].end], "ok");
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let m = LiteralMatcher::new("", true);
        assert!(m.is_empty());
        assert!(m.find_in("anything").is_empty());
    }

    #[test]
    fn test_binary_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, b"foo\0bar").unwrap();
        assert_eq!(LiteralMatcher::new("foo", true).search_file(&path).unwrap(), None);
    }
}
