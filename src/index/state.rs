use crate::index::types::DocNode;
use rustc_hash::FxHashSet;

/// A document version: its path and modification stamp
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathAndStamp {
    pub path: String,
    pub mod_stamp: i64,
}

impl PathAndStamp {
    pub fn new(path: impl Into<String>, mod_stamp: i64) -> Self {
        Self {
            path: path.into(),
            mod_stamp,
        }
    }
}

impl From<&DocNode> for PathAndStamp {
    fn from(doc: &DocNode) -> Self {
        Self::new(doc.path.clone(), doc.last_write_time)
    }
}

/// Whether a file on disk has to be read to answer a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDecision {
    /// This exact version is indexed and matched the query
    Yes,
    /// This exact version is indexed and did not match
    No,
    /// New or modified since indexing; the index knows nothing
    Unknown,
}

/// Snapshot of an index answering "is this file worth searching" for one
/// query, so a possibly stale index can be combined with a live tree walk.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    all: FxHashSet<PathAndStamp>,
    matching: FxHashSet<PathAndStamp>,
}

impl IndexState {
    pub fn new(
        all: impl IntoIterator<Item = PathAndStamp>,
        matching: impl IntoIterator<Item = PathAndStamp>,
    ) -> Self {
        Self {
            all: all.into_iter().collect(),
            matching: matching.into_iter().collect(),
        }
    }

    pub fn from_doc_nodes(all: &[DocNode], matching: &[DocNode]) -> Self {
        Self::new(
            all.iter().map(PathAndStamp::from),
            matching.iter().map(PathAndStamp::from),
        )
    }

    pub fn does_it_make_any_sense_to_search_in_file(&self, path: &str, mod_stamp: i64) -> SearchDecision {
        let key = PathAndStamp::new(path, mod_stamp);
        if self.matching.contains(&key) {
            SearchDecision::Yes
        } else if self.all.contains(&key) {
            SearchDecision::No
        } else {
            SearchDecision::Unknown
        }
    }

    pub fn indexed_count(&self) -> usize {
        self.all.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions() {
        let all = [
            DocNode::new(0, "a.rs", 10),
            DocNode::new(1, "b.rs", 20),
        ];
        let matching = [DocNode::new(0, "a.rs", 10)];
        let state = IndexState::from_doc_nodes(&all, &matching);

        assert_eq!(
            state.does_it_make_any_sense_to_search_in_file("a.rs", 10),
            SearchDecision::Yes
        );
        assert_eq!(
            state.does_it_make_any_sense_to_search_in_file("b.rs", 20),
            SearchDecision::No
        );
        // modified since indexing
        assert_eq!(
            state.does_it_make_any_sense_to_search_in_file("b.rs", 21),
            SearchDecision::Unknown
        );
        assert_eq!(
            state.does_it_make_any_sense_to_search_in_file("c.rs", 10),
            SearchDecision::Unknown
        );
        assert_eq!(state.indexed_count(), 2);
    }

    #[test]
    fn test_empty_state_knows_nothing() {
        let state = IndexState::default();
        assert_eq!(
            state.does_it_make_any_sense_to_search_in_file("a", 0),
            SearchDecision::Unknown
        );
    }
}
