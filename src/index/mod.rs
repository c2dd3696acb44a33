//! Segment format, builders and readers.
//!
//! A segment is a self-describing blob: preamble, posting lists, path strings,
//! document table and n-gram directory. An index file is a concatenation of
//! segments, each written by [`InMemoryIndexBuilder`] and read back through
//! [`IndexReader`]; [`MultiIndex`] queries all of them at once.

pub mod build;
pub mod builder;
pub mod bulk;
pub mod flipping;
pub mod multi;
pub mod reader;
pub mod state;
pub mod stats;
pub mod types;

pub use builder::{InMemoryIndexBuilder, RelativeWriter};
pub use bulk::MultiIndexBuilder;
pub use multi::{MultiIndex, SegmentRange};
pub use reader::{IndexBytes, IndexReader};
pub use state::{IndexState, PathAndStamp, SearchDecision};
pub use stats::SegmentStats;
pub use types::*;
